//! Fetch doubles shared by the poller tests.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use atelier_core::JobId;
use tokio::sync::Notify;

use crate::fetch::{FetchError, SnapshotFetcher};
use crate::snapshot::{JobSnapshot, PartSpec};

pub(crate) type Parts = Vec<(String, PartSpec)>;
pub(crate) type Response = Result<Parts, FetchError>;

pub(crate) fn parts(entries: &[(&str, PartSpec)]) -> Parts {
    entries
        .iter()
        .map(|(name, spec)| ((*name).to_string(), spec.clone()))
        .collect()
}

fn snapshot_for(job_id: JobId, parts: &Parts) -> Result<JobSnapshot, FetchError> {
    parts
        .iter()
        .fold(JobSnapshot::builder(job_id), |b, (name, spec)| b.part(name.clone(), spec.clone()))
        .build()
        .map_err(FetchError::from)
}

/// Serves scripted responses in order, repeating the last one when the script
/// runs out. Tracks how many fetches overlap.
#[derive(Debug, Default)]
pub(crate) struct ScriptedFetcher {
    script: Mutex<VecDeque<Response>>,
    last: Mutex<Option<Response>>,
    answer_as: Option<JobId>,
    delay: Option<Duration>,
    calls: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl ScriptedFetcher {
    pub(crate) fn new(script: impl IntoIterator<Item = Response>) -> Self {
        Self {
            script: Mutex::new(script.into_iter().collect()),
            ..Self::default()
        }
    }

    /// Build snapshots for `job_id` regardless of the job asked for.
    pub(crate) fn answering_for(mut self, job_id: JobId) -> Self {
        self.answer_as = Some(job_id);
        self
    }

    /// Hold every fetch open for `delay` before answering.
    pub(crate) fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub(crate) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub(crate) fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    fn next_response(&self) -> Response {
        let next = self.script.lock().unwrap().pop_front();
        let mut last = self.last.lock().unwrap();
        match next {
            Some(response) => {
                *last = Some(response.clone());
                response
            }
            None => last
                .clone()
                .unwrap_or_else(|| Err(FetchError::network("no scripted response"))),
        }
    }
}

#[async_trait]
impl SnapshotFetcher for ScriptedFetcher {
    async fn fetch_snapshot(&self, job_id: &JobId) -> Result<JobSnapshot, FetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        let response = self.next_response();

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        snapshot_for(self.answer_as.unwrap_or(*job_id), &response?)
    }
}

/// Parks every fetch until the test releases it.
#[derive(Debug)]
pub(crate) struct BlockingFetcher {
    pub(crate) entered: Notify,
    pub(crate) release: Notify,
    pub(crate) calls: AtomicUsize,
    parts: Parts,
}

impl BlockingFetcher {
    pub(crate) fn new(parts: Parts) -> Self {
        Self {
            entered: Notify::new(),
            release: Notify::new(),
            calls: AtomicUsize::new(0),
            parts,
        }
    }
}

#[async_trait]
impl SnapshotFetcher for BlockingFetcher {
    async fn fetch_snapshot(&self, job_id: &JobId) -> Result<JobSnapshot, FetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.entered.notify_one();
        self.release.notified().await;
        snapshot_for(*job_id, &self.parts)
    }
}
