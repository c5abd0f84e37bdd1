use std::time::Duration;

use atelier_client::{ApiClient, ClientConfig, DirectoryDownloader, JobResource, ResourceFetcher};
use atelier_core::JobId;
use atelier_jobs::{
    ArtifactSink, FetchError, JobPoller, JobState, PollEvent, PollerConfig, SessionState,
};
use serde_json::json;

fn poller_for(
    server: &mockito::ServerGuard,
    resource: JobResource,
    id: JobId,
) -> (ApiClient, JobPoller<ResourceFetcher>) {
    let client = ApiClient::new(&ClientConfig::default().with_api_url(server.url())).unwrap();
    let poller = JobPoller::new(
        id,
        client.fetcher(resource),
        PollerConfig::default().with_poll_interval(Duration::from_millis(20)),
    );
    (client, poller)
}

async fn next_event(sub: &mut atelier_jobs::Subscription) -> PollEvent {
    tokio::time::timeout(Duration::from_secs(5), sub.recv())
        .await
        .expect("timed out waiting for a poll event")
        .expect("subscription closed")
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn completed_generation_stops_polling_and_downloads() {
    let mut server = mockito::Server::new_async().await;
    let id = JobId::new();
    server
        .mock("GET", format!("/generations/{id}").as_str())
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(
            json!({
                "id": id.to_string(),
                "front_count": 1,
                "back_count": 1,
                "front_images": ["/files/front.png"],
                "back_images": ["/files/back.jpg"]
            })
            .to_string(),
        )
        .create_async()
        .await;
    server
        .mock("GET", "/files/front.png")
        .with_body("F")
        .create_async()
        .await;
    server
        .mock("GET", "/files/back.jpg")
        .with_body("B")
        .create_async()
        .await;

    let (client, poller) = poller_for(&server, JobResource::Generation, id);
    let mut sub = poller.subscribe();
    poller.start().unwrap();

    let snapshot = match next_event(&mut sub).await {
        PollEvent::Snapshot(s) => s,
        other => panic!("expected snapshot, got {other:?}"),
    };
    assert_eq!(snapshot.state(), JobState::Completed);

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(poller.session_state(), SessionState::Stopped);
    assert!(!poller.has_pending_timer());
    assert!(sub.try_recv().is_none());

    let dir = tempfile::tempdir().unwrap();
    let report = DirectoryDownloader::new(client, dir.path())
        .download_all(&snapshot)
        .await
        .unwrap();
    assert!(report.is_complete());
    assert_eq!(report.written.len(), 2);
    assert_eq!(std::fs::read(dir.path().join(format!("{id}-back-0.jpg"))).unwrap(), b"B");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn server_errors_keep_the_session_polling() {
    let mut server = mockito::Server::new_async().await;
    let id = JobId::new();
    let mock = server
        .mock("GET", format!("/trainings/{id}").as_str())
        .with_status(503)
        .with_body("maintenance")
        .expect_at_least(2)
        .create_async()
        .await;

    let (_client, poller) = poller_for(&server, JobResource::Training, id);
    let mut sub = poller.subscribe();
    poller.start().unwrap();

    for _ in 0..2 {
        match next_event(&mut sub).await {
            PollEvent::TransientError(FetchError::Api { status, message }) => {
                assert_eq!(status, 503);
                assert_eq!(message, "maintenance");
            }
            other => panic!("expected API error, got {other:?}"),
        }
    }
    assert_eq!(poller.session_state(), SessionState::Polling);
    assert!(poller.snapshot().is_none());

    poller.dispose();
    mock.assert_async().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn failed_training_settles_as_failed() {
    let mut server = mockito::Server::new_async().await;
    let id = JobId::new();
    server
        .mock("GET", format!("/trainings/{id}").as_str())
        .with_status(200)
        .with_body(
            json!({
                "id": id.to_string(),
                "status": "failed",
                "error": "dataset too small"
            })
            .to_string(),
        )
        .create_async()
        .await;

    let (_client, poller) = poller_for(&server, JobResource::Training, id);
    let snapshot = poller.refresh().await.unwrap();

    assert_eq!(snapshot.state(), JobState::Failed);
    assert_eq!(snapshot.part("model").unwrap().error.as_deref(), Some("dataset too small"));
    assert_eq!(poller.session_state(), SessionState::Idle);
}
