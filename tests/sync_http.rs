//! End-to-end sync tests against a canned local HTTP server.
//!
//! The server answers GET with a fixed JSON document and HEAD with a fixed
//! `Last-Modified` header, which is all the sync contract uses.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

use gridcache::{
    Config, ControllerState, FileStore, RefreshOutcome, SearchEvent, SearchService, Store,
    SyncClient, SyncController, SyncError, SyncOptions,
};

const DATASET_BODY: &str = r#"{
    "A": {
        "header": "Apples",
        "table": [{"name": "x", "qty": 1}, {"name": "y", "qty": 2}]
    }
}"#;

const LAST_MODIFIED: &str = "Sat, 01 Jun 2030 12:00:00 GMT";

/// Serve canned responses on an ephemeral port until the test ends.
async fn spawn_server(
    status: u16,
    body: &'static str,
    last_modified: Option<&'static str>,
) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        loop {
            let Ok((mut socket, _)) = listener.accept().await else {
                return;
            };
            tokio::spawn(async move {
                let mut buf = vec![0u8; 8192];
                let mut total = 0;
                loop {
                    match socket.read(&mut buf[total..]).await {
                        Ok(0) | Err(_) => break,
                        Ok(n) => total += n,
                    }
                    if buf[..total].windows(4).any(|w| w == b"\r\n\r\n") || total == buf.len() {
                        break;
                    }
                }

                let request = String::from_utf8_lossy(&buf[..total]);
                let is_head = request.starts_with("HEAD");

                let reason = if status == 200 { "OK" } else { "Error" };
                let mut response = format!(
                    "HTTP/1.1 {} {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n",
                    status,
                    reason,
                    body.len()
                );
                if let Some(stamp) = last_modified {
                    response.push_str(&format!("Last-Modified: {}\r\n", stamp));
                }
                response.push_str("\r\n");
                if !is_head {
                    response.push_str(body);
                }

                let _ = socket.write_all(response.as_bytes()).await;
                let _ = socket.shutdown().await;
            });
        }
    });

    addr
}

fn controller_for(addr: SocketAddr, store_path: &std::path::Path) -> SyncController {
    SyncController::new(
        Arc::new(FileStore::new(store_path)),
        SyncClient::new(false).unwrap(),
        SyncOptions {
            data_url: format!("http://{}/data.json", addr),
            refresh_interval: Duration::from_secs(3600),
        },
    )
}

#[tokio::test]
async fn refresh_fetches_publishes_and_persists() {
    let addr = spawn_server(200, DATASET_BODY, Some(LAST_MODIFIED)).await;
    let dir = tempfile::tempdir().unwrap();
    let store_path = dir.path().join("data.json");
    let controller = controller_for(addr, &store_path);

    let outcome = controller.refresh().await.unwrap();
    assert_eq!(outcome, RefreshOutcome::Completed);
    assert_eq!(controller.state(), ControllerState::Idle);

    let snapshot = controller.tables();
    assert_eq!(snapshot.tables.len(), 1);
    assert_eq!(snapshot.tables["A"].header, "Apples");
    assert_eq!(snapshot.tables["A"].rows.len(), 2);
    assert_ne!(snapshot.last_updated, "Never");

    // Written through to disk: a fresh store sees the same dataset.
    let reloaded = FileStore::new(&store_path).load();
    assert_eq!(reloaded, *snapshot);
}

#[tokio::test]
async fn check_freshness_reads_last_modified() {
    let addr = spawn_server(200, DATASET_BODY, Some(LAST_MODIFIED)).await;
    let client = SyncClient::new(false).unwrap();

    let stamp = client
        .check_freshness(&format!("http://{}/data.json", addr))
        .await
        .unwrap();
    assert_eq!(stamp.as_deref(), Some(LAST_MODIFIED));
}

#[tokio::test]
async fn check_freshness_without_header_is_none() {
    let addr = spawn_server(200, DATASET_BODY, None).await;
    let client = SyncClient::new(false).unwrap();

    let stamp = client
        .check_freshness(&format!("http://{}/data.json", addr))
        .await
        .unwrap();
    assert!(stamp.is_none());
}

#[tokio::test]
async fn server_error_surfaces_and_keeps_snapshot() {
    let addr = spawn_server(500, "boom", None).await;
    let dir = tempfile::tempdir().unwrap();
    let controller = controller_for(addr, &dir.path().join("data.json"));

    let err = controller.refresh().await.unwrap_err();
    assert!(matches!(err, SyncError::HttpStatus { code: 500 }));
    assert!(controller.tables().is_empty());
    assert_eq!(controller.state(), ControllerState::Idle);
}

#[tokio::test]
async fn garbage_body_is_a_parse_error() {
    let addr = spawn_server(200, "this is not json", None).await;
    let dir = tempfile::tempdir().unwrap();
    let controller = controller_for(addr, &dir.path().join("data.json"));

    let err = controller.refresh().await.unwrap_err();
    assert!(matches!(err, SyncError::Parse(_)));
}

#[tokio::test]
async fn freshness_check_triggers_refresh_when_remote_newer() {
    let addr = spawn_server(200, DATASET_BODY, Some(LAST_MODIFIED)).await;
    let dir = tempfile::tempdir().unwrap();
    let controller = controller_for(addr, &dir.path().join("data.json"));

    // Empty local dataset ("Never"): any remote stamp counts as newer.
    controller.run_freshness_check().await;
    assert_eq!(controller.tables().tables.len(), 1);
}

#[tokio::test]
async fn service_end_to_end_search_after_refresh() {
    let addr = spawn_server(200, DATASET_BODY, Some(LAST_MODIFIED)).await;
    let dir = tempfile::tempdir().unwrap();

    let mut config = Config::new(format!("http://{}/data.json", addr));
    config.store_path = Some(dir.path().join("data.json"));
    let service = SearchService::new(&config).unwrap();

    // Empty store on startup: the service refreshes from the remote.
    service.start().await;
    assert_eq!(service.tables().tables.len(), 1);

    let events = service.search("x").collect().await;
    assert_eq!(events.len(), 1);
    match &events[0] {
        SearchEvent::Match(m) => {
            assert_eq!(m.table_key, "A");
            assert_eq!(m.hit_count, 1);
            assert_eq!(m.rows.len(), 1);
            assert!(!m.is_header_match);
        }
        other => panic!("expected a match, got {:?}", other),
    }

    service.persist().await.unwrap();
}
