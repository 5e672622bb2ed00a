//! Build-channel resolution against a mock downloads API

use crate::common::{build_json, config, manifest, service};
use runtask::{ArtifactReference, BuildSelector, RunTaskError};
use tempfile::TempDir;

const LATEST_PATH: &str = "/v3/projects/paper/versions/1.20.1/builds/latest";

fn paper(build: BuildSelector) -> ArtifactReference {
    ArtifactReference::ChannelBuild {
        project: "paper".to_string(),
        version: "1.20.1".to_string(),
        build,
    }
}

#[tokio::test]
async fn latest_build_is_downloaded_unpinned() {
    let mut server = mockito::Server::new_async().await;
    let temp = TempDir::new().unwrap();
    let body = b"paper build fifty".to_vec();

    let latest = server
        .mock("GET", LATEST_PATH)
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(build_json(&server.url(), "paper", 50, &body))
        .expect(1)
        .create_async()
        .await;
    let jar = server
        .mock("GET", "/jars/paper-50.jar")
        .with_status(200)
        .with_body(&body)
        .expect(1)
        .create_async()
        .await;

    let service = service(config(temp.path(), &server.url()));
    let path = service
        .resolve_artifact(&paper(BuildSelector::Latest))
        .await
        .unwrap();

    assert_eq!(path, temp.path().join("paper").join("1.20.1").join("50.jar"));
    assert_eq!(std::fs::read(&path).unwrap(), body);

    let manifest = manifest(&temp.path().join("paper")).await;
    let entry = manifest.entry("1.20.1", "50").unwrap();
    assert!(!entry.pinned);
    assert_eq!(entry.build, Some(50));
    assert!(manifest.bucket("1.20.1").unwrap().last_update_check > 0);

    // Within the recheck interval the remote is not asked again
    let again = service
        .resolve_artifact(&paper(BuildSelector::Latest))
        .await
        .unwrap();
    assert_eq!(again, path);

    latest.assert_async().await;
    jar.assert_async().await;
}

#[tokio::test]
async fn offline_specific_build_not_cached() {
    let temp = TempDir::new().unwrap();
    let service = service(config(temp.path(), "http://127.0.0.1:9").with_offline(true));

    let err = service
        .resolve_artifact(&paper(BuildSelector::Specific(42)))
        .await
        .unwrap_err();
    assert!(matches!(err, RunTaskError::OfflineBuildNotCached { build: 42, .. }));
    assert!(err.hint().is_some());

    let err = service
        .resolve_artifact(&paper(BuildSelector::Latest))
        .await
        .unwrap_err();
    assert!(matches!(err, RunTaskError::OfflineUnknownVersion { .. }));
}

#[tokio::test]
async fn specific_build_is_pinned_and_reused() {
    let mut server = mockito::Server::new_async().await;
    let temp = TempDir::new().unwrap();
    let body = b"paper build forty-two".to_vec();

    let metadata = server
        .mock("GET", "/v3/projects/paper/versions/1.20.1/builds/42")
        .with_status(200)
        .with_body(build_json(&server.url(), "paper", 42, &body))
        .expect(1)
        .create_async()
        .await;
    let jar = server
        .mock("GET", "/jars/paper-42.jar")
        .with_status(200)
        .with_body(&body)
        .expect(1)
        .create_async()
        .await;

    let online = service(config(temp.path(), &server.url()));
    let first = online
        .resolve_artifact(&paper(BuildSelector::Specific(42)))
        .await
        .unwrap();
    let second = online
        .resolve_artifact(&paper(BuildSelector::Specific(42)))
        .await
        .unwrap();
    assert_eq!(first, second);

    // Offline works once the build is cached
    let offline = service(config(temp.path(), &server.url()).with_offline(true));
    let third = offline
        .resolve_artifact(&paper(BuildSelector::Specific(42)))
        .await
        .unwrap();
    assert_eq!(first, third);

    let manifest = manifest(&temp.path().join("paper")).await;
    assert!(manifest.entry("1.20.1", "42").unwrap().pinned);

    metadata.assert_async().await;
    jar.assert_async().await;
}

#[tokio::test]
async fn corrupted_build_is_downloaded_again() {
    let mut server = mockito::Server::new_async().await;
    let temp = TempDir::new().unwrap();
    let body = b"genuine server jar".to_vec();

    server
        .mock("GET", "/v3/projects/paper/versions/1.20.1/builds/42")
        .with_status(200)
        .with_body(build_json(&server.url(), "paper", 42, &body))
        .expect(2)
        .create_async()
        .await;
    let jar = server
        .mock("GET", "/jars/paper-42.jar")
        .with_status(200)
        .with_body(&body)
        .expect(2)
        .create_async()
        .await;

    let service = service(config(temp.path(), &server.url()));
    let path = service
        .resolve_artifact(&paper(BuildSelector::Specific(42)))
        .await
        .unwrap();

    std::fs::write(&path, b"tampered").unwrap();

    let again = service
        .resolve_artifact(&paper(BuildSelector::Specific(42)))
        .await
        .unwrap();
    assert_eq!(again, path);
    assert_eq!(std::fs::read(&path).unwrap(), body);
    jar.assert_async().await;
}

#[tokio::test]
async fn checksum_mismatch_leaves_nothing_behind() {
    let mut server = mockito::Server::new_async().await;
    let temp = TempDir::new().unwrap();

    server
        .mock("GET", "/v3/projects/paper/versions/1.20.1/builds/7")
        .with_status(200)
        .with_body(build_json(&server.url(), "paper", 7, b"what the api promised"))
        .create_async()
        .await;
    server
        .mock("GET", "/jars/paper-7.jar")
        .with_status(200)
        .with_body("something else entirely")
        .create_async()
        .await;

    let service = service(config(temp.path(), &server.url()));
    let err = service
        .resolve_artifact(&paper(BuildSelector::Specific(7)))
        .await
        .unwrap_err();
    assert!(matches!(err, RunTaskError::HashMismatch { .. }));

    let bucket = temp.path().join("paper").join("1.20.1");
    assert!(!bucket.join("7.jar").exists());
    let leftovers = std::fs::read_dir(&bucket)
        .map(|entries| entries.count())
        .unwrap_or(0);
    assert_eq!(leftovers, 0);
    assert!(manifest(&temp.path().join("paper")).await.entry("1.20.1", "7").is_none());
}

#[tokio::test]
async fn latest_falls_back_to_cache_when_api_fails() {
    let mut server = mockito::Server::new_async().await;
    let temp = TempDir::new().unwrap();
    let body = b"paper build fifty".to_vec();

    let latest = server
        .mock("GET", LATEST_PATH)
        .with_status(200)
        .with_body(build_json(&server.url(), "paper", 50, &body))
        .create_async()
        .await;
    server
        .mock("GET", "/jars/paper-50.jar")
        .with_status(200)
        .with_body(&body)
        .create_async()
        .await;

    let cfg = config(temp.path(), &server.url());
    let path = service(cfg.clone())
        .resolve_artifact(&paper(BuildSelector::Latest))
        .await
        .unwrap();
    latest.remove_async().await;

    server
        .mock("GET", LATEST_PATH)
        .with_status(503)
        .create_async()
        .await;

    let refreshed = service(cfg.with_refresh(true))
        .resolve_artifact(&paper(BuildSelector::Latest))
        .await
        .unwrap();
    assert_eq!(refreshed, path);
}

#[tokio::test]
async fn latest_without_cache_reports_api_failure() {
    let mut server = mockito::Server::new_async().await;
    let temp = TempDir::new().unwrap();

    server
        .mock("GET", LATEST_PATH)
        .with_status(500)
        .create_async()
        .await;

    let err = service(config(temp.path(), &server.url()))
        .resolve_artifact(&paper(BuildSelector::Latest))
        .await
        .unwrap_err();
    match err {
        RunTaskError::LatestUnavailable { source, .. } => {
            assert!(matches!(*source, RunTaskError::HttpStatus { status: 500, .. }))
        }
        other => panic!("expected LatestUnavailable, got {:?}", other),
    }
}

#[tokio::test]
async fn old_unpinned_builds_are_evicted() {
    let mut server = mockito::Server::new_async().await;
    let temp = TempDir::new().unwrap();
    let service = service(config(temp.path(), &server.url()).with_refresh(true));

    for build in 1..=7u64 {
        let body = format!("paper build {}", build).into_bytes();
        let latest = server
            .mock("GET", LATEST_PATH)
            .with_status(200)
            .with_body(build_json(&server.url(), "paper", build, &body))
            .create_async()
            .await;
        server
            .mock("GET", format!("/jars/paper-{}.jar", build).as_str())
            .with_status(200)
            .with_body(&body)
            .create_async()
            .await;

        service
            .resolve_artifact(&paper(BuildSelector::Latest))
            .await
            .unwrap();
        latest.remove_async().await;
    }

    let bucket_dir = temp.path().join("paper").join("1.20.1");
    let manifest = manifest(&temp.path().join("paper")).await;
    let bucket = manifest.bucket("1.20.1").unwrap();
    assert_eq!(bucket.entries.len(), 5);
    assert!(bucket.entries.get("1").is_none());
    assert!(bucket.entries.get("2").is_none());
    assert!(!bucket_dir.join("1.jar").exists());
    assert!(!bucket_dir.join("2.jar").exists());
    assert!(bucket_dir.join("7.jar").exists());
}

#[tokio::test]
async fn pinned_builds_survive_eviction() {
    let mut server = mockito::Server::new_async().await;
    let temp = TempDir::new().unwrap();
    let cfg = config(temp.path(), &server.url());

    let pinned_body = b"pinned build one".to_vec();
    server
        .mock("GET", "/v3/projects/paper/versions/1.20.1/builds/1")
        .with_status(200)
        .with_body(build_json(&server.url(), "paper", 1, &pinned_body))
        .create_async()
        .await;
    server
        .mock("GET", "/jars/paper-1.jar")
        .with_status(200)
        .with_body(&pinned_body)
        .create_async()
        .await;
    service(cfg.clone())
        .resolve_artifact(&paper(BuildSelector::Specific(1)))
        .await
        .unwrap();

    let refreshing = service(cfg.with_refresh(true));
    for build in 2..=8u64 {
        let body = format!("paper build {}", build).into_bytes();
        let latest = server
            .mock("GET", LATEST_PATH)
            .with_status(200)
            .with_body(build_json(&server.url(), "paper", build, &body))
            .create_async()
            .await;
        server
            .mock("GET", format!("/jars/paper-{}.jar", build).as_str())
            .with_status(200)
            .with_body(&body)
            .create_async()
            .await;
        refreshing
            .resolve_artifact(&paper(BuildSelector::Latest))
            .await
            .unwrap();
        latest.remove_async().await;
    }

    let manifest = manifest(&temp.path().join("paper")).await;
    let bucket = manifest.bucket("1.20.1").unwrap();
    assert!(bucket.entries.get("1").unwrap().pinned);
    assert_eq!(bucket.unpinned_count(), 5);
    assert!(temp.path().join("paper").join("1.20.1").join("1.jar").exists());
}

#[tokio::test]
async fn latest_older_than_cached_builds_is_kept() {
    let mut server = mockito::Server::new_async().await;
    let temp = TempDir::new().unwrap();
    let service = service(config(temp.path(), &server.url()).with_refresh(true));

    // Builds 11..=15 fill the bucket, then the latest is withdrawn back to 10
    for build in [11u64, 12, 13, 14, 15, 10] {
        let body = format!("paper build {}", build).into_bytes();
        let latest = server
            .mock("GET", LATEST_PATH)
            .with_status(200)
            .with_body(build_json(&server.url(), "paper", build, &body))
            .create_async()
            .await;
        server
            .mock("GET", format!("/jars/paper-{}.jar", build).as_str())
            .with_status(200)
            .with_body(&body)
            .create_async()
            .await;

        let path = service
            .resolve_artifact(&paper(BuildSelector::Latest))
            .await
            .unwrap();
        assert!(path.exists(), "resolved {} was evicted", path.display());
        latest.remove_async().await;
    }

    let manifest = manifest(&temp.path().join("paper")).await;
    let bucket = manifest.bucket("1.20.1").unwrap();
    assert_eq!(bucket.unpinned_count(), 5);
    assert!(bucket.entries.get("10").is_some());
    assert!(bucket.entries.get("11").is_none());
}

#[tokio::test]
async fn refresh_downloads_latest_again() {
    let mut server = mockito::Server::new_async().await;
    let temp = TempDir::new().unwrap();
    let body = b"paper build fifty".to_vec();

    let latest = server
        .mock("GET", LATEST_PATH)
        .with_status(200)
        .with_body(build_json(&server.url(), "paper", 50, &body))
        .expect(2)
        .create_async()
        .await;
    let jar = server
        .mock("GET", "/jars/paper-50.jar")
        .with_status(200)
        .with_body(&body)
        .expect(2)
        .create_async()
        .await;

    let cfg = config(temp.path(), &server.url());
    let first = service(cfg.clone())
        .resolve_artifact(&paper(BuildSelector::Latest))
        .await
        .unwrap();
    let second = service(cfg.with_refresh(true))
        .resolve_artifact(&paper(BuildSelector::Latest))
        .await
        .unwrap();
    assert_eq!(first, second);
    assert_eq!(std::fs::read(&second).unwrap(), body);

    latest.assert_async().await;
    jar.assert_async().await;
}
