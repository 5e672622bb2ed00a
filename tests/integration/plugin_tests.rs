//! Plugin providers and plain URLs against a mock server

use crate::common::{config, jar, manifest, service, sha512};
use runtask::provider::url::url_hash;
use runtask::{ArtifactReference, RunTaskError};
use std::path::Path;
use tempfile::TempDir;

fn namespace_of(root: &Path, provider: &str, server_url: &str) -> std::path::PathBuf {
    let host = server_url.trim_start_matches("http://").replace(':', "_");
    root.join(provider).join(host)
}

#[tokio::test]
async fn hangar_download_is_pinned_and_reused() {
    let mut server = mockito::Server::new_async().await;
    let temp = TempDir::new().unwrap();
    let body = jar("ViaVersion");

    let download = server
        .mock("GET", "/api/v1/projects/ViaVersion/versions/5.0.0/PAPER/download")
        .with_status(200)
        .with_body(&body)
        .expect(1)
        .create_async()
        .await;

    let reference = ArtifactReference::Hangar {
        base_url: None,
        plugin: "ViaVersion".to_string(),
        version: "5.0.0".to_string(),
        platform: "paper".to_string(),
    };
    let service = service(config(temp.path(), &server.url()));
    let path = service.resolve_artifact(&reference).await.unwrap();
    let again = service.resolve_artifact(&reference).await.unwrap();
    assert_eq!(path, again);

    let ns = namespace_of(temp.path(), "hangar", &server.url());
    assert_eq!(
        path,
        ns.join("ViaVersion").join("paper").join("5.0.0").join("ViaVersion-5.0.0.jar")
    );
    let manifest = manifest(&ns).await;
    assert!(manifest
        .entry("ViaVersion/paper/5.0.0", "ViaVersion-5.0.0.jar")
        .unwrap()
        .pinned);
    download.assert_async().await;
}

#[tokio::test]
async fn github_asset_revalidates_with_etag() {
    let mut server = mockito::Server::new_async().await;
    let temp = TempDir::new().unwrap();
    let body = jar("Essentials");
    let asset_path = "/EssentialsX/Essentials/releases/download/2.20.1/EssentialsX-2.20.1.jar";

    let first = server
        .mock("GET", asset_path)
        .with_status(200)
        .with_header("etag", "\"v1\"")
        .with_body(&body)
        .expect(1)
        .create_async()
        .await;

    let reference = ArtifactReference::GitHub {
        owner: "EssentialsX".to_string(),
        repo: "Essentials".to_string(),
        tag: "2.20.1".to_string(),
        asset: "EssentialsX-2.20.1.jar".to_string(),
    };
    let cfg = config(temp.path(), &server.url());
    let path = service(cfg.clone()).resolve_artifact(&reference).await.unwrap();
    first.assert_async().await;
    first.remove_async().await;

    let revalidate = server
        .mock("GET", asset_path)
        .match_header("if-none-match", "\"v1\"")
        .with_status(304)
        .expect(1)
        .create_async()
        .await;

    let again = service(cfg.with_refresh(true))
        .resolve_artifact(&reference)
        .await
        .unwrap();
    assert_eq!(path, again);
    assert_eq!(std::fs::read(&path).unwrap(), body);
    revalidate.assert_async().await;

    let manifest = manifest(&temp.path().join("github")).await;
    let entry = manifest
        .entry("EssentialsX/Essentials/2.20.1", "EssentialsX-2.20.1.jar")
        .unwrap();
    assert_eq!(entry.etag.as_deref(), Some("\"v1\""));
}

#[tokio::test]
async fn url_bucket_is_stable() {
    let mut server = mockito::Server::new_async().await;
    let temp = TempDir::new().unwrap();
    let body = jar("Thing");

    let download = server
        .mock("GET", "/plugins/Thing.jar")
        .with_status(200)
        .with_body(&body)
        .expect(1)
        .create_async()
        .await;

    let url = format!("{}/plugins/Thing.jar", server.url());
    let reference = ArtifactReference::Url { url: url.clone() };
    let service = service(config(temp.path(), &server.url()));

    let path = service.resolve_artifact(&reference).await.unwrap();
    assert_eq!(
        path,
        temp.path().join("url").join(url_hash(&url)).join("Thing.jar")
    );
    assert_eq!(service.resolve_artifact(&reference).await.unwrap(), path);
    download.assert_async().await;
}

#[tokio::test]
async fn url_that_is_not_a_jar_is_quarantined() {
    let mut server = mockito::Server::new_async().await;
    let temp = TempDir::new().unwrap();

    server
        .mock("GET", "/plugins/Broken.jar")
        .with_status(200)
        .with_body("<html>Cloudflare says no</html>")
        .create_async()
        .await;

    let url = format!("{}/plugins/Broken.jar", server.url());
    let err = service(config(temp.path(), &server.url()))
        .resolve_artifact(&ArtifactReference::Url { url: url.clone() })
        .await
        .unwrap_err();

    let bucket = temp.path().join("url").join(url_hash(&url));
    match err {
        RunTaskError::MalformedArtifact { invalid_path, .. } => {
            assert_eq!(invalid_path, bucket.join("Broken.jar.invalid"));
            assert!(invalid_path.exists());
        }
        other => panic!("expected MalformedArtifact, got {:?}", other),
    }
    assert!(!bucket.join("Broken.jar").exists());
    assert_eq!(manifest(&temp.path().join("url")).await.entry_count(), 0);
}

#[tokio::test]
async fn modrinth_uses_published_hash_and_cached_metadata() {
    let mut server = mockito::Server::new_async().await;
    let temp = TempDir::new().unwrap();
    let body = jar("LuckPerms");

    let metadata = server
        .mock("GET", "/v2/project/luckperms/version/v5.4.102")
        .with_status(200)
        .with_body(
            serde_json::json!({
                "id": "IQ3UGSc2",
                "version_number": "5.4.102",
                "files": [
                    {
                        "url": format!("{}/cdn/LuckPerms-sources.jar", server.url()),
                        "filename": "LuckPerms-sources.jar",
                        "primary": false,
                        "hashes": {}
                    },
                    {
                        "url": format!("{}/cdn/LuckPerms-Bukkit-5.4.102.jar", server.url()),
                        "filename": "LuckPerms-Bukkit-5.4.102.jar",
                        "primary": true,
                        "size": body.len(),
                        "hashes": { "sha512": sha512(&body) }
                    }
                ]
            })
            .to_string(),
        )
        .expect(1)
        .create_async()
        .await;
    let file = server
        .mock("GET", "/cdn/LuckPerms-Bukkit-5.4.102.jar")
        .with_status(200)
        .with_body(&body)
        .expect(1)
        .create_async()
        .await;

    let reference = ArtifactReference::Modrinth {
        base_url: None,
        project: "luckperms".to_string(),
        version: "v5.4.102".to_string(),
    };
    let cfg = config(temp.path(), &server.url());
    let path = service(cfg.clone()).resolve_artifact(&reference).await.unwrap();
    assert!(path.ends_with("luckperms/v5.4.102/LuckPerms-Bukkit-5.4.102.jar"));

    let offline = service(cfg.with_offline(true))
        .resolve_artifact(&reference)
        .await
        .unwrap();
    assert_eq!(path, offline);

    metadata.assert_async().await;
    file.assert_async().await;
}

#[tokio::test]
async fn jenkins_pattern_selects_artifact() {
    let mut server = mockito::Server::new_async().await;
    let temp = TempDir::new().unwrap();
    let body = jar("Plugin");

    let info = server
        .mock("GET", "/job/Plugin/job/main/lastSuccessfulBuild/api/json")
        .with_status(200)
        .with_body(
            serde_json::json!({
                "number": 12,
                "artifacts": [
                    { "fileName": "plugin-1.0-sources.jar", "relativePath": "build/libs/plugin-1.0-sources.jar" },
                    { "fileName": "plugin-1.0.jar", "relativePath": "build/libs/plugin-1.0.jar" }
                ]
            })
            .to_string(),
        )
        .expect(1)
        .create_async()
        .await;
    let artifact = server
        .mock("GET", "/job/Plugin/job/main/12/artifact/build/libs/plugin-1.0.jar")
        .with_status(200)
        .with_body(&body)
        .expect(1)
        .create_async()
        .await;

    let reference = ArtifactReference::Jenkins {
        base_url: server.url(),
        job: "Plugin/main".to_string(),
        artifact_pattern: Some(r"^plugin-[0-9.]+\.jar$".to_string()),
        build: None,
    };
    let service = service(config(temp.path(), &server.url()));
    let path = service.resolve_artifact(&reference).await.unwrap();
    assert_eq!(
        path,
        namespace_of(temp.path(), "jenkins", &server.url())
            .join("Plugin")
            .join("main")
            .join("12-plugin-1.0.jar")
    );

    // Permalink answers are remembered for the recheck interval
    assert_eq!(service.resolve_artifact(&reference).await.unwrap(), path);

    info.assert_async().await;
    artifact.assert_async().await;
}

#[tokio::test]
async fn jenkins_ambiguous_artifacts_fail() {
    let mut server = mockito::Server::new_async().await;
    let temp = TempDir::new().unwrap();

    server
        .mock("GET", "/job/Plugin/3/api/json")
        .with_status(200)
        .with_body(
            serde_json::json!({
                "number": 3,
                "artifacts": [
                    { "fileName": "a.jar", "relativePath": "a.jar" },
                    { "fileName": "b.jar", "relativePath": "b.jar" }
                ]
            })
            .to_string(),
        )
        .create_async()
        .await;

    let err = service(config(temp.path(), &server.url()))
        .resolve_artifact(&ArtifactReference::Jenkins {
            base_url: server.url(),
            job: "Plugin".to_string(),
            artifact_pattern: None,
            build: Some("3".to_string()),
        })
        .await
        .unwrap_err();
    assert!(matches!(err, RunTaskError::ArtifactSelection { .. }));
}

/// `api/json` body of a Plugin build with a single `p.jar` artifact
fn jenkins_build(number: u64) -> String {
    serde_json::json!({
        "number": number,
        "artifacts": [{ "fileName": "p.jar", "relativePath": "p.jar" }]
    })
    .to_string()
}

fn jenkins_ref(server_url: &str, build: &str) -> ArtifactReference {
    ArtifactReference::Jenkins {
        base_url: server_url.to_string(),
        job: "Plugin".to_string(),
        artifact_pattern: None,
        build: Some(build.to_string()),
    }
}

#[tokio::test]
async fn jenkins_permalinks_are_tracked_separately() {
    let mut server = mockito::Server::new_async().await;
    let temp = TempDir::new().unwrap();

    let successful = server
        .mock("GET", "/job/Plugin/lastSuccessfulBuild/api/json")
        .with_status(200)
        .with_body(jenkins_build(15))
        .expect(1)
        .create_async()
        .await;
    let stable = server
        .mock("GET", "/job/Plugin/lastStableBuild/api/json")
        .with_status(200)
        .with_body(jenkins_build(10))
        .expect(1)
        .create_async()
        .await;
    let pinned = server
        .mock("GET", "/job/Plugin/20/api/json")
        .with_status(200)
        .with_body(jenkins_build(20))
        .expect(1)
        .create_async()
        .await;
    let mut artifacts = Vec::new();
    for number in [10, 15, 20] {
        artifacts.push(
            server
                .mock("GET", format!("/job/Plugin/{}/artifact/p.jar", number).as_str())
                .with_status(200)
                .with_body(jar(&format!("Plugin{}", number)))
                .expect(1)
                .create_async()
                .await,
        );
    }

    let service = service(config(temp.path(), &server.url()));
    let url = server.url();
    let bucket = namespace_of(temp.path(), "jenkins", &url).join("Plugin");

    let newest = service
        .resolve_artifact(&jenkins_ref(&url, "lastSuccessfulBuild"))
        .await
        .unwrap();
    service.resolve_artifact(&jenkins_ref(&url, "20")).await.unwrap();
    let stable_path = service
        .resolve_artifact(&jenkins_ref(&url, "lastStableBuild"))
        .await
        .unwrap();
    assert_eq!(newest, bucket.join("15-p.jar"));
    assert_eq!(stable_path, bucket.join("10-p.jar"));

    // Within the recheck interval each permalink answers from its own record
    assert_eq!(
        service
            .resolve_artifact(&jenkins_ref(&url, "lastStableBuild"))
            .await
            .unwrap(),
        stable_path
    );
    assert_eq!(
        service
            .resolve_artifact(&jenkins_ref(&url, "lastSuccessfulBuild"))
            .await
            .unwrap(),
        newest
    );

    // Offline, a permalink never resolved before is unknown
    let offline = service_offline(temp.path(), &url);
    let err = offline
        .resolve_artifact(&jenkins_ref(&url, "lastCompletedBuild"))
        .await
        .unwrap_err();
    assert!(matches!(err, RunTaskError::OfflineUnknownVersion { .. }));
    assert_eq!(
        offline
            .resolve_artifact(&jenkins_ref(&url, "lastStableBuild"))
            .await
            .unwrap(),
        stable_path
    );

    successful.assert_async().await;
    stable.assert_async().await;
    pinned.assert_async().await;
    for artifact in artifacts {
        artifact.assert_async().await;
    }
}

fn service_offline(root: &Path, server_url: &str) -> runtask::ArtifactService {
    service(config(root, server_url).with_offline(true))
}

#[tokio::test]
async fn jenkins_older_permalink_build_is_not_evicted() {
    let mut server = mockito::Server::new_async().await;
    let temp = TempDir::new().unwrap();
    let url = server.url();
    let refreshing = service(config(temp.path(), &url).with_refresh(true));

    for number in 11..=15u64 {
        let info = server
            .mock("GET", "/job/Plugin/lastSuccessfulBuild/api/json")
            .with_status(200)
            .with_body(jenkins_build(number))
            .create_async()
            .await;
        server
            .mock("GET", format!("/job/Plugin/{}/artifact/p.jar", number).as_str())
            .with_status(200)
            .with_body(jar(&format!("Plugin{}", number)))
            .create_async()
            .await;
        refreshing
            .resolve_artifact(&jenkins_ref(&url, "lastSuccessfulBuild"))
            .await
            .unwrap();
        info.remove_async().await;
    }

    server
        .mock("GET", "/job/Plugin/lastStableBuild/api/json")
        .with_status(200)
        .with_body(jenkins_build(10))
        .expect(1)
        .create_async()
        .await;
    let older = server
        .mock("GET", "/job/Plugin/10/artifact/p.jar")
        .with_status(200)
        .with_body(jar("Plugin10"))
        .expect(1)
        .create_async()
        .await;

    let path = refreshing
        .resolve_artifact(&jenkins_ref(&url, "lastStableBuild"))
        .await
        .unwrap();
    assert!(path.exists());
    assert!(path.ends_with("10-p.jar"));
    older.assert_async().await;

    let ns = namespace_of(temp.path(), "jenkins", &url);
    let manifest = manifest(&ns).await;
    let bucket = manifest.bucket("Plugin").unwrap();
    assert_eq!(bucket.unpinned_count(), 5);
    assert!(bucket.entries.get("10-p.jar").is_some());
    assert!(bucket.entries.get("11-p.jar").is_none());
    assert!(!ns.join("Plugin").join("11-p.jar").exists());
}

#[tokio::test]
async fn discord_attachment_with_bot_token() {
    let mut server = mockito::Server::new_async().await;
    let temp = TempDir::new().unwrap();
    let body = jar("Attached");

    let message = server
        .mock("GET", "/api/v10/channels/111/messages/222")
        .match_header("authorization", "Bot secret-token")
        .with_status(200)
        .with_body(
            serde_json::json!({
                "id": "222",
                "attachments": [
                    { "id": "9", "filename": "Attached.jar", "url": format!("{}/attachments/111/9/Attached.jar", server.url()) }
                ]
            })
            .to_string(),
        )
        .expect(1)
        .create_async()
        .await;
    let attachment = server
        .mock("GET", "/attachments/111/9/Attached.jar")
        .with_status(200)
        .with_body(&body)
        .expect(1)
        .create_async()
        .await;

    let reference = ArtifactReference::Discord {
        channel_id: "111".to_string(),
        message_id: "222".to_string(),
        token: "secret-token".to_string(),
    };
    let service = service(config(temp.path(), &server.url()));
    let path = service.resolve_artifact(&reference).await.unwrap();
    assert_eq!(path, temp.path().join("discord").join("222").join("Attached.jar"));
    assert_eq!(service.resolve_artifact(&reference).await.unwrap(), path);

    message.assert_async().await;
    attachment.assert_async().await;
}

#[tokio::test]
async fn listing_and_clearing_namespaces() {
    let mut server = mockito::Server::new_async().await;
    let temp = TempDir::new().unwrap();

    server
        .mock("GET", "/plugins/A.jar")
        .with_status(200)
        .with_body(jar("A"))
        .create_async()
        .await;
    server
        .mock("GET", "/o/r/releases/download/v1/B.jar")
        .with_status(200)
        .with_body(jar("B"))
        .create_async()
        .await;

    let service = service(config(temp.path(), &server.url()));
    service
        .resolve_artifact(&ArtifactReference::Url {
            url: format!("{}/plugins/A.jar", server.url()),
        })
        .await
        .unwrap();
    service
        .resolve_artifact(&ArtifactReference::GitHub {
            owner: "o".to_string(),
            repo: "r".to_string(),
            tag: "v1".to_string(),
            asset: "B.jar".to_string(),
        })
        .await
        .unwrap();

    let listed = service.list().await.unwrap();
    assert_eq!(listed.len(), 2);
    assert!(listed.iter().all(|a| a.size.is_some()));

    let github = runtask::manifest::Namespace::parse("github").unwrap();
    assert!(service.clear(Some(&github)).await.unwrap());
    assert!(!temp.path().join("github").exists());
    assert!(temp.path().join("url").exists());

    assert!(service.clear(None).await.unwrap());
    assert!(service.list().await.unwrap().is_empty());
}
