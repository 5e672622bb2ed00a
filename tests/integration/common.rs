//! Shared fixtures: mock endpoints, jar bodies and service construction

use runtask::config::{EndpointsConfig, ResolverConfig};
use runtask::download::SilentReporter;
use runtask::hashing::{hash_bytes, HashAlgorithm};
use runtask::manifest::{Manifest, ManifestStore};
use runtask::ArtifactService;
use std::io::{Cursor, Write};
use std::path::Path;
use std::sync::Arc;

/// Every endpoint pointed at the mock server
pub fn config(root: &Path, server_url: &str) -> ResolverConfig {
    ResolverConfig::new(root).with_endpoints(EndpointsConfig {
        fill: format!("{}/v3/", server_url),
        hangar: server_url.to_string(),
        modrinth: server_url.to_string(),
        github: server_url.to_string(),
        discord: format!("{}/api/v10", server_url),
    })
}

pub fn service(config: ResolverConfig) -> ArtifactService {
    ArtifactService::new(config).with_reporter(Arc::new(SilentReporter))
}

pub fn sha256(bytes: &[u8]) -> String {
    hash_bytes(HashAlgorithm::Sha256, bytes).hex
}

pub fn sha512(bytes: &[u8]) -> String {
    hash_bytes(HashAlgorithm::Sha512, bytes).hex
}

/// A minimal jar containing one `plugin.yml`
pub fn jar(name: &str) -> Vec<u8> {
    let mut zip = zip::ZipWriter::new(Cursor::new(Vec::new()));
    zip.start_file("plugin.yml", zip::write::SimpleFileOptions::default())
        .unwrap();
    zip.write_all(format!("name: {}\n", name).as_bytes()).unwrap();
    zip.finish().unwrap().into_inner()
}

/// Fill v3 build response whose server download lives on the mock server
pub fn build_json(server_url: &str, project: &str, id: u64, body: &[u8]) -> String {
    serde_json::json!({
        "id": id,
        "channel": "STABLE",
        "downloads": {
            "server:default": {
                "name": format!("{}-{}.jar", project, id),
                "url": format!("{}/jars/{}-{}.jar", server_url, project, id),
                "size": body.len(),
                "checksums": { "sha256": sha256(body) }
            }
        }
    })
    .to_string()
}

pub async fn manifest(namespace_dir: &Path) -> Manifest {
    ManifestStore::new(namespace_dir).load().await.unwrap()
}
