//! Hangar plugin downloads

use crate::error::RunTaskResult;
use crate::manifest::{bucket_key, sanitize_segment, Namespace};
use crate::provider::fetch::{self, FetchPlan};
use crate::provider::{host_of, join_url, ResolveContext};
use std::path::PathBuf;

pub(crate) async fn resolve(
    ctx: &ResolveContext<'_>,
    base_url: Option<&str>,
    plugin: &str,
    version: &str,
    platform: &str,
) -> RunTaskResult<PathBuf> {
    let base = base_url.unwrap_or(&ctx.config.endpoints.hangar);
    let namespace = Namespace::new(&["hangar".to_string(), host_of(base)?])?;
    let mut txn = fetch::open(ctx, &namespace).await?;

    let platform_upper = platform.to_ascii_uppercase();
    let url = join_url(
        base,
        &[
            "api",
            "v1",
            "projects",
            plugin,
            "versions",
            version,
            &platform_upper,
            "download",
        ],
    )?;
    let file_name = sanitize_segment(&format!("{}-{}.jar", plugin, version))?;
    let bucket = bucket_key(&[plugin, &platform.to_ascii_lowercase(), version])?;

    let plan = FetchPlan::new(
        bucket,
        file_name.clone(),
        file_name,
        url,
        format!("{} {} ({})", plugin, version, platform_upper),
    );
    fetch::resolve_mutable(ctx, &mut txn, &plan).await
}
