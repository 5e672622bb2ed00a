//! GitHub release assets

use crate::error::RunTaskResult;
use crate::manifest::{bucket_key, sanitize_segment, Namespace};
use crate::provider::fetch::{self, FetchPlan};
use crate::provider::{join_url, ResolveContext};
use std::path::PathBuf;

pub(crate) async fn resolve(
    ctx: &ResolveContext<'_>,
    owner: &str,
    repo: &str,
    tag: &str,
    asset: &str,
) -> RunTaskResult<PathBuf> {
    let namespace = Namespace::new(&["github"])?;
    let mut txn = fetch::open(ctx, &namespace).await?;

    let url = join_url(
        &ctx.config.endpoints.github,
        &[owner, repo, "releases", "download", tag, asset],
    )?;
    let file_name = sanitize_segment(asset)?;

    let plan = FetchPlan::new(
        bucket_key(&[owner, repo, tag])?,
        file_name.clone(),
        file_name,
        url,
        format!("{}/{} {} {}", owner, repo, tag, asset),
    );
    fetch::resolve_mutable(ctx, &mut txn, &plan).await
}
