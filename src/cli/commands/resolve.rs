//! Resolve command - fetch an artifact into the cache and print its path

use crate::cli::args::ResolveArgs;
use crate::config::ResolverConfig;
use crate::error::RunTaskResult;
use crate::service::ArtifactService;
use crate::ui::{self, UiContext};
use tracing::debug;

pub async fn execute(args: ResolveArgs, config: &ResolverConfig) -> RunTaskResult<()> {
    let reference = args.source.into_reference()?;
    debug!("Cache root: {}", config.cache_root.display());

    let ctx = UiContext::detect();
    let service = ArtifactService::new(config.clone()).with_reporter(ui::download_reporter(&ctx));
    let path = service.resolve_artifact(&reference).await?;

    if args.json {
        let output = serde_json::json!({
            "key": reference.key().to_string(),
            "provider": reference.provider(),
            "path": path,
        });
        println!("{}", serde_json::to_string_pretty(&output)?);
    } else {
        println!("{}", path.display());
    }
    Ok(())
}
