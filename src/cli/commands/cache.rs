//! Cache command - inspect or clear the artifact cache

use crate::cli::args::{CacheAction, CacheArgs};
use crate::config::ResolverConfig;
use crate::download::format_size;
use crate::error::RunTaskResult;
use crate::manifest::Namespace;
use crate::service::{ArtifactService, CachedArtifact};
use crate::ui::{self, UiContext};
use chrono::{DateTime, Utc};
use console::style;

pub async fn execute(args: CacheArgs, config: &ResolverConfig) -> RunTaskResult<()> {
    let service = ArtifactService::new(config.clone());

    match args.action {
        CacheAction::Path => {
            println!("{}", config.cache_root.display());
            Ok(())
        }
        CacheAction::List { json } => list_artifacts(&service, json).await,
        CacheAction::Clear { namespace, yes } => {
            clear_cache(&service, namespace.as_deref(), yes).await
        }
    }
}

async fn list_artifacts(service: &ArtifactService, json: bool) -> RunTaskResult<()> {
    let artifacts = service.list().await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&artifacts)?);
        return Ok(());
    }

    if artifacts.is_empty() {
        println!("No cached artifacts.");
        return Ok(());
    }

    print_table(&artifacts);
    Ok(())
}

fn print_table(artifacts: &[CachedArtifact]) {
    println!(
        "{:<28} {:<28} {:<36} {:>10} {:<7} {:<16}",
        "NAMESPACE", "BUCKET", "FILE", "SIZE", "PINNED", "CHECKED"
    );
    println!("{}", "-".repeat(130));

    let mut total = 0;
    for artifact in artifacts {
        let size = match artifact.size {
            Some(bytes) => {
                total += bytes;
                format_size(bytes)
            }
            None => style("missing").red().to_string(),
        };
        let pinned = if artifact.pinned { "yes" } else { "no" };

        println!(
            "{:<28} {:<28} {:<36} {:>10} {:<7} {:<16}",
            artifact.namespace,
            artifact.bucket,
            artifact.file_name,
            size,
            pinned,
            checked_at(artifact.last_checked)
        );
    }

    println!();
    println!(
        "Total: {} artifact(s), {}",
        artifacts.len(),
        format_size(total)
    );
}

fn checked_at(millis: i64) -> String {
    DateTime::<Utc>::from_timestamp_millis(millis)
        .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|| "-".to_string())
}

async fn clear_cache(
    service: &ArtifactService,
    namespace: Option<&str>,
    yes: bool,
) -> RunTaskResult<()> {
    let ctx = UiContext::detect().with_auto_yes(yes);
    let namespace = namespace.map(Namespace::parse).transpose()?;

    let target = match &namespace {
        Some(ns) => format!("namespace '{}'", ns),
        None => format!("the whole cache at {}", service.config().cache_root.display()),
    };

    // Without a terminal the prompt cannot be answered, so --yes is required
    if !ui::confirm(&ctx, &format!("Delete {} (pinned files included)?", target), false).await? {
        ui::step_warn(&ctx, "Aborted, nothing was deleted. Pass --yes to skip confirmation.");
        return Ok(());
    }

    if service.clear(namespace.as_ref()).await? {
        ui::step_ok(&ctx, &format!("Cleared {}", target));
    } else {
        ui::step_warn(&ctx, &format!("Nothing to clear for {}", target));
    }
    Ok(())
}
