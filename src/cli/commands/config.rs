//! Config command - show or initialize configuration

use crate::cli::args::{ConfigAction, ConfigArgs};
use crate::config::{pretty_duration, Config, ConfigManager, ResolverConfig};
use crate::error::RunTaskResult;
use crate::ui::{self, UiContext};

pub async fn execute(
    args: ConfigArgs,
    manager: &ConfigManager,
    config: &Config,
    resolved: &ResolverConfig,
) -> RunTaskResult<()> {
    match args.action {
        None | Some(ConfigAction::Show) => show_config(config, resolved)?,
        Some(ConfigAction::Path) => println!("{}", manager.path().display()),
        Some(ConfigAction::Init { force }) => init_config(manager, force).await?,
    }
    Ok(())
}

fn show_config(config: &Config, resolved: &ResolverConfig) -> RunTaskResult<()> {
    println!("{}", toml::to_string_pretty(config)?);

    let ctx = UiContext::detect();
    ui::section(&ctx, "# Effective settings");
    ui::key_value(&ctx, "cache root", &resolved.cache_root.display().to_string());
    ui::key_value(&ctx, "offline", &resolved.offline.to_string());
    ui::key_value(&ctx, "refresh", &resolved.refresh.to_string());
    ui::key_value(&ctx, "recheck interval", &pretty_duration(resolved.recheck_interval));
    ui::key_value(
        &ctx,
        "revalidate interval",
        &pretty_duration(resolved.revalidate_interval),
    );
    Ok(())
}

async fn init_config(manager: &ConfigManager, force: bool) -> RunTaskResult<()> {
    let ctx = UiContext::detect();
    let path = manager.path();

    if path.exists() && !force {
        ui::step_warn(
            &ctx,
            &format!("Config already exists at {} (use --force to overwrite)", path.display()),
        );
        return Ok(());
    }

    manager.save(&Config::default()).await?;
    ui::step_ok_detail(&ctx, "Configuration initialized", &path.display().to_string());
    Ok(())
}
