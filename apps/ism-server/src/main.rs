//! ism-server: the demo/reference binary wiring `EngineConfig` loading, logging, and
//! `Engine` together (spec §10.6). Grounded on the teacher's `hyperspot-server`
//! CLI shape (`clap`-derived args, `--config`/`--print-config`/`-v`), with the
//! HTTP/axum server loop dropped in favour of the engine's own dispatch loop.

use anyhow::{Context, Result};
use clap::Parser;
use ism_runtime::EngineConfig;
use std::path::PathBuf;

/// Extensible action scheduler demo server.
#[derive(Parser)]
#[command(name = "ism-server")]
#[command(about = "Runs the action scheduler engine against a configuration file")]
#[command(version)]
struct Cli {
    /// Path to a YAML configuration file. Falls back to built-in defaults when absent.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Overrides `runtime.tag` from the configuration.
    #[arg(short, long)]
    tag: Option<String>,

    /// Print the effective configuration as YAML and exit.
    #[arg(long)]
    print_config: bool,

    /// Increase log verbosity (-v, -vv); overrides `logging.level`.
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn apply_verbosity(mut config: EngineConfig, verbose: u8) -> EngineConfig {
    if verbose == 0 {
        return config;
    }
    // No TRACE level in the closed logging taxonomy (spec §6); any -v beyond the first
    // just pins the level at DEBUG, the most detailed level available.
    let level = "DEBUG".to_string();
    match &mut config.logging {
        Some(logging) => logging.level = level,
        None => {
            config.logging = Some(ism_runtime::LoggingConfig {
                level,
                file: None,
                propagate: true,
            })
        }
    }
    config
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = EngineConfig::load_or_default(cli.config.as_deref())
        .context("failed to load engine configuration")?;
    let config = apply_verbosity(config, cli.verbose);

    if cli.print_config {
        println!("{}", serde_yaml::to_string(&config)?);
        return Ok(());
    }

    let engine = ism_engine::Engine::new(config, cli.tag, None)
        .await
        .context("failed to construct engine")?;

    tracing::info!(tag = %engine.get_tag(), run_dir = %engine.run_dir().display(), "ism-server starting");

    engine.start(true).await.context("engine dispatch loop failed")?;

    if let Some(err) = engine.last_error().await {
        anyhow::bail!("engine terminated with error: {err}");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verbosity_zero_leaves_config_untouched() {
        let config = EngineConfig::default();
        let original_level = config.logging.as_ref().unwrap().level.clone();
        let config = apply_verbosity(config, 0);
        assert_eq!(config.logging.unwrap().level, original_level);
    }

    #[test]
    fn verbosity_one_sets_debug() {
        let config = apply_verbosity(EngineConfig::default(), 1);
        assert_eq!(config.logging.unwrap().level, "DEBUG");
    }
}
