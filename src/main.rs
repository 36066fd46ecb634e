mod collect;
mod config;
mod error;
mod loader;
mod platform;
mod table;

use std::path::Path;

use anyhow::{Context, Result};
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::collect::{Collector, LimitPolicy};
use crate::config::Config;
use crate::platform::{Platform, RedditApi, TwitterApi};

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    let args: Vec<String> = std::env::args().collect();

    if args.len() > 2 {
        eprintln!("Usage: social_collector [config.json]");
        std::process::exit(1);
    }

    let config = config::load(args.get(1).map(Path::new))?;

    info!("Collector started");

    for &platform in &config.platforms {
        collect_and_save(&config, platform)
            .await
            .with_context(|| format!("{platform} collection failed"))?;
    }

    info!("Collector finished");

    Ok(())
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// One collect-and-save cycle for `platform`.
async fn collect_and_save(config: &Config, platform: Platform) -> Result<usize> {
    // Both files are read before any network call.
    let credentials = loader::load_credentials(&config.root, platform)?;
    let accounts = loader::load_accounts(&config.root, platform)?;

    let settings = config.api(platform);
    let policy = LimitPolicy::from_config(config, settings.start_limit);
    let timeout = config.request_timeout();

    info!("{platform}: following {} accounts", accounts.len());

    let new_rows = match platform {
        Platform::Reddit => {
            let api = RedditApi::authenticate(&credentials, settings, timeout).await?;
            Collector::new(api, policy).collect_all(&accounts).await?
        }
        Platform::Twitter => {
            let api = TwitterApi::authenticate(&credentials, settings, timeout).await?;
            Collector::new(api, policy).collect_all(&accounts).await?
        }
    };

    let path = platform.table_path(&config.root);
    let total = table::persist(&new_rows, &path)?;

    info!(
        "{platform}: collected {} rows, {} in {}",
        new_rows.len(),
        total,
        path.display()
    );

    Ok(total)
}
