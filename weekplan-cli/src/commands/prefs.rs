use anyhow::Result;
use clap::ValueEnum;

use weekplan_cli::cache::LocalCache;
use weekplan_cli::config::CliConfig;

#[derive(Clone, Copy, ValueEnum)]
pub enum Toggle {
    On,
    Off,
}

/// Show or set whether `weekplan status --watch` rings when an item starts.
pub fn chime(config: &CliConfig, toggle: Option<Toggle>) -> Result<()> {
    let cache = LocalCache::new(config.cache_dir()?);
    let mut preferences = cache.load_preferences()?;

    if let Some(toggle) = toggle {
        preferences.chime_enabled = matches!(toggle, Toggle::On);
        cache.store_preferences(&preferences)?;
    }

    let state = if preferences.chime_enabled { "on" } else { "off" };
    println!("Chime is {}", state);
    Ok(())
}
