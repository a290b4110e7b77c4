use anyhow::Result;
use pronlex::config::{Config, DEFAULT_CONFIG_FILE};
use std::path::PathBuf;

pub async fn init_config(path: PathBuf) -> Result<()> {
    let config_path = if path.extension().is_some_and(|ext| ext == "toml") {
        path
    } else {
        path.join(DEFAULT_CONFIG_FILE)
    };

    if config_path.exists() {
        anyhow::bail!(
            "Configuration file already exists: {}",
            config_path.display()
        );
    }

    let config = Config::default();
    config.save(&config_path)?;
    println!("Created configuration file: {}", config_path.display());

    println!("\nConfigured sources:");
    for source in &config.sources {
        println!("  {:<12} {}", source.name, source.document.display());
    }
    println!("\nPlace the documents at the paths above, then run:");
    println!("  pronlex -c {} run-all", config_path.display());

    Ok(())
}
