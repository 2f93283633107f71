//! Config command - inspect and edit the configuration file.

use std::fs;
use std::path::PathBuf;

use clap::{Args, Subcommand};
use console::style;
use serde_json::Value;

use pokedata_core::models::config::PokedataConfig;

use super::pipeline::load_config;

/// Arguments for the config command.
#[derive(Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    command: ConfigCommand,
}

#[derive(Subcommand)]
enum ConfigCommand {
    /// Show the configuration (file values, or defaults)
    Show {
        /// Include environment overrides
        #[arg(long)]
        effective: bool,
    },

    /// Write a configuration file with default values
    Init {
        /// Output path for configuration file
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Overwrite existing file
        #[arg(long)]
        force: bool,
    },

    /// Print one value by dotted key
    Get {
        /// Configuration key (e.g., "remote.confidence_threshold")
        key: String,
    },

    /// Change one value by dotted key
    Set {
        /// Configuration key
        key: String,
        /// New value (parsed as JSON, else taken as a string)
        value: String,
    },

    /// Show configuration file path
    Path,
}

/// The file the config command reads and writes.
struct ConfigFile {
    path: PathBuf,
}

impl ConfigFile {
    fn locate(explicit: Option<&str>) -> Self {
        Self {
            path: explicit.map(PathBuf::from).unwrap_or_else(default_config_path),
        }
    }

    fn load_or_default(&self) -> anyhow::Result<PokedataConfig> {
        if self.path.exists() {
            Ok(PokedataConfig::from_file(&self.path)?)
        } else {
            Ok(PokedataConfig::default())
        }
    }

    fn save(&self, config: &PokedataConfig) -> anyhow::Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        config.save(&self.path)?;
        Ok(())
    }
}

pub async fn run(args: ConfigArgs, config_path: Option<&str>) -> anyhow::Result<()> {
    let file = ConfigFile::locate(config_path);
    match args.command {
        ConfigCommand::Show { effective } => show_config(&file, config_path, effective),
        ConfigCommand::Init { output, force } => {
            let target = output.map(|path| ConfigFile { path }).unwrap_or(file);
            init_config(&target, force)
        }
        ConfigCommand::Get { key } => get_config(&file, &key),
        ConfigCommand::Set { key, value } => set_config(&file, &key, &value),
        ConfigCommand::Path => show_path(&file),
    }
}

/// `<platform config dir>/pokedata/config.json`.
pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("pokedata")
        .join("config.json")
}

fn show_config(file: &ConfigFile, config_path: Option<&str>, effective: bool) -> anyhow::Result<()> {
    let config = if effective {
        load_config(config_path)?
    } else {
        if !file.path.exists() {
            eprintln!("{} No config file found, showing defaults.", style("ℹ").blue());
        }
        file.load_or_default()?
    };

    println!("{}", serde_json::to_string_pretty(&config)?);
    Ok(())
}

fn init_config(file: &ConfigFile, force: bool) -> anyhow::Result<()> {
    if file.path.exists() && !force {
        anyhow::bail!(
            "Config file already exists at {}. Use --force to overwrite.",
            file.path.display()
        );
    }

    file.save(&PokedataConfig::default())?;
    println!(
        "{} Created configuration file at {}",
        style("✓").green(),
        file.path.display()
    );
    Ok(())
}

fn get_config(file: &ConfigFile, key: &str) -> anyhow::Result<()> {
    let json = serde_json::to_value(file.load_or_default()?)?;
    let value = key
        .split('.')
        .try_fold(&json, |node, part| node.get(part))
        .ok_or_else(|| anyhow::anyhow!("Configuration key not found: {}", key))?;

    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn set_config(file: &ConfigFile, key: &str, raw: &str) -> anyhow::Result<()> {
    let mut json = serde_json::to_value(file.load_or_default()?)?;
    let value: Value =
        serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()));

    let (parents, leaf) = match key.rsplit_once('.') {
        Some((parents, leaf)) => (Some(parents), leaf),
        None => (None, key),
    };
    let parent = match parents {
        Some(parents) => parents
            .split('.')
            .try_fold(&mut json, |node, part| node.get_mut(part)),
        None => Some(&mut json),
    };
    let slot = parent
        .and_then(Value::as_object_mut)
        .and_then(|obj| obj.get_mut(leaf))
        .ok_or_else(|| anyhow::anyhow!("Configuration key not found: {}", key))?;
    *slot = value.clone();

    // Round-trip through the typed config so bad values never reach the file.
    let config: PokedataConfig = serde_json::from_value(json)
        .map_err(|e| anyhow::anyhow!("Invalid value for {}: {}", key, e))?;
    validate(&config)?;
    file.save(&config)?;

    println!(
        "{} Set {} = {}",
        style("✓").green(),
        key,
        serde_json::to_string(&value)?
    );
    Ok(())
}

fn validate(config: &PokedataConfig) -> anyhow::Result<()> {
    for (name, value) in [
        ("remote.confidence_threshold", config.remote.confidence_threshold),
        ("remote.unknown_confidence", config.remote.unknown_confidence),
    ] {
        if !(0.0..=1.0).contains(&value) {
            anyhow::bail!("{} must be between 0 and 1, got {}", name, value);
        }
    }
    if config.remote.timeout_secs == 0 {
        anyhow::bail!("remote.timeout_secs must be positive");
    }
    Ok(())
}

fn show_path(file: &ConfigFile) -> anyhow::Result<()> {
    println!("Configuration file: {}", file.path.display());

    if file.path.exists() {
        println!("Status: {}", style("exists").green());
    } else {
        println!("Status: {}", style("not created").yellow());
        println!();
        println!("Run 'pokedata config init' to create a configuration file.");
    }
    Ok(())
}
