//! Shared setup: configuration loading, environment overrides, engine construction.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use tracing::{debug, info, warn};

use pokedata_core::models::config::PokedataConfig;
use pokedata_core::remote::{DebugSink, FileDebugSink, NullDebugSink, PromptBuilder};
use pokedata_core::{
    CardEngine, LayoutModel, LocalExtractor, OpenAiVisionClient, PureOcrEngine, RemoteExtractor,
};

use super::config::default_config_path;

/// The engine used by every command.
pub type Engine = CardEngine<OpenAiVisionClient, PureOcrEngine>;

/// Disables remote extraction when set to `0`, `false` or `off`.
pub const REMOTE_ENV: &str = "POKEDATA_REMOTE_OCR";

/// Overrides the vision model name.
pub const MODEL_ENV: &str = "POKEDATA_OPENAI_MODEL";

/// Load the explicit config file, else the default file if present, else defaults.
pub fn load_config(config_path: Option<&str>) -> anyhow::Result<PokedataConfig> {
    let mut config = match config_path {
        Some(path) => PokedataConfig::from_file(Path::new(path))
            .with_context(|| format!("Failed to read config file {path}"))?,
        None => {
            let default_path = default_config_path();
            if default_path.exists() {
                debug!("Using config file {}", default_path.display());
                PokedataConfig::from_file(&default_path)?
            } else {
                PokedataConfig::default()
            }
        }
    };
    apply_env_overrides(&mut config);
    Ok(config)
}

fn apply_env_overrides(config: &mut PokedataConfig) {
    if let Ok(value) = std::env::var(REMOTE_ENV) {
        if matches!(value.trim().to_lowercase().as_str(), "0" | "false" | "off" | "no") {
            info!("{REMOTE_ENV}={value}, remote extraction disabled");
            config.remote.enabled = false;
        }
    }
    if let Ok(model) = std::env::var(MODEL_ENV) {
        if !model.trim().is_empty() {
            config.remote.model = model.trim().to_string();
        }
    }
}

/// Build the engine. Missing OCR models or API keys degrade, they do not fail.
pub fn build_engine(config: &PokedataConfig, model_dir: Option<PathBuf>) -> anyhow::Result<Engine> {
    let remote = if config.remote.enabled {
        match OpenAiVisionClient::from_config(&config.remote) {
            Ok(client) => {
                info!("Remote extraction via {} at {}", client.model(), config.remote.api_base);
                let prompt = PromptBuilder::default()
                    .with_region_crops(config.remote.send_region_crops)
                    .with_max_output_tokens(config.remote.max_output_tokens);
                let sink: Arc<dyn DebugSink> = if config.debug.persist_payloads {
                    Arc::new(FileDebugSink::new(&config.debug.payload_dir))
                } else {
                    Arc::new(NullDebugSink)
                };
                Some(RemoteExtractor::new(client).with_prompt(prompt).with_debug_sink(sink))
            }
            Err(e) => {
                warn!("Remote extraction unavailable: {}", e);
                None
            }
        }
    } else {
        None
    };

    let recognizer = if config.ocr.enabled {
        let mut ocr = config.ocr.clone();
        if let Some(dir) = model_dir {
            ocr.model_dir = dir;
        }
        match PureOcrEngine::from_config(&ocr) {
            Ok(engine) => Some(engine),
            Err(e) => {
                warn!("Local OCR unavailable: {}", e);
                None
            }
        }
    } else {
        None
    };

    let layout_model = match &config.layout.model_path {
        Some(path) => Some(
            LayoutModel::from_file(path)
                .with_context(|| format!("Failed to load layout model {}", path.display()))?,
        ),
        None => None,
    };

    let local = LocalExtractor::new(recognizer).with_layout_model(layout_model);
    let engine = CardEngine::new(remote, local);
    if !engine.has_remote() && !engine.has_local() {
        warn!("Neither remote nor local extraction is available; records will hold defaults only");
    } else {
        debug!(remote = engine.has_remote(), local = engine.has_local(), "Engine ready");
    }
    Ok(engine)
}

/// Image extensions the commands accept.
pub fn is_card_image(path: &Path) -> bool {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_lowercase();
    matches!(
        ext.as_str(),
        "png" | "jpg" | "jpeg" | "webp" | "tiff" | "tif" | "bmp"
    )
}
