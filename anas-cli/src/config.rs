//! Layered CLI configuration: defaults, then the TOML file, then the
//! environment, then command-line flags.

use crate::cli::CallArgs;
use anas_live::{LiveConfig, Locale, VoiceProfile};
use anyhow::{Context, Result, bail};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Settings read from `config.toml`. Every key is optional.
#[derive(Debug, Default, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct FileConfig {
    pub api_key: Option<String>,
    pub model: Option<String>,
    pub endpoint: Option<String>,
    pub voice: Option<VoiceProfile>,
    pub locale: Option<Locale>,
    pub instruction: Option<String>,
    pub frame_samples: Option<usize>,
    pub dismiss_delay_ms: Option<u64>,
}

impl FileConfig {
    pub fn parse(text: &str) -> Result<Self> {
        toml::from_str(text).context("invalid configuration file")
    }

    /// Load `explicit` if given (it must exist), otherwise the default file
    /// if there is one.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let path = match explicit {
            Some(path) => path.to_path_buf(),
            None => match default_config_path() {
                Some(path) if path.exists() => path,
                _ => return Ok(Self::default()),
            },
        };
        let text = std::fs::read_to_string(&path)
            .with_context(|| format!("cannot read {}", path.display()))?;
        tracing::debug!(path = %path.display(), "Loaded configuration file");
        Self::parse(&text).with_context(|| format!("in {}", path.display()))
    }
}

/// `$CONFIG_DIR/anas/config.toml`.
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("anas").join("config.toml"))
}

/// Values taken from environment variables.
#[derive(Debug, Default, Clone)]
pub struct EnvConfig {
    pub api_key: Option<String>,
    pub model: Option<String>,
}

impl EnvConfig {
    /// Read `GOOGLE_API_KEY` (or `GEMINI_API_KEY`) and `ANAS_MODEL`.
    pub fn from_env() -> Self {
        let var = |name: &str| std::env::var(name).ok().filter(|v| !v.trim().is_empty());
        Self {
            api_key: var("GOOGLE_API_KEY").or_else(|| var("GEMINI_API_KEY")),
            model: var("ANAS_MODEL"),
        }
    }
}

/// Everything `anas call` needs to place a call.
#[derive(Debug)]
pub struct CallSettings {
    pub config: LiveConfig,
    pub voice: VoiceProfile,
    pub start_muted: bool,
}

/// Merge the layers, later ones winning.
pub fn resolve(file: FileConfig, env: EnvConfig, args: &CallArgs) -> Result<CallSettings> {
    let Some(api_key) = env.api_key.or(file.api_key) else {
        bail!("no API key: set GOOGLE_API_KEY or GEMINI_API_KEY, or api_key in the config file");
    };

    let mut config = LiveConfig::new(api_key);
    if let Some(model) = args.model.clone().or(env.model).or(file.model) {
        config = config.with_model(model);
    }
    if let Some(endpoint) = file.endpoint {
        config = config.with_endpoint(endpoint);
    }
    if let Some(instruction) = file.instruction {
        config = config.with_instruction(instruction);
    }
    if let Some(frame_samples) = file.frame_samples {
        config = config.with_frame_samples(frame_samples);
    }
    if let Some(ms) = file.dismiss_delay_ms {
        config = config.with_dismiss_delay(Duration::from_millis(ms));
    }
    if let Some(locale) = args.locale.or(file.locale) {
        config = config.with_locale(locale);
    }
    config.validate()?;

    Ok(CallSettings {
        config,
        voice: args.voice.or(file.voice).unwrap_or_default(),
        start_muted: args.muted,
    })
}
