//! Configuration loading.
//!
//! Loads `campaigner.toml` (or `$CAMPAIGNER_CONFIG_PATH`). Every section has
//! defaults, so a missing or empty file is valid.
//!
//! Precedence: env vars > config file > defaults.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use url::Url;

use crate::chart::ChartOptions;
use crate::pipeline::BrandPolicy;
use crate::prompts::WarehouseHints;

/// Default config filename in the working directory.
pub const DEFAULT_CONFIG_FILE: &str = "campaigner.toml";

// ── Top-level config ────────────────────────────────────────────

/// Top-level configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Brand scope and response language.
    pub brand: BrandConfig,
    /// Model endpoint used by the specialists.
    pub model: ModelConfig,
    /// Data warehouse hints and optional fixture.
    pub data: DataConfig,
    /// Chart layout.
    pub charts: ChartsConfig,
    /// Artifact output.
    pub artifacts: ArtifactsConfig,
}

impl Config {
    /// Load with precedence env vars > TOML file > defaults.
    ///
    /// `explicit` wins over `$CAMPAIGNER_CONFIG_PATH`. A missing file at the
    /// default location yields defaults; a missing explicit file is an error.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        Self::load_with(explicit, |key| std::env::var(key).ok())
    }

    /// [`Config::load`] with an injectable environment resolver.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load_with(
        explicit: Option<&Path>,
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<Self> {
        let (path, required) = match explicit {
            Some(p) => (p.to_path_buf(), true),
            None => match env("CAMPAIGNER_CONFIG_PATH") {
                Some(p) => (PathBuf::from(p), true),
                None => (PathBuf::from(DEFAULT_CONFIG_FILE), false),
            },
        };

        let mut config = match std::fs::read_to_string(&path) {
            Ok(contents) => {
                tracing::info!(path = %path.display(), "loading config from file");
                Self::from_toml(&contents)
                    .with_context(|| format!("invalid config at {}", path.display()))?
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound && !required => {
                tracing::debug!("no config file found, using defaults");
                Self::default()
            }
            Err(e) => {
                return Err(e).with_context(|| format!("failed to read config at {}", path.display()))
            }
        };
        config.apply_overrides(env);
        config.validate()?;
        Ok(config)
    }

    /// Parse a TOML string.
    ///
    /// # Errors
    ///
    /// Returns an error on invalid TOML or mistyped values.
    pub fn from_toml(toml_str: &str) -> Result<Self> {
        toml::from_str(toml_str).context("failed to parse config TOML")
    }

    /// Apply environment variable overrides.
    ///
    /// Takes a resolver function so tests never touch the process environment.
    pub fn apply_overrides(&mut self, env: impl Fn(&str) -> Option<String>) {
        if let Some(v) = env("VERTEX_MODEL") {
            self.model.model = v;
        }
        if let Some(v) = env("CAMPAIGNER_MODEL_BASE_URL") {
            self.model.base_url = v;
        }
        if let Some(v) = env("GOOGLE_CLOUD_PROJECT") {
            self.data.project = v;
        }
        if let Some(v) = env("BQ_LOCATION") {
            self.data.location = v;
        }
        if let Some(v) = env("CAMPAIGNER_ARTIFACTS_DIR") {
            self.artifacts.dir = PathBuf::from(v);
        }
        if let Some(v) = env("CAMPAIGNER_LANGUAGE") {
            self.brand.language = v;
        }
    }

    /// Reject values that would only fail later, mid-request.
    ///
    /// # Errors
    ///
    /// Returns an error for a non-http(s) model URL, an empty default brand
    /// or a zero chart dimension.
    pub fn validate(&self) -> Result<()> {
        let url = Url::parse(&self.model.base_url)
            .with_context(|| format!("invalid model.base_url {:?}", self.model.base_url))?;
        if !matches!(url.scheme(), "http" | "https") {
            bail!("model.base_url must be http or https, got {}", url.scheme());
        }
        if self.brand.default.trim().is_empty() {
            bail!("brand.default must not be empty");
        }
        if self.charts.max_categories == 0 || self.charts.width == 0 || self.charts.height == 0 {
            bail!("charts.max_categories, width and height must be positive");
        }
        Ok(())
    }

    /// Brand policy for the pipeline.
    pub fn brand_policy(&self) -> BrandPolicy {
        BrandPolicy {
            default_brand: self.brand.default.clone(),
            aliases: self.brand.aliases.clone(),
            language: self.brand.language.clone(),
        }
    }

    /// Renderer options.
    pub fn chart_options(&self) -> ChartOptions {
        ChartOptions {
            max_categories: self.charts.max_categories,
            width: self.charts.width,
            height: self.charts.height,
        }
    }

    /// Hints for the data specialist.
    pub fn warehouse_hints(&self) -> WarehouseHints {
        WarehouseHints {
            project: self.data.project.clone(),
            dataset: self.data.dataset.clone(),
            location: self.data.location.clone(),
        }
    }
}

// ── Sections ────────────────────────────────────────────────────

/// `[brand]`: default brand lock and language.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BrandConfig {
    /// Brand every request is locked to unless another is named.
    pub default: String,
    /// Other spellings of the default brand.
    pub aliases: Vec<String>,
    /// Response language code.
    pub language: String,
}

impl Default for BrandConfig {
    fn default() -> Self {
        Self {
            default: "תמי4 (Tami4)".to_owned(),
            aliases: vec!["תמי4".to_owned(), "Tami4".to_owned(), "tami 4".to_owned()],
            language: "he".to_owned(),
        }
    }
}

/// `[model]`: OpenAI-compatible endpoint.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    /// Base URL, without `/chat/completions`.
    pub base_url: String,
    /// Model identifier.
    pub model: String,
    /// Environment variable holding the API key.
    pub api_key_env: String,
    /// Maximum tokens per specialist response.
    pub max_tokens: u32,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.openai.com/v1".to_owned(),
            model: "gemini-2.5-flash".to_owned(),
            api_key_env: "CAMPAIGNER_API_KEY".to_owned(),
            max_tokens: 4096,
        }
    }
}

impl ModelConfig {
    /// Read the API key named by `api_key_env`.
    pub fn api_key(&self, env: impl Fn(&str) -> Option<String>) -> Option<String> {
        env(&self.api_key_env).filter(|k| !k.trim().is_empty())
    }
}

/// `[data]`: warehouse hints, or a fixture file that replaces the backend.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DataConfig {
    /// Cloud project.
    pub project: String,
    /// Dataset.
    pub dataset: String,
    /// Query location.
    pub location: String,
    /// JSON file served as the data capability's result.
    pub fixture: Option<PathBuf>,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            project: "tami4-471706".to_owned(),
            dataset: "MARTS".to_owned(),
            location: "US".to_owned(),
            fixture: None,
        }
    }
}

/// `[charts]`: renderer layout.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ChartsConfig {
    /// Category count above which the comparison chart is truncated.
    pub max_categories: usize,
    /// Canvas width in pixels.
    pub width: u32,
    /// Canvas height in pixels.
    pub height: u32,
}

impl Default for ChartsConfig {
    fn default() -> Self {
        let options = ChartOptions::default();
        Self {
            max_categories: options.max_categories,
            width: options.width,
            height: options.height,
        }
    }
}

/// `[artifacts]`: where chart files are written.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ArtifactsConfig {
    /// Root directory; each request gets a subdirectory.
    pub dir: PathBuf,
}

impl Default for ArtifactsConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("artifacts"),
        }
    }
}
