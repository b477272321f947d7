//! Configuration – reads/writes `~/.recall/config.toml`.
//!
//! Every field has a default, so a missing file or a partial file is fine.
//! Environment variables (including those loaded from `.env`) win over the
//! file; see [`apply_env_overrides`].

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Persisted user configuration stored in `~/.recall/config.toml`.
#[derive(Clone, Serialize, Deserialize)]
pub struct Config {
    /// Location of the JSON memory store.
    #[serde(default = "default_memory_path")]
    pub memory_path: PathBuf,

    /// Base URL of the OpenAI-compatible API.
    #[serde(default = "default_llm_base_url")]
    pub llm_base_url: String,

    /// Model name sent with every request.
    #[serde(default = "default_model")]
    pub model: String,

    /// API key (stored as plain text; the file is written owner-only).
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub api_key: String,

    /// How many ranked memories lead the reply context.
    #[serde(default = "default_top_k")]
    pub top_k: usize,

    /// Minimum similarity for a ranked memory.
    #[serde(default)]
    pub min_score: f64,

    /// Trailing history messages included in the LLM prompt.
    #[serde(default = "default_history_window")]
    pub history_window: usize,
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("memory_path", &self.memory_path)
            .field("llm_base_url", &self.llm_base_url)
            .field("model", &self.model)
            .field(
                "api_key",
                if self.api_key.is_empty() { &"<not set>" } else { &"<redacted>" },
            )
            .field("top_k", &self.top_k)
            .field("min_score", &self.min_score)
            .field("history_window", &self.history_window)
            .finish()
    }
}

fn default_memory_path() -> PathBuf {
    PathBuf::from("memories.json")
}
fn default_llm_base_url() -> String {
    "https://api.x.ai/v1".to_string()
}
fn default_model() -> String {
    "grok-2-latest".to_string()
}
fn default_top_k() -> usize {
    5
}
fn default_history_window() -> usize {
    8
}

impl Default for Config {
    fn default() -> Self {
        Self {
            memory_path: default_memory_path(),
            llm_base_url: default_llm_base_url(),
            model: default_model(),
            api_key: String::new(),
            top_k: default_top_k(),
            min_score: 0.0,
            history_window: default_history_window(),
        }
    }
}

impl Config {
    /// The API key, if one is configured.
    pub fn api_key(&self) -> Option<String> {
        let key = self.api_key.trim();
        (!key.is_empty()).then(|| key.to_string())
    }
}

/// Return the path to `~/.recall/config.toml`.
pub fn config_path() -> PathBuf {
    config_path_for_home(
        &std::env::var("HOME")
            .or_else(|_| std::env::var("USERPROFILE"))
            .unwrap_or_else(|_| ".".to_string()),
    )
}

/// Build the config path relative to the given home directory.
pub(crate) fn config_path_for_home(home: &str) -> PathBuf {
    PathBuf::from(home).join(".recall").join("config.toml")
}

/// The effective configuration: file (or defaults) plus environment.
///
/// A malformed file is reported as an error alongside the defaults so the
/// caller can warn and keep going.
pub fn resolve() -> (Config, Option<String>) {
    let (mut cfg, error) = match load_from(&config_path()) {
        Ok(Some(cfg)) => (cfg, None),
        Ok(None) => (Config::default(), None),
        Err(e) => (Config::default(), Some(e)),
    };
    apply_env_overrides(&mut cfg);
    (cfg, error)
}

/// Load the config from a specific path.  `None` if the file does not exist.
pub(crate) fn load_from(path: &Path) -> Result<Option<Config>, String> {
    if !path.exists() {
        return Ok(None);
    }
    let raw = fs::read_to_string(path)
        .map_err(|e| format!("Failed to read config at {}: {}", path.display(), e))?;
    let cfg: Config = toml::from_str(&raw)
        .map_err(|e| format!("Failed to parse config at {}: {}", path.display(), e))?;
    Ok(Some(cfg))
}

fn non_empty_env(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Apply environment variable overrides to `cfg`.
///
/// | Variable | Config field |
/// |---|---|
/// | `GROK_API_KEY`, then `OPENAI_API_KEY` | `api_key` |
/// | `GROK_MODEL`, then `OPENAI_MODEL` | `model` |
/// | `LLM_BASE_URL` | `llm_base_url` |
/// | `RECALL_MEMORY_PATH` | `memory_path` |
/// | `RECALL_TOP_K` | `top_k` |
/// | `RECALL_MIN_SCORE` | `min_score` |
///
/// Empty values and unparseable numbers are ignored.
pub fn apply_env_overrides(cfg: &mut Config) {
    if let Some(key) = non_empty_env("GROK_API_KEY").or_else(|| non_empty_env("OPENAI_API_KEY")) {
        cfg.api_key = key;
    }
    if let Some(model) = non_empty_env("GROK_MODEL").or_else(|| non_empty_env("OPENAI_MODEL")) {
        cfg.model = model;
    }
    if let Some(url) = non_empty_env("LLM_BASE_URL") {
        cfg.llm_base_url = url.trim_end_matches('/').to_string();
    }
    if let Some(path) = non_empty_env("RECALL_MEMORY_PATH") {
        cfg.memory_path = PathBuf::from(path);
    }
    if let Some(v) = non_empty_env("RECALL_TOP_K")
        && let Ok(top_k) = v.parse::<usize>()
    {
        cfg.top_k = top_k;
    }
    if let Some(v) = non_empty_env("RECALL_MIN_SCORE")
        && let Ok(min_score) = v.parse::<f64>()
        && min_score.is_finite()
    {
        cfg.min_score = min_score;
    }
}

/// Save the config to disk, creating `~/.recall/` if necessary.
pub fn save(cfg: &Config) -> Result<(), String> {
    save_to(cfg, &config_path())
}

/// Save the config to a specific path.
pub(crate) fn save_to(cfg: &Config, path: &Path) -> Result<(), String> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .map_err(|e| format!("Failed to create config directory: {}", e))?;
        // Owner-only directory (rwx------) on Unix.
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(parent, fs::Permissions::from_mode(0o700))
                .map_err(|e| format!("Failed to set config directory permissions: {}", e))?;
        }
    }
    let raw = toml::to_string_pretty(cfg)
        .map_err(|e| format!("Failed to serialize config: {}", e))?;
    // Owner-only file (rw-------) on Unix.
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        fs::OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .mode(0o600)
            .open(path)
            .and_then(|mut f| {
                use std::io::Write;
                f.write_all(raw.as_bytes())
            })
            .map_err(|e| format!("Failed to write config at {}: {}", path.display(), e))?;
    }
    #[cfg(not(unix))]
    fs::write(path, raw)
        .map_err(|e| format!("Failed to write config at {}: {}", path.display(), e))?;
    Ok(())
}
