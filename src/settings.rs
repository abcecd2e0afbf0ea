use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct HookSettings {
    /// Install the global mouse hook. Defaults to `true`.
    #[serde(default = "default_enabled")]
    pub mouse_hook: bool,
    /// Install the global keyboard hook. Defaults to `true`.
    #[serde(default = "default_enabled")]
    pub keyboard_hook: bool,
    /// When enabled the logger is initialised at debug level and honours
    /// `RUST_LOG`.
    #[serde(default)]
    pub debug_logging: bool,
    /// Optional file receiving log output in addition to stderr.
    #[serde(default)]
    pub log_file: Option<PathBuf>,
}

fn default_enabled() -> bool {
    true
}

impl Default for HookSettings {
    fn default() -> Self {
        Self {
            mouse_hook: default_enabled(),
            keyboard_hook: default_enabled(),
            debug_logging: false,
            log_file: None,
        }
    }
}

impl HookSettings {
    /// Reads settings from `path`. A missing or empty file yields defaults.
    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path).unwrap_or_default();
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_json::from_str(&content)?)
    }

    pub fn save(&self, path: impl AsRef<Path>) -> anyhow::Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }
}
