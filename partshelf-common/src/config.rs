//! Configuration loading and config file resolution

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Service TOML configuration (`~/.config/partshelf/<service>.toml`)
///
/// All fields optional; absent fields fall back to environment variables
/// or compiled defaults at the resolution site.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TomlConfig {
    /// Credential for the hosted AI backend (transcription + extraction)
    pub ai_api_key: Option<String>,
    /// Base URL of the OpenAI-compatible API (default: https://api.openai.com/v1)
    pub api_base: Option<String>,
    /// Speech-to-text model name (default: whisper-1)
    pub transcription_model: Option<String>,
    /// Multimodal extraction model name (default: gpt-4o-mini)
    pub extraction_model: Option<String>,
}

/// Resolve the config file path for a service, following the priority order:
/// 1. `PARTSHELF_CONFIG` environment variable (highest priority)
/// 2. Per-user config directory (`~/.config/partshelf/<service>.toml` on Linux)
/// 3. System config (`/etc/partshelf/<service>.toml`, Linux only)
///
/// Returns the first path that exists, or the per-user path (which may not
/// exist yet) so callers can report where configuration is expected.
pub fn config_file_path(service: &str) -> PathBuf {
    if let Ok(path) = std::env::var("PARTSHELF_CONFIG") {
        return PathBuf::from(path);
    }

    let file_name = format!("{}.toml", service);

    let user_config = dirs::config_dir().map(|d| d.join("partshelf").join(&file_name));

    if cfg!(target_os = "linux") {
        if let Some(path) = &user_config {
            if path.exists() {
                return path.clone();
            }
        }
        let system_config = PathBuf::from("/etc/partshelf").join(&file_name);
        if system_config.exists() {
            return system_config;
        }
    }

    user_config.unwrap_or_else(|| PathBuf::from(format!("./{}", file_name)))
}

/// Load a service's TOML configuration, if the file exists.
///
/// A missing file is not an error (all settings have env/default fallbacks);
/// an unreadable or malformed file is.
pub fn load_toml_config(path: &std::path::Path) -> Result<Option<TomlConfig>> {
    if !path.exists() {
        return Ok(None);
    }

    let content = std::fs::read_to_string(path)
        .map_err(|e| Error::Config(format!("Read TOML failed: {}", e)))?;
    let config = toml::from_str(&content)
        .map_err(|e| Error::Config(format!("Parse TOML failed: {}", e)))?;

    Ok(Some(config))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_config_file_is_not_an_error() {
        let path = std::path::Path::new("/nonexistent/partshelf-ai.toml");
        assert!(load_toml_config(path).unwrap().is_none());
    }

    #[test]
    fn malformed_config_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("partshelf-ai.toml");
        std::fs::write(&path, "ai_api_key = [not toml").unwrap();
        assert!(load_toml_config(&path).is_err());
    }

    #[test]
    fn loads_partial_config() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("partshelf-ai.toml");
        std::fs::write(&path, "ai_api_key = \"sk-test\"\n").unwrap();

        let config = load_toml_config(&path).unwrap().unwrap();
        assert_eq!(config.ai_api_key.as_deref(), Some("sk-test"));
        assert!(config.api_base.is_none());
    }
}
