//! Configuration resolution for partshelf-ai
//!
//! Provides two-tier AI credential resolution with ENV → TOML priority.
//! A single credential gates both remote services; when it is absent the
//! service endpoints report 503 instead of attempting any call.

use partshelf_common::config::{config_file_path, load_toml_config};
use tracing::{info, warn};

/// Environment variable carrying the AI credential (highest priority)
pub const API_KEY_ENV_VAR: &str = "PARTSHELF_AI_API_KEY";

const DEFAULT_API_BASE: &str = "https://api.openai.com/v1";
const DEFAULT_TRANSCRIPTION_MODEL: &str = "whisper-1";
const DEFAULT_EXTRACTION_MODEL: &str = "gpt-4o-mini";

/// Resolved settings for the hosted AI backend
#[derive(Debug, Clone)]
pub struct AiSettings {
    /// Credential for both remote services; None leaves AI features off
    pub api_key: Option<String>,
    /// Base URL of the OpenAI-compatible API
    pub api_base: String,
    /// Speech-to-text model
    pub transcription_model: String,
    /// Multimodal extraction model
    pub extraction_model: String,
}

impl AiSettings {
    pub fn is_configured(&self) -> bool {
        self.api_key.as_deref().map(is_valid_key).unwrap_or(false)
    }
}

/// Resolve AI settings from the environment and the service TOML file.
///
/// **Priority:** ENV → TOML. A key present in both triggers a
/// misconfiguration warning; the environment wins.
pub fn resolve_ai_settings() -> AiSettings {
    let toml_config = match load_toml_config(&config_file_path("partshelf-ai")) {
        Ok(config) => config.unwrap_or_default(),
        Err(e) => {
            warn!("Failed to load TOML config, using defaults: {}", e);
            Default::default()
        }
    };

    let env_key = std::env::var(API_KEY_ENV_VAR)
        .ok()
        .filter(|k| is_valid_key(k));
    let toml_key = toml_config
        .ai_api_key
        .clone()
        .filter(|k| is_valid_key(k));

    if env_key.is_some() && toml_key.is_some() {
        warn!(
            "AI API key found in both {} and TOML config. Using environment (highest priority).",
            API_KEY_ENV_VAR
        );
    }

    let api_key = match (env_key, toml_key) {
        (Some(key), _) => {
            info!("AI API key loaded from environment variable");
            Some(key)
        }
        (None, Some(key)) => {
            info!("AI API key loaded from TOML config");
            Some(key)
        }
        (None, None) => {
            warn!(
                "AI API key not configured — AI features disabled. Configure using one of:\n\
                 1. Environment: {}=your-key-here\n\
                 2. TOML config: ~/.config/partshelf/partshelf-ai.toml (ai_api_key = \"your-key\")",
                API_KEY_ENV_VAR
            );
            None
        }
    };

    AiSettings {
        api_key,
        api_base: toml_config
            .api_base
            .unwrap_or_else(|| DEFAULT_API_BASE.to_string()),
        transcription_model: toml_config
            .transcription_model
            .unwrap_or_else(|| DEFAULT_TRANSCRIPTION_MODEL.to_string()),
        extraction_model: toml_config
            .extraction_model
            .unwrap_or_else(|| DEFAULT_EXTRACTION_MODEL.to_string()),
    }
}

/// Validate API key (non-empty, non-whitespace)
pub fn is_valid_key(key: &str) -> bool {
    !key.trim().is_empty()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blank_keys_are_invalid() {
        assert!(!is_valid_key(""));
        assert!(!is_valid_key("   "));
        assert!(is_valid_key("sk-test"));
    }

    #[test]
    fn test_unconfigured_settings_report_not_configured() {
        let settings = AiSettings {
            api_key: None,
            api_base: DEFAULT_API_BASE.to_string(),
            transcription_model: DEFAULT_TRANSCRIPTION_MODEL.to_string(),
            extraction_model: DEFAULT_EXTRACTION_MODEL.to_string(),
        };
        assert!(!settings.is_configured());

        let settings = AiSettings {
            api_key: Some("  ".to_string()),
            ..settings
        };
        assert!(!settings.is_configured());
    }
}
