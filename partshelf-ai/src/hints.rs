//! Best-effort troubleshooting hints for the error view
//!
//! **[PSA-ERR-020]** Presentation-layer only: a small ordered list of
//! (pattern, hint) pairs matched case-insensitively against the failure
//! message. First match wins. Hints never influence control flow or retry
//! behavior.

const HINTS: &[(&str, &str)] = &[
    (
        "not configured",
        "Set PARTSHELF_AI_API_KEY (or ai_api_key in partshelf-ai.toml) and restart the service.",
    ),
    (
        "rate limit",
        "The AI provider is throttling requests. Wait a minute before recording again.",
    ),
    (
        "api key",
        "Check that the configured API key is correct and has access to the speech and vision models.",
    ),
    (
        "temporarily unavailable",
        "The AI provider is having a moment. This usually clears up within a few minutes.",
    ),
    (
        "no speech",
        "Make sure the microphone is picking you up, then record a short test phrase.",
    ),
    (
        "timed out",
        "The AI service took too long to answer. Check your connection and try again.",
    ),
    (
        "parse",
        "The model returned something unexpected. Trying again usually works.",
    ),
    (
        "network",
        "Check that this machine can reach the AI provider (proxy, DNS, firewall).",
    ),
];

/// Pick a troubleshooting hint for a failure message, if any applies
pub fn troubleshooting_hint(message: &str) -> Option<&'static str> {
    let lower = message.to_lowercase();
    HINTS
        .iter()
        .find(|(pattern, _)| lower.contains(pattern))
        .map(|(_, hint)| *hint)
}
