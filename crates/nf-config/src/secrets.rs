//! Secret resolution: config YAML stores only **env var NAMES**; callers
//! invoke [`resolve_secrets`] once at startup and pass the result into
//! constructors. Never scatter `std::env::var` calls across the codebase.
//!
//! `Debug` impls on secret-bearing structs redact values. Error messages
//! reference the env var NAME, never the value.

use anyhow::{bail, Result};
use serde_json::Value;

/// Secrets resolved from the environment for one daemon instantiation.
///
/// Built once at startup via [`resolve_secrets`]. **Values are redacted in
/// `Debug` output.**
#[derive(Clone)]
pub struct ResolvedSecrets {
    /// Webhook URL the PublishingDispatcher posts to. Required: publishing
    /// has nothing to do without it.
    pub chat_webhook_url: String,
    /// Base URL of the scoring API. Not itself a secret, but resolved the
    /// same way so every external endpoint goes through one place.
    pub scoring_api_base_url: String,
}

impl std::fmt::Debug for ResolvedSecrets {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResolvedSecrets")
            .field("chat_webhook_url", &"<REDACTED>")
            .field("scoring_api_base_url", &self.scoring_api_base_url)
            .finish()
    }
}

struct SecretEnvNames {
    chat_webhook_env: String,
    scoring_api_base_env: String,
}

fn read_str_at(config: &Value, pointer: &str) -> Option<String> {
    let s = config.pointer(pointer)?.as_str()?;
    let trimmed = s.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

fn resolve_env(var_name: &str) -> Option<String> {
    match std::env::var(var_name) {
        Ok(v) if !v.trim().is_empty() => Some(v),
        _ => None,
    }
}

fn parse_env_names(config_json: &Value) -> SecretEnvNames {
    SecretEnvNames {
        chat_webhook_env: read_str_at(config_json, "/publish/webhook_env")
            .unwrap_or_else(|| "NF_CHAT_WEBHOOK_URL".to_string()),
        scoring_api_base_env: read_str_at(config_json, "/scoring/api_base_env")
            .unwrap_or_else(|| "NF_SCORING_API_BASE_URL".to_string()),
    }
}

/// Resolve the daemon's secrets from the environment.
///
/// # Errors
/// Returns `Err` naming the env var that is missing. The value is never
/// mentioned.
pub fn resolve_secrets(config_json: &Value) -> Result<ResolvedSecrets> {
    let names = parse_env_names(config_json);

    let chat_webhook_url = resolve_env(&names.chat_webhook_env).ok_or_else(|| {
        anyhow::anyhow!(
            "SECRETS_MISSING: required env var '{}' (chat webhook url) is not set or empty",
            names.chat_webhook_env
        )
    })?;

    let scoring_api_base_url = match resolve_env(&names.scoring_api_base_env) {
        Some(v) => v,
        None => bail!(
            "SECRETS_MISSING: required env var '{}' (scoring api base url) is not set or empty",
            names.scoring_api_base_env
        ),
    };

    Ok(ResolvedSecrets {
        chat_webhook_url,
        scoring_api_base_url,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    static ENV_LOCK: Mutex<()> = Mutex::new(());

    #[test]
    fn missing_webhook_env_names_the_var_not_the_value() {
        let _guard = ENV_LOCK.lock().unwrap();
        std::env::remove_var("NF_CHAT_WEBHOOK_URL");
        std::env::remove_var("NF_SCORING_API_BASE_URL");

        let err = resolve_secrets(&serde_json::json!({})).unwrap_err();
        assert!(err.to_string().contains("NF_CHAT_WEBHOOK_URL"));
    }

    #[test]
    fn resolves_from_named_env_vars() {
        let _guard = ENV_LOCK.lock().unwrap();
        std::env::set_var("NF_CHAT_WEBHOOK_URL", "https://chat.example.com/hook/abc");
        std::env::set_var("NF_SCORING_API_BASE_URL", "https://score.example.com");

        let resolved = resolve_secrets(&serde_json::json!({})).unwrap();
        assert_eq!(resolved.scoring_api_base_url, "https://score.example.com");
        assert_eq!(format!("{:?}", resolved).contains("REDACTED"), true);

        std::env::remove_var("NF_CHAT_WEBHOOK_URL");
        std::env::remove_var("NF_SCORING_API_BASE_URL");
    }
}
