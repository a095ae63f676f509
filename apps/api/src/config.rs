use std::path::PathBuf;

use anyhow::{bail, Context, Result};

use crate::llm_client::DEFAULT_MODEL;

/// Which transport the chat widget uses to reach the assistant.
#[derive(Debug, Clone, PartialEq)]
pub enum ChatBackend {
    /// Stream straight from the Gemini API.
    Direct { api_key: String, model: String },
    /// Relay through an upstream endpoint speaking the `{message, history}` contract.
    Proxy { url: String, token: String },
}

/// Application configuration loaded from environment variables.
/// Startup fails if required variables are missing.
#[derive(Debug, Clone)]
pub struct Config {
    pub chat_backend: ChatBackend,
    pub content_path: Option<PathBuf>,
    pub session_idle_minutes: i64,
    pub max_sessions: usize,
    pub port: u16,
    pub rust_log: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the config from any key lookup; `from_env` passes the process environment.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let chat_backend = match non_empty("CHAT_PROXY_URL") {
            Some(url) => ChatBackend::Proxy {
                url,
                token: non_empty("CHAT_PROXY_TOKEN").unwrap_or_default(),
            },
            None => {
                let Some(api_key) = non_empty("GEMINI_API_KEY") else {
                    bail!("Required environment variable 'GEMINI_API_KEY' is not set (or set CHAT_PROXY_URL)");
                };
                ChatBackend::Direct {
                    api_key,
                    model: non_empty("GEMINI_MODEL").unwrap_or_else(|| DEFAULT_MODEL.to_string()),
                }
            }
        };

        let session_idle_minutes = non_empty("SESSION_IDLE_MINUTES")
            .unwrap_or_else(|| "60".to_string())
            .parse::<i64>()
            .context("SESSION_IDLE_MINUTES must be a whole number of minutes")?;
        if session_idle_minutes <= 0 {
            bail!("SESSION_IDLE_MINUTES must be positive");
        }

        let max_sessions = non_empty("MAX_SESSIONS")
            .unwrap_or_else(|| "1000".to_string())
            .parse::<usize>()
            .context("MAX_SESSIONS must be a whole number")?;
        if max_sessions == 0 {
            bail!("MAX_SESSIONS must be at least 1");
        }

        Ok(Config {
            chat_backend,
            content_path: non_empty("CONTENT_PATH").map(PathBuf::from),
            session_idle_minutes,
            max_sessions,
            port: non_empty("PORT")
                .unwrap_or_else(|| "8080".to_string())
                .parse::<u16>()
                .context("PORT must be a valid port number")?,
            rust_log: non_empty("RUST_LOG").unwrap_or_else(|| "info".to_string()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_direct_backend_with_defaults() {
        let config = Config::from_lookup(lookup(&[("GEMINI_API_KEY", "k")])).unwrap();
        assert_eq!(
            config.chat_backend,
            ChatBackend::Direct {
                api_key: "k".to_string(),
                model: DEFAULT_MODEL.to_string(),
            }
        );
        assert_eq!(config.port, 8080);
        assert_eq!(config.session_idle_minutes, 60);
        assert_eq!(config.max_sessions, 1000);
        assert_eq!(config.rust_log, "info");
        assert!(config.content_path.is_none());
    }

    #[test]
    fn test_missing_api_key_fails() {
        let err = Config::from_lookup(lookup(&[])).unwrap_err();
        assert!(err.to_string().contains("GEMINI_API_KEY"));
    }

    #[test]
    fn test_proxy_url_selects_proxy_backend() {
        let config = Config::from_lookup(lookup(&[
            ("CHAT_PROXY_URL", "https://cms.example.com/chat"),
            ("CHAT_PROXY_TOKEN", "nonce"),
        ]))
        .unwrap();
        assert_eq!(
            config.chat_backend,
            ChatBackend::Proxy {
                url: "https://cms.example.com/chat".to_string(),
                token: "nonce".to_string(),
            }
        );
    }

    #[test]
    fn test_invalid_port_fails() {
        let err =
            Config::from_lookup(lookup(&[("GEMINI_API_KEY", "k"), ("PORT", "http")])).unwrap_err();
        assert!(err.to_string().contains("PORT"));
    }

    #[test]
    fn test_zero_idle_minutes_rejected() {
        let result = Config::from_lookup(lookup(&[
            ("GEMINI_API_KEY", "k"),
            ("SESSION_IDLE_MINUTES", "0"),
        ]));
        assert!(result.is_err());
    }

    #[test]
    fn test_max_sessions_parsed_and_zero_rejected() {
        let config =
            Config::from_lookup(lookup(&[("GEMINI_API_KEY", "k"), ("MAX_SESSIONS", "25")])).unwrap();
        assert_eq!(config.max_sessions, 25);

        let err = Config::from_lookup(lookup(&[("GEMINI_API_KEY", "k"), ("MAX_SESSIONS", "0")]))
            .unwrap_err();
        assert!(err.to_string().contains("MAX_SESSIONS"));
    }
}
