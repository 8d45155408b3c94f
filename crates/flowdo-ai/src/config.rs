//! Client configuration, read from the environment with the key saved by the
//! settings screen as a fallback.

pub const DEFAULT_MODEL: &str = "gemini-2.0-flash";
pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta/models";
pub const DEFAULT_TIMEOUT_SECONDS: u64 = 30;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AiConfig {
    /// Empty when no key is configured; calls then fail with a
    /// configuration error instead of reaching the network.
    pub api_key: String,
    pub model: String,
    pub timeout_seconds: u64,
    pub base_url: String,
}

impl Default for AiConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            model: DEFAULT_MODEL.to_string(),
            timeout_seconds: DEFAULT_TIMEOUT_SECONDS,
            base_url: DEFAULT_BASE_URL.to_string(),
        }
    }
}

impl AiConfig {
    pub fn with_api_key(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            ..Self::default()
        }
    }

    /// Read `GEMINI_API_KEY` (falling back to `API_KEY`), plus the optional
    /// `GEMINI_MODEL`, `GEMINI_TIMEOUT_SECONDS` and `GEMINI_BASE_URL`.
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Like [`from_env`](Self::from_env) over an arbitrary variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let non_empty = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());
        let defaults = Self::default();

        let api_key = non_empty("GEMINI_API_KEY")
            .or_else(|| non_empty("API_KEY"))
            .unwrap_or_default();
        if api_key.is_empty() {
            log::warn!("no Gemini API key configured; AI actions will fail");
        }

        let timeout_seconds = match non_empty("GEMINI_TIMEOUT_SECONDS") {
            Some(raw) => raw.trim().parse().unwrap_or_else(|_| {
                log::warn!("ignoring invalid GEMINI_TIMEOUT_SECONDS={raw}");
                defaults.timeout_seconds
            }),
            None => defaults.timeout_seconds,
        };

        Self {
            api_key,
            model: non_empty("GEMINI_MODEL").unwrap_or(defaults.model),
            timeout_seconds,
            base_url: non_empty("GEMINI_BASE_URL").unwrap_or(defaults.base_url),
        }
    }

    /// Use `saved` when the environment supplied no key. The environment
    /// always wins.
    pub fn or_saved_key(mut self, saved: Option<String>) -> Self {
        if !self.has_api_key()
            && let Some(key) = saved.map(|k| k.trim().to_string()).filter(|k| !k.is_empty())
        {
            log::info!("using the API key saved in settings");
            self.api_key = key;
        }
        self
    }

    pub fn has_api_key(&self) -> bool {
        !self.api_key.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn gemini_key_wins_over_generic_key() {
        let cfg = AiConfig::from_lookup(lookup(&[("GEMINI_API_KEY", "g"), ("API_KEY", "a")]));
        assert_eq!(cfg.api_key, "g");
    }

    #[test]
    fn falls_back_to_generic_key() {
        let cfg = AiConfig::from_lookup(lookup(&[("GEMINI_API_KEY", "  "), ("API_KEY", "a")]));
        assert_eq!(cfg.api_key, "a");
    }

    #[test]
    fn defaults_when_unset() {
        let cfg = AiConfig::from_lookup(lookup(&[]));
        assert_eq!(cfg, AiConfig::default());
        assert!(!cfg.has_api_key());
    }

    #[test]
    fn overrides_and_bad_timeout() {
        let cfg = AiConfig::from_lookup(lookup(&[
            ("GEMINI_MODEL", "gemini-1.5-pro"),
            ("GEMINI_TIMEOUT_SECONDS", "soon"),
        ]));
        assert_eq!(cfg.model, "gemini-1.5-pro");
        assert_eq!(cfg.timeout_seconds, DEFAULT_TIMEOUT_SECONDS);
    }

    #[test]
    fn saved_key_only_fills_a_gap() {
        let from_env = AiConfig::from_lookup(lookup(&[("GEMINI_API_KEY", "env")]))
            .or_saved_key(Some("saved".into()));
        assert_eq!(from_env.api_key, "env");

        let from_settings = AiConfig::from_lookup(lookup(&[])).or_saved_key(Some(" saved ".into()));
        assert_eq!(from_settings.api_key, "saved");

        let neither = AiConfig::default().or_saved_key(Some("  ".into()));
        assert!(!neither.has_api_key());
    }
}
