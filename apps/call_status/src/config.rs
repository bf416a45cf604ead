use std::{collections::HashMap, fs, path::Path, time::Duration};

use call_core::http::notifications_url;
use tracing::warn;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub api_base_url: String,
    pub notifications_url: Option<String>,
    pub places_base_url: String,
    pub places_api_key: Option<String>,
    pub settle_delay_secs: u64,
    pub reconnect_delay_secs: u64,
    pub status_retry_attempts: usize,
    pub status_retry_delay_secs: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            api_base_url: "http://127.0.0.1:8000".into(),
            notifications_url: None,
            places_base_url: "https://maps.googleapis.com".into(),
            places_api_key: None,
            settle_delay_secs: 5,
            reconnect_delay_secs: 5,
            status_retry_attempts: 5,
            status_retry_delay_secs: 5,
        }
    }
}

impl Settings {
    pub fn settle_delay(&self) -> Duration {
        Duration::from_secs(self.settle_delay_secs)
    }

    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_secs(self.reconnect_delay_secs)
    }

    pub fn status_retry_delay(&self) -> Duration {
        Duration::from_secs(self.status_retry_delay_secs)
    }

    /// Explicit setting, else derived from the API base url.
    pub fn notifications_url(&self) -> anyhow::Result<String> {
        match &self.notifications_url {
            Some(url) => Ok(url.clone()),
            None => Ok(notifications_url(&self.api_base_url)?),
        }
    }
}

/// Defaults, then `path` if it exists, then environment variables.
pub fn load_settings(path: &Path) -> Settings {
    let mut settings = Settings::default();

    if let Ok(raw) = fs::read_to_string(path) {
        apply_file(&mut settings, &raw);
    }
    apply_env(&mut settings, |key| std::env::var(key).ok());

    settings
}

fn apply_file(settings: &mut Settings, raw: &str) {
    let file_cfg = match toml::from_str::<HashMap<String, toml::Value>>(raw) {
        Ok(cfg) => cfg,
        Err(err) => {
            warn!(error = %err, "ignoring unreadable settings file");
            return;
        }
    };
    let get = |key: &str| {
        file_cfg.get(key).map(|value| match value {
            toml::Value::String(text) => text.clone(),
            other => other.to_string(),
        })
    };

    if let Some(v) = get("api_base_url") {
        settings.api_base_url = v;
    }
    if let Some(v) = get("notifications_url") {
        settings.notifications_url = Some(v);
    }
    if let Some(v) = get("places_base_url") {
        settings.places_base_url = v;
    }
    if let Some(v) = get("places_api_key") {
        settings.places_api_key = Some(v);
    }
    set_parsed(&mut settings.settle_delay_secs, get("settle_delay_secs"));
    set_parsed(&mut settings.reconnect_delay_secs, get("reconnect_delay_secs"));
    set_parsed(&mut settings.status_retry_attempts, get("status_retry_attempts"));
    set_parsed(
        &mut settings.status_retry_delay_secs,
        get("status_retry_delay_secs"),
    );
}

fn apply_env(settings: &mut Settings, var: impl Fn(&str) -> Option<String>) {
    if let Some(v) = var("APP__API_BASE_URL") {
        settings.api_base_url = v;
    }

    if let Some(v) = var("APP__NOTIFICATIONS_URL") {
        settings.notifications_url = Some(v);
    }

    if let Some(v) = var("APP__PLACES_BASE_URL") {
        settings.places_base_url = v;
    }

    if let Some(v) = var("GOOGLE_MAP_API_KEY") {
        settings.places_api_key = Some(v);
    }
    if let Some(v) = var("APP__PLACES_API_KEY") {
        settings.places_api_key = Some(v);
    }

    set_parsed(&mut settings.settle_delay_secs, var("APP__SETTLE_DELAY_SECS"));
    set_parsed(
        &mut settings.reconnect_delay_secs,
        var("APP__RECONNECT_DELAY_SECS"),
    );
    set_parsed(
        &mut settings.status_retry_attempts,
        var("APP__STATUS_RETRY_ATTEMPTS"),
    );
    set_parsed(
        &mut settings.status_retry_delay_secs,
        var("APP__STATUS_RETRY_DELAY_SECS"),
    );
}

fn set_parsed<T: std::str::FromStr>(target: &mut T, raw: Option<String>) {
    if let Some(parsed) = raw.and_then(|v| v.trim().parse::<T>().ok()) {
        *target = parsed;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_values_override_defaults() {
        let mut settings = Settings::default();
        apply_file(
            &mut settings,
            r#"
api_base_url = "https://calls.example.com"
places_api_key = "file-key"
settle_delay_secs = 2
status_retry_attempts = "3"
"#,
        );

        assert_eq!(settings.api_base_url, "https://calls.example.com");
        assert_eq!(settings.places_api_key.as_deref(), Some("file-key"));
        assert_eq!(settings.settle_delay(), Duration::from_secs(2));
        assert_eq!(settings.status_retry_attempts, 3);
        assert_eq!(settings.reconnect_delay_secs, 5);
    }

    #[test]
    fn env_overrides_file_values() {
        let mut settings = Settings::default();
        apply_file(&mut settings, r#"api_base_url = "https://file.example.com""#);

        let env: HashMap<&str, &str> = [
            ("APP__API_BASE_URL", "https://env.example.com"),
            ("GOOGLE_MAP_API_KEY", "maps-key"),
            ("APP__PLACES_API_KEY", "app-key"),
            ("APP__RECONNECT_DELAY_SECS", "1"),
            ("APP__SETTLE_DELAY_SECS", "not-a-number"),
        ]
        .into_iter()
        .collect();
        apply_env(&mut settings, |key| env.get(key).map(|v| v.to_string()));

        assert_eq!(settings.api_base_url, "https://env.example.com");
        assert_eq!(settings.places_api_key.as_deref(), Some("app-key"));
        assert_eq!(settings.reconnect_delay(), Duration::from_secs(1));
        assert_eq!(settings.settle_delay_secs, 5);
    }

    #[test]
    fn notifications_url_defaults_to_api_host() {
        let mut settings = Settings {
            api_base_url: "https://calls.example.com".into(),
            ..Settings::default()
        };
        assert_eq!(
            settings.notifications_url().expect("derived"),
            "wss://calls.example.com/ws/notifications"
        );

        settings.notifications_url = Some("ws://127.0.0.1:9000/feed".into());
        assert_eq!(
            settings.notifications_url().expect("explicit"),
            "ws://127.0.0.1:9000/feed"
        );
    }

    #[test]
    fn unreadable_file_keeps_defaults() {
        let mut settings = Settings::default();
        apply_file(&mut settings, "this is = = not toml");
        assert_eq!(settings, Settings::default());
    }
}
