use super::Config;
use serde::{Deserialize, Serialize};

/// Partial configuration pushed at runtime, e.g. from a dashboard
///
/// Present fields overwrite the current value wholesale; absent fields are
/// left untouched. `Some(None)` on an optional field clears it.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ConfigUpdate {
    #[serde(with = "double_option")]
    pub phone_number: Option<Option<String>>,
    #[serde(with = "double_option")]
    pub webhook_url: Option<Option<String>>,
    #[serde(with = "double_option")]
    pub datadog_api_key: Option<Option<String>>,
    pub critical_keywords: Option<Vec<String>>,
    pub enable_text: Option<bool>,
    pub enable_call: Option<bool>,
    pub rate_limit_window_ms: Option<u64>,
    pub rate_limit_max: Option<usize>,
}

impl ConfigUpdate {
    /// Overwrite every field present in this update
    pub fn apply_to(self, config: &mut Config) {
        if let Some(phone) = self.phone_number {
            config.phone_number = phone;
        }
        if let Some(url) = self.webhook_url {
            config.webhook_url = url;
        }
        if let Some(key) = self.datadog_api_key {
            config.datadog_api_key = key;
        }
        if let Some(keywords) = self.critical_keywords {
            config.critical_keywords = keywords;
        }
        if let Some(flag) = self.enable_text {
            config.enable_text = flag;
        }
        if let Some(flag) = self.enable_call {
            config.enable_call = flag;
        }
        if let Some(window) = self.rate_limit_window_ms {
            config.rate_limit_window_ms = window;
        }
        if let Some(max) = self.rate_limit_max {
            config.rate_limit_max = max;
        }
    }
}

/// Distinguishes an absent field from an explicit `null`
mod double_option {
    use serde::{Deserialize, Deserializer};

    pub fn deserialize<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
    where
        D: Deserializer<'de>,
        T: Deserialize<'de>,
    {
        Option::<T>::deserialize(deserializer).map(Some)
    }
}

/// Configuration view safe to expose to a presentation layer
///
/// Never carries the log-aggregation API key.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicConfig {
    pub phone_number: Option<String>,
    pub webhook_url: Option<String>,
    pub rate_limit_max: usize,
    pub enable_text: bool,
    pub enable_call: bool,
}

impl From<&Config> for PublicConfig {
    fn from(config: &Config) -> Self {
        Self {
            phone_number: config.phone_number.clone(),
            webhook_url: config.webhook_url.clone(),
            rate_limit_max: config.rate_limit_max,
            enable_text: config.enable_text,
            enable_call: config.enable_call,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_update_overwrites_present_fields() {
        let mut config = Config::default();
        config.phone_number = Some("+15550100".to_string());

        let update: ConfigUpdate =
            serde_json::from_str(r#"{"enable_text": true, "critical_keywords": ["meltdown"]}"#)
                .unwrap();
        update.apply_to(&mut config);

        assert!(config.enable_text);
        assert_eq!(config.critical_keywords, vec!["meltdown".to_string()]);
        assert_eq!(config.phone_number.as_deref(), Some("+15550100"));
    }

    #[test]
    fn test_update_null_clears_optional_field() {
        let mut config = Config::default();
        config.webhook_url = Some("https://hooks.example.com".to_string());

        let update: ConfigUpdate = serde_json::from_str(r#"{"webhook_url": null}"#).unwrap();
        assert_eq!(update.webhook_url, Some(None));
        update.apply_to(&mut config);

        assert_eq!(config.webhook_url, None);
    }

    #[test]
    fn test_update_rejects_unknown_fields() {
        let result: Result<ConfigUpdate, _> = serde_json::from_str(r#"{"onNotification": 1}"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_public_config_hides_api_key() {
        let mut config = Config::default();
        config.datadog_api_key = Some("secret".to_string());

        let json = serde_json::to_string(&PublicConfig::from(&config)).unwrap();
        assert!(!json.contains("secret"));
        assert!(json.contains("rateLimitMax"));
    }
}
