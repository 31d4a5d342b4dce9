use std::time::Duration;

use crate::{errors::Error, Result};

pub const DEFAULT_CLOUD_API_URL: &str = "https://graph.facebook.com";
pub const DEFAULT_CLOUD_API_VERSION: &str = "v20.0";
pub const DEFAULT_DISPLAYNAME_TEMPLATE: &str = "{{.FullName}} ({{.Phone}})";
pub const DEFAULT_MAX_FILE_SIZE: usize = 100 * 1024 * 1024;

/// Default power levels applied to newly created portal rooms.
///
/// `None` leaves the room store's own default in place.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PowerLevelDefaults {
    pub users_default: Option<i64>,
    pub events_default: Option<i64>,
    pub state_default: Option<i64>,
    pub invite: Option<i64>,
    pub kick: Option<i64>,
    pub ban: Option<i64>,
    pub redact: Option<i64>,
}

/// Typed configuration for the bridge core.
#[derive(Clone, Debug)]
pub struct Config {
    // Cloud API
    pub cloud_api_url: String,
    pub cloud_api_version: String,
    pub http_timeout: Duration,

    // Webhook
    pub webhook_verify_token: String,

    // Portals
    pub displayname_template: String,
    pub power_levels: PowerLevelDefaults,
    pub default_user_level: i64,

    // Media / sending
    pub max_file_size: usize,
    pub disable_status_broadcast_send: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            cloud_api_url: DEFAULT_CLOUD_API_URL.to_string(),
            cloud_api_version: DEFAULT_CLOUD_API_VERSION.to_string(),
            http_timeout: Duration::from_secs(30),
            webhook_verify_token: String::new(),
            displayname_template: DEFAULT_DISPLAYNAME_TEMPLATE.to_string(),
            power_levels: PowerLevelDefaults::default(),
            default_user_level: 0,
            max_file_size: DEFAULT_MAX_FILE_SIZE,
            disable_status_broadcast_send: false,
        }
    }
}

impl Config {
    /// Load from an arbitrary key lookup, e.g. `|k| std::env::var(k).ok()`.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let get = |key: &str| lookup(key).and_then(non_empty);

        let webhook_verify_token = get("WEBHOOK_VERIFY_TOKEN").ok_or_else(|| {
            Error::Config("WEBHOOK_VERIFY_TOKEN environment variable is required".to_string())
        })?;

        let cloud_api_url = get("CLOUD_API_URL")
            .unwrap_or_else(|| DEFAULT_CLOUD_API_URL.to_string())
            .trim_end_matches('/')
            .to_string();
        let cloud_api_version =
            get("CLOUD_API_VERSION").unwrap_or_else(|| DEFAULT_CLOUD_API_VERSION.to_string());
        let http_timeout =
            Duration::from_secs(parse_num(&get, "HTTP_TIMEOUT_SECS")?.unwrap_or(30));

        let displayname_template = get("DISPLAYNAME_TEMPLATE")
            .unwrap_or_else(|| DEFAULT_DISPLAYNAME_TEMPLATE.to_string());

        let power_levels = PowerLevelDefaults {
            users_default: parse_num(&get, "POWER_LEVEL_USERS_DEFAULT")?,
            events_default: parse_num(&get, "POWER_LEVEL_EVENTS_DEFAULT")?,
            state_default: parse_num(&get, "POWER_LEVEL_STATE_DEFAULT")?,
            invite: parse_num(&get, "POWER_LEVEL_INVITE")?,
            kick: parse_num(&get, "POWER_LEVEL_KICK")?,
            ban: parse_num(&get, "POWER_LEVEL_BAN")?,
            redact: parse_num(&get, "POWER_LEVEL_REDACT")?,
        };
        let default_user_level = parse_num(&get, "DEFAULT_USER_LEVEL")?.unwrap_or(0);

        let max_file_size = parse_num(&get, "MAX_FILE_SIZE")?.unwrap_or(DEFAULT_MAX_FILE_SIZE);
        if max_file_size == 0 {
            return Err(Error::Config("MAX_FILE_SIZE must be positive".to_string()));
        }

        let disable_status_broadcast_send = get("DISABLE_STATUS_BROADCAST_SEND")
            .map(|v| parse_bool(&v))
            .unwrap_or(false);

        Ok(Self {
            cloud_api_url,
            cloud_api_version,
            http_timeout,
            webhook_verify_token,
            displayname_template,
            power_levels,
            default_user_level,
            max_file_size,
            disable_status_broadcast_send,
        })
    }
}

fn parse_num<T: std::str::FromStr>(
    get: &impl Fn(&str) -> Option<String>,
    key: &str,
) -> Result<Option<T>> {
    let Some(raw) = get(key) else {
        return Ok(None);
    };
    raw.trim()
        .parse::<T>()
        .map(Some)
        .map_err(|_| Error::Config(format!("{key} must be a number, got {raw:?}")))
}

fn parse_bool(v: &str) -> bool {
    matches!(
        v.trim().to_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

fn non_empty(s: String) -> Option<String> {
    if s.trim().is_empty() {
        None
    } else {
        Some(s)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn requires_verify_token() {
        let err = Config::from_lookup(lookup(&[])).unwrap_err();
        assert!(matches!(err, Error::Config(m) if m.contains("WEBHOOK_VERIFY_TOKEN")));
    }

    #[test]
    fn applies_defaults() {
        let cfg = Config::from_lookup(lookup(&[("WEBHOOK_VERIFY_TOKEN", "s3cret")])).unwrap();
        assert_eq!(cfg.cloud_api_url, DEFAULT_CLOUD_API_URL);
        assert_eq!(cfg.cloud_api_version, DEFAULT_CLOUD_API_VERSION);
        assert_eq!(cfg.max_file_size, DEFAULT_MAX_FILE_SIZE);
        assert_eq!(cfg.displayname_template, DEFAULT_DISPLAYNAME_TEMPLATE);
        assert_eq!(cfg.power_levels, PowerLevelDefaults::default());
        assert!(!cfg.disable_status_broadcast_send);
    }

    #[test]
    fn reads_overrides() {
        let cfg = Config::from_lookup(lookup(&[
            ("WEBHOOK_VERIFY_TOKEN", "s3cret"),
            ("CLOUD_API_URL", "http://localhost:9000/"),
            ("MAX_FILE_SIZE", "1024"),
            ("POWER_LEVEL_INVITE", "50"),
            ("DEFAULT_USER_LEVEL", "10"),
            ("DISABLE_STATUS_BROADCAST_SEND", "yes"),
        ]))
        .unwrap();
        assert_eq!(cfg.cloud_api_url, "http://localhost:9000");
        assert_eq!(cfg.max_file_size, 1024);
        assert_eq!(cfg.power_levels.invite, Some(50));
        assert_eq!(cfg.power_levels.kick, None);
        assert_eq!(cfg.default_user_level, 10);
        assert!(cfg.disable_status_broadcast_send);
    }

    #[test]
    fn rejects_bad_numbers() {
        let err = Config::from_lookup(lookup(&[
            ("WEBHOOK_VERIFY_TOKEN", "s3cret"),
            ("MAX_FILE_SIZE", "lots"),
        ]))
        .unwrap_err();
        assert!(matches!(err, Error::Config(m) if m.contains("MAX_FILE_SIZE")));
    }
}
