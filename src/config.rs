//! Configuration loader: merges env vars, .env file, and config.toml.

use common::{Error, SyncConfig};
use std::path::Path;

fn parse_positive_u64(raw: &str, env_name: &str) -> Result<u64, Error> {
    let parsed = raw
        .trim()
        .parse::<u64>()
        .map_err(|_| Error::Config(format!("{env_name} must be an integer > 0")))?;
    if parsed == 0 {
        return Err(Error::Config(format!("{env_name} must be an integer > 0")));
    }
    Ok(parsed)
}

fn parse_u32(raw: &str, env_name: &str) -> Result<u32, Error> {
    raw.trim()
        .parse::<u32>()
        .map_err(|_| Error::Config(format!("{env_name} must be an integer >= 0")))
}

fn parse_bool(raw: &str) -> bool {
    let lowered = raw.trim().to_ascii_lowercase();
    lowered != "0" && lowered != "false" && lowered != "no" && lowered != "off"
}

fn validate_config(config: &SyncConfig) -> Result<(), Error> {
    let mut issues: Vec<String> = Vec::new();

    let base_url = config.gateway.base_url.trim();
    if base_url.is_empty() {
        issues.push("gateway.base_url must not be empty".into());
    } else if !base_url.starts_with("http://") && !base_url.starts_with("https://") {
        issues.push("gateway.base_url must start with http:// or https://".into());
    }
    if config.gateway.request_timeout_secs == 0 {
        issues.push("gateway.request_timeout_secs must be > 0".into());
    }
    if config.gateway.requests_per_sec == 0 {
        issues.push("gateway.requests_per_sec must be > 0".into());
    }
    if !config.gateway.stream_path.contains("{id}") {
        issues.push("gateway.stream_path must contain the {id} placeholder".into());
    }

    if config.cache.gc_secs == 0 {
        issues.push("cache.gc_secs must be > 0".into());
    }
    if config.cache.stale_secs > config.cache.gc_secs {
        issues.push("cache.stale_secs must be <= cache.gc_secs".into());
    }
    if config.cache.retries > 10 {
        issues.push("cache.retries must be <= 10".into());
    }

    if config.persistence.enabled {
        if config.persistence.dir.trim().is_empty() {
            issues.push("persistence.dir must not be empty when persistence is enabled".into());
        }
        if config.persistence.max_age_secs == 0 {
            issues.push("persistence.max_age_secs must be > 0".into());
        }
    }

    if issues.is_empty() {
        Ok(())
    } else {
        Err(Error::Config(format!(
            "Invalid config:\n - {}",
            issues.join("\n - ")
        )))
    }
}

/// Apply `TICKETS_*` overrides read through `lookup`.
fn apply_env_overrides(
    config: &mut SyncConfig,
    lookup: impl Fn(&str) -> Option<String>,
) -> Result<(), Error> {
    if let Some(url) = lookup("TICKETS_API_BASE_URL") {
        config.gateway.base_url = url.trim().to_string();
    }
    if let Some(raw) = lookup("TICKETS_API_TIMEOUT_SECS") {
        config.gateway.request_timeout_secs = parse_positive_u64(&raw, "TICKETS_API_TIMEOUT_SECS")?;
    }
    if let Some(raw) = lookup("TICKETS_REQUESTS_PER_SEC") {
        let rate = parse_u32(&raw, "TICKETS_REQUESTS_PER_SEC")?;
        if rate == 0 {
            return Err(Error::Config(
                "TICKETS_REQUESTS_PER_SEC must be an integer > 0".into(),
            ));
        }
        config.gateway.requests_per_sec = rate;
    }
    if let Some(raw) = lookup("TICKETS_CACHE_STALE_SECS") {
        config.cache.stale_secs = raw
            .trim()
            .parse::<u64>()
            .map_err(|_| Error::Config("TICKETS_CACHE_STALE_SECS must be an integer >= 0".into()))?;
    }
    if let Some(raw) = lookup("TICKETS_CACHE_GC_SECS") {
        config.cache.gc_secs = parse_positive_u64(&raw, "TICKETS_CACHE_GC_SECS")?;
    }
    if let Some(raw) = lookup("TICKETS_CACHE_RETRIES") {
        config.cache.retries = parse_u32(&raw, "TICKETS_CACHE_RETRIES")?;
    }
    if let Some(raw) = lookup("TICKETS_PERSISTENCE") {
        config.persistence.enabled = parse_bool(&raw);
    }
    if let Some(dir) = lookup("TICKETS_SNAPSHOT_DIR") {
        config.persistence.dir = dir.trim().to_string();
    }
    if let Some(raw) = lookup("TICKETS_SNAPSHOT_MAX_AGE_SECS") {
        config.persistence.max_age_secs = parse_positive_u64(&raw, "TICKETS_SNAPSHOT_MAX_AGE_SECS")?;
    }
    Ok(())
}

/// Load sync configuration from environment and optional config file.
pub fn load_config() -> Result<SyncConfig, Error> {
    // 1. Load .env file from project root or parent directories.
    if let Err(e) = dotenvy::dotenv() {
        tracing::debug!("No .env file loaded: {}", e);
    }

    // 2. Start with defaults.
    let mut config = SyncConfig::default();

    // 3. Try loading config.toml if it exists.
    let config_path = Path::new("config.toml");
    if config_path.exists() {
        let contents = std::fs::read_to_string(config_path)
            .map_err(|e| Error::Config(format!("Failed to read config.toml: {}", e)))?;
        config = toml::from_str(&contents)
            .map_err(|e| Error::Config(format!("Failed to parse config.toml: {}", e)))?;
    }

    // 4. Override with environment variables (highest priority).
    apply_env_overrides(&mut config, |name| std::env::var(name).ok())?;

    validate_config(&config)?;

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn test_defaults_are_valid() {
        validate_config(&SyncConfig::default()).unwrap();
    }

    #[test]
    fn test_env_overrides_apply() {
        let mut cfg = SyncConfig::default();
        apply_env_overrides(
            &mut cfg,
            lookup_from(&[
                ("TICKETS_API_BASE_URL", " https://gateway.example.com/api "),
                ("TICKETS_CACHE_RETRIES", "0"),
                ("TICKETS_PERSISTENCE", "off"),
            ]),
        )
        .unwrap();

        assert_eq!(cfg.gateway.base_url, "https://gateway.example.com/api");
        assert_eq!(cfg.cache.retries, 0);
        assert!(!cfg.persistence.enabled);
    }

    #[test]
    fn test_bad_env_value_is_config_error() {
        let mut cfg = SyncConfig::default();
        let err = apply_env_overrides(&mut cfg, lookup_from(&[("TICKETS_API_TIMEOUT_SECS", "0")]))
            .unwrap_err();
        assert!(matches!(err, Error::Config(msg) if msg.contains("TICKETS_API_TIMEOUT_SECS")));
    }

    #[test]
    fn test_validation_collects_every_issue() {
        let mut cfg = SyncConfig::default();
        cfg.gateway.base_url = "ftp://nope".into();
        cfg.gateway.stream_path = "/offers/stream".into();
        cfg.cache.stale_secs = cfg.cache.gc_secs + 1;

        let Err(Error::Config(msg)) = validate_config(&cfg) else {
            panic!("expected config error");
        };
        assert!(msg.contains("base_url"));
        assert!(msg.contains("stream_path"));
        assert!(msg.contains("stale_secs"));
    }

    #[test]
    fn test_toml_sections_parse() {
        let cfg: SyncConfig = toml::from_str(
            r#"
            [gateway]
            base_url = "https://tickets.example.com/api"

            [cache]
            stale_secs = 60
            "#,
        )
        .unwrap();
        assert_eq!(cfg.cache.stale_secs, 60);
        assert_eq!(cfg.cache.gc_secs, 1800);
        assert!(cfg.persistence.enabled);
    }
}
