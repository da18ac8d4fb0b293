// Configuration loading for the tandem CLI
//
// Precedence: built-in defaults, then the JSON file given with `--config`,
// then `TANDEM_*` environment variables.

use anyhow::{Context, Result};
use std::path::Path;
use tandem_core::DeliveryConfig;

/// Load the effective delivery configuration
pub fn load(path: Option<&Path>) -> Result<DeliveryConfig> {
    load_with(path, |key| std::env::var(key).ok())
}

/// Load with `TANDEM_*` values taken from `lookup` instead of the process environment
fn load_with<F>(path: Option<&Path>, lookup: F) -> Result<DeliveryConfig>
where
    F: Fn(&str) -> Option<String>,
{
    let base = match path {
        Some(path) => {
            let contents = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file {}", path.display()))?;
            let config = DeliveryConfig::from_json(&contents)
                .with_context(|| format!("Failed to parse config file {}", path.display()))?;
            tracing::info!("Loaded configuration from {}", path.display());
            config
        }
        None => DeliveryConfig::default(),
    };

    base.with_overrides(lookup)
        .context("Invalid TANDEM_* environment override")
}

/// Flatten the configuration into key/value rows for display
pub fn rows(config: &DeliveryConfig) -> Result<Vec<(String, String)>> {
    let value = serde_json::to_value(config).context("Failed to serialize configuration")?;
    let rows = value
        .as_object()
        .map(|map| {
            map.iter()
                .map(|(key, value)| (key.clone(), value.to_string()))
                .collect()
        })
        .unwrap_or_default();
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::tempdir;

    fn no_env(_: &str) -> Option<String> {
        None
    }

    #[test]
    fn test_load_defaults_without_file() {
        let config = load_with(None, no_env).unwrap();
        assert_eq!(config, DeliveryConfig::default());
    }

    #[test]
    fn test_env_overrides_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("delivery.json");
        std::fs::write(&path, r#"{ "max_retries": 6 }"#).unwrap();

        let config = load_with(Some(path.as_path()), |key| {
            (key == "TANDEM_MAX_RETRIES").then(|| "2".to_string())
        })
        .unwrap();

        assert_eq!(config.max_retries, 2);
    }

    #[test]
    fn test_bad_env_override_is_an_error() {
        let result = load_with(None, |key| {
            (key == "TANDEM_MAX_INLINE_SIZE").then(|| "huge".to_string())
        });
        assert!(result.is_err());
    }

    #[test]
    fn test_load_partial_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("delivery.json");
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(br#"{ "max_retries": 6, "allow_signaling_fallback": true }"#)
            .unwrap();

        let config = load_with(Some(path.as_path()), no_env).unwrap();

        assert_eq!(config.max_retries, 6);
        assert!(config.allow_signaling_fallback);
        assert_eq!(
            config.compress_threshold,
            DeliveryConfig::default().compress_threshold
        );
    }

    #[test]
    fn test_rows_cover_every_field() {
        let rows = rows(&DeliveryConfig::default()).unwrap();
        assert!(rows.iter().any(|(k, v)| k == "max_retries" && v == "4"));
        assert_eq!(rows.len(), 7);
    }

    #[test]
    fn test_missing_file_is_an_error() {
        let dir = tempdir().unwrap();
        assert!(load_with(Some(dir.path().join("absent.json").as_path()), no_env).is_err());
    }
}
