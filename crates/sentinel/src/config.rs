//! Sentinel configuration loading

use anyhow::{Context, Result};
use sentinel_lib::SentinelOptions;
use std::path::Path;

/// Prefix of environment overrides, e.g. `SENTINEL__SHOW_RESOURCE_HINTS=false`
/// or `SENTINEL__SCHEDULE__STEADY_INTERVAL_MS=5000`
pub const ENV_PREFIX: &str = "SENTINEL";

/// Load options from an optional file plus environment overrides
///
/// The file format follows its extension (toml, json, yaml, ...). Missing
/// keys keep their defaults.
pub fn load_options(path: Option<&Path>) -> Result<SentinelOptions> {
    let mut builder = config::Config::builder();

    if let Some(path) = path {
        if !path.exists() {
            anyhow::bail!("Config file not found: {}", path.display());
        }
        builder = builder.add_source(config::File::from(path));
    }

    let settings = builder
        .add_source(
            config::Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("__")
                .separator("__")
                .list_separator(",")
                .with_list_parse_key("skip_url_patterns")
                .try_parsing(true),
        )
        .build()
        .context("Failed to read sentinel configuration")?;

    let options: SentinelOptions = settings
        .try_deserialize()
        .context("Failed to parse sentinel configuration")?;
    options.validate().context("Invalid sentinel configuration")?;
    Ok(options)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults_without_file() {
        let options = load_options(None).unwrap();
        assert!(options.is_activated);
        assert_eq!(options.max_bytes_per_100x100_threshold, 10 * 1024);
    }

    #[test]
    fn test_load_toml_file() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            r#"
show_resource_hints = false
max_bytes_per_resource_threshold = 409600
skip_url_patterns = ["analytics"]

[schedule]
steady_interval_ms = 5000
"#
        )
        .unwrap();

        let options = load_options(Some(file.path())).unwrap();

        assert!(!options.show_resource_hints);
        assert_eq!(options.max_bytes_per_resource_threshold, 409600);
        assert!(options.skips("https://analytics.test/p.js"));
        assert_eq!(options.schedule.steady_interval_ms, 5000);
        assert_eq!(options.schedule.warmup_interval_ms, 200);
    }

    #[test]
    fn test_invalid_values_rejected() {
        let mut file = tempfile::Builder::new().suffix(".json").tempfile().unwrap();
        write!(file, r#"{{"schedule": {{"warmup_interval_ms": 0}}}}"#).unwrap();

        let err = load_options(Some(file.path())).unwrap_err();
        assert!(format!("{:#}", err).contains("poll intervals"));
    }

    #[test]
    fn test_missing_file() {
        let err = load_options(Some(Path::new("/nonexistent/sentinel.toml"))).unwrap_err();
        assert!(err.to_string().contains("not found"));
    }
}
