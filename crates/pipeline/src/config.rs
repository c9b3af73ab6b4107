use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

use crate::error::PipelineError;

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

/// Pipeline configuration. Everything has a default so an empty TOML file
/// (or none at all) is a valid configuration. API keys are never configured
/// here; they come from the environment.
#[derive(Debug, Deserialize)]
pub struct PipelineConfig {
    #[serde(default = "default_csv_path")]
    pub csv_path: PathBuf,
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,
    #[serde(default)]
    pub sources: SourcesConfig,
    #[serde(default)]
    pub http: HttpConfig,
}

#[derive(Debug, Deserialize)]
pub struct SourcesConfig {
    #[serde(default = "default_fuel_url")]
    pub fuel_url: String,
    /// `data_source` label written to the fuel_prices table.
    #[serde(default = "default_fuel_label")]
    pub fuel_label: String,
    #[serde(default = "default_population_url")]
    pub population_url: String,
}

#[derive(Debug, Deserialize)]
pub struct HttpConfig {
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Minimum delay between successive keyed API calls.
    #[serde(default = "default_min_delay_ms")]
    pub min_delay_ms: u64,
}

fn default_csv_path() -> PathBuf {
    PathBuf::from("data/raw/shipping_data.csv")
}

fn default_db_path() -> PathBuf {
    PathBuf::from("data/shipdash.db")
}

fn default_fuel_url() -> String {
    "https://gasprices.aaa.com/state-gas-price-averages/".to_string()
}

fn default_fuel_label() -> String {
    "AAA Gas Prices".to_string()
}

fn default_population_url() -> String {
    "https://en.wikipedia.org/wiki/List_of_U.S._states_and_territories_by_population".to_string()
}

fn default_timeout_secs() -> u64 {
    15
}

fn default_min_delay_ms() -> u64 {
    500
}

impl Default for SourcesConfig {
    fn default() -> Self {
        Self {
            fuel_url: default_fuel_url(),
            fuel_label: default_fuel_label(),
            population_url: default_population_url(),
        }
    }
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
            min_delay_ms: default_min_delay_ms(),
        }
    }
}

// ---------------------------------------------------------------------------
// Parse + Validate
// ---------------------------------------------------------------------------

impl PipelineConfig {
    pub fn from_toml(input: &str) -> Result<Self, PipelineError> {
        let config: PipelineConfig =
            toml::from_str(input).map_err(|e| PipelineError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), PipelineError> {
        if self.http.timeout_secs == 0 {
            return Err(PipelineError::Config(
                "http.timeout_secs must be at least 1".into(),
            ));
        }
        for (name, url) in [
            ("sources.fuel_url", &self.sources.fuel_url),
            ("sources.population_url", &self.sources.population_url),
        ] {
            if !url.starts_with("http://") && !url.starts_with("https://") {
                return Err(PipelineError::Config(format!(
                    "{name} must be an http(s) URL, got '{url}'"
                )));
            }
        }
        if self.csv_path.as_os_str().is_empty() {
            return Err(PipelineError::Config("csv_path must not be empty".into()));
        }
        Ok(())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.http.timeout_secs)
    }

    pub fn min_delay(&self) -> Duration {
        Duration::from_millis(self.http.min_delay_ms)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_toml_yields_defaults() {
        let config = PipelineConfig::from_toml("").unwrap();
        assert_eq!(config.csv_path, PathBuf::from("data/raw/shipping_data.csv"));
        assert_eq!(config.http.timeout_secs, 15);
        assert_eq!(config.http.min_delay_ms, 500);
        assert!(config.sources.fuel_url.starts_with("https://"));
    }

    #[test]
    fn partial_override_keeps_other_defaults() {
        let config = PipelineConfig::from_toml(
            r#"
csv_path = "fixtures/sample.csv"

[http]
timeout_secs = 5
"#,
        )
        .unwrap();
        assert_eq!(config.csv_path, PathBuf::from("fixtures/sample.csv"));
        assert_eq!(config.http.timeout_secs, 5);
        assert_eq!(config.http.min_delay_ms, 500);
        assert_eq!(config.sources.fuel_label, "AAA Gas Prices");
    }

    #[test]
    fn rejects_zero_timeout() {
        let err = PipelineConfig::from_toml("[http]\ntimeout_secs = 0\n").unwrap_err();
        assert!(err.to_string().contains("timeout_secs"));
    }

    #[test]
    fn rejects_non_http_url() {
        let err =
            PipelineConfig::from_toml("[sources]\nfuel_url = \"ftp://example.com\"\n").unwrap_err();
        assert!(err.to_string().contains("fuel_url"));
    }
}
