use serde::Deserialize;
use std::path::PathBuf;

#[derive(Deserialize, Debug, Clone)]
#[serde(rename_all = "kebab-case")]
#[serde(deny_unknown_fields)]
pub struct CampaignSettings {
    #[serde(default = "default_iterations")]
    pub max_iterations: u64,
    /// Wall-clock budget for the whole campaign; unset means run until the
    /// iteration cap.
    #[serde(default)]
    pub time_budget_ms: Option<u64>,
    #[serde(default = "default_trial_timeout_ms")]
    pub trial_timeout_ms: u64,
    #[serde(default = "default_stats_interval")]
    pub stats_interval: u64,
    /// Seed for the campaign RNG; unset picks one from the OS.
    #[serde(default)]
    pub seed: Option<u64>,
}

pub fn default_iterations() -> u64 {
    1_000_000
}
fn default_trial_timeout_ms() -> u64 {
    2000
}
fn default_stats_interval() -> u64 {
    1000
}

impl Default for CampaignSettings {
    fn default() -> Self {
        Self {
            max_iterations: default_iterations(),
            time_budget_ms: None,
            trial_timeout_ms: default_trial_timeout_ms(),
            stats_interval: default_stats_interval(),
            seed: None,
        }
    }
}

#[derive(Deserialize, Debug, Clone)]
#[serde(rename_all = "kebab-case")]
#[serde(deny_unknown_fields)]
pub struct OutputConfig {
    #[serde(default = "default_output_directory")]
    pub directory: PathBuf,
}

pub fn default_output_directory() -> PathBuf {
    PathBuf::from("./.parafuzz_out")
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            directory: default_output_directory(),
        }
    }
}

#[derive(Deserialize, Debug, Clone)]
#[serde(rename_all = "kebab-case")]
#[serde(deny_unknown_fields)]
pub struct ParafuzzConfig {
    #[serde(default)]
    pub campaign: Option<CampaignSettings>,
    #[serde(default)]
    pub output: Option<OutputConfig>,
}

impl ParafuzzConfig {
    pub fn load_from_file(path: &PathBuf) -> Result<Self, anyhow::Error> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("Failed to read config file at {:?}: {}", path, e))?;

        let config: ParafuzzConfig = toml::from_str(&content).map_err(|e| {
            anyhow::anyhow!("Failed to parse TOML from config file {:?}: {}", path, e)
        })?;

        Ok(config)
    }
}

impl Default for ParafuzzConfig {
    fn default() -> Self {
        Self {
            campaign: Some(CampaignSettings::default()),
            output: Some(OutputConfig::default()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn defaults_fill_missing_sections() {
        let config: ParafuzzConfig = toml::from_str("").unwrap();
        assert!(config.campaign.is_none());
        let settings = config.campaign.unwrap_or_default();
        assert_eq!(settings.max_iterations, default_iterations());
        assert_eq!(settings.trial_timeout_ms, 2000);
        assert!(settings.seed.is_none());
    }

    #[test]
    fn kebab_case_fields_parse() {
        let config: ParafuzzConfig = toml::from_str(
            r#"
            [campaign]
            max-iterations = 5000
            time-budget-ms = 60000
            seed = 42

            [output]
            directory = "/tmp/campaign"
            "#,
        )
        .unwrap();
        let campaign = config.campaign.unwrap();
        assert_eq!(campaign.max_iterations, 5000);
        assert_eq!(campaign.time_budget_ms, Some(60000));
        assert_eq!(campaign.seed, Some(42));
        assert_eq!(
            config.output.unwrap().directory,
            PathBuf::from("/tmp/campaign")
        );
    }

    #[test]
    fn unknown_fields_are_rejected() {
        let result: Result<ParafuzzConfig, _> = toml::from_str(
            r#"
            [campaign]
            max-iterations = 10
            bogus-knob = true
            "#,
        );
        assert!(result.is_err());
    }

    #[test]
    fn load_from_file_roundtrip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("parafuzz.toml");
        fs::write(&path, "[campaign]\nmax-iterations = 7\n").unwrap();
        let config = ParafuzzConfig::load_from_file(&path).unwrap();
        assert_eq!(config.campaign.unwrap().max_iterations, 7);
    }

    #[test]
    fn missing_file_is_an_error() {
        let path = PathBuf::from("/nonexistent/parafuzz.toml");
        assert!(ParafuzzConfig::load_from_file(&path).is_err());
    }
}
