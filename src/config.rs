use clap::Parser;

use crate::models::{MatchStatus, StatusFilter};

/// Live Premier League fixtures and standings dashboard
#[derive(Parser, Debug, Clone)]
#[command(name = "pl-live", version, about)]
pub struct Config {
    /// football-data.org API key (sent as X-Auth-Token)
    #[arg(long, env = "FOOTBALL_DATA_API_KEY", hide_env_values = true)]
    pub football_data_api_key: Option<String>,

    /// football-data.org API base URL
    #[arg(
        long,
        env = "FOOTBALL_DATA_API_URL",
        default_value = "https://api.football-data.org/v4"
    )]
    pub football_data_api_url: String,

    /// Competition code to follow
    #[arg(long, env = "COMPETITION_ID", default_value = "PL")]
    pub competition_id: String,

    /// Seconds between background refreshes
    #[arg(long, env = "UPDATE_INTERVAL", default_value = "60")]
    pub update_interval_secs: u64,

    /// Upstream request timeout in seconds
    #[arg(long, env = "REQUEST_TIMEOUT_SECS", default_value = "5")]
    pub request_timeout_secs: u64,

    /// Match statuses kept by the background refresh (comma-separated)
    #[arg(
        long,
        env = "REFRESH_STATUSES",
        value_delimiter = ',',
        default_value = "SCHEDULED,LIVE,IN_PLAY,PAUSED,FINISHED"
    )]
    pub refresh_statuses: Vec<MatchStatus>,

    /// Pushes buffered per viewer before further pushes are dropped
    #[arg(long, env = "VIEWER_BUFFER", default_value = "8")]
    pub viewer_buffer: usize,

    /// Dashboard listen address
    #[arg(long, env = "DASHBOARD_ADDR", default_value = "0.0.0.0:5000")]
    pub dashboard_addr: String,
}

impl Config {
    pub fn validate(&self) -> anyhow::Result<()> {
        match self.football_data_api_key.as_deref() {
            Some(key) if !key.trim().is_empty() => {}
            _ => anyhow::bail!("FOOTBALL_DATA_API_KEY is required"),
        }
        let url = url::Url::parse(&self.football_data_api_url)
            .map_err(|e| anyhow::anyhow!("invalid FOOTBALL_DATA_API_URL: {}", e))?;
        if !matches!(url.scheme(), "http" | "https") {
            anyhow::bail!("FOOTBALL_DATA_API_URL must be an http(s) URL");
        }
        if self.competition_id.trim().is_empty() {
            anyhow::bail!("competition_id must not be empty");
        }
        if self.update_interval_secs == 0 {
            anyhow::bail!("update_interval_secs must be positive");
        }
        if self.request_timeout_secs == 0 {
            anyhow::bail!("request_timeout_secs must be positive");
        }
        if self.refresh_statuses.is_empty() {
            anyhow::bail!("refresh_statuses must name at least one status");
        }
        if self.viewer_buffer == 0 {
            anyhow::bail!("viewer_buffer must be positive");
        }
        Ok(())
    }

    /// API key, empty when unset. Call after `validate`.
    pub fn api_key(&self) -> &str {
        self.football_data_api_key.as_deref().unwrap_or_default()
    }

    /// Key prefix safe to show in logs and diagnostics.
    pub fn masked_api_key(&self) -> String {
        mask_key(self.api_key())
    }

    pub fn refresh_filter(&self) -> StatusFilter {
        self.refresh_statuses.iter().copied().collect()
    }
}

pub fn mask_key(key: &str) -> String {
    let prefix: String = key.chars().take(5).collect();
    format!("{}...", prefix)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Config {
        let mut argv = vec!["pl-live"];
        argv.extend_from_slice(args);
        Config::try_parse_from(argv).unwrap()
    }

    #[test]
    fn test_defaults() {
        let c = parse(&["--football-data-api-key", "abcdef123"]);
        assert_eq!(c.competition_id, "PL");
        assert_eq!(c.update_interval_secs, 60);
        assert_eq!(c.refresh_filter().len(), 5);
        assert!(c.validate().is_ok());
    }

    #[test]
    fn test_missing_key_fails_validation() {
        let mut c = parse(&[]);
        c.football_data_api_key = None;
        assert!(c.validate().is_err());
    }

    #[test]
    fn test_status_list_parsing() {
        let c = parse(&[
            "--football-data-api-key",
            "k",
            "--refresh-statuses",
            "LIVE,IN_PLAY,SCHEDULED",
        ]);
        let f = c.refresh_filter();
        assert_eq!(f.len(), 3);
        assert!(f.contains(&MatchStatus::InPlay));
        assert!(!f.contains(&MatchStatus::Finished));

        let bad = Config::try_parse_from(["pl-live", "--refresh-statuses", "HALFTIME"]);
        assert!(bad.is_err());
    }

    #[test]
    fn test_rejects_zero_interval_and_bad_url() {
        let mut c = parse(&["--football-data-api-key", "k", "--update-interval-secs", "0"]);
        assert!(c.validate().is_err());
        c.update_interval_secs = 60;
        c.football_data_api_url = "ftp://example.com".into();
        assert!(c.validate().is_err());
    }

    #[test]
    fn test_mask_key() {
        assert_eq!(mask_key("abcdef123"), "abcde...");
        assert_eq!(mask_key("ab"), "ab...");
    }
}
