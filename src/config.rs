use clap::Parser;
use std::time::Duration;
use url::Url;

/// Cricket live-score feed service
#[derive(Parser, Debug, Clone)]
#[command(name = "cricket-feed", version, about)]
pub struct Config {
    /// Cricket data API base URL
    #[arg(
        long,
        env = "CRICKET_API_BASE_URL",
        default_value = "https://example-cricket-api.com"
    )]
    pub api_base_url: String,

    /// Bearer token for the cricket data API
    #[arg(long, env = "CRICKET_API_KEY")]
    pub api_key: Option<String>,

    /// Presentation API listen address
    #[arg(long, env = "LISTEN_ADDR", default_value = "0.0.0.0:8080")]
    pub listen_addr: String,

    /// Live-score refresh interval in seconds
    #[arg(long, env = "LIVE_REFRESH_SECS", default_value = "30")]
    pub live_refresh_secs: u64,

    /// Per-request timeout in seconds
    #[arg(long, env = "REQUEST_TIMEOUT_SECS", default_value = "10")]
    pub request_timeout_secs: u64,
}

impl Config {
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.live_refresh_secs == 0 {
            anyhow::bail!("live_refresh_secs must be positive");
        }
        if self.request_timeout_secs == 0 {
            anyhow::bail!("request_timeout_secs must be positive");
        }
        if self.request_timeout_secs > self.live_refresh_secs {
            anyhow::bail!(
                "request_timeout_secs ({}) must not exceed live_refresh_secs ({})",
                self.request_timeout_secs,
                self.live_refresh_secs
            );
        }
        let url = Url::parse(&self.api_base_url)
            .map_err(|e| anyhow::anyhow!("invalid api_base_url '{}': {}", self.api_base_url, e))?;
        if !matches!(url.scheme(), "http" | "https") {
            anyhow::bail!("api_base_url must be http or https, got '{}'", url.scheme());
        }
        Ok(())
    }

    pub fn refresh_period(&self) -> Duration {
        Duration::from_secs(self.live_refresh_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}
