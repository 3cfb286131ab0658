use serde::Deserialize;

const DEFAULT_DATABASE_URL: &str = "sqlite:archiver.db?mode=rwc";

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub database_url: String,
    pub gateway_url: String,
    pub gateway_token: Option<String>,
    pub batch_size: i64,
    pub request_delay_secs: u64,
    pub poll_interval_secs: u64,
    pub max_retries: u32,
}

impl Settings {
    pub fn from_env() -> Result<Self, std::env::VarError> {
        Self::from_lookup(|key| std::env::var(key))
    }

    /// Parse settings from an arbitrary key lookup.
    ///
    /// Numeric values that are missing or unparsable fall back to their
    /// defaults; only the gateway URL is required.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, std::env::VarError>
    where
        F: Fn(&str) -> Result<String, std::env::VarError>,
    {
        let database_url = lookup("ARCHIVER_DATABASE_URL")
            .or_else(|_| lookup("DATABASE_URL"))
            .unwrap_or_else(|_| DEFAULT_DATABASE_URL.to_string());
        let gateway_url = lookup("ARCHIVER_GATEWAY_URL")?;
        let gateway_token = lookup("ARCHIVER_GATEWAY_TOKEN")
            .ok()
            .filter(|token| !token.is_empty());
        let batch_size = lookup("ARCHIVER_BATCH_SIZE")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(100);
        let request_delay_secs = lookup("ARCHIVER_REQUEST_DELAY_SECS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(2);
        let poll_interval_secs = lookup("ARCHIVER_POLL_INTERVAL_SECS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(30);
        let max_retries = lookup("ARCHIVER_MAX_RETRIES")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(3);

        Ok(Self {
            database_url,
            gateway_url,
            gateway_token,
            batch_size,
            request_delay_secs,
            poll_interval_secs,
            max_retries,
        })
    }
}
