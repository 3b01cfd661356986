use anyhow::{Context, Result};

use crate::util::mask;

/// Secrets and endpoints loaded from environment variables (and `.env`).
/// Tuning knobs live in the miner's TOML file, not here.
#[derive(Debug, Clone)]
pub struct Secrets {
    // Scraping platform
    pub apify_api_key: String,

    // Indexing service
    pub indexing_api_url: Option<String>,
    pub indexing_api_key: Option<String>,

    // Object storage (S3-compatible)
    pub wasabi_endpoint_url: Option<String>,
    pub wasabi_access_key_id: Option<String>,
    pub wasabi_access_key: Option<String>,
    pub wasabi_region: String,

    // Metagraph snapshot source
    pub metagraph_url: Option<String>,
}

impl Secrets {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        let secrets = Self {
            apify_api_key: std::env::var("APIFY_API_KEY")
                .context("APIFY_API_KEY environment variable is required")?,
            indexing_api_url: optional_env("INDEXING_API_URL"),
            indexing_api_key: optional_env("INDEXING_API_KEY"),
            wasabi_endpoint_url: optional_env("WASABI_ENDPOINT_URL"),
            wasabi_access_key_id: optional_env("WASABI_ACCESS_KEY_ID"),
            wasabi_access_key: optional_env("WASABI_ACCESS_KEY"),
            wasabi_region: optional_env("WASABI_REGION").unwrap_or_else(|| "us-east-1".to_string()),
            metagraph_url: optional_env("METAGRAPH_URL"),
        };

        secrets.log_keys();
        Ok(secrets)
    }

    /// Object storage is usable only when endpoint and both keys are present.
    pub fn storage_credentials(&self) -> Option<(&str, &str, &str)> {
        Some((
            self.wasabi_endpoint_url.as_deref()?,
            self.wasabi_access_key_id.as_deref()?,
            self.wasabi_access_key.as_deref()?,
        ))
    }

    fn log_keys(&self) {
        fn preview_opt(val: &Option<String>) -> String {
            match val {
                Some(v) if !v.is_empty() => mask(v),
                _ => "<not set>".to_string(),
            }
        }

        tracing::info!("Secrets loaded:");
        tracing::info!("  APIFY_API_KEY: {}", mask(&self.apify_api_key));
        tracing::info!("  INDEXING_API_URL: {}", preview_opt(&self.indexing_api_url));
        tracing::info!("  INDEXING_API_KEY: {}", preview_opt(&self.indexing_api_key));
        tracing::info!("  WASABI_ENDPOINT_URL: {}", preview_opt(&self.wasabi_endpoint_url));
        tracing::info!("  WASABI_ACCESS_KEY_ID: {}", preview_opt(&self.wasabi_access_key_id));
        tracing::info!("  WASABI_ACCESS_KEY: {}", preview_opt(&self.wasabi_access_key));
        tracing::info!("  METAGRAPH_URL: {}", preview_opt(&self.metagraph_url));
    }
}

fn optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn secrets() -> Secrets {
        Secrets {
            apify_api_key: "apify".into(),
            indexing_api_url: None,
            indexing_api_key: None,
            wasabi_endpoint_url: Some("https://s3.wasabisys.com".into()),
            wasabi_access_key_id: Some("id".into()),
            wasabi_access_key: None,
            wasabi_region: "us-east-1".into(),
            metagraph_url: None,
        }
    }

    #[test]
    fn storage_needs_all_three_values() {
        let mut s = secrets();
        assert!(s.storage_credentials().is_none());

        s.wasabi_access_key = Some("secret".into());
        assert_eq!(
            s.storage_credentials(),
            Some(("https://s3.wasabisys.com", "id", "secret"))
        );
    }
}
