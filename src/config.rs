use std::{fmt, str::FromStr, time::Duration};

use rand::Rng;

use crate::Error;

/// Which official card list to scrape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Deserialize, serde::Serialize)]
pub enum SiteLanguage {
    #[serde(rename = "EN", alias = "en")]
    English,
    #[serde(rename = "JP", alias = "ja", alias = "jp")]
    Japanese,
}

impl SiteLanguage {
    /// Code stored in `Card::language`.
    pub fn code(&self) -> &'static str {
        match self {
            SiteLanguage::English => "EN",
            SiteLanguage::Japanese => "JP",
        }
    }
}

impl fmt::Display for SiteLanguage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for SiteLanguage {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "en" | "english" => Ok(SiteLanguage::English),
            "ja" | "jp" | "japanese" => Ok(SiteLanguage::Japanese),
            _ => Err(Error::UnsupportedLanguage(s.to_string())),
        }
    }
}

/// One run of the scraper.
#[derive(Debug, Clone, serde::Deserialize, serde::Serialize)]
#[serde(default)]
pub struct Config {
    pub language: SiteLanguage,
    /// The site's internal code for an expansion. Language specific: 159 is
    /// "BanG Dream! Girls Band Party Premium Booster" on EN but "Monogatari
    /// Series: Second Season" on JP.
    pub expansion_number: Option<u32>,
    /// The site's internal code for a title. EN only.
    pub title_number: Option<u32>,
    pub set_codes: Vec<String>,
    pub all_rarities: bool,
    pub recent_only: bool,
    pub page_start: usize,
    pub reverse: bool,
    pub fetch_images: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            language: SiteLanguage::Japanese,
            expansion_number: None,
            title_number: None,
            set_codes: Vec::new(),
            all_rarities: true,
            recent_only: false,
            page_start: 0,
            reverse: false,
            fetch_images: false,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ScraperOptions {
    /// Workers per network-bound stage (fetch and scan).
    pub fetch_concurrency: usize,
    pub extract_concurrency: usize,
    pub retry: RetryPolicy,
    /// Number of failed passes after which a page is given up on.
    /// `None` keeps re-queueing forever.
    pub max_page_passes: Option<usize>,
}

impl Default for ScraperOptions {
    fn default() -> Self {
        Self {
            fetch_concurrency: 5,
            extract_concurrency: 10,
            retry: RetryPolicy::default(),
            max_page_passes: Some(10),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: usize,
    pub base_delay: Duration,
    /// Floor on the time each request occupies a worker, whatever its outcome.
    pub min_request_interval: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(1),
            min_request_interval: Duration::from_millis(500),
        }
    }
}

impl RetryPolicy {
    /// Linear backoff with jitter: `attempt * base + U[0, attempt * base / 2)`.
    pub fn backoff(&self, attempt: usize) -> Duration {
        if attempt == 0 {
            return Duration::ZERO;
        }
        let delay = self.base_delay.saturating_mul(attempt as u32);
        let spread = delay.as_nanos() as u64 / 2;
        if spread == 0 {
            return delay;
        }
        delay + Duration::from_nanos(rand::rng().random_range(0..spread))
    }
}

/// Settings for [`RotatingPool`](crate::pool::RotatingPool).
#[derive(Debug, Clone)]
pub struct PoolConfig {
    /// Proxy URLs to rotate through. Empty means connect directly.
    pub proxies: Vec<String>,
    pub timeout: Duration,
    /// How long a banned proxy sits out before it is handed out again.
    pub ban_duration: Duration,
    pub accept_invalid_certs: bool,
    pub user_agent: String,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            proxies: Vec::new(),
            timeout: Duration::from_secs(25),
            ban_duration: Duration::from_secs(60),
            accept_invalid_certs: false,
            user_agent: concat!("wscards/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_languages() {
        assert_eq!(
            "en".parse::<SiteLanguage>().ok(),
            Some(SiteLanguage::English)
        );
        assert_eq!(
            "JA".parse::<SiteLanguage>().ok(),
            Some(SiteLanguage::Japanese)
        );
        assert!(matches!(
            "fr".parse::<SiteLanguage>(),
            Err(Error::UnsupportedLanguage(lang)) if lang == "fr"
        ));
    }

    #[test]
    fn backoff_is_linear_with_bounded_jitter() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.backoff(0), Duration::ZERO);
        for attempt in 1..4 {
            let base = Duration::from_secs(attempt as u64);
            let wait = policy.backoff(attempt);
            assert!(wait >= base, "{wait:?} < {base:?}");
            assert!(wait < base + base / 2, "{wait:?} too long");
        }
    }

    #[test]
    fn zero_base_delay_has_no_jitter() {
        let policy = RetryPolicy {
            base_delay: Duration::ZERO,
            ..RetryPolicy::default()
        };
        assert_eq!(policy.backoff(2), Duration::ZERO);
    }

    #[test]
    fn config_deserializes_with_defaults() {
        let json = r#"{"language":"en","set_codes":["BD"]}"#;
        let cfg: Config = serde_json::from_str(json).expect("valid config");
        assert_eq!(cfg.language, SiteLanguage::English);
        assert_eq!(cfg.set_codes, vec!["BD".to_string()]);
        assert!(cfg.all_rarities);
        assert!(!cfg.recent_only);
    }
}
