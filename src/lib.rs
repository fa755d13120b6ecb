//! A library for harvesting Weiß Schwarz card data from the official English
//! and Japanese card lists.
//!
//! A [`Scraper`] fetches the search result pages of a site, scans them for
//! cards, extracts each card and hands the results back as a
//! [`CardStream`], or folds them into a list or into boosters.

macro_rules! selector {
    ($name:ident, $css:literal) => {
        static $name: ::std::sync::LazyLock<::scraper::Selector> = ::std::sync::LazyLock::new(|| {
            ::scraper::Selector::parse($css).expect("valid selector")
        });
    };
}

pub mod card;
pub mod card_number;
pub mod config;
pub mod crawler;
mod error;
pub mod extract;
pub mod fetch;
pub mod icons;
pub mod pool;
pub mod reduce;
pub mod site;

pub use card::{Booster, Card, CardType};
pub use config::{Config, PoolConfig, RetryPolicy, ScraperOptions, SiteLanguage};
pub use crawler::{CardStream, CrawlReport, Scraper};
pub use error::{Error, ExtractFault, FetchError, ScanError};
pub use pool::{Page, PoolClient, ProxyPool, RotatingPool};
pub use reduce::{BoosterReducer, ListReducer, Reducer};
pub use site::{SiteProfile, SiteRegistry};
