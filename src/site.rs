//! Per-language knowledge of the two official card lists: where they live,
//! how their search forms are filled in and how a result page is turned into
//! card fragments.

use std::{collections::HashMap, sync::Arc};

use async_trait::async_trait;
use reqwest::cookie::Jar;
use scraper::Html;

use crate::{
    config::{Config, RetryPolicy, SiteLanguage},
    extract::{self, Extracted},
    pool::{Page, ProxyPool},
    Error, ScanError,
};

mod en;
mod jp;

pub use en::English;
pub use jp::Japanese;

/// Form values posted to a search page.
pub type Form = Vec<(String, String)>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SiteUrls {
    pub base: &'static str,
    /// Page holding the expansion list and the recent releases.
    pub card_list: &'static str,
    pub card_search: &'static str,
}

/// Markup of one card, ready for extraction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemFragment {
    /// Page the card was found on.
    pub source_url: String,
    pub markup: String,
}

/// What a scan may use for further requests.
pub struct ScanContext<'a> {
    pub pool: &'a dyn ProxyPool,
    pub jar: &'a Arc<Jar>,
    pub policy: &'a RetryPolicy,
}

#[async_trait]
pub trait SiteProfile: Send + Sync {
    fn language(&self) -> SiteLanguage;

    fn urls(&self) -> &SiteUrls;

    /// Form values sent with every search.
    fn base_form(&self) -> Form;

    /// Adds the search filters requested in `config` to `form`.
    fn apply_filters(&self, form: &mut Form, config: &Config) -> Result<(), Error>;

    /// Number of result pages, read from the first one.
    fn last_page(&self, listing: &Html) -> usize;

    /// One search form per release shown as recent on the card list page.
    fn recent_release_filters(&self, card_list: &Html) -> Vec<Form>;

    /// Pulls the card fragments out of one result page.
    async fn scan_page(
        &self,
        page: &Page,
        cx: &ScanContext<'_>,
    ) -> Result<Vec<ItemFragment>, ScanError>;

    fn extract(&self, item: &ItemFragment) -> Extracted {
        extract::extract(self.language(), self.urls().base, &item.markup)
    }

    fn page_url(&self, page: usize) -> String {
        format!("{}?page={page}", self.urls().card_search)
    }
}

/// Lookup table from language to site.
#[derive(Clone, Default)]
pub struct SiteRegistry {
    sites: HashMap<SiteLanguage, Arc<dyn SiteProfile>>,
}

impl SiteRegistry {
    pub fn empty() -> Self {
        Self::default()
    }

    /// The English and Japanese card lists.
    pub fn standard() -> Self {
        let mut registry = Self::empty();
        registry.register(Arc::new(English::new()));
        registry.register(Arc::new(Japanese::new()));
        registry
    }

    pub fn register(&mut self, site: Arc<dyn SiteProfile>) {
        self.sites.insert(site.language(), site);
    }

    pub fn get(&self, language: SiteLanguage) -> Result<Arc<dyn SiteProfile>, Error> {
        self.sites
            .get(&language)
            .cloned()
            .ok_or_else(|| Error::UnsupportedLanguage(language.to_string()))
    }
}

/// Page numbers to visit, in visiting order. The first `page_start - 1`
/// positions of that order are skipped.
pub fn page_numbers(last_page: usize, page_start: usize, reverse: bool) -> Vec<usize> {
    let skip = page_start.saturating_sub(1);
    let pages = 1..=last_page;
    if reverse {
        pages.rev().skip(skip).collect()
    } else {
        pages.skip(skip).collect()
    }
}

fn listing_html(page: &Page) -> Result<Html, ScanError> {
    let text = page.text().map_err(|err| ScanError::Malformed {
        url: page.url.clone(),
        reason: err.to_string(),
    })?;
    Ok(Html::parse_document(text))
}

fn pair(key: &str, value: impl ToString) -> (String, String) {
    (key.to_string(), value.to_string())
}

fn rarity_filter(form: &mut Form, config: &Config) {
    form.push(pair("parallel", if config.all_rarities { "0" } else { "1" }));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pages_forward() {
        assert_eq!(page_numbers(4, 0, false), vec![1, 2, 3, 4]);
        assert_eq!(page_numbers(4, 1, false), vec![1, 2, 3, 4]);
        assert_eq!(page_numbers(4, 3, false), vec![3, 4]);
    }

    #[test]
    fn pages_reversed() {
        assert_eq!(page_numbers(4, 0, true), vec![4, 3, 2, 1]);
        assert_eq!(page_numbers(4, 2, true), vec![3, 2, 1]);
    }

    #[test]
    fn start_past_the_end_leaves_nothing() {
        assert!(page_numbers(2, 5, false).is_empty());
    }

    #[test]
    fn registry_lookup() {
        let registry = SiteRegistry::standard();
        let en = registry.get(SiteLanguage::English).expect("english site");
        assert_eq!(en.urls().base, "https://en.ws-tcg.com/");
        assert_eq!(
            en.page_url(3),
            "https://en.ws-tcg.com/cardlist/searchresults/?page=3"
        );
        assert!(matches!(
            SiteRegistry::empty().get(SiteLanguage::Japanese),
            Err(Error::UnsupportedLanguage(lang)) if lang == "JP"
        ));
    }

    #[test]
    fn non_utf8_listing_is_malformed() {
        let page = Page {
            url: "https://ws-tcg.com/cardlist/search?page=1".into(),
            status: 200,
            body: vec![0xff, 0xfe, 0x00],
        };
        assert!(matches!(
            listing_html(&page),
            Err(ScanError::Malformed { url, .. }) if url == page.url
        ));
    }
}
