use crate::config::SiteLanguage;

/// Faults that abort a whole run or query.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("unsupported language: {0}")]
    UnsupportedLanguage(String),
    #[error("can't use {filter} filter on the {language} site")]
    UnsupportedFilter {
        filter: &'static str,
        language: SiteLanguage,
    },
    #[error("invalid proxy '{proxy}': {source}")]
    InvalidProxy {
        proxy: String,
        #[source]
        source: reqwest::Error,
    },
    #[error(transparent)]
    Fetch(#[from] FetchError),
    #[error("couldn't find expansion list on '{0}'")]
    MissingExpansionList(String),
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FetchError {
    #[error("transport error for '{url}': {message}")]
    Transport { url: String, message: String },
    #[error("bad status code {status} for '{url}'")]
    BadStatus { url: String, status: u16 },
    #[error("failed all {attempts} attempts for '{url}'")]
    Exhausted { url: String, attempts: usize },
    #[error("couldn't decode '{url}': {message}")]
    Decode { url: String, message: String },
    #[error("couldn't get a client from the pool: {0}")]
    Pool(String),
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ScanError {
    #[error("couldn't parse result page '{url}': {reason}")]
    Malformed { url: String, reason: String },
    #[error("failed to get detailed page: {0}")]
    Detail(#[from] FetchError),
}

/// A single field that could not be read while building a card.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ExtractFault {
    #[error("missing {0}")]
    Missing(&'static str),
    #[error("unknown detail: {0:?}")]
    UnknownDetail(String),
    #[error("couldn't form full image URL from '{url}': {message}")]
    ImageUrl { url: String, message: String },
}
