//! The retry discipline shared by page, detail and image requests.

use std::sync::Arc;

use reqwest::cookie::Jar;
use tokio::time::sleep;

use crate::{
    config::RetryPolicy,
    pool::{Page, ProxyPool},
    FetchError,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request {
    Get(String),
    PostForm {
        url: String,
        form: Vec<(String, String)>,
    },
}

impl Request {
    pub fn url(&self) -> &str {
        match self {
            Request::Get(url) => url,
            Request::PostForm { url, .. } => url,
        }
    }
}

/// Sends `request` until it gets a 200 or runs out of attempts.
///
/// Every attempt checks out its own pool client and holds the worker for at
/// least [`RetryPolicy::min_request_interval`], counted from dispatch.
/// Failed clients are banned, successful ones readded.
pub async fn fetch(
    pool: &dyn ProxyPool,
    jar: &Arc<Jar>,
    request: &Request,
    policy: &RetryPolicy,
) -> Result<Page, FetchError> {
    let url = request.url();
    let attempts = policy.max_attempts.max(1);
    let mut errors = Vec::new();

    for attempt in 0..attempts {
        if attempt > 0 {
            let wait = policy.backoff(attempt);
            tracing::debug!(url, attempt, wait = ?wait, "retrying");
            sleep(wait).await;
        }

        let client = match pool.client(jar) {
            Ok(client) => client,
            Err(err) => {
                tracing::debug!(url, attempt, error = %err, "no client");
                errors.push(err);
                continue;
            }
        };
        let floor = sleep(policy.min_request_interval);
        let result = match request {
            Request::Get(url) => client.get(url).await,
            Request::PostForm { url, form } => client.post_form(url, form).await,
        }
        .and_then(|page| match page.status {
            200 => Ok(page),
            status => Err(FetchError::BadStatus {
                url: url.to_string(),
                status,
            }),
        });

        match result {
            Ok(page) => {
                client.readd();
                floor.await;
                return Ok(page);
            }
            Err(err) => {
                tracing::debug!(url, attempt, error = %err, "attempt failed");
                client.ban();
                floor.await;
                errors.push(err);
            }
        }
    }

    tracing::error!(url, attempts, "failed all retry attempts");
    for err in &errors {
        tracing::error!(url, error = %err);
    }
    Err(FetchError::Exhausted {
        url: url.to_string(),
        attempts,
    })
}

/// Fetches and decodes a card image.
pub async fn fetch_image(
    pool: &dyn ProxyPool,
    jar: &Arc<Jar>,
    url: &str,
    policy: &RetryPolicy,
) -> Result<image::DynamicImage, FetchError> {
    let request = Request::Get(url.to_string());
    let page = fetch(pool, jar, &request, policy).await?;
    image::load_from_memory(&page.body).map_err(|err| FetchError::Decode {
        url: url.to_string(),
        message: err.to_string(),
    })
}
