//! The proxy pool every request goes through.
//!
//! A client is checked out per attempt and handed back with
//! [`PoolClient::readd`] when the request worked or [`PoolClient::ban`] when
//! it didn't.

use std::{
    collections::VecDeque,
    str::Utf8Error,
    sync::{Arc, Mutex, PoisonError},
    time::Instant,
};

use async_trait::async_trait;
use reqwest::cookie::Jar;

use crate::{config::PoolConfig, Error, FetchError};

/// A response as seen by the pipeline: final URL, status and raw body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page {
    pub url: String,
    pub status: u16,
    pub body: Vec<u8>,
}

impl Page {
    pub fn text(&self) -> Result<&str, Utf8Error> {
        std::str::from_utf8(&self.body)
    }
}

#[async_trait]
pub trait PoolClient: Send + Sync {
    async fn get(&self, url: &str) -> Result<Page, FetchError>;
    async fn post_form(&self, url: &str, form: &[(String, String)]) -> Result<Page, FetchError>;
    /// The request failed; keep this client out of rotation for a while.
    fn ban(self: Box<Self>);
    /// The request worked; put the client back in rotation.
    fn readd(self: Box<Self>);
}

pub trait ProxyPool: Send + Sync {
    /// Checks out a client that stores its cookies in `jar`.
    fn client(&self, jar: &Arc<Jar>) -> Result<Box<dyn PoolClient>, FetchError>;
}

/// Round-robin pool over a fixed list of proxies.
///
/// Banned proxies come back after [`PoolConfig::ban_duration`]. When every
/// proxy is banned, or none were configured, requests go out directly.
#[derive(Clone)]
pub struct RotatingPool {
    inner: Arc<Inner>,
}

struct Inner {
    config: PoolConfig,
    state: Mutex<Rotation>,
}

#[derive(Default)]
struct Rotation {
    available: VecDeque<String>,
    banned: Vec<(String, Instant)>,
}

impl Rotation {
    fn release_expired(&mut self, now: Instant) {
        let (expired, banned): (Vec<_>, Vec<_>) =
            self.banned.drain(..).partition(|(_, until)| *until <= now);
        self.banned = banned;
        self.available.extend(expired.into_iter().map(|(p, _)| p));
    }
}

impl RotatingPool {
    pub fn new(config: PoolConfig) -> Result<Self, Error> {
        for proxy in &config.proxies {
            reqwest::Proxy::all(proxy).map_err(|source| Error::InvalidProxy {
                proxy: proxy.clone(),
                source,
            })?;
        }
        tracing::info!(proxies = config.proxies.len(), "proxy pool ready");
        let state = Rotation {
            available: config.proxies.iter().cloned().collect(),
            banned: Vec::new(),
        };
        Ok(Self {
            inner: Arc::new(Inner {
                config,
                state: Mutex::new(state),
            }),
        })
    }

    /// Number of proxies ready to be handed out.
    pub fn available(&self) -> usize {
        let mut state = self.inner.lock();
        state.release_expired(Instant::now());
        state.available.len()
    }
}

impl Inner {
    fn lock(&self) -> std::sync::MutexGuard<'_, Rotation> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn checkout(&self) -> Option<String> {
        let mut state = self.lock();
        state.release_expired(Instant::now());
        state.available.pop_front()
    }
}

impl ProxyPool for RotatingPool {
    fn client(&self, jar: &Arc<Jar>) -> Result<Box<dyn PoolClient>, FetchError> {
        let config = &self.inner.config;
        let proxy = self.inner.checkout();
        let mut builder = reqwest::Client::builder()
            .cookie_provider(jar.clone())
            .timeout(config.timeout)
            .user_agent(config.user_agent.as_str())
            .danger_accept_invalid_certs(config.accept_invalid_certs);
        builder = match &proxy {
            Some(url) => match reqwest::Proxy::all(url) {
                Ok(p) => builder.proxy(p),
                Err(err) => {
                    self.inner.lock().available.push_back(url.clone());
                    return Err(FetchError::Pool(err.to_string()));
                }
            },
            None => builder.no_proxy(),
        };
        match builder.build() {
            Ok(client) => Ok(Box::new(RotatingClient {
                pool: self.inner.clone(),
                proxy,
                client,
            })),
            Err(err) => {
                if let Some(url) = proxy {
                    self.inner.lock().available.push_back(url);
                }
                Err(FetchError::Pool(err.to_string()))
            }
        }
    }
}

struct RotatingClient {
    pool: Arc<Inner>,
    proxy: Option<String>,
    client: reqwest::Client,
}

impl RotatingClient {
    async fn send(&self, url: &str, request: reqwest::RequestBuilder) -> Result<Page, FetchError> {
        let transport = |err: reqwest::Error| FetchError::Transport {
            url: url.to_string(),
            message: err.to_string(),
        };
        let response = request.send().await.map_err(transport)?;
        let status = response.status().as_u16();
        let final_url = response.url().to_string();
        let body = response.bytes().await.map_err(transport)?;
        Ok(Page {
            url: final_url,
            status,
            body: body.to_vec(),
        })
    }
}

#[async_trait]
impl PoolClient for RotatingClient {
    async fn get(&self, url: &str) -> Result<Page, FetchError> {
        self.send(url, self.client.get(url)).await
    }

    async fn post_form(&self, url: &str, form: &[(String, String)]) -> Result<Page, FetchError> {
        self.send(url, self.client.post(url).form(form)).await
    }

    fn ban(self: Box<Self>) {
        let Self { pool, proxy, .. } = *self;
        if let Some(proxy) = proxy {
            tracing::debug!(proxy, "banning proxy");
            let until = Instant::now() + pool.config.ban_duration;
            pool.lock().banned.push((proxy, until));
        }
    }

    fn readd(self: Box<Self>) {
        let Self { pool, proxy, .. } = *self;
        if let Some(proxy) = proxy {
            pool.lock().available.push_back(proxy);
        }
    }
}
