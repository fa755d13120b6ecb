//! The scrape pipeline.
//!
//! Every task (the filtered search, or one per recent release) gets its own
//! page queue, fetch workers, scan workers and a coordinator that keeps count
//! of the pages not yet accounted for. All tasks feed one pool of extract
//! workers whose cards come out of the [`CardStream`].

use std::{
    collections::BTreeMap,
    pin::Pin,
    sync::{atomic::Ordering, Arc},
    task::{Context, Poll},
};

use futures::stream::{Stream, StreamExt};
use reqwest::cookie::Jar;
use scraper::Html;
use tokio::{
    sync::{mpsc, oneshot},
    time::Instant,
};
use tokio_stream::wrappers::ReceiverStream;
use tokio_util::task::TaskTracker;

use crate::{
    card::{Booster, Card},
    config::{Config, RetryPolicy, ScraperOptions, SiteLanguage},
    extract::Extracted,
    fetch::{fetch, fetch_image, Request},
    pool::{Page, ProxyPool},
    reduce::{reduce, BoosterReducer, ListReducer},
    site::{page_numbers, Form, ItemFragment, ScanContext, SiteProfile, SiteRegistry},
    Error, FetchError, ScanError,
};

mod state;
mod statistics;

pub use state::{PageLedger, PageState, StateOutcome};
pub use statistics::Statistics;

selector!(EXPANSION_OPTION, "select#expansion option");

pub struct Scraper {
    fetch_concurrency: usize,
    extract_concurrency: usize,
    retry: RetryPolicy,
    max_page_passes: Option<usize>,
    pool: Arc<dyn ProxyPool>,
    sites: SiteRegistry,
}

/// How one task ended.
#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct TaskReport {
    pub form: Form,
    pub last_page: usize,
    pub pages: PageLedger,
    /// Pages given up on after too many failed passes.
    pub failed_pages: Vec<String>,
    pub pages_scanned: usize,
    /// Pages neither scanned nor given up on when the task ended.
    pub outstanding: usize,
}

#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct CrawlReport {
    pub tasks: Vec<TaskReport>,
}

impl CrawlReport {
    pub fn failed_pages(&self) -> Vec<&str> {
        self.tasks
            .iter()
            .flat_map(|task| task.failed_pages.iter().map(String::as_str))
            .collect()
    }

    pub fn pages_scanned(&self) -> usize {
        self.tasks.iter().map(|task| task.pages_scanned).sum()
    }

    pub fn outstanding(&self) -> usize {
        self.tasks.iter().map(|task| task.outstanding).sum()
    }

    /// Every page of every task was scanned.
    pub fn is_complete(&self) -> bool {
        self.failed_pages().is_empty() && self.outstanding() == 0
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

/// Cards as they come out of the pipeline, in no particular order.
///
/// The stream ends once every task has accounted for all its pages.
pub struct CardStream {
    cards: mpsc::Receiver<Card>,
    report: oneshot::Receiver<CrawlReport>,
}

impl CardStream {
    pub async fn recv(&mut self) -> Option<Card> {
        self.cards.recv().await
    }

    /// Waits for the pipeline to wind down. Cards not yet received are
    /// dropped.
    pub async fn finish(mut self) -> CrawlReport {
        let mut dropped = 0;
        while self.cards.recv().await.is_some() {
            dropped += 1;
        }
        if dropped > 0 {
            tracing::warn!(dropped, "cards left unread");
        }
        self.report.await.unwrap_or_default()
    }
}

impl Stream for CardStream {
    type Item = Card;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Card>> {
        self.cards.poll_recv(cx)
    }
}

struct ScrapeTask {
    form: Form,
    last_page: usize,
}

enum PageOutcome {
    Scanned { url: String, cards: usize },
    FetchFailed { url: String, error: FetchError },
    ScanFailed { url: String, error: ScanError },
}

/// What every worker of a run shares.
#[derive(Clone)]
struct Shared {
    pool: Arc<dyn ProxyPool>,
    jar: Arc<Jar>,
    retry: RetryPolicy,
    site: Arc<dyn SiteProfile>,
    stats: Statistics,
}

impl Scraper {
    pub fn new(
        pool: Arc<dyn ProxyPool>,
        ScraperOptions {
            fetch_concurrency,
            extract_concurrency,
            retry,
            max_page_passes,
        }: ScraperOptions,
    ) -> Self {
        Self {
            fetch_concurrency: fetch_concurrency.max(1),
            extract_concurrency: extract_concurrency.max(1),
            retry,
            max_page_passes,
            pool,
            sites: SiteRegistry::standard(),
        }
    }

    /// Replaces the English and Japanese sites.
    pub fn with_sites(mut self, sites: SiteRegistry) -> Self {
        self.sites = sites;
        self
    }

    /// Starts a run and returns its cards as they are extracted.
    ///
    /// Configuration problems and failures to size the tasks are returned
    /// here. Once the stream is handed out, page failures only show up in the
    /// logs and in the [`CrawlReport`].
    pub async fn stream(&self, config: &Config) -> Result<CardStream, Error> {
        let site = self.sites.get(config.language)?;
        tracing::info!(language = %config.language, config = ?config, "streaming cards");

        let mut form = site.base_form();
        site.apply_filters(&mut form, config)?;
        let jar = Arc::new(Jar::default());

        let forms = if config.recent_only {
            self.recent_release_forms(site.as_ref(), &jar).await?
        } else {
            vec![form]
        };

        let mut tasks = Vec::with_capacity(forms.len());
        for form in forms {
            let last_page = self.probe_last_page(site.as_ref(), &jar, &form).await?;
            tasks.push(ScrapeTask { form, last_page });
        }
        Ok(self.launch(site, jar, tasks, config))
    }

    pub async fn cards(&self, config: &Config) -> Result<Vec<Card>, Error> {
        let stream = self.stream(config).await?;
        let (cards, report) = reduce(ListReducer::default(), stream).await;
        log_incomplete(&report);
        Ok(cards)
    }

    /// Cards grouped by release code.
    pub async fn boosters(&self, config: &Config) -> Result<BTreeMap<String, Booster>, Error> {
        let stream = self.stream(config).await?;
        let (boosters, report) = reduce(BoosterReducer::default(), stream).await;
        log_incomplete(&report);
        Ok(boosters)
    }

    /// Expansion numbers usable as `Config::expansion_number`, with their names.
    pub async fn expansion_list(
        &self,
        language: SiteLanguage,
    ) -> Result<BTreeMap<u32, String>, Error> {
        let site = self.sites.get(language)?;
        tracing::info!(language = %language, "fetching expansion list");
        let jar = Arc::new(Jar::default());
        let url = site.urls().card_list;
        let request = Request::PostForm {
            url: url.to_string(),
            form: Form::new(),
        };
        let page = fetch(self.pool.as_ref(), &jar, &request, &self.retry).await?;
        parse_expansion_list(url, &String::from_utf8_lossy(&page.body))
    }

    async fn recent_release_forms(
        &self,
        site: &dyn SiteProfile,
        jar: &Arc<Jar>,
    ) -> Result<Vec<Form>, Error> {
        let url = site.urls().card_list;
        let request = Request::Get(url.to_string());
        let page = fetch(self.pool.as_ref(), jar, &request, &self.retry).await?;
        let listing = Html::parse_document(&String::from_utf8_lossy(&page.body));
        let forms = site.recent_release_filters(&listing);
        if forms.is_empty() {
            tracing::warn!(url, "no recent releases found");
        }
        Ok(forms)
    }

    async fn probe_last_page(
        &self,
        site: &dyn SiteProfile,
        jar: &Arc<Jar>,
        form: &Form,
    ) -> Result<usize, Error> {
        let request = Request::PostForm {
            url: site.page_url(1),
            form: form.clone(),
        };
        tracing::info!(url = request.url(), form = ?form, "getting last page");
        let page = fetch(self.pool.as_ref(), jar, &request, &self.retry).await?;
        let listing = Html::parse_document(&String::from_utf8_lossy(&page.body));
        let last_page = site.last_page(&listing);
        tracing::info!(url = request.url(), last_page, "resolved last page");
        Ok(last_page)
    }

    fn launch(
        &self,
        site: Arc<dyn SiteProfile>,
        jar: Arc<Jar>,
        tasks: Vec<ScrapeTask>,
        config: &Config,
    ) -> CardStream {
        let starting_time = Instant::now();
        let shared = Shared {
            pool: self.pool.clone(),
            jar,
            retry: self.retry,
            site,
            stats: Statistics::default(),
        };
        let tracker = TaskTracker::new();
        let (items_tx, items_rx) = mpsc::channel(self.extract_concurrency);
        let (cards_tx, cards_rx) = mpsc::channel(self.fetch_concurrency);

        self.launch_extractors(
            &tracker,
            shared.clone(),
            config.fetch_images,
            items_rx,
            cards_tx,
        );

        let mut coordinators = Vec::with_capacity(tasks.len());
        for task in tasks {
            // Holds every page of the task, so re-queueing never blocks.
            let (pages_tx, pages_rx) = mpsc::channel(task.last_page.max(1));
            let (responses_tx, responses_rx) = mpsc::channel(self.fetch_concurrency);
            let (outcomes_tx, outcomes_rx) = mpsc::channel(self.fetch_concurrency * 2);

            self.launch_fetchers(
                &tracker,
                shared.clone(),
                task.form.clone(),
                pages_rx,
                responses_tx,
                outcomes_tx.clone(),
            );
            self.launch_scanners(
                &tracker,
                shared.clone(),
                responses_rx,
                items_tx.clone(),
                outcomes_tx,
            );

            let pages = page_numbers(task.last_page, config.page_start, config.reverse)
                .into_iter()
                .map(|page| shared.site.page_url(page))
                .collect();
            coordinators.push(tracker.spawn(coordinate(
                task,
                pages,
                pages_tx,
                outcomes_rx,
                self.max_page_passes,
            )));
        }
        drop(items_tx);
        tracker.close();

        let (report_tx, report_rx) = oneshot::channel();
        let stats = shared.stats.clone();
        tokio::spawn(async move {
            let mut report = CrawlReport::default();
            for coordinator in coordinators {
                match coordinator.await {
                    Ok(task) => report.tasks.push(task),
                    Err(err) => tracing::error!("task coordinator failed: {:?}", err),
                }
            }
            tracker.wait().await;
            tracing::info!("crawler: all workers exited");
            stats.write_to_log(starting_time.elapsed());
            let _ = report_tx.send(report);
        });

        CardStream {
            cards: cards_rx,
            report: report_rx,
        }
    }

    fn launch_fetchers(
        &self,
        tracker: &TaskTracker,
        shared: Shared,
        form: Form,
        pages: mpsc::Receiver<String>,
        responses: mpsc::Sender<(String, Page)>,
        outcomes: mpsc::Sender<PageOutcome>,
    ) {
        let concurrency = self.fetch_concurrency;
        tracker.spawn(async move {
            let shared = &shared;
            let form = &form;
            let responses = &responses;
            let outcomes = &outcomes;
            ReceiverStream::new(pages)
                .for_each_concurrent(concurrency, |url| async move {
                    shared.stats.num_fetches.fetch_add(1, Ordering::SeqCst);
                    tracing::debug!(url, "fetching page");
                    let request = Request::PostForm {
                        url: url.clone(),
                        form: form.clone(),
                    };
                    match fetch(shared.pool.as_ref(), &shared.jar, &request, &shared.retry)
                        .await
                    {
                        Ok(page) => {
                            let _ = responses.send((url, page)).await;
                        }
                        Err(error) => {
                            shared.stats.num_fetch_errors.fetch_add(1, Ordering::SeqCst);
                            let _ = outcomes.send(PageOutcome::FetchFailed { url, error }).await;
                        }
                    }
                })
                .await;
            tracing::info!("crawler: page fetch workers done");
        });
    }

    fn launch_scanners(
        &self,
        tracker: &TaskTracker,
        shared: Shared,
        responses: mpsc::Receiver<(String, Page)>,
        items: mpsc::Sender<ItemFragment>,
        outcomes: mpsc::Sender<PageOutcome>,
    ) {
        let concurrency = self.fetch_concurrency;
        tracker.spawn(async move {
            let shared = &shared;
            let items = &items;
            let outcomes = &outcomes;
            ReceiverStream::new(responses)
                .for_each_concurrent(concurrency, |(url, page)| async move {
                    shared.stats.num_scans.fetch_add(1, Ordering::SeqCst);
                    tracing::debug!(url, "start scanning page");
                    let cx = ScanContext {
                        pool: shared.pool.as_ref(),
                        jar: &shared.jar,
                        policy: &shared.retry,
                    };
                    let outcome = match shared.site.scan_page(&page, &cx).await {
                        Ok(found) => {
                            let cards = found.len();
                            for item in found {
                                let _ = items.send(item).await;
                            }
                            tracing::debug!(url, cards, "finished scanning page");
                            PageOutcome::Scanned { url, cards }
                        }
                        Err(error) => {
                            shared.stats.num_scan_errors.fetch_add(1, Ordering::SeqCst);
                            tracing::error!(url, error = %error, "couldn't scan page");
                            PageOutcome::ScanFailed { url, error }
                        }
                    };
                    let _ = outcomes.send(outcome).await;
                })
                .await;
            tracing::info!("crawler: page scan workers done");
        });
    }

    fn launch_extractors(
        &self,
        tracker: &TaskTracker,
        shared: Shared,
        fetch_images: bool,
        items: mpsc::Receiver<ItemFragment>,
        cards: mpsc::Sender<Card>,
    ) {
        let concurrency = self.extract_concurrency;
        tracker.spawn(async move {
            let shared = &shared;
            let cards = &cards;
            ReceiverStream::new(items)
                .for_each_concurrent(concurrency, |item| async move {
                    shared.stats.num_extractions.fetch_add(1, Ordering::SeqCst);
                    let Extracted { mut card, faults } = shared.site.extract(&item);
                    for fault in &faults {
                        shared.stats.num_extract_faults.fetch_add(1, Ordering::SeqCst);
                        tracing::error!(
                            url = item.source_url,
                            card_number = card.card_number,
                            error = %fault,
                            "extraction fault"
                        );
                    }

                    if fetch_images && !card.image_url.is_empty() {
                        match fetch_image(
                            shared.pool.as_ref(),
                            &shared.jar,
                            &card.image_url,
                            &shared.retry,
                        )
                        .await
                        {
                            Ok(image) => {
                                shared.stats.num_images.fetch_add(1, Ordering::SeqCst);
                                card.image = Some(image);
                            }
                            Err(err) => tracing::error!(
                                card_number = card.card_number,
                                error = %err,
                                "problem getting image"
                            ),
                        }
                    }

                    let _ = cards.send(card).await;
                })
                .await;
            tracing::info!("crawler: extract workers done");
        });
    }
}

/// Owns the page count of one task. Failed pages go back in the queue until
/// `max_page_passes` is reached. Returns once no page is pending.
async fn coordinate(
    task: ScrapeTask,
    pages: Vec<String>,
    pages_tx: mpsc::Sender<String>,
    mut outcomes: mpsc::Receiver<PageOutcome>,
    max_page_passes: Option<usize>,
) -> TaskReport {
    let mut report = TaskReport {
        form: task.form,
        last_page: task.last_page,
        ..TaskReport::default()
    };
    let mut ledger = PageLedger::new();
    for url in pages {
        ledger.insert(url.clone(), PageState::queued());
        tracing::debug!(url, "queueing");
        let _ = pages_tx.send(url).await;
    }

    let mut pending = ledger.len();
    tracing::info!(pages = pending, last_page = task.last_page, "task started");
    while pending > 0 {
        let Some(outcome) = outcomes.recv().await else {
            break;
        };
        let (url, error) = match outcome {
            PageOutcome::Scanned { url, cards } => {
                ledger.entry(url).or_default().scanned_ok(cards);
                report.pages_scanned += 1;
                pending -= 1;
                continue;
            }
            PageOutcome::FetchFailed { url, error } => (url, error.to_string()),
            PageOutcome::ScanFailed { url, error } => (url, error.to_string()),
        };

        let state = ledger.entry(url.clone()).or_default();
        let passes = state.pass_failed(error);
        if max_page_passes.is_some_and(|max| passes >= max) {
            tracing::warn!(url, passes, "giving up on page");
            state.give_up();
            report.failed_pages.push(url);
            pending -= 1;
        } else {
            tracing::debug!(url, passes, "re-queueing page");
            let _ = pages_tx.send(url).await;
        }
    }

    report.outstanding = pending;
    report.pages = ledger;
    tracing::info!(
        pages_scanned = report.pages_scanned,
        failed_pages = report.failed_pages.len(),
        "task finished"
    );
    report
}

fn log_incomplete(report: &CrawlReport) {
    if !report.is_complete() {
        tracing::warn!(
            failed_pages = ?report.failed_pages(),
            outstanding = report.outstanding(),
            "run finished with pages missing"
        );
    }
}

fn parse_expansion_list(url: &str, body: &str) -> Result<BTreeMap<u32, String>, Error> {
    let html = Html::parse_document(body);
    let mut options = html.select(&EXPANSION_OPTION).peekable();
    if options.peek().is_none() {
        return Err(Error::MissingExpansionList(url.to_string()));
    }

    let mut expansions = BTreeMap::new();
    for option in options {
        let name = option.text().collect::<String>().trim().to_string();
        let value = option
            .value()
            .attr("value")
            .map(str::trim)
            .unwrap_or_default();
        if value.is_empty() {
            tracing::warn!(option = name, "option had no value");
            continue;
        }
        match value.parse::<u32>() {
            Ok(number) => {
                expansions.insert(number, name);
            }
            Err(err) => tracing::error!(value, error = %err, "couldn't parse expansion value"),
        }
    }
    Ok(expansions)
}
