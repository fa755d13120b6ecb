use std::{
    fs,
    path::{Path, PathBuf},
    sync::Arc,
};

use anyhow::Context;
use clap::{Parser, ValueEnum};
use futures::StreamExt;
use tracing_subscriber::{prelude::*, EnvFilter};
use wscards::{Card, Config, PoolConfig, RotatingPool, Scraper, ScraperOptions, SiteLanguage};

/// Fetch Weiß Schwarz cards from the official card lists.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Site to scrape: en or ja.
    #[arg(short, long, default_value = "ja")]
    lang: SiteLanguage,
    /// The site's expansion number.
    #[arg(long)]
    expansion: Option<u32>,
    /// The site's title number (English site only).
    #[arg(long)]
    title: Option<u32>,
    /// Set codes separated by `##`, such as `BD##BFR`.
    #[arg(long)]
    neo: Option<String>,
    /// Only fetch base rarities.
    #[arg(long)]
    base_only: bool,
    /// Only fetch the releases shown as recent on the card list.
    #[arg(long)]
    recent: bool,
    #[arg(long, default_value_t = 0)]
    page_start: usize,
    #[arg(long)]
    reverse: bool,
    /// Download card images next to the card files.
    #[arg(long)]
    images: bool,
    /// Overwrite existing files.
    #[arg(long)]
    force: bool,
    #[arg(long, value_enum, default_value_t = Export::Card)]
    export: Export,
    #[arg(long, default_value = "cards")]
    out: PathBuf,
    /// Where to write the page report of a card export.
    #[arg(long)]
    report: Option<PathBuf>,
    /// Proxy URL, may be repeated.
    #[arg(long = "proxy")]
    proxies: Vec<String>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum Export {
    Card,
    Booster,
    Expansions,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            EnvFilter::try_from_default_env()
                .or_else(|_| EnvFilter::try_new("info"))
                .expect("telemetry: Creating EnvFilter"),
        )
        .init();

    let args = Args::parse();
    let pool = RotatingPool::new(PoolConfig {
        proxies: args.proxies.clone(),
        ..PoolConfig::default()
    })?;
    let scraper = Scraper::new(Arc::new(pool), ScraperOptions::default());
    let config = Config {
        language: args.lang,
        expansion_number: args.expansion,
        title_number: args.title,
        set_codes: args.neo.as_deref().map(set_codes).unwrap_or_default(),
        all_rarities: !args.base_only,
        recent_only: args.recent,
        page_start: args.page_start,
        reverse: args.reverse,
        fetch_images: args.images,
    };
    tracing::info!(mode = ?args.export, "start");

    match args.export {
        Export::Card => {
            let mut stream = scraper.stream(&config).await?;
            let mut written = 0;
            while let Some(card) = stream.next().await {
                match write_card(&args.out, args.lang, &card, args.force) {
                    Ok(true) => written += 1,
                    Ok(false) => {}
                    Err(err) => tracing::error!(card_number = card.card_number, "{:#}", err),
                }
            }
            let report = stream.finish().await;
            tracing::info!(written, failed_pages = ?report.failed_pages(), "done");
            if let Some(path) = &args.report {
                fs::write(path, report.to_json()?)
                    .with_context(|| format!("writing {}", path.display()))?;
                tracing::info!("wrote report to '{}'", path.display());
            }
        }
        Export::Booster => {
            let boosters = scraper.boosters(&config).await?;
            let dir = args.out.join(args.lang.code());
            fs::create_dir_all(&dir)?;
            for (release, booster) in boosters {
                tracing::info!(release, "writing booster");
                let path = dir.join(format!("{release}.json"));
                fs::write(&path, serde_json::to_vec(&booster.cards)?)
                    .with_context(|| format!("writing {}", path.display()))?;
            }
        }
        Export::Expansions => {
            for (number, name) in scraper.expansion_list(args.lang).await? {
                println!("{number}\t{name}");
            }
        }
    }
    Ok(())
}

fn set_codes(neo: &str) -> Vec<String> {
    neo.split("##")
        .filter(|code| !code.is_empty())
        .map(String::from)
        .collect()
}

/// Writes one card as pretty JSON, plus its image when there is one.
/// Returns `false` when the card was already on disk.
fn write_card(out: &Path, lang: SiteLanguage, card: &Card, force: bool) -> anyhow::Result<bool> {
    let dir = out.join(lang.code()).join(&card.set_id).join(&card.release);
    fs::create_dir_all(&dir)?;
    let name = format!("{}-{}-{}.json", card.set_id, card.release, card.sequence_id);
    let path = dir.join(&name);
    if path.exists() && !force {
        tracing::info!(card = name, "skipping card, file exists");
        return Ok(false);
    }
    fs::write(&path, serde_json::to_string_pretty(card)?)
        .with_context(|| format!("writing {}", path.display()))?;

    if let Some(image) = &card.image {
        let assets = dir.join("assets");
        fs::create_dir_all(&assets)?;
        let file = Path::new(&card.image_url)
            .file_stem()
            .map(|stem| format!("{}.png", stem.to_string_lossy()))
            .unwrap_or_else(|| name.replace(".json", ".png"));
        image
            .save(assets.join(&file))
            .with_context(|| format!("saving image {file}"))?;
    }
    tracing::info!(card = name, "finished card");
    Ok(true)
}
