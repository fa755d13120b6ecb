use std::sync::LazyLock;

use async_trait::async_trait;
use regex::Regex;
use scraper::Html;
use url::Url;

use super::{
    listing_html, pair, rarity_filter, Form, ItemFragment, ScanContext, SiteProfile, SiteUrls,
};
use crate::{
    config::{Config, SiteLanguage},
    fetch::{fetch, Request},
    pool::Page,
    Error, ScanError,
};

selector!(RESULT_COUNT, ".c-search__results-item span");
selector!(RESULT_ITEM, ".p_cards__results-box ul li");
selector!(LINK, "a");
selector!(DETAIL, ".p-cards__detail-wrapper");
selector!(RECENT, "div.p-cards__latest-products ul.c-product__list a");

static EXPANSION_PARAM: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"expansion=(\d+)").expect("valid regex"));

/// Cards shown per result page.
const PAGE_SIZE: usize = 15;

/// en.ws-tcg.com: result pages only link to a detail page per card.
#[derive(Debug, Clone)]
pub struct English {
    urls: SiteUrls,
}

impl English {
    pub fn new() -> Self {
        Self {
            urls: SiteUrls {
                base: "https://en.ws-tcg.com/",
                card_list: "https://en.ws-tcg.com/cardlist/",
                card_search: "https://en.ws-tcg.com/cardlist/searchresults/",
            },
        }
    }

    fn detail_links(&self, page: &Page) -> Result<Vec<String>, ScanError> {
        let html = listing_html(page)?;
        let base = Url::parse(self.urls.base).map_err(|err| ScanError::Malformed {
            url: page.url.clone(),
            reason: err.to_string(),
        })?;
        let mut links = Vec::new();
        for item in html.select(&RESULT_ITEM) {
            let Some(href) = item
                .select(&LINK)
                .next()
                .and_then(|a| a.value().attr("href"))
            else {
                tracing::error!(url = page.url, "result without a link");
                continue;
            };
            match base.join(href) {
                Ok(link) => links.push(link.to_string()),
                Err(err) => tracing::error!(url = page.url, href, error = %err, "bad card link"),
            }
        }
        Ok(links)
    }
}

impl Default for English {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SiteProfile for English {
    fn language(&self) -> SiteLanguage {
        SiteLanguage::English
    }

    fn urls(&self) -> &SiteUrls {
        &self.urls
    }

    fn base_form(&self) -> Form {
        vec![pair("view", "text")]
    }

    fn apply_filters(&self, form: &mut Form, config: &Config) -> Result<(), Error> {
        if let Some(expansion) = config.expansion_number {
            form.push(pair("expansion_name", expansion));
        }
        if let Some(title) = config.title_number {
            form.push(pair("title", title));
        }
        rarity_filter(form, config);
        if !config.set_codes.is_empty() {
            form.push(pair("keyword_or", config.set_codes.join(" ")));
            form.push(pair("keyword_type[]", "no"));
        }
        Ok(())
    }

    fn last_page(&self, listing: &Html) -> usize {
        let count = listing
            .select(&RESULT_COUNT)
            .next()
            .map(|span| span.text().collect::<String>())
            .unwrap_or_default();
        match count.trim().replace(',', "").parse::<usize>() {
            Ok(cards) => cards.saturating_sub(1) / PAGE_SIZE + 1,
            Err(err) => {
                tracing::error!(count, error = %err, "couldn't get number of cards");
                1
            }
        }
    }

    fn recent_release_filters(&self, card_list: &Html) -> Vec<Form> {
        card_list
            .select(&RECENT)
            .filter_map(|a| a.value().attr("href"))
            .filter_map(|href| EXPANSION_PARAM.captures(href))
            .map(|caps| vec![pair("view", "text"), pair("expansion", &caps[1])])
            .collect()
    }

    async fn scan_page(
        &self,
        page: &Page,
        cx: &ScanContext<'_>,
    ) -> Result<Vec<ItemFragment>, ScanError> {
        let links = self.detail_links(page)?;
        if links.is_empty() {
            tracing::warn!(url = page.url, "no cards on response page");
            return Ok(Vec::new());
        }
        tracing::debug!(url = page.url, cards = links.len(), "found cards");

        let mut items = Vec::with_capacity(links.len());
        for link in links {
            let request = Request::Get(link.clone());
            let detail = fetch(cx.pool, cx.jar, &request, cx.policy).await?;
            items.push(ItemFragment {
                markup: detail_markup(&detail)?,
                source_url: link,
            });
        }
        Ok(items)
    }
}

fn detail_markup(detail: &Page) -> Result<String, ScanError> {
    let html = listing_html(detail)?;
    match html.select(&DETAIL).next() {
        Some(wrapper) => {
            tracing::debug!(url = detail.url, "parsed detail page");
            Ok(wrapper.html())
        }
        None => Err(ScanError::Malformed {
            url: detail.url.clone(),
            reason: "no card details".into(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn html(markup: &str) -> Html {
        Html::parse_document(markup)
    }

    #[test]
    fn last_page_from_result_count() {
        let site = English::new();
        let page = |count: &str| {
            html(&format!(
                r#"<div class="c-search__results-item"><span>{count}</span> results</div>"#
            ))
        };
        assert_eq!(site.last_page(&page("15")), 1);
        assert_eq!(site.last_page(&page("16")), 2);
        assert_eq!(site.last_page(&page("1,234")), 83);
        assert_eq!(site.last_page(&page("0")), 1);
        assert_eq!(site.last_page(&page("many")), 1);
        assert_eq!(site.last_page(&html("<p>nothing</p>")), 1);
    }

    #[test]
    fn filters() {
        let site = English::new();
        let mut form = site.base_form();
        let config = Config {
            language: SiteLanguage::English,
            expansion_number: Some(159),
            title_number: Some(42),
            set_codes: vec!["BD".into(), "BFR".into()],
            all_rarities: false,
            ..Config::default()
        };
        site.apply_filters(&mut form, &config).expect("filters");
        assert_eq!(
            form,
            vec![
                pair("view", "text"),
                pair("expansion_name", 159),
                pair("title", 42),
                pair("parallel", "1"),
                pair("keyword_or", "BD BFR"),
                pair("keyword_type[]", "no"),
            ]
        );
    }

    #[test]
    fn recent_releases() {
        let card_list = html(
            r#"<div class="p-cards__latest-products"><ul class="c-product__list">
<li><a href="/cardlist/searchresults/?expansion=512"><img src="/a.png"></a></li>
<li><a href="/cardlist/searchresults/?view=image&amp;expansion=498">b</a></li>
<li><a href="/products/">no expansion</a></li>
</ul></div>"#,
        );
        assert_eq!(
            English::new().recent_release_filters(&card_list),
            vec![
                vec![pair("view", "text"), pair("expansion", "512")],
                vec![pair("view", "text"), pair("expansion", "498")],
            ]
        );
    }

    #[test]
    fn links_are_resolved_against_the_site() {
        let page = Page {
            url: "https://en.ws-tcg.com/cardlist/searchresults/?page=1".into(),
            status: 200,
            body: br#"<div class="p_cards__results-box"><ul>
<li><a href="/cardlist/?cardno=BD/EN-W03-004&amp;l">x</a></li>
<li><span>no link</span></li>
<li><a href="https://en.ws-tcg.com/cardlist/?cardno=SS/WE41-E59SHP">y</a></li>
</ul></div>"#
                .to_vec(),
        };
        assert_eq!(
            English::new().detail_links(&page).expect("links"),
            vec![
                "https://en.ws-tcg.com/cardlist/?cardno=BD/EN-W03-004&l",
                "https://en.ws-tcg.com/cardlist/?cardno=SS/WE41-E59SHP",
            ]
        );
    }

    #[test]
    fn detail_page_without_card_is_malformed() {
        let detail = Page {
            url: "https://en.ws-tcg.com/cardlist/?cardno=X".into(),
            status: 200,
            body: b"<html><body>maintenance</body></html>".to_vec(),
        };
        assert!(matches!(
            detail_markup(&detail),
            Err(ScanError::Malformed { .. })
        ));
    }
}
