use async_trait::async_trait;
use scraper::{ElementRef, Html};

use super::{
    listing_html, pair, rarity_filter, Form, ItemFragment, ScanContext, SiteProfile, SiteUrls,
};
use crate::{
    config::{Config, SiteLanguage},
    pool::Page,
    Error, ScanError,
};

selector!(NEXT_PAGE, ".pager .next");
selector!(RESULT_ROW, ".search-result-table tr");
selector!(RECENT, "div.system > ul.expansion-list a[onclick]");

/// ws-tcg.com: result pages carry the full card markup inline.
#[derive(Debug, Clone)]
pub struct Japanese {
    urls: SiteUrls,
}

impl Japanese {
    pub fn new() -> Self {
        Self {
            urls: SiteUrls {
                base: "https://ws-tcg.com/",
                card_list: "https://ws-tcg.com/cardlist/",
                card_search: "https://ws-tcg.com/cardlist/search",
            },
        }
    }

    fn rows(&self, page: &Page) -> Result<Vec<ItemFragment>, ScanError> {
        let html = listing_html(page)?;
        Ok(html
            .select(&RESULT_ROW)
            .map(|row| ItemFragment {
                source_url: page.url.clone(),
                markup: row.html(),
            })
            .collect())
    }
}

impl Default for Japanese {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SiteProfile for Japanese {
    fn language(&self) -> SiteLanguage {
        SiteLanguage::Japanese
    }

    fn urls(&self) -> &SiteUrls {
        &self.urls
    }

    fn base_form(&self) -> Form {
        vec![
            pair("cmd", "search"),
            pair("show_page_count", 100),
            pair("show_small", 0),
        ]
    }

    fn apply_filters(&self, form: &mut Form, config: &Config) -> Result<(), Error> {
        if config.title_number.is_some() {
            return Err(Error::UnsupportedFilter {
                filter: "title",
                language: SiteLanguage::Japanese,
            });
        }
        if let Some(expansion) = config.expansion_number {
            form.push(pair("expansion", expansion));
        }
        rarity_filter(form, config);
        if !config.set_codes.is_empty() {
            form.push(pair(
                "title_number",
                format!("##{}##", config.set_codes.join("##")),
            ));
        }
        Ok(())
    }

    fn last_page(&self, listing: &Html) -> usize {
        // No pager on single page results.
        listing
            .select(&NEXT_PAGE)
            .next()
            .and_then(|next| next.prev_siblings().find_map(ElementRef::wrap))
            .and_then(|last| last.text().collect::<String>().trim().parse().ok())
            .filter(|last| *last > 0)
            .unwrap_or(1)
    }

    fn recent_release_filters(&self, card_list: &Html) -> Vec<Form> {
        card_list
            .select(&RECENT)
            .filter_map(|a| a.value().attr("onclick"))
            .filter_map(|onclick| {
                let (_, args) = onclick.split_once("('")?;
                let expansion = args.split('\'').next()?.trim();
                (!expansion.is_empty()).then(|| expansion.to_string())
            })
            .map(|expansion| {
                let mut form = self.base_form();
                form.push(pair("parallel", 0));
                form.push(pair("expansion", expansion));
                form
            })
            .collect()
    }

    async fn scan_page(
        &self,
        page: &Page,
        _cx: &ScanContext<'_>,
    ) -> Result<Vec<ItemFragment>, ScanError> {
        let rows = self.rows(page)?;
        if rows.is_empty() {
            tracing::warn!(url = page.url, "no cards on response page");
        } else {
            tracing::debug!(url = page.url, cards = rows.len(), "found cards");
        }
        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn html(markup: &str) -> Html {
        Html::parse_document(markup)
    }

    #[test]
    fn last_page_before_next_link() {
        let site = Japanese::new();
        let listing = html(
            r#"<p class="pager"><span class="current">1</span> <a href="?page=2">2</a>
<a href="?page=3">3</a> <a href="?page=47">47</a> <a class="next" href="?page=2">次へ</a></p>"#,
        );
        assert_eq!(site.last_page(&listing), 47);
        assert_eq!(site.last_page(&html("<table></table>")), 1);
    }

    #[test]
    fn filters() {
        let site = Japanese::new();
        let mut form = site.base_form();
        let config = Config {
            expansion_number: Some(159),
            set_codes: vec!["BD".into(), "BFR".into()],
            ..Config::default()
        };
        site.apply_filters(&mut form, &config).expect("filters");
        assert_eq!(
            form,
            vec![
                pair("cmd", "search"),
                pair("show_page_count", "100"),
                pair("show_small", "0"),
                pair("expansion", "159"),
                pair("parallel", "0"),
                pair("title_number", "##BD##BFR##"),
            ]
        );
    }

    #[test]
    fn title_filter_is_unsupported() {
        let config = Config {
            title_number: Some(3),
            ..Config::default()
        };
        let mut form = Form::new();
        assert!(matches!(
            Japanese::new().apply_filters(&mut form, &config),
            Err(Error::UnsupportedFilter { filter: "title", .. })
        ));
    }

    #[test]
    fn recent_releases() {
        let card_list = html(
            r#"<div class="system"><ul class="expansion-list">
<li><a href="javascript:void(0)" onclick="showExpansion('418')">A</a></li>
<li><a onclick="showExpansion('409');return false;">B</a></li>
<li><a onclick="refresh()">C</a></li>
</ul></div>"#,
        );
        let filters = Japanese::new().recent_release_filters(&card_list);
        assert_eq!(filters.len(), 2);
        assert_eq!(filters[0].last(), Some(&pair("expansion", "418")));
        assert_eq!(filters[1].last(), Some(&pair("expansion", "409")));
        assert!(filters[0].contains(&pair("parallel", "0")));
        assert!(filters[0].contains(&pair("cmd", "search")));
    }

    #[test]
    fn rows_are_kept_whole() {
        let page = Page {
            url: "https://ws-tcg.com/cardlist/search?page=1".into(),
            status: 200,
            body: r#"<table class="search-result-table"><tr><td><h4>一</h4></td></tr><tr><td><h4>二</h4></td></tr></table>"#
                .as_bytes()
                .to_vec(),
        };
        let rows = Japanese::new().rows(&page).expect("rows");
        assert_eq!(rows.len(), 2);
        assert!(rows[1].markup.starts_with("<tr>"));
        assert!(rows[1].markup.contains("二"));
        assert_eq!(rows[0].source_url, page.url);
    }
}
