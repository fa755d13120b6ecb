//! Turns one item fragment into a [`Card`].
//!
//! Each site reads its own markup into a [`Draft`]: a loose map of field
//! values plus any faults met on the way. [`Draft::finish`] then applies the
//! rules shared by both sites. Extraction always yields a card; faults are
//! handed back to the caller to log.

use std::collections::BTreeMap;

use scraper::{ElementRef, Html, Selector};
use url::Url;

use crate::{
    card::{Card, CardType, FORMAT_VERSION},
    card_number, ExtractFault, SiteLanguage,
};

mod en;
mod jp;

#[derive(Debug, Clone, PartialEq)]
pub struct Extracted {
    pub card: Card,
    pub faults: Vec<ExtractFault>,
}

/// Builds a card from a fragment of the given site's markup.
pub fn extract(language: SiteLanguage, base_url: &str, markup: &str) -> Extracted {
    let html = Html::parse_fragment(markup);
    let mut draft = Draft::new(language);
    match language {
        SiteLanguage::English => en::read(&html, &mut draft),
        SiteLanguage::Japanese => jp::read(&html, &mut draft),
    }
    draft.finish(base_url)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub(crate) enum Field {
    Type,
    Color,
    Cost,
    Expansion,
    Flavor,
    Level,
    Power,
    Rarity,
    Side,
    Soul,
    Traits,
    Triggers,
}

#[derive(Debug)]
pub(crate) struct Draft {
    language: SiteLanguage,
    raw_number: String,
    name: String,
    set_name: String,
    image_src: String,
    text: Vec<String>,
    fields: BTreeMap<Field, String>,
    faults: Vec<ExtractFault>,
}

impl Draft {
    fn new(language: SiteLanguage) -> Self {
        Self {
            language,
            raw_number: String::new(),
            name: String::new(),
            set_name: String::new(),
            image_src: String::new(),
            text: Vec::new(),
            fields: BTreeMap::new(),
            faults: Vec::new(),
        }
    }

    fn set(&mut self, field: Field, value: impl Into<String>) {
        self.fields.insert(field, value.into());
    }

    fn fault(&mut self, fault: ExtractFault) {
        self.faults.push(fault);
    }

    fn set_type(&mut self, label: &str) {
        let card_type = match label {
            "Character" | "キャラ" => CardType::Character,
            "Event" | "イベント" => CardType::Event,
            "Climax" | "クライマックス" => CardType::Climax,
            other => {
                self.fault(ExtractFault::UnknownDetail(format!("card type {other}")));
                return;
            }
        };
        self.set(Field::Type, card_type.code());
    }

    fn get(&self, field: Field) -> &str {
        self.fields
            .get(&field)
            .map(String::as_str)
            .unwrap_or_default()
    }

    fn finish(mut self, base_url: &str) -> Extracted {
        let card_number = card_number::sanitize(&self.raw_number);
        let number = card_number::parse(&card_number);
        let card_type = match self.get(Field::Type) {
            "CH" => Some(CardType::Character),
            "EV" => Some(CardType::Event),
            "CX" => Some(CardType::Climax),
            _ => None,
        };

        let image_url = match resolve(base_url, &self.image_src) {
            Ok(url) => url,
            Err(message) => {
                self.fault(ExtractFault::ImageUrl {
                    url: self.image_src.clone(),
                    message,
                });
                self.image_src.clone()
            }
        };

        let text = std::mem::take(&mut self.text);
        let card = Card {
            card_number,
            set_id: number.set_id,
            set_name: self.set_name.clone(),
            expansion_name: self.get(Field::Expansion).trim().to_string(),
            side: self.get(Field::Side).to_string(),
            release: number.release,
            release_pack_id: number.release_pack_id,
            sequence_id: number.sequence_id,
            language: self.language.code().to_string(),
            card_type,
            name: self.name.clone(),
            color: self.get(Field::Color).to_string(),
            cost: dash_to_empty(self.get(Field::Cost)),
            level: dash_to_empty(self.get(Field::Level)),
            power: match card_type {
                Some(CardType::Climax) => String::new(),
                _ => dash_to_empty(self.get(Field::Power)),
            },
            soul: match card_type {
                Some(CardType::Character) => dash_to_empty(self.get(Field::Soul)),
                _ => String::new(),
            },
            text,
            traits: split_traits(self.get(Field::Traits)),
            triggers: self
                .get(Field::Triggers)
                .split_whitespace()
                .map(str::to_string)
                .collect(),
            flavor_text: dash_to_empty(self.get(Field::Flavor)),
            image_url,
            rarity: self.get(Field::Rarity).trim().to_string(),
            format_version: FORMAT_VERSION.to_string(),
            image: None,
        };
        Extracted {
            card,
            faults: self.faults,
        }
    }
}

/// The placeholder the sites print for "not applicable".
pub(crate) fn is_dash(value: &str) -> bool {
    matches!(value.trim(), "-" | "－")
}

fn dash_to_empty(value: &str) -> String {
    if is_dash(value) {
        String::new()
    } else {
        value.trim().to_string()
    }
}

fn split_traits(value: &str) -> Vec<String> {
    value
        .split('・')
        .map(str::trim)
        .filter(|t| !t.is_empty() && !is_dash(t))
        .map(str::to_string)
        .collect()
}

fn resolve(base_url: &str, src: &str) -> Result<String, String> {
    if src.is_empty() {
        return Err("no image".to_string());
    }
    let base = Url::parse(base_url).map_err(|err| err.to_string())?;
    base.join(src)
        .map(String::from)
        .map_err(|err| err.to_string())
}

pub(crate) fn text_of(el: ElementRef<'_>) -> String {
    el.text().collect::<String>().trim().to_string()
}

pub(crate) fn first<'a>(html: &'a Html, selector: &Selector) -> Option<ElementRef<'a>> {
    html.select(selector).next()
}

pub(crate) fn last<'a>(html: &'a Html, selector: &Selector) -> Option<ElementRef<'a>> {
    html.select(selector).last()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dash_means_not_applicable() {
        assert_eq!(dash_to_empty("-"), "");
        assert_eq!(dash_to_empty(" － "), "");
        assert_eq!(dash_to_empty("0"), "0");
        assert_eq!(dash_to_empty(" 6000 "), "6000");
    }

    #[test]
    fn traits_drop_placeholders() {
        assert_eq!(split_traits("音楽・Afterglow"), vec!["音楽", "Afterglow"]);
        assert!(split_traits("-・-").is_empty());
        assert!(split_traits("").is_empty());
    }

    #[test]
    fn soul_and_power_follow_card_type() {
        let mut draft = Draft::new(SiteLanguage::English);
        draft.raw_number = "SS/WE41-E59SHP".into();
        draft.set(Field::Type, "CX");
        draft.set(Field::Soul, "1");
        draft.set(Field::Power, "3000");
        draft.image_src = "/a.png".into();
        let Extracted { card, faults } = draft.finish("https://en.ws-tcg.com/");
        assert!(faults.is_empty(), "{faults:?}");
        assert_eq!(card.soul, "");
        assert_eq!(card.power, "");
        assert_eq!(card.image_url, "https://en.ws-tcg.com/a.png");
    }

    #[test]
    fn unresolvable_image_keeps_raw_source() {
        let mut draft = Draft::new(SiteLanguage::Japanese);
        draft.image_src = "/a.png".into();
        let Extracted { card, faults } = draft.finish("not a url");
        assert_eq!(card.image_url, "/a.png");
        assert!(matches!(faults.as_slice(), [ExtractFault::ImageUrl { .. }]));
        assert_eq!(card.card_number, "");
        assert_eq!(card.set_id, "");
    }
}
