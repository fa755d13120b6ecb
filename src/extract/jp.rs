use scraper::Html;

use super::{first, last, text_of, Draft, Field};
use crate::{icons, ExtractFault};

selector!(HEADING, "h4");
selector!(HEADING_SPAN, "h4 span");
selector!(IMAGE, "a img");
selector!(UNIT, ".unit");
selector!(SPAN, "span");

/// Reads one row of the search result table.
pub(super) fn read(html: &Html, draft: &mut Draft) {
    let spans: Vec<_> = html.select(&HEADING_SPAN).collect();
    match (spans.first(), spans.last()) {
        (Some(name), Some(number)) => {
            draft.name = text_of(*name);
            draft.raw_number = text_of(*number);
        }
        _ => draft.fault(ExtractFault::Missing("card number")),
    }
    tracing::debug!(card_number = draft.raw_number, "start card");

    let heading = first(html, &HEADING).map(text_of).unwrap_or_default();
    match set_name(&heading) {
        Some(set_name) => draft.set_name = set_name,
        None => draft.fault(ExtractFault::Missing("set name")),
    }
    match first(html, &IMAGE).and_then(|img| img.value().attr("src")) {
        Some(src) => draft.image_src = src.to_string(),
        None => draft.fault(ExtractFault::Missing("image")),
    }

    for unit in html.select(&UNIT) {
        let text = text_of(unit);
        let Some((label, value)) = text.split_once('：') else {
            draft.fault(ExtractFault::UnknownDetail(text));
            continue;
        };
        let value = value.trim();
        match label.trim() {
            "色" => match icons::icon_code(unit) {
                Some(color) => draft.set(Field::Color, color),
                None => draft.fault(ExtractFault::Missing("color")),
            },
            "種類" => draft.set_type(value),
            "コスト" => draft.set(Field::Cost, value),
            "フレーバー" => draft.set(Field::Flavor, value),
            "レベル" => draft.set(Field::Level, value),
            "パワー" => draft.set(Field::Power, value),
            "レアリティ" => draft.set(Field::Rarity, value),
            "サイド" => match icons::icon_code(unit) {
                Some(side) => draft.set(Field::Side, side),
                None => draft.fault(ExtractFault::Missing("side")),
            },
            "ソウル" => match icons::icon_count(unit) {
                0 => draft.set(Field::Soul, value),
                souls => draft.set(Field::Soul, souls.to_string()),
            },
            "トリガー" => draft.set(Field::Triggers, icons::trigger_names(unit).join(" ")),
            "特徴" => draft.set(Field::Traits, value),
            _ => draft.fault(ExtractFault::UnknownDetail(text.clone())),
        }
    }

    match last(html, &SPAN) {
        Some(ability) => draft.text = icons::ability_lines(ability),
        None => draft.fault(ExtractFault::Missing("ability text")),
    }
}

/// The set name is whatever follows `) -` in the heading.
fn set_name(heading: &str) -> Option<String> {
    let (_, set) = heading.split_once(") -")?;
    Some(set.trim().to_string())
}
