use scraper::Html;

use super::{first, last, text_of, Draft, Field};
use crate::{icons, ExtractFault};

selector!(TEXT_AREA, ".p-cards__detail-textarea");
selector!(NUMBER, ".number");
selector!(TITLE, ".ttl");
selector!(IMAGE, "div.image img");
selector!(DETAIL, "dl");
selector!(DT, "dt");
selector!(DD, "dd");
selector!(FLAVOR, ".p-cards__detail-serif");
selector!(ABILITY, ".p-cards__detail p");

/// Reads a `.p-cards__detail-wrapper` detail block.
pub(super) fn read(html: &Html, draft: &mut Draft) {
    let text_area = last(html, &TEXT_AREA);
    match text_area.and_then(|area| area.select(&NUMBER).next()) {
        Some(number) => draft.raw_number = text_of(number),
        None => draft.fault(ExtractFault::Missing("card number")),
    }
    tracing::debug!(card_number = draft.raw_number, "start card");

    match last(html, &TITLE) {
        Some(title) => draft.name = text_of(title),
        None => draft.fault(ExtractFault::Missing("name")),
    }
    match first(html, &IMAGE).and_then(|img| img.value().attr("src")) {
        Some(src) => draft.image_src = src.to_string(),
        None => draft.fault(ExtractFault::Missing("image")),
    }

    for dl in html.select(&DETAIL) {
        let (Some(dt), Some(dd)) = (dl.select(&DT).next(), dl.select(&DD).next()) else {
            continue;
        };
        let label = text_of(dt);
        let value = text_of(dd);
        match label.as_str() {
            "Card Type" => draft.set_type(&value),
            "Color" => match icons::icon_code(dd) {
                Some(color) => draft.set(Field::Color, color),
                None => draft.fault(ExtractFault::Missing("color")),
            },
            "Cost" => draft.set(Field::Cost, value),
            "Expansion" => draft.set(Field::Expansion, value),
            "Level" => draft.set(Field::Level, value),
            "Power" => draft.set(Field::Power, value),
            "Rarity" => draft.set(Field::Rarity, value),
            "Side" => match icons::icon_code(dd) {
                Some(side) => draft.set(Field::Side, side),
                None => draft.fault(ExtractFault::Missing("side")),
            },
            "Soul" => match icons::icon_count(dd) {
                0 => draft.set(Field::Soul, value),
                souls => draft.set(Field::Soul, souls.to_string()),
            },
            "Traits" => draft.set(Field::Traits, value),
            "Trigger" => draft.set(Field::Triggers, icons::trigger_names(dd).join(" ")),
            _ => draft.fault(ExtractFault::UnknownDetail(label)),
        }
    }

    if let Some(flavor) = text_area.and_then(|area| area.select(&FLAVOR).next()) {
        draft.set(Field::Flavor, text_of(flavor));
    }

    match last(html, &ABILITY) {
        Some(ability) => draft.text = icons::ability_lines(ability),
        None => draft.fault(ExtractFault::Missing("ability text")),
    }
}
