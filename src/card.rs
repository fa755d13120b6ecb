use std::fmt;

/// Version of the serialized card shape.
pub const FORMAT_VERSION: &str = "1";

const BASE_RARITIES: [&str; 14] = [
    "C", "CC", "CR", "FR", "MR", "PR", "PS", "R", "RE", "RR", "RR+", "TD", "U", "AR",
];

const FOIL_SUFFIXES: [&str; 3] = ["SP", "S", "R"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Deserialize, serde::Serialize)]
pub enum CardType {
    #[serde(rename = "CH")]
    Character,
    #[serde(rename = "EV")]
    Event,
    #[serde(rename = "CX")]
    Climax,
}

impl CardType {
    pub fn code(&self) -> &'static str {
        match self {
            CardType::Character => "CH",
            CardType::Event => "EV",
            CardType::Climax => "CX",
        }
    }
}

impl fmt::Display for CardType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// One printed card as listed on the official site.
///
/// Numeric fields hold the printed number as a string, or `""` when the field
/// does not apply to the card (the site shows a dash). `""` never means zero.
#[derive(Debug, Clone, Default, PartialEq, serde::Deserialize, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Card {
    /// Card number as printed on the site, after sanitizing.
    pub card_number: String,
    /// Alphanumeric code before the `/`.
    pub set_id: String,
    /// JP only.
    pub set_name: String,
    pub expansion_name: String,
    /// `W` for Weiß, `S` for Schwarz.
    pub side: String,
    /// Usually the side followed by the pack number (`W64`), but promos and
    /// special sets differ (`BSF2024`, `EN-W03`).
    pub release: String,
    /// Best-effort numeric part of the release (`2021` from `BSL2021`). Empty
    /// when there is none (`TCPR`).
    pub release_pack_id: String,
    /// Sequence of the card within the set and release.
    #[serde(rename = "id")]
    pub sequence_id: String,
    pub language: String,
    #[serde(rename = "type")]
    pub card_type: Option<CardType>,
    pub name: String,
    pub color: String,
    pub cost: String,
    pub level: String,
    /// Characters and events only.
    pub power: String,
    /// Characters only.
    pub soul: String,
    /// Ability lines, with inline icons rewritten to `[NAME]` tokens.
    pub text: Vec<String>,
    pub traits: Vec<String>,
    pub triggers: Vec<String>,
    pub flavor_text: String,
    #[serde(rename = "imageURL")]
    pub image_url: String,
    pub rarity: String,
    #[serde(rename = "version")]
    pub format_version: String,
    #[serde(skip)]
    pub image: Option<image::DynamicImage>,
}

impl Card {
    /// C / U / R / RR style rarities that are not foil variants.
    pub fn is_base_rarity(&self) -> bool {
        BASE_RARITIES.contains(&self.rarity.as_str())
            && !FOIL_SUFFIXES
                .iter()
                .any(|suffix| self.sequence_id.ends_with(suffix))
    }
}

/// Cards sharing a release code.
#[derive(Debug, Clone, Default, PartialEq, serde::Deserialize, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Booster {
    pub release_code: String,
    pub cards: Vec<Card>,
}
