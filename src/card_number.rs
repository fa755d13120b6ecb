//! Decomposition of card numbers such as `BD/W63-036SPMa` into their parts.

use std::sync::LazyLock;

use regex::Regex;

static STANDARD_CARD_NUMBER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?P<set>[a-zA-Z0-9]+)/(?P<release>[a-zA-Z0-9-]+)-(?P<id>[a-zA-Z0-9]+\+?)$")
        .expect("valid card number regex")
});

static STANDARD_RELEASE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?P<code>[a-zA-Z-]+)(?P<pack>[0-9]+)").expect("valid release regex")
});

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CardNumber {
    pub set_id: String,
    pub release: String,
    pub release_pack_id: String,
    pub sequence_id: String,
}

/// Repairs the card number quirks of the site.
///
/// `%2B` is shown instead of `+` for some rarities (`SSP+`), and a `+` is
/// sometimes printed where a space belongs (`RWBY/BRO2021-01+PR`). Only a
/// trailing `+` is kept.
pub fn sanitize(raw: &str) -> String {
    let cn = raw.trim().replace("%2B", "+").replace("%2b", "+");
    let pluses = cn.matches('+').count();
    if pluses == 0 {
        return cn;
    }
    let replace = if cn.ends_with('+') {
        pluses - 1
    } else {
        pluses
    };
    cn.replacen('+', " ", replace)
}

/// Splits a sanitized card number. Never fails: parts that can't be found
/// are left empty.
pub fn parse(cn: &str) -> CardNumber {
    if let Some(caps) = STANDARD_CARD_NUMBER.captures(cn) {
        let release = caps["release"].to_string();
        return CardNumber {
            set_id: caps["set"].to_string(),
            release_pack_id: pack_id(&release),
            release,
            sequence_id: caps["id"].to_string(),
        };
    }

    let Some((set_id, rest)) = cn.split_once('/') else {
        tracing::error!(card_number = cn, "can't get set info from card number");
        return CardNumber::default();
    };
    let mut number = CardNumber {
        set_id: set_id.to_string(),
        ..CardNumber::default()
    };
    // Only the segment up to the next `/`, and in it the first two `-` parts.
    let mut parts = rest.split('/').next().unwrap_or_default().split('-');
    if let (Some(release), Some(id)) = (parts.next(), parts.next()) {
        number.release_pack_id = pack_id(release);
        number.release = release.to_string();
        number.sequence_id = id.to_string();
    }
    number
}

fn pack_id(release: &str) -> String {
    STANDARD_RELEASE
        .captures(release)
        .map(|caps| caps["pack"].to_string())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn check(raw: &str, [set, release, pack, id]: [&str; 4]) {
        let n = parse(&sanitize(raw));
        assert_eq!(n.set_id, set, "set of {raw}");
        assert_eq!(n.release, release, "release of {raw}");
        assert_eq!(n.release_pack_id, pack, "pack of {raw}");
        assert_eq!(n.sequence_id, id, "sequence of {raw}");
    }

    #[test]
    fn sanitize_restores_encoded_plus() {
        assert_eq!(sanitize("TSK/S82-E070SSP%2B"), "TSK/S82-E070SSP+");
    }

    #[test]
    fn sanitize_turns_inner_plus_into_space() {
        assert_eq!(sanitize("RWBY/BRO2021-01+PR"), "RWBY/BRO2021-01 PR");
        assert_eq!(sanitize("A/B+C-01+"), "A/B C-01+");
        assert_eq!(sanitize("BD/W63-036"), "BD/W63-036");
    }

    #[test]
    fn standard_numbers() {
        check("BD/W63-036SPMa", ["BD", "W63", "63", "036SPMa"]);
        check("FS/BCS2019-03", ["FS", "BCS2019", "2019", "03"]);
        check("BFR/BSL2021-03S", ["BFR", "BSL2021", "2021", "03S"]);
        check("TSK/S82-E070SSP%2B", ["TSK", "S82", "82", "E070SSP+"]);
    }

    #[test]
    fn hyphenated_release() {
        check("BD/EN-W03-004", ["BD", "EN-W03", "03", "004"]);
    }

    #[test]
    fn release_without_pack_number() {
        check("WS/TCPR-P01", ["WS", "TCPR", "", "P01"]);
    }

    #[test]
    fn falls_back_to_permissive_split() {
        check("RWBY/BRO2021-01+PR", ["RWBY", "BRO2021", "2021", "01 PR"]);
        check("XX/PROMO", ["XX", "", "", ""]);
    }

    #[test]
    fn permissive_split_stops_at_the_next_separator() {
        check("PR/X Y-01-02", ["PR", "X Y", "", "01"]);
        check("PR/X-01/02", ["PR", "X", "", "01"]);
    }

    #[test]
    fn no_slash_leaves_everything_empty() {
        assert_eq!(parse("PROMO-01"), CardNumber::default());
        assert_eq!(parse(""), CardNumber::default());
    }

    #[test]
    fn strict_matches_always_have_set_and_sequence() {
        for raw in [
            "BD/W63-036SPMa",
            "ATLA/WX04-007S",
            "SS/WE41-E59SHP",
            "TSK/S82-E070SSP%2B",
            "BD/EN-W03-004",
            "WS/TCPR-P01",
            "DC/W01-001+",
        ] {
            let cn = sanitize(raw);
            assert!(STANDARD_CARD_NUMBER.is_match(&cn), "{cn} is not standard");
            let n = parse(&cn);
            assert!(!n.set_id.is_empty(), "{raw}: empty set id");
            assert!(!n.sequence_id.is_empty(), "{raw}: empty sequence id");
        }
    }
}
