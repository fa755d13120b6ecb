//! Icons the sites use in place of text: triggers, colors, sides, and the
//! icons embedded in ability text.

use scraper::{ElementRef, Node};

/// Symbolic name of a trigger icon, `""` when the icon is not known.
pub fn trigger_name(stem: &str) -> &'static str {
    match stem {
        "soul" => "SOUL",
        "salvage" => "COMEBACK",
        "draw" => "DRAW",
        "stock" => "POOL",
        "treasure" => "TREASURE",
        "shot" => "SHOT",
        "bounce" => "RETURN",
        "gate" => "GATE",
        "standby" => "STANDBY",
        "choice" => "CHOICE",
        _ => "",
    }
}

/// File name of `src` without directories or extension:
/// `/wp/partimages/soul.gif` gives `soul`.
pub fn icon_stem(src: &str) -> &str {
    let path = src.split(['?', '#']).next().unwrap_or_default();
    let file = path.rsplit('/').next().unwrap_or_default();
    file.split('.').next().unwrap_or_default()
}

/// Uppercased stem of the first image under `el`, used for colors and sides.
pub fn icon_code(el: ElementRef<'_>) -> Option<String> {
    first_image_src(el).map(|src| icon_stem(src).to_uppercase())
}

/// Trigger names of the images directly under `el`, in document order.
pub fn trigger_names(el: ElementRef<'_>) -> Vec<&'static str> {
    el.children()
        .filter_map(ElementRef::wrap)
        .filter(|child| child.value().name() == "img")
        .map(|img| {
            let stem = icon_stem(img.value().attr("src").unwrap_or_default());
            let name = trigger_name(stem);
            if name.is_empty() {
                tracing::warn!(icon = stem, "unknown trigger icon");
            }
            name
        })
        .collect()
}

/// Number of icon images directly under `el`.
pub fn icon_count(el: ElementRef<'_>) -> usize {
    el.children()
        .filter_map(ElementRef::wrap)
        .filter(|child| child.value().name() == "img")
        .count()
}

/// Ability text of `el` split on its line breaks. Inline icons become
/// `[NAME]` tokens at the position they appear.
pub fn ability_lines(el: ElementRef<'_>) -> Vec<String> {
    let mut lines = Vec::new();
    let mut current = String::new();
    collect_ability(el, &mut lines, &mut current);
    lines.push(current);
    lines
        .into_iter()
        .map(|line| line.trim().to_string())
        .filter(|line| !line.is_empty())
        .collect()
}

fn collect_ability(el: ElementRef<'_>, lines: &mut Vec<String>, current: &mut String) {
    for child in el.children() {
        match child.value() {
            Node::Text(text) => current.push_str(text),
            Node::Element(element) => match element.name() {
                "br" => lines.push(std::mem::take(current)),
                "img" => {
                    let stem = icon_stem(element.attr("src").unwrap_or_default());
                    current.push('[');
                    current.push_str(trigger_name(stem));
                    current.push(']');
                }
                _ => {
                    if let Some(nested) = ElementRef::wrap(child) {
                        collect_ability(nested, lines, current);
                    }
                }
            },
            _ => {}
        }
    }
}

fn first_image_src(el: ElementRef<'_>) -> Option<&str> {
    if el.value().name() == "img" {
        return el.value().attr("src");
    }
    el.descendants()
        .filter_map(ElementRef::wrap)
        .find(|node| node.value().name() == "img")
        .and_then(|img| img.value().attr("src"))
}

#[cfg(test)]
mod tests {
    use scraper::{Html, Selector};

    use super::*;

    fn first<'a>(html: &'a Html, selector: &str) -> ElementRef<'a> {
        let selector = Selector::parse(selector).expect("valid selector");
        html.select(&selector).next().expect("element present")
    }

    #[test]
    fn stems() {
        assert_eq!(icon_stem("/wp/partimages/soul.gif"), "soul");
        assert_eq!(icon_stem("https://x.test/a/bounce.png?v=2"), "bounce");
        assert_eq!(icon_stem("gate"), "gate");
        assert_eq!(icon_stem(""), "");
    }

    #[test]
    fn unknown_icons_map_to_empty() {
        assert_eq!(trigger_name("bounce"), "RETURN");
        assert_eq!(trigger_name("salvage"), "COMEBACK");
        assert_eq!(trigger_name("sparkle"), "");
    }

    #[test]
    fn rewrites_inline_icons_in_order() {
        let html = Html::parse_fragment(
            r#"<p>A <img src="/p/choice.gif"> then <img src="/p/gate.gif">.<br>(<img src="/p/bounce.gif">: back) &amp; done<br></p>"#,
        );
        assert_eq!(
            ability_lines(first(&html, "p")),
            vec!["A [CHOICE] then [GATE].", "([RETURN]: back) & done"]
        );
    }

    #[test]
    fn keeps_text_of_nested_markup() {
        let html = Html::parse_fragment("<p>  <b>【AUTO】</b> text\n more <br>  <br>last</p>");
        assert_eq!(
            ability_lines(first(&html, "p")),
            vec!["【AUTO】 text\n more", "last"]
        );
    }

    #[test]
    fn rewriting_does_not_touch_the_document() {
        let html = Html::parse_fragment(r#"<p>x <img src="/p/soul.gif"></p>"#);
        let p = first(&html, "p");
        assert_eq!(ability_lines(p), ability_lines(p));
        assert_eq!(icon_count(p), 1);
    }

    #[test]
    fn trigger_names_follow_document_order() {
        let html = Html::parse_fragment(
            r#"<dd><img src="/p/soul.gif"><img src="/p/sparkle.gif"><img src="/p/draw.gif"></dd>"#,
        );
        let dd = first(&html, "dd");
        assert_eq!(trigger_names(dd), vec!["SOUL", "", "DRAW"]);
        assert_eq!(icon_code(dd).as_deref(), Some("SOUL"));
    }
}
