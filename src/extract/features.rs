//! Feature and specification lists for `details.features`.
//!
//! Sources in priority order: label/value specification rows, bullet lists
//! (store selectors, then any list under a features/details heading), then a
//! `Key: Value, Key: Value.` split of a short description.

use super::page::{element_text, first_within, select_within, Page};

const MAX_FEATURE_CHARS: usize = 200;
const MAX_FEATURES: usize = 40;
/// Longer descriptions are prose, not a spec line.
const SENTENCE_HEURISTIC_MAX_CHARS: usize = 600;

const HEADING_KEYWORDS: &[&str] = &[
    "feature",
    "detail",
    "specification",
    "caratteristiche",
    "dettagli",
    "specifiche",
];

const LABEL_SELECTORS: &str = "th, td:first-child, dt, .spec-label, .label";
const VALUE_SELECTORS: &str = "td:last-child, td.data, dd, .spec-value, .value";

pub fn extract_features(
    page: &Page,
    spec_rows: &[&str],
    bullets: &[&str],
    description: Option<&str>,
) -> Vec<String> {
    let from_table = spec_table(page, spec_rows);
    if !from_table.is_empty() {
        return from_table;
    }

    let mut from_bullets = bullet_items(page, bullets);
    if from_bullets.is_empty() {
        from_bullets = heading_lists(page);
    }
    if !from_bullets.is_empty() {
        return from_bullets;
    }

    description.map(key_value_sentences).unwrap_or_default()
}

fn usable(text: &str) -> bool {
    let len = text.chars().count();
    len > 2 && len < MAX_FEATURE_CHARS
}

fn push_unique(out: &mut Vec<String>, text: String) {
    if usable(&text) && !out.contains(&text) && out.len() < MAX_FEATURES {
        out.push(text);
    }
}

/// Rows with distinct label and value cells become `Label: Value`; list rows keep their text.
fn spec_table(page: &Page, rows: &[&str]) -> Vec<String> {
    let mut out = Vec::new();
    for css in rows {
        for row in page.select_all(css) {
            let label = first_within(row, LABEL_SELECTORS);
            let value = first_within(row, VALUE_SELECTORS);
            match (label, value) {
                (Some(l), Some(v)) if l.id() != v.id() => {
                    let (l, v) = (element_text(l), element_text(v));
                    if !l.is_empty() && !v.is_empty() {
                        push_unique(&mut out, format!("{}: {v}", l.trim_end_matches(':')));
                    }
                }
                _ if row.value().name() == "li" => push_unique(&mut out, element_text(row)),
                _ => {}
            }
        }
    }
    out
}

fn bullet_items(page: &Page, bullets: &[&str]) -> Vec<String> {
    let mut out = Vec::new();
    for css in bullets {
        for el in page.select_all(css) {
            push_unique(&mut out, element_text(el));
        }
        if !out.is_empty() {
            break;
        }
    }
    out
}

/// `<h2>Features</h2><ul>..</ul>`: the first list following a matching heading.
fn heading_lists(page: &Page) -> Vec<String> {
    let mut out = Vec::new();
    for heading in page.select_all("h2, h3, h4") {
        let label = element_text(heading).to_lowercase();
        if !HEADING_KEYWORDS.iter().any(|k| label.contains(k)) {
            continue;
        }
        let list = heading
            .next_siblings()
            .filter_map(scraper::ElementRef::wrap)
            .find(|el| matches!(el.value().name(), "ul" | "ol"));
        if let Some(list) = list {
            for item in select_within(list, "li") {
                push_unique(&mut out, element_text(item));
            }
        }
        if !out.is_empty() {
            break;
        }
    }
    out
}

/// "Colore: Nero, Memoria: 128 GB. Batteria: 100%" -> three features.
pub fn key_value_sentences(description: &str) -> Vec<String> {
    if description.chars().count() > SENTENCE_HEURISTIC_MAX_CHARS {
        return Vec::new();
    }
    let mut out = Vec::new();
    for piece in description.split(['.', ';', ',', '\n', '|']) {
        let Some((key, value)) = piece.split_once(':') else {
            continue;
        };
        let (key, value) = (key.trim(), value.trim());
        let key_words = key.split_whitespace().count();
        if !key.is_empty() && !value.is_empty() && key_words <= 4 && key.chars().count() <= 40 {
            push_unique(&mut out, format!("{key}: {value}"));
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use url::Url;

    fn page(html: &str) -> Page {
        Page::parse(html, Url::parse("https://shop.example.com/p").expect("url"))
    }

    #[test]
    fn spec_table_wins_over_bullets() {
        let p = page(
            r#"<table id="specs">
                 <tr><th>Memoria</th><td>128 GB</td></tr>
                 <tr><th>Colore:</th><td>Nero</td></tr>
               </table>
               <ul class="highlights"><li>Ignored bullet</li></ul>"#,
        );
        let features = extract_features(&p, &["#specs tr"], &[".highlights li"], None);
        assert_eq!(features, vec!["Memoria: 128 GB", "Colore: Nero"]);
    }

    #[test]
    fn bullets_used_when_no_table() {
        let p = page(r#"<ul class="highlights"><li>Display 6.1"</li><li>ok</li><li>Face ID</li></ul>"#);
        let features = extract_features(&p, &["#specs tr"], &[".highlights li"], None);
        assert_eq!(features, vec!["Display 6.1\"", "Face ID"], "short items are dropped");
    }

    #[test]
    fn list_under_features_heading() {
        let p = page(
            r#"<div><h3>Key Features</h3><p>intro</p><ul><li>Chip M2</li><li>8 GB RAM</li></ul></div>"#,
        );
        let features = extract_features(&p, &[], &[], None);
        assert_eq!(features, vec!["Chip M2", "8 GB RAM"]);
    }

    #[test]
    fn sentence_heuristic_as_last_resort() {
        let p = page("<p>nothing structured</p>");
        let features = extract_features(
            &p,
            &[],
            &[],
            Some("Colore: Nero, Memoria: 128 GB. Stato: Ottimo; this sentence has no pair"),
        );
        assert_eq!(features, vec!["Colore: Nero", "Memoria: 128 GB", "Stato: Ottimo"]);
    }

    #[test]
    fn long_prose_is_not_split() {
        let prose = format!("Intro: {}", "word ".repeat(200));
        assert!(key_value_sentences(&prose).is_empty());
    }
}
