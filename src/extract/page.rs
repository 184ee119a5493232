//! Parsed page wrapper with the lookups strategies and the challenge detector share.
//!
//! `scraper::Html` is not `Send`, so a `Page` lives inside one synchronous
//! parse-detect-extract step and never crosses an await.

use scraper::{ElementRef, Html, Selector};
use url::Url;

pub struct Page {
    html: Html,
    url: Url,
}

impl Page {
    pub fn parse(html: &str, url: Url) -> Self {
        Self {
            html: Html::parse_document(html),
            url,
        }
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn html(&self) -> &Html {
        &self.html
    }

    /// All elements matching `css`. An invalid selector matches nothing.
    pub fn select_all(&self, css: &str) -> Vec<ElementRef<'_>> {
        match Selector::parse(css) {
            Ok(selector) => self.html.select(&selector).collect(),
            Err(_) => Vec::new(),
        }
    }

    pub fn first(&self, css: &str) -> Option<ElementRef<'_>> {
        let selector = Selector::parse(css).ok()?;
        self.html.select(&selector).next()
    }

    /// First non-empty, whitespace-normalised text among `selectors`, tried in order.
    pub fn first_text(&self, selectors: &[&str]) -> Option<String> {
        selectors.iter().find_map(|css| {
            self.select_all(css)
                .into_iter()
                .map(element_text)
                .find(|t| !t.is_empty())
        })
    }

    /// First non-empty attribute value among `selectors`, tried in order.
    pub fn first_attr(&self, selectors: &[&str], attr: &str) -> Option<String> {
        selectors.iter().find_map(|css| {
            self.select_all(css).into_iter().find_map(|el| {
                el.value()
                    .attr(attr)
                    .map(str::trim)
                    .filter(|v| !v.is_empty())
                    .map(str::to_string)
            })
        })
    }

    pub fn exists(&self, css: &str) -> bool {
        self.first(css).is_some()
    }

    /// `<meta>` content looked up by `property`, then `name`, then `itemprop`.
    pub fn meta(&self, key: &str) -> Option<String> {
        ["property", "name", "itemprop"].iter().find_map(|attr| {
            self.first(&format!("meta[{attr}=\"{key}\"]"))
                .and_then(|el| el.value().attr("content"))
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .map(str::to_string)
        })
    }

    pub fn title(&self) -> Option<String> {
        self.first("title").map(element_text).filter(|t| !t.is_empty())
    }

    /// Visible-ish body text: every text node outside script, style, noscript and template.
    pub fn body_text(&self) -> String {
        let root = self.first("body").unwrap_or_else(|| self.html.root_element());
        let mut out = String::new();
        for node in root.descendants() {
            let Some(text) = node.value().as_text() else {
                continue;
            };
            let hidden = node.ancestors().any(|a| {
                a.value()
                    .as_element()
                    .is_some_and(|e| matches!(e.name(), "script" | "style" | "noscript" | "template"))
            });
            if !hidden {
                out.push_str(text);
                out.push(' ');
            }
        }
        collapse_whitespace(&out)
    }

    /// Raw contents of every `application/ld+json` block that parses as JSON.
    pub fn json_ld_blocks(&self) -> Vec<serde_json::Value> {
        self.select_all("script[type=\"application/ld+json\"]")
            .into_iter()
            .filter_map(|el| {
                let raw: String = el.text().collect();
                serde_json::from_str(raw.trim()).ok()
            })
            .collect()
    }

    /// Text of a `<script id=..>` block, e.g. `__NEXT_DATA__`.
    pub fn script_json(&self, id: &str) -> Option<serde_json::Value> {
        let el = self.first(&format!("script#{id}"))?;
        let raw: String = el.text().collect();
        serde_json::from_str(raw.trim()).ok()
    }

    /// Resolve a possibly-relative link against the page URL.
    pub fn absolutize(&self, link: &str) -> Option<String> {
        let link = link.trim();
        if link.is_empty() || link.starts_with("data:") {
            return None;
        }
        self.url.join(link).ok().map(|u| u.to_string())
    }
}

// ---------------------------------------------------------------------------
// Element helpers
// ---------------------------------------------------------------------------

pub fn element_text(el: ElementRef<'_>) -> String {
    collapse_whitespace(&el.text().collect::<Vec<_>>().join(" "))
}

pub fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Descendants of `el` matching `css`. An invalid selector matches nothing.
pub fn select_within<'a>(el: ElementRef<'a>, css: &str) -> Vec<ElementRef<'a>> {
    match Selector::parse(css) {
        Ok(selector) => el.select(&selector).collect(),
        Err(_) => Vec::new(),
    }
}

pub fn first_within<'a>(el: ElementRef<'a>, css: &str) -> Option<ElementRef<'a>> {
    let selector = Selector::parse(css).ok()?;
    el.select(&selector).next()
}

/// First usable image reference on an element: `src`, lazy-load attributes, then `content`.
pub fn image_source(el: ElementRef<'_>) -> Option<String> {
    ["src", "data-src", "data-old-hires", "content"]
        .iter()
        .filter_map(|attr| el.value().attr(attr))
        .map(str::trim)
        .find(|v| !v.is_empty())
        .map(str::to_string)
}

/// Elements of `el` itself and its ancestors, innermost first.
fn self_and_ancestors<'a>(el: ElementRef<'a>) -> impl Iterator<Item = ElementRef<'a>> {
    std::iter::once(el).chain(el.ancestors().filter_map(ElementRef::wrap))
}

fn style_of(el: &ElementRef<'_>) -> String {
    el.value()
        .attr("style")
        .unwrap_or_default()
        .to_ascii_lowercase()
        .replace(' ', "")
}

/// Markup-level stand-in for "has a non-zero bounding box".
pub fn is_rendered(el: ElementRef<'_>) -> bool {
    !self_and_ancestors(el).any(|e| {
        let v = e.value();
        let style = style_of(&e);
        let zero_box = style.split(';').any(|decl| {
            matches!(decl, "width:0" | "width:0px" | "height:0" | "height:0px")
        });
        v.attr("hidden").is_some()
            || (v.name() == "input" && v.attr("type") == Some("hidden"))
            || style.contains("display:none")
            || style.contains("visibility:hidden")
            || zero_box
            || v.attr("width").map(str::trim) == Some("0")
            || v.attr("height").map(str::trim) == Some("0")
    })
}

/// True for prices shown as the struck-through original.
pub fn is_struck_through(el: ElementRef<'_>) -> bool {
    self_and_ancestors(el).take(4).any(|e| {
        let v = e.value();
        let class = v.attr("class").unwrap_or_default().to_ascii_lowercase();
        matches!(v.name(), "s" | "del" | "strike")
            || style_of(&e).contains("line-through")
            || v.attr("data-a-strike") == Some("true")
            || ["strike", "old-price", "was-price", "price--old", "original-price", "regular-price"]
                .iter()
                .any(|c| class.contains(c))
    })
}

/// Purchase controls rendered disabled.
pub fn is_disabled(el: ElementRef<'_>) -> bool {
    let v = el.value();
    let class = v.attr("class").unwrap_or_default().to_ascii_lowercase();
    v.attr("disabled").is_some()
        || v.attr("aria-disabled") == Some("true")
        || class.split_whitespace().any(|c| c == "disabled" || c.ends_with("--disabled"))
}
