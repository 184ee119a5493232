//! Automated-traffic challenge detection (CAPTCHA walls, browser checks).

use std::collections::{BTreeMap, VecDeque};
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use scraper::Selector;
use serde::Serialize;
use tracing::warn;

use crate::config::{CHALLENGE_BODY_SCAN_CHARS, CHALLENGE_CONFIDENCE_THRESHOLD, CHALLENGE_LOG_CAPACITY};
use crate::extract::page::{is_rendered, Page};

const TITLE_SCORE: u32 = 30;
const URL_SCORE: u32 = 25;
const VISIBLE_WIDGET_SCORE: u32 = 40;
const HIDDEN_WIDGET_SCORE: u32 = 20;
const TEXT_SCORE: u32 = 35;

const TITLE_PATTERNS: &[&str] = &[
    "captcha",
    "security check",
    "robot",
    "challenge",
    "verify you are human",
    "are you a robot",
    "not a robot",
    "access denied",
    "please verify",
    "unusual traffic",
    "automated access",
];

const URL_PATTERNS: &[&str] = &["/captcha", "/challenge", "/security-check", "/robot-check", "/validate"];

const TEXT_PATTERNS: &[&str] = &[
    "please complete the security check",
    "verify you are a human",
    "prove you are not a robot",
    "enable javascript and cookies",
    "checking your browser",
    "this process is automatic",
];

/// Known widget markup and the provider it identifies (None for generic matches).
const WIDGET_SIGNATURES: &[(&str, Option<ChallengeType>)] = &[
    ("iframe[src*=\"recaptcha\"]", Some(ChallengeType::Recaptcha)),
    (".g-recaptcha", Some(ChallengeType::Recaptcha)),
    ("#recaptcha", Some(ChallengeType::Recaptcha)),
    ("iframe[src*=\"hcaptcha\"]", Some(ChallengeType::Hcaptcha)),
    (".h-captcha", Some(ChallengeType::Hcaptcha)),
    ("iframe[src*=\"challenges.cloudflare\"]", Some(ChallengeType::Cloudflare)),
    ("#cf-wrapper", Some(ChallengeType::Cloudflare)),
    (".cf-browser-verification", Some(ChallengeType::Cloudflare)),
    ("#challenge-form", Some(ChallengeType::Cloudflare)),
    ("#challenge-running", Some(ChallengeType::Cloudflare)),
    ("form[action*=\"validateCaptcha\"]", Some(ChallengeType::AmazonCaptcha)),
    ("#captchacharacters", Some(ChallengeType::AmazonCaptcha)),
    ("[class*=\"captcha\"]", None),
    ("[id*=\"captcha\"]", None),
    ("form[action*=\"captcha\"]", None),
    ("iframe[src*=\"datadome\"]", Some(ChallengeType::DataDome)),
    ("iframe[src*=\"px-captcha\"]", Some(ChallengeType::PerimeterX)),
];

/// Challenge provider. Variant order is classification priority.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub enum ChallengeType {
    #[serde(rename = "reCAPTCHA")]
    Recaptcha,
    #[serde(rename = "hCaptcha")]
    Hcaptcha,
    Cloudflare,
    DataDome,
    PerimeterX,
    #[serde(rename = "Amazon CAPTCHA")]
    AmazonCaptcha,
    #[serde(rename = "Unknown")]
    Unknown,
}

impl std::fmt::Display for ChallengeType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ChallengeType::Recaptcha => "reCAPTCHA",
            ChallengeType::Hcaptcha => "hCaptcha",
            ChallengeType::Cloudflare => "Cloudflare",
            ChallengeType::DataDome => "DataDome",
            ChallengeType::PerimeterX => "PerimeterX",
            ChallengeType::AmazonCaptcha => "Amazon CAPTCHA",
            ChallengeType::Unknown => "Unknown",
        };
        write!(f, "{s}")
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ChallengeIndicator {
    Title { pattern: String },
    Url { pattern: String },
    Widget { selector: String, count: usize, visible: bool },
    Text { pattern: String },
}

impl std::fmt::Display for ChallengeIndicator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ChallengeIndicator::Title { pattern } => write!(f, "title:{pattern}"),
            ChallengeIndicator::Url { pattern } => write!(f, "url:{pattern}"),
            ChallengeIndicator::Widget { selector, .. } => write!(f, "selector:{selector}"),
            ChallengeIndicator::Text { pattern } => write!(f, "text:{pattern}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChallengeDetectionResult {
    pub detected: bool,
    pub challenge_type: Option<ChallengeType>,
    /// 0..=100
    pub confidence: u8,
    pub indicators: Vec<ChallengeIndicator>,
    pub url: String,
    pub inspected_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ChallengeStats {
    pub total_detections: usize,
    pub by_type: BTreeMap<String, usize>,
    pub recent_detections: Vec<ChallengeDetectionResult>,
}

struct WidgetSignature {
    css: &'static str,
    selector: Selector,
    provider: Option<ChallengeType>,
}

/// Scores a loaded page for challenge signals and keeps a ring log of positives.
pub struct ChallengeDetector {
    widgets: Vec<WidgetSignature>,
    log: Mutex<VecDeque<ChallengeDetectionResult>>,
}

impl ChallengeDetector {
    pub fn new() -> Self {
        let widgets = WIDGET_SIGNATURES
            .iter()
            .filter_map(|(css, provider)| {
                Selector::parse(css).ok().map(|selector| WidgetSignature {
                    css,
                    selector,
                    provider: *provider,
                })
            })
            .collect();
        Self {
            widgets,
            log: Mutex::new(VecDeque::with_capacity(CHALLENGE_LOG_CAPACITY)),
        }
    }

    pub fn inspect(&self, page: &Page) -> ChallengeDetectionResult {
        let mut score: u32 = 0;
        let mut indicators = Vec::new();
        let mut providers = Vec::new();

        let title = page.title().unwrap_or_default().to_lowercase();
        for pattern in TITLE_PATTERNS.iter().filter(|p| title.contains(*p)) {
            score += TITLE_SCORE;
            indicators.push(ChallengeIndicator::Title { pattern: pattern.to_string() });
        }

        let url = page.url().as_str().to_lowercase();
        for pattern in URL_PATTERNS.iter().filter(|p| url.contains(*p)) {
            score += URL_SCORE;
            indicators.push(ChallengeIndicator::Url { pattern: pattern.to_string() });
        }

        for widget in &self.widgets {
            let matches: Vec<_> = page.html().select(&widget.selector).collect();
            if matches.is_empty() {
                continue;
            }
            let visible = matches.iter().any(|el| is_rendered(*el));
            score += if visible { VISIBLE_WIDGET_SCORE } else { HIDDEN_WIDGET_SCORE };
            if let Some(provider) = widget.provider {
                providers.push(provider);
            }
            indicators.push(ChallengeIndicator::Widget {
                selector: widget.css.to_string(),
                count: matches.len(),
                visible,
            });
        }

        let body: String = page
            .body_text()
            .chars()
            .take(CHALLENGE_BODY_SCAN_CHARS)
            .collect::<String>()
            .to_lowercase();
        for pattern in TEXT_PATTERNS.iter().filter(|p| body.contains(*p)) {
            score += TEXT_SCORE;
            indicators.push(ChallengeIndicator::Text { pattern: pattern.to_string() });
        }

        let challenge_type = providers
            .into_iter()
            .min()
            .or_else(|| (!indicators.is_empty()).then_some(ChallengeType::Unknown));

        let confidence = score.min(100) as u8;
        let result = ChallengeDetectionResult {
            detected: confidence >= CHALLENGE_CONFIDENCE_THRESHOLD,
            challenge_type,
            confidence,
            indicators,
            url: page.url().to_string(),
            inspected_at: Utc::now(),
        };

        if result.detected {
            self.record(&result);
        }
        result
    }

    fn record(&self, result: &ChallengeDetectionResult) {
        let kind = result.challenge_type.unwrap_or(ChallengeType::Unknown);
        let indicators = result
            .indicators
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(", ");
        warn!(
            challenge_type = %kind,
            confidence = result.confidence,
            url = %result.url,
            "[CHALLENGE] detected {kind} ({}%) indicators: {indicators}",
            result.confidence
        );

        let mut log = match self.log.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        if log.len() == CHALLENGE_LOG_CAPACITY {
            log.pop_front();
        }
        log.push_back(result.clone());
    }

    pub fn stats(&self) -> ChallengeStats {
        let log = match self.log.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        let mut by_type = BTreeMap::new();
        for entry in log.iter() {
            let kind = entry.challenge_type.unwrap_or(ChallengeType::Unknown).to_string();
            *by_type.entry(kind).or_insert(0) += 1;
        }
        ChallengeStats {
            total_detections: log.len(),
            by_type,
            recent_detections: log.iter().rev().take(10).rev().cloned().collect(),
        }
    }

    pub fn clear(&self) {
        if let Ok(mut log) = self.log.lock() {
            log.clear();
        }
    }
}

impl Default for ChallengeDetector {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use url::Url;

    fn page_at(url: &str, html: &str) -> Page {
        Page::parse(html, Url::parse(url).expect("url"))
    }

    const PRODUCT_PAGE: &str = r#"<html><head><title>iPhone 13 128GB - Swappie</title></head>
        <body><h1>iPhone 13</h1><span class="price">€ 449,00</span></body></html>"#;

    #[test]
    fn ordinary_product_page_is_clean() {
        let detector = ChallengeDetector::new();
        let result = detector.inspect(&page_at("https://swappie.com/it/iphone-13", PRODUCT_PAGE));
        assert!(!result.detected);
        assert_eq!(result.confidence, 0);
        assert_eq!(result.challenge_type, None);
        assert_eq!(detector.stats().total_detections, 0);
    }

    #[test]
    fn cloudflare_interstitial_is_classified() {
        let detector = ChallengeDetector::new();
        let html = r#"<html><head><title>Just a moment...</title></head><body>
            <div id="cf-wrapper"><form id="challenge-form" action="/x"></form>
            <p>Checking your browser before accessing the site. This process is automatic.</p></div>
            </body></html>"#;
        let result = detector.inspect(&page_at("https://www.example.com/item", html));
        assert!(result.detected);
        assert_eq!(result.challenge_type, Some(ChallengeType::Cloudflare));
        assert_eq!(result.confidence, 100, "score is capped");
        assert!(result
            .indicators
            .iter()
            .any(|i| matches!(i, ChallengeIndicator::Text { pattern } if pattern == "checking your browser")));
    }

    #[test]
    fn amazon_captcha_form_and_url() {
        let detector = ChallengeDetector::new();
        let html = r#"<html><head><title>Amazon.it</title></head><body>
            <form action="/errors/validateCaptcha"><input id="captchacharacters" type="text"></form>
            </body></html>"#;
        let result = detector.inspect(&page_at("https://www.amazon.it/errors/validateCaptcha", html));
        assert!(result.detected);
        assert_eq!(result.challenge_type, Some(ChallengeType::AmazonCaptcha));
    }

    #[test]
    fn provider_beats_generic_and_recaptcha_wins_priority() {
        let detector = ChallengeDetector::new();
        let html = r#"<body><div class="g-recaptcha"></div><div id="challenge-running"></div></body>"#;
        let result = detector.inspect(&page_at("https://shop.example.com/p", html));
        assert_eq!(result.challenge_type, Some(ChallengeType::Recaptcha));
    }

    #[test]
    fn hidden_widget_scores_lower_than_visible() {
        let detector = ChallengeDetector::new();
        let visible = detector.inspect(&page_at(
            "https://shop.example.com/p",
            r#"<body><div class="h-captcha"></div></body>"#,
        ));
        let hidden = detector.inspect(&page_at(
            "https://shop.example.com/p",
            r#"<body><div style="display:none"><div class="h-captcha"></div></div></body>"#,
        ));
        assert!(visible.confidence > hidden.confidence);
        assert_eq!(visible.challenge_type, Some(ChallengeType::Hcaptcha));
    }

    #[test]
    fn title_only_signal_is_enough() {
        let detector = ChallengeDetector::new();
        let result = detector.inspect(&page_at(
            "https://shop.example.com/p",
            "<html><head><title>Access Denied</title></head><body></body></html>",
        ));
        assert!(result.detected);
        assert_eq!(result.confidence, 30);
        assert_eq!(result.challenge_type, Some(ChallengeType::Unknown));
    }

    #[test]
    fn body_phrases_beyond_scan_window_are_ignored() {
        let detector = ChallengeDetector::new();
        let filler = "a".repeat(CHALLENGE_BODY_SCAN_CHARS + 10);
        let html = format!("<body><p>{filler}</p><p>checking your browser</p></body>");
        let result = detector.inspect(&page_at("https://shop.example.com/p", &html));
        assert!(!result.detected);
    }

    #[test]
    fn ring_log_keeps_most_recent_hundred() {
        let detector = ChallengeDetector::new();
        let page = page_at(
            "https://shop.example.com/captcha",
            "<html><head><title>Robot check</title></head></html>",
        );
        for _ in 0..(CHALLENGE_LOG_CAPACITY + 5) {
            detector.inspect(&page);
        }
        let stats = detector.stats();
        assert_eq!(stats.total_detections, CHALLENGE_LOG_CAPACITY);
        assert_eq!(stats.recent_detections.len(), 10);
        assert_eq!(stats.by_type.get("Unknown"), Some(&CHALLENGE_LOG_CAPACITY));

        detector.clear();
        assert_eq!(detector.stats().total_detections, 0);
    }
}
