// src/normalize/mod.rs

//! Record normalization.
//!
//! Raw records arrive with markdown artifacts, HTML entities, stray
//! unicode, doubled text, and free-form date fields. The normalizer turns
//! each one into a clean [`Event`] or rejects it with a reason.

mod dates;

pub use dates::{resolve_date, resolve_start, resolve_time, ResolvedTime};

use std::sync::OnceLock;

use chrono_tz::Tz;
use regex::Regex;

use crate::error::{AppError, Result};
use crate::models::{DateWindow, Event, EventLink, EventStart};
use crate::sources::{RawRecord, NOT_FOUND};
use crate::utils::fix_double_slash;

fn markdown_patterns() -> &'static [(Regex, &'static str)] {
    static PATTERNS: OnceLock<Vec<(Regex, &'static str)>> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        vec![
            // Images vanish entirely, links keep their text
            (Regex::new(r"!\[[^\]]*\]\([^)]*\)").unwrap(), ""),
            (Regex::new(r"\[([^\]]*)\]\([^)]*\)").unwrap(), "$1"),
            (Regex::new(r"\*\*([^*]*)\*\*").unwrap(), "$1"),
            (Regex::new(r"^\s*(?:Event )?[Ll]ocation:\s*").unwrap(), ""),
        ]
    })
}

/// Clean one text field.
///
/// Strips non-ASCII and zero-width characters, markdown artifacts,
/// "Location:" prefixes, collapses whitespace, and undoes the
/// duplicated-text glitch some listing pages emit (the same string
/// concatenated with itself). Idempotent.
pub fn clean_text(text: &str) -> String {
    let ascii: String = text
        .chars()
        .filter(|c| c.is_ascii() && *c != '\u{0}')
        .collect();

    let mut cleaned = ascii;
    for (pattern, replacement) in markdown_patterns() {
        cleaned = pattern.replace_all(&cleaned, *replacement).into_owned();
    }

    let mut cleaned = cleaned
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .trim()
        .to_string();

    // "Storytime at 10 Storytime at 10" -> "Storytime at 10"
    // The string is pure ASCII here, so byte indexing is safe.
    let n = cleaned.len();
    if n > 20 {
        let half = n / 2;
        let duplicated = if n % 2 == 0 {
            cleaned[..half] == cleaned[half..]
        } else {
            cleaned.as_bytes()[half] == b' ' && cleaned[..half] == cleaned[half + 1..]
        };
        if duplicated {
            cleaned.truncate(half);
            cleaned = cleaned.trim_end().to_string();
        }
    }

    cleaned
}

/// Convert an HTML fragment into cleaned plain text.
///
/// Good enough for the short description snippets feeds emit; this is
/// not a general HTML renderer.
pub fn html_to_text(html: &str) -> String {
    static TAGS: OnceLock<Regex> = OnceLock::new();
    static BREAKS: OnceLock<Regex> = OnceLock::new();
    let breaks = BREAKS.get_or_init(|| Regex::new(r"(?i)<br\s*/?>|</p>|</div>|</li>").unwrap());
    let tags = TAGS.get_or_init(|| Regex::new(r"<[^>]+>").unwrap());

    let spaced = breaks.replace_all(html, " ");
    let stripped = tags.replace_all(&spaced, "");
    let unescaped = stripped
        .replace("&amp;", "&")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&nbsp;", " ");
    clean_text(&unescaped)
}

fn age_vocabulary() -> &'static [(Regex, &'static str)] {
    static VOCAB: OnceLock<Vec<(Regex, &'static str)>> = OnceLock::new();
    VOCAB.get_or_init(|| {
        // Order matters: the first match wins, so the most specific
        // audiences come first.
        vec![
            (
                Regex::new(r"(?i)\b(baby|babies|infant|toddler)s?\b").unwrap(),
                "Baby/Toddler",
            ),
            (
                Regex::new(r"(?i)\b(preschool|pre-school|early elementary)\b").unwrap(),
                "Preschool/Early Elementary",
            ),
            (
                Regex::new(r"(?i)\b(elementary|grade school)\b").unwrap(),
                "Elementary",
            ),
            (
                Regex::new(r"(?i)\b(middle school|tween)s?\b").unwrap(),
                "Middle School/Teen",
            ),
            (
                Regex::new(r"(?i)\b(teen|young adult|high school)s?\b").unwrap(),
                "Teen/Young Adult",
            ),
            (
                Regex::new(r"(?i)\b(adult|senior|grown-?up)s?\b").unwrap(),
                "Adult",
            ),
            (
                Regex::new(r"(?i)\b(famil(y|ies)|all ages|everyone)\b").unwrap(),
                "Family/All Ages",
            ),
            (
                Regex::new(r"(?i)\b(kid|child|children)s?\b").unwrap(),
                "Kids",
            ),
        ]
    })
}

/// Infer an audience label from free text.
///
/// Falls back to `"General"` when nothing in the vocabulary matches.
pub fn extract_age_group(text: &str) -> &'static str {
    for (pattern, label) in age_vocabulary() {
        if pattern.is_match(text) {
            return label;
        }
    }
    "General"
}

/// Turns raw records into events against one timezone and fetch window.
pub struct Normalizer {
    tz: Tz,
    window: DateWindow,
}

impl Normalizer {
    pub fn new(tz: Tz, window: DateWindow) -> Self {
        Self { tz, window }
    }

    /// Normalize one record.
    ///
    /// Fails when the title is empty after cleaning or the date cannot be
    /// resolved; callers log the reason and drop the record rather than
    /// aborting the source.
    pub fn normalize(&self, raw: &RawRecord) -> Result<Event> {
        let title = clean_text(&raw.title);
        if title.is_empty() || title == NOT_FOUND {
            return Err(AppError::parse(format!(
                "{}: record has no usable title",
                raw.source
            )));
        }

        let start = resolve_start(&raw.date_text, &raw.time_text, self.tz, &self.window)
            .ok_or_else(|| {
                AppError::parse(format!(
                    "{}: unresolvable date '{}' for '{}'",
                    raw.source, raw.date_text, title
                ))
            })?;

        let display_time = match &start {
            EventStart::AllDay(_) => "All Day".to_string(),
            EventStart::Timed(dt) => dt.format("%l:%M %p").to_string().trim().to_string(),
        };

        let age_source = clean_text(&raw.age_group);
        let age_group = if age_source.is_empty() || age_source == NOT_FOUND {
            extract_age_group(&format!("{} {}", title, raw.description)).to_string()
        } else {
            extract_age_group(&age_source).to_string()
        };

        let link = match raw.link.as_deref() {
            Some(url) if url.starts_with("http") => EventLink::Url(fix_double_slash(url)),
            _ => EventLink::Unavailable,
        };

        Ok(Event {
            source: raw.source.clone(),
            title,
            start,
            display_time,
            location: non_empty_or(clean_text(&raw.location), NOT_FOUND),
            age_group,
            category: non_empty_or(clean_text(&raw.category), NOT_FOUND),
            description: non_empty_or(clean_text(&raw.description), NOT_FOUND),
            link,
        })
    }

    /// Whether the event's local date falls inside the fetch window.
    pub fn in_window(&self, event: &Event) -> bool {
        self.window.contains(event.start.local_date())
    }
}

fn non_empty_or(value: String, fallback: &str) -> String {
    if value.is_empty() {
        fallback.to_string()
    } else {
        value
    }
}
