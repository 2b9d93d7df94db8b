// src/search/mod.rs

//! Multi-mode search over the aggregated collection.
//!
//! A [`Query`] is a compound predicate: source and category allow-lists,
//! an inclusive date range, and a free-text match in one of four modes.
//! Components are independently optional and combined with AND. Filtering
//! never re-sorts; results keep the collection's order.

use std::collections::HashSet;
use std::sync::OnceLock;

use chrono::NaiveDate;
use regex::Regex;
use strsim::normalized_levenshtein;

use crate::models::Event;

/// Similarity ratio a fuzzy match must reach.
pub const FUZZY_THRESHOLD: f64 = 0.65;

/// How free text is matched against the selected fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SearchMode {
    /// Any token appears in any selected field
    #[default]
    Any,
    /// Every token appears, independently, in the combined fields
    All,
    /// The full search string appears verbatim
    Exact,
    /// Similarity to a selected field exceeds [`FUZZY_THRESHOLD`]
    Fuzzy,
}

/// Event fields free text is matched against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchField {
    Title,
    Description,
    Location,
    AgeGroup,
}

impl SearchField {
    fn value<'a>(&self, event: &'a Event) -> &'a str {
        match self {
            SearchField::Title => &event.title,
            SearchField::Description => &event.description,
            SearchField::Location => &event.location,
            SearchField::AgeGroup => &event.age_group,
        }
    }
}

/// A compound search predicate. Empty sets mean "no constraint".
#[derive(Debug, Clone, Default)]
pub struct Query {
    sources: HashSet<String>,
    categories: HashSet<String>,
    after: Option<NaiveDate>,
    before: Option<NaiveDate>,
    text: Option<String>,
    fields: Vec<SearchField>,
    mode: SearchMode,
}

impl Query {
    pub fn new() -> Self {
        Self::default()
    }

    /// Restrict to the given sources.
    pub fn sources<I: IntoIterator<Item = S>, S: Into<String>>(mut self, sources: I) -> Self {
        self.sources = sources.into_iter().map(Into::into).collect();
        self
    }

    /// Restrict to events carrying any of the given categories.
    pub fn categories<I: IntoIterator<Item = S>, S: Into<String>>(mut self, categories: I) -> Self {
        self.categories = categories.into_iter().map(Into::into).collect();
        self
    }

    /// Keep events starting on or after the date.
    pub fn after(mut self, date: NaiveDate) -> Self {
        self.after = Some(date);
        self
    }

    /// Keep events starting on or before the date.
    pub fn before(mut self, date: NaiveDate) -> Self {
        self.before = Some(date);
        self
    }

    /// Keep events starting exactly on the date.
    pub fn on(self, date: NaiveDate) -> Self {
        self.after(date).before(date)
    }

    /// Free-text search term. Quoted phrases stay single tokens.
    pub fn text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    /// Fields the text is matched against; title, description, and
    /// location when unset.
    pub fn fields(mut self, fields: impl IntoIterator<Item = SearchField>) -> Self {
        self.fields = fields.into_iter().collect();
        self
    }

    pub fn mode(mut self, mode: SearchMode) -> Self {
        self.mode = mode;
        self
    }

    fn matches(&self, event: &Event) -> bool {
        if !self.sources.is_empty() && !self.sources.contains(&event.source) {
            return false;
        }
        if !self.categories.is_empty() {
            // The category field may hold a comma-separated list
            let any = event
                .category
                .split(',')
                .map(str::trim)
                .any(|part| self.categories.contains(part));
            if !any {
                return false;
            }
        }

        let day = event.start.local_date();
        if self.after.is_some_and(|start| day < start) {
            return false;
        }
        if self.before.is_some_and(|end| day > end) {
            return false;
        }

        self.matches_text(event)
    }

    fn matches_text(&self, event: &Event) -> bool {
        let Some(raw) = self.text.as_deref().map(str::trim).filter(|t| !t.is_empty())
        else {
            return true;
        };
        let raw = raw.to_lowercase();

        let fields: &[SearchField] = if self.fields.is_empty() {
            &[
                SearchField::Title,
                SearchField::Description,
                SearchField::Location,
            ]
        } else {
            &self.fields
        };
        let values: Vec<String> = fields
            .iter()
            .map(|f| f.value(event).to_lowercase())
            .collect();
        let combined = values.join(" ");
        let tokens = tokenize(&raw);

        match self.mode {
            SearchMode::Exact => combined.contains(&raw),
            SearchMode::Fuzzy => {
                let score = |needle: &str| {
                    values
                        .iter()
                        .filter(|v| !v.is_empty())
                        .map(|v| normalized_levenshtein(needle, v))
                        .fold(0.0f64, f64::max)
                };
                score(&raw) >= FUZZY_THRESHOLD
                    || tokens.iter().any(|t| score(t) >= FUZZY_THRESHOLD)
            }
            SearchMode::All => {
                combined.contains(&raw) || tokens.iter().all(|t| combined.contains(t.as_str()))
            }
            SearchMode::Any => {
                combined.contains(&raw) || tokens.iter().any(|t| combined.contains(t.as_str()))
            }
        }
    }
}

/// Split a search string into tokens, keeping quoted phrases whole.
fn tokenize(raw: &str) -> Vec<String> {
    static TOKEN: OnceLock<Regex> = OnceLock::new();
    let token = TOKEN.get_or_init(|| Regex::new(r#""([^"]+)"|(\S+)"#).unwrap());
    token
        .captures_iter(raw)
        .filter_map(|c| {
            c.get(1)
                .or_else(|| c.get(2))
                .map(|m| m.as_str().trim().to_string())
        })
        .filter(|t| !t.is_empty())
        .collect()
}

/// Evaluate a query over the sorted collection, preserving its order.
pub fn filter<'a>(events: &'a [Event], query: &Query) -> Vec<&'a Event> {
    events.iter().filter(|event| query.matches(event)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{EventLink, EventStart};

    fn event(source: &str, title: &str, day: u32, category: &str) -> Event {
        Event {
            source: source.to_string(),
            title: title.to_string(),
            start: EventStart::AllDay(NaiveDate::from_ymd_opt(2026, 3, day).unwrap()),
            display_time: "All Day".to_string(),
            location: "Main Branch".to_string(),
            age_group: "General".to_string(),
            category: category.to_string(),
            description: "Not found".to_string(),
            link: EventLink::Unavailable,
        }
    }

    fn collection() -> Vec<Event> {
        vec![
            event("Evanston", "Toddler Storytime", 10, "Storytime"),
            event("Glencoe", "Teen Art Workshop", 12, "Arts, Teens"),
            event("Glencoe", "Book Sale", 20, "Friends of the Library"),
        ]
    }

    fn titles<'a>(results: &[&'a Event]) -> Vec<&'a str> {
        results.iter().map(|e| e.title.as_str()).collect()
    }

    #[test]
    fn empty_query_matches_everything_in_order() {
        let events = collection();
        let results = filter(&events, &Query::new());
        assert_eq!(
            titles(&results),
            ["Toddler Storytime", "Teen Art Workshop", "Book Sale"]
        );
    }

    #[test]
    fn source_and_category_filters_are_allow_lists() {
        let events = collection();
        let by_source = filter(&events, &Query::new().sources(["Glencoe"]));
        assert_eq!(titles(&by_source), ["Teen Art Workshop", "Book Sale"]);

        // "Teens" is one element of a comma-separated category list
        let by_category = filter(&events, &Query::new().categories(["Teens"]));
        assert_eq!(titles(&by_category), ["Teen Art Workshop"]);
    }

    #[test]
    fn date_range_is_inclusive() {
        let events = collection();
        let from = NaiveDate::from_ymd_opt(2026, 3, 12).unwrap();
        let to = NaiveDate::from_ymd_opt(2026, 3, 20).unwrap();
        let results = filter(&events, &Query::new().after(from).before(to));
        assert_eq!(titles(&results), ["Teen Art Workshop", "Book Sale"]);

        let on = filter(&events, &Query::new().on(from));
        assert_eq!(titles(&on), ["Teen Art Workshop"]);
    }

    #[test]
    fn all_mode_needs_every_token() {
        let events = collection();
        let query = Query::new()
            .text("story time")
            .fields([SearchField::Title])
            .mode(SearchMode::All);
        assert_eq!(titles(&filter(&events, &query)), ["Toddler Storytime"]);

        let query = Query::new()
            .text("story workshop")
            .fields([SearchField::Title])
            .mode(SearchMode::All);
        assert!(filter(&events, &query).is_empty());
    }

    #[test]
    fn any_mode_needs_one_token() {
        let events = collection();
        let query = Query::new()
            .text("story art")
            .fields([SearchField::Title])
            .mode(SearchMode::Any);
        assert_eq!(
            titles(&filter(&events, &query)),
            ["Toddler Storytime", "Teen Art Workshop"]
        );
    }

    #[test]
    fn exact_mode_needs_the_verbatim_string() {
        let events = collection();
        let query = Query::new()
            .text("teen art workshop")
            .mode(SearchMode::Exact);
        assert_eq!(titles(&filter(&events, &query)), ["Teen Art Workshop"]);

        let query = Query::new().text("art teen").mode(SearchMode::Exact);
        assert!(filter(&events, &query).is_empty());
    }

    #[test]
    fn fuzzy_mode_tolerates_misspellings() {
        let events = collection();
        let query = Query::new()
            .text("Toddlr Storytme")
            .fields([SearchField::Title])
            .mode(SearchMode::Fuzzy);
        assert_eq!(titles(&filter(&events, &query)), ["Toddler Storytime"]);
    }

    #[test]
    fn quoted_phrases_stay_whole() {
        assert_eq!(
            tokenize(r#""book sale" friends"#),
            vec!["book sale".to_string(), "friends".to_string()]
        );

        let events = collection();
        let query = Query::new()
            .text(r#""art workshop""#)
            .fields([SearchField::Title])
            .mode(SearchMode::Any);
        assert_eq!(titles(&filter(&events, &query)), ["Teen Art Workshop"]);
    }

    #[test]
    fn combined_predicates_are_anded() {
        let events = collection();
        let query = Query::new()
            .sources(["Glencoe"])
            .text("book")
            .mode(SearchMode::Any);
        assert_eq!(titles(&filter(&events, &query)), ["Book Sale"]);
    }
}
