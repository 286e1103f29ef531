//! Archive listings that don't come straight from a feed:
//! hourly placeholder slots and de-duplicated ("glued") titles

use std::cmp::Ordering;
use std::sync::LazyLock;

use chrono::{Local, TimeZone};
use regex::Regex;

use crate::models::BroadcastEvent;

const SLOT_SECS: i64 = 3600;
const FAKE_DESCRIPTION: &str = "Fake EPG";

/// Film/series markers (`х/ф`, `м/ф`, `т/с` in either script) and decorative quotes/brackets
static TITLE_NOISE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(х|Х|м|М|x|X|т|Т|T)/(Ф|ф|С|C|с|c)|«|»|"|\[|\]"#).expect("valid regex")
});

static DIGIT_RUN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\d+").expect("valid regex"));

/// One-hour slots from the current hour boundary back `depth_days`, newest first
pub fn fake_events(depth_days: u32, now: i64) -> Vec<BroadcastEvent> {
    let window_start = now - i64::from(depth_days) * 86400;
    let mut start = now.div_euclid(SLOT_SECS) * SLOT_SECS;
    let mut events = Vec::new();

    while start > window_start {
        events.push(BroadcastEvent::new(
            FAKE_DESCRIPTION.to_string(),
            None,
            start,
            SLOT_SECS,
            slot_label(start),
        ));
        start -= SLOT_SECS;
    }
    events
}

fn slot_label(ts: i64) -> String {
    Local
        .timestamp_opt(ts, 0)
        .single()
        .map(|dt| dt.format("%A, %d.%m, %H:%M").to_string())
        .unwrap_or_else(|| ts.to_string())
}

/// Strip markers and quotes from a title
pub fn normalize_title(title: &str) -> String {
    TITLE_NOISE.replace_all(title, "").trim().to_string()
}

/// Natural sort by normalized title, keeping the first event of every
/// normalized title. Titles in the result are normalized.
pub fn glue_titles(events: &[BroadcastEvent]) -> Vec<BroadcastEvent> {
    let mut keyed: Vec<(Vec<TitlePart>, BroadcastEvent)> = events
        .iter()
        .map(|e| {
            let mut event = e.clone();
            event.title = normalize_title(&e.title);
            (natural_key(&event.title), event)
        })
        .collect();
    keyed.sort_by(|a, b| a.0.cmp(&b.0));

    let mut glued: Vec<BroadcastEvent> = Vec::new();
    for (_, event) in keyed {
        if !glued.iter().any(|g| g.title == event.title) {
            glued.push(event);
        }
    }
    glued
}

/// Text runs compare as text, digit runs by numeric value
#[derive(Debug, PartialEq, Eq)]
enum TitlePart {
    Text(String),
    Number(String),
}

impl Ord for TitlePart {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (TitlePart::Number(a), TitlePart::Number(b)) => {
                a.len().cmp(&b.len()).then_with(|| a.cmp(b))
            }
            (TitlePart::Text(a), TitlePart::Text(b)) => a.cmp(b),
            (TitlePart::Number(_), TitlePart::Text(_)) => Ordering::Less,
            (TitlePart::Text(_), TitlePart::Number(_)) => Ordering::Greater,
        }
    }
}

impl PartialOrd for TitlePart {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Alternating text/number parts; always starts with a (possibly empty) text part
fn natural_key(title: &str) -> Vec<TitlePart> {
    let mut parts = Vec::new();
    let mut last = 0;
    for m in DIGIT_RUN.find_iter(title) {
        parts.push(TitlePart::Text(title[last..m.start()].to_string()));
        let digits = m.as_str().trim_start_matches('0');
        parts.push(TitlePart::Number(digits.to_string()));
        last = m.end();
    }
    parts.push(TitlePart::Text(title[last..].to_string()));
    parts
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(title: &str, begin: i64) -> BroadcastEvent {
        BroadcastEvent::new(String::new(), None, begin, 60, title.to_string())
    }

    #[test]
    fn test_fake_events_cover_depth() {
        let now = 1_700_001_234;
        let events = fake_events(1, now);
        assert_eq!(events.len(), 24);
        assert_eq!(events[0].begin_time, 1_699_999_200);
        assert_eq!(events[0].begin_time % 3600, 0);
        assert!(events.iter().all(|e| e.duration_secs == 3600 && e.description == "Fake EPG"));
        assert!(events.windows(2).all(|w| w[0].begin_time - w[1].begin_time == 3600));
        assert!(events.last().unwrap().begin_time > now - 86400);
    }

    #[test]
    fn test_fake_events_exact_hour() {
        let now = 1_699_999_200;
        let events = fake_events(1, now);
        assert_eq!(events[0].begin_time, now);
        // the slot starting exactly `depth` ago is outside the window
        assert_eq!(events.len(), 24);
    }

    #[test]
    fn test_fake_events_zero_depth() {
        assert!(fake_events(0, 1_700_000_000).is_empty());
    }

    #[test]
    fn test_normalize_title() {
        assert_eq!(normalize_title("х/ф «Брат 2»"), "Брат 2");
        assert_eq!(normalize_title("T/C \"Friends\" [16+]"), "Friends 16+");
        assert_eq!(normalize_title("м/ф Шрек"), "Шрек");
    }

    #[test]
    fn test_glue_natural_order() {
        let events = vec![event("Movie [2020]", 4), event("Movie 2", 3), event("Movie 10", 2), event("Movie 1", 1)];
        let titles: Vec<String> = glue_titles(&events).into_iter().map(|e| e.title).collect();
        assert_eq!(titles, vec!["Movie 1", "Movie 2", "Movie 10", "Movie 2020"]);
    }

    #[test]
    fn test_glue_collapses_duplicates_to_first() {
        let events = vec![
            event("х/ф «Брат»", 300),
            event("Брат", 200),
            event("News", 100),
            event("\"News\"", 50),
        ];
        let glued = glue_titles(&events);
        assert_eq!(glued.len(), 2);
        assert_eq!(glued[0].title, "News");
        assert_eq!(glued[0].begin_time, 100);
        assert_eq!(glued[1].title, "Брат");
        assert_eq!(glued[1].begin_time, 300);
    }

    #[test]
    fn test_natural_key_leading_zeros() {
        assert_eq!(natural_key("Ep 007").cmp(&natural_key("Ep 7")), Ordering::Equal);
        assert_eq!(natural_key("Ep 9").cmp(&natural_key("Ep 10")), Ordering::Less);
    }
}
