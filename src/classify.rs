use crate::config::ClassifierConfig;
use crate::model::{Event, EventCandidate};
use regex::Regex;
use std::collections::HashMap;
use std::sync::LazyLock;
use tracing::debug;

static LEADING_DATE_RANGE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^\s*[0-9]{4}[-/.][0-9]{1,2}[-/.][0-9]{1,2}\s*[～〜~\-–]\s*[0-9]{4}[-/.][0-9]{1,2}[-/.][0-9]{1,2}",
    )
    .expect("leading date range regex must compile")
});

const VENUE_DECORATION: &[char] = &['＜', '＞', '<', '>', '(', ')', '（', '）', '【', '】', '[', ']'];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Verdict {
    Keep,
    TooShort,
    Noise,
    BareDateRange,
    Evergreen,
    NotLargeScale,
}

/// Reduces scanner candidates to large-scale events, one per
/// (venue, normalized title).
pub struct EventClassifier {
    config: ClassifierConfig,
    known_venues: Vec<String>,
}

impl EventClassifier {
    pub fn new(config: ClassifierConfig, known_venues: impl IntoIterator<Item = String>) -> Self {
        let mut known_venues: Vec<String> = known_venues.into_iter().collect();
        known_venues.push(config.flagship_venue.clone());
        Self {
            config,
            known_venues,
        }
    }

    pub fn filter_big_events(&self, candidates: Vec<EventCandidate>) -> Vec<Event> {
        let total = candidates.len();
        let mut order: Vec<(String, String)> = Vec::new();
        let mut best: HashMap<(String, String), (i64, Event)> = HashMap::new();

        for candidate in candidates {
            let duration = candidate.duration_days();
            let verdict = self.judge(&candidate, duration);
            if verdict != Verdict::Keep {
                debug!(title = %candidate.title, venue = %candidate.venue, ?verdict, "candidate rejected");
                continue;
            }

            let title = self.normalize_title(&candidate.title);
            let key = (candidate.venue.clone(), title.clone());
            let event = Event {
                venue: candidate.venue,
                start: candidate.start,
                end: candidate.end,
                title,
                source_url: candidate.source_url,
            };

            match best.get(&key) {
                Some((kept, _)) if *kept <= duration => continue,
                Some(_) => {}
                None => order.push(key.clone()),
            }
            best.insert(key, (duration, event));
        }

        let events: Vec<Event> = order
            .into_iter()
            .filter_map(|key| best.remove(&key).map(|(_, event)| event))
            .collect();
        debug!(candidates = total, events = events.len(), "candidates classified");
        events
    }

    fn judge(&self, candidate: &EventCandidate, duration: i64) -> Verdict {
        let title = candidate.title.as_str();
        let cfg = &self.config;

        if title.trim().chars().count() < cfg.min_title_chars {
            return Verdict::TooShort;
        }
        if contains_any(title, &cfg.noise_phrases) {
            return Verdict::Noise;
        }
        if self.is_bare_date_range(title, &candidate.venue) {
            return Verdict::BareDateRange;
        }

        let mentions_flagship = title.contains(cfg.flagship_venue.as_str());
        if contains_any(title, &cfg.evergreen_attractions) && !mentions_flagship {
            return Verdict::Evergreen;
        }

        if candidate.venue == cfg.flagship_venue || mentions_flagship {
            return Verdict::Keep;
        }
        // A canonical alias name already passed this test under its raw title.
        let large_vocabulary =
            contains_any(title, &cfg.big_event_keywords) || self.is_canonical_title(title);
        if duration < cfg.max_duration_days && large_vocabulary {
            Verdict::Keep
        } else {
            Verdict::NotLargeScale
        }
    }

    /// A leading `YYYY-MM-DD ~ YYYY-MM-DD` followed by nothing but a venue.
    fn is_bare_date_range(&self, title: &str, venue: &str) -> bool {
        let Some(found) = LEADING_DATE_RANGE.find(title) else {
            return false;
        };
        let rest = title[found.end()..]
            .trim()
            .trim_matches(VENUE_DECORATION)
            .trim();
        rest.is_empty()
            || rest == venue
            || self.known_venues.iter().any(|known| rest == known)
    }

    fn is_canonical_title(&self, title: &str) -> bool {
        self.config
            .aliases
            .iter()
            .any(|alias| alias.canonical == title)
    }

    fn normalize_title(&self, title: &str) -> String {
        self.config
            .aliases
            .iter()
            .find(|alias| title.contains(alias.contains.as_str()))
            .map(|alias| alias.canonical.clone())
            .unwrap_or_else(|| title.to_string())
    }
}

fn contains_any(title: &str, phrases: &[String]) -> bool {
    phrases.iter().any(|phrase| title.contains(phrase.as_str()))
}
