use crate::config::{ScannerConfig, SourceConfig};
use crate::fetch::PageFetcher;
use crate::model::EventCandidate;
use crate::parser::extract_ranges;
use anyhow::{Result, anyhow};
use chrono::{Datelike, NaiveDate};
use scraper::{Html, Selector};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info};

const ELLIPSIS: &str = "...";

pub struct EventScanner {
    config: ScannerConfig,
    selector: Selector,
    fetcher: Arc<dyn PageFetcher>,
}

impl EventScanner {
    pub fn new(config: ScannerConfig, fetcher: Arc<dyn PageFetcher>) -> Result<Self> {
        let expression = config.node_kinds.join(", ");
        let selector = Selector::parse(&expression)
            .map_err(|err| anyhow!("invalid scanner node kinds {expression}: {err:?}"))?;
        Ok(Self {
            config,
            selector,
            fetcher,
        })
    }

    /// Fetches every source and returns the candidates whose dates cover
    /// `target`, with exact duplicates removed in first-seen order.
    pub fn scan(&self, target: NaiveDate, sources: &[SourceConfig]) -> Vec<EventCandidate> {
        let mut hits = Vec::new();
        for source in sources.iter().filter(|source| source.enabled) {
            let html = self.fetcher.fetch(&source.url);
            if html.is_empty() {
                debug!(source = %source.venue, url = %source.url, "empty page; no candidates");
                continue;
            }
            let found = self.scan_page(&html, target, source);
            info!(
                source = %source.venue,
                url = %source.url,
                candidates = found.len(),
                "source scanned"
            );
            hits.extend(found);
        }

        let before = hits.len();
        let mut seen = HashSet::new();
        hits.retain(|hit| {
            seen.insert((
                hit.venue.clone(),
                hit.start,
                hit.end,
                hit.title.clone(),
            ))
        });
        debug!(before, after = hits.len(), %target, "candidates deduplicated");
        hits
    }

    /// Candidates from one page. Each text node contributes at most one
    /// candidate: the first interval covering `target`.
    pub fn scan_page(
        &self,
        html: &str,
        target: NaiveDate,
        source: &SourceConfig,
    ) -> Vec<EventCandidate> {
        let document = Html::parse_document(html);
        let mut out = Vec::new();

        for node in document.select(&self.selector) {
            let text = collapse_whitespace(&node.text().collect::<Vec<_>>().join(" "));
            if text.chars().count() < self.config.min_text_chars {
                continue;
            }

            let hit = extract_ranges(&text, target.year())
                .into_iter()
                .find(|interval| interval.contains(target));
            if let Some(interval) = hit {
                out.push(EventCandidate {
                    venue: source.venue.clone(),
                    start: interval.start(),
                    end: interval.end(),
                    title: truncate_title(&text, self.config.max_title_chars),
                    source_url: source.url.clone(),
                });
            }
        }

        out
    }
}

pub fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Cuts `text` to `max_chars` characters, ending in an ellipsis when cut.
pub fn truncate_title(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let keep = max_chars.saturating_sub(ELLIPSIS.len());
    let mut out: String = text.chars().take(keep).collect();
    out.push_str(ELLIPSIS);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    struct StaticPages(HashMap<String, String>);

    impl PageFetcher for StaticPages {
        fn fetch(&self, url: &str) -> String {
            self.0.get(url).cloned().unwrap_or_default()
        }
    }

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn scanner(pages: &[(&str, &str)]) -> EventScanner {
        let pages = pages
            .iter()
            .map(|(url, body)| (url.to_string(), body.to_string()))
            .collect();
        EventScanner::new(ScannerConfig::default(), Arc::new(StaticPages(pages))).unwrap()
    }

    #[test]
    fn emits_one_candidate_per_node() {
        let scanner = scanner(&[(
            "https://hall.example/events",
            "<html><body><ul>\
             <li>2025-11-14～2025-11-16 デザインフェスタ vol.62 / 11/15 特別企画</li>\
             <li>2025/12/01 別イベント</li>\
             </ul></body></html>",
        )]);
        let source = SourceConfig::new("https://hall.example/events", "東京ビッグサイト");
        let hits = scanner.scan(d(2025, 11, 15), &[source]);

        // <body>, <ul> are not scanned; <li> matches once.
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].venue, "東京ビッグサイト");
        assert_eq!(hits[0].start, d(2025, 11, 14));
        assert_eq!(hits[0].end, d(2025, 11, 16));
        assert_eq!(hits[0].source_url, "https://hall.example/events");
    }

    #[test]
    fn nested_nodes_collapse_to_unique_records() {
        let scanner = scanner(&[(
            "https://hall.example/a",
            "<div><p>11/14(金)〜11/16(日)　花火大会</p></div>",
        )]);
        let source = SourceConfig::new("https://hall.example/a", "Hall");
        let hits = scanner.scan(d(2025, 11, 15), &[source.clone(), source]);
        // The div and the p carry the same text; both sources are identical.
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].title, "11/14(金)〜11/16(日) 花火大会");
    }

    #[test]
    fn short_text_and_other_dates_are_skipped() {
        let scanner = scanner(&[(
            "https://hall.example/b",
            "<p>11/15</p><p>2025/11/20 冬のフェア</p>",
        )]);
        let source = SourceConfig::new("https://hall.example/b", "Hall");
        assert!(scanner.scan(d(2025, 11, 15), &[source]).is_empty());
    }

    #[test]
    fn empty_pages_yield_no_candidates() {
        let scanner = scanner(&[]);
        let sources = vec![
            SourceConfig::new("https://down.example/1", "A"),
            SourceConfig::new("https://down.example/2", "B"),
        ];
        assert!(scanner.scan(d(2025, 11, 15), &sources).is_empty());
        assert!(scanner.scan(d(2025, 11, 15), &[]).is_empty());
    }

    #[test]
    fn long_titles_are_truncated() {
        let long = "あ".repeat(130);
        let title = truncate_title(&long, 120);
        assert_eq!(title.chars().count(), 120);
        assert!(title.ends_with("..."));
        assert_eq!(truncate_title("short", 120), "short");
    }

    #[test]
    fn disabled_sources_are_not_fetched() {
        let scanner = scanner(&[("https://hall.example/c", "<p>2025/11/15 祭り開催</p>")]);
        let mut source = SourceConfig::new("https://hall.example/c", "Hall");
        source.enabled = false;
        assert!(scanner.scan(d(2025, 11, 15), &[source]).is_empty());
    }
}
