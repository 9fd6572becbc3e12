use crate::classify::EventClassifier;
use crate::config::{EngineConfig, SourceConfig, load_config};
use crate::fetch::{HttpFetcher, PageFetcher};
use crate::holiday::{CalendarSource, DisabledCalendarSource, HolidayProvider, NagerCalendarSource};
use crate::long_holiday::LongHolidayDetector;
use crate::model::{DaySignals, Event, is_weekend};
use crate::scanner::EventScanner;
use anyhow::{Context, Result};
use chrono::{Datelike, NaiveDate};
use std::path::Path;
use std::sync::Arc;
use tracing::info;

/// Wires the scanner, classifier, holiday provider and long-holiday detector
/// behind per-date queries.
pub struct SignalEngine {
    sources: Vec<SourceConfig>,
    scanner: EventScanner,
    classifier: EventClassifier,
    holidays: Arc<HolidayProvider>,
    detector: LongHolidayDetector,
}

impl SignalEngine {
    pub fn new(config: EngineConfig) -> Result<Self> {
        config.validate().context("invalid engine config")?;
        let fetcher = Arc::new(HttpFetcher::new(&config.fetch)?);
        let calendar: Box<dyn CalendarSource> = if config.calendar.enabled {
            Box::new(NagerCalendarSource::new(&config.calendar)?)
        } else {
            info!("calendar collaborator disabled; foreign holidays unavailable");
            Box::new(DisabledCalendarSource)
        };
        Self::with_parts(config, fetcher, calendar)
    }

    /// Builds the engine around caller-supplied collaborators.
    pub fn with_parts(
        config: EngineConfig,
        fetcher: Arc<dyn PageFetcher>,
        calendar: Box<dyn CalendarSource>,
    ) -> Result<Self> {
        let EngineConfig {
            sources,
            calendar: calendar_config,
            countries,
            long_holiday,
            scanner,
            classifier,
            ..
        } = config;

        let holidays = Arc::new(HolidayProvider::new(
            calendar_config.domestic_country,
            countries,
            calendar,
        ));
        let known_venues = sources.iter().map(|source| source.venue.clone());
        let classifier = EventClassifier::new(classifier, known_venues);

        Ok(Self {
            scanner: EventScanner::new(scanner, fetcher)?,
            classifier,
            detector: LongHolidayDetector::new(long_holiday, holidays.clone()),
            holidays,
            sources,
        })
    }

    pub fn holidays(&self) -> &HolidayProvider {
        &self.holidays
    }

    pub fn detector(&self) -> &LongHolidayDetector {
        &self.detector
    }

    /// Large-scale events running on `date` across every enabled source.
    pub fn events_for(&self, date: NaiveDate) -> Vec<Event> {
        let candidates = self.scanner.scan(date, &self.sources);
        let found = candidates.len();
        let events = self.classifier.filter_big_events(candidates);
        info!(%date, candidates = found, events = events.len(), "events resolved");
        events
    }

    /// Calendar-only signals for `date`; no pages are fetched.
    pub fn calendar_signals(&self, date: NaiveDate) -> DaySignals {
        let domestic = self.holidays.domestic_country();
        let holiday_names = self.holidays.holiday_names_on(date, domestic);
        DaySignals {
            date,
            weekday: date.weekday().to_string(),
            is_weekend: is_weekend(date),
            is_public_holiday: !holiday_names.is_empty(),
            holiday_names,
            is_long_holiday: self.detector.is_long_holiday(date),
            is_crowded_period: self.detector.is_crowded_period(date),
            international: self.holidays.international_holidays(date),
            long_holiday_countries: self.detector.long_holiday_countries(date),
            events: Vec::new(),
        }
    }

    pub fn day_signals(&self, date: NaiveDate) -> DaySignals {
        DaySignals {
            events: self.events_for(date),
            ..self.calendar_signals(date)
        }
    }

    /// Signals for every day from `start` through `end`; empty when reversed.
    pub fn signals_for_range(&self, start: NaiveDate, end: NaiveDate) -> Vec<DaySignals> {
        start
            .iter_days()
            .take_while(|day| *day <= end)
            .map(|day| self.day_signals(day))
            .collect()
    }
}

/// Loads the config at `path` (or the built-in defaults) and reports what
/// it contains.
pub fn validate_config(path: Option<&Path>) -> Result<Vec<String>> {
    let (config, origin) = match path {
        Some(path) => (load_config(path)?, path.display().to_string()),
        None => {
            let config = EngineConfig::default();
            config.validate().context("built-in defaults are invalid")?;
            (config, "built-in defaults".to_string())
        }
    };

    let mut messages = vec![format!("OK: config ({origin})")];
    for source in &config.sources {
        let state = if source.enabled { "enabled" } else { "disabled" };
        messages.push(format!("OK: source {} ({}, {state})", source.venue, source.url));
    }
    for country in &config.countries {
        messages.push(format!("OK: country {} ({})", country.code, country.label));
    }
    Ok(messages)
}
