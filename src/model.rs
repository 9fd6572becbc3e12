use chrono::{Datelike, NaiveDate, Weekday};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Duration assigned to a record whose end precedes its start; such a record
/// never wins a shortest-duration comparison.
pub const UNBOUNDED_DURATION_DAYS: i64 = 9999;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DateInterval {
    start: NaiveDate,
    end: NaiveDate,
}

impl DateInterval {
    /// Returns `None` when `end` precedes `start`.
    pub fn new(start: NaiveDate, end: NaiveDate) -> Option<Self> {
        (start <= end).then_some(Self { start, end })
    }

    pub fn single(day: NaiveDate) -> Self {
        Self {
            start: day,
            end: day,
        }
    }

    pub fn start(&self) -> NaiveDate {
        self.start
    }

    pub fn end(&self) -> NaiveDate {
        self.end
    }

    pub fn contains(&self, day: NaiveDate) -> bool {
        self.start <= day && day <= self.end
    }

    pub fn is_single_day(&self) -> bool {
        self.start == self.end
    }

    pub fn duration_days(&self) -> i64 {
        (self.end - self.start).num_days() + 1
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventCandidate {
    pub venue: String,
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub title: String,
    pub source_url: String,
}

impl EventCandidate {
    pub fn duration_days(&self) -> i64 {
        duration_or_unbounded(self.start, self.end)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    pub venue: String,
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub title: String,
    pub source_url: String,
}

impl Event {
    pub fn duration_days(&self) -> i64 {
        duration_or_unbounded(self.start, self.end)
    }
}

impl From<Event> for EventCandidate {
    fn from(event: Event) -> Self {
        Self {
            venue: event.venue,
            start: event.start,
            end: event.end,
            title: event.title,
            source_url: event.source_url,
        }
    }
}

fn duration_or_unbounded(start: NaiveDate, end: NaiveDate) -> i64 {
    if end < start {
        UNBOUNDED_DURATION_DAYS
    } else {
        (end - start).num_days() + 1
    }
}

/// Public holidays of one country, keyed by date. A date may carry several
/// simultaneous observances.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HolidaySet {
    days: BTreeMap<NaiveDate, Vec<String>>,
}

impl HolidaySet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, date: NaiveDate, name: impl Into<String>) {
        let name = name.into();
        let names = self.days.entry(date).or_default();
        if !names.contains(&name) {
            names.push(name);
        }
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.days.contains_key(&date)
    }

    pub fn names_on(&self, date: NaiveDate) -> &[String] {
        self.days.get(&date).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn dates(&self) -> impl Iterator<Item = NaiveDate> + '_ {
        self.days.keys().copied()
    }

    pub fn len(&self) -> usize {
        self.days.len()
    }

    pub fn is_empty(&self) -> bool {
        self.days.is_empty()
    }
}

impl FromIterator<(NaiveDate, String)> for HolidaySet {
    fn from_iter<T: IntoIterator<Item = (NaiveDate, String)>>(iter: T) -> Self {
        let mut set = HolidaySet::new();
        for (date, name) in iter {
            set.insert(date, name);
        }
        set
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CountryHoliday {
    pub code: String,
    pub label: String,
    pub names: Vec<String>,
}

impl CountryHoliday {
    pub fn display(&self) -> String {
        format!("{}：{}", self.label, self.names.join("・"))
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct DaySignals {
    pub date: NaiveDate,
    pub weekday: String,
    pub is_weekend: bool,
    pub is_public_holiday: bool,
    pub holiday_names: Vec<String>,
    pub is_long_holiday: bool,
    pub is_crowded_period: bool,
    pub international: Vec<CountryHoliday>,
    pub long_holiday_countries: Vec<String>,
    pub events: Vec<Event>,
}

pub fn is_weekend(date: NaiveDate) -> bool {
    matches!(date.weekday(), Weekday::Sat | Weekday::Sun)
}
