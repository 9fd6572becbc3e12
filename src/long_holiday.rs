use crate::cache::{KeyedCache, MemoryCache};
use crate::config::LongHolidayConfig;
use crate::holiday::HolidayProvider;
use crate::model::is_weekend;
use chrono::{Datelike, Duration, NaiveDate};
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::debug;

/// Collects every day belonging to a run of at least `min_run` consecutive
/// holiday-like days. A run still open at the end of `days` is flushed with
/// the same rule.
pub fn holiday_runs<I, F>(days: I, is_holiday_like: F, min_run: usize) -> BTreeSet<NaiveDate>
where
    I: IntoIterator<Item = NaiveDate>,
    F: Fn(NaiveDate) -> bool,
{
    let mut members = BTreeSet::new();
    let mut run: Vec<NaiveDate> = Vec::new();

    for day in days {
        if is_holiday_like(day) {
            run.push(day);
            continue;
        }
        if run.len() >= min_run {
            members.extend(run.iter().copied());
        }
        run.clear();
    }
    if run.len() >= min_run {
        members.extend(run);
    }

    members
}

fn days_from(start: NaiveDate, count: u64) -> impl Iterator<Item = NaiveDate> {
    start.iter_days().take(count as usize)
}

pub struct LongHolidayDetector {
    config: LongHolidayConfig,
    holidays: Arc<HolidayProvider>,
    domestic: MemoryCache<i32, Arc<BTreeSet<NaiveDate>>>,
}

impl LongHolidayDetector {
    pub fn new(config: LongHolidayConfig, holidays: Arc<HolidayProvider>) -> Self {
        Self {
            config,
            holidays,
            domestic: MemoryCache::unbounded(),
        }
    }

    /// Domestic long-holiday days for the runs scanned from January 1 of
    /// `year`, unioned with the school breaks opening in `year`.
    pub fn long_holiday_days(&self, year: i32) -> Arc<BTreeSet<NaiveDate>> {
        self.domestic
            .get_or_insert_with(year, || Arc::new(self.build_domestic(year)))
    }

    fn build_domestic(&self, year: i32) -> BTreeSet<NaiveDate> {
        let Some(jan_first) = NaiveDate::from_ymd_opt(year, 1, 1) else {
            return BTreeSet::new();
        };
        let domestic = self.holidays.domestic_country();
        let blackout: BTreeSet<NaiveDate> = self
            .config
            .blackout_windows
            .iter()
            .flat_map(|window| window.days_in(year))
            .collect();

        let mut members = holiday_runs(
            days_from(jan_first, self.config.domestic_scan_days),
            |day| {
                is_weekend(day)
                    || blackout.contains(&day)
                    || self.holidays.is_public_holiday(day, domestic)
            },
            self.config.min_run,
        );
        for window in &self.config.school_breaks {
            members.extend(window.days_in(year));
        }

        debug!(year, days = members.len(), "domestic long-holiday days built");
        members
    }

    /// True when `date` belongs to a domestic long-holiday run or school break.
    /// The previous year's set is consulted too, since its scan and its winter
    /// break reach into early January.
    pub fn is_long_holiday(&self, date: NaiveDate) -> bool {
        let year = date.year();
        self.long_holiday_days(year).contains(&date)
            || self.long_holiday_days(year - 1).contains(&date)
    }

    /// Run detection against the country's own holidays plus weekends, over
    /// a window opening shortly before January 1 of the query year. The
    /// domestic country keeps its dedicated rule.
    pub fn is_long_holiday_in_country(&self, date: NaiveDate, country: &str) -> bool {
        if self.holidays.is_domestic(country) {
            return self.is_long_holiday(date);
        }

        let year = date.year();
        let holidays = self.holidays.holiday_set(country, year);
        let Some(start) = NaiveDate::from_ymd_opt(year, 1, 1)
            .and_then(|jan_first| {
                jan_first.checked_sub_signed(Duration::days(self.config.foreign_lead_days as i64))
            })
        else {
            return false;
        };

        let members = holiday_runs(
            days_from(start, self.config.foreign_scan_days),
            |day| {
                is_weekend(day)
                    || holidays
                        .as_ref()
                        .is_some_and(|set| set.contains(day))
            },
            self.config.min_run,
        );
        members.contains(&date)
    }

    /// Labels of the configured countries for which `date` is inside a long
    /// holiday.
    pub fn long_holiday_countries(&self, date: NaiveDate) -> Vec<String> {
        self.holidays
            .countries()
            .iter()
            .filter(|country| self.is_long_holiday_in_country(date, &country.code))
            .map(|country| country.label.clone())
            .collect()
    }

    /// Fixed seasonal high-traffic windows; pure date arithmetic.
    pub fn is_crowded_period(&self, date: NaiveDate) -> bool {
        self.config
            .crowded_windows
            .iter()
            .any(|window| window.contains(date))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CountryConfig;
    use crate::holiday::{CalendarSource, DisabledCalendarSource};
    use crate::model::HolidaySet;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    struct FixedSource;

    impl CalendarSource for FixedSource {
        fn build_calendar(
            &self,
            country: &str,
            _years: &[i32],
            _subdivision: Option<&str>,
        ) -> Option<HolidaySet> {
            (country == "ZZ").then(|| {
                [
                    d(2025, 6, 9),
                    d(2025, 6, 10),
                    d(2025, 6, 11),
                    d(2025, 7, 8),
                    d(2025, 7, 9),
                ]
                .into_iter()
                .map(|day| (day, "holiday".to_string()))
                .collect()
            })
        }
    }

    fn detector(config: LongHolidayConfig) -> LongHolidayDetector {
        let provider = HolidayProvider::new(
            "JP",
            vec![
                CountryConfig::new("JP", "日本"),
                CountryConfig::new("ZZ", "Zedland"),
                CountryConfig::new("XX", "nowhere"),
            ],
            Box::new(FixedSource),
        );
        LongHolidayDetector::new(config, Arc::new(provider))
    }

    #[test]
    fn run_boundaries_are_exact() {
        let start = d(2025, 3, 1);
        let holiday_like: BTreeSet<NaiveDate> = days_from(start, 5).collect();
        let members = holiday_runs(
            days_from(start, 10),
            |day| holiday_like.contains(&day),
            3,
        );
        assert_eq!(members, holiday_like);
        assert!(!members.contains(&d(2025, 3, 6)));
    }

    #[test]
    fn short_runs_are_excluded_and_trailing_run_is_flushed() {
        let like = [d(2025, 3, 2), d(2025, 3, 3), d(2025, 3, 8), d(2025, 3, 9), d(2025, 3, 10)];
        let members = holiday_runs(days_from(d(2025, 3, 1), 10), |day| like.contains(&day), 3);
        assert!(!members.contains(&d(2025, 3, 2)));
        assert!(!members.contains(&d(2025, 3, 3)));
        assert!(members.contains(&d(2025, 3, 8)));
        assert!(members.contains(&d(2025, 3, 10)));
        assert_eq!(members.len(), 3);
    }

    #[test]
    fn year_end_is_long_holiday() {
        let detector = detector(LongHolidayConfig::default());
        assert!(detector.is_long_holiday(d(2025, 12, 31)));
        assert!(detector.is_long_holiday(d(2026, 1, 3)));
        assert!(detector.is_long_holiday_in_country(d(2025, 12, 31), "JP"));
    }

    #[test]
    fn golden_week_run_ends_on_first_workday() {
        let detector = detector(LongHolidayConfig::default());
        for day in 3..=6 {
            assert!(detector.is_long_holiday(d(2025, 5, day)), "May {day}");
        }
        assert!(!detector.is_long_holiday(d(2025, 5, 7)));
        assert!(!detector.is_long_holiday(d(2025, 4, 29)));
    }

    #[test]
    fn plain_weekend_is_not_long_holiday() {
        let detector = detector(LongHolidayConfig::default());
        assert!(!detector.is_long_holiday(d(2025, 6, 7)));
        assert!(!detector.is_long_holiday(d(2025, 6, 8)));
    }

    #[test]
    fn school_breaks_count_without_runs() {
        let detector = detector(LongHolidayConfig::default());
        // Wednesday inside the summer break.
        assert!(detector.is_long_holiday(d(2025, 7, 23)));
        assert!(detector.is_long_holiday(d(2025, 3, 25)));
    }

    #[test]
    fn blackout_week_joins_weekend_runs() {
        let config = LongHolidayConfig {
            school_breaks: Vec::new(),
            ..LongHolidayConfig::default()
        };
        let detector = detector(config);
        for day in 9..=11 {
            assert!(detector.is_long_holiday(d(2025, 8, day)), "Aug {day}");
        }
        assert!(!detector.is_long_holiday(d(2025, 8, 12)));
        for day in 13..=17 {
            assert!(detector.is_long_holiday(d(2025, 8, day)), "Aug {day}");
        }
        assert!(!detector.is_long_holiday(d(2025, 8, 18)));
    }

    #[test]
    fn foreign_runs_use_country_calendar() {
        let detector = detector(LongHolidayConfig::default());
        for day in 7..=11 {
            assert!(detector.is_long_holiday_in_country(d(2025, 6, day), "ZZ"), "Jun {day}");
        }
        assert!(!detector.is_long_holiday_in_country(d(2025, 6, 12), "ZZ"));
        assert!(!detector.is_long_holiday_in_country(d(2025, 6, 14), "ZZ"));
        assert!(!detector.is_long_holiday_in_country(d(2025, 7, 8), "ZZ"));
        // No school breaks abroad.
        assert!(!detector.is_long_holiday_in_country(d(2025, 7, 23), "ZZ"));
    }

    #[test]
    fn unknown_country_degrades_to_weekends_only() {
        let detector = detector(LongHolidayConfig::default());
        assert!(!detector.is_long_holiday_in_country(d(2025, 6, 7), "XX"));
        assert!(!detector.is_long_holiday_in_country(d(2025, 6, 9), "XX"));
    }

    #[test]
    fn lists_countries_in_long_holiday() {
        let detector = detector(LongHolidayConfig::default());
        assert_eq!(detector.long_holiday_countries(d(2025, 6, 9)), ["Zedland"]);
        assert_eq!(detector.long_holiday_countries(d(2025, 5, 5)), ["日本"]);
    }

    #[test]
    fn crowded_windows_are_fixed() {
        let provider = HolidayProvider::new("JP", Vec::new(), Box::new(DisabledCalendarSource));
        let detector = LongHolidayDetector::new(LongHolidayConfig::default(), Arc::new(provider));
        assert!(detector.is_crowded_period(d(2025, 5, 1)));
        assert!(detector.is_crowded_period(d(2025, 8, 15)));
        assert!(detector.is_crowded_period(d(2025, 12, 25)));
        assert!(detector.is_crowded_period(d(2026, 1, 5)));
        assert!(!detector.is_crowded_period(d(2025, 6, 15)));
        assert!(!detector.is_crowded_period(d(2026, 1, 8)));
        assert!(!detector.is_crowded_period(d(2025, 4, 28)));
    }
}
