use crate::cache::{KeyedCache, MemoryCache};
use crate::config::{CalendarConfig, CountryConfig};
use crate::jp_calendar;
use crate::model::{CountryHoliday, HolidaySet};
use anyhow::{Context, Result, bail};
use chrono::{Datelike, NaiveDate};
use reqwest::blocking::Client;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Builds the public-holiday set of a country for the given years.
///
/// Returns `None` when the calendar cannot be built (unsupported country or
/// subdivision, upstream unavailable).
pub trait CalendarSource: Send + Sync {
    fn build_calendar(
        &self,
        country: &str,
        years: &[i32],
        subdivision: Option<&str>,
    ) -> Option<HolidaySet>;
}

/// Public-holiday JSON API (`/PublicHolidays/{year}/{country}`).
pub struct NagerCalendarSource {
    client: Client,
    base_url: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PublicHoliday {
    date: NaiveDate,
    local_name: String,
    name: String,
    #[serde(default = "default_global")]
    global: bool,
    #[serde(default)]
    counties: Option<Vec<String>>,
}

fn default_global() -> bool {
    true
}

impl NagerCalendarSource {
    pub fn new(config: &CalendarConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .context("failed to build calendar client")?;
        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    fn fetch_year(&self, country: &str, year: i32) -> Result<Vec<PublicHoliday>> {
        let url = format!("{}/PublicHolidays/{year}/{country}", self.base_url);
        let resp = self
            .client
            .get(&url)
            .send()
            .with_context(|| format!("request to {url} failed"))?;
        let status = resp.status();
        if !status.is_success() {
            bail!("request to {url} failed with status {status}");
        }
        resp.json::<Vec<PublicHoliday>>()
            .with_context(|| format!("failed to decode holidays from {url}"))
    }

    fn try_build(
        &self,
        country: &str,
        years: &[i32],
        subdivision: Option<&str>,
    ) -> Result<HolidaySet> {
        let county = subdivision.map(|sub| format!("{country}-{sub}"));
        let mut set = HolidaySet::new();
        for year in years {
            for holiday in self.fetch_year(country, *year)? {
                let applies = holiday.global
                    || county.as_ref().is_some_and(|county| {
                        holiday
                            .counties
                            .as_ref()
                            .is_some_and(|counties| counties.contains(county))
                    });
                if !applies {
                    continue;
                }
                let name = if holiday.local_name.is_empty() {
                    holiday.name
                } else {
                    holiday.local_name
                };
                set.insert(holiday.date, name);
            }
        }
        Ok(set)
    }
}

impl CalendarSource for NagerCalendarSource {
    fn build_calendar(
        &self,
        country: &str,
        years: &[i32],
        subdivision: Option<&str>,
    ) -> Option<HolidaySet> {
        match self.try_build(country, years, subdivision) {
            Ok(set) => Some(set),
            Err(err) => {
                warn!(%country, ?years, error = %err, "calendar build failed; treating as no holidays");
                None
            }
        }
    }
}

/// Calendar collaborator that is switched off; every build fails.
pub struct DisabledCalendarSource;

impl CalendarSource for DisabledCalendarSource {
    fn build_calendar(&self, _: &str, _: &[i32], _: Option<&str>) -> Option<HolidaySet> {
        None
    }
}

type CalendarKey = (String, i32, Option<String>);

/// Answers holiday membership per country. The domestic country is served
/// from the built-in rule table; every other country goes through the
/// calendar collaborator. Built sets are cached per (country, year,
/// subdivision) for the process lifetime, failures included.
pub struct HolidayProvider {
    domestic_country: String,
    countries: Vec<CountryConfig>,
    source: Box<dyn CalendarSource>,
    cache: MemoryCache<CalendarKey, Option<Arc<HolidaySet>>>,
}

impl HolidayProvider {
    pub fn new(
        domestic_country: impl Into<String>,
        countries: Vec<CountryConfig>,
        source: Box<dyn CalendarSource>,
    ) -> Self {
        Self {
            domestic_country: domestic_country.into(),
            countries,
            source,
            cache: MemoryCache::unbounded(),
        }
    }

    pub fn domestic_country(&self) -> &str {
        &self.domestic_country
    }

    pub fn countries(&self) -> &[CountryConfig] {
        &self.countries
    }

    pub fn is_domestic(&self, country: &str) -> bool {
        country == self.domestic_country
    }

    fn subdivision_for(&self, country: &str) -> Option<String> {
        self.countries
            .iter()
            .find(|c| c.code == country)
            .and_then(|c| c.subdivision.clone())
    }

    /// Holidays of `country` covering `year` and `year + 1`.
    pub fn holiday_set(&self, country: &str, year: i32) -> Option<Arc<HolidaySet>> {
        let subdivision = self.subdivision_for(country);
        let key = (country.to_string(), year, subdivision.clone());
        self.cache.get_or_insert_with(key, || {
            let years = [year, year + 1];
            let built = if self.is_domestic(country) {
                Some(jp_calendar::holiday_set(&years))
            } else {
                self.source
                    .build_calendar(country, &years, subdivision.as_deref())
            };
            debug!(
                %country,
                year,
                holidays = ?built.as_ref().map(HolidaySet::len),
                "calendar built"
            );
            built.map(Arc::new)
        })
    }

    pub fn is_public_holiday(&self, date: NaiveDate, country: &str) -> bool {
        self.holiday_set(country, date.year())
            .is_some_and(|set| set.contains(date))
    }

    pub fn holiday_names_on(&self, date: NaiveDate, country: &str) -> Vec<String> {
        self.holiday_set(country, date.year())
            .map(|set| set.names_on(date).to_vec())
            .unwrap_or_default()
    }

    /// Every configured country observing a holiday on `date`.
    pub fn international_holidays(&self, date: NaiveDate) -> Vec<CountryHoliday> {
        self.countries
            .iter()
            .filter_map(|country| {
                let names = self.holiday_names_on(date, &country.code);
                (!names.is_empty()).then(|| CountryHoliday {
                    code: country.code.clone(),
                    label: country.label.clone(),
                    names,
                })
            })
            .collect()
    }
}
