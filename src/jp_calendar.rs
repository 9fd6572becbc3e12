//! Japanese national holidays computed from the statutory rules.
//!
//! Covers the rules in force since 1989: fixed-date holidays, Happy-Monday
//! holidays, the equinoxes, the 2019 enthronement days, the Olympic moves of
//! 2020 and 2021, substitute holidays and citizens' holidays.

use crate::model::HolidaySet;
use chrono::{Datelike, Duration, NaiveDate, Weekday};
use std::collections::BTreeMap;

pub fn holidays_in_year(year: i32) -> BTreeMap<NaiveDate, &'static str> {
    let mut days = statutory_holidays(year);
    add_citizens_holidays(year, &mut days);
    add_substitute_holidays(year, &mut days);
    days
}

pub fn holiday_name(date: NaiveDate) -> Option<&'static str> {
    holidays_in_year(date.year()).get(&date).copied()
}

pub fn is_holiday(date: NaiveDate) -> bool {
    holiday_name(date).is_some()
}

/// Holiday set spanning every listed year.
pub fn holiday_set(years: &[i32]) -> HolidaySet {
    years
        .iter()
        .flat_map(|year| holidays_in_year(*year))
        .map(|(date, name)| (date, name.to_string()))
        .collect()
}

fn statutory_holidays(year: i32) -> BTreeMap<NaiveDate, &'static str> {
    let mut days = BTreeMap::new();
    let mut add = |date: Option<NaiveDate>, name: &'static str| {
        if let Some(date) = date {
            days.insert(date, name);
        }
    };
    let ymd = |month: u32, day: u32| NaiveDate::from_ymd_opt(year, month, day);
    let monday = |month: u32, nth: u8| NaiveDate::from_weekday_of_month_opt(year, month, Weekday::Mon, nth);

    add(ymd(1, 1), "元日");
    add(
        if year >= 2000 { monday(1, 2) } else { ymd(1, 15) },
        "成人の日",
    );
    add(ymd(2, 11), "建国記念の日");

    match year {
        y if y >= 2020 => add(ymd(2, 23), "天皇誕生日"),
        1989..=2018 => add(ymd(12, 23), "天皇誕生日"),
        _ => {}
    }

    add(vernal_equinox(year), "春分の日");

    if year >= 2007 {
        add(ymd(4, 29), "昭和の日");
        add(ymd(5, 4), "みどりの日");
    } else {
        add(ymd(4, 29), "みどりの日");
    }
    add(ymd(5, 3), "憲法記念日");
    add(ymd(5, 5), "こどもの日");

    match year {
        2020 => add(ymd(7, 23), "海の日"),
        2021 => add(ymd(7, 22), "海の日"),
        y if y >= 2003 => add(monday(7, 3), "海の日"),
        1996..=2002 => add(ymd(7, 20), "海の日"),
        _ => {}
    }

    match year {
        2020 => add(ymd(8, 10), "山の日"),
        2021 => add(ymd(8, 8), "山の日"),
        y if y >= 2016 => add(ymd(8, 11), "山の日"),
        _ => {}
    }

    add(
        if year >= 2003 { monday(9, 3) } else { ymd(9, 15) },
        "敬老の日",
    );
    add(autumnal_equinox(year), "秋分の日");

    match year {
        2020 => add(ymd(7, 24), "スポーツの日"),
        2021 => add(ymd(7, 23), "スポーツの日"),
        y if y >= 2022 => add(monday(10, 2), "スポーツの日"),
        2000..=2019 => add(monday(10, 2), "体育の日"),
        _ => add(ymd(10, 10), "体育の日"),
    }

    add(ymd(11, 3), "文化の日");
    add(ymd(11, 23), "勤労感謝の日");

    if year == 2019 {
        add(ymd(5, 1), "天皇の即位の日");
        add(ymd(10, 22), "即位礼正殿の儀");
    }

    days
}

/// A weekday other than Sunday squeezed between two holidays becomes one.
fn add_citizens_holidays(year: i32, days: &mut BTreeMap<NaiveDate, &'static str>) {
    let sandwiched: Vec<NaiveDate> = days
        .keys()
        .filter_map(|date| date.checked_add_signed(Duration::days(2)))
        .filter(|after| days.contains_key(after))
        .filter_map(|after| after.pred_opt())
        .filter(|middle| {
            middle.year() == year
                && !days.contains_key(middle)
                && middle.weekday() != Weekday::Sun
        })
        .collect();

    for day in sandwiched {
        days.insert(day, "国民の休日");
    }
}

/// A holiday on Sunday moves to the next day that is not already a holiday
/// (only the following Monday before 2007).
fn add_substitute_holidays(year: i32, days: &mut BTreeMap<NaiveDate, &'static str>) {
    let sundays: Vec<NaiveDate> = days
        .keys()
        .copied()
        .filter(|date| date.weekday() == Weekday::Sun)
        .collect();

    for sunday in sundays {
        let mut candidate = sunday.succ_opt();
        if year >= 2007 {
            while let Some(day) = candidate.filter(|day| days.contains_key(day)) {
                candidate = day.succ_opt();
            }
        } else if candidate.is_some_and(|day| days.contains_key(&day)) {
            continue;
        }
        if let Some(day) = candidate.filter(|day| day.year() == year) {
            days.insert(day, "振替休日");
        }
    }
}

// Approximation published for 1980-2099.
fn vernal_equinox(year: i32) -> Option<NaiveDate> {
    equinox_day(year, 20.8431).and_then(|day| NaiveDate::from_ymd_opt(year, 3, day))
}

fn autumnal_equinox(year: i32) -> Option<NaiveDate> {
    equinox_day(year, 23.2488).and_then(|day| NaiveDate::from_ymd_opt(year, 9, day))
}

fn equinox_day(year: i32, base: f64) -> Option<u32> {
    let offset = f64::from(year - 1980);
    let day = (base + 0.242194 * offset - (offset / 4.0).floor()).floor();
    (day > 0.0).then_some(day as u32)
}
