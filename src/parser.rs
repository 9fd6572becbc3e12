use crate::model::DateInterval;
use chrono::{Datelike, NaiveDate};
use regex::{Captures, Regex};
use std::ops::Range;
use std::sync::LazyLock;

const WEEKDAY: &str = r"(?:\s*\(w\))?";
const RANGE_SEP: &str = r"\s*(?:~+|-|to)\s*";
const DIGIT: &str = "[0-9０-９]";

static WEEKDAY_MARK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"[(（]\s*(?:[月火水木金土日祝休](?:\s*[・･,、/／]\s*[月火水木金土日祝休])*|(?i:mon|tue|wed|thu|fri|sat|sun)[a-z]*\.?)\s*[)）]",
    )
    .expect("weekday regex must compile")
});

static RANGE_SHAPES: LazyLock<Vec<(RangeShape, Regex)>> = LazyLock::new(|| {
    [
        (RangeShape::Full, format!("{}{RANGE_SEP}{}", ymd(1), ymd(2))),
        (RangeShape::YmdToMd, format!("{}{RANGE_SEP}{}", ymd(1), md(2))),
        (RangeShape::YmdToDay, format!("{}{RANGE_SEP}{}", ymd(1), day(2))),
        (RangeShape::MdToMd, format!("{}{RANGE_SEP}{}", md(1), md(2))),
        (RangeShape::MdToDay, format!("{}{RANGE_SEP}{}", md(1), day(2))),
    ]
    .into_iter()
    .map(|(shape, pattern)| {
        let regex = Regex::new(&pattern).expect("range regex must compile");
        (shape, regex)
    })
    .collect()
});

static SINGLE_YMD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(&ymd(1)).expect("single date regex must compile"));
static SINGLE_MD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(&md(1)).expect("month/day regex must compile"));

fn ymd(n: u8) -> String {
    format!(r"(?P<y{n}>{DIGIT}{{4}})[./-]\s*(?P<m{n}>{DIGIT}{{1,2}})[./-]\s*(?P<d{n}>{DIGIT}{{1,2}}){WEEKDAY}")
}

fn md(n: u8) -> String {
    format!(r"(?P<m{n}>{DIGIT}{{1,2}})[./-]\s*(?P<d{n}>{DIGIT}{{1,2}}){WEEKDAY}")
}

fn day(n: u8) -> String {
    format!(r"(?P<d{n}>{DIGIT}{{1,2}}){WEEKDAY}")
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RangeShape {
    Full,
    YmdToMd,
    YmdToDay,
    MdToMd,
    MdToDay,
}

impl RangeShape {
    fn ends_with_bare_day(self) -> bool {
        matches!(self, RangeShape::YmdToDay | RangeShape::MdToDay)
    }

    fn resolve(self, caps: &Captures<'_>, base_year: i32) -> Option<DateInterval> {
        let (start, end) = match self {
            RangeShape::Full => (
                date_from(caps, Some("y1"), "m1", "d1", base_year)?,
                date_from(caps, Some("y2"), "m2", "d2", base_year)?,
            ),
            RangeShape::YmdToMd => {
                let start = date_from(caps, Some("y1"), "m1", "d1", base_year)?;
                let year = start.year();
                let end = date_from(caps, None, "m2", "d2", year)?;
                if end < start {
                    (start, date_from(caps, None, "m2", "d2", year + 1)?)
                } else {
                    (start, end)
                }
            }
            RangeShape::YmdToDay => {
                let start = date_from(caps, Some("y1"), "m1", "d1", base_year)?;
                let end = NaiveDate::from_ymd_opt(
                    start.year(),
                    number(caps, "m1")?,
                    number(caps, "d2")?,
                )?;
                (start, end)
            }
            RangeShape::MdToMd => (
                date_from(caps, None, "m1", "d1", base_year)?,
                date_from(caps, None, "m2", "d2", base_year)?,
            ),
            RangeShape::MdToDay => (
                date_from(caps, None, "m1", "d1", base_year)?,
                NaiveDate::from_ymd_opt(base_year, number(caps, "m1")?, number(caps, "d2")?)?,
            ),
        };
        DateInterval::new(start, end)
    }
}

fn number(caps: &Captures<'_>, name: &str) -> Option<u32> {
    caps.name(name)?
        .as_str()
        .chars()
        .try_fold(0u32, |acc, c| Some(acc * 10 + digit_value(c)?))
}

/// Value of an ASCII or full-width decimal digit.
fn digit_value(c: char) -> Option<u32> {
    match c {
        '0'..='9' => c.to_digit(10),
        '０'..='９' => Some(c as u32 - '０' as u32),
        _ => None,
    }
}

fn is_digit(c: char) -> bool {
    digit_value(c).is_some()
}

fn date_from(
    caps: &Captures<'_>,
    year: Option<&str>,
    month: &str,
    day: &str,
    default_year: i32,
) -> Option<NaiveDate> {
    let year = match year {
        Some(name) => i32::try_from(number(caps, name)?).ok()?,
        None => default_year,
    };
    NaiveDate::from_ymd_opt(year, number(caps, month)?, number(caps, day)?)
}

/// Rewrites localized date glyphs into the ASCII forms the patterns expect.
///
/// Year/month markers become `/`, the day marker is dropped, weekday
/// parentheticals collapse to `(w)`, every dash-like or wave-like range glyph
/// becomes `~`, and full-width punctuation is folded to half-width. Digits are
/// never touched.
pub fn normalize_date_text(text: &str) -> String {
    let marked = WEEKDAY_MARK.replace_all(text, "(w)").replace("から", "~");
    let mut out = String::with_capacity(marked.len());
    for c in marked.chars() {
        match c {
            '年' | '月' | '／' => out.push('/'),
            '日' => {}
            '．' => out.push('.'),
            '－' => out.push('-'),
            '：' => out.push(':'),
            '（' => out.push('('),
            '）' => out.push(')'),
            '　' => out.push(' '),
            '～' | '〜' | '∼' | '〰' | '–' | '—' | '―' | '─' | '━' | 'ー' | '‐' | '‑' | '−' | '至' => {
                out.push('~')
            }
            other => out.push(other),
        }
    }
    out
}

/// Extracts every date interval mentioned in `text`.
///
/// Ranges are matched first; a single date is only reported when no range
/// from the same text already covers it. Dates without a year take
/// `base_year`. Malformed dates and reversed ranges are dropped. The result
/// is an unordered collection.
pub fn extract_ranges(text: &str, base_year: i32) -> Vec<DateInterval> {
    let mut working = normalize_date_text(text);
    let mut intervals: Vec<DateInterval> = Vec::new();

    for (shape, regex) in RANGE_SHAPES.iter() {
        let mut consumed = Vec::new();
        for caps in regex.captures_iter(&working) {
            let Some(whole) = caps.get(0) else {
                continue;
            };
            if !has_digit_boundaries(&working, whole.range(), shape.ends_with_bare_day()) {
                continue;
            }
            if let Some(interval) = shape.resolve(&caps, base_year) {
                if !intervals.contains(&interval) {
                    intervals.push(interval);
                }
                consumed.push(whole.range());
            }
        }
        blank_spans(&mut working, &consumed);
    }

    let mut singles = Vec::new();
    let mut consumed = Vec::new();
    for caps in SINGLE_YMD.captures_iter(&working) {
        let Some(whole) = caps.get(0) else {
            continue;
        };
        if !has_digit_boundaries(&working, whole.range(), false) {
            continue;
        }
        consumed.push(whole.range());
        if let Some(date) = date_from(&caps, Some("y1"), "m1", "d1", base_year) {
            singles.push(date);
        }
    }
    blank_spans(&mut working, &consumed);

    for caps in SINGLE_MD.captures_iter(&working) {
        let Some(whole) = caps.get(0) else {
            continue;
        };
        if !has_digit_boundaries(&working, whole.range(), false) {
            continue;
        }
        if let Some(date) = date_from(&caps, None, "m1", "d1", base_year) {
            singles.push(date);
        }
    }

    for date in singles {
        if !intervals.iter().any(|interval| interval.contains(date)) {
            intervals.push(DateInterval::single(date));
        }
    }

    intervals
}

fn has_digit_boundaries(text: &str, span: Range<usize>, bare_day_tail: bool) -> bool {
    let mut before = text[..span.start].chars().rev();
    match before.next() {
        Some(c) if is_digit(c) => return false,
        Some('.' | '/') if before.next().is_some_and(is_digit) => return false,
        _ => {}
    }

    match text[span.end..].chars().next() {
        Some(c) if is_digit(c) => false,
        Some('.' | '/' | '-') if bare_day_tail => false,
        _ => true,
    }
}

fn blank_spans(text: &mut String, spans: &[Range<usize>]) {
    for span in spans {
        let width = span.end - span.start;
        text.replace_range(span.clone(), &" ".repeat(width));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn interval(a: NaiveDate, b: NaiveDate) -> DateInterval {
        DateInterval::new(a, b).unwrap()
    }

    #[test]
    fn separator_variants_parse_to_same_interval() {
        let expected = vec![interval(d(2025, 11, 14), d(2025, 11, 16))];
        let variants = [
            "2025-11-14～2025-11-16",
            "2025/11/14〜2025/11/16",
            "2025.11.14 - 2025.11.16",
            "2025年11月14日～2025年11月16日",
            "2025年11月14日(金)〜2025年11月16日(日)",
            "2025/11/14（金）～2025/11/16（日）",
            "2025/11/14 to 2025/11/16",
            "2025/11/14から2025/11/16",
            "2025/11/14―2025/11/16",
            "2025/11/14–2025/11/16",
            "2025-11-14~2025-11-16",
            "2025／11／14 ー 2025／11／16",
            "２０２５年１１月１４日～２０２５年１１月１６日",
            "２０２５/１１/１４〜2025/11/16",
        ];
        for text in variants {
            assert_eq!(extract_ranges(text, 2025), expected, "variant {text}");
        }
    }

    #[test]
    fn year_omitted_range_uses_base_year() {
        let found = extract_ranges("11/14(金)〜11/16(日) 開催", 2025);
        assert_eq!(found, vec![interval(d(2025, 11, 14), d(2025, 11, 16))]);

        let found = extract_ranges("10月1日～10月3日", 2031);
        assert_eq!(found, vec![interval(d(2031, 10, 1), d(2031, 10, 3))]);
    }

    #[test]
    fn single_inside_range_is_subsumed() {
        let found = extract_ranges("2025/11/14～2025/11/16 初日 11/15 はオープニング", 2025);
        assert_eq!(found, vec![interval(d(2025, 11, 14), d(2025, 11, 16))]);
    }

    #[test]
    fn single_outside_range_is_kept() {
        let mut found = extract_ranges("11/14～11/16 本祭、前夜祭 11/13", 2025);
        found.sort();
        assert_eq!(
            found,
            vec![
                DateInterval::single(d(2025, 11, 13)),
                interval(d(2025, 11, 14), d(2025, 11, 16)),
            ]
        );
    }

    #[test]
    fn invalid_day_is_dropped() {
        assert!(extract_ranges("2025/02/30 開催", 2025).is_empty());
        assert_eq!(
            extract_ranges("2025/2/30～2025/3/2", 2025),
            vec![DateInterval::single(d(2025, 3, 2))]
        );
    }

    #[test]
    fn reversed_range_degrades_to_single_dates() {
        let mut found = extract_ranges("2025/11/16～2025/11/14", 2025);
        found.sort();
        assert_eq!(
            found,
            vec![
                DateInterval::single(d(2025, 11, 14)),
                DateInterval::single(d(2025, 11, 16)),
            ]
        );
    }

    #[test]
    fn bare_day_end_inherits_month() {
        let found = extract_ranges("2025年11月14日(金)～16日(日)", 2024);
        assert_eq!(found, vec![interval(d(2025, 11, 14), d(2025, 11, 16))]);

        let found = extract_ranges("8/13〜16 夏祭り", 2026);
        assert_eq!(found, vec![interval(d(2026, 8, 13), d(2026, 8, 16))]);
    }

    #[test]
    fn year_qualified_start_rolls_end_into_next_year() {
        let found = extract_ranges("2025/12/27～1/4", 2025);
        assert_eq!(found, vec![interval(d(2025, 12, 27), d(2026, 1, 4))]);
    }

    #[test]
    fn month_day_never_matches_inside_full_date() {
        assert_eq!(
            extract_ranges("2012-01-05 更新", 2025),
            vec![DateInterval::single(d(2012, 1, 5))]
        );
    }

    #[test]
    fn text_without_dates_yields_nothing() {
        assert!(extract_ranges("イベント情報", 2025).is_empty());
        assert!(extract_ranges("開場 10:00-17:00", 2025).is_empty());
        assert!(extract_ranges("", 2025).is_empty());
    }

    #[test]
    fn full_width_digits_parse_like_ascii() {
        let found = extract_ranges("２０２５年１１月１４日～２０２５年１１月１６日 デザインフェスタ", 2025);
        assert_eq!(found, vec![interval(d(2025, 11, 14), d(2025, 11, 16))]);

        let found = extract_ranges("１１月１４日（金）〜１６日（日）", 2025);
        assert_eq!(found, vec![interval(d(2025, 11, 14), d(2025, 11, 16))]);

        assert_eq!(
            extract_ranges("２０１２年１月５日 更新", 2025),
            vec![DateInterval::single(d(2012, 1, 5))]
        );
    }

    #[test]
    fn normalization_keeps_digits() {
        assert_eq!(normalize_date_text("10月1日"), "10/1");
        assert_eq!(normalize_date_text("１１月"), "１１/");
        assert_eq!(normalize_date_text("２０２５年１１月１４日"), "２０２５/１１/１４");
        assert_eq!(normalize_date_text("11/14(土・祝)〜"), "11/14(w)~");
        assert_eq!(normalize_date_text("Sat (Sun.)"), "Sat (w)");
    }
}
