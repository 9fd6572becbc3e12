use anyhow::{Context, Result, anyhow, bail};
use chrono::{Datelike, NaiveDate};
use serde::Deserialize;
use std::fmt;
use std::path::Path;
use url::Url;

/// The only country whose holidays are computed from built-in rules.
pub const DOMESTIC_RULE_COUNTRY: &str = "JP";

#[derive(Debug, Clone, Deserialize)]
pub struct EngineConfig {
    #[serde(default)]
    pub fetch: FetchConfig,
    #[serde(default = "default_sources")]
    pub sources: Vec<SourceConfig>,
    #[serde(default)]
    pub calendar: CalendarConfig,
    #[serde(default = "default_countries")]
    pub countries: Vec<CountryConfig>,
    #[serde(default)]
    pub long_holiday: LongHolidayConfig,
    #[serde(default)]
    pub scanner: ScannerConfig,
    #[serde(default)]
    pub classifier: ClassifierConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            fetch: FetchConfig::default(),
            sources: default_sources(),
            calendar: CalendarConfig::default(),
            countries: default_countries(),
            long_holiday: LongHolidayConfig::default(),
            scanner: ScannerConfig::default(),
            classifier: ClassifierConfig::default(),
        }
    }
}

impl EngineConfig {
    pub fn validate(&self) -> Result<()> {
        if self.fetch.timeout_secs == 0 || self.fetch.timeout_secs > 30 {
            bail!("fetch.timeout_secs must be between 1 and 30");
        }
        if self.fetch.cache_capacity == 0 {
            bail!("fetch.cache_capacity must be positive");
        }
        if self.calendar.timeout_secs == 0 || self.calendar.timeout_secs > 30 {
            bail!("calendar.timeout_secs must be between 1 and 30");
        }
        if self.calendar.domestic_country != DOMESTIC_RULE_COUNTRY {
            bail!(
                "calendar.domestic_country must be {DOMESTIC_RULE_COUNTRY} (the built-in holiday rules), got {}",
                self.calendar.domestic_country
            );
        }
        Url::parse(&self.calendar.base_url)
            .with_context(|| format!("invalid calendar.base_url {}", self.calendar.base_url))?;

        for source in &self.sources {
            if source.venue.trim().is_empty() {
                bail!("source venue must not be empty ({})", source.url);
            }
            Url::parse(&source.url).with_context(|| format!("invalid source url {}", source.url))?;
        }

        for country in &self.countries {
            if !is_country_code(&country.code) {
                bail!("country code is not a two-letter code: {}", country.code);
            }
            if country.label.trim().is_empty() {
                bail!("country label must not be empty ({})", country.code);
            }
        }

        if self.long_holiday.min_run == 0 {
            bail!("long_holiday.min_run must be positive");
        }
        if self.long_holiday.domestic_scan_days < 366 {
            bail!("long_holiday.domestic_scan_days must cover a full year");
        }
        if self.long_holiday.foreign_scan_days < 366 + self.long_holiday.foreign_lead_days {
            bail!("long_holiday.foreign_scan_days must cover the lead days and a full year");
        }

        if self.scanner.node_kinds.is_empty() {
            bail!("scanner.node_kinds must not be empty");
        }
        if self.scanner.max_title_chars < 4 {
            bail!("scanner.max_title_chars must leave room for the ellipsis");
        }

        if self.classifier.flagship_venue.trim().is_empty() {
            bail!("classifier.flagship_venue must not be empty");
        }
        for alias in &self.classifier.aliases {
            if alias.contains.is_empty() || alias.canonical.is_empty() {
                bail!("classifier aliases need both `contains` and `canonical`");
            }
        }

        Ok(())
    }
}

pub fn load_config(path: &Path) -> Result<EngineConfig> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read config: {}", path.display()))?;
    let config: EngineConfig = toml::from_str(&text)
        .with_context(|| format!("failed to parse toml in {}", path.display()))?;
    config
        .validate()
        .with_context(|| format!("invalid config {}", path.display()))?;
    Ok(config)
}

#[derive(Debug, Clone, Deserialize)]
pub struct FetchConfig {
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    #[serde(default = "default_cache_capacity")]
    pub cache_capacity: u64,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
            user_agent: default_user_agent(),
            cache_capacity: default_cache_capacity(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SourceConfig {
    pub url: String,
    pub venue: String,
    #[serde(default = "default_true")]
    pub enabled: bool,
}

impl SourceConfig {
    pub fn new(url: impl Into<String>, venue: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            venue: venue.into(),
            enabled: true,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CalendarConfig {
    #[serde(default = "default_domestic_country")]
    pub domestic_country: String,
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_calendar_base_url")]
    pub base_url: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for CalendarConfig {
    fn default() -> Self {
        Self {
            domestic_country: default_domestic_country(),
            enabled: true,
            base_url: default_calendar_base_url(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CountryConfig {
    pub code: String,
    pub label: String,
    #[serde(default)]
    pub subdivision: Option<String>,
}

impl CountryConfig {
    pub fn new(code: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            label: label.into(),
            subdivision: None,
        }
    }
}

/// A month/day pair written as `MM-DD`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Deserialize)]
#[serde(try_from = "String")]
pub struct MonthDay {
    pub month: u32,
    pub day: u32,
}

impl MonthDay {
    pub const fn new(month: u32, day: u32) -> Self {
        Self { month, day }
    }

    /// Resolves against `year`; Feb 29 falls back to Feb 28 outside leap years.
    pub fn in_year(&self, year: i32) -> Option<NaiveDate> {
        NaiveDate::from_ymd_opt(year, self.month, self.day).or_else(|| {
            (self.month == 2 && self.day == 29)
                .then(|| NaiveDate::from_ymd_opt(year, 2, 28))
                .flatten()
        })
    }
}

impl TryFrom<String> for MonthDay {
    type Error = anyhow::Error;

    fn try_from(value: String) -> Result<Self> {
        let (month, day) = value
            .trim()
            .split_once('-')
            .ok_or_else(|| anyhow!("expected MM-DD, got {value}"))?;
        let month: u32 = month
            .parse()
            .with_context(|| format!("invalid month in {value}"))?;
        let day: u32 = day.parse().with_context(|| format!("invalid day in {value}"))?;
        // 2024 is a leap year, so every real month/day resolves.
        if NaiveDate::from_ymd_opt(2024, month, day).is_none() {
            bail!("no such calendar day: {value}");
        }
        Ok(Self { month, day })
    }
}

impl fmt::Display for MonthDay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}-{:02}", self.month, self.day)
    }
}

/// An inclusive month/day window; when `to` precedes `from` the window
/// wraps into the following year.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct CalendarWindow {
    pub from: MonthDay,
    pub to: MonthDay,
}

impl CalendarWindow {
    pub const fn new(from: MonthDay, to: MonthDay) -> Self {
        Self { from, to }
    }

    pub fn wraps(&self) -> bool {
        self.to < self.from
    }

    /// The window opening in `year`, as concrete bounds.
    pub fn bounds_in(&self, year: i32) -> Option<(NaiveDate, NaiveDate)> {
        let start = self.from.in_year(year)?;
        let end_year = if self.wraps() { year + 1 } else { year };
        let end = self.to.in_year(end_year)?;
        Some((start, end))
    }

    pub fn days_in(&self, year: i32) -> Vec<NaiveDate> {
        let Some((start, end)) = self.bounds_in(year) else {
            return Vec::new();
        };
        start.iter_days().take_while(|day| *day <= end).collect()
    }

    /// True when `date` falls inside the window opening in its own year or,
    /// for wrapping windows, the one opened the year before.
    pub fn contains(&self, date: NaiveDate) -> bool {
        let opened_in = |year: i32| {
            self.bounds_in(year)
                .is_some_and(|(start, end)| start <= date && date <= end)
        };
        opened_in(date.year()) || (self.wraps() && opened_in(date.year() - 1))
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LongHolidayConfig {
    #[serde(default = "default_min_run")]
    pub min_run: usize,
    #[serde(default = "default_domestic_scan_days")]
    pub domestic_scan_days: u64,
    #[serde(default = "default_foreign_lead_days")]
    pub foreign_lead_days: u64,
    #[serde(default = "default_foreign_scan_days")]
    pub foreign_scan_days: u64,
    #[serde(default = "default_blackout_windows")]
    pub blackout_windows: Vec<CalendarWindow>,
    #[serde(default = "default_school_breaks")]
    pub school_breaks: Vec<CalendarWindow>,
    #[serde(default = "default_crowded_windows")]
    pub crowded_windows: Vec<CalendarWindow>,
}

impl Default for LongHolidayConfig {
    fn default() -> Self {
        Self {
            min_run: default_min_run(),
            domestic_scan_days: default_domestic_scan_days(),
            foreign_lead_days: default_foreign_lead_days(),
            foreign_scan_days: default_foreign_scan_days(),
            blackout_windows: default_blackout_windows(),
            school_breaks: default_school_breaks(),
            crowded_windows: default_crowded_windows(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ScannerConfig {
    #[serde(default = "default_min_text_chars")]
    pub min_text_chars: usize,
    #[serde(default = "default_max_title_chars")]
    pub max_title_chars: usize,
    #[serde(default = "default_node_kinds")]
    pub node_kinds: Vec<String>,
}

impl Default for ScannerConfig {
    fn default() -> Self {
        Self {
            min_text_chars: default_min_text_chars(),
            max_title_chars: default_max_title_chars(),
            node_kinds: default_node_kinds(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AliasRule {
    pub contains: String,
    pub canonical: String,
}

impl AliasRule {
    pub fn new(contains: impl Into<String>, canonical: impl Into<String>) -> Self {
        Self {
            contains: contains.into(),
            canonical: canonical.into(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ClassifierConfig {
    #[serde(default = "default_min_title_chars")]
    pub min_title_chars: usize,
    #[serde(default = "default_max_duration_days")]
    pub max_duration_days: i64,
    #[serde(default = "default_flagship_venue")]
    pub flagship_venue: String,
    #[serde(default = "default_noise_phrases")]
    pub noise_phrases: Vec<String>,
    #[serde(default = "default_evergreen_attractions")]
    pub evergreen_attractions: Vec<String>,
    #[serde(default = "default_big_event_keywords")]
    pub big_event_keywords: Vec<String>,
    #[serde(default = "default_aliases")]
    pub aliases: Vec<AliasRule>,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            min_title_chars: default_min_title_chars(),
            max_duration_days: default_max_duration_days(),
            flagship_venue: default_flagship_venue(),
            noise_phrases: default_noise_phrases(),
            evergreen_attractions: default_evergreen_attractions(),
            big_event_keywords: default_big_event_keywords(),
            aliases: default_aliases(),
        }
    }
}

fn is_country_code(code: &str) -> bool {
    code.len() == 2 && code.chars().all(|c| c.is_ascii_uppercase())
}

fn strings(values: &[&str]) -> Vec<String> {
    values.iter().map(ToString::to_string).collect()
}

fn window(from: (u32, u32), to: (u32, u32)) -> CalendarWindow {
    CalendarWindow::new(MonthDay::new(from.0, from.1), MonthDay::new(to.0, to.1))
}

fn default_true() -> bool {
    true
}

fn default_timeout_secs() -> u64 {
    8
}

fn default_user_agent() -> String {
    "Mozilla/5.0".to_string()
}

fn default_cache_capacity() -> u64 {
    64
}

fn default_domestic_country() -> String {
    DOMESTIC_RULE_COUNTRY.to_string()
}

fn default_calendar_base_url() -> String {
    "https://date.nager.at/api/v3".to_string()
}

fn default_sources() -> Vec<SourceConfig> {
    vec![
        SourceConfig::new("https://www.bigsight.jp/visitor/event/", "東京ビッグサイト"),
        SourceConfig::new(
            "https://mitsui-shopping-park.com/divercity-tokyo/event/",
            "ダイバーシティ東京プラザ",
        ),
        SourceConfig::new("https://www.tokyo-odaiba.net/event_index/", "お台場（公式一覧）"),
        SourceConfig::new(
            "https://www.tokyo-odaiba.net/event_calender/",
            "お台場（公式カレンダー）",
        ),
        SourceConfig::new(
            "https://www.zepp.co.jp/hall/divercity/schedule/",
            "Zepp DiverCity",
        ),
    ]
}

fn default_countries() -> Vec<CountryConfig> {
    [
        ("JP", "日本"),
        ("CN", "中国"),
        ("US", "アメリカ"),
        ("KR", "韓国"),
        ("TW", "台湾"),
        ("HK", "香港"),
        ("SG", "シンガポール"),
        ("TH", "タイ"),
        ("VN", "ベトナム"),
        ("MY", "マレーシア"),
        ("ID", "インドネシア"),
        ("PH", "フィリピン"),
        ("GB", "イギリス"),
        ("FR", "フランス"),
        ("DE", "ドイツ"),
        ("IT", "イタリア"),
        ("ES", "スペイン"),
        ("CA", "カナダ"),
        ("AU", "オーストラリア"),
        ("IN", "インド"),
        ("BR", "ブラジル"),
    ]
    .into_iter()
    .map(|(code, label)| CountryConfig::new(code, label))
    .collect()
}

fn default_min_run() -> usize {
    3
}

fn default_domestic_scan_days() -> u64 {
    370
}

fn default_foreign_lead_days() -> u64 {
    7
}

fn default_foreign_scan_days() -> u64 {
    370 + 14
}

fn default_blackout_windows() -> Vec<CalendarWindow> {
    vec![window((8, 13), (8, 16))]
}

fn default_school_breaks() -> Vec<CalendarWindow> {
    vec![
        window((7, 20), (8, 31)),
        window((12, 25), (1, 7)),
        window((3, 20), (4, 5)),
    ]
}

fn default_crowded_windows() -> Vec<CalendarWindow> {
    vec![
        window((7, 20), (8, 31)),
        window((12, 25), (1, 7)),
        window((3, 20), (4, 5)),
        window((8, 13), (8, 16)),
        window((4, 29), (5, 6)),
    ]
}

fn default_min_text_chars() -> usize {
    6
}

fn default_max_title_chars() -> usize {
    120
}

fn default_node_kinds() -> Vec<String> {
    strings(&["h1", "h2", "h3", "h4", "p", "li", "div", "a", "span"])
}

fn default_min_title_chars() -> usize {
    6
}

fn default_max_duration_days() -> i64 {
    10
}

fn default_flagship_venue() -> String {
    "東京ビッグサイト".to_string()
}

fn default_noise_phrases() -> Vec<String> {
    strings(&[
        "アクセス",
        "フロアマップ",
        "イベント情報",
        "ショップ＆レストラン",
        "イベント検索",
        "日付検索",
        "検索結果",
        "カレンダー",
        "カレンダーから探す",
        "ジャンル",
        "条件選択",
        "カテゴリーから探す",
        "キーワードから探す",
        "年間の主要イベント",
        "イベント・キャンペーン",
        "入場区分",
        "開催期間",
        "開催時間",
        "商談日時",
    ])
}

fn default_evergreen_attractions() -> Vec<String> {
    strings(&[
        "お台場たこ焼きミュージアム",
        "台場一丁目商店街",
        "デックス東京ビーチ",
    ])
}

fn default_big_event_keywords() -> Vec<String> {
    strings(&[
        "フェス",
        "フェスタ",
        "祭",
        "博",
        "博覧会",
        "展示会",
        "見本市",
        "エキスポ",
        "EXPO",
        "コミックマーケット",
        "コミケ",
        "フェア",
        "ショー",
        "花火",
        "花火大会",
        "HANABI",
    ])
}

fn default_aliases() -> Vec<AliasRule> {
    vec![
        AliasRule::new("デザインフェスタ", "デザインフェスタ vol.62 ＜東京ビッグサイト＞"),
        AliasRule::new(
            "アミューズメント エキスポ",
            "アミューズメント エキスポ 2025 ＜東京ビッグサイト＞",
        ),
        AliasRule::new(
            "プロジェクションマッピングアワード",
            "東京国際プロジェクションマッピングアワード Vol.10",
        ),
        AliasRule::new("防災フェスタ", "防災フェスタ2025「備蓄を考える」"),
    ]
}
