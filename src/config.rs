// src/config.rs
use chrono_tz::Tz;
use log::warn;
use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

pub const DEFAULT_PORT: u16 = 3030;
pub const DEFAULT_CACHE_FILE: &str = "fund_cache.json";
pub const DEFAULT_FUND_PAGE_URL: &str = "https://www.tefas.gov.tr/FonAnaliz.aspx?FonKod={code}";

#[derive(Debug, Clone)]
pub struct Settings {
    pub port: u16,
    pub cache_file: PathBuf,
    /// Pause between requests while pulling many funds in sequence.
    pub batch_request_delay: Duration,
    /// Pause before an interactive single-fund lookup.
    pub single_request_delay: Duration,
    /// Pause between macro symbols during a refresh.
    pub macro_request_delay: Duration,
    /// Quick macro refresh period; `None` disables the loop.
    pub macro_auto_refresh: Option<Duration>,
    pub market_tz: Tz,
    pub funds_csv: Option<PathBuf>,
    pub fund_page_url: String,
    pub batch_save_every: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            port: DEFAULT_PORT,
            cache_file: PathBuf::from(DEFAULT_CACHE_FILE),
            batch_request_delay: Duration::from_millis(1500),
            single_request_delay: Duration::from_millis(3000),
            macro_request_delay: Duration::from_millis(250),
            macro_auto_refresh: Some(Duration::from_secs(10)),
            market_tz: chrono_tz::Europe::Istanbul,
            funds_csv: None,
            fund_page_url: DEFAULT_FUND_PAGE_URL.to_string(),
            batch_save_every: 20,
        }
    }
}

impl Settings {
    /// Read settings from the process environment (call `dotenv().ok()` first).
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Settings::default();

        let auto_refresh_secs: u64 = parse_or(&lookup, "MACRO_AUTO_REFRESH_SECS", 10);

        Settings {
            port: parse_or(&lookup, "PORT", defaults.port),
            cache_file: lookup("CACHE_FILE")
                .map(PathBuf::from)
                .unwrap_or(defaults.cache_file),
            batch_request_delay: Duration::from_millis(parse_or(&lookup, "BATCH_REQUEST_DELAY_MS", 1500)),
            single_request_delay: Duration::from_millis(parse_or(&lookup, "SINGLE_REQUEST_DELAY_MS", 3000)),
            macro_request_delay: Duration::from_millis(parse_or(&lookup, "MACRO_REQUEST_DELAY_MS", 250)),
            macro_auto_refresh: (auto_refresh_secs > 0).then(|| Duration::from_secs(auto_refresh_secs)),
            market_tz: parse_or(&lookup, "MARKET_TZ", defaults.market_tz),
            funds_csv: lookup("FUNDS_CSV")
                .filter(|p| !p.trim().is_empty())
                .map(PathBuf::from),
            fund_page_url: lookup("FUND_PAGE_URL").unwrap_or(defaults.fund_page_url),
            batch_save_every: parse_or(&lookup, "BATCH_SAVE_EVERY", defaults.batch_save_every).max(1),
        }
    }
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> T
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match lookup(key) {
        Some(raw) => raw.trim().parse().unwrap_or_else(|_| {
            warn!("{} has an invalid value {:?}, using the default", key, raw);
            default
        }),
        None => default,
    }
}
