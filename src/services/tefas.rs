// src/services/tefas.rs
use async_trait::async_trait;
use log::{debug, info};
use regex::Regex;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, ACCEPT_LANGUAGE};
use reqwest::Client;
use scraper::{Html, Selector};
use std::time::Duration;

use super::sources::{FundPage, FundPageSource};
use crate::error::FetchError;
use crate::models::{Allocation, AllocationEntry};

const USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 Chrome/120.0.0.0 Safari/537.36";
const PIE_CHART_MARKER: &str = "PieChartFonDagilim";
const DATA_BLOCK_START: &str = "\"data\":[[";

// Highcharts default palette, assigned by slice position
const PIE_COLORS: [&str; 10] = [
    "#4572A7", "#AA4643", "#89A54E", "#80699B", "#3D96AE",
    "#DB843D", "#92A8CD", "#A47D7C", "#B5CA92", "#7cb5ec",
];

pub struct TefasClient {
    client: Client,
    page_url: String,
}

impl TefasClient {
    /// `page_url` must contain a `{code}` placeholder.
    pub fn new(page_url: impl Into<String>) -> Result<Self, FetchError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            ACCEPT,
            HeaderValue::from_static("text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8"),
        );
        headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static("tr-TR,tr;q=0.9,en-US;q=0.8,en;q=0.7"));

        let client = Client::builder()
            .user_agent(USER_AGENT)
            .default_headers(headers)
            .timeout(Duration::from_secs(15))
            .build()?;

        Ok(TefasClient {
            client,
            page_url: page_url.into(),
        })
    }

    pub fn page_url(&self, code: &str) -> String {
        self.page_url.replace("{code}", code)
    }

    async fn fetch_html(&self, url: &str) -> Result<String, FetchError> {
        info!("Fetching fund page: {}", url);
        let response = self.client.get(url).send().await?;
        if !response.status().is_success() {
            return Err(FetchError::Status {
                status: response.status().as_u16(),
                url: url.to_string(),
            });
        }
        Ok(response.text().await?)
    }
}

#[async_trait]
impl FundPageSource for TefasClient {
    async fn fetch_fund_page(&self, code: &str) -> Result<FundPage, FetchError> {
        let html = self.fetch_html(&self.page_url(code)).await?;
        Ok(parse_fund_page(&html))
    }
}

pub fn parse_fund_page(html: &str) -> FundPage {
    FundPage {
        allocation: parse_allocation_data(html),
        daily_return: parse_daily_return(html),
    }
}

/// Asset allocation from the page's pie chart configuration.
///
/// Reads the `"data":[["label", pct], ...]` block of the allocation chart;
/// when that yields nothing, falls back to `"name": ..., "y": ...` points.
pub fn parse_allocation_data(html: &str) -> Allocation {
    let mut allocation = Allocation::new();

    if html.contains(PIE_CHART_MARKER) {
        let script = chart_script(html);
        let source = script.as_deref().unwrap_or(html);
        if let Some(block) = data_block(source) {
            if let Ok(re) = Regex::new(r#"\["([^"]+)",\s*([\d.]+)\]"#) {
                let pairs = re.captures_iter(block).map(|c| (c[1].to_string(), c[2].to_string()));
                insert_slices(&mut allocation, pairs, |pct| pct > 0.0);
            }
        }
    }

    if allocation.is_empty() {
        if let Ok(re) = Regex::new(r#""name"\s*:\s*"([^"]+)"[^}]*"y"\s*:\s*([\d.]+)"#) {
            let pairs = re.captures_iter(html).map(|c| (c[1].to_string(), c[2].to_string()));
            insert_slices(&mut allocation, pairs, |pct| pct > 0.0 && pct <= 100.0);
        }
    }

    debug!("Parsed {} allocation slices", allocation.len());
    allocation
}

/// Text of the daily return cell, e.g. `"%0,45"`.
pub fn parse_daily_return(html: &str) -> Option<String> {
    let re = Regex::new(r"(?is)Günlük Getiri \(%\).*?<span>([^<]+)</span>").ok()?;
    re.captures(html)
        .map(|c| c[1].trim().to_string())
        .filter(|s| !s.is_empty())
}

/// Text of the first `<script>` element mentioning the allocation chart.
fn chart_script(html: &str) -> Option<String> {
    let document = Html::parse_document(html);
    let selector = Selector::parse("script").ok()?;
    document
        .select(&selector)
        .map(|el| el.text().collect::<String>())
        .find(|text| text.contains(PIE_CHART_MARKER) && text.contains(DATA_BLOCK_START))
}

fn data_block(source: &str) -> Option<&str> {
    let start = source.find(DATA_BLOCK_START)?;
    let end = source[start..].find("]]")? + start;
    Some(&source[start + DATA_BLOCK_START.len() - 2..end + 2])
}

fn insert_slices<I, F>(allocation: &mut Allocation, pairs: I, accept: F)
where
    I: Iterator<Item = (String, String)>,
    F: Fn(f64) -> bool,
{
    for (i, (name, value)) in pairs.enumerate() {
        let label = name.trim();
        let Ok(pct) = value.parse::<f64>() else {
            continue;
        };
        if label.is_empty() || !accept(pct) {
            continue;
        }
        allocation.insert(
            label.to_string(),
            AllocationEntry {
                percentage: pct,
                color: Some(PIE_COLORS[i % PIE_COLORS.len()].to_string()),
            },
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PIE_PAGE: &str = r##"<html><body>
        <div id="MainContent_PieChartFonDagilim"></div>
        <script type="text/javascript">
        new Highcharts.Chart({"chart":{"renderTo":"MainContent_PieChartFonDagilim"},
            "series":[{"type":"pie","data":[["Hisse Senedi",55.2],["Ters-Repo",30.1],["Devlet Tahvili", 14.7],["Diğer",0]]}]});
        </script>
        <ul><li>Günlük Getiri (%)
            <span>%0,45</span></li></ul>
        </body></html>"##;

    #[test]
    fn test_parse_pie_chart_data() {
        let allocation = parse_allocation_data(PIE_PAGE);
        assert_eq!(allocation.len(), 3);
        assert_eq!(allocation["Hisse Senedi"].percentage, 55.2);
        assert_eq!(allocation["Hisse Senedi"].color.as_deref(), Some("#4572A7"));
        assert_eq!(allocation["Devlet Tahvili"].percentage, 14.7);
        assert_eq!(allocation["Devlet Tahvili"].color.as_deref(), Some("#89A54E"));
        assert!(!allocation.contains_key("Diğer"));
    }

    #[test]
    fn test_parse_name_y_fallback() {
        let html = r#"<script>var pts = [{"name":"Kıymetli Madenler","y":80.5},{"name":"Mevduat","y":19.5},{"name":"Bozuk","y":150}];</script>"#;
        let allocation = parse_allocation_data(html);
        assert_eq!(allocation.len(), 2);
        assert_eq!(allocation["Kıymetli Madenler"].percentage, 80.5);
        assert!(!allocation.contains_key("Bozuk"));
    }

    #[test]
    fn test_parse_empty_page() {
        assert!(parse_allocation_data("<html></html>").is_empty());
        assert_eq!(parse_daily_return("<html></html>"), None);
    }

    #[test]
    fn test_parse_daily_return() {
        assert_eq!(parse_daily_return(PIE_PAGE).as_deref(), Some("%0,45"));
    }

    #[test]
    fn test_page_url_template() {
        let client = TefasClient::new("https://example.test/fund?code={code}").unwrap();
        assert_eq!(client.page_url("AFA"), "https://example.test/fund?code=AFA");
    }
}
