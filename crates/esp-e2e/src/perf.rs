//! Load-test statistics, SLA checks and the HTML summary.
//!
//! Client-side numbers come from the load generator's `*_stats.csv`;
//! server-side numbers come from a log-insights query over the gateway
//! access logs for the same window.

use std::collections::HashMap;
use std::fmt;
use std::fmt::Write as _;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{E2eError, E2eResult};

/// Log-insights query producing the fields read by
/// [`LatencyStats::from_insights_rows`].
pub const INSIGHTS_QUERY: &str = "stats avg(integrationLatency) as avgIntegrationLatency, \
max(integrationLatency) as maxIntegrationLatency, \
min(integrationLatency) as minIntegrationLatency, \
avg(responseLatency) as avgResponseLatency, \
max(responseLatency) as maxResponseLatency, \
min(responseLatency) as minResponseLatency, \
count_distinct(requestId) as recordCount";

/// Latency limits in milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SlaThresholds {
    pub avg_ms: f64,
    pub max_ms: f64,
}

impl Default for SlaThresholds {
    fn default() -> Self {
        Self {
            avg_ms: 200.0,
            max_ms: 600.0,
        }
    }
}

/// One SLA violation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SlaBreach {
    pub metric: &'static str,
    pub value: f64,
    pub threshold: f64,
}

impl fmt::Display for SlaBreach {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} was {:.2} (allowed: {:.0})",
            self.metric, self.value, self.threshold
        )
    }
}

/// Aggregated client-side statistics.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct LocustStats {
    pub avg_ms: f64,
    pub min_ms: f64,
    pub max_ms: f64,
    pub failures: u64,
}

impl LocustStats {
    /// Read the `Aggregated` row of a stats CSV.
    pub fn from_stats_csv(text: &str) -> E2eResult<Self> {
        let mut lines = text.lines().filter(|line| !line.trim().is_empty());
        let header = lines
            .next()
            .map(parse_csv_record)
            .ok_or_else(|| E2eError::stats("stats CSV is empty"))?;
        let column = |name: &str| {
            header
                .iter()
                .position(|h| h.as_str() == name)
                .ok_or_else(|| E2eError::stats(format!("stats CSV has no '{name}' column")))
        };
        let name_col = column("Name")?;
        let avg_col = column("Average Response Time")?;
        let min_col = column("Min Response Time")?;
        let max_col = column("Max Response Time")?;
        let failures_col = column("Failure Count")?;

        let row = lines
            .map(parse_csv_record)
            .find(|row| row.get(name_col).is_some_and(|name| name.as_str() == "Aggregated"))
            .ok_or_else(|| E2eError::stats("could not find 'Aggregated' row"))?;

        let field = |index: usize| {
            row.get(index)
                .map(String::as_str)
                .ok_or_else(|| E2eError::stats("Aggregated row is truncated"))
        };
        Ok(Self {
            avg_ms: parse_number(field(avg_col)?)?,
            min_ms: parse_number(field(min_col)?)?,
            max_ms: parse_number(field(max_col)?)?,
            failures: field(failures_col)?
                .parse()
                .map_err(|err| E2eError::stats(format!("bad Failure Count: {err}")))?,
        })
    }
}

/// One `{field, value}` cell of a log-insights result row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InsightsField {
    pub field: String,
    #[serde(default)]
    pub value: Option<String>,
}

/// Log-insights query result.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InsightsResult {
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub results: Vec<Vec<InsightsField>>,
}

/// Server-side latency statistics.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct LatencyStats {
    pub avg_integration: f64,
    pub min_integration: f64,
    pub max_integration: f64,
    pub avg_response: f64,
    pub min_response: f64,
    pub max_response: f64,
    pub record_count: u64,
}

impl LatencyStats {
    /// Read the first result row. Missing values count as zero.
    pub fn from_insights_rows(rows: &[Vec<InsightsField>]) -> E2eResult<Self> {
        let row = rows
            .first()
            .ok_or_else(|| E2eError::stats("log insights returned no rows"))?;
        let values: HashMap<&str, &str> = row
            .iter()
            .filter_map(|cell| cell.value.as_deref().map(|v| (cell.field.as_str(), v)))
            .collect();
        let get = |name: &str| -> E2eResult<f64> {
            values
                .get(name)
                .filter(|v| !v.is_empty())
                .map_or(Ok(0.0), |v| parse_number(v))
        };

        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let record_count = get("recordCount")?.max(0.0) as u64;
        Ok(Self {
            avg_integration: get("avgIntegrationLatency")?,
            min_integration: get("minIntegrationLatency")?,
            max_integration: get("maxIntegrationLatency")?,
            avg_response: get("avgResponseLatency")?,
            min_response: get("minResponseLatency")?,
            max_response: get("maxResponseLatency")?,
            record_count,
        })
    }

    /// Parse a raw query result document.
    pub fn from_insights_json(text: &str) -> E2eResult<Self> {
        let result: InsightsResult = serde_json::from_str(text)?;
        Self::from_insights_rows(&result.results).map_err(|err| match err {
            E2eError::Stats { message } => E2eError::Stats {
                message: format!(
                    "{message} (status {})",
                    result.status.as_deref().unwrap_or("unknown")
                ),
            },
            other => other,
        })
    }
}

/// Client-side breaches: any failures, or an average above the limit.
pub fn locust_breaches(stats: &LocustStats, sla: &SlaThresholds) -> Vec<SlaBreach> {
    let mut breaches = Vec::new();
    if stats.failures > 0 {
        #[allow(clippy::cast_precision_loss)]
        let value = stats.failures as f64;
        breaches.push(SlaBreach {
            metric: "failures",
            value,
            threshold: 0.0,
        });
    }
    if stats.avg_ms > sla.avg_ms {
        breaches.push(SlaBreach {
            metric: "average response time",
            value: stats.avg_ms,
            threshold: sla.avg_ms,
        });
    }
    for breach in &breaches {
        warn!(%breach, ?stats, "load test SLA breach");
    }
    breaches
}

/// Server-side breaches: averages or maxima at or above their limits, or
/// no log records at all.
pub fn latency_breaches(stats: &LatencyStats, sla: &SlaThresholds) -> Vec<SlaBreach> {
    let mut breaches = Vec::new();
    if stats.record_count == 0 {
        breaches.push(SlaBreach {
            metric: "log records",
            value: 0.0,
            threshold: 1.0,
        });
    }
    let checks = [
        ("average integration latency", stats.avg_integration, sla.avg_ms),
        ("average response latency", stats.avg_response, sla.avg_ms),
        ("max integration latency", stats.max_integration, sla.max_ms),
        ("max response latency", stats.max_response, sla.max_ms),
    ];
    for (metric, value, threshold) in checks {
        if value >= threshold {
            breaches.push(SlaBreach {
                metric,
                value,
                threshold,
            });
        }
    }
    for breach in &breaches {
        warn!(%breach, ?stats, "server latency SLA breach");
    }
    breaches
}

const REPORT_STYLE: &str = "
  body { font-family: system-ui, -apple-system, Segoe UI, Roboto, Arial, sans-serif; background: #f9fafb; padding: 40px; }
  .card { max-width: 900px; margin: auto; background: #ffffff; border: 1px solid #e5e7eb; border-radius: 12px; padding: 28px; }
  h2 { margin: 0 0 6px 0; font-size: 20px; }
  .section { margin-top: 28px; }
  table { width: 100%; border-collapse: collapse; margin-top: 12px; }
  th { text-align: left; background: #f3f4f6; font-weight: 600; font-size: 13px; padding: 10px; border-bottom: 1px solid #e5e7eb; }
  td { padding: 10px; border-bottom: 1px solid #f1f5f9; font-size: 14px; }
  .metric-value { font-weight: 600; }
  .subtle { color: #6b7280; font-size: 13px; }
";

/// Two-table HTML summary of a load test.
#[must_use]
pub fn render_html_report(locust: &LocustStats, latency: &LatencyStats) -> String {
    let client_rows = [
        ("Average Latency (ms)", format!("{:.2}", locust.avg_ms)),
        ("Minimum Latency (ms)", format!("{:.2}", locust.min_ms)),
        ("Maximum Latency (ms)", format!("{:.2}", locust.max_ms)),
        ("Failures", locust.failures.to_string()),
    ];
    let server_rows = [
        ("Average Integration Latency (ms)", format!("{:.2}", latency.avg_integration)),
        ("Min Integration Latency (ms)", format!("{:.2}", latency.min_integration)),
        ("Maximum Integration Latency (ms)", format!("{:.2}", latency.max_integration)),
        ("Average Response Latency (ms)", format!("{:.2}", latency.avg_response)),
        ("Min Response Latency (ms)", format!("{:.2}", latency.min_response)),
        ("Maximum Response Latency (ms)", format!("{:.2}", latency.max_response)),
        ("Log Records Analysed", latency.record_count.to_string()),
    ];

    let mut html = String::new();
    let _ = write!(
        html,
        "<!doctype html>\n<html lang=\"en\">\n<head>\n<meta charset=\"utf-8\"/>\n\
<meta name=\"viewport\" content=\"width=device-width, initial-scale=1\"/>\n\
<title>Performance Results</title>\n<style>{REPORT_STYLE}</style>\n</head>\n<body>\n\
<div class=\"card\">\n<h2>Performance Test Results</h2>\n\
<div class=\"subtle\">Load test execution and gateway log analysis</div>\n"
    );
    push_table(&mut html, "Load Test Statistics", &client_rows);
    push_table(&mut html, "Gateway Log Statistics", &server_rows);
    html.push_str("</div>\n</body>\n</html>\n");
    html
}

fn push_table(html: &mut String, title: &str, rows: &[(&str, String)]) {
    let _ = write!(
        html,
        "<div class=\"section\">\n  <h2>{title}</h2>\n  <table>\n    <tr><th>Metric</th><th>Value</th></tr>\n"
    );
    for (label, value) in rows {
        let _ = writeln!(
            html,
            "    <tr><td>{label}</td><td class=\"metric-value\">{value}</td></tr>"
        );
    }
    html.push_str("  </table>\n</div>\n");
}

fn parse_number(raw: &str) -> E2eResult<f64> {
    raw.trim()
        .parse()
        .map_err(|err| E2eError::stats(format!("'{raw}' is not a number: {err}")))
}

/// Split one CSV line, honouring double-quoted fields.
fn parse_csv_record(line: &str) -> Vec<String> {
    let mut fields = Vec::new();
    let mut field = String::new();
    let mut in_quotes = false;
    let mut chars = line.chars().peekable();

    while let Some(c) = chars.next() {
        match (c, in_quotes) {
            ('"', true) if chars.peek() == Some(&'"') => {
                field.push('"');
                chars.next();
            }
            ('"', _) => in_quotes = !in_quotes,
            (',', false) => fields.push(std::mem::take(&mut field)),
            _ => field.push(c),
        }
    }
    fields.push(field);
    fields
}
