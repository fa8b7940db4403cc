//! Bar chart sink and page rendering
//!
//! `ChartSink` publishes each polling result as the latest `Snapshot` on a
//! watch channel; publishing never blocks the poller. HTTP handlers read the
//! current snapshot and render it as an HTML page with one bar per station,
//! or an error annotation when the last cycle failed. The page reloads itself
//! every poll interval.

use std::fmt::Write as _;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use delay_sink::{DelayRecord, FetchResult, Sink, SinkError};
use tokio::sync::watch;
use tracing::debug;

const PAGE_HEADER: &str = "台鐵列車延誤即時資訊";
const CHART_TITLE: &str = "列車延誤時間（分鐘）";
const X_LABEL: &str = "車站";
const Y_LABEL: &str = "延誤時間";

const BAR_WIDTH: u32 = 28;
const BAR_GAP: u32 = 12;
const PLOT_HEIGHT: u32 = 400;
const MARGIN: u32 = 50;
/// Room under the plot for rotated station labels
const LABEL_BAND: u32 = 90;

/// Latest polling result as seen by the chart page.
#[derive(Debug, Clone)]
pub struct Snapshot {
    /// 1-based count of results received
    pub cycle: u64,
    pub received_at: Instant,
    pub result: FetchResult,
}

/// Sink feeding the chart page.
pub struct ChartSink {
    tx: watch::Sender<Option<Snapshot>>,
    cycles: AtomicU64,
}

impl ChartSink {
    /// Create the sink and the receiver the HTTP handlers read from.
    pub fn new() -> (Self, watch::Receiver<Option<Snapshot>>) {
        let (tx, rx) = watch::channel(None);
        (
            Self {
                tx,
                cycles: AtomicU64::new(0),
            },
            rx,
        )
    }
}

impl Sink for ChartSink {
    fn id(&self) -> &str {
        "chart"
    }

    /// Replace the published snapshot.
    ///
    /// Fails once every receiver is gone: the chart server has stopped and
    /// nothing can display further results.
    fn render(&self, result: FetchResult) -> Result<(), SinkError> {
        if self.tx.is_closed() {
            return Err(SinkError::Fatal("chart page is no longer served".into()));
        }
        let cycle = self.cycles.fetch_add(1, Ordering::Relaxed) + 1;
        debug!(cycle, ok = result.is_ok(), "publishing chart snapshot");
        self.tx.send_replace(Some(Snapshot {
            cycle,
            received_at: Instant::now(),
            result,
        }));
        Ok(())
    }
}

/// Escape text for HTML element and attribute content.
fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            c => out.push(c),
        }
    }
    out
}

/// Render the whole chart page for the current snapshot.
pub fn render_page(snapshot: Option<&Snapshot>, refresh_secs: u64) -> String {
    let body = match snapshot.map(|s| &s.result) {
        None => annotation("等待第一次更新…"),
        Some(Ok(records)) if records.is_empty() => annotation("目前沒有延誤資料"),
        Some(Ok(records)) => bar_chart(records),
        Some(Err(e)) => annotation(&format!("無法更新資料: {e}")),
    };
    let footer = match snapshot {
        Some(s) => format!(
            "<p class=\"meta\">第 {} 次更新，{} 秒前</p>",
            s.cycle,
            s.received_at.elapsed().as_secs()
        ),
        None => String::new(),
    };

    format!(
        "<!DOCTYPE html>\n<html lang=\"zh-Hant\">\n<head>\n<meta charset=\"utf-8\">\n\
         <meta http-equiv=\"refresh\" content=\"{refresh_secs}\">\n<title>{PAGE_HEADER}</title>\n\
         <style>body{{font-family:sans-serif;margin:2em}}.bar{{fill:#636efa}}\
         .annotation{{font-size:20px;margin:4em 0;text-align:center}}.meta{{color:#666}}</style>\n\
         </head>\n<body>\n<h1 class=\"header\">{PAGE_HEADER}</h1>\n{body}\n{footer}\n</body>\n</html>\n"
    )
}

fn annotation(text: &str) -> String {
    format!("<p class=\"annotation\">{}</p>", escape_html(text))
}

/// SVG bar chart, one bar per record in feed order.
fn bar_chart(records: &[DelayRecord]) -> String {
    let max_delay = records
        .iter()
        .map(|r| r.delay_minutes)
        .max()
        .unwrap_or(0)
        .max(1);
    let slot = BAR_WIDTH + BAR_GAP;
    let width = MARGIN * 2 + slot * records.len() as u32;
    let height = MARGIN + PLOT_HEIGHT + LABEL_BAND + MARGIN;
    let baseline = MARGIN + PLOT_HEIGHT;

    let mut svg = String::new();
    let _ = write!(
        svg,
        "<svg xmlns=\"http://www.w3.org/2000/svg\" width=\"{width}\" height=\"{height}\" role=\"img\">\
         <text x=\"{}\" y=\"{}\" text-anchor=\"middle\" font-size=\"18\">{CHART_TITLE}</text>\
         <line x1=\"{MARGIN}\" y1=\"{baseline}\" x2=\"{}\" y2=\"{baseline}\" stroke=\"#444\"/>\
         <text x=\"14\" y=\"{}\" transform=\"rotate(-90 14 {})\" text-anchor=\"middle\">{Y_LABEL}</text>\
         <text x=\"{}\" y=\"{}\" text-anchor=\"middle\">{X_LABEL}</text>",
        width / 2,
        MARGIN / 2 + 6,
        width - MARGIN,
        MARGIN + PLOT_HEIGHT / 2,
        MARGIN + PLOT_HEIGHT / 2,
        width / 2,
        height - MARGIN / 2,
    );

    for (i, record) in records.iter().enumerate() {
        let delay = record.delay_minutes.max(0);
        // i128 keeps delay * PLOT_HEIGHT in range for any i64 delay
        let bar_height = (delay as i128 * PLOT_HEIGHT as i128 / max_delay as i128) as u32;
        let x = MARGIN + slot * i as u32 + BAR_GAP / 2;
        let y = baseline - bar_height;
        let label_x = x + BAR_WIDTH / 2;
        let label_y = baseline + 14;
        let name = escape_html(&record.station_name);
        let _ = write!(
            svg,
            "<g><title>{name}: {delay_minutes}</title>\
             <rect class=\"bar\" x=\"{x}\" y=\"{y}\" width=\"{BAR_WIDTH}\" height=\"{bar_height}\"/>\
             <text x=\"{label_x}\" y=\"{}\" text-anchor=\"middle\" font-size=\"12\">{delay_minutes}</text>\
             <text x=\"{label_x}\" y=\"{label_y}\" transform=\"rotate(-45 {label_x} {label_y})\" \
             text-anchor=\"end\" font-size=\"12\">{name}</text></g>",
            y.saturating_sub(4),
            delay_minutes = record.delay_minutes,
        );
    }

    svg.push_str("</svg>");
    svg
}
