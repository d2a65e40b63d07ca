//! Live topic reporting.
//!
//! While a consumer runs, every topic added to the timeline is reported as
//! it happens, and a final line summarises the run. Reports go to
//! **stderr** so stdout remains parseable for scripts (the full timeline is
//! printed there at the end).

use std::io::Write;

use chrono::DateTime;

/// A single reportable event.
#[derive(Clone, Debug)]
pub enum TopicEvent {
    /// A cluster was added to the timeline with these topical terms.
    Reported {
        at: i64,
        node: usize,
        cluster: u64,
        size: usize,
        terms: Vec<String>,
    },
    /// The consumer stopped.
    Finished {
        consumed: u64,
        filtered: u64,
        skipped: u64,
        reason: String,
    },
}

/// Reports topic events. Implementations write to stderr (human or JSON).
pub trait TopicReporter: Send + Sync {
    fn report(&self, event: TopicEvent);
}

/// Human-friendly lines on stderr: "2022-12-18T15:23:00Z  node 0  cluster 12 (8 docs)  messi, goal".
pub struct StderrReporter;

impl TopicReporter for StderrReporter {
    fn report(&self, event: TopicEvent) {
        let line = match &event {
            TopicEvent::Reported {
                at,
                node,
                cluster,
                size,
                terms,
            } => format!(
                "{}  node {}  cluster {} ({} docs)  {}\n",
                format_ts_iso(*at),
                node,
                cluster,
                size,
                terms.join(", ")
            ),
            TopicEvent::Finished {
                consumed,
                filtered,
                skipped,
                reason,
            } => format!(
                "stopped ({})  consumed {}  filtered {}  skipped {}\n",
                reason,
                format_number(*consumed),
                format_number(*filtered),
                format_number(*skipped)
            ),
        };
        let _ = std::io::stderr().lock().write_all(line.as_bytes());
        let _ = std::io::stderr().lock().flush();
    }
}

/// Machine-readable events: one JSON object per line on stderr.
pub struct JsonReporter;

impl TopicReporter for JsonReporter {
    fn report(&self, event: TopicEvent) {
        let obj = match &event {
            TopicEvent::Reported {
                at,
                node,
                cluster,
                size,
                terms,
            } => serde_json::json!({
                "event": "topic",
                "at": at,
                "node": node,
                "cluster": cluster,
                "size": size,
                "terms": terms
            }),
            TopicEvent::Finished {
                consumed,
                filtered,
                skipped,
                reason,
            } => serde_json::json!({
                "event": "finished",
                "consumed": consumed,
                "filtered": filtered,
                "skipped": skipped,
                "reason": reason
            }),
        };
        if let Ok(line) = serde_json::to_string(&obj) {
            let _ = writeln!(std::io::stderr().lock(), "{}", line);
            let _ = std::io::stderr().lock().flush();
        }
    }
}

/// No-op reporter when reporting is disabled.
pub struct NoReport;

impl TopicReporter for NoReport {
    fn report(&self, _event: TopicEvent) {}
}

/// Format a timestamp as ISO 8601, falling back to the raw number.
pub fn format_ts_iso(ts: i64) -> String {
    DateTime::from_timestamp(ts, 0)
        .map(|dt| dt.format("%Y-%m-%dT%H:%M:%SZ").to_string())
        .unwrap_or_else(|| ts.to_string())
}

fn format_number(n: u64) -> String {
    let s = n.to_string();
    let mut result = String::with_capacity(s.len() + s.len() / 3);
    for (i, c) in s.chars().rev().enumerate() {
        if i > 0 && i % 3 == 0 {
            result.push(',');
        }
        result.push(c);
    }
    result.chars().rev().collect()
}

/// Report mode for the CLI: off, human (stderr), or JSON (stderr).
#[derive(Clone, Copy, Debug, Eq, PartialEq, clap::ValueEnum)]
pub enum ReportMode {
    Off,
    Human,
    Json,
}

impl ReportMode {
    /// Default: human reports when stderr is a TTY, otherwise off.
    pub fn default_for_tty() -> Self {
        if atty::is(atty::Stream::Stderr) {
            ReportMode::Human
        } else {
            ReportMode::Off
        }
    }

    pub fn reporter(&self) -> Box<dyn TopicReporter> {
        match self {
            ReportMode::Off => Box::new(NoReport),
            ReportMode::Human => Box::new(StderrReporter),
            ReportMode::Json => Box::new(JsonReporter),
        }
    }
}
