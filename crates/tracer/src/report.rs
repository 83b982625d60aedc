//! Aggregated timing reports.
//!
//! A [`Snapshot`] is the machine-readable view: qualified name to total
//! duration, in registration order. Rendering it produces the status table:
//!
//! ```text
//! ┌─────────────────────────────────┐
//! │          Trace Status           │
//! ├──────────┬──────────────────────┤
//! │ Function │ Total Execution Time │
//! ├──────────┼──────────────────────┤
//! │ fib      →       0.3001s        │
//! └──────────┴──────────────────────┘
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

use crate::error::TracerResult;
use crate::identity::FunctionId;
use crate::record::TimingRecord;

// =============================================================================
// Report Style
// =============================================================================

/// Layout options for the rendered table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ReportStyle {
    /// Title box above the table
    pub title: Option<String>,
    /// Column headers: function column, duration column
    pub headers: Option<(String, String)>,
    /// Message shown when nothing is registered
    pub none_text: String,
    /// Fractional digits of the seconds column
    pub precision: usize,
}

impl Default for ReportStyle {
    fn default() -> Self {
        Self {
            title: Some("Trace Status".to_string()),
            headers: Some(("Function".to_string(), "Total Execution Time".to_string())),
            none_text: "No functions traced".to_string(),
            precision: 4,
        }
    }
}

// =============================================================================
// Snapshot
// =============================================================================

/// Accumulated time of one function.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotEntry {
    /// Qualified name
    pub name: String,
    /// Sum of all recorded runs
    #[serde(with = "duration_serde")]
    pub total: Duration,
    /// Number of recorded runs
    pub runs: usize,
}

/// Totals per qualified name, in registration order.
///
/// Distinct functions sharing a qualified name are merged into the first
/// entry with that name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    entries: Vec<SnapshotEntry>,
}

impl Snapshot {
    pub(crate) fn from_records<'a>(records: impl Iterator<Item = (FunctionId, &'a TimingRecord)>) -> Self {
        let mut entries: Vec<SnapshotEntry> = Vec::new();

        for (id, record) in records {
            let total = record.total();
            let runs = record.runs().len();

            match entries.iter_mut().find(|entry| entry.name == id.name()) {
                Some(entry) => {
                    entry.total += total;
                    entry.runs += runs;
                }
                None => entries.push(SnapshotEntry {
                    name: id.name().to_string(),
                    total,
                    runs,
                }),
            }
        }

        Self { entries }
    }

    /// Total time recorded for `name`.
    pub fn get(&self, name: &str) -> Option<Duration> {
        self.entry(name).map(|entry| entry.total)
    }

    /// Number of runs recorded for `name`.
    pub fn runs(&self, name: &str) -> Option<usize> {
        self.entry(name).map(|entry| entry.runs)
    }

    pub fn entry(&self, name: &str) -> Option<&SnapshotEntry> {
        self.entries.iter().find(|entry| entry.name == name)
    }

    pub fn entries(&self) -> &[SnapshotEntry] {
        &self.entries
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, Duration)> + '_ {
        self.entries
            .iter()
            .map(|entry| (entry.name.as_str(), entry.total))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Sum over all entries.
    pub fn total(&self) -> Duration {
        self.entries.iter().map(|entry| entry.total).sum()
    }

    /// Entries ordered by descending total; ties keep registration order.
    pub fn sorted_by_total(&self) -> Vec<SnapshotEntry> {
        let mut sorted = self.entries.clone();
        sorted.sort_by(|a, b| b.total.cmp(&a.total));
        sorted
    }

    /// Export to JSON, durations in nanoseconds.
    pub fn to_json(&self) -> TracerResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Render the status table.
    pub fn render(&self, style: &ReportStyle) -> String {
        let rule = |width: usize| "─".repeat(width);
        let text_width = |text: &str| text.chars().count();

        let mut widths = [0usize; 2];
        if let Some((name_header, total_header)) = &style.headers {
            widths[0] = text_width(name_header);
            widths[1] = text_width(total_header);
        }
        widths[0] = widths[0].max(
            self.entries
                .iter()
                .map(|entry| text_width(&entry.name))
                .max()
                .unwrap_or(0),
        );
        widths[1] = widths[1].max(style.precision + 3);

        // borders, padding and the separator between the two columns
        let mut total_width = widths[0] + widths[1] + 7;

        if let Some(title) = &style.title {
            let needed = text_width(title) + 4;
            if total_width < needed {
                widths[0] += needed - total_width;
                total_width = needed;
            }
        }

        let mut lines = Vec::new();

        if self.entries.is_empty() {
            let title_width = style.title.as_deref().map_or(0, text_width);
            total_width = (text_width(&style.none_text) + 4).max(title_width + 4);
        }

        if let Some(title) = &style.title {
            lines.push(format!("┌{}┐", rule(total_width - 2)));
            lines.push(format!("│ {:^width$} │", title, width = total_width - 4));
        }

        if self.entries.is_empty() {
            let corner = if style.title.is_some() { ('├', '┤') } else { ('┌', '┐') };
            lines.push(format!("{}{}{}", corner.0, rule(total_width - 2), corner.1));
            lines.push(format!("│ {:^width$} │", style.none_text, width = total_width - 4));
            lines.push(format!("└{}┘", rule(total_width - 2)));
            return lines.join("\n");
        }

        let corner = if style.title.is_some() { ('├', '┤') } else { ('┌', '┐') };
        lines.push(format!(
            "{}{}┬{}{}",
            corner.0,
            rule(widths[0] + 2),
            rule(widths[1] + 2),
            corner.1
        ));

        if let Some((name_header, total_header)) = &style.headers {
            lines.push(format!(
                "│ {:^w0$} │ {:^w1$} │",
                name_header,
                total_header,
                w0 = widths[0],
                w1 = widths[1]
            ));
            lines.push(format!("├{}┼{}┤", rule(widths[0] + 2), rule(widths[1] + 2)));
        }

        for entry in &self.entries {
            let seconds = format!(
                "{:.precision$}s",
                entry.total.as_secs_f64(),
                precision = style.precision
            );
            lines.push(format!(
                "│ {:<w0$} → {:^w1$} │",
                entry.name,
                seconds,
                w0 = widths[0],
                w1 = widths[1]
            ));
        }

        lines.push(format!("└{}┴{}┘", rule(widths[0] + 2), rule(widths[1] + 2)));
        lines.join("\n")
    }
}

impl fmt::Display for Snapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render(&ReportStyle::default()))
    }
}

// =============================================================================
// Serde helpers for Duration
// =============================================================================

mod duration_serde {
    use serde::ser::Error as _;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let nanos = u64::try_from(duration.as_nanos())
            .map_err(|_| S::Error::custom(format!("duration {:?} does not fit in u64 nanoseconds", duration)))?;
        nanos.serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let nanos = u64::deserialize(deserializer)?;
        Ok(Duration::from_nanos(nanos))
    }
}

// =============================================================================
// Tests
// =============================================================================
