//! Tracer configuration.

use serde::{Deserialize, Serialize};

use crate::error::{TracerError, TracerResult};
use crate::report::ReportStyle;

/// Largest supported number of fractional digits; durations resolve to
/// nanoseconds.
pub const MAX_PRECISION: usize = 9;

/// Configuration for a [`Tracer`](crate::Tracer).
///
/// Every field has a default, so a partial JSON document is enough:
///
/// ```rust
/// use tracer::TracerConfig;
///
/// let config = TracerConfig::from_json(r#"{ "log": true, "report": { "precision": 2 } }"#).unwrap();
/// assert!(config.log);
/// assert_eq!(config.report.precision, 2);
/// assert_eq!(config.report.title.as_deref(), Some("Trace Status"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct TracerConfig {
    /// Emit operational messages (enable, disable, hook changes) at info level
    pub log: bool,
    /// Layout of the rendered status table
    pub report: ReportStyle,
}

impl TracerConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse and validate a JSON configuration.
    pub fn from_json(json: &str) -> TracerResult<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Serialize to pretty-printed JSON.
    pub fn to_json(&self) -> TracerResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Check values serde cannot reject on its own.
    pub fn validate(&self) -> TracerResult<()> {
        if self.report.precision > MAX_PRECISION {
            return Err(TracerError::InvalidConfig(format!(
                "precision {} exceeds the maximum of {}",
                self.report.precision, MAX_PRECISION
            )));
        }
        Ok(())
    }

    /// Enable or disable operational log messages.
    pub fn with_log(mut self, log: bool) -> Self {
        self.log = log;
        self
    }

    /// Set the table title; `None` removes the title box.
    pub fn with_title(mut self, title: Option<&str>) -> Self {
        self.report.title = title.map(str::to_string);
        self
    }

    /// Set the column headers; `None` removes the header row.
    pub fn with_headers(mut self, headers: Option<(&str, &str)>) -> Self {
        self.report.headers = headers.map(|(name, total)| (name.to_string(), total.to_string()));
        self
    }

    /// Set the message shown when nothing is registered.
    pub fn with_none_text(mut self, text: &str) -> Self {
        self.report.none_text = text.to_string();
        self
    }

    /// Set the number of fractional digits for durations, capped at
    /// [`MAX_PRECISION`].
    pub fn with_precision(mut self, precision: usize) -> Self {
        self.report.precision = precision.min(MAX_PRECISION);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = TracerConfig::default();
        assert!(!config.log);
        assert_eq!(config.report.title.as_deref(), Some("Trace Status"));
        assert_eq!(
            config.report.headers,
            Some(("Function".to_string(), "Total Execution Time".to_string()))
        );
        assert_eq!(config.report.none_text, "No functions traced");
        assert_eq!(config.report.precision, 4);
    }

    #[test]
    fn test_builder() {
        let config = TracerConfig::new()
            .with_log(true)
            .with_title(None)
            .with_headers(Some(("Fn", "Time")))
            .with_none_text("nothing yet")
            .with_precision(20);

        assert!(config.log);
        assert!(config.report.title.is_none());
        assert_eq!(
            config.report.headers,
            Some(("Fn".to_string(), "Time".to_string()))
        );
        assert_eq!(config.report.none_text, "nothing yet");
        assert_eq!(config.report.precision, MAX_PRECISION);
    }

    #[test]
    fn test_from_json_partial() {
        let config = TracerConfig::from_json(r#"{"report": {"title": null, "noneText": "empty"}}"#).unwrap();
        assert!(!config.log);
        assert!(config.report.title.is_none());
        assert_eq!(config.report.none_text, "empty");
        assert_eq!(config.report.precision, 4);
    }

    #[test]
    fn test_from_json_rejects_large_precision() {
        let err = TracerConfig::from_json(r#"{"report": {"precision": 12}}"#).unwrap_err();
        assert!(matches!(err, TracerError::InvalidConfig(_)));
    }

    #[test]
    fn test_from_json_malformed() {
        let err = TracerConfig::from_json("{ log: yes").unwrap_err();
        assert!(matches!(err, TracerError::Config(_)));
    }

    #[test]
    fn test_json_roundtrip_keeps_custom_values() {
        let config = TracerConfig::new().with_log(true).with_headers(None);
        let json = config.to_json().unwrap();
        assert!(json.contains("\"noneText\""));
        assert_eq!(TracerConfig::from_json(&json).unwrap(), config);
    }
}
