//! Output formatters for spec and suite reports
//!
//! Provides a one-line summary format and JSON.

use crate::models::{Report, SpecReport, SpecState};

/// Output format options
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OutputFormat {
    Summary,
    Json,
    JsonPretty,
}

impl OutputFormat {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "summary" => Some(OutputFormat::Summary),
            "json" => Some(OutputFormat::Json),
            "json-pretty" | "jsonpretty" => Some(OutputFormat::JsonPretty),
            _ => None,
        }
    }
}

/// Report formatter
pub struct ReportFormatter {
    format: OutputFormat,
    colorize: bool,
}

impl ReportFormatter {
    pub fn new(format: OutputFormat) -> Self {
        Self {
            format,
            colorize: true,
        }
    }

    pub fn no_color(mut self) -> Self {
        self.colorize = false;
        self
    }

    /// Format a single spec report
    pub fn format_spec_report(&self, report: &SpecReport) -> String {
        match self.format {
            OutputFormat::Summary => self.format_spec_summary(report),
            OutputFormat::Json => serde_json::to_string(report).unwrap_or_default(),
            OutputFormat::JsonPretty => serde_json::to_string_pretty(report).unwrap_or_default(),
        }
    }

    fn format_spec_summary(&self, report: &SpecReport) -> String {
        let state = if self.colorize {
            match report.state {
                SpecState::Passed => "\x1b[32m✓ PASSED\x1b[0m".to_string(),
                SpecState::Pending | SpecState::Skipped => {
                    format!("\x1b[33m{} {}\x1b[0m", report.state.symbol(), report.state)
                }
                state if state.is_failure() => {
                    format!("\x1b[31m{} {}\x1b[0m", state.symbol(), state)
                }
                state => format!("{} {}", state.symbol(), state),
            }
        } else {
            format!("{} {}", report.state.symbol(), report.state)
        };

        let text = report.full_text();
        let mut line = format!(
            "{} [{}] {} ({}) [{}ms]",
            state,
            report.leaf_node_type,
            if text.is_empty() { "TOP-LEVEL" } else { &text },
            report.leaf_node_location,
            report.run_time.as_millis()
        );
        if report.num_attempts > 1 {
            line.push_str(&format!(" after {} attempts", report.num_attempts));
        }
        if report.state.is_failure() {
            line.push_str(&format!(
                "\n    {} at {}",
                report.failure.message, report.failure.location
            ));
            if let Some(panic) = &report.failure.forwarded_panic {
                line.push_str(&format!("\n    panic: {panic}"));
            }
        }
        line
    }

    /// Format the whole suite
    pub fn format_report(&self, report: &Report) -> String {
        match self.format {
            OutputFormat::Summary => self.format_report_summary(report),
            OutputFormat::Json => serde_json::to_string(report).unwrap_or_default(),
            OutputFormat::JsonPretty => serde_json::to_string_pretty(report).unwrap_or_default(),
        }
    }

    fn format_report_summary(&self, report: &Report) -> String {
        let verdict = match (report.suite_succeeded, self.colorize) {
            (true, true) => "\x1b[32mSUCCESS\x1b[0m",
            (true, false) => "SUCCESS",
            (false, true) => "\x1b[31mFAIL\x1b[0m",
            (false, false) => "FAIL",
        };
        let mut output = format!(
            "{} - {}: ran {} of {} specs in {}ms",
            verdict,
            report.suite_description,
            report.pre_run_stats.specs_that_will_run,
            report.pre_run_stats.total_specs,
            report.run_time.as_millis()
        );
        for reason in &report.special_suite_failure_reasons {
            output.push_str(&format!("\n  {reason}"));
        }
        output
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{NodeType, PreRunStats};

    #[test]
    fn test_output_format_from_str() {
        assert_eq!(OutputFormat::from_str("json"), Some(OutputFormat::Json));
        assert_eq!(
            OutputFormat::from_str("JSON-PRETTY"),
            Some(OutputFormat::JsonPretty)
        );
        assert_eq!(OutputFormat::from_str("table"), None);
    }

    #[test]
    fn test_spec_summary_includes_failure() {
        let mut report = SpecReport {
            leaf_node_type: NodeType::It,
            leaf_node_text: "divides".into(),
            state: SpecState::Panicked,
            ..Default::default()
        };
        report.failure.message = "Test Panicked".into();
        report.failure.forwarded_panic = Some("attempt to divide by zero".into());

        let line = ReportFormatter::new(OutputFormat::Summary)
            .no_color()
            .format_spec_report(&report);
        assert!(line.starts_with("! PANICKED [It] divides"));
        assert!(line.contains("attempt to divide by zero"));
    }

    #[test]
    fn test_report_summary_and_json() {
        let report = Report {
            suite_description: "calculator".into(),
            suite_succeeded: false,
            special_suite_failure_reasons: vec!["interrupted".into()],
            pre_run_stats: PreRunStats {
                total_specs: 4,
                specs_that_will_run: 3,
            },
            ..Default::default()
        };

        let summary = ReportFormatter::new(OutputFormat::Summary)
            .no_color()
            .format_report(&report);
        assert!(summary.starts_with("FAIL - calculator: ran 3 of 4 specs"));
        assert!(summary.contains("interrupted"));

        let json = ReportFormatter::new(OutputFormat::Json).format_report(&report);
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["suite_description"], "calculator");
    }
}
