//! Reporter seam
//!
//! The orchestrator announces every hook and spec before and after it runs.

use tracing::{error, info, warn};

use super::{OutputFormat, ReportFormatter};
use crate::models::{Report, SpecReport};

/// Receives suite progress from the orchestrator
pub trait Reporter: Send {
    fn suite_will_begin(&mut self, report: &Report);
    fn will_run(&mut self, report: &SpecReport);
    fn did_run(&mut self, report: &SpecReport);
    fn suite_did_end(&mut self, report: &Report);
}

/// Reporter that logs through `tracing`
pub struct TracingReporter {
    formatter: ReportFormatter,
}

impl TracingReporter {
    pub fn new() -> Self {
        Self {
            formatter: ReportFormatter::new(OutputFormat::Summary).no_color(),
        }
    }
}

impl Default for TracingReporter {
    fn default() -> Self {
        Self::new()
    }
}

impl Reporter for TracingReporter {
    fn suite_will_begin(&mut self, report: &Report) {
        info!(
            "Running suite {} - {} of {} specs",
            report.suite_description,
            report.pre_run_stats.specs_that_will_run,
            report.pre_run_stats.total_specs
        );
    }

    fn will_run(&mut self, _report: &SpecReport) {}

    fn did_run(&mut self, report: &SpecReport) {
        let line = self.formatter.format_spec_report(report);
        if report.failed() {
            error!("{line}");
        } else {
            info!("{line}");
        }
    }

    fn suite_did_end(&mut self, report: &Report) {
        let line = self.formatter.format_report(report);
        if report.suite_succeeded {
            info!("{line}");
        } else {
            warn!("{line}");
        }
    }
}
