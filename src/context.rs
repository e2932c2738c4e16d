//! Per-node execution context
//!
//! Each node body runs on its own thread with a scope installed: the node's
//! [`Failer`], the current spec report slot and the diagnostic writer. The
//! free functions here are how a body reports failure, skips, aborts the
//! suite, reads its own report or attaches report entries. Outside a running
//! node there is no scope.

use chrono::Utc;
use parking_lot::Mutex;
use std::cell::RefCell;
use std::panic;
use std::sync::Arc;

use crate::errors::SuiteError;
use crate::failer::{Failer, FailureSignal};
use crate::models::{CodeLocation, ReportEntry, SpecReport};
use crate::output::Writer;

thread_local! {
    static SCOPE: RefCell<Option<NodeScope>> = const { RefCell::new(None) };
}

/// One invocation's view of the current spec report. Each node body gets a
/// fresh slot, so an abandoned body can only write into its own.
#[derive(Clone)]
pub(crate) struct SpecContext {
    report: Arc<Mutex<SpecReport>>,
    writer: Arc<dyn Writer>,
}

impl SpecContext {
    pub(crate) fn new(writer: Arc<dyn Writer>) -> Self {
        Self {
            report: Arc::new(Mutex::new(SpecReport::default())),
            writer,
        }
    }

    /// Replace the slot with the orchestrator's view of the report
    pub(crate) fn publish(&self, report: &SpecReport) {
        *self.report.lock() = report.clone();
    }

    /// Report entries added by bodies since the last publish
    pub(crate) fn report_entries(&self) -> Vec<ReportEntry> {
        self.report.lock().report_entries.clone()
    }

    fn snapshot(&self) -> SpecReport {
        let mut report = self.report.lock().clone();
        report.captured_writer_output =
            String::from_utf8_lossy(&self.writer.bytes()).into_owned();
        report
    }
}

#[derive(Clone)]
struct NodeScope {
    failer: Arc<Failer>,
    spec: SpecContext,
}

/// Removes the scope when the node body is done
pub(crate) struct ScopeGuard {
    _private: (),
}

impl Drop for ScopeGuard {
    fn drop(&mut self) {
        SCOPE.with(|scope| scope.borrow_mut().take());
    }
}

/// Install the scope for the current thread
pub(crate) fn enter(failer: Arc<Failer>, spec: SpecContext) -> ScopeGuard {
    SCOPE.with(|scope| *scope.borrow_mut() = Some(NodeScope { failer, spec }));
    ScopeGuard { _private: () }
}

fn scope() -> Option<NodeScope> {
    SCOPE.with(|scope| scope.borrow().clone())
}

fn record_and_unwind(
    message: String,
    location: CodeLocation,
    record: fn(&Failer, String, CodeLocation),
) -> ! {
    match scope() {
        Some(scope) => {
            record(&scope.failer, message, location);
            panic::resume_unwind(Box::new(FailureSignal))
        }
        None => panic!("{message} (reported outside of a running node at {location})"),
    }
}

/// Fail the running node and stop its body
#[track_caller]
pub fn fail(message: impl Into<String>) -> ! {
    fail_at(message, CodeLocation::caller())
}

/// Fail the running node, attributing the failure to `location`
pub fn fail_at(message: impl Into<String>, location: CodeLocation) -> ! {
    record_and_unwind(message.into(), location, |f, m, l| f.fail(m, l))
}

/// Mark the running spec as skipped and stop its body
#[track_caller]
pub fn skip(message: impl Into<String>) -> ! {
    record_and_unwind(message.into(), CodeLocation::caller(), |f, m, l| f.skip(m, l))
}

/// Abort the whole suite: the running spec ends Aborted and later specs are skipped
#[track_caller]
pub fn abort_suite(message: impl Into<String>) -> ! {
    record_and_unwind(message.into(), CodeLocation::caller(), |f, m, l| {
        f.abort_suite(m, l)
    })
}

/// The failer of the running node, for handing to helper threads
pub fn current_failer() -> Option<Arc<Failer>> {
    scope().map(|s| s.failer)
}

/// Snapshot of the running spec's report, including writer output so far
pub fn current_spec_report() -> Option<SpecReport> {
    scope().map(|s| s.spec.snapshot())
}

/// The diagnostic writer of the running node
pub fn spec_writer() -> Option<Arc<dyn Writer>> {
    scope().map(|s| s.spec.writer.clone())
}

/// Attach a named value to the running spec's report
#[track_caller]
pub fn add_report_entry(
    name: impl Into<String>,
    value: serde_json::Value,
) -> Result<(), SuiteError> {
    let location = CodeLocation::caller();
    let Some(scope) = scope() else {
        return Err(SuiteError::ReportEntryOutsideRunPhase { location });
    };
    scope.spec.report.lock().report_entries.push(ReportEntry {
        name: name.into(),
        location,
        time: Utc::now(),
        value,
    });
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::SpecState;
    use crate::output::BufferWriter;

    fn spec_context() -> SpecContext {
        SpecContext::new(Arc::new(BufferWriter::new()))
    }

    #[test]
    fn test_no_scope_outside_nodes() {
        assert!(current_spec_report().is_none());
        assert!(current_failer().is_none());
        let err = add_report_entry("k", serde_json::json!(1)).unwrap_err();
        assert!(matches!(err, SuiteError::ReportEntryOutsideRunPhase { .. }));
    }

    #[test]
    fn test_fail_records_and_unwinds_without_panic_payload() {
        let failer = Arc::new(Failer::new());
        let ctx = spec_context();
        let result = std::thread::spawn({
            let failer = failer.clone();
            move || {
                let _guard = enter(failer, ctx);
                panic::catch_unwind(|| fail("expected 4, got 5"))
            }
        })
        .join()
        .unwrap();

        let payload = result.unwrap_err();
        assert!(payload.is::<FailureSignal>());
        let (state, failure) = failer.drain();
        assert_eq!(state, SpecState::Failed);
        assert_eq!(failure.message, "expected 4, got 5");
        assert!(failure.location.file_name.ends_with("context.rs"));
    }

    #[test]
    fn test_report_entries_and_snapshot() {
        let writer = Arc::new(BufferWriter::new());
        let ctx = SpecContext::new(writer.clone());
        ctx.publish(&SpecReport {
            leaf_node_text: "adds".into(),
            ..Default::default()
        });

        let thread_ctx = ctx.clone();
        std::thread::spawn(move || {
            let _guard = enter(Arc::new(Failer::new()), thread_ctx);
            spec_writer().unwrap().write_str("progress");
            add_report_entry("answer", serde_json::json!(42)).unwrap();
            let report = current_spec_report().unwrap();
            assert_eq!(report.leaf_node_text, "adds");
            assert_eq!(report.captured_writer_output, "progress");
        })
        .join()
        .unwrap();

        let entries = ctx.report_entries();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].name, "answer");
        assert_eq!(entries[0].value, serde_json::json!(42));
    }

    #[test]
    fn test_guard_clears_scope() {
        {
            let _guard = enter(Arc::new(Failer::new()), spec_context());
            assert!(current_failer().is_some());
        }
        assert!(current_failer().is_none());
    }
}
