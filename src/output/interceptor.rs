//! Stdout/stderr interception seam
//!
//! Capturing process output is platform work that lives outside the engine;
//! the runner only needs the start/stop discipline.

/// Captures process output between a start and a stop call
pub trait OutputInterceptor: Send + Sync {
    fn start_intercepting_output(&self);
    fn stop_intercepting_and_return_output(&self) -> String;
}

/// Interceptor that captures nothing
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopOutputInterceptor;

impl OutputInterceptor for NoopOutputInterceptor {
    fn start_intercepting_output(&self) {}

    fn stop_intercepting_and_return_output(&self) -> String {
        String::new()
    }
}
