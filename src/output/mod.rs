//! Output module
//!
//! Diagnostic writer, output interception, reporters and report formatting.

mod formatter;
mod interceptor;
mod reporter;
mod writer;

pub use formatter::{OutputFormat, ReportFormatter};
pub use interceptor::{NoopOutputInterceptor, OutputInterceptor};
pub use reporter::{Reporter, TracingReporter};
pub use writer::{BufferWriter, Writer};
