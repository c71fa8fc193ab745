//! Mail sink implementations.
//!
//! The orchestrator delivers owner reports through the [`ReportSink`]
//! trait; this module ships Gmail API and SMTP implementations plus the
//! shared HTML renderer they both use.

mod gmail;
mod render;
mod smtp;
mod traits;

pub use gmail::{GmailCredentials, GmailSink};
pub use render::{render_report, RenderOptions, RenderedReport};
pub use smtp::SmtpSink;
pub use traits::{ReportSink, Result, SinkError};
