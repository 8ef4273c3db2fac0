pub mod error;

pub use error::{ApiError, ErrorCategory, ErrorClassifier, ReportError, Result, ResultExt};
