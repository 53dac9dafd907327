pub mod atomic_write;
pub mod canonical;
pub mod diagnostics;
pub mod digest;
pub mod error;
pub mod exit_codes;
pub mod logging;
pub mod pool;

pub use diagnostics::{Diagnostic, DiagnosticCode, DiagnosticLedger};
pub use error::{ConfigError, InputError, InvariantError, RepolensError};
pub use exit_codes::ExitCode;
