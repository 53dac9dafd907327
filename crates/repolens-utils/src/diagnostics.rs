//! Run-scoped diagnostics ledger.
//!
//! Recoverable conditions do not abort a run; they are recorded here with a
//! stable code, written to `logs/run.log`, and rendered in the summary's
//! Diagnostics section. Codes are part of the output contract.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Stable diagnostic codes for recoverable conditions.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString,
)]
#[strum(serialize_all = "kebab-case")]
#[serde(rename_all = "kebab-case")]
pub enum DiagnosticCode {
    /// A file could not be read during the walk; an error record was kept.
    WalkUnreadable,
    /// Entity extraction failed to parse a file; events degraded to the
    /// module declaration only.
    ExtractDegraded,
    /// A supplied metrics document was malformed and was skipped.
    MetricsSkipped,
    /// An external renderer failed or was absent; the deterministic fallback
    /// renderer was used.
    RenderFallback,
    /// The cache carried an incompatible schema version and was reset,
    /// forcing a full rescan.
    CacheSchemaReset,
    /// A sibling run directory was pruned by retention.
    RetentionPruned,
}

/// One recoverable condition observed during a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub code: DiagnosticCode,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
}

/// Ordered collection of diagnostics for one run.
///
/// Owned by the orchestrator; stages return their diagnostics and the
/// orchestrator appends them, so ordering follows pipeline order and is
/// deterministic.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct DiagnosticLedger {
    entries: Vec<Diagnostic>,
}

impl DiagnosticLedger {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, code: DiagnosticCode, message: impl Into<String>) {
        self.entries.push(Diagnostic {
            code,
            message: message.into(),
            path: None,
        });
    }

    pub fn push_for_path(
        &mut self,
        code: DiagnosticCode,
        path: impl Into<String>,
        message: impl Into<String>,
    ) {
        self.entries.push(Diagnostic {
            code,
            message: message.into(),
            path: Some(path.into()),
        });
    }

    pub fn extend(&mut self, other: DiagnosticLedger) {
        self.entries.extend(other.entries);
    }

    #[must_use]
    pub fn entries(&self) -> &[Diagnostic] {
        &self.entries
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Count entries with the given code.
    #[must_use]
    pub fn count(&self, code: DiagnosticCode) -> usize {
        self.entries.iter().filter(|d| d.code == code).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_render_kebab_case() {
        assert_eq!(DiagnosticCode::WalkUnreadable.to_string(), "walk-unreadable");
        assert_eq!(DiagnosticCode::RenderFallback.to_string(), "render-fallback");
    }

    #[test]
    fn ledger_preserves_insertion_order() {
        let mut ledger = DiagnosticLedger::new();
        ledger.push_for_path(DiagnosticCode::WalkUnreadable, "src/a.py", "permission denied");
        ledger.push(DiagnosticCode::MetricsSkipped, "coverage.json: not an object");

        assert_eq!(ledger.len(), 2);
        assert_eq!(ledger.entries()[0].code, DiagnosticCode::WalkUnreadable);
        assert_eq!(ledger.entries()[0].path.as_deref(), Some("src/a.py"));
        assert_eq!(ledger.count(DiagnosticCode::MetricsSkipped), 1);
    }
}
