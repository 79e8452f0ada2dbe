//! Findings from validating a study system.
//!
//! Validation never stops at the first problem: every issue in the registry
//! is recorded with a severity, the area of the data it concerns and, where
//! there is one, the offending asset, so a data set can be fixed in one pass.
//!
//! # Example
//!
//! ```
//! use sra_core::diagnostics::{Category, Diagnostics};
//!
//! let mut diag = Diagnostics::new();
//! diag.warning(Category::Topology, "Bus 4 is islanded");
//! diag.error_for(Category::Reliability, "MTTF must be positive", "Gen 2");
//!
//! assert_eq!(diag.warning_count(), 1);
//! assert_eq!(diag.error_count(), 1);
//! ```

use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Suspicious but simulable (e.g., islanded bus)
    Warning,
    /// The study cannot run with this data
    Error,
}

/// Part of the registry an issue concerns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    /// Missing buses or generation
    Structure,
    Topology,
    Capacity,
    /// MTTF/MTTR and derating models
    Reliability,
    Cost,
    Storage,
    /// Hourly load and renewable tables
    Series,
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Category::Structure => "structure",
            Category::Topology => "topology",
            Category::Capacity => "capacity",
            Category::Reliability => "reliability",
            Category::Cost => "cost",
            Category::Storage => "storage",
            Category::Series => "series",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct DiagnosticIssue {
    pub severity: Severity,
    pub category: Category,
    pub message: String,
    /// Offending asset (e.g., "Bus 14", "ESS 2")
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entity: Option<String>,
}

impl fmt::Display for DiagnosticIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let severity = match self.severity {
            Severity::Warning => "warning",
            Severity::Error => "error",
        };
        write!(f, "[{severity}:{}] {}", self.category, self.message)?;
        if let Some(entity) = &self.entity {
            write!(f, " ({entity})")?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct Diagnostics {
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub issues: Vec<DiagnosticIssue>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    fn push(
        &mut self,
        severity: Severity,
        category: Category,
        message: String,
        entity: Option<String>,
    ) {
        self.issues.push(DiagnosticIssue {
            severity,
            category,
            message,
            entity,
        });
    }

    pub fn warning(&mut self, category: Category, message: impl Into<String>) {
        self.push(Severity::Warning, category, message.into(), None);
    }

    pub fn warning_for(
        &mut self,
        category: Category,
        message: impl Into<String>,
        entity: impl ToString,
    ) {
        self.push(
            Severity::Warning,
            category,
            message.into(),
            Some(entity.to_string()),
        );
    }

    pub fn error(&mut self, category: Category, message: impl Into<String>) {
        self.push(Severity::Error, category, message.into(), None);
    }

    pub fn error_for(&mut self, category: Category, message: impl Into<String>, entity: impl ToString) {
        self.push(
            Severity::Error,
            category,
            message.into(),
            Some(entity.to_string()),
        );
    }

    pub fn warning_count(&self) -> usize {
        self.warnings().count()
    }

    pub fn error_count(&self) -> usize {
        self.errors().count()
    }

    pub fn has_errors(&self) -> bool {
        self.errors().next().is_some()
    }

    pub fn errors(&self) -> impl Iterator<Item = &DiagnosticIssue> {
        self.issues.iter().filter(|i| i.severity == Severity::Error)
    }

    pub fn warnings(&self) -> impl Iterator<Item = &DiagnosticIssue> {
        self.issues
            .iter()
            .filter(|i| i.severity == Severity::Warning)
    }

    pub fn in_category(&self, category: Category) -> impl Iterator<Item = &DiagnosticIssue> {
        self.issues.iter().filter(move |i| i.category == category)
    }

    /// `(warnings, errors)` per category, categories with no issues omitted.
    pub fn counts_by_category(&self) -> BTreeMap<Category, (usize, usize)> {
        let mut counts = BTreeMap::new();
        for issue in &self.issues {
            let entry = counts.entry(issue.category).or_insert((0, 0));
            match issue.severity {
                Severity::Warning => entry.0 += 1,
                Severity::Error => entry.1 += 1,
            }
        }
        counts
    }

    pub fn summary(&self) -> String {
        let plural = |n: usize| if n == 1 { "" } else { "s" };
        match (self.warning_count(), self.error_count()) {
            (0, 0) => "No issues".to_string(),
            (w, 0) => format!("{w} warning{}", plural(w)),
            (0, e) => format!("{e} error{}", plural(e)),
            (w, e) => format!("{w} warning{}, {e} error{}", plural(w), plural(e)),
        }
    }
}

impl fmt::Display for Diagnostics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Diagnostics: {}", self.summary())?;
        for issue in &self.issues {
            writeln!(f, "  {issue}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counts_and_summary() {
        let mut diag = Diagnostics::new();
        assert_eq!(diag.summary(), "No issues");

        diag.warning(Category::Topology, "islanded bus");
        assert_eq!(diag.summary(), "1 warning");

        diag.error(Category::Reliability, "negative MTTR");
        diag.error_for(Category::Storage, "SOC bounds inverted", "ESS 2");
        assert_eq!(diag.summary(), "1 warning, 2 errors");
        assert!(diag.has_errors());
        assert_eq!(diag.in_category(Category::Storage).count(), 1);

        let counts = diag.counts_by_category();
        assert_eq!(counts[&Category::Topology], (1, 0));
        assert_eq!(counts[&Category::Reliability], (0, 1));
        assert!(!counts.contains_key(&Category::Series));
    }

    #[test]
    fn test_issue_display_and_json() {
        let mut diag = Diagnostics::new();
        diag.error_for(Category::Topology, "Dangling endpoint", "Branch 1");
        let issue = &diag.issues[0];
        assert_eq!(issue.to_string(), "[error:topology] Dangling endpoint (Branch 1)");

        let json = serde_json::to_string(&diag).unwrap();
        assert!(json.contains("\"category\":\"topology\""));
        assert!(json.contains("\"entity\":\"Branch 1\""));
    }
}
