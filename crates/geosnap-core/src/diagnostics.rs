//! Diagnostics collected while validating observation and network layers.
//!
//! Validation never aborts: it records issues so that the caller can decide
//! whether a layer is usable. Each issue names the [`Subject`] it concerns,
//! either a whole layer or a single point or road.
//!
//! # Example
//!
//! ```
//! use geosnap_core::diagnostics::{Category, Diagnostics, Subject};
//! use geosnap_core::{EdgeKey, NodeId};
//!
//! let road = EdgeKey::new(NodeId::new(1), NodeId::new(2), 0);
//! let mut diag = Diagnostics::new();
//! diag.warning(Category::Reference, Subject::Network, "no reference system");
//! diag.error(Category::Geometry, Subject::Road(road), "fewer than two vertices");
//!
//! assert_eq!(diag.summary(), "1 warning, 1 error");
//! ```

use std::fmt;

use serde::Serialize;

use crate::{EdgeKey, PointId};

/// Severity level for diagnostic issues
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Unusual but usable (e.g., zero-length road)
    Warning,
    /// Element cannot take part in snapping (e.g., non-finite coordinate)
    Error,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    /// Missing or inconsistent CRS tags
    Reference,
    /// Ids and layer contents
    Structure,
    /// Coordinates and polylines
    Geometry,
}

/// What an issue is about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Subject {
    Observations,
    Network,
    Point(PointId),
    Road(EdgeKey),
}

impl fmt::Display for Subject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Subject::Observations => f.write_str("observations"),
            Subject::Network => f.write_str("network"),
            Subject::Point(id) => write!(f, "point {id}"),
            Subject::Road(key) => write!(f, "road {key}"),
        }
    }
}

/// A single diagnostic issue
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DiagnosticIssue {
    pub severity: Severity,
    pub category: Category,
    pub subject: Subject,
    pub message: String,
}

impl fmt::Display for DiagnosticIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let severity = match self.severity {
            Severity::Warning => "warning",
            Severity::Error => "error",
        };
        write!(f, "[{severity}] {}: {}", self.subject, self.message)
    }
}

/// Issues from one or more validation passes
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
        subject: Subject,
        message: impl Into<String>,
    ) {
        self.issues.push(DiagnosticIssue {
            severity,
            category,
            subject,
            message: message.into(),
        });
    }

    pub fn warning(&mut self, category: Category, subject: Subject, message: impl Into<String>) {
        self.push(Severity::Warning, category, subject, message);
    }

    pub fn error(&mut self, category: Category, subject: Subject, message: impl Into<String>) {
        self.push(Severity::Error, category, subject, message);
    }

    pub fn warnings(&self) -> impl Iterator<Item = &DiagnosticIssue> {
        self.issues
            .iter()
            .filter(|i| i.severity == Severity::Warning)
    }

    pub fn errors(&self) -> impl Iterator<Item = &DiagnosticIssue> {
        self.issues.iter().filter(|i| i.severity == Severity::Error)
    }

    pub fn warning_count(&self) -> usize {
        self.warnings().count()
    }

    pub fn error_count(&self) -> usize {
        self.errors().count()
    }

    pub fn is_clean(&self) -> bool {
        self.issues.is_empty()
    }

    pub fn has_errors(&self) -> bool {
        self.errors().next().is_some()
    }

    pub fn merge(&mut self, other: Diagnostics) {
        self.issues.extend(other.issues);
    }

    pub fn summary(&self) -> String {
        let plural = |n: usize| if n == 1 { "" } else { "s" };
        match (self.warning_count(), self.error_count()) {
            (0, 0) => "no issues".to_string(),
            (w, 0) => format!("{w} warning{}", plural(w)),
            (0, e) => format!("{e} error{}", plural(e)),
            (w, e) => format!("{w} warning{}, {e} error{}", plural(w), plural(e)),
        }
    }
}

impl fmt::Display for Diagnostics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", self.summary())?;
        for issue in &self.issues {
            writeln!(f, "  {issue}")?;
        }
        Ok(())
    }
}
