// src/concretize/conflict.rs

//! Structured conflict reporting for concretization failures
//!
//! When no assignment satisfies all constraints the solver reports the
//! minimal conflicting constraint set (usually a pair) with the requester
//! of each side, so the failure can be rendered without re-deriving
//! solver state.

use std::fmt;

/// What kind of assignment the conflict is about
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConflictKind {
    Version,
    Variant,
    Compiler,
    Arch,
    /// A declared `conflicts` rule holds in the final assignment
    ConflictRule,
    /// No provider of a virtual satisfies the requesters
    Provider,
}

impl fmt::Display for ConflictKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ConflictKind::Version => "version",
            ConflictKind::Variant => "variant",
            ConflictKind::Compiler => "compiler",
            ConflictKind::Arch => "architecture",
            ConflictKind::ConflictRule => "conflicts rule",
            ConflictKind::Provider => "provider",
        };
        write!(f, "{}", s)
    }
}

/// One side of a conflict: who asked, and for what
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConstraintSource {
    /// The requesting package, or "command line" for user input
    pub requester: String,
    /// Rendered constraint text, e.g. "lib@1.0:1.5"
    pub constraint: String,
}

impl ConstraintSource {
    pub fn new(requester: impl Into<String>, constraint: impl Into<String>) -> Self {
        Self {
            requester: requester.into(),
            constraint: constraint.into(),
        }
    }
}

impl fmt::Display for ConstraintSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (required by {})", self.constraint, self.requester)
    }
}

/// A concretization failure with its minimal conflicting constraint set
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConflictReport {
    /// The package the conflicting constraints apply to
    pub package: String,
    pub kind: ConflictKind,
    pub sources: Vec<ConstraintSource>,
    pub message: String,
}

impl ConflictReport {
    pub fn new(
        package: impl Into<String>,
        kind: ConflictKind,
        sources: Vec<ConstraintSource>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            package: package.into(),
            kind,
            sources,
            message: message.into(),
        }
    }
}

impl fmt::Display for ConflictReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} conflict on '{}': {}", self.kind, self.package, self.message)?;
        for source in &self.sources {
            write!(f, "\n    {}", source)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_report_rendering_names_both_sides() {
        let report = ConflictReport::new(
            "lib",
            ConflictKind::Version,
            vec![
                ConstraintSource::new("app", "lib@1.0:1.5"),
                ConstraintSource::new("other", "lib@1.6:2.0"),
            ],
            "version ranges are disjoint",
        );
        let rendered = report.to_string();
        assert!(rendered.contains("version conflict on 'lib'"));
        assert!(rendered.contains("lib@1.0:1.5 (required by app)"));
        assert!(rendered.contains("lib@1.6:2.0 (required by other)"));
    }
}
