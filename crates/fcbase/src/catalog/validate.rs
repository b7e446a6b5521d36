//! Record validation run at the loading boundary.
//!
//! The revision merge engine trusts its input; everything it assumes about
//! revisions is checked here instead.

use std::collections::HashSet;
use std::fmt;

use chrono::NaiveDate;
use regex::Regex;

use super::spec::{Controller, HardwareRevision, Transmitter};
use crate::error::Error;

/// Pattern every record and revision id must match.
const SLUG_PATTERN: &str = r"^[a-z0-9]+(?:-[a-z0-9]+)*$";

/// How serious a validation finding is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    /// Suspicious but usable data.
    Warning,
    /// Data that must be fixed.
    Error,
}

/// A single validation finding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Issue {
    /// Severity of the finding.
    pub severity: Severity,
    /// Record id.
    pub record: String,
    /// Dotted path of the offending field.
    pub field: String,
    /// What is wrong.
    pub message: String,
}

impl Issue {
    fn error(record: &str, field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Error,
            record: record.to_string(),
            field: field.into(),
            message: message.into(),
        }
    }

    fn warning(record: &str, field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Warning,
            ..Self::error(record, field, message)
        }
    }

    /// Whether this finding should fail validation.
    #[must_use]
    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }

    /// Convert into the crate error type.
    #[must_use]
    pub fn into_error(self) -> Error {
        Error::invalid_record(self.record, self.field, self.message)
    }
}

impl fmt::Display for Issue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let level = match self.severity {
            Severity::Warning => "warning",
            Severity::Error => "error",
        };
        write!(f, "{level}: {}: {}", self.field, self.message)
    }
}

/// Validates catalog records.
#[derive(Debug)]
pub struct Validator {
    slug: Regex,
}

impl Default for Validator {
    fn default() -> Self {
        Self::new()
    }
}

impl Validator {
    /// Create a validator.
    ///
    /// # Panics
    ///
    /// Panics if the built-in slug pattern fails to compile.
    #[must_use]
    pub fn new() -> Self {
        Self {
            slug: Regex::new(SLUG_PATTERN).expect("Invalid slug pattern"),
        }
    }

    /// Check whether `value` is a lowercase slug.
    #[must_use]
    pub fn is_slug(&self, value: &str) -> bool {
        self.slug.is_match(value)
    }

    /// Validate a controller record.
    #[must_use]
    pub fn controller(&self, controller: &Controller) -> Vec<Issue> {
        let id = controller.id.as_str();
        let mut issues = Vec::new();

        self.check_identity(id, &controller.title, &mut issues);

        let power = &controller.power;
        let has_inputs = power.inputs.as_ref().is_some_and(|inputs| !inputs.is_empty());
        if power.voltage_in.is_none() && !has_inputs {
            issues.push(Issue::error(
                id,
                "power",
                "must define voltage_in or at least one input",
            ));
        }

        if let Some(revisions) = &controller.hardware.revisions {
            self.check_revisions(id, "hardware.revisions", revisions, &mut issues);
        }

        issues
    }

    /// Validate a transmitter record.
    #[must_use]
    pub fn transmitter(&self, transmitter: &Transmitter) -> Vec<Issue> {
        let id = transmitter.id.as_str();
        let mut issues = Vec::new();

        self.check_identity(id, &transmitter.title, &mut issues);

        if let Some(revisions) = transmitter
            .hardware
            .as_ref()
            .and_then(|h| h.revisions.as_ref())
        {
            self.check_revisions(id, "hardware.revisions", revisions, &mut issues);
        }

        issues
    }

    fn check_identity(&self, id: &str, title: &str, issues: &mut Vec<Issue>) {
        if !self.is_slug(id) {
            issues.push(Issue::error(id, "id", "must be a lowercase slug"));
        }
        if title.trim().is_empty() {
            issues.push(Issue::error(id, "title", "must not be empty"));
        }
    }

    fn check_revisions(
        &self,
        id: &str,
        path: &str,
        revisions: &[HardwareRevision],
        issues: &mut Vec<Issue>,
    ) {
        let mut seen = HashSet::new();

        for (index, revision) in revisions.iter().enumerate() {
            let at = format!("{path}[{index}]");

            if !self.is_slug(&revision.id) {
                issues.push(Issue::error(id, format!("{at}.id"), "must be a lowercase slug"));
            }
            if !seen.insert(revision.id.as_str()) {
                issues.push(Issue::warning(
                    id,
                    format!("{at}.id"),
                    format!("duplicate revision id '{}'", revision.id),
                ));
            }
            if revision.name.trim().is_empty() {
                issues.push(Issue::error(id, format!("{at}.name"), "must not be empty"));
            }

            if let Some(released) = &revision.released {
                if NaiveDate::parse_from_str(released, "%Y-%m-%d").is_err() {
                    issues.push(Issue::error(
                        id,
                        format!("{at}.released"),
                        format!("'{released}' is not a YYYY-MM-DD date"),
                    ));
                }
            }

            let has_changes = revision.changes.as_ref().is_some_and(|c| !c.is_empty());
            if revision.released.is_none() && revision.notes.is_none() && !has_changes {
                issues.push(Issue::error(
                    id,
                    at.clone(),
                    "must provide a release date, notes, or changes",
                ));
            }

            if revision.overrides.as_ref().is_some_and(|o| o.is_empty()) {
                issues.push(Issue::error(
                    id,
                    format!("{at}.overrides"),
                    "must include at least one section",
                ));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::spec::{
        Hardware, Io, IoOverride, Mounting, Openness, Power, PowerInput, RevisionOverrides,
        Sensors,
    };

    fn controller() -> Controller {
        Controller {
            id: "matek-h743-slim".to_string(),
            title: "Matek H743-SLIM".to_string(),
            brand: "matek".to_string(),
            mcu: "stm32h743".to_string(),
            mcu_family: None,
            model: None,
            mounting: Mounting::Stack30,
            dimensions: None,
            power: Power {
                voltage_in: Some("2-8S".to_string()),
                ..Power::default()
            },
            io: Io::default(),
            peripheral_ports: None,
            hardware: Hardware {
                openness: Openness::Closed,
                notes: None,
                lifecycle: None,
                revisions: None,
            },
            sensors: Sensors::default(),
            features: Vec::new(),
            firmware_support: Vec::new(),
            lifecycle: None,
            keywords: Vec::new(),
            seo: None,
            notes: None,
            sources: Vec::new(),
            verification: None,
        }
    }

    fn revision(id: &str) -> HardwareRevision {
        HardwareRevision {
            id: id.to_string(),
            name: "V2".to_string(),
            released: Some("2023-04-01".to_string()),
            notes: None,
            changes: None,
            sources: None,
            overrides: Some(RevisionOverrides {
                io: Some(IoOverride {
                    uarts: Some(8),
                    ..IoOverride::default()
                }),
                ..RevisionOverrides::default()
            }),
        }
    }

    #[test]
    fn test_valid_controller_has_no_issues() {
        let mut c = controller();
        c.hardware.revisions = Some(vec![revision("v2")]);

        assert!(Validator::new().controller(&c).is_empty());
    }

    #[test]
    fn test_slug() {
        let v = Validator::new();
        assert!(v.is_slug("matek-h743-slim"));
        assert!(!v.is_slug("Matek"));
        assert!(!v.is_slug("a--b"));
        assert!(!v.is_slug("-a"));
        assert!(!v.is_slug(""));
    }

    #[test]
    fn test_power_requires_voltage_or_inputs() {
        let mut c = controller();
        c.power = Power::default();
        let issues = Validator::new().controller(&c);
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].field, "power");

        c.power.inputs = Some(vec![PowerInput {
            name: "POWER1".to_string(),
            kind: None,
            connector: None,
            voltage: None,
            current: None,
            notes: None,
        }]);
        assert!(Validator::new().controller(&c).is_empty());
    }

    #[test]
    fn test_empty_overrides_rejected() {
        let mut c = controller();
        let mut rev = revision("v2");
        rev.overrides = Some(RevisionOverrides::default());
        c.hardware.revisions = Some(vec![rev]);

        let issues = Validator::new().controller(&c);
        assert_eq!(issues.len(), 1);
        assert!(issues[0].is_error());
        assert_eq!(issues[0].field, "hardware.revisions[0].overrides");
    }

    #[test]
    fn test_bad_release_date() {
        let mut c = controller();
        let mut rev = revision("v2");
        rev.released = Some("2023-13-01".to_string());
        c.hardware.revisions = Some(vec![rev]);

        let issues = Validator::new().controller(&c);
        assert_eq!(issues.len(), 1);
        assert!(issues[0].message.contains("YYYY-MM-DD"));
    }

    #[test]
    fn test_revision_needs_some_description() {
        let mut c = controller();
        let mut rev = revision("v2");
        rev.released = None;
        rev.changes = Some(Vec::new());
        c.hardware.revisions = Some(vec![rev]);

        let issues = Validator::new().controller(&c);
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].field, "hardware.revisions[0]");
    }

    #[test]
    fn test_duplicate_revision_ids_warn() {
        let mut c = controller();
        c.hardware.revisions = Some(vec![revision("v2"), revision("v2")]);

        let issues = Validator::new().controller(&c);
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].severity, Severity::Warning);
        assert_eq!(issues[0].field, "hardware.revisions[1].id");
    }

    #[test]
    fn test_transmitter_identity() {
        let tx = Transmitter {
            id: "Radiomaster TX16S".to_string(),
            title: String::new(),
            brand: "radiomaster".to_string(),
            hardware: None,
            features: Vec::new(),
            keywords: Vec::new(),
            sources: Vec::new(),
            notes: None,
        };

        let issues = Validator::new().transmitter(&tx);
        assert_eq!(issues.len(), 2);
    }

    #[test]
    fn test_issue_display_and_conversion() {
        let issue = Issue::error("x", "power", "missing");
        assert_eq!(issue.to_string(), "error: power: missing");
        assert!(matches!(issue.into_error(), Error::InvalidRecord { .. }));
    }
}
