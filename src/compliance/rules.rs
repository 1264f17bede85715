//! Compliance rule definitions.
use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString};

/// The closed set of rule types the evaluator understands.
///
/// Violations are reported in the order the types are declared here.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Display,
    EnumString,
    EnumIter,
    Serialize,
    Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum RuleType {
    /// Maximum mean ground slope under an asset, in degrees
    SlopeLimit,
    /// Minimum gap between asset footprints, in metres
    Spacing,
    /// Minimum distance from an asset to the site boundary, in metres
    Setback,
    /// Maximum road grade, in percent
    RoadGrade,
    /// Minimum distance from wetland zones to assets and roads, in metres
    WetlandBuffer,
    /// No asset inside a zone's buffered geometry (threshold is an extra margin in metres)
    ZoneBuffer,
}

impl RuleType {
    /// The severity of violations of this type unless configured otherwise
    pub fn default_severity(self) -> Severity {
        match self {
            RuleType::SlopeLimit | RuleType::RoadGrade => Severity::Warning,
            _ => Severity::Error,
        }
    }

    /// Unit of the rule's threshold, for messages
    pub fn unit(self) -> &'static str {
        match self {
            RuleType::SlopeLimit => "°",
            RuleType::RoadGrade => "%",
            _ => " m",
        }
    }
}

/// How serious a violation is
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, Serialize, Deserialize)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    /// Advisory
    Warning,
    /// Must be resolved before the layout can be permitted
    Error,
}

/// A single siting rule
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ComplianceRule {
    /// What the rule checks
    pub rule_type: RuleType,
    /// The limit applied
    pub threshold: f64,
    /// Disabled rules are not evaluated
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// Overrides the rule type's default severity
    #[serde(default)]
    severity: Option<Severity>,
}

fn default_enabled() -> bool {
    true
}

impl ComplianceRule {
    /// An enabled rule with the default severity for its type
    pub fn new(rule_type: RuleType, threshold: f64) -> Self {
        Self {
            rule_type,
            threshold,
            enabled: true,
            severity: None,
        }
    }

    /// The same rule with the given severity
    pub fn with_severity(mut self, severity: Severity) -> Self {
        self.severity = Some(severity);
        self
    }

    /// The severity of violations of this rule
    pub fn severity(&self) -> Severity {
        self.severity
            .unwrap_or_else(|| self.rule_type.default_severity())
    }
}

/// A project-level change to one rule of a jurisdiction's rule set
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RuleOverride {
    /// Name of the rule type (checked when the override is applied)
    pub rule_type: String,
    /// New threshold
    #[serde(default)]
    pub threshold: Option<f64>,
    /// Enable or disable the rule
    #[serde(default)]
    pub enabled: Option<bool>,
    /// New severity
    #[serde(default)]
    pub severity: Option<Severity>,
}
