//! Rule sets per jurisdiction.
use super::rules::{ComplianceRule, RuleOverride, RuleType};
use crate::error::EngineError;
use crate::id::JurisdictionID;
use log::warn;
use std::collections::HashMap;
use std::str::FromStr;
use unicase::UniCase;

/// The jurisdiction used when none is given, or when the given one is unknown
pub const DEFAULT_JURISDICTION: &str = "default";

/// The rules which apply in one jurisdiction
#[derive(Debug, Clone, PartialEq)]
pub struct RuleSet {
    /// The jurisdiction the rules belong to
    pub jurisdiction: JurisdictionID,
    rules: Vec<ComplianceRule>,
}

impl RuleSet {
    /// Create a rule set. Later rules replace earlier ones of the same type.
    pub fn new<I>(jurisdiction: JurisdictionID, rules: I) -> Self
    where
        I: IntoIterator<Item = ComplianceRule>,
    {
        let mut set = Self {
            jurisdiction,
            rules: Vec::new(),
        };
        for rule in rules {
            set.insert(rule);
        }

        set
    }

    /// Add a rule, replacing any rule of the same type
    pub fn insert(&mut self, rule: ComplianceRule) {
        match self.rules.binary_search_by_key(&rule.rule_type, |r| r.rule_type) {
            Ok(i) => self.rules[i] = rule,
            Err(i) => self.rules.insert(i, rule),
        }
    }

    /// The rule of a type, if present
    pub fn get(&self, rule_type: RuleType) -> Option<&ComplianceRule> {
        self.rules.iter().find(|r| r.rule_type == rule_type)
    }

    /// The threshold of a rule, if present and enabled
    pub fn threshold(&self, rule_type: RuleType) -> Option<f64> {
        self.get(rule_type)
            .filter(|r| r.enabled)
            .map(|r| r.threshold)
    }

    /// All rules, ordered by type
    pub fn iter(&self) -> impl Iterator<Item = &ComplianceRule> {
        self.rules.iter()
    }

    /// Apply a project override, rejecting unknown rule types
    fn apply(&mut self, o: &RuleOverride) -> Result<(), EngineError> {
        let rule_type = RuleType::from_str(&o.rule_type)
            .map_err(|_| EngineError::InvalidRuleOverride(o.rule_type.clone()))?;

        let mut rule = self
            .get(rule_type)
            .cloned()
            .or_else(|| builtin_default().get(rule_type).cloned())
            .unwrap_or_else(|| ComplianceRule::new(rule_type, 0.0));
        if let Some(threshold) = o.threshold {
            rule.threshold = threshold;
        }
        if let Some(enabled) = o.enabled {
            rule.enabled = enabled;
        }
        if let Some(severity) = o.severity {
            rule = rule.with_severity(severity);
        }
        self.insert(rule);

        Ok(())
    }
}

/// The built-in fallback rule set
fn builtin_default() -> RuleSet {
    RuleSet::new(
        DEFAULT_JURISDICTION.into(),
        [
            ComplianceRule::new(RuleType::SlopeLimit, 15.0),
            ComplianceRule::new(RuleType::Spacing, 3.0),
            ComplianceRule::new(RuleType::Setback, 15.0),
            ComplianceRule::new(RuleType::RoadGrade, 15.0),
            ComplianceRule::new(RuleType::WetlandBuffer, 30.0),
            ComplianceRule::new(RuleType::ZoneBuffer, 0.0),
        ],
    )
}

/// Built-in rules for California, stricter than the default in every threshold
fn builtin_california() -> RuleSet {
    RuleSet::new(
        "ca".into(),
        [
            ComplianceRule::new(RuleType::SlopeLimit, 10.0),
            ComplianceRule::new(RuleType::Spacing, 5.0),
            ComplianceRule::new(RuleType::Setback, 30.0),
            ComplianceRule::new(RuleType::RoadGrade, 12.0),
            ComplianceRule::new(RuleType::WetlandBuffer, 50.0),
            ComplianceRule::new(RuleType::ZoneBuffer, 5.0),
        ],
    )
}

/// Rule sets keyed by jurisdiction (case-insensitive)
#[derive(Debug, Clone, PartialEq)]
pub struct RuleBook(HashMap<UniCase<String>, RuleSet>);

impl Default for RuleBook {
    fn default() -> Self {
        let mut book = Self(HashMap::new());
        book.insert(builtin_default());
        book.insert(builtin_california());
        book
    }
}

impl RuleBook {
    /// Add or replace a jurisdiction's rule set
    pub fn insert(&mut self, rules: RuleSet) {
        self.0
            .insert(UniCase::new(rules.jurisdiction.to_string()), rules);
    }

    /// The rule set for a jurisdiction, if known
    pub fn get(&self, jurisdiction: &str) -> Option<&RuleSet> {
        self.0.get(&UniCase::new(jurisdiction.to_string()))
    }

    /// Known jurisdiction IDs, sorted
    pub fn jurisdictions(&self) -> Vec<&JurisdictionID> {
        let mut ids: Vec<_> = self.0.values().map(|r| &r.jurisdiction).collect();
        ids.sort();
        ids
    }

    /// The rules to apply for a jurisdiction, after project overrides.
    ///
    /// Unknown jurisdictions fall back to the default rule set. Overrides naming an unknown rule
    /// type are rejected.
    pub fn resolve(
        &self,
        jurisdiction: Option<&str>,
        overrides: &[RuleOverride],
    ) -> Result<RuleSet, EngineError> {
        let requested = jurisdiction.unwrap_or(DEFAULT_JURISDICTION);
        let mut rules = match self.get(requested) {
            Some(rules) => rules.clone(),
            None => {
                warn!("Unknown jurisdiction {requested}: applying {DEFAULT_JURISDICTION} rules");
                self.get(DEFAULT_JURISDICTION)
                    .cloned()
                    .unwrap_or_else(builtin_default)
            }
        };

        for o in overrides {
            rules.apply(o)?;
        }

        Ok(rules)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compliance::Severity;
    use strum::IntoEnumIterator;

    fn override_of(rule_type: &str, threshold: f64) -> RuleOverride {
        RuleOverride {
            rule_type: rule_type.into(),
            threshold: Some(threshold),
            enabled: None,
            severity: None,
        }
    }

    #[test]
    fn test_case_insensitive_lookup() {
        let book = RuleBook::default();
        assert_eq!(book.get("CA").unwrap().jurisdiction.as_str(), "ca");
        assert_eq!(book.jurisdictions().len(), 2);
    }

    #[test]
    fn test_unknown_jurisdiction_falls_back() {
        let book = RuleBook::default();
        let rules = book.resolve(Some("atlantis"), &[]).unwrap();
        assert_eq!(rules.jurisdiction.as_str(), DEFAULT_JURISDICTION);
        assert_eq!(rules, builtin_default());
    }

    #[test]
    fn test_california_is_stricter() {
        let default = builtin_default();
        let ca = builtin_california();
        for rule_type in RuleType::iter() {
            let (d, c) = (
                default.threshold(rule_type).unwrap(),
                ca.threshold(rule_type).unwrap(),
            );
            match rule_type {
                RuleType::SlopeLimit | RuleType::RoadGrade => assert!(c <= d, "{rule_type}"),
                _ => assert!(c >= d, "{rule_type}"),
            }
        }
    }

    #[test]
    fn test_override_replaces_rule() {
        let book = RuleBook::default();
        let mut disable = override_of("slope_limit", 20.0);
        disable.enabled = Some(false);
        disable.severity = Some(Severity::Error);
        let rules = book
            .resolve(Some("ca"), &[override_of("setback", 40.0), disable])
            .unwrap();

        assert_eq!(rules.threshold(RuleType::Setback), Some(40.0));
        assert_eq!(rules.threshold(RuleType::SlopeLimit), None);
        let slope = rules.get(RuleType::SlopeLimit).unwrap();
        assert_eq!(slope.threshold, 20.0);
        assert_eq!(slope.severity(), Severity::Error);
        assert_eq!(rules.iter().count(), 6);
    }

    #[test]
    fn test_override_adds_missing_rule() {
        let mut book = RuleBook::default();
        book.insert(RuleSet::new("lax".into(), []));
        let rules = book
            .resolve(Some("lax"), &[override_of("road_grade", 20.0)])
            .unwrap();
        assert_eq!(rules.iter().count(), 1);
        assert_eq!(rules.threshold(RuleType::RoadGrade), Some(20.0));
    }

    #[test]
    fn test_unknown_override_rejected() {
        let book = RuleBook::default();
        assert_eq!(
            book.resolve(None, &[override_of("noise_limit", 40.0)]),
            Err(EngineError::InvalidRuleOverride("noise_limit".into()))
        );
    }
}
