//! Code for reading jurisdiction rule sets from `jurisdictions.toml`.
use super::{input_err_msg, read_optional_toml};
use crate::compliance::{ComplianceRule, RuleBook, RuleSet};
use crate::id::JurisdictionID;
use anyhow::{Context, Result, ensure};
use itertools::Itertools;
use log::info;
use serde::Deserialize;
use std::path::Path;

const JURISDICTIONS_FILE_NAME: &str = "jurisdictions.toml";

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct JurisdictionsFile {
    #[serde(rename = "jurisdiction")]
    jurisdictions: Vec<JurisdictionRaw>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct JurisdictionRaw {
    id: JurisdictionID,
    #[serde(default, rename = "rule")]
    rules: Vec<ComplianceRule>,
}

impl JurisdictionRaw {
    fn into_rule_set(self) -> Result<RuleSet> {
        let id = self.id;
        ensure!(
            self.rules.iter().map(|r| r.rule_type).all_unique(),
            "Jurisdiction {id} defines a rule type more than once"
        );
        for rule in &self.rules {
            ensure!(
                rule.threshold.is_finite() && rule.threshold >= 0.0,
                "Threshold for {} in jurisdiction {id} must be a non-negative number",
                rule.rule_type
            );
        }

        Ok(RuleSet::new(id, self.rules))
    }
}

/// Read the jurisdiction rule book for a project.
///
/// Jurisdictions in `jurisdictions.toml` are added to the built-in ones, replacing any with the
/// same ID.
pub fn read_jurisdictions(project_dir: &Path) -> Result<RuleBook> {
    let mut book = RuleBook::default();
    let file_path = project_dir.join(JURISDICTIONS_FILE_NAME);
    let Some(raw) = read_optional_toml::<JurisdictionsFile>(&file_path)? else {
        return Ok(book);
    };

    ensure!(
        raw.jurisdictions
            .iter()
            .map(|j| j.id.as_str().to_lowercase())
            .all_unique(),
        "Jurisdiction IDs in {} must be unique (ignoring case)",
        file_path.display()
    );
    for jurisdiction in raw.jurisdictions {
        let rules = jurisdiction
            .into_rule_set()
            .with_context(|| input_err_msg(&file_path))?;
        info!("Read rules for jurisdiction {}", rules.jurisdiction);
        book.insert(rules);
    }

    Ok(book)
}
