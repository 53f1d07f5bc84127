//! Resolve a customer group from SAML assertion attributes.
//!
//! The role attribute selects candidate rules; the country code embedded in
//! the organization attribute (`TESP.something` → `TESP`) narrows them down.

use std::sync::Arc;
use thiserror::Error;
use tracing::debug;

use super::attributes::AttributeSet;
use super::rules::{GroupId, GroupRule, RuleTable};

/// Default organization attribute carrying the country code.
pub const DEFAULT_ORG_ATTRIBUTE: &str = "Org";

/// Separator between the country code and the rest of the org value.
pub const DEFAULT_ORG_DELIMITER: char = '.';

/// User-facing text shown when no group can be resolved.
pub const UNMAPPABLE_MESSAGE: &str = "Can't map values to customer group. Please contact us.";

/// Group resolution failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolveError {
    #[error("Can't map values to customer group. Please contact us.")]
    UnmappableAttributes {
        role: Option<String>,
        country: String,
    },

    #[error("Attribute '{attribute}' is missing or carries no country code")]
    MalformedOrgAttribute { attribute: String },
}

/// Maps attribute sets to customer groups using a fixed rule table.
#[derive(Debug, Clone)]
pub struct GroupResolver {
    rules: Arc<RuleTable>,
    role_attribute: String,
    org_attribute: String,
    org_delimiter: char,
}

impl GroupResolver {
    /// Create a resolver reading the role from `role_attribute`.
    pub fn new(rules: Arc<RuleTable>, role_attribute: impl Into<String>) -> Self {
        Self {
            rules,
            role_attribute: role_attribute.into(),
            org_attribute: DEFAULT_ORG_ATTRIBUTE.to_string(),
            org_delimiter: DEFAULT_ORG_DELIMITER,
        }
    }

    pub fn with_org_attribute(mut self, org_attribute: impl Into<String>) -> Self {
        self.org_attribute = org_attribute.into();
        self
    }

    pub fn with_org_delimiter(mut self, delimiter: char) -> Self {
        self.org_delimiter = delimiter;
        self
    }

    pub fn role_attribute(&self) -> &str {
        &self.role_attribute
    }

    pub fn rules(&self) -> &RuleTable {
        &self.rules
    }

    /// Resolve the customer group id for these attributes.
    pub fn resolve_group(&self, attributes: &AttributeSet) -> Result<GroupId, ResolveError> {
        self.resolve_rule(attributes).map(|rule| rule.group_id)
    }

    /// Resolve the first matching rule for these attributes.
    pub fn resolve_rule(&self, attributes: &AttributeSet) -> Result<&GroupRule, ResolveError> {
        let role = attributes.first(&self.role_attribute);
        let country = self.country_code(attributes)?;

        let matched = role.and_then(|role| self.rules.find(role, country));

        match matched {
            Some(rule) => {
                debug!(
                    role = ?role,
                    country = %country,
                    group_id = rule.group_id,
                    group = %rule.display_name(),
                    "Resolved customer group"
                );
                Ok(rule)
            }
            None => {
                debug!(
                    role = ?role,
                    country = %country,
                    role_attribute = %self.role_attribute,
                    "No customer group rule matched"
                );
                Err(ResolveError::UnmappableAttributes {
                    role: role.map(str::to_string),
                    country: country.to_string(),
                })
            }
        }
    }

    /// Country code: the org value up to the first delimiter.
    fn country_code<'a>(&self, attributes: &'a AttributeSet) -> Result<&'a str, ResolveError> {
        let malformed = || ResolveError::MalformedOrgAttribute {
            attribute: self.org_attribute.clone(),
        };

        let org = attributes.first(&self.org_attribute).ok_or_else(malformed)?;
        let country = org.split(self.org_delimiter).next().unwrap_or(org);

        if country.is_empty() {
            return Err(malformed());
        }

        Ok(country)
    }
}
