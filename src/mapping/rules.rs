//! Customer group rules and the ordered rule table.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use thiserror::Error;

/// Customer group identifier in the host account system.
pub type GroupId = u32;

/// A single mapping rule: role codes (and optionally countries) → group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GroupRule {
    /// Group assigned when this rule matches.
    pub group_id: GroupId,

    /// Human-readable group code, e.g. "b2b_dealers_es". Logging only.
    #[serde(default)]
    pub label: Option<String>,

    /// Accepted values of the role attribute.
    pub codes: Vec<String>,

    /// Accepted country codes. `None` matches any country.
    #[serde(default)]
    pub countries: Option<Vec<String>>,
}

impl GroupRule {
    /// Rule matching the given role codes in any country.
    pub fn new<I, S>(group_id: GroupId, codes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            group_id,
            label: None,
            codes: codes.into_iter().map(Into::into).collect(),
            countries: None,
        }
    }

    /// Restrict the rule to the given country codes.
    pub fn with_countries<I, S>(mut self, countries: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.countries = Some(countries.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn matches_code(&self, role: &str) -> bool {
        self.codes.iter().any(|code| code == role)
    }

    /// Wildcard rules accept every country.
    pub fn matches_country(&self, country: &str) -> bool {
        match &self.countries {
            Some(countries) => countries.iter().any(|c| c == country),
            None => true,
        }
    }

    pub fn is_wildcard(&self) -> bool {
        self.countries.is_none()
    }

    /// Label for logs, falling back to the numeric id.
    pub fn display_name(&self) -> String {
        match &self.label {
            Some(label) => label.clone(),
            None => self.group_id.to_string(),
        }
    }
}

/// Rule table validation errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RuleTableError {
    #[error("Rule table must contain at least one rule")]
    Empty,

    #[error("Rule for group {group_id} has no role codes")]
    EmptyCodes { group_id: GroupId },

    #[error("Rule for group {group_id} has an empty country list")]
    EmptyCountries { group_id: GroupId },

    #[error("Rule for group {group_id} contains a blank {field} value")]
    BlankValue {
        group_id: GroupId,
        field: &'static str,
    },

    #[error("Group {group_id} is mapped by more than one rule")]
    DuplicateGroup { group_id: GroupId },

    #[error(
        "Rule for group {shadowed} can never match role code '{code}': wildcard rule \
         for group {wildcard} accepts it first"
    )]
    Shadowed {
        shadowed: GroupId,
        wildcard: GroupId,
        code: String,
    },
}

/// Ordered, validated list of group rules. First match wins.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct RuleTable {
    rules: Vec<GroupRule>,
}

impl RuleTable {
    /// Build a rule table, rejecting tables that cannot resolve as authored.
    pub fn new(rules: Vec<GroupRule>) -> Result<Self, RuleTableError> {
        if rules.is_empty() {
            return Err(RuleTableError::Empty);
        }

        let mut seen_groups = HashSet::new();
        for rule in &rules {
            if rule.codes.is_empty() {
                return Err(RuleTableError::EmptyCodes {
                    group_id: rule.group_id,
                });
            }
            if rule.codes.iter().any(|c| c.trim().is_empty()) {
                return Err(RuleTableError::BlankValue {
                    group_id: rule.group_id,
                    field: "code",
                });
            }
            if let Some(ref countries) = rule.countries {
                if countries.is_empty() {
                    return Err(RuleTableError::EmptyCountries {
                        group_id: rule.group_id,
                    });
                }
                if countries.iter().any(|c| c.trim().is_empty()) {
                    return Err(RuleTableError::BlankValue {
                        group_id: rule.group_id,
                        field: "country",
                    });
                }
            }
            if !seen_groups.insert(rule.group_id) {
                return Err(RuleTableError::DuplicateGroup {
                    group_id: rule.group_id,
                });
            }
        }

        // A code accepted by an earlier wildcard rule is dead in every later rule.
        for (index, rule) in rules.iter().enumerate() {
            let earlier_wildcards = rules[..index].iter().filter(|r| r.is_wildcard());
            for wildcard in earlier_wildcards {
                if let Some(code) = rule.codes.iter().find(|c| wildcard.matches_code(c)) {
                    return Err(RuleTableError::Shadowed {
                        shadowed: rule.group_id,
                        wildcard: wildcard.group_id,
                        code: code.clone(),
                    });
                }
            }
        }

        Ok(Self { rules })
    }

    /// Find the first rule accepting this role and country.
    pub fn find(&self, role: &str, country: &str) -> Option<&GroupRule> {
        self.rules
            .iter()
            .find(|rule| rule.matches_code(role) && rule.matches_country(country))
    }

    pub fn rules(&self) -> &[GroupRule] {
        &self.rules
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

impl TryFrom<Vec<GroupRule>> for RuleTable {
    type Error = RuleTableError;

    fn try_from(rules: Vec<GroupRule>) -> Result<Self, Self::Error> {
        Self::new(rules)
    }
}

impl<'de> Deserialize<'de> for RuleTable {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let rules = Vec::<GroupRule>::deserialize(deserializer)?;
        Self::new(rules).map_err(serde::de::Error::custom)
    }
}

/// Production mapping: dealer groups per country, then role-only groups.
pub fn default_rules() -> Vec<GroupRule> {
    vec![
        GroupRule::new(15, ["Retailer"])
            .with_countries(["TESP", "TES"])
            .with_label("b2b_dealers_es"),
        GroupRule::new(16, ["Retailer"])
            .with_countries(["TPOL"])
            .with_label("b2b_dealers_pl"),
        GroupRule::new(17, ["Retailer"])
            .with_countries(["TGBR"])
            .with_label("b2b_dealers_uk"),
        GroupRule::new(8, ["TME"]).with_label("b2b_tme"),
        GroupRule::new(9, ["Retailer"]).with_label("b2b_dealers"),
        GroupRule::new(10, ["NMSC"]).with_label("b2b_nmsc"),
        GroupRule::new(12, ["Employee"]).with_label("b2c_employees"),
    ]
}
