//! Customer group mapping configuration.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

use super::resolver::{DEFAULT_ORG_ATTRIBUTE, DEFAULT_ORG_DELIMITER, UNMAPPABLE_MESSAGE};
use super::rules::{default_rules, GroupRule, RuleTable, RuleTableError};

/// Customer group mapping configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SsoGroupConfig {
    /// Enable group mapping after SSO login.
    #[serde(default)]
    pub enabled: bool,

    /// SAML attribute holding the user's role (e.g. "Retailer").
    #[serde(default = "default_role_attribute")]
    pub role_attribute: String,

    /// SAML attribute holding the dotted organization string.
    #[serde(default = "default_org_attribute")]
    pub org_attribute: String,

    /// Delimiter ending the country code in the organization string.
    #[serde(default = "default_org_delimiter")]
    pub org_delimiter: char,

    /// Ordered mapping rules; the first match wins.
    #[serde(default = "default_rules")]
    pub rules: Vec<GroupRule>,

    /// Message shown to the user when no group can be resolved.
    #[serde(default = "default_unmapped_message")]
    pub unmapped_message: String,

    /// Where to send the user when the login is rejected.
    #[serde(default = "default_logout_redirect")]
    pub logout_redirect: String,
}

fn default_role_attribute() -> String {
    "groups".to_string()
}

fn default_org_attribute() -> String {
    DEFAULT_ORG_ATTRIBUTE.to_string()
}

fn default_org_delimiter() -> char {
    DEFAULT_ORG_DELIMITER
}

fn default_unmapped_message() -> String {
    UNMAPPABLE_MESSAGE.to_string()
}

fn default_logout_redirect() -> String {
    "/customer/account/logout/".to_string()
}

impl Default for SsoGroupConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            role_attribute: default_role_attribute(),
            org_attribute: default_org_attribute(),
            org_delimiter: default_org_delimiter(),
            rules: default_rules(),
            unmapped_message: default_unmapped_message(),
            logout_redirect: default_logout_redirect(),
        }
    }
}

impl SsoGroupConfig {
    /// Load configuration from a JSON file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;
        let config: Self = serde_json::from_str(&raw)
            .with_context(|| format!("Failed to parse config file: {:?}", path))?;
        Ok(config)
    }

    /// Validate the configuration.
    ///
    /// The rule table is checked even when mapping is disabled, so a bad
    /// table is caught before the feature is switched on.
    pub fn validate(&self) -> Result<(), String> {
        self.rule_table().map_err(|e| e.to_string())?;

        if !self.enabled {
            return Ok(());
        }

        if self.role_attribute.trim().is_empty() {
            return Err("role_attribute is required".to_string());
        }

        if self.org_attribute.trim().is_empty() {
            return Err("org_attribute is required".to_string());
        }

        if !self.logout_redirect.starts_with('/') && !self.logout_redirect.starts_with("http") {
            return Err(format!(
                "logout_redirect must be a path or URL: {}",
                self.logout_redirect
            ));
        }

        Ok(())
    }

    /// Build the validated rule table.
    pub fn rule_table(&self) -> Result<RuleTable, RuleTableError> {
        RuleTable::new(self.rules.clone())
    }
}

/// JSON configuration for dynamic reconfiguration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub struct SsoGroupConfigJson {
    pub enabled: Option<bool>,
    pub role_attribute: Option<String>,
    pub org_attribute: Option<String>,
    pub org_delimiter: Option<char>,
    #[serde(default)]
    pub rules: Vec<GroupRule>,
    pub unmapped_message: Option<String>,
    pub logout_redirect: Option<String>,
}

impl SsoGroupConfigJson {
    /// Merge JSON config into existing config.
    pub fn apply_to(&self, config: &mut SsoGroupConfig) {
        if let Some(enabled) = self.enabled {
            config.enabled = enabled;
        }
        if let Some(ref attribute) = self.role_attribute {
            config.role_attribute = attribute.clone();
        }
        if let Some(ref attribute) = self.org_attribute {
            config.org_attribute = attribute.clone();
        }
        if let Some(delimiter) = self.org_delimiter {
            config.org_delimiter = delimiter;
        }
        if !self.rules.is_empty() {
            config.rules = self.rules.clone();
        }
        if let Some(ref message) = self.unmapped_message {
            config.unmapped_message = message.clone();
        }
        if let Some(ref redirect) = self.logout_redirect {
            config.logout_redirect = redirect.clone();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_default_config() {
        let config = SsoGroupConfig::default();
        assert!(!config.enabled);
        assert_eq!(config.org_attribute, "Org");
        assert_eq!(config.org_delimiter, '.');
        assert_eq!(config.logout_redirect, "/customer/account/logout/");
        assert_eq!(config.rules.len(), 7);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validation() {
        let mut config = SsoGroupConfig::default();
        config.enabled = true;
        assert!(config.validate().is_ok());

        config.role_attribute = String::new();
        assert!(config.validate().is_err()); // missing role attribute

        config.role_attribute = "role".to_string();
        config.logout_redirect = "logout".to_string();
        assert!(config.validate().is_err()); // not a path

        config.logout_redirect = "/logout".to_string();
        config.rules.clear();
        assert!(config.validate().is_err()); // no rules
    }

    #[test]
    fn test_invalid_rules_rejected_when_disabled() {
        let mut config = SsoGroupConfig::default();
        config.rules = vec![
            GroupRule::new(9, ["Retailer"]),
            GroupRule::new(15, ["Retailer"]).with_countries(["TESP"]),
        ];
        let err = config.validate().unwrap_err();
        assert!(err.contains("can never match"));
    }

    #[test]
    fn test_json_overlay() {
        let json: SsoGroupConfigJson = serde_json::from_str(
            r#"{
                "enabled": true,
                "role-attribute": "role",
                "logout-redirect": "/sso/logout",
                "rules": [{"group_id": 3, "codes": ["Employee"]}]
            }"#,
        )
        .unwrap();

        let mut config = SsoGroupConfig::default();
        json.apply_to(&mut config);

        assert!(config.enabled);
        assert_eq!(config.role_attribute, "role");
        assert_eq!(config.logout_redirect, "/sso/logout");
        assert_eq!(config.rules.len(), 1);
        assert_eq!(config.org_attribute, "Org"); // untouched
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_empty_overlay_keeps_rules() {
        let mut config = SsoGroupConfig::default();
        SsoGroupConfigJson::default().apply_to(&mut config);
        assert_eq!(config.rules, default_rules());
        assert!(!config.enabled);
    }

    #[test]
    fn test_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"enabled": true, "role_attribute": "role",
                "rules": [{{"group_id": 8, "label": "b2b_tme", "codes": ["TME"]}}]}}"#
        )
        .unwrap();

        let config = SsoGroupConfig::from_file(file.path()).unwrap();
        assert!(config.enabled);
        assert_eq!(config.role_attribute, "role");
        assert_eq!(config.rule_table().unwrap().len(), 1);
        assert_eq!(config.unmapped_message, UNMAPPABLE_MESSAGE);
    }

    #[test]
    fn test_from_file_unknown_field() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, r#"{{"enabled": true, "group_mapping": {{}}}}"#).unwrap();
        assert!(SsoGroupConfig::from_file(file.path()).is_err());
    }
}
