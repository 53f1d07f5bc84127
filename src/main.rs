//! SSO customer group checker
//!
//! Loads a customer group mapping configuration, validates its rule table
//! and resolves an attribute set the same way a login would.

use anyhow::{anyhow, Context, Result};
use clap::Parser;
use serde::Serialize;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};

use sso_customer_groups::{
    AttributeSet, GroupId, GroupResolver, GroupRule, ResolveError, SsoGroupConfig,
};

/// Command line arguments
#[derive(Parser, Debug)]
#[command(name = "sso-customer-groups")]
#[command(about = "Resolve SAML assertion attributes to a customer group")]
struct Args {
    /// Path to the JSON mapping configuration (defaults when omitted)
    #[arg(long, env = "SSO_GROUPS_CONFIG")]
    config: Option<PathBuf>,

    /// Path to a JSON attribute set (reads stdin when omitted)
    #[arg(long, env = "SSO_GROUPS_ATTRIBUTES")]
    attributes: Option<PathBuf>,

    /// Override the configured role attribute
    #[arg(long, env = "SSO_GROUPS_ROLE_ATTRIBUTE")]
    role_attribute: Option<String>,

    /// Only validate and print the rule table
    #[arg(long)]
    check: bool,

    /// Enable verbose logging
    #[arg(short, long, env = "SSO_GROUPS_VERBOSE")]
    verbose: bool,
}

/// Printed on successful resolution.
#[derive(Debug, Serialize)]
struct Resolution<'a> {
    group_id: GroupId,
    label: Option<&'a str>,
}

fn load_config(args: &Args) -> Result<SsoGroupConfig> {
    let mut config = match args.config {
        Some(ref path) => SsoGroupConfig::from_file(path)?,
        None => SsoGroupConfig::default(),
    };

    if let Some(ref attribute) = args.role_attribute {
        config.role_attribute = attribute.clone();
    }

    config
        .validate()
        .map_err(|e| anyhow!("Invalid configuration: {}", e))?;

    Ok(config)
}

fn read_attributes(path: Option<&Path>) -> Result<AttributeSet> {
    let raw = match path {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read attributes file: {:?}", path))?,
        None => {
            let mut buf = String::new();
            std::io::stdin()
                .read_to_string(&mut buf)
                .context("Failed to read attributes from stdin")?;
            buf
        }
    };

    serde_json::from_str(&raw).context("Attributes must be a JSON object of string arrays")
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn main() -> Result<()> {
    // Parse command line arguments
    let args = Args::parse();

    // Initialize tracing on stderr so stdout stays machine-readable
    let log_level = if args.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(format!("{}={}", env!("CARGO_CRATE_NAME"), log_level))
        .with_writer(std::io::stderr)
        .json()
        .init();

    let config = load_config(&args)?;
    let rules = config
        .rule_table()
        .map_err(|e| anyhow!("Invalid rule table: {}", e))?;

    info!(
        enabled = config.enabled,
        role_attribute = %config.role_attribute,
        org_attribute = %config.org_attribute,
        rules = rules.len(),
        "Configuration loaded"
    );

    if args.check {
        let rules: &[GroupRule] = rules.rules();
        return print_json(rules);
    }

    if !config.enabled {
        warn!("Customer group mapping is disabled in this configuration, resolving anyway");
    }

    let attributes = read_attributes(args.attributes.as_deref())?;
    let resolver = GroupResolver::new(Arc::new(rules), config.role_attribute.clone())
        .with_org_attribute(config.org_attribute.clone())
        .with_org_delimiter(config.org_delimiter);

    match resolver.resolve_rule(&attributes) {
        Ok(rule) => {
            info!(group_id = rule.group_id, group = %rule.display_name(), "Resolved");
            print_json(&Resolution {
                group_id: rule.group_id,
                label: rule.label.as_deref(),
            })
        }
        Err(ResolveError::UnmappableAttributes { role, country }) => Err(anyhow!(
            "No rule matches role {:?} in country '{}'",
            role,
            country
        )),
        Err(e) => Err(e.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn args(config: Option<PathBuf>) -> Args {
        Args {
            config,
            attributes: None,
            role_attribute: None,
            check: false,
            verbose: false,
        }
    }

    #[test]
    fn test_default_config_loads() {
        let config = load_config(&args(None)).unwrap();
        assert_eq!(config.rules.len(), 7);
    }

    #[test]
    fn test_role_attribute_override() {
        let mut args = args(None);
        args.role_attribute = Some("role".to_string());
        let config = load_config(&args).unwrap();
        assert_eq!(config.role_attribute, "role");
    }

    #[test]
    fn test_invalid_config_rejected() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, r#"{{"rules": [{{"group_id": 1, "codes": []}}]}}"#).unwrap();

        let err = load_config(&args(Some(file.path().to_path_buf()))).unwrap_err();
        assert!(err.to_string().contains("Invalid configuration"));
    }

    #[test]
    fn test_read_attributes_file() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, r#"{{"role": ["Retailer"], "Org": ["TESP.extra"]}}"#).unwrap();

        let attributes = read_attributes(Some(file.path())).unwrap();
        assert_eq!(attributes.first("Org"), Some("TESP.extra"));
    }

    #[test]
    fn test_read_attributes_rejects_scalars() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, r#"{{"role": "Retailer"}}"#).unwrap();
        assert!(read_attributes(Some(file.path())).is_err());
    }

    #[test]
    fn test_resolution_output() {
        let group_id: GroupId = 15;
        let json = serde_json::to_value(Resolution {
            group_id,
            label: Some("b2b_dealers_es"),
        })
        .unwrap();
        assert_eq!(json["group_id"], 15);
        assert_eq!(json["label"], "b2b_dealers_es");
    }
}
