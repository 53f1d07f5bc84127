//! Customer group mapping.
//!
//! Resolves a customer group from validated SAML assertion attributes using
//! an ordered rule table.

pub mod attributes;
pub mod config;
pub mod resolver;
pub mod rules;

pub use attributes::AttributeSet;
pub use config::{SsoGroupConfig, SsoGroupConfigJson};
pub use resolver::{GroupResolver, ResolveError};
pub use rules::{default_rules, GroupId, GroupRule, RuleTable, RuleTableError};
