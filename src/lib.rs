//! Customer group assignment for SAML single sign-on.
//!
//! After the SAML library has validated an assertion, the host hands the
//! assertion attributes to [`SsoGroupProcessor`], which resolves a customer
//! group through an ordered [`RuleTable`] and applies it to the customer
//! account and active cart.

pub mod login;
pub mod mapping;

pub use login::{
    AccountUpdater, AssertionSource, ConfigProvider, CustomerId, CustomerUpdated, DispatchLatch,
    LoginCycle, LoginId, LoginOutcome, Notifier, ProcessorState, SsoGroupProcessor,
};
pub use mapping::{
    default_rules, AttributeSet, GroupId, GroupResolver, GroupRule, ResolveError, RuleTable,
    RuleTableError, SsoGroupConfig, SsoGroupConfigJson,
};
