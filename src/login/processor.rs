//! Applies the resolved customer group after a successful SSO login.
//!
//! Runs once the SAML library has validated the assertion: resolves the
//! group, updates the customer and the active cart, and fires the
//! "customer updated" notification at most once per login.

use anyhow::{anyhow, Context, Result};
use chrono::Utc;
use std::sync::{Arc, RwLock};
use tracing::{debug, info, warn};

use super::types::{CustomerId, LoginCycle, LoginId};
use crate::mapping::{
    AttributeSet, GroupId, GroupResolver, RuleTable, SsoGroupConfig, SsoGroupConfigJson,
};

/// Supplies the validated assertion attributes for the current login.
pub trait AssertionSource {
    fn attributes(&self) -> Result<AttributeSet>;
}

impl AssertionSource for AttributeSet {
    fn attributes(&self) -> Result<AttributeSet> {
        Ok(self.clone())
    }
}

/// Deployment settings consulted on every login.
pub trait ConfigProvider {
    /// Whether group mapping is switched on for this deployment.
    fn is_enabled(&self) -> bool;

    /// Name of the SAML attribute carrying the role.
    fn role_attribute(&self) -> String;

    fn org_attribute(&self) -> String {
        crate::mapping::resolver::DEFAULT_ORG_ATTRIBUTE.to_string()
    }

    fn org_delimiter(&self) -> char {
        crate::mapping::resolver::DEFAULT_ORG_DELIMITER
    }

    fn unmapped_message(&self) -> String {
        crate::mapping::resolver::UNMAPPABLE_MESSAGE.to_string()
    }

    fn logout_redirect(&self) -> String {
        "/customer/account/logout/".to_string()
    }
}

impl ConfigProvider for SsoGroupConfig {
    fn is_enabled(&self) -> bool {
        self.enabled
    }

    fn role_attribute(&self) -> String {
        self.role_attribute.clone()
    }

    fn org_attribute(&self) -> String {
        self.org_attribute.clone()
    }

    fn org_delimiter(&self) -> char {
        self.org_delimiter
    }

    fn unmapped_message(&self) -> String {
        self.unmapped_message.clone()
    }

    fn logout_redirect(&self) -> String {
        self.logout_redirect.clone()
    }
}

/// Persists the resolved group on the customer account and the active cart.
pub trait AccountUpdater {
    fn assign_customer_group(&self, customer: CustomerId, group: GroupId) -> Result<()>;

    fn assign_cart_group(&self, customer: CustomerId, group: GroupId) -> Result<()>;
}

/// "Customer updated" notification payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CustomerUpdated {
    pub login_id: LoginId,
    pub customer_id: CustomerId,
    pub group_id: GroupId,
}

/// Receives the once-per-login "customer updated" signal.
pub trait Notifier {
    fn customer_updated(&self, event: &CustomerUpdated) -> Result<()>;
}

/// Result of processing a login, for the host to act on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoginOutcome {
    /// Mapping is disabled; continue the original flow unchanged.
    Bypassed,

    /// Group applied to the customer and cart.
    Applied { group_id: GroupId },

    /// No group could be resolved; show `message` and send the user to
    /// `redirect` to end the session.
    Rejected { message: String, redirect: String },
}

/// Configuration and rule table in effect for a login.
#[derive(Debug)]
pub struct ProcessorState<C> {
    pub config: C,
    pub rules: Arc<RuleTable>,
}

/// Post-login group assignment.
pub struct SsoGroupProcessor<C, U, N> {
    state: RwLock<Arc<ProcessorState<C>>>,
    updater: U,
    notifier: N,
}

impl<C, U, N> SsoGroupProcessor<C, U, N>
where
    C: ConfigProvider,
    U: AccountUpdater,
    N: Notifier,
{
    pub fn new(config: C, rules: RuleTable, updater: U, notifier: N) -> Self {
        Self {
            state: RwLock::new(Arc::new(ProcessorState {
                config,
                rules: Arc::new(rules),
            })),
            updater,
            notifier,
        }
    }

    /// Replace configuration and rules. Logins in progress keep their snapshot.
    pub fn reconfigure(&self, config: C, rules: RuleTable) -> Result<()> {
        let mut guard = self
            .state
            .write()
            .map_err(|_| anyhow!("Processor state lock poisoned"))?;
        *guard = Arc::new(ProcessorState {
            config,
            rules: Arc::new(rules),
        });

        info!(
            enabled = guard.config.is_enabled(),
            rules = guard.rules.len(),
            "Reconfigured customer group mapping"
        );
        Ok(())
    }

    /// Current configuration and rules.
    pub fn state(&self) -> Result<Arc<ProcessorState<C>>> {
        self.state
            .read()
            .map(|s| Arc::clone(&*s))
            .map_err(|_| anyhow!("Processor state lock poisoned"))
    }

    /// Build a resolver from the current rule table and configuration.
    pub fn resolver(&self) -> Result<GroupResolver> {
        Ok(Self::resolver_for(&*self.state()?))
    }

    fn resolver_for(state: &ProcessorState<C>) -> GroupResolver {
        GroupResolver::new(Arc::clone(&state.rules), state.config.role_attribute())
            .with_org_attribute(state.config.org_attribute())
            .with_org_delimiter(state.config.org_delimiter())
    }

    /// Process a validated SSO login.
    pub fn process_login<A>(&self, cycle: &mut LoginCycle, source: &A) -> Result<LoginOutcome>
    where
        A: AssertionSource + ?Sized,
    {
        let state = self.state()?;

        if !state.config.is_enabled() {
            debug!(login_id = %cycle.id, "Customer group mapping disabled, skipping");
            return Ok(LoginOutcome::Bypassed);
        }

        let attributes = source
            .attributes()
            .context("Failed to read assertion attributes")?;

        let group_id = match Self::resolver_for(&state).resolve_group(&attributes) {
            Ok(group_id) => group_id,
            Err(e) => {
                warn!(
                    login_id = %cycle.id,
                    customer_id = %cycle.customer_id,
                    error = %e,
                    "Customer group resolution failed, rejecting login"
                );
                return Ok(LoginOutcome::Rejected {
                    message: state.config.unmapped_message(),
                    redirect: state.config.logout_redirect(),
                });
            }
        };

        self.updater
            .assign_customer_group(cycle.customer_id, group_id)
            .with_context(|| format!("Failed to assign group {} to customer", group_id))?;
        self.updater
            .assign_cart_group(cycle.customer_id, group_id)
            .with_context(|| format!("Failed to assign group {} to cart", group_id))?;
        cycle.applied_group = Some(group_id);

        info!(
            login_id = %cycle.id,
            customer_id = %cycle.customer_id,
            group_id = group_id,
            started_at = %cycle.started_at,
            elapsed_ms = (Utc::now() - cycle.started_at).num_milliseconds(),
            "Customer group applied"
        );

        self.dispatch_customer_updated(cycle, group_id)?;

        Ok(LoginOutcome::Applied { group_id })
    }

    /// Observer hook for an externally raised "customer updated" event.
    ///
    /// Marks the login so the update is recognised as SSO-driven and the
    /// processor does not dispatch it a second time.
    pub fn on_customer_updated(&self, cycle: &mut LoginCycle) {
        if cycle.latch_mut().mark_dispatched() {
            debug!(login_id = %cycle.id, "Customer update recorded for login");
        }
    }

    fn dispatch_customer_updated(&self, cycle: &mut LoginCycle, group_id: GroupId) -> Result<()> {
        if cycle.customer_update_dispatched() {
            debug!(
                login_id = %cycle.id,
                "Customer update already dispatched for this login"
            );
            return Ok(());
        }

        let event = CustomerUpdated {
            login_id: cycle.id,
            customer_id: cycle.customer_id,
            group_id,
        };
        self.notifier
            .customer_updated(&event)
            .context("Failed to dispatch customer update")?;
        cycle.latch_mut().mark_dispatched();

        Ok(())
    }
}

impl<U, N> SsoGroupProcessor<SsoGroupConfig, U, N>
where
    U: AccountUpdater,
    N: Notifier,
{
    /// Create a processor from a validated configuration.
    pub fn from_config(config: SsoGroupConfig, updater: U, notifier: N) -> Result<Self> {
        config.validate().map_err(|e| anyhow!(e))?;
        let rules = config.rule_table()?;
        Ok(Self::new(config, rules, updater, notifier))
    }

    /// Merge a JSON overlay into the current configuration and apply it.
    ///
    /// The running configuration is left untouched if the merged result is
    /// invalid.
    pub fn on_configure(&self, json: &SsoGroupConfigJson) -> Result<()> {
        let mut config = self.state()?.config.clone();
        json.apply_to(&mut config);

        config
            .validate()
            .map_err(|e| anyhow!("Invalid customer group configuration: {}", e))?;
        let rules = config.rule_table()?;

        self.reconfigure(config, rules)
    }
}
