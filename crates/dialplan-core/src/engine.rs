//! # Dialplan Resolution Engine
//!
//! Decides which dialplan governs an inbound call leg. The engine is a fixed
//! decision sequence with a bounded fallback ladder; every path ends in a
//! plan except a genuinely failing first routing read and a failed
//! auto-provisioning write.
//!
//! ```text
//!  ┌───────────────┐
//!  │   normalize   │  caller + destination -> canonical numbers
//!  └───────┬───────┘
//!  ┌───────▼───────┐  table missing ──────────────► failsafe ladder
//!  │ routing read  │  not found ──► auto-provision ──► guest welcome
//!  └───────┬───────┘  other error ─────────────────► Err(Internal)
//!  ┌───────▼───────┐
//!  │  maintenance? ├──── yes ──────────────────────► failsafe ladder
//!  └───────┬───────┘
//!  ┌───────▼───────┐
//!  │  active plan  │  lookup failure == no plan
//!  └───────┬───────┘
//!  ┌───────▼───────┐
//!  │   identity    │  cache -> remote (own timeout) -> None
//!  └───────┬───────┘
//!  ┌───────▼─────────────────────────────────────────┐
//!  │ active plan?      -> active plan (+ caller/anon) │
//!  │ known caller?     -> recognized caller plan      │
//!  │ otherwise         -> guest welcome plan          │
//!  └───────┬─────────────────────────────────────────┘
//!  ┌───────▼───────┐  fetch fails
//!  │  materialize  ├──────────────► failsafe ladder ──► emergency plan
//!  └───────────────┘
//! ```
//!
//! The failsafe ladder makes at most one store read (the desired id, or the
//! system failsafe when empty) before emitting the in-memory emergency plan,
//! so a full resolution touches the plan store at most twice after the
//! active-plan check.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, error, info, warn, Instrument};

use crate::config::ResolutionConfig;
use crate::identity::{matched_contact, IdentityResolver};
use crate::normalize::{is_dialable, PhoneNormalizer};
use crate::store::DialplanStore;
use crate::{
    CallerProfile, Contact, DialplanError, Plan, ResolutionOutcome, ResolveRequest, ResolvedDialplan, Result,
    RoutingRecord,
};

/// Plan id of the in-memory emergency plan; never stored
pub const EMERGENCY_PLAN_ID: &str = "ULTIMATE_FAILSAFE";

/// Action of the emergency plan
pub const EMERGENCY_ACTION: &str = "PLAY_ANNOUNCEMENT";

/// Announcement played by the emergency plan
pub const EMERGENCY_ANNOUNCEMENT_ID: &str = "ANNOUNCE_SYSTEM_ERROR";

/// Trace id used when signaling did not supply one
const UNKNOWN_TRACE_ID: &str = "unknown";

/// Everything attached to a response besides the plan itself
#[derive(Debug, Clone, Default)]
struct Context {
    route: Option<RoutingRecord>,
    caller: Option<CallerProfile>,
    matched_contact: Option<Contact>,
}

impl Context {
    fn route(route: RoutingRecord) -> Self {
        Self {
            route: Some(route),
            ..Default::default()
        }
    }
}

/// Inbound dialplan resolution engine
pub struct ResolutionEngine {
    store: Arc<dyn DialplanStore>,
    identity: IdentityResolver,
    normalizer: PhoneNormalizer,
    config: ResolutionConfig,
}

impl ResolutionEngine {
    pub fn new(store: Arc<dyn DialplanStore>, identity: IdentityResolver, config: ResolutionConfig) -> Self {
        let normalizer = config.normalizer();
        Self {
            store,
            identity,
            normalizer,
            config,
        }
    }

    /// Resolve the dialplan for a call from `caller` to `destination`
    /// within the configured deadline.
    pub async fn resolve(&self, caller: &str, destination: &str) -> Result<ResolvedDialplan> {
        self.resolve_request(&ResolveRequest::new(caller, destination)).await
    }

    /// Resolve a request within the configured deadline
    pub async fn resolve_request(&self, request: &ResolveRequest) -> Result<ResolvedDialplan> {
        self.resolve_with_deadline(request, self.config.resolution_deadline()).await
    }

    /// Resolve a request, failing with [`DialplanError::Timeout`] when the
    /// call-leg deadline elapses before a plan is chosen.
    pub async fn resolve_with_deadline(&self, request: &ResolveRequest, deadline: Duration) -> Result<ResolvedDialplan> {
        let trace_id = request.trace_id.as_deref().unwrap_or(UNKNOWN_TRACE_ID);
        let span = tracing::info_span!(
            "resolve_dialplan",
            caller = %request.caller,
            destination = %request.destination,
            trace_id = %trace_id,
        );

        let resolution = self.resolve_inner(&request.caller, &request.destination, trace_id);
        match tokio::time::timeout(deadline, resolution).instrument(span).await {
            Ok(result) => result,
            Err(_) => {
                error!(
                    destination = %request.destination,
                    deadline_ms = deadline.as_millis() as u64,
                    "dialplan resolution exceeded call-leg deadline"
                );
                Err(DialplanError::Timeout(format!(
                    "dialplan resolution for {} exceeded {}ms",
                    request.destination,
                    deadline.as_millis()
                )))
            }
        }
    }

    async fn resolve_inner(&self, raw_caller: &str, raw_destination: &str, trace_id: &str) -> Result<ResolvedDialplan> {
        let destination = self.normalizer.normalize(raw_destination);
        let caller = self.normalizer.normalize(raw_caller);
        debug!(%caller, %destination, "identifiers normalized");

        if !is_dialable(&destination) {
            warn!(destination = %raw_destination, "destination cannot be normalized, serving system failsafe");
            let context = Context::route(self.system_route(&destination));
            return Ok(self.failsafe_ladder("", ResolutionOutcome::Failsafe, context).await);
        }

        let route = match self.store.find_route(&destination).await {
            Ok(Some(route)) => route,
            Ok(None) => {
                let guest = RoutingRecord::guest(
                    destination.as_str(),
                    self.config.system_tenant_id.clone(),
                    self.config.default_language_code.clone(),
                );
                let stored = self.auto_provision(&guest).await?;
                if stored == guest {
                    let plan_id = self.config.guest_welcome_plan_id.clone();
                    return Ok(self
                        .materialize(&plan_id, ResolutionOutcome::AutoProvisioned, Context::route(stored))
                        .await);
                }
                info!(%destination, tenant = %stored.tenant_id, "inbound route was configured concurrently, resolving it");
                stored
            }
            Err(DialplanError::BackingTableMissing(e)) => {
                error!(error = %e, "🚨 inbound_routes table is missing, serving system failsafe");
                let context = Context::route(self.system_route(&destination));
                return Ok(self.failsafe_ladder("", ResolutionOutcome::TableMissing, context).await);
            }
            Err(e) => {
                error!(%destination, error = %e, "inbound route lookup failed");
                return Err(DialplanError::internal(format!("route lookup failed: {}", e)));
            }
        };

        if route.is_maintenance_mode {
            info!(%destination, "🔧 destination in maintenance mode, serving failsafe plan");
            let failsafe_id = route.failsafe_plan_id.clone().unwrap_or_default();
            return Ok(self
                .failsafe_ladder(&failsafe_id, ResolutionOutcome::Maintenance, Context::route(route))
                .await);
        }

        let active_plan = self.active_plan(&route).await;

        let identity = if is_dialable(&caller) {
            self.identity.resolve(&caller, trace_id).await
        } else {
            debug!(caller = %raw_caller, "caller withheld or not a number, skipping identity lookup");
            None
        };
        let contact = identity
            .as_ref()
            .and_then(|profile| matched_contact(profile, &caller, &self.normalizer));

        match (active_plan, identity) {
            (Some(plan), identity) => {
                let caller_profile = identity.unwrap_or_else(|| CallerProfile::anonymous(route.tenant_id.clone()));
                info!(plan_id = %plan.id, user_id = %caller_profile.id, "📞 routing to number-specific plan");
                let context = Context {
                    route: Some(route),
                    caller: Some(caller_profile),
                    matched_contact: contact,
                };
                Ok(Self::response(plan, ResolutionOutcome::ActivePlan, context))
            }
            (None, Some(profile)) => {
                info!(user_id = %profile.id, "👤 recognized caller without dedicated plan");
                let plan_id = self.config.recognized_caller_plan_id.clone();
                let context = Context {
                    route: Some(route),
                    caller: Some(profile),
                    matched_contact: contact,
                };
                Ok(self.materialize(&plan_id, ResolutionOutcome::RecognizedCaller, context).await)
            }
            (None, None) => {
                info!(%destination, "👋 unknown caller without dedicated plan, serving guest welcome");
                let plan_id = self.config.guest_welcome_plan_id.clone();
                Ok(self
                    .materialize(&plan_id, ResolutionOutcome::GuestWelcome, Context::route(route))
                    .await)
            }
        }
    }

    /// Insert a guest route for a destination seen for the first time.
    /// Returns the stored record, which differs from `guest` when another
    /// writer created the route first.
    async fn auto_provision(&self, guest: &RoutingRecord) -> Result<RoutingRecord> {
        let destination = &guest.phone_number;
        info!(%destination, "🆕 no inbound route, auto-provisioning guest route");

        self.store.create_route_if_absent(guest).await.map_err(|e| {
            error!(%destination, error = %e, "auto-provisioning failed");
            DialplanError::internal(format!("auto-provisioning failed for {}: {}", destination, e))
        })
    }

    /// The route's own plan, if it has one that can still be loaded
    async fn active_plan(&self, route: &RoutingRecord) -> Option<Plan> {
        let plan_id = route.active_plan_id.as_deref().filter(|id| !id.is_empty())?;
        match self.store.find_plan(plan_id).await {
            Ok(Some(plan)) => Some(plan),
            Ok(None) => {
                warn!(%plan_id, "active plan referenced by route does not exist, ignoring");
                None
            }
            Err(e) => {
                warn!(%plan_id, error = %e, "active plan lookup failed, ignoring");
                None
            }
        }
    }

    /// Load the selected plan, falling back to the route's failsafe plan
    async fn materialize(&self, plan_id: &str, outcome: ResolutionOutcome, context: Context) -> ResolvedDialplan {
        match self.store.find_plan(plan_id).await {
            Ok(Some(plan)) => Self::response(plan, outcome, context),
            missing => {
                let reason = missing.err().map_or_else(|| "not provisioned".to_string(), |e| e.to_string());
                error!(%plan_id, %reason, "selected plan unavailable, entering failsafe ladder");
                let failsafe_id = Self::route_failsafe(&context);
                self.failsafe_ladder(&failsafe_id, ResolutionOutcome::Failsafe, context).await
            }
        }
    }

    /// One store read for `desired` (the system failsafe when empty), then
    /// the emergency plan.
    async fn failsafe_ladder(&self, desired: &str, outcome: ResolutionOutcome, context: Context) -> ResolvedDialplan {
        let plan_id = if desired.is_empty() {
            self.config.system_failsafe_plan_id.as_str()
        } else {
            desired
        };

        match self.store.find_plan(plan_id).await {
            Ok(Some(plan)) => Self::response(plan, outcome, context),
            missing => {
                let reason = missing.err().map_or_else(|| "not provisioned".to_string(), |e| e.to_string());
                error!(%plan_id, %reason, "🚨 CRITICAL: failsafe dialplan unavailable, serving emergency plan");
                self.emergency(context)
            }
        }
    }

    fn emergency(&self, context: Context) -> ResolvedDialplan {
        Self::response(
            emergency_plan(&self.config.system_tenant_id),
            ResolutionOutcome::Emergency,
            context,
        )
    }

    fn route_failsafe(context: &Context) -> String {
        context
            .route
            .as_ref()
            .and_then(|r| r.failsafe_plan_id.clone())
            .unwrap_or_default()
    }

    /// Routing context used when no real route could be read
    fn system_route(&self, destination: &str) -> RoutingRecord {
        RoutingRecord::guest(
            destination,
            self.config.system_tenant_id.clone(),
            self.config.default_language_code.clone(),
        )
    }

    fn response(plan: Plan, outcome: ResolutionOutcome, context: Context) -> ResolvedDialplan {
        ResolvedDialplan {
            plan_id: plan.id,
            tenant_id: plan.tenant_id,
            action: plan.action,
            action_parameters: plan.action_parameters,
            caller: context.caller,
            matched_contact: context.matched_contact,
            route: context.route,
            outcome,
        }
    }
}

/// The hardcoded last-resort plan. Built without any I/O.
pub fn emergency_plan(system_tenant_id: &str) -> Plan {
    let mut action_parameters = BTreeMap::new();
    action_parameters.insert("announcement_id".to_string(), EMERGENCY_ANNOUNCEMENT_ID.to_string());
    Plan {
        id: EMERGENCY_PLAN_ID.to_string(),
        tenant_id: system_tenant_id.to_string(),
        description: "In-memory emergency plan".to_string(),
        action: EMERGENCY_ACTION.to_string(),
        action_parameters,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_emergency_plan_shape() {
        let plan = emergency_plan("system");
        assert_eq!(plan.id, EMERGENCY_PLAN_ID);
        assert_eq!(plan.tenant_id, "system");
        assert_eq!(plan.action, "PLAY_ANNOUNCEMENT");
        assert_eq!(
            plan.action_parameters.get("announcement_id").map(String::as_str),
            Some("ANNOUNCE_SYSTEM_ERROR")
        );
    }

    #[test]
    fn test_emergency_plan_id_is_not_a_storable_id() {
        assert!(!ResolutionConfig::default().is_reserved_plan(EMERGENCY_PLAN_ID));
    }
}
