//! Persistent storage for inbound routes and dialplans
//!
//! [`DialplanStore`] is the only way the engine and the admin service touch
//! persisted data. Implementations must keep the following outcomes apart:
//!
//! - `Ok(None)` from a `find_*` call: the record does not exist
//! - [`DialplanError::Conflict`]: duplicate key on insert
//! - [`DialplanError::BackingTableMissing`]: the schema is not provisioned
//! - [`DialplanError::BackingStoreUnavailable`]: anything else
//!
//! Stores never apply fallback policy; the resolution engine owns it.
//!
//! [`DialplanError::Conflict`]: crate::DialplanError::Conflict
//! [`DialplanError::BackingTableMissing`]: crate::DialplanError::BackingTableMissing
//! [`DialplanError::BackingStoreUnavailable`]: crate::DialplanError::BackingStoreUnavailable

pub mod memory;
pub mod postgres;

use std::collections::BTreeMap;

use async_trait::async_trait;

use crate::config::ResolutionConfig;
use crate::{Plan, Result, RoutingRecord};

pub use memory::InMemoryDialplanStore;
pub use postgres::PostgresDialplanStore;

/// Storage trait for inbound routes and dialplans
#[async_trait]
pub trait DialplanStore: Send + Sync {
    /// Look up the route for a canonical phone number
    async fn find_route(&self, phone_number: &str) -> Result<Option<RoutingRecord>>;

    /// Insert a new route; fails with `Conflict` when the number is taken
    async fn create_route(&self, route: &RoutingRecord) -> Result<()>;

    /// Insert the route unless one already exists for the number, and
    /// return whichever record is stored afterwards. Safe under concurrent
    /// callers racing on the same number.
    async fn create_route_if_absent(&self, route: &RoutingRecord) -> Result<RoutingRecord>;

    /// Returns the number of rows updated
    async fn update_route(&self, route: &RoutingRecord) -> Result<u64>;

    /// Returns the number of rows deleted
    async fn delete_route(&self, phone_number: &str) -> Result<u64>;

    async fn list_routes(&self, tenant_id: Option<&str>, limit: u32, offset: u32) -> Result<Vec<RoutingRecord>>;

    async fn count_routes(&self, tenant_id: Option<&str>) -> Result<u64>;

    /// Look up a dialplan by id
    async fn find_plan(&self, id: &str) -> Result<Option<Plan>>;

    /// Insert a new plan; fails with `Conflict` when the id is taken
    async fn create_plan(&self, plan: &Plan) -> Result<()>;

    /// Returns the number of rows updated
    async fn update_plan(&self, plan: &Plan) -> Result<u64>;

    /// Returns the number of rows deleted
    async fn delete_plan(&self, id: &str) -> Result<u64>;

    async fn list_plans(&self, tenant_id: Option<&str>, limit: u32, offset: u32) -> Result<Vec<Plan>>;

    async fn count_plans(&self, tenant_id: Option<&str>) -> Result<u64>;

    /// Cheap liveness check
    async fn health_check(&self) -> Result<()>;
}

/// Plans the engine refers to by id and therefore expects to exist in every
/// deployment.
pub fn reserved_plans(config: &ResolutionConfig) -> Vec<Plan> {
    let system = config.system_tenant_id.clone();
    let plan = |id: &str, description: &str, action: &str, params: &[(&str, &str)]| Plan {
        id: id.to_string(),
        tenant_id: system.clone(),
        description: description.to_string(),
        action: action.to_string(),
        action_parameters: params
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect::<BTreeMap<_, _>>(),
    };

    vec![
        plan(
            &config.system_failsafe_plan_id,
            "System failsafe announcement",
            "PLAY_ANNOUNCEMENT",
            &[("announcement_id", "ANNOUNCE_SYSTEM_FAILSAFE")],
        ),
        plan(
            &config.guest_welcome_plan_id,
            "Welcome flow for unregistered callers",
            "PROCESS_GUEST_CALL",
            &[("announcement_id", "ANNOUNCE_GUEST_WELCOME")],
        ),
        plan(
            &config.recognized_caller_plan_id,
            "Default flow for registered callers without a dedicated plan",
            "START_AI_CONVERSATION",
            &[],
        ),
    ]
}

/// An empty tenant filter lists every tenant
pub(crate) fn tenant_filter(tenant_id: Option<&str>) -> Option<&str> {
    tenant_id.filter(|t| !t.is_empty())
}
