//! In-memory dialplan store
//!
//! Backs local development, the `--in-memory` service mode and the test
//! suites. Besides plain storage it can simulate the failure modes of a real
//! database so the engine's fallback paths can be exercised.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use dashmap::{DashMap, DashSet};
use tracing::debug;

use super::{reserved_plans, tenant_filter, DialplanStore};
use crate::config::ResolutionConfig;
use crate::{DialplanError, Plan, Result, RoutingRecord};

/// DashMap-backed store
#[derive(Clone, Default)]
pub struct InMemoryDialplanStore {
    routes: Arc<DashMap<String, RoutingRecord>>,
    plans: Arc<DashMap<String, Plan>>,
    faults: Arc<Faults>,
}

#[derive(Default)]
struct Faults {
    unavailable: AtomicBool,
    routes_table_missing: AtomicBool,
    route_writes_fail: AtomicBool,
    stale_route_reads: AtomicBool,
    all_plans_fail: AtomicBool,
    failing_plans: DashSet<String>,
    latency_ms: AtomicU64,
}

impl InMemoryDialplanStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store pre-seeded with the reserved system plans
    pub fn with_reserved_plans(config: &ResolutionConfig) -> Self {
        let store = Self::new();
        for plan in reserved_plans(config) {
            store.plans.insert(plan.id.clone(), plan);
        }
        store
    }

    /// Every operation fails as if the database were down
    pub fn set_unavailable(&self, unavailable: bool) {
        self.faults.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Route reads fail as if the `inbound_routes` table did not exist
    pub fn set_routes_table_missing(&self, missing: bool) {
        self.faults.routes_table_missing.store(missing, Ordering::SeqCst);
    }

    /// Route inserts fail
    pub fn set_route_writes_fail(&self, fail: bool) {
        self.faults.route_writes_fail.store(fail, Ordering::SeqCst);
    }

    /// Route reads miss as if concurrent inserts were not visible yet
    pub fn set_stale_route_reads(&self, stale: bool) {
        self.faults.stale_route_reads.store(stale, Ordering::SeqCst);
    }

    /// Every plan read fails
    pub fn set_all_plans_fail(&self, fail: bool) {
        self.faults.all_plans_fail.store(fail, Ordering::SeqCst);
    }

    /// Reads of one specific plan fail
    pub fn fail_plan(&self, id: impl Into<String>) {
        self.faults.failing_plans.insert(id.into());
    }

    /// Delay added to every route and plan read
    pub fn set_latency(&self, latency: Duration) {
        self.faults.latency_ms.store(latency.as_millis() as u64, Ordering::SeqCst);
    }

    fn check_available(&self) -> Result<()> {
        if self.faults.unavailable.load(Ordering::SeqCst) {
            return Err(DialplanError::unavailable("connection refused"));
        }
        Ok(())
    }

    async fn simulate_latency(&self) {
        let ms = self.faults.latency_ms.load(Ordering::SeqCst);
        if ms > 0 {
            tokio::time::sleep(Duration::from_millis(ms)).await;
        }
    }

    fn page<T: Clone>(mut items: Vec<(String, T)>, limit: u32, offset: u32) -> Vec<T> {
        items.sort_by(|a, b| a.0.cmp(&b.0));
        items
            .into_iter()
            .skip(offset as usize)
            .take(limit as usize)
            .map(|(_, v)| v)
            .collect()
    }
}

#[async_trait]
impl DialplanStore for InMemoryDialplanStore {
    async fn find_route(&self, phone_number: &str) -> Result<Option<RoutingRecord>> {
        self.simulate_latency().await;
        self.check_available()?;
        if self.faults.routes_table_missing.load(Ordering::SeqCst) {
            return Err(DialplanError::BackingTableMissing(
                "relation \"inbound_routes\" does not exist".to_string(),
            ));
        }
        if self.faults.stale_route_reads.load(Ordering::SeqCst) {
            return Ok(None);
        }
        Ok(self.routes.get(phone_number).map(|r| r.clone()))
    }

    async fn create_route(&self, route: &RoutingRecord) -> Result<()> {
        self.check_available()?;
        if self.faults.route_writes_fail.load(Ordering::SeqCst) {
            return Err(DialplanError::unavailable("insert into inbound_routes failed"));
        }
        match self.routes.entry(route.phone_number.clone()) {
            dashmap::mapref::entry::Entry::Occupied(_) => Err(DialplanError::conflict(format!(
                "inbound route already exists: {}",
                route.phone_number
            ))),
            dashmap::mapref::entry::Entry::Vacant(slot) => {
                slot.insert(route.clone());
                Ok(())
            }
        }
    }

    async fn create_route_if_absent(&self, route: &RoutingRecord) -> Result<RoutingRecord> {
        self.check_available()?;
        if self.faults.route_writes_fail.load(Ordering::SeqCst) {
            return Err(DialplanError::unavailable("insert into inbound_routes failed"));
        }
        let stored = self
            .routes
            .entry(route.phone_number.clone())
            .or_insert_with(|| route.clone())
            .clone();
        debug!(phone_number = %stored.phone_number, "inbound route ensured");
        Ok(stored)
    }

    async fn update_route(&self, route: &RoutingRecord) -> Result<u64> {
        self.check_available()?;
        match self.routes.get_mut(&route.phone_number) {
            Some(mut existing) => {
                *existing = route.clone();
                Ok(1)
            }
            None => Ok(0),
        }
    }

    async fn delete_route(&self, phone_number: &str) -> Result<u64> {
        self.check_available()?;
        Ok(self.routes.remove(phone_number).map_or(0, |_| 1))
    }

    async fn list_routes(&self, tenant_id: Option<&str>, limit: u32, offset: u32) -> Result<Vec<RoutingRecord>> {
        self.check_available()?;
        let tenant = tenant_filter(tenant_id);
        let items: Vec<(String, RoutingRecord)> = self
            .routes
            .iter()
            .filter(|r| tenant.map_or(true, |t| r.tenant_id == t))
            .map(|r| (r.key().clone(), r.value().clone()))
            .collect();
        Ok(Self::page(items, limit, offset))
    }

    async fn count_routes(&self, tenant_id: Option<&str>) -> Result<u64> {
        self.check_available()?;
        let tenant = tenant_filter(tenant_id);
        Ok(self
            .routes
            .iter()
            .filter(|r| tenant.map_or(true, |t| r.tenant_id == t))
            .count() as u64)
    }

    async fn find_plan(&self, id: &str) -> Result<Option<Plan>> {
        self.simulate_latency().await;
        self.check_available()?;
        if self.faults.all_plans_fail.load(Ordering::SeqCst) || self.faults.failing_plans.contains(id) {
            return Err(DialplanError::unavailable(format!("query for dialplan {} failed", id)));
        }
        Ok(self.plans.get(id).map(|p| p.clone()))
    }

    async fn create_plan(&self, plan: &Plan) -> Result<()> {
        self.check_available()?;
        match self.plans.entry(plan.id.clone()) {
            dashmap::mapref::entry::Entry::Occupied(_) => {
                Err(DialplanError::conflict(format!("dialplan already exists: {}", plan.id)))
            }
            dashmap::mapref::entry::Entry::Vacant(slot) => {
                slot.insert(plan.clone());
                Ok(())
            }
        }
    }

    async fn update_plan(&self, plan: &Plan) -> Result<u64> {
        self.check_available()?;
        match self.plans.get_mut(&plan.id) {
            Some(mut existing) => {
                *existing = plan.clone();
                Ok(1)
            }
            None => Ok(0),
        }
    }

    async fn delete_plan(&self, id: &str) -> Result<u64> {
        self.check_available()?;
        Ok(self.plans.remove(id).map_or(0, |_| 1))
    }

    async fn list_plans(&self, tenant_id: Option<&str>, limit: u32, offset: u32) -> Result<Vec<Plan>> {
        self.check_available()?;
        let tenant = tenant_filter(tenant_id);
        let items: Vec<(String, Plan)> = self
            .plans
            .iter()
            .filter(|p| tenant.map_or(true, |t| p.tenant_id == t))
            .map(|p| (p.key().clone(), p.value().clone()))
            .collect();
        Ok(Self::page(items, limit, offset))
    }

    async fn count_plans(&self, tenant_id: Option<&str>) -> Result<u64> {
        self.check_available()?;
        let tenant = tenant_filter(tenant_id);
        Ok(self
            .plans
            .iter()
            .filter(|p| tenant.map_or(true, |t| p.tenant_id == t))
            .count() as u64)
    }

    async fn health_check(&self) -> Result<()> {
        self.check_available()
    }
}
