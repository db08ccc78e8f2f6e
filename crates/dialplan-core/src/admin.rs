//! Administrative operations over inbound routes and dialplans
//!
//! Thin layer between the REST surface and the store: canonicalizes phone
//! keys, validates input and turns row counts into `NotFound`.

use std::sync::Arc;

use tracing::{info, warn};

use crate::config::ResolutionConfig;
use crate::identity::IdentityCache;
use crate::normalize::{is_dialable, PhoneNormalizer};
use crate::store::DialplanStore;
use crate::validation::{validate_plan, validate_route};
use crate::{DialplanError, ListRequest, Page, Plan, Result, RoutingRecord};

/// Page size used when the request does not specify one
pub const DEFAULT_PAGE_SIZE: u32 = 10;

/// Largest page a listing will return
pub const MAX_PAGE_SIZE: u32 = 100;

/// CRUD service for routes and plans
#[derive(Clone)]
pub struct AdminService {
    store: Arc<dyn DialplanStore>,
    normalizer: PhoneNormalizer,
    config: ResolutionConfig,
    identity_cache: Option<Arc<dyn IdentityCache>>,
}

impl AdminService {
    pub fn new(store: Arc<dyn DialplanStore>, config: ResolutionConfig) -> Self {
        Self {
            store,
            normalizer: config.normalizer(),
            config,
            identity_cache: None,
        }
    }

    /// Attach the identity cache so that cached caller profiles can be evicted
    pub fn with_identity_cache(mut self, cache: Arc<dyn IdentityCache>) -> Self {
        self.identity_cache = Some(cache);
        self
    }

    // ---- inbound routes ----

    pub async fn create_route(&self, mut route: RoutingRecord) -> Result<RoutingRecord> {
        self.prepare_route(&mut route)?;
        self.store.create_route(&route).await.map_err(|e| match e {
            DialplanError::Conflict(_) => {
                DialplanError::conflict(format!("inbound route {} already exists", route.phone_number))
            }
            other => other,
        })?;
        info!(phone = %route.phone_number, tenant = %route.tenant_id, "✅ inbound route created");
        Ok(route)
    }

    pub async fn get_route(&self, phone_number: &str) -> Result<RoutingRecord> {
        let key = self.canonical_phone(phone_number)?;
        self.store
            .find_route(&key)
            .await?
            .ok_or_else(|| DialplanError::not_found(format!("inbound route {}", key)))
    }

    pub async fn update_route(&self, mut route: RoutingRecord) -> Result<RoutingRecord> {
        self.prepare_route(&mut route)?;
        if self.store.update_route(&route).await? == 0 {
            return Err(DialplanError::not_found(format!("inbound route {}", route.phone_number)));
        }
        info!(phone = %route.phone_number, "inbound route updated");
        Ok(route)
    }

    /// Deleting a route that does not exist succeeds
    pub async fn delete_route(&self, phone_number: &str) -> Result<()> {
        let key = self.canonical_phone(phone_number)?;
        let deleted = self.store.delete_route(&key).await?;
        info!(phone = %key, deleted, "inbound route deleted");
        Ok(())
    }

    pub async fn list_routes(&self, request: &ListRequest) -> Result<Page<RoutingRecord>> {
        let (page, page_size) = page_bounds(request);
        let tenant = request.tenant_id.as_deref();
        let offset = (page - 1).saturating_mul(page_size);

        let items = self.store.list_routes(tenant, page_size, offset).await?;
        let total_count = self.store.count_routes(tenant).await?;
        Ok(Page {
            items,
            total_count,
            page,
            page_size,
        })
    }

    // ---- dialplans ----

    pub async fn create_plan(&self, plan: Plan) -> Result<Plan> {
        validate_plan(&plan)?;
        self.store.create_plan(&plan).await.map_err(|e| match e {
            DialplanError::Conflict(_) => DialplanError::conflict(format!("dialplan {} already exists", plan.id)),
            other => other,
        })?;
        info!(plan_id = %plan.id, tenant = %plan.tenant_id, action = %plan.action, "✅ dialplan created");
        Ok(plan)
    }

    pub async fn get_plan(&self, id: &str) -> Result<Plan> {
        self.store
            .find_plan(id)
            .await?
            .ok_or_else(|| DialplanError::not_found(format!("dialplan {}", id)))
    }

    pub async fn update_plan(&self, plan: Plan) -> Result<Plan> {
        validate_plan(&plan)?;
        if self.store.update_plan(&plan).await? == 0 {
            return Err(DialplanError::not_found(format!("dialplan {}", plan.id)));
        }
        info!(plan_id = %plan.id, "dialplan updated");
        Ok(plan)
    }

    /// Reserved plans cannot be deleted; deleting an unknown plan succeeds
    pub async fn delete_plan(&self, id: &str) -> Result<()> {
        if self.config.is_reserved_plan(id) {
            warn!(plan_id = %id, "refusing to delete reserved dialplan");
            return Err(DialplanError::invalid(format!("dialplan {} is reserved and cannot be deleted", id)));
        }
        let deleted = self.store.delete_plan(id).await?;
        info!(plan_id = %id, deleted, "dialplan deleted");
        Ok(())
    }

    pub async fn list_plans(&self, request: &ListRequest) -> Result<Page<Plan>> {
        let (page, page_size) = page_bounds(request);
        let tenant = request.tenant_id.as_deref();
        let offset = (page - 1).saturating_mul(page_size);

        let items = self.store.list_plans(tenant, page_size, offset).await?;
        let total_count = self.store.count_plans(tenant).await?;
        Ok(Page {
            items,
            total_count,
            page,
            page_size,
        })
    }

    // ---- identity cache ----

    /// Evict the cached profile of a caller so the next call re-queries the
    /// identity service.
    pub async fn invalidate_caller(&self, phone_number: &str) -> Result<()> {
        let key = self.canonical_phone(phone_number)?;
        match &self.identity_cache {
            Some(cache) => {
                cache.invalidate(&key).await?;
                info!(phone = %key, "caller profile evicted from identity cache");
            }
            None => warn!(phone = %key, "no identity cache configured, nothing to evict"),
        }
        Ok(())
    }

    fn canonical_phone(&self, raw: &str) -> Result<String> {
        let key = self.normalizer.normalize(raw);
        if !is_dialable(&key) {
            return Err(DialplanError::invalid(format!("'{}' is not a dialable number", raw)));
        }
        Ok(key)
    }

    fn prepare_route(&self, route: &mut RoutingRecord) -> Result<()> {
        route.phone_number = self.canonical_phone(&route.phone_number)?;
        route.normalize_plan_refs();
        validate_route(route)
    }
}

/// Clamp a listing request to a usable page and page size
fn page_bounds(request: &ListRequest) -> (u32, u32) {
    let page = if request.page < 1 {
        1
    } else {
        u32::try_from(request.page).unwrap_or(u32::MAX)
    };
    let page_size = if request.page_size < 1 {
        DEFAULT_PAGE_SIZE
    } else {
        request.page_size.min(MAX_PAGE_SIZE as i64) as u32
    };
    (page, page_size)
}
