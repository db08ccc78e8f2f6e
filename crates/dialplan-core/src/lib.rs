//! # Dialplan-Core
//!
//! Inbound dialplan resolution for RVoIP.
//!
//! Given the caller and destination of a new call leg, the engine decides
//! which dialplan (a named action plus parameters) should handle the call.
//!
//! This crate provides:
//! - Phone number canonicalization for SIP URIs and national formats
//! - Route and dialplan storage in PostgreSQL (plus an in-memory store)
//! - Caller identification through the identity service with a TTL cache
//! - The resolution engine with its failsafe ladder and emergency plan
//! - Administrative CRUD and a REST API
//!
//! ## Architecture
//!
//! The engine never fails a call because personalization is unavailable:
//! identity problems degrade to "unknown caller", and plan lookup problems
//! degrade through the route's failsafe plan, the system failsafe plan and
//! finally an in-memory emergency plan.

pub mod admin;
pub mod api;
pub mod config;
pub mod engine;
pub mod error;
pub mod identity;
pub mod logging;
pub mod normalize;
pub mod store;
pub mod types;
pub mod validation;

use std::sync::Arc;

pub use admin::AdminService;
pub use config::{DialplanConfig, ResolutionConfig};
pub use engine::{emergency_plan, ResolutionEngine};
pub use error::{DialplanError, Result};
pub use identity::{IdentityCache, IdentityLookup, IdentityResolver, MokaIdentityCache};
pub use normalize::PhoneNormalizer;
pub use store::{DialplanStore, InMemoryDialplanStore, PostgresDialplanStore};
pub use types::{
    CallerProfile, Contact, ListRequest, Page, Plan, ResolutionOutcome, ResolveRequest, ResolvedDialplan,
    RoutingRecord,
};

pub mod prelude {
    pub use crate::{
        AdminService, CallerProfile, Contact, DialplanConfig, DialplanError, DialplanStore, IdentityCache,
        IdentityLookup, IdentityResolver, InMemoryDialplanStore, ListRequest, MokaIdentityCache, Page, Plan,
        ResolutionConfig, ResolutionEngine, ResolutionOutcome, ResolveRequest, ResolvedDialplan, Result,
        RoutingRecord,
    };
}

/// Wire the engine, admin service and HTTP state on top of a store and an
/// identity lookup, using the cache settings from `config`.
pub fn init(config: &DialplanConfig, store: Arc<dyn DialplanStore>, lookup: Arc<dyn IdentityLookup>) -> api::AppState {
    let cache: Arc<dyn IdentityCache> = Arc::new(MokaIdentityCache::new(
        config.identity_cache_ttl(),
        config.identity_cache_capacity,
    ));
    let resolver = IdentityResolver::new(lookup, cache.clone(), config.identity_timeout());

    let engine = Arc::new(ResolutionEngine::new(store.clone(), resolver, config.resolution.clone()));
    let admin = Arc::new(AdminService::new(store.clone(), config.resolution.clone()).with_identity_cache(cache));

    api::AppState::new(engine, admin, store)
}
