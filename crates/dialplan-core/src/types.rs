//! Core types for dialplan-core

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use validator::Validate;

/// Per-destination routing configuration, keyed by canonical phone number.
///
/// Plan references are weak: they are resolved by id at decision time and
/// may point at plans that no longer exist.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct RoutingRecord {
    #[serde(default)]
    pub phone_number: String,
    #[validate(length(min = 1, max = 64))]
    pub tenant_id: String,
    #[serde(default)]
    pub active_plan_id: Option<String>,
    #[serde(default)]
    pub off_hours_plan_id: Option<String>,
    #[serde(default)]
    pub failsafe_plan_id: Option<String>,
    #[serde(default)]
    pub is_maintenance_mode: bool,
    #[validate(length(min = 2, max = 8))]
    pub default_language_code: String,
}

impl RoutingRecord {
    /// Minimal record for a destination nobody has configured yet.
    pub fn guest(phone_number: impl Into<String>, tenant_id: impl Into<String>, language: impl Into<String>) -> Self {
        Self {
            phone_number: phone_number.into(),
            tenant_id: tenant_id.into(),
            active_plan_id: None,
            off_hours_plan_id: None,
            failsafe_plan_id: None,
            is_maintenance_mode: false,
            default_language_code: language.into(),
        }
    }

    /// Empty plan ids carry no meaning; fold them into `None`.
    pub fn normalize_plan_refs(&mut self) {
        for slot in [
            &mut self.active_plan_id,
            &mut self.off_hours_plan_id,
            &mut self.failsafe_plan_id,
        ] {
            if slot.as_deref().map_or(false, |id| id.trim().is_empty()) {
                *slot = None;
            }
        }
    }
}

/// A named, data-driven call handling directive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct Plan {
    #[serde(default)]
    #[validate(custom(function = "crate::validation::validate_plan_id"))]
    pub id: String,
    #[validate(length(min = 1, max = 64))]
    pub tenant_id: String,
    #[serde(default)]
    #[validate(length(max = 512))]
    pub description: String,
    #[validate(length(min = 1, max = 64))]
    pub action: String,
    #[serde(default)]
    pub action_parameters: BTreeMap<String, String>,
}

/// A single way of reaching a caller
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Contact {
    pub contact_type: String,
    pub contact_value: String,
}

/// Identity-service view of a known caller
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallerProfile {
    pub id: String,
    #[serde(default)]
    pub display_name: Option<String>,
    pub tenant_id: String,
    pub user_type: String,
    #[serde(default)]
    pub contacts: Vec<Contact>,
}

impl CallerProfile {
    /// Synthetic profile attached when a number-specific plan serves an
    /// unregistered caller.
    pub fn anonymous(tenant_id: impl Into<String>) -> Self {
        Self {
            id: "anonymous".to_string(),
            display_name: None,
            tenant_id: tenant_id.into(),
            user_type: "guest".to_string(),
            contacts: Vec::new(),
        }
    }

    pub fn is_anonymous(&self) -> bool {
        self.id == "anonymous"
    }
}

/// Which branch of the resolution produced the plan
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolutionOutcome {
    /// The destination's own active plan
    ActivePlan,
    /// Known caller on a number without a dedicated plan
    RecognizedCaller,
    /// Unknown caller on a number without a dedicated plan
    GuestWelcome,
    /// First call to an unknown destination; a guest record was created
    AutoProvisioned,
    /// Destination is flagged for maintenance
    Maintenance,
    /// The routing table does not exist
    TableMissing,
    /// The selected plan could not be loaded; failsafe plan served instead
    Failsafe,
    /// Nothing could be loaded; the in-memory emergency plan was served
    Emergency,
}

/// Result of a dialplan resolution
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolvedDialplan {
    pub plan_id: String,
    pub tenant_id: String,
    pub action: String,
    pub action_parameters: BTreeMap<String, String>,
    pub caller: Option<CallerProfile>,
    pub matched_contact: Option<Contact>,
    pub route: Option<RoutingRecord>,
    pub outcome: ResolutionOutcome,
}

/// Input of the resolution operation
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResolveRequest {
    pub caller: String,
    pub destination: String,
    #[serde(default)]
    pub trace_id: Option<String>,
}

impl ResolveRequest {
    pub fn new(caller: impl Into<String>, destination: impl Into<String>) -> Self {
        Self {
            caller: caller.into(),
            destination: destination.into(),
            trace_id: None,
        }
    }

    pub fn with_trace_id(mut self, trace_id: impl Into<String>) -> Self {
        self.trace_id = Some(trace_id.into());
        self
    }
}

/// Tenant-scoped pagination request for the admin listings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ListRequest {
    #[serde(default)]
    pub tenant_id: Option<String>,
    #[serde(default)]
    pub page: i64,
    #[serde(default)]
    pub page_size: i64,
}

/// One page of a listing
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total_count: u64,
    pub page: u32,
    pub page_size: u32,
}
