//! Input validation for administrative writes

use once_cell::sync::Lazy;
use regex::Regex;
use validator::{Validate, ValidationError};

use crate::engine::EMERGENCY_PLAN_ID;
use crate::{DialplanError, Plan, Result, RoutingRecord};

// Plan ids are short upper-case mnemonics such as DP_GUEST_ENTRY
static PLAN_ID_REGEX: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[A-Z0-9_]{1,64}$").unwrap());

/// Validate plan id format. The emergency plan id is never a stored id.
pub fn validate_plan_id(id: &str) -> std::result::Result<(), ValidationError> {
    if id == EMERGENCY_PLAN_ID {
        Err(ValidationError::new("reserved_emergency_plan_id"))
    } else if PLAN_ID_REGEX.is_match(id) {
        Ok(())
    } else {
        Err(ValidationError::new("invalid_plan_id_format"))
    }
}

/// Validate a plan before it is written
pub fn validate_plan(plan: &Plan) -> Result<()> {
    plan.validate()
        .map_err(|e| DialplanError::invalid(format!("invalid dialplan '{}': {}", plan.id, e)))?;

    if plan.action_parameters.keys().any(|k| k.trim().is_empty()) {
        return Err(DialplanError::invalid(format!(
            "invalid dialplan '{}': action parameter names must not be empty",
            plan.id
        )));
    }
    Ok(())
}

/// Validate a routing record before it is written. The phone number is
/// expected to be canonical already.
pub fn validate_route(route: &RoutingRecord) -> Result<()> {
    route.validate().map_err(|e| {
        DialplanError::invalid(format!("invalid inbound route '{}': {}", route.phone_number, e))
    })?;

    if route.phone_number.is_empty() || !route.phone_number.bytes().all(|b| b.is_ascii_digit()) {
        return Err(DialplanError::invalid(format!(
            "invalid inbound route: '{}' is not a dialable number",
            route.phone_number
        )));
    }

    for id in [&route.active_plan_id, &route.off_hours_plan_id, &route.failsafe_plan_id]
        .into_iter()
        .flatten()
    {
        validate_plan_id(id).map_err(|_| {
            DialplanError::invalid(format!(
                "invalid inbound route '{}': bad plan reference '{}'",
                route.phone_number, id
            ))
        })?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn plan(id: &str, action: &str) -> Plan {
        Plan {
            id: id.to_string(),
            tenant_id: "acme".to_string(),
            description: String::new(),
            action: action.to_string(),
            action_parameters: BTreeMap::new(),
        }
    }

    #[test]
    fn test_plan_id_format() {
        assert!(validate_plan_id("DP_GUEST_ENTRY").is_ok());
        assert!(validate_plan_id("DP_ACME_01").is_ok());
        assert!(validate_plan_id("").is_err());
        assert!(validate_plan_id("dp-lower").is_err());
        assert!(validate_plan_id("DP SPACE").is_err());
    }

    #[test]
    fn test_emergency_plan_id_is_not_storable() {
        assert!(validate_plan_id(EMERGENCY_PLAN_ID).is_err());

        let err = validate_plan(&plan(EMERGENCY_PLAN_ID, "PLAY_ANNOUNCEMENT")).unwrap_err();
        assert!(matches!(err, DialplanError::InvalidArgument(_)));

        let mut route = RoutingRecord::guest("905551234567", "acme", "tr");
        route.failsafe_plan_id = Some(EMERGENCY_PLAN_ID.to_string());
        assert!(validate_route(&route).is_err());
    }

    #[test]
    fn test_plan_requires_action() {
        assert!(validate_plan(&plan("DP_ACME", "ROUTE_TO_AGENT")).is_ok());

        let err = validate_plan(&plan("DP_ACME", "")).unwrap_err();
        assert!(matches!(err, DialplanError::InvalidArgument(_)));
    }

    #[test]
    fn test_plan_rejects_blank_parameter_names() {
        let mut p = plan("DP_ACME", "PLAY_ANNOUNCEMENT");
        p.action_parameters.insert(" ".to_string(), "x".to_string());
        assert!(validate_plan(&p).is_err());
    }

    #[test]
    fn test_route_requires_digits() {
        let mut route = RoutingRecord::guest("905551234567", "acme", "tr");
        assert!(validate_route(&route).is_ok());

        route.phone_number = "sip:bob@example.com".to_string();
        assert!(validate_route(&route).is_err());
    }

    #[test]
    fn test_route_rejects_bad_plan_reference() {
        let mut route = RoutingRecord::guest("905551234567", "acme", "tr");
        route.active_plan_id = Some("not a plan".to_string());
        assert!(validate_route(&route).is_err());
    }
}
