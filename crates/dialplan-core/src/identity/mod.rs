//! Caller identification
//!
//! The resolver answers one question: who is calling, if anybody we know?
//! It never fails. A cache miss falls through to the remote identity
//! service, and every remote problem (not found, timeout, outage) collapses
//! into "no profile" so that call routing only loses personalization.
//!
//! ```text
//!  canonical caller
//!        │
//!  ┌─────▼─────┐ hit
//!  │   cache   ├──────────────► profile
//!  └─────┬─────┘
//!        │ miss / error
//!  ┌─────▼─────┐ found  ┌──────────────┐
//!  │  remote   ├───────►│ cache.set()  ├──► profile
//!  │ (timeout) │        └──────────────┘
//!  └─────┬─────┘
//!        │ not found / timeout / failure
//!        ▼
//!      None
//! ```

pub mod cache;
#[cfg(feature = "client")]
pub mod http;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, info, warn};

use crate::normalize::PhoneNormalizer;
use crate::{CallerProfile, Contact, Result};

pub use cache::{CacheLookup, IdentityCache, MokaIdentityCache};
#[cfg(feature = "client")]
pub use http::HttpIdentityClient;

/// Contact type the identity service uses for phone numbers
pub const PHONE_CONTACT_TYPE: &str = "phone";

/// Header carrying the call-leg trace id across services
pub const TRACE_ID_HEADER: &str = "x-trace-id";

/// Remote identity service
#[async_trait]
pub trait IdentityLookup: Send + Sync {
    /// Find the profile owning a canonical phone number. `Ok(None)` means
    /// the number is not registered.
    async fn find_by_phone(&self, phone_number: &str, trace_id: &str) -> Result<Option<CallerProfile>>;
}

/// Cache-backed, failure-absorbing identity resolution
#[derive(Clone)]
pub struct IdentityResolver {
    lookup: Arc<dyn IdentityLookup>,
    cache: Arc<dyn IdentityCache>,
    timeout: Duration,
}

impl IdentityResolver {
    pub fn new(lookup: Arc<dyn IdentityLookup>, cache: Arc<dyn IdentityCache>, timeout: Duration) -> Self {
        Self { lookup, cache, timeout }
    }

    /// Resolve a canonical caller number to a profile.
    ///
    /// The remote call is bounded by the resolver's own timeout no matter
    /// how much of the caller's deadline is left.
    pub async fn resolve(&self, phone_number: &str, trace_id: &str) -> Option<CallerProfile> {
        match self.cache.get(phone_number).await {
            CacheLookup::Hit(profile) => {
                debug!(phone = %phone_number, user_id = %profile.id, "✅ identity cache hit");
                return Some(profile);
            }
            CacheLookup::Miss => {
                debug!(phone = %phone_number, "identity cache miss");
            }
            CacheLookup::Error(e) => {
                warn!(phone = %phone_number, error = %e, "identity cache read failed, treating as miss");
            }
        }

        let remote = tokio::time::timeout(self.timeout, self.lookup.find_by_phone(phone_number, trace_id)).await;
        let profile = match remote {
            Ok(Ok(Some(profile))) => profile,
            Ok(Ok(None)) => {
                info!(phone = %phone_number, "caller not registered");
                return None;
            }
            Ok(Err(e)) => {
                warn!(phone = %phone_number, error = %e, "identity service failed, continuing without caller profile");
                return None;
            }
            Err(_) => {
                warn!(
                    phone = %phone_number,
                    timeout_ms = self.timeout.as_millis() as u64,
                    "identity lookup timed out, continuing without caller profile"
                );
                return None;
            }
        };

        if let Err(e) = self.cache.set(phone_number, &profile).await {
            warn!(phone = %phone_number, error = %e, "failed to cache caller profile");
        }
        Some(profile)
    }
}

/// Pick the profile's phone contact that matches the canonical caller number
pub fn matched_contact(profile: &CallerProfile, canonical_caller: &str, normalizer: &PhoneNormalizer) -> Option<Contact> {
    profile
        .contacts
        .iter()
        .find(|c| {
            c.contact_type.eq_ignore_ascii_case(PHONE_CONTACT_TYPE)
                && normalizer.normalize(&c.contact_value) == canonical_caller
        })
        .cloned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_matched_contact_compares_canonical_forms() {
        let profile = CallerProfile {
            id: "user-1".to_string(),
            display_name: None,
            tenant_id: "acme".to_string(),
            user_type: "customer".to_string(),
            contacts: vec![
                Contact { contact_type: "email".to_string(), contact_value: "a@b.c".to_string() },
                Contact { contact_type: "phone".to_string(), contact_value: "0555 123 45 67".to_string() },
            ],
        };
        let normalizer = PhoneNormalizer::default();

        let contact = matched_contact(&profile, "905551234567", &normalizer).unwrap();
        assert_eq!(contact.contact_value, "0555 123 45 67");
        assert!(matched_contact(&profile, "905559999999", &normalizer).is_none());
    }
}
