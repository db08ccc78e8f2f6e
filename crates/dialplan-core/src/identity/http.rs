//! HTTP client for the user/identity service

use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Deserialize;
use tracing::debug;

use super::{IdentityLookup, PHONE_CONTACT_TYPE, TRACE_ID_HEADER};
use crate::{CallerProfile, DialplanError, Result};

#[derive(Debug, Deserialize)]
struct FindUserResponse {
    user: CallerProfile,
}

/// Identity lookup over the identity service's REST API
#[derive(Clone)]
pub struct HttpIdentityClient {
    client: reqwest::Client,
    base_url: String,
}

impl HttpIdentityClient {
    pub fn new(base_url: impl Into<String>, request_timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(request_timeout)
            .connect_timeout(request_timeout)
            .build()
            .map_err(|e| DialplanError::config(format!("failed to build identity client: {}", e)))?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl IdentityLookup for HttpIdentityClient {
    async fn find_by_phone(&self, phone_number: &str, trace_id: &str) -> Result<Option<CallerProfile>> {
        let url = format!("{}/api/v1/users/by-contact", self.base_url);
        debug!(%url, phone = %phone_number, "querying identity service");

        let response = self
            .client
            .get(&url)
            .query(&[("contact_type", PHONE_CONTACT_TYPE), ("contact_value", phone_number)])
            .header(TRACE_ID_HEADER, trace_id)
            .send()
            .await
            .map_err(|e| DialplanError::upstream(format!("identity request failed: {}", e)))?;

        match response.status() {
            StatusCode::NOT_FOUND => Ok(None),
            status if status.is_success() => {
                let body: FindUserResponse = response
                    .json()
                    .await
                    .map_err(|e| DialplanError::upstream(format!("invalid identity response: {}", e)))?;
                Ok(Some(body.user))
            }
            status => Err(DialplanError::upstream(format!("identity service returned {}", status))),
        }
    }
}
