//! Client for the server-side identity lookup endpoint.
//!
//! Given an email or phone number the endpoint returns organizational
//! identity data, or a 403-style rejection. Its internal lookup logic is
//! somebody else's problem; this client only speaks the wire contract.

use serde::{Deserialize, Serialize};
use tracing::{debug, instrument, warn};
use url::Url;

/// Organizational identity returned by the lookup endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct IdentityRecord {
    /// Stable organizational identifier.
    pub uid: String,
    /// Email address.
    pub email: String,
    /// Display name.
    pub display_name: String,
    /// Organizational role.
    pub role: String,
}

/// Errors from the identity lookup endpoint.
#[derive(Debug, thiserror::Error)]
pub enum LookupError {
    /// The endpoint rejected the lookup (403-style).
    #[error("identity lookup rejected for {query}")]
    Rejected {
        /// The query that was rejected (email or phone number).
        query: String,
    },

    /// Any other non-success HTTP status.
    #[error("identity lookup failed with HTTP {status}")]
    HttpStatus {
        /// The HTTP status code.
        status: u16,
    },

    /// Network-level or decoding failure.
    #[error("identity lookup request failed: {0}")]
    Network(#[from] reqwest::Error),
}

#[derive(Serialize)]
struct LookupRequest<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    email: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    phone_number: Option<&'a str>,
}

/// HTTP client for the identity lookup endpoint.
#[derive(Debug, Clone)]
pub struct IdentityClient {
    client: reqwest::Client,
    endpoint: Url,
}

impl IdentityClient {
    /// Creates a client against `endpoint`.
    #[must_use]
    pub fn new(endpoint: Url) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint,
        }
    }

    /// Looks up identity data by email address.
    ///
    /// # Errors
    ///
    /// Returns [`LookupError::Rejected`] on a 403 response,
    /// [`LookupError::HttpStatus`] on other non-success statuses, and
    /// [`LookupError::Network`] on transport or decoding failures.
    pub async fn lookup_email(&self, email: &str) -> Result<IdentityRecord, LookupError> {
        self.lookup(
            LookupRequest {
                email: Some(email),
                phone_number: None,
            },
            email,
        )
        .await
    }

    /// Looks up identity data by phone number.
    ///
    /// # Errors
    ///
    /// Same error behavior as [`IdentityClient::lookup_email`].
    pub async fn lookup_phone(&self, phone_number: &str) -> Result<IdentityRecord, LookupError> {
        self.lookup(
            LookupRequest {
                email: None,
                phone_number: Some(phone_number),
            },
            phone_number,
        )
        .await
    }

    #[instrument(level = "debug", skip(self, request))]
    async fn lookup(
        &self,
        request: LookupRequest<'_>,
        query: &str,
    ) -> Result<IdentityRecord, LookupError> {
        let response = self
            .client
            .post(self.endpoint.clone())
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if status == reqwest::StatusCode::FORBIDDEN {
            warn!(query, "identity lookup rejected");
            return Err(LookupError::Rejected {
                query: query.to_string(),
            });
        }
        if !status.is_success() {
            return Err(LookupError::HttpStatus {
                status: status.as_u16(),
            });
        }

        let record = response.json::<IdentityRecord>().await?;
        debug!(uid = %record.uid, role = %record.role, "identity lookup succeeded");
        Ok(record)
    }
}
