//! Remote bond store client.
//!
//! A bond is a mutual social-graph edge between two chip-holders. Records
//! are stored with a direction but treated as undirected for "already
//! bonded" checks, so the client normalizes the pair order before asking.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{error::MeldKitError, http_request::Request, Environment};

/// A stored bond between two chips.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, uniffi::Record)]
pub struct BondRecord {
    /// Stable bond identifier.
    pub bond_id: String,
    /// Chip that initiated the bond.
    pub from_chip_id: String,
    /// Chip that was tapped.
    pub to_chip_id: String,
    /// Bond category (currently always `tap`).
    pub bond_type: String,
    /// Unix-millisecond creation time.
    pub created_at: u64,
    /// Free-form metadata attached at creation.
    pub metadata: Option<String>,
}

/// A proposed bond awaiting external confirmation.
///
/// Emitted by the tap resolver; the confirmation UI hands it back through
/// [`crate::TapResolver::confirm_bond`] to actually create the edge.
#[derive(Debug, Clone, PartialEq, Eq, uniffi::Record)]
pub struct BondProposal {
    /// Chip bound to the session that was active when the tap happened.
    pub from_chip_id: String,
    /// Chip that was tapped.
    pub to_chip_id: String,
    /// Display name of the tapped chip's account, for the confirmation UI.
    pub display_name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct BondStatusResponse {
    bonded: bool,
}

#[derive(Debug, Serialize)]
struct CreateBondBody<'a> {
    bond_id: String,
    from_chip_id: &'a str,
    to_chip_id: &'a str,
    bond_type: &'a str,
    metadata: Option<&'a str>,
}

/// Remote bond store API client.
#[derive(uniffi::Object)]
pub struct BondStore {
    base_url: String,
    request: Request,
}

#[uniffi::export]
impl BondStore {
    /// Creates a bond store client for the specified environment.
    #[uniffi::constructor]
    #[must_use]
    pub fn new(environment: &Environment) -> Self {
        Self::with_base_url(environment.api_base_url())
    }

    /// Creates a client with a custom base URL (self-hosted deployments).
    #[uniffi::constructor]
    #[must_use]
    pub fn with_base_url(base_url: &str) -> Self {
        Self {
            base_url: base_url.to_string(),
            request: Request::new(),
        }
    }
}

#[uniffi::export(async_runtime = "tokio")]
impl BondStore {
    /// Whether a bond already exists between the two chips, in either
    /// direction.
    ///
    /// # Errors
    ///
    /// Returns an error on network failure or an invalid response.
    pub async fn are_bonded(
        &self,
        chip_a: &str,
        chip_b: &str,
    ) -> Result<bool, MeldKitError> {
        // Order-normalized so both directions hit the same cache entry.
        let (first, second) = if chip_a <= chip_b {
            (chip_a, chip_b)
        } else {
            (chip_b, chip_a)
        };
        let url = format!(
            "{}/v1/bonds/status?chip_a={first}&chip_b={second}",
            self.base_url
        );
        let response = self.request.handle(self.request.get(&url)).await?;

        let status = response.status();
        if !status.is_success() {
            let error_body = response.text().await.unwrap_or_default();
            return Err(MeldKitError::NetworkError {
                url,
                status: Some(status.as_u16()),
                error: format!("bond lookup failed: {error_body}"),
            });
        }

        let parsed: BondStatusResponse =
            response
                .json()
                .await
                .map_err(|e| MeldKitError::SerializationError {
                    error: format!("Failed to parse bond status: {e}"),
                })?;
        Ok(parsed.bonded)
    }

    /// Creates the bond described by `proposal`.
    ///
    /// Returns `None` when the store declines the edge (already bonded or
    /// raced by a concurrent confirmation).
    ///
    /// # Errors
    ///
    /// Returns an error on network failure or an invalid response.
    pub async fn create(
        &self,
        proposal: &BondProposal,
    ) -> Result<Option<BondRecord>, MeldKitError> {
        let url = format!("{}/v1/bonds", self.base_url);
        let body = CreateBondBody {
            bond_id: Uuid::new_v4().to_string(),
            from_chip_id: &proposal.from_chip_id,
            to_chip_id: &proposal.to_chip_id,
            bond_type: "tap",
            metadata: proposal.display_name.as_deref(),
        };
        let response = self
            .request
            .handle(self.request.post(&url).json(&body))
            .await?;

        let status = response.status();
        if status == reqwest::StatusCode::CONFLICT {
            return Ok(None);
        }
        if !status.is_success() {
            let error_body = response.text().await.unwrap_or_default();
            return Err(MeldKitError::NetworkError {
                url,
                status: Some(status.as_u16()),
                error: format!("bond create failed: {error_body}"),
            });
        }

        let record = response.json().await.map_err(|e| {
            MeldKitError::SerializationError {
                error: format!("Failed to parse created bond: {e}"),
            }
        })?;
        Ok(Some(record))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_are_bonded_normalizes_pair_order() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/v1/bonds/status?chip_a=04:AA&chip_b=04:BB")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"bonded": true}"#)
            .expect(2)
            .create_async()
            .await;

        let store = BondStore::with_base_url(&server.url());
        assert!(store.are_bonded("04:AA", "04:BB").await.unwrap());
        // Swapped direction hits the same normalized endpoint.
        assert!(store.are_bonded("04:BB", "04:AA").await.unwrap());
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_create_returns_record() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/v1/bonds")
            .match_body(mockito::Matcher::PartialJson(serde_json::json!({
                "from_chip_id": "04:AA",
                "to_chip_id": "04:BB",
                "bond_type": "tap"
            })))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                serde_json::json!({
                    "bond_id": "b_1",
                    "from_chip_id": "04:AA",
                    "to_chip_id": "04:BB",
                    "bond_type": "tap",
                    "created_at": 1_700_000_000_000_u64,
                    "metadata": null
                })
                .to_string(),
            )
            .create_async()
            .await;

        let store = BondStore::with_base_url(&server.url());
        let proposal = BondProposal {
            from_chip_id: "04:AA".to_string(),
            to_chip_id: "04:BB".to_string(),
            display_name: None,
        };
        let record = store.create(&proposal).await.unwrap().unwrap();
        assert_eq!(record.bond_id, "b_1");
        assert_eq!(record.bond_type, "tap");
    }

    #[tokio::test]
    async fn test_create_conflict_yields_none() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/v1/bonds")
            .with_status(409)
            .create_async()
            .await;

        let store = BondStore::with_base_url(&server.url());
        let proposal = BondProposal {
            from_chip_id: "04:AA".to_string(),
            to_chip_id: "04:BB".to_string(),
            display_name: None,
        };
        assert_eq!(store.create(&proposal).await.unwrap(), None);
    }
}
