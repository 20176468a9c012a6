//! Remote account store client.
//!
//! Accounts are keyed by chip id and live behind a simple request/response
//! API. They are created lazily on first successful verification for a chip
//! and are never deleted by this core.

use serde::{Deserialize, Serialize};

use crate::{error::MeldKitError, http_request::Request, Environment};

/// An account backing a chip, as held by the remote store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, uniffi::Record)]
pub struct AccountRecord {
    /// Chip id the account is keyed by.
    pub chip_id: String,
    /// Stable account identifier assigned by the store.
    pub account_id: String,
    /// Human-readable display name, when the holder has set one.
    pub display_name: Option<String>,
    /// Whether the account is PIN-protected.
    pub has_pin: bool,
}

#[derive(Debug, Serialize)]
struct UpsertAccountBody<'a> {
    chip_id: &'a str,
    display_name: Option<&'a str>,
}

/// Remote account store API client.
#[derive(uniffi::Object)]
pub struct AccountStore {
    base_url: String,
    request: Request,
}

#[uniffi::export]
impl AccountStore {
    /// Creates an account store client for the specified environment.
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
impl AccountStore {
    /// Fetches the account for `chip_id`, if one exists.
    ///
    /// # Errors
    ///
    /// Returns an error on network failure or an invalid response.
    pub async fn get(
        &self,
        chip_id: &str,
    ) -> Result<Option<AccountRecord>, MeldKitError> {
        let url = format!("{}/v1/accounts?chip_id={chip_id}", self.base_url);
        let response = self.request.handle(self.request.get(&url)).await?;

        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !status.is_success() {
            let error_body = response.text().await.unwrap_or_default();
            return Err(MeldKitError::NetworkError {
                url,
                status: Some(status.as_u16()),
                error: format!("account lookup failed: {error_body}"),
            });
        }

        let account = response.json().await.map_err(|e| {
            MeldKitError::SerializationError {
                error: format!("Failed to parse account response: {e}"),
            }
        })?;
        Ok(Some(account))
    }

    /// Ensures an account exists for `chip_id` (create if absent, otherwise
    /// leave untouched) and returns the stored record.
    ///
    /// # Errors
    ///
    /// Returns an error on network failure or an invalid response.
    pub async fn upsert(
        &self,
        chip_id: &str,
        display_name: Option<String>,
    ) -> Result<AccountRecord, MeldKitError> {
        let url = format!("{}/v1/accounts", self.base_url);
        let body = UpsertAccountBody {
            chip_id,
            display_name: display_name.as_deref(),
        };
        let response = self
            .request
            .handle(self.request.post(&url).json(&body))
            .await?;

        let status = response.status();
        if !status.is_success() {
            let error_body = response.text().await.unwrap_or_default();
            return Err(MeldKitError::NetworkError {
                url,
                status: Some(status.as_u16()),
                error: format!("account upsert failed: {error_body}"),
            });
        }

        response
            .json()
            .await
            .map_err(|e| MeldKitError::SerializationError {
                error: format!("Failed to parse upserted account: {e}"),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_environment_urls() {
        let staging = AccountStore::new(&Environment::Staging);
        assert_eq!(staging.base_url, "https://api.stage.meldritual.app");

        let production = AccountStore::new(&Environment::Production);
        assert_eq!(production.base_url, "https://api.meldritual.app");
    }

    #[tokio::test]
    async fn test_get_returns_none_on_404() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/v1/accounts?chip_id=04:AA:BB")
            .with_status(404)
            .create_async()
            .await;

        let store = AccountStore::with_base_url(&server.url());
        assert_eq!(store.get("04:AA:BB").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_get_parses_account() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/v1/accounts?chip_id=04:AA:BB")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                serde_json::json!({
                    "chip_id": "04:AA:BB",
                    "account_id": "acc_1",
                    "display_name": "Ada",
                    "has_pin": true
                })
                .to_string(),
            )
            .create_async()
            .await;

        let store = AccountStore::with_base_url(&server.url());
        let account = store.get("04:AA:BB").await.unwrap().unwrap();
        assert_eq!(account.account_id, "acc_1");
        assert!(account.has_pin);
    }

    #[tokio::test]
    async fn test_upsert_posts_chip_id() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/v1/accounts")
            .match_body(mockito::Matcher::PartialJson(
                serde_json::json!({"chip_id": "04:AA:BB"}),
            ))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                serde_json::json!({
                    "chip_id": "04:AA:BB",
                    "account_id": "acc_2",
                    "display_name": null,
                    "has_pin": false
                })
                .to_string(),
            )
            .create_async()
            .await;

        let store = AccountStore::with_base_url(&server.url());
        let account = store.upsert("04:AA:BB", None).await.unwrap();
        assert_eq!(account.account_id, "acc_2");
        assert!(!account.has_pin);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_get_surfaces_server_errors() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/v1/accounts?chip_id=04:AA:BB")
            .with_status(500)
            .create_async()
            .await;

        let store = AccountStore::with_base_url(&server.url());
        let err = store.get("04:AA:BB").await.unwrap_err();
        assert!(matches!(
            err,
            MeldKitError::NetworkError { status: Some(500), .. }
        ));
    }
}
