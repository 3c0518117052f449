//! §6 "Remote provider interface" — the hosted-DB control API (Turso
//! platform) is an external collaborator; this module is the thin client
//! the gateway drives it through. Bearer auth + JSON payloads, grounded in
//! the retrieval pack's `reqwest` usage (kent8192-reinhardt-web).

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;

use crate::error::GatewayError;

#[derive(Debug, Clone)]
pub struct RemoteDatabase {
    pub name: String,
    pub hostname: String,
}

#[async_trait]
pub trait RemoteProvider: Send + Sync {
    async fn list_databases(&self) -> Result<Vec<RemoteDatabase>, GatewayError>;
    async fn get_hostname(&self, name: &str) -> Result<String, GatewayError>;
    async fn create_database(&self, name: &str, group: &str) -> Result<(), GatewayError>;
    async fn delete_database(&self, name: &str) -> Result<(), GatewayError>;
    async fn mint_token(&self, name: &str, expiry_seconds: Option<u64>) -> Result<String, GatewayError>;
}

pub struct TursoProvider {
    client: reqwest::Client,
    organization: String,
    api_key: String,
}

impl TursoProvider {
    pub fn new(organization: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            organization: organization.into(),
            api_key: api_key.into(),
        }
    }

    fn databases_url(&self) -> String {
        format!(
            "https://api.turso.tech/v1/organizations/{}/databases",
            self.organization
        )
    }

    async fn error_from_response(response: reqwest::Response) -> GatewayError {
        let status = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();
        GatewayError::RemoteProviderError { status, body }
    }
}

#[derive(Deserialize)]
struct ListDatabasesResponse {
    databases: Vec<DatabaseJson>,
}

#[derive(Deserialize)]
struct DatabaseJson {
    #[serde(rename = "Name")]
    name: String,
    #[serde(rename = "Hostname")]
    hostname: String,
}

#[derive(Deserialize)]
struct DatabaseDetailResponse {
    database: DatabaseJson,
}

#[derive(Deserialize)]
struct TokenResponse {
    jwt: String,
}

#[async_trait]
impl RemoteProvider for TursoProvider {
    async fn list_databases(&self) -> Result<Vec<RemoteDatabase>, GatewayError> {
        let response = self
            .client
            .get(self.databases_url())
            .bearer_auth(&self.api_key)
            .send()
            .await
            .map_err(|e| GatewayError::RemoteProviderError {
                status: 0,
                body: e.to_string(),
            })?;

        if !response.status().is_success() {
            return Err(Self::error_from_response(response).await);
        }

        let parsed: ListDatabasesResponse = response.json().await.map_err(|e| {
            GatewayError::RemoteProviderError {
                status: 502,
                body: e.to_string(),
            }
        })?;

        Ok(parsed
            .databases
            .into_iter()
            .map(|d| RemoteDatabase {
                name: d.name,
                hostname: d.hostname,
            })
            .collect())
    }

    async fn get_hostname(&self, name: &str) -> Result<String, GatewayError> {
        let response = self
            .client
            .get(format!("{}/{name}", self.databases_url()))
            .bearer_auth(&self.api_key)
            .send()
            .await
            .map_err(|e| GatewayError::RemoteProviderError {
                status: 0,
                body: e.to_string(),
            })?;

        if !response.status().is_success() {
            return Err(Self::error_from_response(response).await);
        }

        let parsed: DatabaseDetailResponse = response.json().await.map_err(|e| {
            GatewayError::RemoteProviderError {
                status: 502,
                body: e.to_string(),
            }
        })?;
        Ok(parsed.database.hostname)
    }

    async fn create_database(&self, name: &str, group: &str) -> Result<(), GatewayError> {
        let response = self
            .client
            .post(self.databases_url())
            .bearer_auth(&self.api_key)
            .json(&json!({ "name": name, "group": group }))
            .send()
            .await
            .map_err(|e| GatewayError::RemoteProviderError {
                status: 0,
                body: e.to_string(),
            })?;

        if !response.status().is_success() {
            return Err(Self::error_from_response(response).await);
        }
        Ok(())
    }

    async fn delete_database(&self, name: &str) -> Result<(), GatewayError> {
        let response = self
            .client
            .delete(format!("{}/{name}", self.databases_url()))
            .bearer_auth(&self.api_key)
            .send()
            .await
            .map_err(|e| GatewayError::RemoteProviderError {
                status: 0,
                body: e.to_string(),
            })?;

        if !response.status().is_success() {
            return Err(Self::error_from_response(response).await);
        }
        Ok(())
    }

    async fn mint_token(&self, name: &str, expiry_seconds: Option<u64>) -> Result<String, GatewayError> {
        let mut body = json!({});
        if let Some(expiry) = expiry_seconds {
            body["expiration"] = json!(format!("{expiry}s"));
        }

        let response = self
            .client
            .post(format!("{}/{name}/auth/tokens", self.databases_url()))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| GatewayError::RemoteProviderError {
                status: 0,
                body: e.to_string(),
            })?;

        if !response.status().is_success() {
            return Err(Self::error_from_response(response).await);
        }

        let parsed: TokenResponse = response.json().await.map_err(|e| {
            GatewayError::RemoteProviderError {
                status: 502,
                body: e.to_string(),
            }
        })?;
        Ok(parsed.jwt)
    }
}
