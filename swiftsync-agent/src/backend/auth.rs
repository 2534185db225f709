//! Swift authentication.
//!
//! TempAuth (v1) is a single GET returning the token and storage URL in
//! headers. Keystone v2 is a JSON POST whose response carries the token and a
//! service catalog from which the `object-store` endpoint is picked.

use reqwest::blocking::Client;
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, info};

use swiftsync_common::StoreError;

use super::swift::check_status;
use crate::config::{AuthMethod, SwiftConfig};

const OBJECT_STORE_SERVICE: &str = "object-store";

/// An authenticated Swift session.
#[derive(Debug, Clone)]
pub struct Session {
    pub token: String,
    pub storage_url: String,
}

pub fn authenticate(client: &Client, config: &SwiftConfig) -> Result<Session, StoreError> {
    let password = config.password().unwrap_or_default();
    let session = match config.auth_method() {
        AuthMethod::TempAuth => tempauth(client, &config.auth_url, &config.username, password)?,
        AuthMethod::Keystone => keystone(client, config, password)?,
    };
    info!(storage_url = %session.storage_url, "Authenticated against Swift");
    Ok(session)
}

fn tempauth(client: &Client, auth_url: &str, user: &str, key: &str) -> Result<Session, StoreError> {
    let resp = client
        .get(auth_url)
        .header("X-Auth-User", user)
        .header("X-Auth-Key", key)
        .send()?;
    let resp = check_status(resp, auth_url)?;

    let header = |name: &str| -> Result<String, StoreError> {
        resp.headers()
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_string())
            .ok_or_else(|| StoreError::Protocol(format!("auth response lacks {}", name)))
    };

    Ok(Session {
        token: header("X-Auth-Token")?,
        storage_url: header("X-Storage-Url")?,
    })
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access: Access,
}

#[derive(Debug, Deserialize)]
struct Access {
    token: Token,
    #[serde(rename = "serviceCatalog", default)]
    service_catalog: Vec<CatalogEntry>,
}

#[derive(Debug, Deserialize)]
struct Token {
    id: String,
}

#[derive(Debug, Deserialize)]
struct CatalogEntry {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    endpoints: Vec<Endpoint>,
}

#[derive(Debug, Deserialize)]
struct Endpoint {
    #[serde(default)]
    region: Option<String>,
    #[serde(rename = "publicURL")]
    public_url: String,
}

fn keystone(client: &Client, config: &SwiftConfig, password: &str) -> Result<Session, StoreError> {
    let url = tokens_url(&config.auth_url);

    let mut auth = json!({
        "passwordCredentials": {
            "username": config.username,
            "password": password,
        }
    });
    if let Some(name) = config.tenant_name() {
        auth["tenantName"] = json!(name);
    }
    if let Some(id) = config.tenant_id() {
        auth["tenantId"] = json!(id);
    }

    let resp = client.post(&url).json(&json!({ "auth": auth })).send()?;
    let resp = check_status(resp, &url)?;
    let body: TokenResponse = resp
        .json()
        .map_err(|e| StoreError::Protocol(format!("invalid Keystone token response: {}", e)))?;

    let storage_url = select_endpoint(&body.access.service_catalog, config.preferred_region())
        .ok_or_else(|| {
            StoreError::Protocol(format!(
                "no {} endpoint in service catalog{}",
                OBJECT_STORE_SERVICE,
                config
                    .preferred_region()
                    .map(|r| format!(" (preferred region {})", r))
                    .unwrap_or_default()
            ))
        })?;
    debug!(endpoint = %storage_url, "Selected object-store endpoint");

    Ok(Session { token: body.access.token.id, storage_url })
}

fn tokens_url(auth_url: &str) -> String {
    let base = auth_url.trim_end_matches('/');
    if base.ends_with("/tokens") {
        base.to_string()
    } else {
        format!("{}/tokens", base)
    }
}

/// Pick the object-store endpoint in the preferred region, falling back to
/// the first one listed.
fn select_endpoint(catalog: &[CatalogEntry], preferred_region: Option<&str>) -> Option<String> {
    let endpoints = &catalog.iter().find(|s| s.kind == OBJECT_STORE_SERVICE)?.endpoints;
    let preferred = preferred_region.and_then(|region| {
        endpoints
            .iter()
            .find(|e| e.region.as_deref() == Some(region))
    });
    preferred
        .or_else(|| endpoints.first())
        .map(|e| e.public_url.clone())
}
