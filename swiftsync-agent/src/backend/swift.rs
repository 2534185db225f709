//! OpenStack Swift object store.
//!
//! Talks to the Swift HTTP API with a blocking reqwest client. A store is
//! bound to one authenticated session and one container; nothing about it
//! changes after construction, so it can be shared behind an `Arc`.

use std::fs::File;
use std::io::Write;
use std::path::Path;
use std::time::Duration;

use chrono::{DateTime, NaiveDateTime, Utc};
use reqwest::blocking::{Body, Client, RequestBuilder, Response};
use reqwest::header::HeaderMap;
use reqwest::StatusCode;
use serde::Deserialize;
use tracing::debug;

use swiftsync_common::{AccountInfo, ObjectInfo, ObjectStore, StoreError};

use super::auth::{self, Session};
use crate::config::SwiftConfig;

const LIST_PAGE_SIZE: usize = 10_000;
const LAST_MODIFIED_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.f";

pub struct SwiftStore {
    client: Client,
    session: Session,
    container: String,
}

impl SwiftStore {
    /// Authenticate with the configured credentials and bind to the
    /// configured container.
    pub fn connect(config: &SwiftConfig) -> Result<Self, StoreError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        let session = auth::authenticate(&client, config)?;
        Ok(Self::with_session(client, session, config.container.clone()))
    }

    pub fn with_session(client: Client, session: Session, container: impl Into<String>) -> Self {
        Self { client, session, container: container.into() }
    }

    fn account_url(&self) -> &str {
        self.session.storage_url.trim_end_matches('/')
    }

    fn container_url(&self) -> String {
        format!("{}/{}", self.account_url(), urlencoding::encode(&self.container))
    }

    fn object_url(&self, key: &str) -> String {
        format!("{}/{}", self.container_url(), encode_key(key))
    }

    fn send(&self, request: RequestBuilder, key: &str) -> Result<Response, StoreError> {
        let resp = request.header("X-Auth-Token", &self.session.token).send()?;
        check_status(resp, key)
    }

    fn head_object(&self, key: &str, newest: bool) -> Result<bool, StoreError> {
        let mut request = self.client.head(self.object_url(key));
        if newest {
            request = request.header("X-Newest", "true");
        }
        match self.send(request, key) {
            Ok(_) => Ok(true),
            Err(e) if e.is_not_found() => Ok(false),
            Err(e) => Err(e),
        }
    }
}

/// Pass successful responses through and turn the rest into a [`StoreError`].
pub(crate) fn check_status(resp: Response, key: &str) -> Result<Response, StoreError> {
    match status_error(resp.status(), key, String::new()) {
        None => Ok(resp),
        Some(StoreError::Status { status, .. }) => {
            let body = resp.text().unwrap_or_default();
            Err(StoreError::Status { status, body })
        }
        Some(e) => Err(e),
    }
}

/// Map a Swift response status onto a [`StoreError`], `None` on success.
fn status_error(status: StatusCode, key: &str, body: String) -> Option<StoreError> {
    if status.is_success() {
        return None;
    }
    Some(match status.as_u16() {
        401 => StoreError::Unauthorized(key.to_string()),
        403 => StoreError::Forbidden(key.to_string()),
        404 => StoreError::NotFound(key.to_string()),
        code => StoreError::Status { status: code, body },
    })
}

/// A listing page shorter than the requested limit is the last one.
fn is_last_page(page_len: usize) -> bool {
    page_len < LIST_PAGE_SIZE
}

/// Percent-encode each path segment of an object key, keeping separators.
fn encode_key(key: &str) -> String {
    key.split('/')
        .map(|segment| urlencoding::encode(segment).into_owned())
        .collect::<Vec<_>>()
        .join("/")
}

fn header_u64(headers: &HeaderMap, name: &str) -> u64 {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.parse().ok())
        .unwrap_or(0)
}

/// One row of a JSON container listing. With a delimiter, Swift reports
/// pseudo-directories as `{"subdir": ...}` rows.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ListingEntry {
    Object {
        name: String,
        bytes: u64,
        #[serde(default)]
        hash: Option<String>,
        #[serde(default)]
        last_modified: Option<String>,
    },
    Subdir {
        subdir: String,
    },
}

impl ListingEntry {
    fn marker(&self) -> &str {
        match self {
            ListingEntry::Object { name, .. } => name,
            ListingEntry::Subdir { subdir } => subdir,
        }
    }
}

fn parse_listing(body: &str) -> Result<Vec<ListingEntry>, StoreError> {
    serde_json::from_str(body)
        .map_err(|e| StoreError::Protocol(format!("invalid container listing: {}", e)))
}

fn parse_last_modified(value: &str) -> Option<DateTime<Utc>> {
    NaiveDateTime::parse_from_str(value, LAST_MODIFIED_FORMAT)
        .ok()
        .map(|dt| dt.and_utc())
}

impl ObjectStore for SwiftStore {
    fn container(&self) -> &str {
        &self.container
    }

    fn account_info(&self) -> Result<AccountInfo, StoreError> {
        let resp = self.send(self.client.head(self.account_url()), self.account_url())?;
        let headers = resp.headers();
        Ok(AccountInfo {
            bytes_used: header_u64(headers, "X-Account-Bytes-Used"),
            container_count: header_u64(headers, "X-Account-Container-Count"),
            object_count: header_u64(headers, "X-Account-Object-Count"),
        })
    }

    fn container_exists(&self) -> Result<bool, StoreError> {
        match self.send(self.client.head(self.container_url()), &self.container) {
            Ok(_) => Ok(true),
            Err(e) if e.is_not_found() => Ok(false),
            Err(e) => Err(e),
        }
    }

    fn create_container(&self) -> Result<(), StoreError> {
        self.send(self.client.put(self.container_url()).body(Vec::<u8>::new()), &self.container)?;
        debug!(container = %self.container, "Swift container created");
        Ok(())
    }

    fn put_object(&self, key: &str, source: &Path) -> Result<(), StoreError> {
        let file = File::open(source)?;
        let len = file.metadata()?.len();
        let request = self
            .client
            .put(self.object_url(key))
            .header("Content-Type", "application/octet-stream")
            .body(Body::sized(file, len));
        self.send(request, key)?;
        debug!(key = %key, bytes = len, "Swift PUT complete");
        Ok(())
    }

    fn get_object(&self, key: &str, dest: &mut dyn Write) -> Result<u64, StoreError> {
        let mut resp = self.send(self.client.get(self.object_url(key)), key)?;
        let written = resp.copy_to(dest)?;
        debug!(key = %key, bytes = written, "Swift GET complete");
        Ok(written)
    }

    fn copy_object(&self, from: &str, to: &str) -> Result<(), StoreError> {
        let source = format!("/{}/{}", urlencoding::encode(&self.container), encode_key(from));
        let request = self
            .client
            .put(self.object_url(to))
            .header("X-Copy-From", source)
            .body(Vec::<u8>::new());
        self.send(request, to)?;
        debug!(from = %from, to = %to, "Swift server-side copy complete");
        Ok(())
    }

    fn delete_object(&self, key: &str) -> Result<(), StoreError> {
        match self.send(self.client.delete(self.object_url(key)), key) {
            Ok(_) => {}
            Err(e) if e.is_not_found() => {
                debug!(key = %key, "Swift DELETE of missing object");
            }
            Err(e) => return Err(e),
        }
        Ok(())
    }

    fn object_exists(&self, key: &str) -> Result<bool, StoreError> {
        self.head_object(key, false)
    }

    fn object_exists_newest(&self, key: &str) -> Result<bool, StoreError> {
        self.head_object(key, true)
    }

    fn list_objects(&self, prefix: &str) -> Result<Vec<ObjectInfo>, StoreError> {
        let mut objects = Vec::new();
        let mut marker = String::new();
        let limit = LIST_PAGE_SIZE.to_string();

        loop {
            let request = self.client.get(self.container_url()).query(&[
                ("format", "json"),
                ("prefix", prefix),
                ("delimiter", "/"),
                ("limit", limit.as_str()),
                ("marker", marker.as_str()),
            ]);
            let body = self.send(request, prefix)?.text()?;
            let page = parse_listing(&body)?;
            let page_len = page.len();

            if let Some(last) = page.last() {
                marker = last.marker().to_string();
            }
            for entry in page {
                if let ListingEntry::Object { name, bytes, hash, last_modified } = entry {
                    objects.push(ObjectInfo {
                        key: name,
                        size: bytes,
                        hash,
                        last_modified: last_modified.as_deref().and_then(parse_last_modified),
                    });
                }
            }

            if is_last_page(page_len) {
                break;
            }
        }

        debug!(prefix = %prefix, count = objects.len(), "Swift listing complete");
        Ok(objects)
    }
}
