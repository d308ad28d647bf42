//! ==============================================================================
//! datastore.rs - remote document store backend
//! ==============================================================================
//!
//! purpose:
//!     persists readings in a key-indexed json document store reached over
//!     http. all readings live as documents of one kind inside a project:
//!
//! ```text
//!         POST {base_url}/v1/projects/{project}/kinds/{kind}/documents
//!              body: [StoredReading, ...]
//!         GET  {base_url}/v1/projects/{project}/kinds/{kind}/documents
//!              ?start=<rfc3339>&end=<rfc3339>&order=date
//!              ?order=-date&limit=1
//!
//!     `date` is the indexed field. the backend drops a document once its
//!     `expiry` passes.
//! ```
//!
//! client handle:
//!     the store owns its http client. with `reuse_client` the client is
//!     built on first use and kept for the life of the store. without it
//!     every call builds its own client, which is dropped (closing its
//!     connections) on every exit path of that call.
//!
//! relationships:
//!     - implements: storage.rs (SensorStore)
//!     - configured by: config.rs ([storage.datastore])
//!
//! ==============================================================================

use crate::config::DatastoreConfig;
use crate::domain::{Reading, StoredReading};
use crate::storage::{SensorStore, StorageError};
use chrono::{DateTime, Duration, Utc};
use reqwest::{Client, Response};
use std::ops::Deref;
use tokio::sync::OnceCell;

pub struct DatastoreStore {
    documents_url: String,
    timeout: std::time::Duration,
    reuse_client: bool,
    client: OnceCell<Client>,
    expiry_horizon: Duration,
}

/// a client borrowed from the store or built for one call
enum ClientHandle<'a> {
    Cached(&'a Client),
    Fresh(Client),
}

impl Deref for ClientHandle<'_> {
    type Target = Client;

    fn deref(&self) -> &Client {
        match self {
            ClientHandle::Cached(client) => client,
            ClientHandle::Fresh(client) => client,
        }
    }
}

impl DatastoreStore {
    pub fn new(config: &DatastoreConfig, expiry_horizon: Duration) -> Self {
        let documents_url = format!(
            "{}/v1/projects/{}/kinds/{}/documents",
            config.base_url.trim_end_matches('/'),
            config.project_id,
            config.kind,
        );
        Self {
            documents_url,
            timeout: std::time::Duration::from_secs(config.timeout_seconds),
            reuse_client: config.reuse_client,
            client: OnceCell::new(),
            expiry_horizon,
        }
    }

    fn build_client(&self) -> Result<Client, StorageError> {
        Client::builder()
            .timeout(self.timeout)
            .build()
            .map_err(StorageError::Client)
    }

    async fn client(&self) -> Result<ClientHandle<'_>, StorageError> {
        if !self.reuse_client {
            return Ok(ClientHandle::Fresh(self.build_client()?));
        }
        let client = self
            .client
            .get_or_try_init(|| async {
                tracing::debug!(url = %self.documents_url, "creating datastore client");
                self.build_client()
            })
            .await?;
        Ok(ClientHandle::Cached(client))
    }

    async fn fetch(&self, params: &[(&str, String)]) -> Result<Vec<Reading>, StorageError> {
        let client = self.client().await?;
        let response = client.get(self.documents_url.as_str()).query(params).send().await?;
        let documents: Vec<StoredReading> = success(response)
            .await?
            .json()
            .await
            .map_err(|e| StorageError::Decode(e.to_string()))?;

        Ok(documents.iter().map(StoredReading::reading).collect())
    }
}

async fn success(response: Response) -> Result<Response, StorageError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(StorageError::Status { status: status.as_u16(), body })
}

impl SensorStore for DatastoreStore {
    async fn store(&self, readings: &[Reading]) -> Result<(), StorageError> {
        if readings.is_empty() {
            return Ok(());
        }

        let documents: Vec<StoredReading> = readings
            .iter()
            .map(|r| StoredReading::from_reading(r, self.expiry_horizon))
            .collect();

        let client = self.client().await?;
        let response = client.post(self.documents_url.as_str()).json(&documents).send().await?;
        success(response).await?;

        tracing::debug!(count = documents.len(), "stored readings in datastore");
        Ok(())
    }

    async fn query(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> Result<Vec<Reading>, StorageError> {
        if start >= end {
            return Ok(Vec::new());
        }

        self.fetch(&[
            ("start", start.to_rfc3339()),
            ("end", end.to_rfc3339()),
            ("order", "date".to_string()),
        ])
        .await
    }

    async fn current_reading(&self) -> Result<Option<Reading>, StorageError> {
        let latest = self
            .fetch(&[("order", "-date".to_string()), ("limit", "1".to_string())])
            .await?;
        Ok(latest.into_iter().next())
    }
}
