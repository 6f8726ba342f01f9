//! Anonymous S3 access for public trip-data buckets.
//!
//! Requests are unsigned (`no_credentials`), so no AWS account or local credential files
//! are needed or consulted. One SDK client is built per (region, addressing style);
//! buckets whose names contain dots use path-style addressing because their
//! virtual-host names do not match the S3 wildcard certificate.

use std::collections::HashMap;
use std::path::Path;

use async_trait::async_trait;
use aws_config::{BehaviorVersion, Region};
use aws_sdk_s3::error::DisplayErrorContext;
use aws_sdk_s3::Client;
use chrono::{DateTime, Utc};
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};

use crate::config::{BucketSource, DEFAULT_REGION};
use crate::contract::{ListPage, ObjectStore, RemoteObject};
use crate::error::StoreError;

/// Connection settings shared by every bucket of a run.
#[derive(Debug, Clone, Default)]
pub struct S3Settings {
    /// Custom endpoint (S3-compatible servers, test doubles). Forces path-style addressing.
    pub endpoint: Option<String>,
    /// Region for buckets that are not registered with their own region.
    pub default_region: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct ClientKey {
    region: String,
    path_style: bool,
}

/// [`ObjectStore`] backed by unsigned S3 requests.
pub struct S3ObjectStore {
    clients: HashMap<ClientKey, Client>,
    bucket_regions: HashMap<String, String>,
    settings: S3Settings,
}

impl S3ObjectStore {
    /// Build clients for every source up front.
    pub async fn connect(settings: S3Settings, sources: &[BucketSource]) -> Self {
        let mut store = Self {
            clients: HashMap::new(),
            bucket_regions: HashMap::new(),
            settings,
        };
        for source in sources {
            store
                .bucket_regions
                .insert(source.bucket.clone(), source.region().to_string());
            let key = store.client_key(&source.bucket);
            if !store.clients.contains_key(&key) {
                let client = build_client(&store.settings, &key).await;
                store.clients.insert(key, client);
            }
        }
        info!(
            clients = store.clients.len(),
            endpoint = ?store.settings.endpoint,
            "Connected anonymous S3 clients"
        );
        store
    }

    fn client_key(&self, bucket: &str) -> ClientKey {
        let region = self
            .bucket_regions
            .get(bucket)
            .cloned()
            .or_else(|| self.settings.default_region.clone())
            .unwrap_or_else(|| DEFAULT_REGION.to_string());
        ClientKey {
            region,
            path_style: self.settings.endpoint.is_some() || bucket.contains('.'),
        }
    }

    async fn client_for(&self, bucket: &str) -> Client {
        let key = self.client_key(bucket);
        match self.clients.get(&key) {
            Some(client) => client.clone(),
            None => build_client(&self.settings, &key).await,
        }
    }
}

async fn build_client(settings: &S3Settings, key: &ClientKey) -> Client {
    let mut loader = aws_config::defaults(BehaviorVersion::latest())
        .no_credentials()
        .region(Region::new(key.region.clone()));
    if let Some(endpoint) = &settings.endpoint {
        loader = loader.endpoint_url(endpoint);
    }
    let shared = loader.load().await;

    let s3_config = aws_sdk_s3::config::Builder::from(&shared)
        .force_path_style(key.path_style)
        .build();
    debug!(region = %key.region, path_style = key.path_style, "Built S3 client");
    Client::from_conf(s3_config)
}

fn to_chrono(t: &aws_sdk_s3::primitives::DateTime) -> Option<DateTime<Utc>> {
    DateTime::from_timestamp(t.secs(), t.subsec_nanos())
}

#[async_trait]
impl ObjectStore for S3ObjectStore {
    async fn list_page(
        &self,
        bucket: &str,
        continuation_token: Option<String>,
    ) -> Result<ListPage, StoreError> {
        let client = self.client_for(bucket).await;
        let mut req = client.list_objects_v2().bucket(bucket);
        if let Some(token) = continuation_token {
            req = req.continuation_token(token);
        }

        let resp = req
            .send()
            .await
            .map_err(|e| StoreError::Request(DisplayErrorContext(&e).to_string()))?;

        let objects = resp
            .contents()
            .iter()
            .map(|obj| RemoteObject {
                bucket: bucket.to_string(),
                key: obj.key().unwrap_or_default().to_string(),
                size: obj.size().unwrap_or(0).max(0) as u64,
                last_modified: obj.last_modified().and_then(to_chrono),
            })
            .collect();

        let next_token = if resp.is_truncated().unwrap_or(false) {
            resp.next_continuation_token().map(str::to_string)
        } else {
            None
        };

        Ok(ListPage {
            objects,
            next_token,
        })
    }

    async fn download_object(
        &self,
        bucket: &str,
        key: &str,
        destination: &Path,
    ) -> Result<u64, StoreError> {
        let client = self.client_for(bucket).await;
        let resp = client
            .get_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| StoreError::Request(DisplayErrorContext(&e).to_string()))?;

        let mut body = resp.body;
        let mut file = tokio::fs::File::create(destination).await?;
        let mut written = 0u64;
        while let Some(chunk) = body
            .try_next()
            .await
            .map_err(|e| StoreError::Stream(e.to_string()))?
        {
            file.write_all(&chunk).await?;
            written += chunk.len() as u64;
        }
        file.flush().await?;
        file.sync_all().await?;
        Ok(written)
    }
}
