//! # contract: the object-storage seam
//!
//! The pipeline talks to object storage only through [`ObjectStore`]. The production
//! implementation is [`crate::s3::S3ObjectStore`] (anonymous S3 requests); tests use the
//! `mockall`-generated `MockObjectStore`, exported with the `test-export-mocks` feature.
//!
//! The trait works one page and one object at a time. Paging until exhaustion lives in
//! [`crate::listing`], and filtering, ordering and idempotency live in [`crate::download`],
//! so both can be tested against a mock store.

use std::path::Path;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
#[cfg(any(test, feature = "test-export-mocks"))]
use mockall::automock;
use serde::Serialize;

use crate::error::StoreError;

/// An object visible in a bucket listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RemoteObject {
    pub bucket: String,
    pub key: String,
    pub size: u64,
    pub last_modified: Option<DateTime<Utc>>,
}

impl RemoteObject {
    /// Path component after the last `/` of the key.
    pub fn basename(&self) -> &str {
        self.key.rsplit('/').next().unwrap_or(&self.key)
    }
}

/// One page of a listing.
#[derive(Debug, Clone, Default)]
pub struct ListPage {
    pub objects: Vec<RemoteObject>,
    /// Token for the next page; `None` once the listing is exhausted.
    pub next_token: Option<String>,
}

/// Read access to a public object store.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Fetch one listing page of `bucket`, starting at `continuation_token`.
    ///
    /// `None` requests the first page.
    async fn list_page(
        &self,
        bucket: &str,
        continuation_token: Option<String>,
    ) -> Result<ListPage, StoreError>;

    /// Write the bytes of `key` to `destination`, returning the number of bytes written.
    ///
    /// `destination` is a scratch path owned by the caller; implementations may leave it
    /// half-written on error.
    async fn download_object(
        &self,
        bucket: &str,
        key: &str,
        destination: &Path,
    ) -> Result<u64, StoreError>;
}
