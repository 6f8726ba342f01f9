//! Full bucket listings, following continuation tokens until the store reports no more pages.

use tracing::{debug, error, info};

use crate::contract::{ObjectStore, RemoteObject};
use crate::error::ListingError;

/// List every object in `bucket`.
///
/// Directory markers (keys ending in `/`) and empty keys are dropped. Any failed page
/// fails the whole listing; a partial listing is never returned.
pub async fn list_bucket<S>(store: &S, bucket: &str) -> Result<Vec<RemoteObject>, ListingError>
where
    S: ObjectStore + ?Sized,
{
    info!(bucket, "Listing bucket");
    let mut objects = Vec::new();
    let mut continuation_token: Option<String> = None;
    let mut pages = 0usize;

    loop {
        let page = store
            .list_page(bucket, continuation_token.take())
            .await
            .map_err(|e| {
                error!(bucket, page = pages + 1, error = %e, "Listing page failed");
                ListingError {
                    bucket: bucket.to_string(),
                    source: e,
                }
            })?;
        pages += 1;
        debug!(bucket, page = pages, objects = page.objects.len(), "Received listing page");

        objects.extend(
            page.objects
                .into_iter()
                .filter(|obj| !obj.key.is_empty() && !obj.key.ends_with('/')),
        );

        match page.next_token {
            Some(token) => continuation_token = Some(token),
            None => break,
        }
    }

    info!(bucket, pages, objects = objects.len(), "Bucket listing complete");
    Ok(objects)
}
