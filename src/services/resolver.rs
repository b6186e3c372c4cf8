use futures::future::BoxFuture;
use futures::stream::{self, StreamExt, TryStreamExt};
use futures::FutureExt;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use tracing::{debug, info};

use crate::error::InsightResult;
use crate::models::insights::{EntityLookup, ResolvedEntity};
use crate::services::classifier::classify_as;
use crate::services::fetcher::HttpFetcher;
use crate::services::urls::lookup_url;

pub const DEFAULT_RESOLVE_CONCURRENCY: usize = 3;

/// Identifiers to measure, either known up front or produced by a future.
pub enum ItemSource {
    Items(Vec<String>),
    Deferred(BoxFuture<'static, InsightResult<Vec<String>>>),
}

impl ItemSource {
    pub fn deferred<F>(future: F) -> Self
    where
        F: Future<Output = InsightResult<Vec<String>>> + Send + 'static,
    {
        ItemSource::Deferred(future.boxed())
    }

    pub async fn into_items(self) -> InsightResult<Vec<String>> {
        match self {
            ItemSource::Items(items) => Ok(items),
            ItemSource::Deferred(future) => future.await,
        }
    }
}

impl From<Vec<String>> for ItemSource {
    fn from(items: Vec<String>) -> Self {
        ItemSource::Items(items)
    }
}

impl fmt::Debug for ItemSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ItemSource::Items(items) => f.debug_tuple("Items").field(items).finish(),
            ItemSource::Deferred(_) => f.write_str("Deferred(..)"),
        }
    }
}

/// Looks up the display name of every identifier, a bounded number at a time.
#[derive(Clone)]
pub struct EntityResolver {
    fetcher: Arc<dyn HttpFetcher>,
    base_url: String,
    token: String,
    concurrency: usize,
}

impl EntityResolver {
    pub fn new(
        fetcher: Arc<dyn HttpFetcher>,
        base_url: impl Into<String>,
        token: impl Into<String>,
        concurrency: usize,
    ) -> Self {
        Self {
            fetcher,
            base_url: base_url.into(),
            token: token.into(),
            concurrency: concurrency.max(1),
        }
    }

    /// Resolves every identifier, preserving input order. The first failing
    /// lookup fails the whole resolution and drops the ones still in flight.
    pub async fn resolve(&self, source: ItemSource) -> InsightResult<Vec<ResolvedEntity>> {
        let items = source.into_items().await?;
        info!(
            "Resolving {} items (concurrency {})",
            items.len(),
            self.concurrency
        );

        let mut resolved: Vec<(usize, ResolvedEntity)> = stream::iter(items.into_iter().enumerate())
            .map(|(idx, id)| async move { self.resolve_one(id).await.map(|entity| (idx, entity)) })
            .buffer_unordered(self.concurrency)
            .try_collect()
            .await?;

        resolved.sort_by_key(|(idx, _)| *idx);
        Ok(resolved.into_iter().map(|(_, entity)| entity).collect())
    }

    async fn resolve_one(&self, id: String) -> InsightResult<ResolvedEntity> {
        let url = lookup_url(&self.base_url, &id, &self.token);
        let response = self.fetcher.fetch(&url).await?;
        let lookup: EntityLookup = classify_as(response)?;
        debug!("Resolved {} as {:?}", id, lookup.name);

        Ok(ResolvedEntity {
            id,
            name: lookup.name,
        })
    }
}
