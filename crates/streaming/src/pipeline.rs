use std::collections::HashSet;
use std::sync::Arc;

use runtime::CancelToken;

use crate::dataset::DataSet;
use crate::mapper::RecordMapper;
use crate::protocol::{RawFeatureSet, RawResponse};
use crate::query::BoundaryQuery;
use crate::record::FeatureRecord;
use crate::source::{BoxFuture, FeatureSource};

/// Result of one pipeline run.
#[derive(Debug, Clone, PartialEq)]
pub enum FetchOutcome {
    /// The request finished; the data set is `Success` or `Failure`.
    Completed(DataSet),
    /// The token fired before the response arrived.
    Cancelled,
}

/// Query -> request -> records for one feature type.
///
/// Source and mapper are shared, so the future returned by [`fetch`] owns
/// everything it touches and can sit in an engine's in-flight set.
///
/// [`fetch`]: FetchPipeline::fetch
pub struct FetchPipeline<S: ?Sized, M: ?Sized> {
    source: Arc<S>,
    mapper: Arc<M>,
}

impl<S: ?Sized, M: ?Sized> Clone for FetchPipeline<S, M> {
    fn clone(&self) -> Self {
        Self {
            source: Arc::clone(&self.source),
            mapper: Arc::clone(&self.mapper),
        }
    }
}

impl<S, M> FetchPipeline<S, M>
where
    S: FeatureSource + ?Sized + 'static,
    M: RecordMapper + ?Sized + 'static,
{
    pub fn new(source: Arc<S>, mapper: Arc<M>) -> Self {
        Self { source, mapper }
    }

    pub fn source(&self) -> &Arc<S> {
        &self.source
    }

    pub fn mapper(&self) -> &Arc<M> {
        &self.mapper
    }

    /// Issue exactly one request for `query`, racing it against `token`.
    ///
    /// Cancellation drops the in-flight request future and yields
    /// [`FetchOutcome::Cancelled`]. Transport and service failures yield a
    /// `Failure` data set; nothing is retried.
    pub fn fetch(&self, query: &BoundaryQuery, token: &CancelToken) -> BoxFuture<'static, FetchOutcome> {
        let source = Arc::clone(&self.source);
        let mapper = Arc::clone(&self.mapper);
        let query = query.clone();
        let token = token.clone();

        Box::pin(async move {
            if token.is_cancelled() {
                return FetchOutcome::Cancelled;
            }
            tracing::debug!(source = source.name(), kind = ?query.kind, "fetch started");

            let response = tokio::select! {
                biased;
                _ = token.cancelled() => None,
                r = source.fetch(&query) => Some(r),
            };

            let Some(response) = response else {
                tracing::debug!(source = source.name(), kind = ?query.kind, "fetch cancelled");
                return FetchOutcome::Cancelled;
            };

            match response {
                Ok(body) => FetchOutcome::Completed(into_data_set(&body, mapper.as_ref(), source.name())),
                Err(e) => {
                    tracing::warn!(source = source.name(), kind = ?query.kind, "fetch failed: {e}");
                    FetchOutcome::Completed(DataSet::failure())
                }
            }
        })
    }
}

/// Split a response body into mapped records.
///
/// Unparseable bodies and service error envelopes are failures; malformed
/// features and repeated identity keys are dropped.
pub fn into_data_set<M: RecordMapper + ?Sized>(
    body: &RawResponse,
    mapper: &M,
    source_name: &str,
) -> DataSet {
    let set = match RawFeatureSet::from_response(body) {
        Ok(set) => set,
        Err(e) => {
            tracing::warn!(source = source_name, "unparseable response: {e}");
            return DataSet::failure();
        }
    };
    if let Some(err) = &set.error {
        tracing::warn!(
            source = source_name,
            code = err.code,
            "service error: {}",
            err.message
        );
        return DataSet::failure();
    }

    let (features, mut dropped) = set.decode_features();
    let mut seen = HashSet::with_capacity(features.len());
    let mut records: Vec<FeatureRecord> = Vec::with_capacity(features.len());
    for feature in &features {
        match mapper.map_feature(feature) {
            Some(rec) if seen.insert(rec.identity_key.clone()) => records.push(rec),
            _ => dropped += 1,
        }
    }
    if dropped > 0 {
        tracing::debug!(source = source_name, dropped, "dropped malformed or duplicate features");
    }
    tracing::debug!(source = source_name, records = records.len(), "fetch completed");
    DataSet::success(records)
}
