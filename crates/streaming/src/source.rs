//! Feature source abstraction.
//!
//! A source performs exactly one outbound request per `fetch` call and knows
//! nothing about cancellation: the pipeline drops the returned future when a
//! fetch is superseded, which aborts the request underneath.
//!
//! - `ArcGisQuerySource`: ArcGIS REST feature-service `query` endpoint
//! - `MemoryFeatureSource`: in-memory Esri JSON features, for tests and replay

use std::collections::VecDeque;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use foundation::{Geometry, Point, Polygon, SpatialReference};
use parking_lot::Mutex;
use serde_json::{Value, json};

use crate::cache::{LookupCache, lookup_string};
use crate::protocol::{RawFeatureSet, RawResponse};
use crate::query::BoundaryQuery;

/// Error type for transport-level fetch failures.
#[derive(Debug)]
pub struct FetchError {
    pub message: String,
    /// HTTP status for non-2xx responses.
    pub status: Option<u16>,
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl std::fmt::Display for FetchError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.status {
            Some(status) => write!(f, "{} (HTTP {status})", self.message),
            None => write!(f, "{}", self.message),
        }
    }
}

impl std::error::Error for FetchError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source.as_ref().map(|e| e.as_ref() as _)
    }
}

impl FetchError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            status: None,
            source: None,
        }
    }

    pub fn with_status(message: impl Into<String>, status: u16) -> Self {
        Self {
            message: message.into(),
            status: Some(status),
            source: None,
        }
    }

    pub fn with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self {
            message: message.into(),
            status: None,
            source: Some(Box::new(source)),
        }
    }
}

/// Type alias for a boxed future that can be sent between threads.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Per-feature-type fetch collaborator.
pub trait FeatureSource: Send + Sync {
    /// Human-readable name for logs.
    fn name(&self) -> &str;

    /// Issue one request for `query` and return the raw response body.
    fn fetch(&self, query: &BoundaryQuery) -> BoxFuture<'_, Result<RawResponse, FetchError>>;
}

/// Where an ArcGIS source finds its layer URL.
#[derive(Debug, Clone)]
pub enum ServiceEndpoint {
    Fixed(String),
    /// Resolved from a lookup document (e.g. a services directory) through a
    /// shared [`LookupCache`], following a JSON pointer.
    Lookup {
        cache: Arc<LookupCache>,
        resource: String,
        document_url: String,
        pointer: String,
    },
}

/// ArcGIS REST feature-service layer queried with a polygon filter.
pub struct ArcGisQuerySource {
    name: String,
    endpoint: ServiceEndpoint,
    out_sr: SpatialReference,
    client: reqwest::Client,
}

impl ArcGisQuerySource {
    pub fn new(name: impl Into<String>, endpoint: ServiceEndpoint, out_sr: SpatialReference) -> Self {
        Self {
            name: name.into(),
            endpoint,
            out_sr,
            client: reqwest::Client::new(),
        }
    }

    pub fn with_client(mut self, client: reqwest::Client) -> Self {
        self.client = client;
        self
    }

    async fn layer_url(&self) -> Result<String, FetchError> {
        match &self.endpoint {
            ServiceEndpoint::Fixed(url) => Ok(url.clone()),
            ServiceEndpoint::Lookup {
                cache,
                resource,
                document_url,
                pointer,
            } => {
                let client = self.client.clone();
                let document_url = document_url.clone();
                let document = cache
                    .get_or_fetch(resource, || async move {
                        let resp = client
                            .get(&document_url)
                            .send()
                            .await
                            .map_err(|e| e.to_string())?;
                        if !resp.status().is_success() {
                            return Err(format!("HTTP error: {}", resp.status()));
                        }
                        resp.json::<Value>().await.map_err(|e| e.to_string())
                    })
                    .await
                    .map_err(|e| FetchError::with_source("service lookup failed", e))?;
                lookup_string(&document, pointer).ok_or_else(|| {
                    FetchError::new(format!("lookup `{resource}` has no string at {pointer}"))
                })
            }
        }
    }
}

impl FeatureSource for ArcGisQuerySource {
    fn name(&self) -> &str {
        &self.name
    }

    fn fetch(&self, query: &BoundaryQuery) -> BoxFuture<'_, Result<RawResponse, FetchError>> {
        let params = query.to_query_params(self.out_sr);
        Box::pin(async move {
            let url = format!("{}/query", self.layer_url().await?.trim_end_matches('/'));
            let resp = self
                .client
                .post(&url)
                .form(&params)
                .send()
                .await
                .map_err(|e| FetchError::with_source("HTTP request failed", e))?;

            if !resp.status().is_success() {
                return Err(FetchError::with_status(
                    "feature query failed",
                    resp.status().as_u16(),
                ));
            }

            resp.json::<Value>()
                .await
                .map_err(|e| FetchError::with_source("failed to read response", e))
        })
    }
}

/// In-memory feature source serving Esri JSON features.
///
/// A feature is returned when it intersects the query polygon (any vertex of
/// either shape inside the other). Entries that do not decode are passed
/// through untouched so callers still see malformed input. Delays use
/// `tokio::time`, so paused-clock tests stay deterministic.
pub struct MemoryFeatureSource {
    name: String,
    spatial_reference: SpatialReference,
    features: Mutex<Vec<Value>>,
    delays: Mutex<VecDeque<Duration>>,
    failures: Mutex<VecDeque<FetchError>>,
    requests: AtomicUsize,
    completed: AtomicUsize,
}

impl MemoryFeatureSource {
    pub fn new(name: impl Into<String>, spatial_reference: SpatialReference) -> Self {
        Self {
            name: name.into(),
            spatial_reference,
            features: Mutex::new(Vec::new()),
            delays: Mutex::new(VecDeque::new()),
            failures: Mutex::new(VecDeque::new()),
            requests: AtomicUsize::new(0),
            completed: AtomicUsize::new(0),
        }
    }

    pub fn with_features(self, features: Vec<Value>) -> Self {
        *self.features.lock() = features;
        self
    }

    pub fn set_features(&self, features: Vec<Value>) {
        *self.features.lock() = features;
    }

    /// Delay the next request by `delay` (queued, one per request).
    pub fn push_delay(&self, delay: Duration) {
        self.delays.lock().push_back(delay);
    }

    /// Fail the next request with `err` (queued, one per request).
    pub fn push_failure(&self, err: FetchError) {
        self.failures.lock().push_back(err);
    }

    /// Requests started, including ones dropped before completion.
    pub fn request_count(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }

    /// Requests that ran to completion (success or failure).
    pub fn completed_count(&self) -> usize {
        self.completed.load(Ordering::SeqCst)
    }

    fn select(&self, query: &BoundaryQuery) -> RawResponse {
        let features: Vec<Value> = self
            .features
            .lock()
            .iter()
            .filter(|raw| self.feature_matches(raw, &query.geometry))
            .cloned()
            .collect();
        json!({
            "spatialReference": { "wkid": self.spatial_reference.wkid },
            "features": features,
        })
    }

    fn feature_matches(&self, raw: &Value, filter: &Polygon) -> bool {
        let wrapper = json!({
            "spatialReference": { "wkid": self.spatial_reference.wkid },
            "features": [raw],
        });
        let Ok(set) = RawFeatureSet::from_response(&wrapper) else {
            return true;
        };
        let (decoded, skipped) = set.decode_features();
        if skipped > 0 {
            return true;
        }
        decoded
            .first()
            .and_then(|f| f.geometry.as_ref())
            .map(|g| intersects(g, filter))
            .unwrap_or(false)
    }
}

fn intersects(geometry: &Geometry, filter: &Polygon) -> bool {
    let sr = geometry.spatial_reference();
    let vertices: Vec<Point> = match geometry {
        Geometry::Point(p) => vec![*p],
        Geometry::Polyline(l) => l
            .paths
            .iter()
            .flatten()
            .map(|[x, y]| Point::new(*x, *y, sr))
            .collect(),
        Geometry::Polygon(p) => p
            .rings
            .iter()
            .flatten()
            .map(|[x, y]| Point::new(*x, *y, sr))
            .collect(),
    };
    if vertices.iter().any(|v| filter.contains(v)) {
        return true;
    }
    let Geometry::Polygon(shape) = geometry else {
        return false;
    };
    filter
        .rings
        .iter()
        .flatten()
        .map(|[x, y]| Point::new(*x, *y, filter.spatial_reference))
        .any(|v| shape.contains(&v))
}

impl FeatureSource for MemoryFeatureSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn fetch(&self, query: &BoundaryQuery) -> BoxFuture<'_, Result<RawResponse, FetchError>> {
        self.requests.fetch_add(1, Ordering::SeqCst);
        let query = query.clone();
        let delay = self.delays.lock().pop_front();
        let failure = self.failures.lock().pop_front();
        Box::pin(async move {
            if let Some(delay) = delay {
                tokio::time::sleep(delay).await;
            }
            self.completed.fetch_add(1, Ordering::SeqCst);
            match failure {
                Some(err) => Err(err),
                None => Ok(self.select(&query)),
            }
        })
    }
}
