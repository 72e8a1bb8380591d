//! CyAN (Cyanobacteria Assessment Network) satellite-imaged waterbodies.

use std::sync::Arc;

use foundation::SpatialReference;
use layers::LayerId;
use streaming::protocol::RawFeature;
use streaming::{
    ArcGisQuerySource, Attributes, FeatureRecord, FeatureSource, FetchPipeline, LookupCache,
    RecordMapper, Scalar, ServiceEndpoint, identity_string,
};

use crate::config::SyncConfig;
use crate::engine::SyncEngine;

pub const CYAN_LAYER_ID: &str = "cyanWaterbodies";
pub const CYAN_ORG_NAME: &str = "Cyanobacteria Assessment Network (CyAN)";
pub const CYAN_MONITORING_TYPE: &str = "CyAN";
/// Location of the waterbodies layer URL in the services document.
pub const CYAN_SERVICES_POINTER: &str = "/cyan/waterbodies";
pub const SERVICES_RESOURCE: &str = "services";

#[derive(Debug, Clone)]
pub struct CyanWaterbodyMapper {
    key_fields: Vec<String>,
}

impl Default for CyanWaterbodyMapper {
    fn default() -> Self {
        Self {
            key_fields: vec!["FID".to_string()],
        }
    }
}

impl CyanWaterbodyMapper {
    pub fn new() -> Self {
        Self::default()
    }
}

impl RecordMapper for CyanWaterbodyMapper {
    fn key_fields(&self) -> &[String] {
        &self.key_fields
    }

    fn map_feature(&self, feature: &RawFeature) -> Option<FeatureRecord> {
        let geometry = feature.geometry.clone()?;
        let field = |name: &str| {
            feature
                .attribute(name)
                .and_then(Scalar::from_json)
                .unwrap_or(Scalar::Null)
        };
        let fid = field("FID");
        let identity_key = identity_string(&fid)?;
        let name = field("GNIS_NAME");

        let mut attributes = Attributes::new();
        attributes.insert("AREASQKM".into(), field("AREASQKM"));
        attributes.insert("FID".into(), fid);
        attributes.insert("GNIS_NAME".into(), name.clone());
        attributes.insert("locationName".into(), name);
        attributes.insert("monitoringType".into(), Scalar::from(CYAN_MONITORING_TYPE));
        attributes.insert("oid".into(), field("OBJECTID"));
        attributes.insert("orgName".into(), Scalar::from(CYAN_ORG_NAME));

        Some(FeatureRecord::new(identity_key, geometry, attributes))
    }
}

/// Waterbodies source whose layer URL is looked up in the services document.
pub fn cyan_source(
    cache: Arc<LookupCache>,
    services_url: impl Into<String>,
    out_sr: SpatialReference,
) -> ArcGisQuerySource {
    ArcGisQuerySource::new(
        CYAN_LAYER_ID,
        ServiceEndpoint::Lookup {
            cache,
            resource: SERVICES_RESOURCE.to_string(),
            document_url: services_url.into(),
            pointer: CYAN_SERVICES_POINTER.to_string(),
        },
        out_sr,
    )
}

pub fn cyan_engine<S>(source: Arc<S>, config: SyncConfig) -> SyncEngine<S, CyanWaterbodyMapper>
where
    S: FeatureSource + ?Sized + 'static,
{
    let pipeline = FetchPipeline::new(source, Arc::new(CyanWaterbodyMapper::new()));
    SyncEngine::new(LayerId::new(CYAN_LAYER_ID), config, pipeline)
}
