//! Doublures des collaborateurs distants pour les tests unitaires

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use parcels::QueryPoint;
use serde_json::json;

use crate::error::FieldSyncError;
use crate::observations::Observation;
use crate::remote::{FeatureInfoSource, IngestReply, IngestionEndpoint, ReferenceSource};

/// FeatureCollection de carrés 100 × 100 m alignés sur l'axe X
///
/// La parcelle `i` couvre `[i*200, i*200+100] × [0, 100]`.
pub fn feature_collection(ids: &[&str]) -> String {
    let features: Vec<_> = ids
        .iter()
        .enumerate()
        .map(|(i, id)| {
            let x0 = i as f64 * 200.0;
            let x1 = x0 + 100.0;
            json!({
                "type": "Feature",
                "id": format!("landuse_master.{}", i + 1),
                "geometry": {
                    "type": "Polygon",
                    "coordinates": [[[x0, 0.0], [x1, 0.0], [x1, 100.0], [x0, 100.0], [x0, 0.0]]]
                },
                "properties": {
                    "landuse_id": id,
                    "landuse": "paddy",
                    "gnd": "Kelaniya"
                }
            })
        })
        .collect();

    json!({ "type": "FeatureCollection", "features": features }).to_string()
}

pub enum FakeReference {
    Body(String),
    HttpError(u16),
}

impl FakeReference {
    pub fn body(body: String) -> Self {
        Self::Body(body)
    }

    pub fn http_error(status: u16) -> Self {
        Self::HttpError(status)
    }
}

#[async_trait]
impl ReferenceSource for FakeReference {
    async fn fetch_reference(&self) -> Result<String, FieldSyncError> {
        match self {
            Self::Body(body) => Ok(body.clone()),
            Self::HttpError(status) => Err(FieldSyncError::http_status(*status, "unavailable")),
        }
    }
}

pub struct FakeFeatureInfo {
    reply: Result<Option<String>, u16>,
    calls: AtomicUsize,
}

impl FakeFeatureInfo {
    pub fn hit(id: &str) -> Self {
        Self {
            reply: Ok(Some(id.to_string())),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn miss() -> Self {
        Self {
            reply: Ok(None),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn failing() -> Self {
        Self {
            reply: Err(502),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl FeatureInfoSource for FakeFeatureInfo {
    async fn feature_info(&self, _point: &QueryPoint) -> Result<Option<String>, FieldSyncError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match &self.reply {
            Ok(id) => Ok(id.clone()),
            Err(status) => Err(FieldSyncError::http_status(*status, "Bad Gateway")),
        }
    }
}

pub struct FakeIngest {
    reply: Result<IngestReply, u16>,
    batches: Mutex<Vec<Vec<String>>>,
}

impl FakeIngest {
    pub fn replying(reply: IngestReply) -> Self {
        Self {
            reply: Ok(reply),
            batches: Mutex::new(Vec::new()),
        }
    }

    pub fn failing(status: u16) -> Self {
        Self {
            reply: Err(status),
            batches: Mutex::new(Vec::new()),
        }
    }

    /// `local_id` de chaque lot reçu, dans l'ordre
    pub fn batches(&self) -> Vec<Vec<String>> {
        self.batches.lock().unwrap().clone()
    }
}

#[async_trait]
impl IngestionEndpoint for FakeIngest {
    async fn submit(&self, records: &[Observation]) -> Result<IngestReply, FieldSyncError> {
        self.batches
            .lock()
            .unwrap()
            .push(records.iter().map(|r| r.local_id.clone()).collect());
        match &self.reply {
            Ok(reply) => Ok(reply.clone()),
            Err(status) => Err(FieldSyncError::http_status(*status, "Internal Server Error")),
        }
    }
}
