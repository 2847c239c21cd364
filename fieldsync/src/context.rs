//! Contexte applicatif du client terrain
//!
//! Regroupe explicitement le stockage local, la couche de parcelles, le
//! résolveur et les collaborateurs distants. Aucun état global.

use std::time::Duration;

use parcels::{ParcelLayer, QueryPoint};
use tracing::debug;

use crate::config::ClientConfig;
use crate::error::FieldSyncError;
use crate::ids::IdGenerator;
use crate::observations::{submit_observation, Observation, ObservationForm};
use crate::reference::{self, ReferenceSyncReport};
use crate::remote::{
    Connectivity, FeatureInfoSource, FixedConnectivity, HttpRemote, IngestionEndpoint,
    ReferenceSource, TcpProbe,
};
use crate::resolver::{ResolvedParcel, Resolver};
use crate::store::LocalStore;
use crate::uploader::{self, UploadOutcome};

/// Collaborateurs distants injectés dans le contexte
pub struct Remotes {
    pub reference: Box<dyn ReferenceSource>,
    pub feature_info: Box<dyn FeatureInfoSource>,
    pub ingest: Box<dyn IngestionEndpoint>,
    pub connectivity: Box<dyn Connectivity>,
}

impl Remotes {
    /// Collaborateurs HTTP ; `offline` force la connectivité à hors ligne
    pub fn http(config: &ClientConfig, offline: bool) -> Result<Self, FieldSyncError> {
        let remote = HttpRemote::new(config)?;
        let connectivity: Box<dyn Connectivity> = if offline {
            Box::new(FixedConnectivity(false))
        } else {
            let timeout = Duration::from_millis(config.probe_timeout_ms);
            match TcpProbe::for_url(&config.feature_info_url, timeout) {
                Some(probe) => Box::new(probe),
                None => {
                    debug!(url = %config.feature_info_url, "No probe address, assuming online");
                    Box::new(FixedConnectivity(true))
                }
            }
        };

        Ok(Self {
            reference: Box::new(remote.clone()),
            feature_info: Box::new(remote.clone()),
            ingest: Box::new(remote),
            connectivity,
        })
    }
}

/// État d'une session du client
pub struct AppContext {
    store: LocalStore,
    layer: ParcelLayer,
    resolver: Resolver,
    remotes: Remotes,
    ids: Box<dyn IdGenerator>,
    id_property: String,
}

impl AppContext {
    /// Construit le contexte et redessine la couche depuis le cache local
    pub fn new(
        store: LocalStore,
        remotes: Remotes,
        ids: Box<dyn IdGenerator>,
        config: &ClientConfig,
    ) -> Result<Self, FieldSyncError> {
        let mut layer = ParcelLayer::new(config.hit_tolerance_px);
        let rendered = reference::reload_layer(&store, &mut layer)?;
        debug!(rendered, "Parcel layer restored from local store");

        Ok(Self {
            store,
            layer,
            resolver: Resolver::new(),
            remotes,
            ids,
            id_property: config.id_property.clone(),
        })
    }

    pub fn store(&self) -> &LocalStore {
        &self.store
    }

    pub fn layer(&self) -> &ParcelLayer {
        &self.layer
    }

    pub fn selected(&self) -> Option<&str> {
        self.resolver.selected()
    }

    pub async fn is_online(&self) -> bool {
        self.remotes.connectivity.is_online().await
    }

    pub fn parcel_count(&self) -> Result<usize, FieldSyncError> {
        Ok(self.store.parcel_count()?)
    }

    pub async fn sync_reference_data(&mut self) -> Result<ReferenceSyncReport, FieldSyncError> {
        reference::sync_reference_data(
            &self.store,
            self.remotes.reference.as_ref(),
            &mut self.layer,
            &self.id_property,
        )
        .await
    }

    pub fn clear_parcels(&mut self) -> Result<usize, FieldSyncError> {
        self.resolver.clear_selection();
        reference::clear_parcels(&self.store, &mut self.layer)
    }

    pub async fn resolve_at(
        &mut self,
        point: &QueryPoint,
    ) -> Result<Option<ResolvedParcel>, FieldSyncError> {
        self.resolver
            .resolve_at(
                point,
                &self.layer,
                self.remotes.feature_info.as_ref(),
                self.remotes.connectivity.as_ref(),
            )
            .await
    }

    pub fn submit(&self, form: &mut ObservationForm) -> Result<Observation, FieldSyncError> {
        submit_observation(&self.store, self.ids.as_ref(), form)
    }

    pub fn records(&self) -> Result<Vec<Observation>, FieldSyncError> {
        Ok(self.store.observations()?)
    }

    pub async fn upload_unsynced(&self) -> Result<UploadOutcome, FieldSyncError> {
        uploader::upload_unsynced(&self.store, self.remotes.ingest.as_ref()).await
    }

    pub fn clear_records(&self) -> Result<usize, FieldSyncError> {
        uploader::clear_records(&self.store)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ids::{SequentialIds, UuidGenerator};
    use crate::remote::IngestReply;
    use crate::test_support::{feature_collection, FakeFeatureInfo, FakeIngest, FakeReference};

    fn context(online: bool) -> AppContext {
        let remotes = Remotes {
            reference: Box::new(FakeReference::body(feature_collection(&["P1", "P2", "P3"]))),
            feature_info: Box::new(FakeFeatureInfo::miss()),
            ingest: Box::new(FakeIngest::replying(IngestReply::ok())),
            connectivity: Box::new(FixedConnectivity(online)),
        };
        AppContext::new(
            LocalStore::open_in_memory().unwrap(),
            remotes,
            Box::new(SequentialIds::new("obs")),
            &ClientConfig::default(),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_offline_session() {
        let mut ctx = context(true);
        ctx.sync_reference_data().await.unwrap();
        assert_eq!(ctx.parcel_count().unwrap(), 3);

        let resolved = ctx
            .resolve_at(&QueryPoint::new(250.0, 50.0, 1.0))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(resolved.id, "P2");
        assert_eq!(ctx.selected(), Some("P2"));

        let mut form = ObservationForm {
            parcel_ref: resolved.id,
            crop: "rice".into(),
            season: "Maha".into(),
            area_ha: "1.5".into(),
            expected_yield: "2000".into(),
        };
        let saved = ctx.submit(&mut form).unwrap();
        assert_eq!(saved.local_id, "obs-1");

        assert_eq!(
            ctx.upload_unsynced().await.unwrap(),
            UploadOutcome::Uploaded { count: 1 }
        );
        assert_eq!(
            ctx.upload_unsynced().await.unwrap(),
            UploadOutcome::NothingToSync
        );
    }

    #[tokio::test]
    async fn test_layer_restored_from_store() {
        let dir = tempfile::tempdir().unwrap();
        let config = ClientConfig {
            database_path: dir.path().join("fieldsync.db"),
            ..ClientConfig::default()
        };

        let remotes = || Remotes {
            reference: Box::new(FakeReference::body(feature_collection(&["P1", "P2"]))),
            feature_info: Box::new(FakeFeatureInfo::miss()),
            ingest: Box::new(FakeIngest::replying(IngestReply::ok())),
            connectivity: Box::new(FixedConnectivity(false)),
        };

        {
            let store = LocalStore::open(&config.database_path).unwrap();
            let mut ctx =
                AppContext::new(store, remotes(), Box::new(UuidGenerator), &config).unwrap();
            ctx.sync_reference_data().await.unwrap();
        }

        let store = LocalStore::open(&config.database_path).unwrap();
        let ctx = AppContext::new(store, remotes(), Box::new(UuidGenerator), &config).unwrap();
        assert_eq!(ctx.layer().len(), 2);
    }

    #[tokio::test]
    async fn test_clear_parcels_resets_selection() {
        let mut ctx = context(false);
        ctx.sync_reference_data().await.unwrap();
        ctx.resolve_at(&QueryPoint::new(50.0, 50.0, 1.0)).await.unwrap();
        assert_eq!(ctx.selected(), Some("P1"));

        assert_eq!(ctx.clear_parcels().unwrap(), 3);
        assert!(ctx.selected().is_none());
        assert!(ctx.layer().is_empty());
    }
}
