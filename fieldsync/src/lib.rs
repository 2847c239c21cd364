//! # fieldsync
//!
//! Saisie terrain hors ligne : cache des parcelles de référence, résolution
//! d'un clic vers une parcelle, file d'observations et envoi groupé.
//!
//! ## Features
//!
//! - Stockage local SQLite (parcelles + observations), migrations versionnées
//! - Synchronisation de référence WFS avec remplacement atomique du cache
//! - Résolution hors ligne d'abord, GetFeatureInfo en secours si en ligne
//! - Validation des saisies, file `synced`, envoi `{records}` idempotent
//! - Service d'ingestion `POST /sync` (PostgreSQL ou mémoire)
//!
//! ## Usage CLI
//!
//! ```bash
//! # Mettre en cache les parcelles (en ligne)
//! fieldsync sync-parcels
//!
//! # Sur le terrain, hors ligne
//! fieldsync --offline submit --lon 79.95 --lat 6.98 \
//!     --crop rice --season Maha --area-ha 1.5 --expected-yield 2000
//!
//! # De retour en ligne
//! fieldsync upload
//!
//! # Serveur d'ingestion
//! fieldsync serve --listen 0.0.0.0:8000 --conflict-key local-id
//! ```

pub mod config;
pub mod context;
pub mod error;
pub mod ids;
pub mod ingest;
pub mod observations;
pub mod reference;
pub mod remote;
pub mod resolver;
pub mod status;
pub mod store;
pub mod uploader;

#[cfg(test)]
pub(crate) mod test_support;

pub use parcels;

pub use config::ClientConfig;
pub use context::{AppContext, Remotes};
pub use error::FieldSyncError;
pub use ids::{IdGenerator, SequentialIds, UuidGenerator};
pub use observations::{submit_observation, Observation, ObservationForm};
pub use reference::{sync_reference_data, ReferenceSyncReport};
pub use resolver::{ResolutionSource, ResolvedParcel, Resolver};
pub use status::Status;
pub use store::{FieldUpdate, LocalStore, StoreError};
pub use uploader::{upload_unsynced, UploadOutcome};
