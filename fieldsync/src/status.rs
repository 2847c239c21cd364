//! Messages de statut présentés à l'utilisateur
//!
//! Chaque action aboutit à exactement un [`Status`] ; chaque issue (succès,
//! chaque catégorie d'erreur, cas sans effet) a son propre message.

use std::fmt;

use crate::error::FieldSyncError;
use crate::observations::Observation;
use crate::reference::ReferenceSyncReport;
use crate::resolver::{ResolutionSource, ResolvedParcel};
use crate::uploader::UploadOutcome;

/// Issue d'une action utilisateur
#[derive(Debug, Clone, PartialEq)]
pub enum Status {
    ParcelsSynced(ReferenceSyncReport),
    ParcelSyncFailed(String),
    ParcelsCleared(usize),
    NoOfflineParcels,
    ParcelSelected(ResolvedParcel),
    NoFeature,
    LookupFailed(String),
    Saved(String),
    ValidationFailed(String),
    SaveFailed(String),
    NothingToSync,
    UploadComplete(usize),
    UploadFailed(String),
    RecordsCleared(usize),
    ClearFailed(String),
    ReadFailed(String),
}

impl Status {
    pub fn is_failure(&self) -> bool {
        matches!(
            self,
            Status::ParcelSyncFailed(_)
                | Status::LookupFailed(_)
                | Status::ValidationFailed(_)
                | Status::SaveFailed(_)
                | Status::UploadFailed(_)
                | Status::ClearFailed(_)
                | Status::ReadFailed(_)
        )
    }

    pub fn from_reference_sync(result: &Result<ReferenceSyncReport, FieldSyncError>) -> Self {
        match result {
            Ok(report) => Status::ParcelsSynced(*report),
            Err(e) => Status::ParcelSyncFailed(e.to_string()),
        }
    }

    pub fn from_resolution(result: &Result<Option<ResolvedParcel>, FieldSyncError>) -> Self {
        match result {
            Ok(Some(resolved)) => Status::ParcelSelected(resolved.clone()),
            Ok(None) => Status::NoFeature,
            Err(e) => Status::LookupFailed(e.to_string()),
        }
    }

    pub fn from_submission(result: &Result<Observation, FieldSyncError>) -> Self {
        match result {
            Ok(observation) => Status::Saved(observation.local_id.clone()),
            Err(FieldSyncError::Validation { field, reason }) => {
                Status::ValidationFailed(format!("{}: {}", field, reason))
            }
            Err(e) => Status::SaveFailed(e.to_string()),
        }
    }

    pub fn from_upload(result: &Result<UploadOutcome, FieldSyncError>) -> Self {
        match result {
            Ok(UploadOutcome::NothingToSync) => Status::NothingToSync,
            Ok(UploadOutcome::Uploaded { count }) => Status::UploadComplete(*count),
            Err(e) => Status::UploadFailed(e.to_string()),
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Status::ParcelsSynced(report) if report.skipped > 0 => write!(
                f,
                "Parcels synced: {} ({} skipped)",
                report.stored, report.skipped
            ),
            Status::ParcelsSynced(report) => write!(f, "Parcels synced: {}", report.stored),
            Status::ParcelSyncFailed(e) => write!(f, "Parcel sync failed: {}", e),
            Status::ParcelsCleared(n) => write!(f, "Cleared offline parcels ({})", n),
            Status::NoOfflineParcels => write!(
                f,
                "No offline parcels yet. Run sync-parcels while online."
            ),
            Status::ParcelSelected(resolved) => match resolved.source {
                ResolutionSource::Local => write!(f, "Selected (offline): {}", resolved.id),
                ResolutionSource::Remote => write!(f, "Selected (online): {}", resolved.id),
            },
            Status::NoFeature => write!(f, "No feature at this location."),
            Status::LookupFailed(e) => write!(f, "Feature lookup failed: {}", e),
            Status::Saved(id) => write!(f, "Saved offline! ({})", id),
            Status::ValidationFailed(e) => write!(f, "Not saved, invalid {}", e),
            Status::SaveFailed(e) => write!(f, "Failed to save offline: {}", e),
            Status::NothingToSync => write!(f, "No data to sync."),
            Status::UploadComplete(n) => write!(f, "Sync complete! {} record(s) uploaded", n),
            Status::UploadFailed(e) => write!(f, "Sync failed: {}", e),
            Status::RecordsCleared(n) => write!(f, "Cleared local records ({})", n),
            Status::ClearFailed(e) => write!(f, "Clear failed: {}", e),
            Status::ReadFailed(e) => write!(f, "Failed to read local store: {}", e),
        }
    }
}

/// Badge de connectivité
pub fn connectivity_badge(online: bool) -> &'static str {
    if online {
        "Online"
    } else {
        "Offline"
    }
}

/// Indicateur du nombre de parcelles en cache
pub fn parcel_count_badge(count: usize) -> String {
    format!("Parcels: {}", count)
}

/// Tableau des observations locales
pub fn records_table(observations: &[Observation]) -> String {
    if observations.is_empty() {
        return "No local records.".to_string();
    }

    let mut out = format!(
        "{:<38} {:<12} {:<12} {:<10} {:>10} {:>14} {}\n",
        "temp_id", "landuse_id", "crop", "season", "area_ha", "expected_yield", "synced"
    );
    for o in observations {
        out.push_str(&format!(
            "{:<38} {:<12} {:<12} {:<10} {:>10} {:>14} {}\n",
            o.local_id,
            o.parcel_ref,
            o.crop,
            o.season,
            o.area_ha,
            o.expected_yield,
            if o.synced { "yes" } else { "no" }
        ));
    }
    let pending = observations.iter().filter(|o| !o.synced).count();
    out.push_str(&format!(
        "{} record(s), {} pending upload",
        observations.len(),
        pending
    ));
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn observation(id: &str, synced: bool) -> Observation {
        Observation {
            local_id: id.into(),
            parcel_ref: "P2".into(),
            crop: "rice".into(),
            season: "Maha".into(),
            area_ha: 1.5,
            expected_yield: 2000.0,
            synced,
        }
    }

    #[test]
    fn test_messages_are_distinct() {
        let statuses = [
            Status::ParcelsSynced(ReferenceSyncReport::default()),
            Status::ParcelSyncFailed("x".into()),
            Status::ParcelsCleared(0),
            Status::NoOfflineParcels,
            Status::ParcelSelected(ResolvedParcel {
                id: "x".into(),
                source: ResolutionSource::Local,
            }),
            Status::ParcelSelected(ResolvedParcel {
                id: "x".into(),
                source: ResolutionSource::Remote,
            }),
            Status::NoFeature,
            Status::LookupFailed("x".into()),
            Status::Saved("x".into()),
            Status::ValidationFailed("x".into()),
            Status::SaveFailed("x".into()),
            Status::NothingToSync,
            Status::UploadComplete(0),
            Status::UploadFailed("x".into()),
            Status::RecordsCleared(0),
            Status::ClearFailed("x".into()),
            Status::ReadFailed("x".into()),
        ];

        let messages: HashSet<String> = statuses.iter().map(|s| s.to_string()).collect();
        assert_eq!(messages.len(), statuses.len());
    }

    #[test]
    fn test_from_submission() {
        let invalid = Err(FieldSyncError::validation("area_ha", "must be a number"));
        let status = Status::from_submission(&invalid);
        assert_eq!(status.to_string(), "Not saved, invalid area_ha: must be a number");
        assert!(status.is_failure());

        let saved = Status::from_submission(&Ok(observation("t-1", false)));
        assert_eq!(saved, Status::Saved("t-1".into()));
        assert!(!saved.is_failure());
    }

    #[test]
    fn test_from_upload() {
        assert_eq!(
            Status::from_upload(&Ok(UploadOutcome::NothingToSync)),
            Status::NothingToSync
        );
        let failed = Status::from_upload(&Err(FieldSyncError::ServerLogic("DB down".into())));
        assert_eq!(failed.to_string(), "Sync failed: Server error: DB down");
    }

    #[test]
    fn test_badges() {
        assert_eq!(connectivity_badge(true), "Online");
        assert_eq!(connectivity_badge(false), "Offline");
        assert_eq!(parcel_count_badge(42), "Parcels: 42");
    }

    #[test]
    fn test_records_table() {
        let table = records_table(&[observation("t-1", true), observation("t-2", false)]);
        assert!(table.starts_with("temp_id"));
        assert!(table.ends_with("2 record(s), 1 pending upload"));
        assert_eq!(records_table(&[]), "No local records.");
    }
}
