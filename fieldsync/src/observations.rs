//! File d'observations terrain
//!
//! Une observation est validée à la soumission du formulaire, enregistrée
//! localement avec `synced = false`, puis envoyée par l'uploader.

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::FieldSyncError;
use crate::ids::IdGenerator;
use crate::store::LocalStore;

/// Observation saisie par l'utilisateur
///
/// Les noms JSON (`temp_id`, `landuse_id`) sont ceux attendus par le
/// point d'ingestion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    /// Identifiant local, clé primaire durable
    #[serde(rename = "temp_id")]
    pub local_id: String,

    /// Identifiant de la parcelle observée (référence souple)
    #[serde(rename = "landuse_id")]
    pub parcel_ref: String,

    pub crop: String,
    pub season: String,

    /// Surface en hectares (> 0)
    pub area_ha: f64,

    /// Rendement attendu (>= 0)
    pub expected_yield: f64,

    #[serde(default)]
    pub synced: bool,
}

/// Formulaire de saisie brut, tel que tapé par l'utilisateur
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ObservationForm {
    pub parcel_ref: String,
    pub crop: String,
    pub season: String,
    pub area_ha: String,
    pub expected_yield: String,
}

/// Champs d'un formulaire ayant passé la validation
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedObservation {
    pub parcel_ref: String,
    pub crop: String,
    pub season: String,
    pub area_ha: f64,
    pub expected_yield: f64,
}

impl ObservationForm {
    /// Valide le formulaire ; la première condition en échec est retournée
    pub fn validate(&self) -> Result<ValidatedObservation, FieldSyncError> {
        let parcel_ref = self.parcel_ref.trim();
        if parcel_ref.is_empty() {
            return Err(FieldSyncError::validation(
                "landuse_id",
                "select a parcel on the map first",
            ));
        }

        let required = [
            ("crop", self.crop.trim()),
            ("season", self.season.trim()),
            ("area_ha", self.area_ha.trim()),
            ("expected_yield", self.expected_yield.trim()),
        ];
        if let Some((field, _)) = required.iter().find(|(_, value)| value.is_empty()) {
            return Err(FieldSyncError::validation(*field, "must not be blank"));
        }

        let area_ha = parse_number("area_ha", &self.area_ha)?;
        let expected_yield = parse_number("expected_yield", &self.expected_yield)?;

        if area_ha <= 0.0 {
            return Err(FieldSyncError::validation("area_ha", "must be greater than zero"));
        }
        if expected_yield < 0.0 {
            return Err(FieldSyncError::validation(
                "expected_yield",
                "must not be negative",
            ));
        }

        Ok(ValidatedObservation {
            parcel_ref: parcel_ref.to_string(),
            crop: self.crop.trim().to_string(),
            season: self.season.trim().to_string(),
            area_ha,
            expected_yield,
        })
    }

    /// Vide le formulaire après un enregistrement réussi
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

impl ValidatedObservation {
    pub fn into_observation(self, local_id: String) -> Observation {
        Observation {
            local_id,
            parcel_ref: self.parcel_ref,
            crop: self.crop,
            season: self.season,
            area_ha: self.area_ha,
            expected_yield: self.expected_yield,
            synced: false,
        }
    }
}

fn parse_number(field: &'static str, raw: &str) -> Result<f64, FieldSyncError> {
    match raw.trim().parse::<f64>() {
        Ok(value) if value.is_finite() => Ok(value),
        _ => Err(FieldSyncError::validation(field, "must be a number")),
    }
}

/// Valide le formulaire, enregistre l'observation et vide le formulaire
///
/// Une soumission rejetée ne touche pas au stockage local.
pub fn submit_observation(
    store: &LocalStore,
    ids: &dyn IdGenerator,
    form: &mut ObservationForm,
) -> Result<Observation, FieldSyncError> {
    let validated = form.validate()?;
    let observation = validated.into_observation(ids.next_id());

    store.add(&observation)?;
    info!(
        local_id = %observation.local_id,
        parcel = %observation.parcel_ref,
        "Observation saved offline"
    );

    form.reset();
    Ok(observation)
}
