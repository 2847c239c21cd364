//! Décodage des réponses GeoJSON du serveur cartographique
//!
//! - WFS GetFeature (`outputFormat=application/json`) → parcelles de référence
//! - WMS GetFeatureInfo (`INFO_FORMAT=application/json`) → identifiant cliqué

use std::collections::HashMap;

use geojson::GeoJson;
use serde_json::Value;
use tracing::{debug, warn};

use crate::{DecodedCollection, Parcel, ParcelError};

/// Décode une FeatureCollection WFS en parcelles
///
/// L'identifiant est lu dans la propriété `id_property` (ex: `landuse_id`).
/// Les features sans identifiant sont ignorées et comptées ; une géométrie
/// nulle est conservée telle quelle.
/// En cas d'identifiant dupliqué, la dernière occurrence l'emporte.
pub fn decode_feature_collection(
    body: &str,
    id_property: &str,
) -> Result<DecodedCollection, ParcelError> {
    let geojson: GeoJson = body.parse()?;
    let collection = match geojson {
        GeoJson::FeatureCollection(fc) => fc,
        GeoJson::Feature(_) => {
            return Err(ParcelError::GeoJson(
                "expected a FeatureCollection, got a single Feature".into(),
            ))
        }
        GeoJson::Geometry(_) => {
            return Err(ParcelError::GeoJson(
                "expected a FeatureCollection, got a bare Geometry".into(),
            ))
        }
    };

    let mut decoded = DecodedCollection::default();
    let mut position_by_id: HashMap<String, usize> = HashMap::new();

    for (index, feature) in collection.features.into_iter().enumerate() {
        let attributes = feature.properties.unwrap_or_default();

        let Some(id) = attributes.get(id_property).and_then(property_as_id) else {
            warn!(index, property = id_property, "Feature without identifier, skipped");
            decoded.skipped += 1;
            continue;
        };

        if feature.geometry.is_none() {
            debug!(index, id = %id, "Feature without geometry");
        }

        let parcel = Parcel {
            id: id.clone(),
            attributes,
            shape: feature.geometry,
        };

        match position_by_id.get(&id) {
            Some(&pos) => {
                debug!(id = %id, "Duplicate identifier, keeping last occurrence");
                decoded.parcels[pos] = parcel;
            }
            None => {
                position_by_id.insert(id, decoded.parcels.len());
                decoded.parcels.push(parcel);
            }
        }
    }

    Ok(decoded)
}

/// Extrait l'identifiant de la première feature d'une réponse GetFeatureInfo
///
/// Une réponse sans `features` ou avec une liste vide n'est pas une erreur :
/// aucune parcelle n'existe au point cliqué. Seule la première feature est
/// examinée ; si elle ne porte pas l'identifiant, il n'y a pas de résultat.
pub fn first_feature_id(body: &str, id_property: &str) -> Result<Option<String>, ParcelError> {
    let value: Value = serde_json::from_str(body)?;

    let Some(first) = value
        .get("features")
        .and_then(Value::as_array)
        .and_then(|features| features.first())
    else {
        return Ok(None);
    };

    let id = first
        .get("properties")
        .and_then(|props| props.get(id_property))
        .and_then(property_as_id);

    if id.is_none() {
        warn!(property = id_property, "Feature info reply has no identifier");
    }

    Ok(id)
}

/// Convertit une valeur de propriété en identifiant texte
///
/// GeoServer publie les clés numériques comme des nombres JSON.
pub fn property_as_id(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}
