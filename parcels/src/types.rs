//! Types de données pour le crate parcels

use geojson::JsonObject;
use serde::{Deserialize, Serialize};

/// Parcelle de référence telle que publiée par le service WFS
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Parcel {
    /// Identifiant externe stable (clé unique)
    pub id: String,

    /// Attributs de la feature, opaques pour le coeur de synchronisation
    pub attributes: JsonObject,

    /// Géométrie GeoJSON, en EPSG:3857 ; `None` si le service publie
    /// `"geometry": null` (la parcelle reste consultable par identifiant)
    pub shape: Option<geojson::Geometry>,
}

/// Point cliqué par l'utilisateur sur la carte
///
/// Coordonnées en Web Mercator (mètres) et résolution courante de la vue
/// (mètres par pixel). La résolution sert à convertir la tolérance de clic
/// en unités carte et à dimensionner la requête GetFeatureInfo.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct QueryPoint {
    pub x: f64,
    pub y: f64,
    pub resolution: f64,
}

impl QueryPoint {
    pub fn new(x: f64, y: f64, resolution: f64) -> Self {
        Self { x, y, resolution }
    }

    /// Crée depuis des degrés WGS84 et un niveau de zoom
    pub fn from_lon_lat(lon_deg: f64, lat_deg: f64, zoom: f64) -> Self {
        let (x, y) = crate::projection::lon_lat_to_web_mercator(lon_deg, lat_deg);
        Self::new(x, y, crate::projection::resolution_for_zoom(zoom))
    }

    pub fn as_point(&self) -> geo::Point<f64> {
        geo::Point::new(self.x, self.y)
    }
}

/// Résultat du décodage d'une FeatureCollection WFS
#[derive(Debug, Clone, Default)]
pub struct DecodedCollection {
    /// Parcelles retenues, dans l'ordre du document
    pub parcels: Vec<Parcel>,

    /// Features ignorées faute d'identifiant
    pub skipped: usize,
}
