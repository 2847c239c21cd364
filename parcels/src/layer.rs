//! Couche de parcelles en mémoire et test de clic
//!
//! La couche est reconstruite depuis le stockage local après chaque
//! synchronisation ; c'est elle qui répond au clic hors ligne.

use geo::{Contains, EuclideanDistance, Geometry, Point};
use tracing::{debug, warn};

use crate::{Parcel, ParcelError, QueryPoint};

/// Tolérance de clic par défaut, en pixels
pub const DEFAULT_HIT_TOLERANCE_PX: f64 = 5.0;

/// Capacité de test de clic fournie au résolveur
pub trait HitTest {
    /// Retourne l'identifiant de la première parcelle touchée au point donné
    fn hit_test(&self, point: &QueryPoint) -> Option<&str>;
}

#[derive(Debug, Clone)]
struct LayerFeature {
    id: String,
    geometry: Geometry<f64>,
}

/// Rendu en mémoire des parcelles du cache local
#[derive(Debug, Clone)]
pub struct ParcelLayer {
    features: Vec<LayerFeature>,
    hit_tolerance_px: f64,
}

impl Default for ParcelLayer {
    fn default() -> Self {
        Self::new(DEFAULT_HIT_TOLERANCE_PX)
    }
}

impl ParcelLayer {
    pub fn new(hit_tolerance_px: f64) -> Self {
        Self {
            features: Vec::new(),
            hit_tolerance_px: hit_tolerance_px.max(0.0),
        }
    }

    /// Remplace le contenu de la couche par les parcelles données
    ///
    /// Retourne le nombre de parcelles effectivement dessinées. Les
    /// parcelles sans géométrie ne sont pas dessinées ; une géométrie non
    /// convertible est ignorée avec un warning.
    pub fn load(&mut self, parcels: &[Parcel]) -> usize {
        self.features.clear();

        for parcel in parcels {
            match layer_geometry(parcel) {
                Ok(Some(geometry)) => self.features.push(LayerFeature {
                    id: parcel.id.clone(),
                    geometry,
                }),
                Ok(None) => debug!(id = %parcel.id, "Parcel without geometry, not drawn"),
                Err(e) => warn!(error = %e, "Unusable parcel geometry"),
            }
        }

        debug!(features = self.features.len(), "Parcel layer loaded");
        self.features.len()
    }

    pub fn clear(&mut self) {
        self.features.clear();
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    pub fn contains_id(&self, id: &str) -> bool {
        self.features.iter().any(|f| f.id == id)
    }
}

impl HitTest for ParcelLayer {
    fn hit_test(&self, point: &QueryPoint) -> Option<&str> {
        let tolerance = self.hit_tolerance_px * point.resolution.abs();
        let target = point.as_point();

        // Pas d'ordre de priorité : la première parcelle touchée gagne
        self.features
            .iter()
            .find(|f| geometry_hit(&f.geometry, target, tolerance))
            .map(|f| f.id.as_str())
    }
}

/// Convertit la géométrie d'une parcelle vers les types `geo`
///
/// `Ok(None)` pour une parcelle publiée sans géométrie.
pub fn layer_geometry(parcel: &Parcel) -> Result<Option<Geometry<f64>>, ParcelError> {
    parcel
        .shape
        .clone()
        .map(|shape| {
            Geometry::<f64>::try_from(shape)
                .map_err(|e| ParcelError::invalid_geometry(parcel.id.as_str(), e.to_string()))
        })
        .transpose()
}

/// Teste si un point touche une géométrie, à `tolerance` unités carte près
fn geometry_hit(geometry: &Geometry<f64>, point: Point<f64>, tolerance: f64) -> bool {
    match geometry {
        Geometry::Polygon(p) => p.contains(&point) || p.euclidean_distance(&point) <= tolerance,
        Geometry::MultiPolygon(mp) => {
            mp.contains(&point) || mp.euclidean_distance(&point) <= tolerance
        }
        Geometry::Rect(r) => {
            let p = r.to_polygon();
            p.contains(&point) || p.euclidean_distance(&point) <= tolerance
        }
        Geometry::Triangle(t) => {
            let p = t.to_polygon();
            p.contains(&point) || p.euclidean_distance(&point) <= tolerance
        }
        Geometry::LineString(ls) => ls.euclidean_distance(&point) <= tolerance,
        Geometry::MultiLineString(mls) => mls
            .0
            .iter()
            .any(|ls| ls.euclidean_distance(&point) <= tolerance),
        Geometry::Line(l) => l.euclidean_distance(&point) <= tolerance,
        Geometry::Point(p) => p.euclidean_distance(&point) <= tolerance,
        Geometry::MultiPoint(mp) => mp
            .0
            .iter()
            .any(|p| p.euclidean_distance(&point) <= tolerance),
        Geometry::GeometryCollection(gc) => {
            gc.0.iter().any(|g| geometry_hit(g, point, tolerance))
        }
    }
}
