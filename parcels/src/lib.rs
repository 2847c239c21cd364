//! # parcels
//!
//! Couche de référence des parcelles pour la saisie terrain hors ligne.
//!
//! ## Features
//!
//! - Décodage des FeatureCollection WFS (GeoJSON) en [`Parcel`]
//! - Lecture de l'identifiant dans les réponses WMS GetFeatureInfo
//! - Conversions Web Mercator (EPSG:3857) et résolution par niveau de zoom
//! - [`ParcelLayer`] : rendu en mémoire et test de clic avec tolérance en pixels
//!
//! ## Usage
//!
//! ```rust,ignore
//! use parcels::{decode_feature_collection, HitTest, ParcelLayer, QueryPoint};
//!
//! let decoded = decode_feature_collection(&body, "landuse_id")?;
//! let mut layer = ParcelLayer::default();
//! layer.load(&decoded.parcels);
//!
//! let point = QueryPoint::from_lon_lat(80.7, 7.8, 18.0);
//! if let Some(id) = layer.hit_test(&point) {
//!     println!("landuse_id: {}", id);
//! }
//! ```

pub mod collection;
pub mod error;
pub mod layer;
pub mod projection;
pub mod types;

pub use collection::{decode_feature_collection, first_feature_id, property_as_id};
pub use error::ParcelError;
pub use layer::{layer_geometry, HitTest, ParcelLayer, DEFAULT_HIT_TOLERANCE_PX};
pub use types::{DecodedCollection, Parcel, QueryPoint};

/// Propriété portant l'identifiant de parcelle dans la couche GeoServer
pub const DEFAULT_ID_PROPERTY: &str = "landuse_id";
