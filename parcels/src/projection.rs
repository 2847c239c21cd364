//! Projection Web Mercator (EPSG:3857)
//!
//! Les parcelles sont publiées en EPSG:3857, la saisie CLI se fait en degrés.

use crate::QueryPoint;

/// Rayon équatorial WGS84 en mètres (modèle sphérique Web Mercator)
pub const EARTH_RADIUS: f64 = 6378137.0;

/// Résolution (m/px) d'une tuile 256px au zoom 0
pub const ZOOM0_RESOLUTION: f64 = 2.0 * std::f64::consts::PI * EARTH_RADIUS / 256.0;

/// Taille en pixels de l'image virtuelle d'une requête GetFeatureInfo
pub const FEATURE_INFO_SIZE: u32 = 101;

/// Convertit des degrés WGS84 vers Web Mercator
pub fn lon_lat_to_web_mercator(lon_deg: f64, lat_deg: f64) -> (f64, f64) {
    // Limiter la latitude pour éviter l'infini
    let lat = lat_deg.clamp(-85.0, 85.0).to_radians();
    let lon = lon_deg.to_radians();

    let x = EARTH_RADIUS * lon;
    let y = EARTH_RADIUS * (std::f64::consts::FRAC_PI_4 + lat / 2.0).tan().ln();

    (x, y)
}

/// Convertit Web Mercator vers des degrés WGS84
pub fn web_mercator_to_lon_lat(x: f64, y: f64) -> (f64, f64) {
    let lon = x / EARTH_RADIUS;
    let lat = 2.0 * (y / EARTH_RADIUS).exp().atan() - std::f64::consts::FRAC_PI_2;

    (lon.to_degrees(), lat.to_degrees())
}

/// Résolution de la vue pour un niveau de zoom
pub fn resolution_for_zoom(zoom: f64) -> f64 {
    ZOOM0_RESOLUTION / 2f64.powf(zoom)
}

/// Emprise `[minx, miny, maxx, maxy]` de l'image GetFeatureInfo centrée sur le point
///
/// Le pixel interrogé est alors `(FEATURE_INFO_SIZE / 2, FEATURE_INFO_SIZE / 2)`.
pub fn feature_info_bbox(point: &QueryPoint) -> [f64; 4] {
    let half = f64::from(FEATURE_INFO_SIZE) * point.resolution / 2.0;
    [
        point.x - half,
        point.y - half,
        point.x + half,
        point.y + half,
    ]
}

/// Pixel (I, J) interrogé dans l'image GetFeatureInfo
pub fn feature_info_pixel() -> (u32, u32) {
    (FEATURE_INFO_SIZE / 2, FEATURE_INFO_SIZE / 2)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_colombo_to_web_mercator() {
        // Colombo: 79.86°E, 6.93°N
        let (x, y) = lon_lat_to_web_mercator(79.86, 6.93);

        // X ≈ 8 889 900, Y ≈ 773 300
        assert!((x - 8_889_900.0).abs() < 1000.0, "x={}", x);
        assert!((y - 773_300.0).abs() < 2000.0, "y={}", y);
    }

    #[test]
    fn test_roundtrip() {
        let (x, y) = lon_lat_to_web_mercator(80.7, 7.8);
        let (lon, lat) = web_mercator_to_lon_lat(x, y);

        assert!((lon - 80.7).abs() < 1e-9, "lon={}", lon);
        assert!((lat - 7.8).abs() < 1e-9, "lat={}", lat);
    }

    #[test]
    fn test_latitude_is_clamped() {
        let (_, y) = lon_lat_to_web_mercator(0.0, 90.0);
        assert!(y.is_finite());
    }

    #[test]
    fn test_resolution_for_zoom() {
        assert!((resolution_for_zoom(0.0) - 156_543.033_928).abs() < 1e-3);
        assert!((resolution_for_zoom(8.0) - 611.496_226).abs() < 1e-3);
        assert!((resolution_for_zoom(1.0) * 2.0 - resolution_for_zoom(0.0)).abs() < 1e-6);
    }

    #[test]
    fn test_feature_info_bbox_is_centered() {
        let point = QueryPoint::new(1000.0, 2000.0, 2.0);
        let [minx, miny, maxx, maxy] = feature_info_bbox(&point);

        assert_eq!(maxx - minx, 202.0);
        assert_eq!(maxy - miny, 202.0);
        assert_eq!((minx + maxx) / 2.0, 1000.0);
        assert_eq!((miny + maxy) / 2.0, 2000.0);
        assert_eq!(feature_info_pixel(), (50, 50));
    }
}
