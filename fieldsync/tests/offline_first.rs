//! Scénarios de bout en bout sur HTTP local
//!
//! Un faux GeoServer (WFS + WMS) et le service d'ingestion tournent sur des
//! ports éphémères ; le client utilise ses implémentations HTTP réelles.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::Query;
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{json, Value};
use tokio::net::TcpListener;

use fieldsync::ingest::{self, ConflictKey, MemorySink, ObservationSink};
use fieldsync::parcels::QueryPoint;
use fieldsync::{
    AppContext, ClientConfig, FieldUpdate, LocalStore, ObservationForm, Remotes,
    ResolutionSource, SequentialIds, Status, UploadOutcome,
};

fn wfs_body() -> String {
    let square = |x0: f64| {
        json!([[[[x0, 870000.0], [x0 + 100.0, 870000.0], [x0 + 100.0, 870100.0], [x0, 870100.0], [x0, 870000.0]]]])
    };
    json!({
        "type": "FeatureCollection",
        "totalFeatures": 3,
        "features": [
            {"type": "Feature", "id": "landuse_master.1",
             "geometry": {"type": "MultiPolygon", "coordinates": square(8983000.0)},
             "properties": {"landuse_id": "P1", "landuse": "Paddy"}},
            {"type": "Feature", "id": "landuse_master.2",
             "geometry": {"type": "MultiPolygon", "coordinates": square(8983200.0)},
             "properties": {"landuse_id": "P2", "landuse": "Paddy"}},
            {"type": "Feature", "id": "landuse_master.3",
             "geometry": {"type": "MultiPolygon", "coordinates": square(8983400.0)},
             "properties": {"landuse_id": "P3", "landuse": "Coconut"}}
        ]
    })
    .to_string()
}

/// GetFeatureInfo : une parcelle "P9" au centre de la fenêtre demandée
async fn feature_info(Query(params): Query<HashMap<String, String>>) -> Json<Value> {
    let well_formed = params.get("REQUEST").map(String::as_str) == Some("GetFeatureInfo")
        && params.get("INFO_FORMAT").map(String::as_str) == Some("application/json")
        && params.get("I").map(String::as_str) == Some("50")
        && params.contains_key("BBOX");

    if !well_formed {
        return Json(json!({"type": "FeatureCollection", "features": []}));
    }
    Json(json!({
        "type": "FeatureCollection",
        "features": [
            {"type": "Feature", "geometry": null, "properties": {"landuse_id": "P9"}},
            {"type": "Feature", "geometry": null, "properties": {"landuse_id": "P10"}}
        ]
    }))
}

async fn spawn(router: Router) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    addr
}

async fn spawn_geoserver() -> SocketAddr {
    let body = wfs_body();
    let router = Router::new()
        .route(
            "/geoserver/test/ows",
            get(move || {
                let body = body.clone();
                async move { body }
            }),
        )
        .route("/geoserver/test/wms", get(feature_info));
    spawn(router).await
}

async fn spawn_ingest(sink: Arc<dyn ObservationSink>) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        ingest::serve_on(listener, sink).await.unwrap();
    });
    addr
}

fn client_config(geoserver: SocketAddr, ingest: SocketAddr, dir: &tempfile::TempDir) -> ClientConfig {
    ClientConfig {
        reference_url: format!(
            "http://{}/geoserver/test/ows?service=WFS&request=GetFeature&outputFormat=application/json",
            geoserver
        ),
        feature_info_url: format!("http://{}/geoserver/test/wms", geoserver),
        ingest_url: format!("http://{}/sync", ingest),
        database_path: dir.path().join("fieldsync.db"),
        http_timeout_secs: Some(10),
        ..ClientConfig::default()
    }
}

fn context(config: &ClientConfig, offline: bool) -> AppContext {
    let store = LocalStore::open(&config.database_path).unwrap();
    let remotes = Remotes::http(config, offline).unwrap();
    AppContext::new(store, remotes, Box::new(SequentialIds::new("obs")), config).unwrap()
}

fn form(parcel: &str) -> ObservationForm {
    ObservationForm {
        parcel_ref: parcel.into(),
        crop: "rice".into(),
        season: "Maha".into(),
        area_ha: "1.5".into(),
        expected_yield: "2000".into(),
    }
}

#[tokio::test]
async fn test_sync_resolve_submit_upload() {
    let dir = tempfile::tempdir().unwrap();
    let sink = Arc::new(MemorySink::new(ConflictKey::LocalId));
    let geoserver = spawn_geoserver().await;
    let ingest_addr = spawn_ingest(sink.clone()).await;
    let config = client_config(geoserver, ingest_addr, &dir);
    let mut ctx = context(&config, true);

    // Référence : 3 parcelles
    let report = ctx.sync_reference_data().await.unwrap();
    assert_eq!(report.stored, 3);
    assert_eq!(ctx.parcel_count().unwrap(), 3);

    // Clic dans P2, hors ligne
    let resolved = ctx
        .resolve_at(&QueryPoint::new(8_983_250.0, 870_050.0, 0.6))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(resolved.id, "P2");
    assert_eq!(resolved.source, ResolutionSource::Local);

    // Saisie
    let saved = ctx.submit(&mut form(&resolved.id)).unwrap();
    let stored = ctx.store().observation(&saved.local_id).unwrap().unwrap();
    assert!(!stored.synced);
    assert_eq!(stored.parcel_ref, "P2");

    // Envoi
    let outcome = ctx.upload_unsynced().await.unwrap();
    assert_eq!(outcome, UploadOutcome::Uploaded { count: 1 });
    assert!(ctx.store().observation(&saved.local_id).unwrap().unwrap().synced);

    let rows = sink.rows();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].local_id, saved.local_id);
    assert_eq!(rows[0].area_ha, 1.5);

    // Déjà synchronisée : exclue du lot suivant
    assert_eq!(
        ctx.upload_unsynced().await.unwrap(),
        UploadOutcome::NothingToSync
    );
}

#[tokio::test]
async fn test_repeated_upload_is_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    let sink = Arc::new(MemorySink::new(ConflictKey::LocalId));
    let geoserver = spawn_geoserver().await;
    let ingest_addr = spawn_ingest(sink.clone()).await;
    let config = client_config(geoserver, ingest_addr, &dir);
    let ctx = context(&config, true);

    let first = ctx.submit(&mut form("P1")).unwrap();
    let second = ctx.submit(&mut form("P1")).unwrap();
    ctx.upload_unsynced().await.unwrap();
    let once = sink.rows();

    // Envoi interrompu avant le marquage : le même lot repart
    for id in [&first.local_id, &second.local_id] {
        ctx.store()
            .update_field(id, FieldUpdate::Synced(false))
            .unwrap();
    }
    assert_eq!(
        ctx.upload_unsynced().await.unwrap(),
        UploadOutcome::Uploaded { count: 2 }
    );

    assert_eq!(sink.rows(), once);
    assert_eq!(once.len(), 2);
}

#[tokio::test]
async fn test_remote_lookup_when_online_and_no_local_hit() {
    let dir = tempfile::tempdir().unwrap();
    let sink = Arc::new(MemorySink::new(ConflictKey::LocalId));
    let geoserver = spawn_geoserver().await;
    let ingest_addr = spawn_ingest(sink).await;
    let config = client_config(geoserver, ingest_addr, &dir);

    // La sonde TCP vise le faux GeoServer : en ligne
    let mut ctx = context(&config, false);
    assert!(ctx.is_online().await);

    let resolved = ctx
        .resolve_at(&QueryPoint::new(0.0, 0.0, 1.0))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(resolved.id, "P9");
    assert_eq!(resolved.source, ResolutionSource::Remote);
    assert!(ctx.selected().is_none());

    // Forcé hors ligne : aucune correspondance
    let mut offline = context(&config, true);
    let result = offline.resolve_at(&QueryPoint::new(0.0, 0.0, 1.0)).await;
    assert_eq!(Status::from_resolution(&result), Status::NoFeature);
}

#[tokio::test]
async fn test_reference_failure_keeps_cache() {
    let dir = tempfile::tempdir().unwrap();
    let sink = Arc::new(MemorySink::new(ConflictKey::LocalId));
    let geoserver = spawn_geoserver().await;
    let ingest_addr = spawn_ingest(sink).await;
    let config = client_config(geoserver, ingest_addr, &dir);

    let mut ctx = context(&config, true);
    ctx.sync_reference_data().await.unwrap();

    let broken = ClientConfig {
        reference_url: format!("http://{}/geoserver/missing", geoserver),
        ..config.clone()
    };
    let mut ctx = context(&broken, true);
    let result = ctx.sync_reference_data().await;

    let status = Status::from_reference_sync(&result);
    assert!(status.is_failure());
    assert!(status.to_string().contains("HTTP 404"));
    assert_eq!(ctx.parcel_count().unwrap(), 3);
    assert_eq!(ctx.layer().len(), 3);
}

#[tokio::test]
async fn test_server_error_reply_keeps_records_pending() {
    let dir = tempfile::tempdir().unwrap();
    let geoserver = spawn_geoserver().await;
    let failing = Router::new().route(
        "/sync",
        post(|| async { Json(json!({"status": "error", "message": "DB connection failed"})) }),
    );
    let ingest_addr = spawn(failing).await;
    let config = client_config(geoserver, ingest_addr, &dir);
    let ctx = context(&config, true);

    ctx.submit(&mut form("P1")).unwrap();
    let result = ctx.upload_unsynced().await;

    assert_eq!(
        Status::from_upload(&result).to_string(),
        "Sync failed: Server error: DB connection failed"
    );
    assert!(ctx.records().unwrap().iter().all(|o| !o.synced));
}

#[tokio::test]
async fn test_http_failure_on_upload_is_transport_error() {
    let dir = tempfile::tempdir().unwrap();
    let geoserver = spawn_geoserver().await;
    let failing = Router::new().route(
        "/sync",
        post(|| async { (StatusCode::BAD_GATEWAY, "upstream down") }),
    );
    let ingest_addr = spawn(failing).await;
    let config = client_config(geoserver, ingest_addr, &dir);
    let ctx = context(&config, true);

    ctx.submit(&mut form("P1")).unwrap();
    let err = ctx.upload_unsynced().await.unwrap_err();

    assert_eq!(err.kind(), "transport");
    assert!(err.to_string().contains("HTTP 502: upstream down"));
    assert!(ctx.records().unwrap().iter().all(|o| !o.synced));
}

#[tokio::test]
async fn test_ingest_rejects_malformed_body() {
    let sink = Arc::new(MemorySink::new(ConflictKey::LocalId));
    let addr = spawn_ingest(sink.clone()).await;

    let response = reqwest::Client::new()
        .post(format!("http://{}/sync", addr))
        .header("content-type", "application/json")
        .body("{\"records\": [")
        .send()
        .await
        .unwrap();

    assert_eq!(response.status().as_u16(), 400);
    let reply: Value = response.json().await.unwrap();
    assert_eq!(reply["status"], "error");
    assert!(sink.is_empty());
}
