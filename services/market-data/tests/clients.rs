//! Client tests against a local stub of the provider and model lookup APIs.

use std::collections::HashMap;
use std::net::SocketAddr;

use axum::extract::{Path, Query};
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use market_data::{
    ListingQuery, MarketCheckClient, MarketDataSource, ModelCatalog, NhtsaClient, ProviderConfig,
    ProviderError,
};
use serde_json::{json, Value};
use tokio::net::TcpListener;
use types::ids::Vin;

const API_KEY: &str = "test-key";

fn require_key(params: &HashMap<String, String>) -> Result<(), StatusCode> {
    match params.get("api_key").map(String::as_str) {
        Some(API_KEY) => Ok(()),
        _ => Err(StatusCode::UNAUTHORIZED),
    }
}

async fn active(Query(params): Query<HashMap<String, String>>) -> Result<Json<Value>, StatusCode> {
    require_key(&params)?;
    let rows: usize = params.get("rows").and_then(|r| r.parse().ok()).unwrap_or(0);
    let make = params.get("make").cloned().unwrap_or_default();

    let listings: Vec<Value> = (0..rows.min(3))
        .map(|i| {
            json!({
                "id": format!("listing-{i}"),
                "vin": format!("VIN{i}"),
                "price": 20000 + i as i64,
                "build": {"make": make, "model": "F-150"}
            })
        })
        .collect();
    Ok(Json(json!({ "num_found": listings.len(), "listings": listings })))
}

async fn decode(
    Path(vin): Path<String>,
    Query(params): Query<HashMap<String, String>>,
) -> Result<Json<Value>, StatusCode> {
    require_key(&params)?;
    match vin.as_str() {
        "MISSING" => Err(StatusCode::NOT_FOUND),
        "BROKEN" => Err(StatusCode::BAD_GATEWAY),
        _ => Ok(Json(json!({"year": 2021, "make": "Ford", "model": "F-150", "trim": "XLT"}))),
    }
}

async fn models(Path(make): Path<String>) -> Json<Value> {
    if make == "nomake" {
        return Json(json!({"Count": 0, "Results": []}));
    }
    Json(json!({
        "Count": 4,
        "Results": [
            {"Model_Name": "Mustang"},
            {"Model_Name": "F-150"},
            {"Model_Name": "Mustang"},
            {"Model_Name": ""}
        ]
    }))
}

async fn spawn_stub() -> SocketAddr {
    let app = Router::new()
        .route("/search/car/active", get(active))
        .route("/decode/car/{vin}/specs", get(decode))
        .route("/vehicles/GetModelsForMake/{make}", get(models));

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    addr
}

fn config(addr: SocketAddr) -> ProviderConfig {
    ProviderConfig::with_base_url(API_KEY, format!("http://{addr}/"))
}

#[tokio::test]
async fn test_active_listings_passes_filters() {
    let addr = spawn_stub().await;
    let client = MarketCheckClient::new(&config(addr)).unwrap();

    let query = ListingQuery {
        rows: 2,
        make: "ford".into(),
        ..Default::default()
    };
    let listings = client.active_listings(&query).await.unwrap();

    assert_eq!(listings.len(), 2);
    assert_eq!(listings[0].vin.as_str(), "VIN0");
    assert_eq!(listings[1].build.make, "ford");
}

#[tokio::test]
async fn test_decode_build_outcomes() {
    let addr = spawn_stub().await;
    let client = MarketCheckClient::new(&config(addr)).unwrap();

    let spec = client.decode_build(&Vin::new("1FAFP404X1F123456")).await.unwrap();
    assert_eq!(spec.trim, "XLT");

    let missing = client.decode_build(&Vin::new("MISSING")).await;
    assert!(matches!(missing, Err(ProviderError::NotFound(_))));

    let broken = client.decode_build(&Vin::new("BROKEN")).await;
    assert!(matches!(
        broken,
        Err(ProviderError::UnexpectedStatus { status: 502, .. })
    ));
}

#[tokio::test]
async fn test_wrong_key_is_unexpected_status() {
    let addr = spawn_stub().await;
    let config = ProviderConfig::with_base_url("wrong", format!("http://{addr}"));
    let client = MarketCheckClient::new(&config).unwrap();

    let result = client.active_listings(&ListingQuery::rows(1)).await;
    assert!(matches!(
        result,
        Err(ProviderError::UnexpectedStatus { status: 401, .. })
    ));
}

#[tokio::test]
async fn test_models_are_sorted_and_deduplicated() {
    let addr = spawn_stub().await;
    let client = NhtsaClient::new(&config(addr)).unwrap();

    let models = client.models_for_make("ford").await.unwrap();
    assert_eq!(models, vec!["F-150".to_string(), "Mustang".to_string()]);

    assert!(matches!(
        client.models_for_make("nomake").await,
        Err(ProviderError::NotFound(_))
    ));
    assert!(matches!(
        client.models_for_make("  ").await,
        Err(ProviderError::InvalidRequest(_))
    ));
}
