use std::sync::Arc;

use axum::{
    Router,
    body::Body,
    http::{Method, Request, StatusCode},
};
use http_body_util::BodyExt;
use serde_json::{Value, json};
use tower::ServiceExt;

use serialmint::db;
use serialmint::db::services::IssuanceSettings;
use serialmint::web::{AppState, create_axum_router};

async fn test_app() -> Router {
    let db_pool = db::connect("sqlite::memory:", 1).await.unwrap();
    db::bootstrap(&db_pool, "0C7FEDB00000").await.unwrap();
    create_axum_router(Arc::new(AppState::new(db_pool, IssuanceSettings::default())))
}

async fn send(app: &Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let builder = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, value)
}

async fn create_model(app: &Router, model_number: &str, prefix: Option<&str>, macs: i32) {
    let (status, _) = send(
        app,
        Method::POST,
        "/api/models",
        Some(json!({
            "model_number": model_number,
            "prefix": prefix,
            "telx_model_number": format!("TX-{model_number}"),
            "macs_per_serial": macs,
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
}

#[tokio::test]
async fn health_reports_ok() {
    let app = test_app().await;
    let (status, body) = send(&app, Method::GET, "/api/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "ok": true }));
}

#[tokio::test]
async fn model_crud_round() {
    let app = test_app().await;
    create_model(&app, "M1", Some("ABC"), 1).await;

    let (status, body) = send(&app, Method::GET, "/api/models/M1", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["prefix"], "ABC");
    assert_eq!(body["generated_count"], 0);

    let (status, body) = send(
        &app,
        Method::PUT,
        "/api/models/M1",
        Some(json!({ "prefix": "XYZ", "macs_per_serial": 2 })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["prefix"], "XYZ");
    assert_eq!(body["macs_per_serial"], 2);

    let (status, _) = send(
        &app,
        Method::POST,
        "/api/models",
        Some(json!({ "model_number": "M1" })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, body) = send(&app, Method::GET, "/api/models/NOPE", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body["error"].as_str().unwrap().contains("NOPE"));
}

#[tokio::test]
async fn generate_then_list_and_allocate() {
    let app = test_app().await;
    create_model(&app, "M1", Some("ABC"), 2).await;

    let (status, body) = send(
        &app,
        Method::POST,
        "/api/generate",
        Some(json!({ "model_number": "M1", "count": 2, "regionId": "EU" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["success"], true);
    assert_eq!(body["lastSerial"], "ABCEU2500002");
    assert_eq!(body["lastMacHex"], "0C7FEDB00004");
    assert_eq!(body["group"]["suffix"], "ABC");
    assert_eq!(body["group"]["serials"][0]["serialNumber"], "ABCEU2500001");
    assert_eq!(
        body["group"]["serials"][1]["macIds"],
        json!(["0C:7F:ED:B0:00:03", "0C:7F:ED:B0:00:04"])
    );
    let group_id = body["group"]["id"].as_str().unwrap().to_string();

    let (status, body) = send(&app, Method::GET, "/api/generate-groups?model_number=M1", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_array().unwrap().len(), 1);
    assert_eq!(body[0]["id"], group_id.as_str());

    let (status, body) = send(
        &app,
        Method::POST,
        "/api/allocate",
        Some(json!({ "groupIds": [group_id] })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["model_number"], "M1");
    assert_eq!(body["allocated_count"], 2);

    let (_, body) = send(&app, Method::GET, "/api/models/M1", None).await;
    assert_eq!(body["allocated_count"], 2);
    assert_eq!(body["generated_count"], 2);

    let (status, body) = send(
        &app,
        Method::POST,
        "/api/export",
        Some(json!({ "groupIds": [group_id] })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["groups"][0]["serials"][0]["allocated"], true);
}

#[tokio::test]
async fn generate_rejects_bad_requests() {
    let app = test_app().await;
    create_model(&app, "M1", Some("ABC"), 1).await;
    create_model(&app, "BARE", None, 1).await;

    let (status, body) = send(
        &app,
        Method::POST,
        "/api/generate",
        Some(json!({ "model_number": "M1", "count": 0, "regionId": "EU" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].is_string());

    let (status, _) = send(
        &app,
        Method::POST,
        "/api/generate",
        Some(json!({ "model_number": "GHOST", "count": 1, "regionId": "EU" })),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = send(
        &app,
        Method::POST,
        "/api/generate",
        Some(json!({ "model_number": "BARE", "count": 1, "regionId": "EU" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = send(
        &app,
        Method::POST,
        "/api/generate",
        Some(json!({ "model_number": "BARE", "count": 1, "regionId": "EU", "suffix": "QQ" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["lastSerial"], "QQEU2500001");
}

#[tokio::test]
async fn allocate_and_export_validate_ids() {
    let app = test_app().await;

    let (status, _) = send(&app, Method::POST, "/api/allocate", Some(json!({ "groupIds": [] }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = send(
        &app,
        Method::POST,
        "/api/allocate",
        Some(json!({ "groupIds": ["not-a-uuid"] })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("Invalid id"));

    let (status, _) = send(
        &app,
        Method::POST,
        "/api/allocate",
        Some(json!({ "groupIds": [uuid::Uuid::new_v4().to_string()] })),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = send(
        &app,
        Method::POST,
        "/api/export",
        Some(json!({ "groupIds": [uuid::Uuid::new_v4().to_string()] })),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn search_finds_models_and_batches() {
    let app = test_app().await;
    create_model(&app, "GW-100", Some("ABC"), 1).await;
    send(
        &app,
        Method::POST,
        "/api/generate",
        Some(json!({ "model_number": "GW-100", "count": 3, "regionId": "EU" })),
    )
    .await;

    let (status, body) = send(&app, Method::GET, "/api/search?term=gw-1", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["models"][0]["model_number"], "GW-100");

    let (status, body) = send(&app, Method::GET, "/api/search?term=ABCEU2500003", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["groups"].as_array().unwrap().len(), 1);

    let (status, _) = send(&app, Method::GET, "/api/search?term=", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(&app, Method::GET, "/api/generate-groups", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}
