//! HTTP-level smoke tests through the axum router.

mod common;

use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use common::{md5_hex, setup};
use serde_json::{Value, json};
use tower::ServiceExt;
use upload_engine::create_app;

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn health_endpoint_is_alive() {
    let engine = setup().await;
    let app = create_app(engine.state.clone());

    let response = app
        .oneshot(Request::get("/healthz").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn full_upload_over_http() {
    let engine = setup().await;
    let app = create_app(engine.state.clone());

    // init session
    let init = Request::post("/uploads")
        .header("x-owner-id", "u1")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(
            json!({
                "content_hash": "hash-http",
                "original_name": "pic.jpg",
                "declared_size": 6,
                "declared_media_type": "image/jpeg",
                "total_chunks": 2
            })
            .to_string(),
        ))
        .unwrap();
    let response = app.clone().oneshot(init).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let session = body_json(response).await;
    let id = session["id"].as_str().unwrap().to_string();
    assert_eq!(session["status"], "pending");

    // two chunks
    for (index, payload) in [(0, b"abc"), (1, b"def")] {
        let request = Request::put(format!("/uploads/{id}/chunks/{index}"))
            .header("x-owner-id", "u1")
            .header("x-chunk-checksum", md5_hex(payload))
            .body(Body::from(payload.to_vec()))
            .unwrap();
        let response = app.clone().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    // session is now completed with a final key
    let response = app
        .clone()
        .oneshot(
            Request::get(format!("/uploads/{id}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let session = body_json(response).await;
    assert_eq!(session["status"], "completed");
    assert_eq!(session["percent"], 100);
    let key = session["final_object_key"].as_str().unwrap().to_string();

    // the published object streams back with the declared media type
    let response = app
        .clone()
        .oneshot(
            Request::get(format!("/objects/{key}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()[header::CONTENT_TYPE],
        "image/jpeg"
    );
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    assert_eq!(&bytes[..], b"abcdef");
}

#[tokio::test]
async fn missing_owner_header_is_unauthorized() {
    let engine = setup().await;
    let app = create_app(engine.state.clone());

    let request = Request::post("/uploads")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(
            json!({
                "content_hash": "h",
                "original_name": "pic.jpg",
                "declared_size": 1,
                "total_chunks": 1
            })
            .to_string(),
        ))
        .unwrap();
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn error_statuses_map_to_the_taxonomy() {
    let engine = setup().await;
    let app = create_app(engine.state.clone());

    // unknown session -> 404
    let response = app
        .clone()
        .oneshot(
            Request::get(format!("/uploads/{}", uuid::Uuid::new_v4()))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    // no completed content for this hash -> 404
    let response = app
        .clone()
        .oneshot(
            Request::get("/uploads?content_hash=nope")
                .header("x-owner-id", "u1")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    // bad init arguments -> 400
    let request = Request::post("/uploads")
        .header("x-owner-id", "u1")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(
            json!({
                "content_hash": "h",
                "original_name": "pic.jpg",
                "declared_size": 1,
                "total_chunks": 0
            })
            .to_string(),
        ))
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}
