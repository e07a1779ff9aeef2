use std::collections::HashMap;
use std::convert::Infallible;
use std::time::Duration;

use axum::extract::Query;
use axum::http::{HeaderMap, StatusCode, header::COOKIE};
use axum::response::sse::{Event, Sse};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::Router;
use gfd_sdk::client::{ClientError, DisplayClient};
use gfd_sdk::objects::{CartEvent, EventType};
use url::Url;

const DEVICE_ID: &str = "gfd-1718000000000-abcdefgh";
const VALID_OTP: &str = "482913";

fn has_device_cookie(headers: &HeaderMap) -> bool {
    headers
        .get(COOKIE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v == format!("deviceId={DEVICE_ID}"))
}

async fn connect(headers: HeaderMap, Query(params): Query<HashMap<String, String>>) -> Response {
    if !has_device_cookie(&headers) {
        return (StatusCode::BAD_REQUEST, "Device ID is required").into_response();
    }
    if params.get("otp").is_some_and(|otp| otp != VALID_OTP) {
        return (StatusCode::BAD_REQUEST, "Invalid OTP").into_response();
    }

    let established = serde_json::json!({
        "eventId": "e-0",
        "eventType": "CONNECTION_ESTABLISHED",
        "userId": "pos-01",
        "message": "Connected",
    });
    let added = serde_json::json!({
        "eventId": "e-1",
        "eventType": "CART_ITEM_ADDED",
        "cartItems": [{
            "productId": 7,
            "productName": "Kopi Susu",
            "price": 25000,
            "quantity": 2,
            "subtotal": 50000
        }],
        "totalAmount": 50000,
        "totalItems": 2,
    });

    let events = vec![
        Event::default()
            .event("CONNECTION_ESTABLISHED")
            .id("e-0")
            .data(established.to_string()),
        Event::default().comment("keep-alive"),
        Event::default().event("HEARTBEAT").data("ping"),
        Event::default()
            .event("CART_ITEM_ADDED")
            .id("e-1")
            .data(added.to_string()),
    ];
    let stream = futures_util::stream::iter(events.into_iter().map(Ok::<_, Infallible>));
    Sse::new(stream).into_response()
}

async fn disconnect(headers: HeaderMap) -> Response {
    if has_device_cookie(&headers) {
        (StatusCode::OK, "SSE connection closed successfully").into_response()
    } else {
        (StatusCode::INTERNAL_SERVER_ERROR, "Failed to disconnect").into_response()
    }
}

async fn spawn_backend() -> Url {
    let app = Router::new()
        .route("/api/sse/connect", get(connect))
        .route("/api/sse/disconnect", post(disconnect));
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    Url::parse(&format!("http://{addr}")).unwrap()
}

#[tokio::test]
async fn test_open_stream_yields_named_frames() {
    let client = DisplayClient::new(spawn_backend().await);
    let mut stream = client
        .open_stream(DEVICE_ID, Some(VALID_OTP), None)
        .await
        .unwrap();

    let mut frames = Vec::new();
    while let Some(frame) = stream.next_frame().await {
        frames.push(frame.unwrap());
    }

    let names: Vec<&str> = frames.iter().map(|f| f.event_name()).collect();
    assert_eq!(
        names,
        vec!["CONNECTION_ESTABLISHED", "HEARTBEAT", "CART_ITEM_ADDED"]
    );
    assert_eq!(frames[1].data, "ping");
    assert_eq!(stream.last_event_id(), Some("e-1"));

    let added = CartEvent::decode(&frames[2].data).unwrap();
    assert_eq!(added.event_type(), EventType::CartItemAdded);
    let items = added.cart_items.unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].product_name, "Kopi Susu");
    assert_eq!(items[0].quantity, 2);
}

#[tokio::test]
async fn test_invalid_otp_is_rejected() {
    let client = DisplayClient::new(spawn_backend().await);
    let err = client
        .open_stream(DEVICE_ID, Some("000000"), None)
        .await
        .unwrap_err();

    match err {
        ClientError::Api { status, body } => {
            assert_eq!(status.as_u16(), 400);
            assert_eq!(body, "Invalid OTP");
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn test_reconnect_without_otp() {
    let client = DisplayClient::new(spawn_backend().await);
    let mut stream = client.open_stream(DEVICE_ID, None, Some("e-0")).await.unwrap();
    assert!(stream.next_frame().await.unwrap().is_ok());
}

#[tokio::test]
async fn test_disconnect() {
    let client = DisplayClient::new(spawn_backend().await);
    client.disconnect(DEVICE_ID).await.unwrap();

    let err = client.disconnect("someone-else").await.unwrap_err();
    assert!(matches!(err, ClientError::Api { status, .. } if status.as_u16() == 500));
}

#[tokio::test]
async fn test_disconnect_gives_up_on_silent_backend() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let mut held = Vec::new();
        while let Ok((socket, _)) = listener.accept().await {
            held.push(socket);
        }
    });

    let client = DisplayClient::new(Url::parse(&format!("http://{addr}")).unwrap())
        .with_disconnect_timeout(Duration::from_millis(200));
    let result = tokio::time::timeout(Duration::from_secs(10), client.disconnect(DEVICE_ID))
        .await
        .expect("disconnect should not hang");

    assert!(matches!(result, Err(ClientError::Http(e)) if e.is_timeout()));
}
