//! Router-level tests
//!
//! Drive the full axum router with `oneshot` against wiremock origins: an
//! `http_api` provider serving the payload and a media host behind it.
//!
//! Run with: cargo test --test api_tests

use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
    Router,
};
use serde_json::Value;
use std::sync::Arc;
use tower::ServiceExt;
use wiremock::matchers::{header as header_is, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use sourcetv_api::{create_router, AppState};
use sourcetv_core::{
    bootstrap::{init_services, Services},
    provider::ProviderManifest,
    Config,
};

fn app(services: &Services, config: Config) -> Router {
    create_router(AppState::new(services.clone(), Arc::new(config)))
}

fn services_with(origin: Option<&MockServer>) -> (Services, Config) {
    let config = Config::default();
    let services = init_services(&config).unwrap();

    if let Some(origin) = origin {
        let manifest = ProviderManifest::from_toml(&format!(
            r#"
id = "alpha"
name = "Alpha"
kind = "http_api"
priority = 10
base_url = "{}"

[settings.stream_headers]
Referer = "https://alpha.example/"
"#,
            origin.uri()
        ))
        .unwrap();
        services
            .registry
            .register_manifest(&manifest, &services.loader)
            .unwrap();
    }

    (services, config)
}

async fn send(app: Router, request: Request<Body>) -> (StatusCode, axum::http::HeaderMap, Vec<u8>) {
    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let headers = response.headers().clone();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap()
        .to_vec();
    (status, headers, body)
}

async fn get_json(app: Router, uri: &str) -> (StatusCode, Value) {
    let request = Request::builder().uri(uri).body(Body::empty()).unwrap();
    let (status, _, body) = send(app, request).await;
    (status, serde_json::from_slice(&body).unwrap())
}

async fn mount_origin(origin: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/movie/550"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "sources": [
                { "url": format!("{}/media/movie.mp4", origin.uri()), "quality": "1080p" }
            ],
            "subtitles": [
                { "url": format!("{}/media/movie.en.vtt", origin.uri()), "language": "en" }
            ]
        })))
        .mount(origin)
        .await;

    Mock::given(method("GET"))
        .and(path("/media/movie.mp4"))
        .and(header_is("referer", "https://alpha.example/"))
        .and(header_is("range", "bytes=0-4"))
        .respond_with(
            ResponseTemplate::new(206)
                .insert_header("content-range", "bytes 0-4/100")
                .insert_header("accept-ranges", "bytes")
                .insert_header("content-type", "video/mp4")
                .set_body_bytes(b"hello".to_vec()),
        )
        .mount(origin)
        .await;
}

#[tokio::test]
async fn test_movie_sources_then_proxy_fetch() {
    let origin = MockServer::start().await;
    mount_origin(&origin).await;
    let (services, config) = services_with(Some(&origin));

    let (status, json) = get_json(app(&services, config.clone()), "/api/sources/movie/550").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["cached"], false);
    assert_eq!(json["sources"].as_array().unwrap().len(), 1);
    assert_eq!(json["sources"][0]["quality"], "1080p");
    assert_eq!(json["sources"][0]["type"], "mp4");
    assert_eq!(json["sources"][0]["provider"]["id"], "alpha");
    assert_eq!(json["subtitles"][0]["language"], "en");

    // Nothing points at the origin directly
    let url = json["sources"][0]["url"].as_str().unwrap();
    assert!(services.proxy.is_proxy_url(url));
    assert!(!url.contains("movie.mp4"));

    let proxy_path = url.strip_prefix(services.proxy.base_url()).unwrap();
    let request = Request::builder()
        .uri(proxy_path)
        .header(header::RANGE, "bytes=0-4")
        .body(Body::empty())
        .unwrap();
    let (status, headers, body) = send(app(&services, config.clone()), request).await;
    assert_eq!(status, StatusCode::PARTIAL_CONTENT);
    assert_eq!(headers[header::CONTENT_RANGE], "bytes 0-4/100");
    assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_ORIGIN], "*");
    assert_eq!(body, b"hello");

    // Second resolution is served from the cache and its urls still play
    let (_, json) = get_json(app(&services, config.clone()), "/api/sources/movie/550").await;
    assert_eq!(json["cached"], true);

    let cached_url = json["sources"][0]["url"].as_str().unwrap();
    assert!(services.proxy.is_proxy_url(cached_url));
    let proxy_path = cached_url.strip_prefix(services.proxy.base_url()).unwrap();
    let request = Request::builder()
        .uri(proxy_path)
        .header(header::RANGE, "bytes=0-4")
        .body(Body::empty())
        .unwrap();
    let (status, _, body) = send(app(&services, config), request).await;
    assert_eq!(status, StatusCode::PARTIAL_CONTENT);
    assert_eq!(body, b"hello");
}

#[tokio::test]
async fn test_no_providers_is_success_with_diagnostic() {
    let (services, config) = services_with(None);

    let (status, json) = get_json(app(&services, config), "/api/sources/tv/1399/1/2").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["sources"], serde_json::json!([]));
    assert_eq!(json["diagnostics"][0]["code"], "NO_PROVIDERS_AVAILABLE");
}

#[tokio::test]
async fn test_invalid_episode_is_bad_request() {
    let (services, config) = services_with(None);

    let (status, json) = get_json(app(&services, config), "/api/sources/tv/1399/0/2").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["status"], 400);
}

#[tokio::test]
async fn test_provider_admin_routes() {
    let origin = MockServer::start().await;
    let (services, config) = services_with(Some(&origin));

    let (status, json) = get_json(app(&services, config.clone()), "/api/providers").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json[0]["id"], "alpha");
    assert_eq!(json[0]["enabled"], true);
    assert_eq!(json[0]["priority"], 10);

    let request = Request::builder()
        .method(Method::POST)
        .uri("/api/providers/alpha/disable")
        .body(Body::empty())
        .unwrap();
    let (status, _, body) = send(app(&services, config.clone()), request).await;
    assert_eq!(status, StatusCode::OK);
    let json: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["enabled"], false);
    assert_eq!(services.registry.is_enabled("alpha"), Some(false));

    // Disabled providers are skipped by resolution
    let (_, json) = get_json(app(&services, config.clone()), "/api/sources/movie/550").await;
    assert_eq!(json["diagnostics"][0]["code"], "NO_PROVIDERS_AVAILABLE");

    let request = Request::builder()
        .method(Method::POST)
        .uri("/api/providers/missing/enable")
        .body(Body::empty())
        .unwrap();
    let (status, _, _) = send(app(&services, config), request).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_forged_token_rejected() {
    let (services, config) = services_with(None);
    let request = Request::builder()
        .uri("/proxy/eyJ1IjoiaHR0cDovL2V2aWwifQ.AAAA")
        .body(Body::empty())
        .unwrap();

    let (status, _, _) = send(app(&services, config), request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_unreachable_origin_is_bad_gateway() {
    let (services, config) = services_with(None);
    let url = services
        .proxy
        .create_proxy_url("http://127.0.0.1:9/video.mp4", &Default::default())
        .unwrap();
    let proxy_path = url.strip_prefix(services.proxy.base_url()).unwrap().to_string();

    let request = Request::builder().uri(proxy_path).body(Body::empty()).unwrap();
    let (status, _, _) = send(app(&services, config), request).await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
}

#[tokio::test]
async fn test_proxy_preflight() {
    let (services, config) = services_with(None);
    let request = Request::builder()
        .method(Method::OPTIONS)
        .uri("/proxy/anything")
        .body(Body::empty())
        .unwrap();

    let (status, headers, _) = send(app(&services, config), request).await;
    assert!(status.is_success());
    assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_ORIGIN], "*");
}

#[tokio::test]
async fn test_health_reports_providers() {
    let origin = MockServer::start().await;
    Mock::given(method("HEAD"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&origin)
        .await;
    let (services, config) = services_with(Some(&origin));

    let (status, json) = get_json(app(&services, config), "/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["name"], "sourcetv");
    assert_eq!(json["status"], "ok");
    assert_eq!(json["providers"]["alpha"], true);
    assert!(json["checked_at"].is_string());
}
