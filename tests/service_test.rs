mod common;

use std::time::Duration;

use common::{app, app_with, png};
use imgcache::config::AppConfig;
use rocket::http::{ContentType, Status};
use serde_json::Value;

#[rocket::async_test]
async fn health_reports_cache_size() {
    let app = app().await;
    app.fetcher.serve("https://example.com/a.png", png(4, 4), "image/png");
    app.client.get("/cache?url=https://example.com/a.png").dispatch().await;

    let response = app.client.get("/health").dispatch().await;
    assert_eq!(response.status(), Status::Ok);
    assert_eq!(response.headers().get_one("Cache-Control"), Some("no-cache"));

    let body: Value = response.into_json().await.unwrap();
    assert_eq!(body["status"], "ok");
    assert_eq!(body["service"], "imgcache");
    assert_eq!(body["cacheSize"], 1);
    assert!(body["timestamp"].is_string());
}

#[rocket::async_test]
async fn stats_count_bytes_and_lookups() {
    let app = app().await;
    let data = png(4, 4);
    let size = data.len() as u64;
    app.fetcher.serve("https://example.com/a.png", data, "image/png");

    app.client.get("/cache?url=https://example.com/a.png").dispatch().await;
    app.client.get("/cache?url=https://example.com/a.png").dispatch().await;

    let body: Value = app.client.get("/stats").dispatch().await.into_json().await.unwrap();
    assert_eq!(body["cacheEntries"], 1);
    assert_eq!(body["approximateBytes"], size);
    assert_eq!(body["hits"], 1);
    assert_eq!(body["misses"], 1);
    assert_eq!(body["ttlSeconds"], 3600);
    assert!(body["approximateSize"].as_str().unwrap().ends_with('B'));
}

#[rocket::async_test]
async fn clear_cache_drops_every_entry() {
    let app = app().await;
    for name in ["a", "b", "c"] {
        let url = format!("https://example.com/{}.png", name);
        app.fetcher.serve(&url, png(4, 4), "image/png");
        let response = app.client.get(format!("/cache?url={}", url)).dispatch().await;
        assert_eq!(response.status(), Status::Ok);
    }

    let response = app.client.post("/clear-cache").dispatch().await;
    assert_eq!(response.status(), Status::Ok);
    let body: Value = response.into_json().await.unwrap();
    assert_eq!(body["clearedEntries"], 3);

    let stats: Value = app.client.get("/stats").dispatch().await.into_json().await.unwrap();
    assert_eq!(stats["cacheEntries"], 0);

    let again = app
        .client
        .get("/cache?url=https://example.com/a.png")
        .dispatch()
        .await;
    assert_eq!(again.headers().get_one("X-Cache"), Some("MISS"));
}

#[rocket::async_test]
async fn clear_aliases_accept_get_and_post() {
    let app = app().await;

    for response in [
        app.client.get("/clear").dispatch().await,
        app.client.post("/clear").dispatch().await,
        app.client.get("/clear-cache").dispatch().await,
    ] {
        assert_eq!(response.status(), Status::Ok);
        let body: Value = response.into_json().await.unwrap();
        assert_eq!(body["clearedEntries"], 0);
    }
}

#[rocket::async_test]
async fn expired_entries_still_count_until_swept() {
    let app = app().await;
    app.fetcher.serve("https://example.com/a.png", png(4, 4), "image/png");
    app.client.get("/cache?url=https://example.com/a.png").dispatch().await;

    app.clock.advance(Duration::from_secs(7200));

    // lazily expired on lookup; the background sweep runs far later
    let stats: Value = app.client.get("/stats").dispatch().await.into_json().await.unwrap();
    assert_eq!(stats["cacheEntries"], 1);

    let response = app
        .client
        .get("/cache?url=https://example.com/a.png")
        .dispatch()
        .await;
    assert_eq!(response.headers().get_one("X-Cache"), Some("MISS"));
}

#[rocket::async_test]
async fn background_sweep_runs_once_the_app_lifts_off() {
    let config = AppConfig {
        sweep_interval: 1,
        ..AppConfig::default()
    };
    let app = app_with(config).await;
    for name in ["a", "b"] {
        let url = format!("https://example.com/{}.png", name);
        app.fetcher.serve(&url, png(4, 4), "image/png");
        app.client.get(format!("/cache?url={}", url)).dispatch().await;
    }

    app.clock.advance(Duration::from_secs(3601));
    tokio::time::sleep(Duration::from_millis(2500)).await;

    let stats: Value = app.client.get("/stats").dispatch().await.into_json().await.unwrap();
    assert_eq!(stats["cacheEntries"], 0);
}

#[rocket::async_test]
async fn sources_lists_every_generator() {
    let app = app().await;

    let body: Value = app.client.get("/sources").dispatch().await.into_json().await.unwrap();
    let sources = body["availableSources"].as_array().unwrap();
    assert_eq!(sources.len(), 7);

    let picsum = sources.iter().find(|s| s["name"] == "picsum").unwrap();
    assert_eq!(picsum["example"], "https://picsum.photos/400/300");
    assert_eq!(picsum["usage"], "/picsum/{width}/{height}");
    assert!(body["customUrl"].is_string());
}

#[rocket::async_test]
async fn placeholder_fetches_the_generated_url() {
    let app = app().await;
    app.fetcher.serve("https://picsum.photos/200/100", png(200, 100), "image/png");
    app.fetcher
        .serve("https://picsum.photos/id/237/200/100", png(200, 100), "image/png");

    let response = app.client.get("/picsum/200/100").dispatch().await;
    assert_eq!(response.status(), Status::Ok);
    assert_eq!(response.headers().get_one("X-Cache"), Some("MISS"));

    let response = app.client.get("/picsum/200/100").dispatch().await;
    assert_eq!(response.headers().get_one("X-Cache"), Some("HIT"));

    let response = app.client.get("/picsum/200/100?id=237").dispatch().await;
    assert_eq!(response.status(), Status::Ok);

    assert_eq!(app.fetcher.calls_for("https://picsum.photos/200/100"), 1);
    assert_eq!(app.fetcher.calls_for("https://picsum.photos/id/237/200/100"), 1);
}

#[rocket::async_test]
async fn placeholder_falls_back_to_default_dimensions() {
    let app = app().await;
    app.fetcher.serve("https://picsum.photos/400/300", png(4, 3), "image/png");

    let response = app.client.get("/picsum/wide/0").dispatch().await;
    assert_eq!(response.status(), Status::Ok);
    assert_eq!(app.fetcher.calls_for("https://picsum.photos/400/300"), 1);
}

#[rocket::async_test]
async fn unknown_source_lists_endpoints() {
    let app = app().await;

    let response = app.client.get("/flickr/200/100").dispatch().await;
    assert_eq!(response.status(), Status::NotFound);
    let body: Value = response.into_json().await.unwrap();
    assert!(body["message"].as_str().unwrap().contains("flickr"));
    assert!(body["availableEndpoints"].is_array());
    assert_eq!(app.fetcher.calls(), 0);
}

#[rocket::async_test]
async fn unknown_path_lists_endpoints() {
    let app = app().await;

    let response = app.client.get("/does/not-exist").dispatch().await;
    assert_eq!(response.status(), Status::NotFound);
    assert_eq!(response.content_type(), Some(ContentType::JSON));
    assert_eq!(
        response.headers().get_one("Access-Control-Allow-Origin"),
        Some("*")
    );

    let body: Value = response.into_json().await.unwrap();
    assert_eq!(body["error"], "Endpoint not found");
    assert_eq!(body["path"], "/does/not-exist");
    assert!(!body["availableEndpoints"].as_array().unwrap().is_empty());
}

#[rocket::async_test]
async fn preflight_is_answered_with_cors_headers() {
    let app = app().await;

    let response = app.client.options("/cache").dispatch().await;
    assert_eq!(response.status(), Status::NoContent);

    let headers = response.headers();
    assert_eq!(headers.get_one("Access-Control-Allow-Origin"), Some("*"));
    assert!(headers
        .get_one("Access-Control-Allow-Methods")
        .unwrap()
        .contains("GET"));
    assert_eq!(headers.get_one("Access-Control-Max-Age"), Some("86400"));
}

#[rocket::async_test]
async fn errors_carry_cors_headers() {
    let app = app().await;

    let response = app.client.get("/cache?url=http://example.com/a.png").dispatch().await;
    assert_eq!(response.status(), Status::BadRequest);
    assert_eq!(
        response.headers().get_one("Access-Control-Allow-Origin"),
        Some("*")
    );
}
