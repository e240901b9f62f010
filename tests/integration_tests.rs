use async_trait::async_trait;
use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use postgen::catalog::{Catalog, CatalogSource};
use postgen::error::{ApiError, GenerationError};
use postgen::generation::{CompletionOptions, GenerationClient};
use postgen::generator::Generator;
use postgen::handlers::AppState;
use postgen::metrics::MetricsCollector;
use postgen::server::create_app;
use postgen::throttle::ThrottleGate;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use tower::ServiceExt;

#[derive(Default)]
struct FakeClient {
    flag: AtomicBool,
    completions: AtomicUsize,
}

#[async_trait]
impl GenerationClient for FakeClient {
    async fn moderate(&self, _text: &str) -> Result<bool, GenerationError> {
        Ok(self.flag.load(Ordering::SeqCst))
    }

    async fn complete(&self, prompt: &str, _options: CompletionOptions) -> Result<String, GenerationError> {
        self.completions.fetch_add(1, Ordering::SeqCst);
        if prompt.starts_with("In less than 300 words") {
            Ok("A snowflake made of circuits. It glows.".to_string())
        } else {
            Ok(" \"Zero-copy cloning saves the day!\" #datasuperhero ".to_string())
        }
    }

    async fn image(&self, _prompt: &str) -> Result<String, GenerationError> {
        Ok("https://images.example.com/clone.png".to_string())
    }
}

#[derive(Default)]
struct FakeCatalog {
    queries: AtomicUsize,
}

#[async_trait]
impl CatalogSource for FakeCatalog {
    async fn load_column(&self, table: &str) -> Result<Vec<String>, ApiError> {
        self.queries.fetch_add(1, Ordering::SeqCst);
        match table {
            "snowflake_features" => Ok(vec!["Zero-Copy Cloning".to_string(), "Time Travel".to_string()]),
            "style" => Ok(vec!["witty".to_string(), "formal".to_string()]),
            other => Err(ApiError::CatalogUnavailable(format!("no table {}", other))),
        }
    }
}

struct TestApp {
    router: Router,
    client: Arc<FakeClient>,
    catalog: Arc<FakeCatalog>,
}

fn test_app() -> TestApp {
    test_app_with_tables("snowflake_features", "style")
}

fn test_app_with_tables(topics_table: &str, styles_table: &str) -> TestApp {
    let client = Arc::new(FakeClient::default());
    let catalog = Arc::new(FakeCatalog::default());
    let generator = Generator::new(
        client.clone(),
        Catalog::new(catalog.clone(), topics_table, styles_table),
        ThrottleGate::new(5),
        MetricsCollector::new(),
    );
    let router = create_app(Arc::new(AppState::new(generator)));
    TestApp { router, client, catalog }
}

async fn send(router: &Router, request: Request<Body>) -> (StatusCode, Option<String>, String) {
    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let location = response
        .headers()
        .get(header::LOCATION)
        .map(|v| v.to_str().unwrap().to_string());
    let body = response.into_body().collect().await.unwrap().to_bytes();
    (status, location, String::from_utf8(body.to_vec()).unwrap())
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

fn form(uri: &str, body: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn json(uri: &str, body: serde_json::Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn new_session(router: &Router) -> String {
    let (status, location, _) = send(router, get("/")).await;
    assert_eq!(status, StatusCode::SEE_OTHER);
    location.unwrap()
}

async fn state(router: &Router, session: &str) -> serde_json::Value {
    let (status, _, body) = send(router, get(&format!("{}/state", session))).await;
    assert_eq!(status, StatusCode::OK);
    serde_json::from_str(&body).unwrap()
}

#[tokio::test]
async fn test_page_lists_catalog_and_caches_it() {
    let app = test_app();
    let session = new_session(&app.router).await;

    for _ in 0..3 {
        let (status, _, body) = send(&app.router, get(&session)).await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.contains("Zero-Copy Cloning"));
        assert!(body.contains("witty"));
    }

    // One query per table regardless of how often the page renders.
    assert_eq!(app.catalog.queries.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_generate_text_and_image_flow() {
    let app = test_app();
    let session = new_session(&app.router).await;

    let (status, location, _) = send(
        &app.router,
        form(&format!("{}/text", session), "topic=Zero-Copy+Cloning&style=witty"),
    )
    .await;
    assert_eq!(status, StatusCode::SEE_OTHER);
    assert_eq!(location.unwrap(), format!("{}#post", session));

    let body = state(&app.router, &session).await;
    assert_eq!(body["state"]["post"], "Zero-copy cloning saves the day! #datasuperhero");
    assert_eq!(body["state"]["n_requests"], 1);
    assert_eq!(body["remaining_requests"], 4);

    let (_, _, page) = send(&app.router, get(&session)).await;
    assert!(page.contains("Generate image"));

    let (status, location, _) = send(&app.router, form(&format!("{}/image", session), "")).await;
    assert_eq!(status, StatusCode::SEE_OTHER);
    assert_eq!(location.unwrap(), format!("{}#image", session));

    let body = state(&app.router, &session).await;
    assert_eq!(body["state"]["image"], "https://images.example.com/clone.png");
    assert_eq!(body["state"]["n_requests"], 2);

    let (_, _, page) = send(&app.router, get(&session)).await;
    assert!(page.contains("Regenerate image"));
    assert!(page.contains("https://images.example.com/clone.png"));
}

#[tokio::test]
async fn test_regenerate_text_form() {
    let app = test_app();
    let session = new_session(&app.router).await;

    send(&app.router, form(&format!("{}/text", session), "topic=Zero-Copy+Cloning&style=witty")).await;

    let (status, location, _) = send(
        &app.router,
        form(&format!("{}/text/regenerate", session), "topic=Time+Travel&style=formal"),
    )
    .await;
    assert_eq!(status, StatusCode::SEE_OTHER);
    assert_eq!(location.unwrap(), format!("{}#post", session));

    // Straight after Generate the submitted selection is used as is.
    let body = state(&app.router, &session).await;
    assert_eq!(body["state"]["topic"], "Time Travel");
    assert_eq!(body["state"]["style"], "formal");
    assert_eq!(body["state"]["post"], "Zero-copy cloning saves the day! #datasuperhero");
    assert_eq!(body["state"]["n_requests"], 2);
    assert_eq!(body["state"]["feeling_lucky"], true);

    // A second regenerate draws from the catalog.
    send(
        &app.router,
        form(&format!("{}/text/regenerate", session), "topic=Snowpark&style=pirate"),
    )
    .await;
    let body = state(&app.router, &session).await;
    let topic = body["state"]["topic"].as_str().unwrap();
    let style = body["state"]["style"].as_str().unwrap();
    assert!(["Zero-Copy Cloning", "Time Travel"].contains(&topic));
    assert!(["witty", "formal"].contains(&style));
    assert_eq!(app.client.completions.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn test_page_unavailable_while_catalog_fails() {
    let app = test_app_with_tables("missing_features", "style");
    let session = new_session(&app.router).await;

    for _ in 0..2 {
        let (status, _, body) = send(&app.router, get(&session)).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        let body: serde_json::Value = serde_json::from_str(&body).unwrap();
        assert_eq!(body["error"], "service_unavailable");
        assert!(body["message"].as_str().unwrap().contains("missing_features"));
    }

    // Failed loads are retried on the next request rather than cached.
    assert!(app.catalog.queries.load(Ordering::SeqCst) >= 2);

    let (status, _, _) = send(&app.router, get("/ready")).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn test_empty_topic_shows_error() {
    let app = test_app();
    let session = new_session(&app.router).await;

    let (_, location, _) = send(&app.router, form(&format!("{}/text", session), "topic=&style=")).await;
    assert_eq!(location.unwrap(), format!("{}#text-error", session));

    let body = state(&app.router, &session).await;
    assert_eq!(body["state"]["post"], "");
    assert_eq!(body["state"]["text_error"], "Please enter a topic");
    assert_eq!(app.client.completions.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_sixth_generation_is_throttled() {
    let app = test_app();
    let session = new_session(&app.router).await;
    let uri = format!("{}/actions", session);
    let action = serde_json::json!({"type": "generate_text", "topic": "Time Travel", "style": ""});

    for _ in 0..5 {
        let (status, _, body) = send(&app.router, json(&uri, action.clone())).await;
        assert_eq!(status, StatusCode::OK);
        let body: serde_json::Value = serde_json::from_str(&body).unwrap();
        assert_eq!(body["outcome"]["phase"], "done");
    }

    let (_, _, body) = send(&app.router, json(&uri, action)).await;
    let body: serde_json::Value = serde_json::from_str(&body).unwrap();
    assert_eq!(body["outcome"]["phase"], "throttled");
    assert_eq!(body["outcome"]["render"], "text_error");
    assert_eq!(body["state"]["n_requests"], 1);

    let (_, _, metrics) = send(&app.router, get("/metrics")).await;
    let metrics: serde_json::Value = serde_json::from_str(&metrics).unwrap();
    assert_eq!(metrics["global"]["succeeded"], 5);
    assert_eq!(metrics["by_kind"]["text"]["throttled"], 1);
}

#[tokio::test]
async fn test_flagged_input_is_not_completed() {
    let app = test_app();
    app.client.flag.store(true, Ordering::SeqCst);
    let session = new_session(&app.router).await;

    send(&app.router, form(&format!("{}/text", session), "topic=Time+Travel&style=")).await;

    let body = state(&app.router, &session).await;
    assert_eq!(body["state"]["text_error"], "Input flagged as inappropriate.");
    assert_eq!(body["state"]["n_requests"], 0);
    assert_eq!(app.client.completions.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_style_editing() {
    let app = test_app();
    let session = new_session(&app.router).await;

    let (status, location, _) = send(&app.router, form(&format!("{}/styles", session), "style=pirate")).await;
    assert_eq!(status, StatusCode::SEE_OTHER);
    assert_eq!(location.unwrap(), format!("{}#styles", session));

    let (_, _, page) = send(&app.router, get(&session)).await;
    assert!(page.contains("<option value=\"pirate\">"));

    let (status, _, _) = send(&app.router, form(&format!("{}/styles", session), "style=")).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

    send(&app.router, form(&format!("{}/styles/remove", session), "style=witty")).await;
    let body = state(&app.router, &session).await;
    assert_eq!(body["state"]["edited_styles"], serde_json::json!(["formal", "pirate"]));

    send(&app.router, form(&format!("{}/styles/reset", session), "")).await;
    let body = state(&app.router, &session).await;
    assert!(body["state"]["edited_styles"].is_null());
}

#[tokio::test]
async fn test_unknown_session_is_not_found() {
    let app = test_app();
    let uri = format!("/sessions/{}/state", uuid::Uuid::new_v4());

    let (status, _, body) = send(&app.router, get(&uri)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let body: serde_json::Value = serde_json::from_str(&body).unwrap();
    assert_eq!(body["error"], "not_found");
}

#[tokio::test]
async fn test_health_and_ready_endpoints() {
    let app = test_app();
    new_session(&app.router).await;

    let (status, _, body) = send(&app.router, get("/health")).await;
    assert_eq!(status, StatusCode::OK);
    let body: serde_json::Value = serde_json::from_str(&body).unwrap();
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["sessions"], 1);

    let (status, _, body) = send(&app.router, get("/ready")).await;
    assert_eq!(status, StatusCode::OK);
    let body: serde_json::Value = serde_json::from_str(&body).unwrap();
    assert_eq!(body["topics"], 2);
}
