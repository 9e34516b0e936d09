use assert_json_diff::assert_json_eq;
use catalog_server::{AppConfig, KeyedBackend, build_app, build_state};
use catalog_storage::StoreStrategy;
use serde_json::{Value, json};
use tokio::task::JoinHandle;
use wiremock::matchers::{basic_auth, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const WIDGET: &str = r#"[{"name":"Widget","artc":"A1","units":"pcs"}]"#;

fn config_for(upstream: &MockServer) -> AppConfig {
    let mut cfg = AppConfig::default();
    cfg.upstream.url = format!("{}/catalog/all", upstream.uri());
    cfg.upstream.username = "integration".into();
    cfg.upstream.password = Some("pw".into());
    cfg.upstream.timeout_secs = 2;
    cfg
}

async fn start_server(cfg: AppConfig) -> (String, tokio::sync::oneshot::Sender<()>, JoinHandle<()>) {
    let state = build_state(&cfg).await.expect("build state");
    let app = build_app(&cfg.server, state);

    let listener = tokio::net::TcpListener::bind((std::net::Ipv4Addr::LOCALHOST, 0))
        .await
        .expect("bind");
    let addr = listener.local_addr().unwrap();
    let (tx, rx) = tokio::sync::oneshot::channel::<()>();

    let server = tokio::spawn(async move {
        let _ = axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = rx.await;
            })
            .await;
    });

    (format!("http://{addr}{}", cfg.server.path_prefix), tx, server)
}

async fn mount_catalog(upstream: &MockServer, status: u16, body: &str) {
    Mock::given(method("GET"))
        .and(path("/catalog/all"))
        .and(basic_auth("integration", "pw"))
        .respond_with(ResponseTemplate::new(status).set_body_string(body))
        .mount(upstream)
        .await;
}

#[tokio::test]
async fn refresh_then_serve_catalog() {
    let upstream = MockServer::start().await;
    mount_catalog(&upstream, 200, WIDGET).await;

    let (base, shutdown_tx, handle) = start_server(config_for(&upstream)).await;
    let client = reqwest::Client::new();

    let resp = client.post(format!("{base}/update")).send().await.unwrap();
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    let upd_tm = body["updTm"].as_str().unwrap();
    assert!(
        time::PrimitiveDateTime::parse(
            upd_tm,
            time::macros::format_description!("[year]-[month]-[day] [hour]:[minute]:[second]")
        )
        .is_ok(),
        "unexpected updTm {upd_tm}"
    );

    let resp = client
        .get(format!("{base}/data"))
        .header("origin", "https://shop.example")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    assert_eq!(
        resp.headers()["content-type"],
        "application/json; charset=utf-8"
    );
    assert_eq!(resp.headers()["access-control-allow-origin"], "*");
    assert_eq!(resp.text().await.unwrap(), WIDGET);

    let _ = shutdown_tx.send(());
    let _ = handle.await;
}

#[tokio::test]
async fn upstream_failure_keeps_previous_catalog() {
    let upstream = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/catalog/all"))
        .respond_with(ResponseTemplate::new(200).set_body_string(WIDGET))
        .up_to_n_times(1)
        .mount(&upstream)
        .await;
    Mock::given(method("GET"))
        .and(path("/catalog/all"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&upstream)
        .await;

    let (base, shutdown_tx, handle) = start_server(config_for(&upstream)).await;
    let client = reqwest::Client::new();

    assert_eq!(
        client.post(format!("{base}/update")).send().await.unwrap().status(),
        200
    );

    let resp = client.post(format!("{base}/update")).send().await.unwrap();
    assert_eq!(resp.status(), 500);
    let body: Value = resp.json().await.unwrap();
    assert!(body["error"].as_str().unwrap().contains("503"));

    let resp = client.get(format!("{base}/data")).send().await.unwrap();
    assert_eq!(resp.status(), 200);
    assert_eq!(resp.text().await.unwrap(), WIDGET);

    let _ = shutdown_tx.send(());
    let _ = handle.await;
}

#[tokio::test]
async fn data_unavailable_until_first_success() {
    let upstream = MockServer::start().await;
    mount_catalog(&upstream, 500, "boom").await;

    let (base, shutdown_tx, handle) = start_server(config_for(&upstream)).await;
    let client = reqwest::Client::new();

    let resp = client.get(format!("{base}/data")).send().await.unwrap();
    assert_eq!(resp.status(), 503);
    let body: Value = resp.json().await.unwrap();
    assert!(body["error"].is_string());

    assert_eq!(
        client.post(format!("{base}/update")).send().await.unwrap().status(),
        500
    );
    assert_eq!(
        client.get(format!("{base}/data")).send().await.unwrap().status(),
        503
    );

    let resp = client.get(format!("{base}/readyz")).send().await.unwrap();
    assert_eq!(resp.status(), 503);

    let _ = shutdown_tx.send(());
    let _ = handle.await;
}

#[tokio::test]
async fn get_update_is_rejected_without_refreshing() {
    let upstream = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/catalog/all"))
        .respond_with(ResponseTemplate::new(200).set_body_string(WIDGET))
        .expect(0)
        .mount(&upstream)
        .await;

    let (base, shutdown_tx, handle) = start_server(config_for(&upstream)).await;
    let client = reqwest::Client::new();

    let resp = client.get(format!("{base}/update")).send().await.unwrap();
    assert_eq!(resp.status(), 405);
    let body: Value = resp.json().await.unwrap();
    assert_json_eq!(body, json!({ "error": "method not allowed" }));

    assert_eq!(
        client.delete(format!("{base}/data")).send().await.unwrap().status(),
        405
    );
    assert_eq!(
        client.get(format!("{base}/data")).send().await.unwrap().status(),
        503
    );

    let _ = shutdown_tx.send(());
    let _ = handle.await;
}

#[tokio::test]
async fn keyed_memory_strategy_reserializes_records() {
    let upstream = MockServer::start().await;
    mount_catalog(
        &upstream,
        200,
        r#"[
            {"units": "pcs", "artc": "A1", "name": "Widget"},
            {"units": "kg",  "artc": "B2", "name": "Bolt"}
        ]"#,
    )
    .await;

    let mut cfg = config_for(&upstream);
    cfg.store.strategy = StoreStrategy::Keyed;
    cfg.store.keyed_backend = KeyedBackend::Memory;
    let (base, shutdown_tx, handle) = start_server(cfg).await;
    let client = reqwest::Client::new();

    assert_eq!(
        client.post(format!("{base}/update")).send().await.unwrap().status(),
        200
    );

    let body: Value = client
        .get(format!("{base}/data"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_json_eq!(
        body,
        json!([
            {"name": "Widget", "artc": "A1", "units": "pcs"},
            {"name": "Bolt", "artc": "B2", "units": "kg"}
        ])
    );

    let ready: Value = client
        .get(format!("{base}/readyz"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(ready["strategy"], "keyed");

    let _ = shutdown_tx.send(());
    let _ = handle.await;
}

#[tokio::test]
async fn keyed_strategy_rejects_malformed_catalog() {
    let upstream = MockServer::start().await;
    mount_catalog(&upstream, 200, r#"{"not": "an array"}"#).await;

    let mut cfg = config_for(&upstream);
    cfg.store.strategy = StoreStrategy::Keyed;
    cfg.store.keyed_backend = KeyedBackend::Memory;
    let (base, shutdown_tx, handle) = start_server(cfg).await;
    let client = reqwest::Client::new();

    assert_eq!(
        client.post(format!("{base}/update")).send().await.unwrap().status(),
        500
    );
    assert_eq!(
        client.get(format!("{base}/data")).send().await.unwrap().status(),
        503
    );

    let _ = shutdown_tx.send(());
    let _ = handle.await;
}

#[tokio::test]
async fn trigger_token_and_path_prefix() {
    let upstream = MockServer::start().await;
    mount_catalog(&upstream, 200, WIDGET).await;

    let mut cfg = config_for(&upstream);
    cfg.server.path_prefix = "/1cgw".into();
    cfg.refresh.trigger_token = Some("operator".into());
    let (base, shutdown_tx, handle) = start_server(cfg).await;
    let client = reqwest::Client::new();

    assert_eq!(
        client.post(format!("{base}/update")).send().await.unwrap().status(),
        401
    );
    assert_eq!(
        client
            .post(format!("{base}/update"))
            .bearer_auth("operator")
            .send()
            .await
            .unwrap()
            .status(),
        200
    );
    assert_eq!(
        client.get(format!("{base}/data")).send().await.unwrap().status(),
        200
    );

    let _ = shutdown_tx.send(());
    let _ = handle.await;
}
