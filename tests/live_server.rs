//! Tests against a server bound to a real socket.

mod common;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::http::StatusCode;

use common::{client, start_server};
use routekit::chain::handler_fn;
use routekit::config::AppConfig;
use routekit::http::X_REQUEST_ID;
use routekit::{AppBuilder, Dispatcher, PatternError, RequestId};

fn greeting_app(config: &AppConfig) -> Result<Dispatcher, PatternError> {
    AppBuilder::from_config(config)
        .use_handler(RequestId)
        .get(
            "/Hello/:name",
            handler_fn(|ctx, _next| {
                Box::pin(async move {
                    let reply = format!("hello {}", ctx.param("name").unwrap_or_default());
                    ctx.send_text(StatusCode::OK, reply);
                    Ok(())
                })
            }),
        )
        .build()
}

#[tokio::test]
async fn test_request_id_round_trip() {
    let server = start_server(AppConfig::default(), greeting_app).await;
    let client = client();

    let response = client
        .get(server.url("/Hello/ann"))
        .header(X_REQUEST_ID.as_str(), "req-42")
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);
    assert_eq!(response.headers()[X_REQUEST_ID.as_str()], "req-42");
    assert_eq!(response.text().await.unwrap(), "hello ann");

    let response = client.get(server.url("/Hello/bob")).send().await.unwrap();
    let generated = response.headers()[X_REQUEST_ID.as_str()].to_str().unwrap();
    assert_eq!(generated.len(), 36);

    server.shutdown.trigger();
}

#[tokio::test]
async fn test_config_reload_swaps_application() {
    let server = start_server(AppConfig::default(), greeting_app).await;
    let client = client();

    let response = client.get(server.url("/hello/ann")).send().await.unwrap();
    assert_eq!(response.status(), 404);

    let mut relaxed = AppConfig::default();
    relaxed.routing.case_sensitive = false;
    server.config_updates.send(relaxed).unwrap();
    tokio::time::sleep(Duration::from_millis(100)).await;

    let response = client.get(server.url("/hello/ann")).send().await.unwrap();
    assert_eq!(response.status(), 200);
    assert_eq!(response.text().await.unwrap(), "hello ann");

    server.shutdown.trigger();
}

#[tokio::test]
async fn test_timeout_runs_cleanup() {
    let cleaned = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&cleaned);

    let mut config = AppConfig::default();
    config.timeouts.request_secs = 1;

    let server = start_server(config, move |config: &AppConfig| {
        let counter = Arc::clone(&counter);
        AppBuilder::from_config(config)
            .get(
                "/slow",
                handler_fn(move |ctx, _next| {
                    let counter = Arc::clone(&counter);
                    Box::pin(async move {
                        ctx.on_cleanup(move || {
                            counter.fetch_add(1, Ordering::SeqCst);
                        });
                        tokio::time::sleep(Duration::from_secs(5)).await;
                        ctx.send_text(StatusCode::OK, "too late");
                        Ok(())
                    })
                }),
            )
            .build()
    })
    .await;

    let response = client().get(server.url("/slow")).send().await.unwrap();
    assert_eq!(response.status(), 408);
    assert_eq!(cleaned.load(Ordering::SeqCst), 1);

    server.shutdown.trigger();
}

#[tokio::test]
async fn test_graceful_shutdown_stops_server() {
    let server = start_server(AppConfig::default(), greeting_app).await;

    let url = server.url("/Hello/x");
    let response = client().get(&url).send().await.unwrap();
    assert_eq!(response.status(), 200);

    server.shutdown.trigger();
    tokio::time::timeout(Duration::from_secs(5), server.handle)
        .await
        .expect("server did not stop")
        .unwrap();

    assert!(client().get(&url).send().await.is_err());
}
