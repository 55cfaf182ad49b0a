//! End-to-end dispatch scenarios driven through the axum router without a
//! socket.

mod common;

use std::sync::{Arc, Mutex};

use axum::body::Body;
use axum::http::{Request, StatusCode};

use common::{get, oneshot};
use routekit::chain::{handler_fn, HandlerError, HandlerResult};
use routekit::config::AppConfig;
use routekit::{AppBuilder, Dispatcher, PatternError, Router};

type Log = Arc<Mutex<Vec<String>>>;

fn reply(text: &'static str) -> impl routekit::Handler {
    handler_fn(move |ctx, _next| {
        Box::pin(async move {
            ctx.send_text(StatusCode::OK, text);
            Ok(())
        })
    })
}

#[tokio::test]
async fn test_literal_route_beats_parameter() {
    let app = |config: &AppConfig| -> Result<Dispatcher, PatternError> {
        AppBuilder::from_config(config)
            .get("/a/:x", reply("param"))
            .get("/a/b", reply("literal"))
            .build()
    };

    let (response, body) = oneshot(app, get("/a/b")).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body, "literal");

    let (_, body) = oneshot(app, get("/a/c")).await;
    assert_eq!(body, "param");
}

#[tokio::test]
async fn test_parameter_is_percent_decoded() {
    let app = |config: &AppConfig| -> Result<Dispatcher, PatternError> {
        AppBuilder::from_config(config)
            .get(
                "/greet/:name",
                handler_fn(|ctx, _next| {
                    Box::pin(async move {
                        let name = ctx.param("name").unwrap_or_default().to_string();
                        ctx.send_text(StatusCode::OK, name);
                        Ok(())
                    })
                }),
            )
            .build()
    };

    let (response, body) = oneshot(app, get("/greet/%E4%BD%A0")).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body, "你");
}

#[tokio::test]
async fn test_malformed_path_is_bad_request() {
    let app = |config: &AppConfig| -> Result<Dispatcher, PatternError> {
        AppBuilder::from_config(config)
            .get("/a/:x", reply("param"))
            .build()
    };

    let (response, _) = oneshot(app, get("/a/%%")).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_route_handlers_run_in_sequence() {
    let log: Log = Arc::default();
    let seen = Arc::clone(&log);

    let app = move |config: &AppConfig| -> Result<Dispatcher, PatternError> {
        let first = Arc::clone(&seen);
        let second = Arc::clone(&seen);
        AppBuilder::from_config(config)
            .get(
                "/search",
                (
                    handler_fn(move |ctx, mut next| {
                        let log = Arc::clone(&first);
                        Box::pin(async move {
                            log.lock().unwrap().push("log".into());
                            next.run(ctx).await
                        })
                    }),
                    handler_fn(move |ctx, mut next| {
                        let log = Arc::clone(&second);
                        Box::pin(async move {
                            log.lock().unwrap().push("validate".into());
                            if ctx.query("q").is_none() {
                                return Err(HandlerError::bad_request("missing q"));
                            }
                            next.run(ctx).await
                        })
                    }),
                    handler_fn(|ctx, _next| {
                        Box::pin(async move {
                            let q = ctx.query("q").unwrap_or_default().to_string();
                            ctx.send_text(StatusCode::OK, q);
                            Ok(())
                        })
                    }),
                ),
            )
            .build()
    };

    let (response, body) = oneshot(app.clone(), get("/search?q=rust%20lang")).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body, "rust lang");

    let (response, body) = oneshot(app, get("/search")).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body, "missing q");

    assert_eq!(
        *log.lock().unwrap(),
        vec!["log", "validate", "log", "validate"]
    );
}

#[tokio::test]
async fn test_mount_rewrites_and_restores_path() {
    let log: Log = Arc::default();
    let seen = Arc::clone(&log);

    let app = move |config: &AppConfig| -> Result<Dispatcher, PatternError> {
        let outer = Arc::clone(&seen);
        let inner = Arc::clone(&seen);
        let api = Router::builder()
            .get(
                "/users",
                handler_fn(move |ctx, _next| {
                    let log = Arc::clone(&inner);
                    Box::pin(async move {
                        log.lock()
                            .unwrap()
                            .push(format!("inner {} {}", ctx.base_path(), ctx.path()));
                        ctx.send_text(StatusCode::OK, "users");
                        Ok(())
                    })
                }),
            )
            .get(
                "/broken",
                handler_fn(|_ctx, _next| {
                    Box::pin(async { Err(HandlerError::new(StatusCode::CONFLICT, "broken")) })
                }),
            )
            .build()?;

        AppBuilder::from_config(config)
            .use_handler(handler_fn(move |ctx, mut next| {
                let log = Arc::clone(&outer);
                Box::pin(async move {
                    let result = next.run(ctx).await;
                    log.lock().unwrap().push(format!("outer {}", ctx.path()));
                    result
                })
            }))
            .mount("/api", api)
            .build()
    };

    let (response, body) = oneshot(app.clone(), get("/api/users")).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body, "users");

    let (response, _) = oneshot(app, get("/api/broken")).await;
    assert_eq!(response.status(), StatusCode::CONFLICT);

    assert_eq!(
        *log.lock().unwrap(),
        vec!["inner /api /users", "outer /api/users", "outer /api/broken"]
    );
}

#[tokio::test]
async fn test_second_next_call_is_ignored() {
    let calls = Arc::new(Mutex::new(0));
    let counted = Arc::clone(&calls);

    let app = move |config: &AppConfig| -> Result<Dispatcher, PatternError> {
        let counted = Arc::clone(&counted);
        AppBuilder::from_config(config)
            .use_handler(handler_fn(|ctx, mut next| {
                Box::pin(async move {
                    next.run(ctx).await?;
                    next.run(ctx).await
                })
            }))
            .get(
                "/once",
                handler_fn(move |ctx, _next| {
                    let counted = Arc::clone(&counted);
                    Box::pin(async move {
                        *counted.lock().unwrap() += 1;
                        ctx.send_text(StatusCode::OK, "once");
                        Ok(())
                    })
                }),
            )
            .build()
    };

    let (response, body) = oneshot(app, get("/once")).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body, "once");
    assert_eq!(*calls.lock().unwrap(), 1);
}

#[tokio::test]
async fn test_first_finalize_wins() {
    let app = |config: &AppConfig| -> Result<Dispatcher, PatternError> {
        AppBuilder::from_config(config)
            .get(
                "/twice",
                handler_fn(|ctx, _next| {
                    Box::pin(async move {
                        assert!(ctx.send_text(StatusCode::CREATED, "first"));
                        assert!(!ctx.send_text(StatusCode::OK, "second"));
                        Ok(())
                    })
                }),
            )
            .build()
    };

    let (response, body) = oneshot(app, get("/twice")).await;
    assert_eq!(response.status(), StatusCode::CREATED);
    assert_eq!(body, "first");
}

fn explode() -> HandlerResult {
    panic!("secret detail")
}

#[tokio::test]
async fn test_panic_becomes_generic_server_error() {
    let app = |config: &AppConfig| -> Result<Dispatcher, PatternError> {
        AppBuilder::from_config(config)
            .get(
                "/panic",
                handler_fn(|_ctx, _next| Box::pin(async { explode() })),
            )
            .build()
    };

    let (response, body) = oneshot(app, get("/panic")).await;
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert!(!body.contains("secret detail"));
}

#[tokio::test]
async fn test_head_falls_back_to_get() {
    let app = |config: &AppConfig| -> Result<Dispatcher, PatternError> {
        AppBuilder::from_config(config)
            .get("/page", reply("page"))
            .build()
    };

    let request = Request::head("/page").body(Body::empty()).unwrap();
    let (response, _) = oneshot(app, request).await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_options_lists_allowed_methods() {
    let app = |config: &AppConfig| -> Result<Dispatcher, PatternError> {
        AppBuilder::from_config(config)
            .get("/item", reply("get"))
            .delete("/item", reply("delete"))
            .build()
    };

    let request = Request::options("/item").body(Body::empty()).unwrap();
    let (response, _) = oneshot(app, request).await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    assert_eq!(
        response.headers().get("allow").unwrap(),
        "GET, HEAD, DELETE, OPTIONS"
    );
}

#[tokio::test]
async fn test_unmatched_path_is_not_found() {
    let app = |config: &AppConfig| -> Result<Dispatcher, PatternError> {
        AppBuilder::from_config(config).get("/", reply("root")).build()
    };

    let (response, _) = oneshot(app, get("/missing")).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

fn layer(log: &Log, label: &'static str) -> impl routekit::Handler {
    let log = Arc::clone(log);
    handler_fn(move |ctx, mut next| {
        let log = Arc::clone(&log);
        Box::pin(async move {
            log.lock().unwrap().push(format!("{label}:before"));
            let result = next.run(ctx).await;
            log.lock().unwrap().push(format!("{label}:after"));
            result
        })
    })
}

#[tokio::test]
async fn test_error_in_third_of_five_handlers() {
    let log: Log = Arc::default();
    let seen = Arc::clone(&log);

    let app = move |config: &AppConfig| -> Result<Dispatcher, PatternError> {
        let failing = Arc::clone(&seen);
        AppBuilder::from_config(config)
            .use_handler(layer(&seen, "1"))
            .use_handler(layer(&seen, "2"))
            .get(
                "/orders",
                (
                    handler_fn(move |_ctx, _next| {
                        let log = Arc::clone(&failing);
                        Box::pin(async move {
                            log.lock().unwrap().push("3:before".into());
                            Err(HandlerError::new(StatusCode::CONFLICT, "order exists"))
                        })
                    }),
                    layer(&seen, "4"),
                    layer(&seen, "5"),
                ),
            )
            .build()
    };

    let (response, body) = oneshot(app, get("/orders")).await;
    assert_eq!(response.status(), StatusCode::CONFLICT);
    assert_eq!(body, "order exists");
    assert_eq!(
        *log.lock().unwrap(),
        vec!["1:before", "2:before", "3:before", "2:after", "1:after"]
    );
}
