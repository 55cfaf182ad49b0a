//! routekit demo server.
//!
//! ```text
//!   client ──▶ axum/tokio ──▶ RequestId ──▶ AccessLog ──▶ /api mount ──▶ Router ──▶ 404
//! ```
//!
//! `routekit serve [--config routekit.toml]` runs the demo application;
//! `routekit match GET /api/users/7` dispatches one request in-process and
//! prints what answered it.

use std::path::PathBuf;

use axum::http::{Method, StatusCode};
use clap::{Parser, Subcommand};
use serde_json::json;

use routekit::chain::{handler_fn, HandlerError};
use routekit::config::AppConfig;
use routekit::lifecycle::startup;
use routekit::{AccessLog, AppBuilder, Dispatcher, PatternError, RequestContext, RequestId, Router};

#[derive(Parser)]
#[command(name = "routekit")]
#[command(about = "HTTP router and middleware dispatcher", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Serve the demo application
    Serve {
        /// TOML config file; watched for changes
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
    /// Dispatch one request in-process and print the outcome
    Match {
        method: String,
        path: String,
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Serve { config } => startup::run(config, demo_app).await?,
        Commands::Match {
            method,
            path,
            config,
        } => {
            let config = startup::load(config.as_deref())?;
            let app = demo_app(&config)?;
            let method = Method::from_bytes(method.to_ascii_uppercase().as_bytes())?;

            let mut ctx = RequestContext::new(method, &path);
            let state = app.dispatch(&mut ctx).await;

            println!("status:  {}", ctx.response().status());
            println!("route:   {}", ctx.matched_route().unwrap_or("-"));
            println!("state:   {state:?}");
            println!("body:    {}", String::from_utf8_lossy(ctx.response().body()));
        }
    }

    Ok(())
}

fn demo_app(config: &AppConfig) -> Result<Dispatcher, PatternError> {
    let api = Router::builder()
        .get(
            "/users/:id",
            handler_fn(|ctx, _next| {
                Box::pin(async move {
                    let body = json!({ "id": ctx.param("id"), "base": ctx.base_path() });
                    ctx.send_json(StatusCode::OK, &body)?;
                    Ok(())
                })
            }),
        )
        .get(
            "/files/*",
            handler_fn(|ctx, _next| {
                Box::pin(async move {
                    let file = ctx.params().wildcard().unwrap_or_default().to_string();
                    ctx.send_text(StatusCode::OK, file);
                    Ok(())
                })
            }),
        )
        .build()?;

    AppBuilder::from_config(config)
        .use_handler(RequestId)
        .use_handler(AccessLog)
        .mount("/api", api)
        .get(
            "/",
            handler_fn(|ctx, _next| {
                Box::pin(async move {
                    ctx.send_text(StatusCode::OK, "routekit");
                    Ok(())
                })
            }),
        )
        .get(
            "/hello/:name",
            handler_fn(|ctx, _next| {
                Box::pin(async move {
                    let reply = format!("hello, {}", ctx.param("name").unwrap_or_default());
                    ctx.send_text(StatusCode::OK, reply);
                    Ok(())
                })
            }),
        )
        .get(
            "/search",
            (
                handler_fn(|ctx, mut next| {
                    Box::pin(async move {
                        tracing::debug!(q = ?ctx.query("q"), "search");
                        next.run(ctx).await
                    })
                }),
                handler_fn(|ctx, mut next| {
                    Box::pin(async move {
                        if ctx.query("q").map_or(true, str::is_empty) {
                            return Err(HandlerError::bad_request("missing query parameter 'q'"));
                        }
                        next.run(ctx).await
                    })
                }),
                handler_fn(|ctx, _next| {
                    Box::pin(async move {
                        let body = json!({ "q": ctx.query("q") });
                        ctx.send_json(StatusCode::OK, &body)?;
                        Ok(())
                    })
                }),
            ),
        )
        .build()
}
