//! Application builder.

use std::sync::Arc;

use crate::chain::{ChainEntry, IntoHandlers};
use crate::config::AppConfig;
use crate::dispatch::Dispatcher;
use crate::routing::{Method, PatternError, PatternOptions, RouterBuilder};

/// Collects middleware, mounts and routes, then freezes them into a
/// [`Dispatcher`].
///
/// Entries run in registration order; the route table always runs after
/// every entry, followed by the 404 fallback.
pub struct AppBuilder {
    entries: Vec<ChainEntry>,
    router: RouterBuilder,
    expose_errors: bool,
}

impl Default for AppBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl AppBuilder {
    pub fn new() -> Self {
        Self::with_options(PatternOptions::default())
    }

    pub fn with_options(options: PatternOptions) -> Self {
        Self {
            entries: Vec::new(),
            router: RouterBuilder::new(options),
            expose_errors: false,
        }
    }

    /// Builder seeded from the `routing` and `dispatch` config sections.
    pub fn from_config(config: &AppConfig) -> Self {
        let options = PatternOptions {
            strict_trailing_slash: config.routing.strict_trailing_slash,
            case_sensitive: config.routing.case_sensitive,
        };
        let mut builder = Self::with_options(options).expose_errors(config.dispatch.expose_errors);
        builder.router = builder.router.auto_options(config.routing.auto_options);
        builder
    }

    /// Show 5xx error messages to clients.
    pub fn expose_errors(mut self, expose: bool) -> Self {
        self.expose_errors = expose;
        self
    }

    pub fn auto_options(mut self, enabled: bool) -> Self {
        self.router = self.router.auto_options(enabled);
        self
    }

    /// Add middleware that runs for every request.
    pub fn use_handler(mut self, handlers: impl IntoHandlers) -> Self {
        self.entries.push(ChainEntry::global(handlers));
        self
    }

    /// Add handlers (a chain, a `Router`, a closure) under `prefix`.
    pub fn mount(mut self, prefix: &str, handlers: impl IntoHandlers) -> Self {
        self.entries.push(ChainEntry::mounted(prefix, handlers));
        self
    }

    pub fn route(mut self, method: Method, template: &str, handlers: impl IntoHandlers) -> Self {
        self.router = self.router.route(method, template, handlers);
        self
    }

    pub fn get(self, template: &str, handlers: impl IntoHandlers) -> Self {
        self.route(Method::Get, template, handlers)
    }

    pub fn post(self, template: &str, handlers: impl IntoHandlers) -> Self {
        self.route(Method::Post, template, handlers)
    }

    pub fn put(self, template: &str, handlers: impl IntoHandlers) -> Self {
        self.route(Method::Put, template, handlers)
    }

    pub fn delete(self, template: &str, handlers: impl IntoHandlers) -> Self {
        self.route(Method::Delete, template, handlers)
    }

    pub fn patch(self, template: &str, handlers: impl IntoHandlers) -> Self {
        self.route(Method::Patch, template, handlers)
    }

    pub fn head(self, template: &str, handlers: impl IntoHandlers) -> Self {
        self.route(Method::Head, template, handlers)
    }

    pub fn options(self, template: &str, handlers: impl IntoHandlers) -> Self {
        self.route(Method::Options, template, handlers)
    }

    pub fn any(self, template: &str, handlers: impl IntoHandlers) -> Self {
        self.route(Method::Any, template, handlers)
    }

    /// Compile every route and freeze the application.
    pub fn build(self) -> Result<Dispatcher, PatternError> {
        let router = Arc::new(self.router.build()?);
        let handlers = self
            .entries
            .into_iter()
            .map(ChainEntry::into_handler)
            .collect();
        tracing::debug!(
            routes = router.len(),
            expose_errors = self.expose_errors,
            "application built"
        );
        Ok(Dispatcher::new(handlers, router, self.expose_errors))
    }
}
