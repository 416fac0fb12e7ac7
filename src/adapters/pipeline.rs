//! Composes the middleware stages around a service's routes.
//!
//! Stage order is fixed by [`Pipeline::build`]; consumers only choose where
//! their own layers sit relative to the routes:
//!
//! ```text
//! track_request ─> audit_log ─> [cors] ─> crash_safety_net ─> BeforeRoutes layers
//!     ─> unknown_route ─> AfterRoutes layers ─> routes
//! ```
use std::{convert::Infallible, sync::Arc};

use axum::{
    Router,
    extract::Request,
    middleware,
    response::IntoResponse,
    routing::Route,
};
use tower::{Layer, Service};
use tower_http::cors::CorsLayer;

use crate::{
    adapters::{
        TracingSink,
        middleware::{AuditState, audit_log, crash_safety_net, track_request, unknown_route},
    },
    config::models::ServiceConfig,
    ports::log_sink::LogSink,
};

/// Where a consumer layer runs relative to the routes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Position {
    /// Sees every request after tracking, logging and crash protection are in
    /// place, before routing. Registration order is execution order.
    BeforeRoutes,
    /// Wraps the routes themselves and sees their raw responses before
    /// unknown-route handling.
    AfterRoutes,
}

type Stage = Box<dyn FnOnce(Router) -> Router + Send>;

pub struct Pipeline {
    config: ServiceConfig,
    sink: Arc<dyn LogSink>,
    routes: Router,
    before_routes: Vec<Stage>,
    after_routes: Vec<Stage>,
}

impl Pipeline {
    /// Start a pipeline logging through `tracing` under the service's name.
    pub fn new(config: ServiceConfig) -> Self {
        let sink = Arc::new(TracingSink::new(config.name.clone()));
        Self {
            config,
            sink,
            routes: Router::new(),
            before_routes: Vec::new(),
            after_routes: Vec::new(),
        }
    }

    /// Replace the log sink, e.g. with a [`crate::adapters::MemorySink`] in tests.
    pub fn with_sink(mut self, sink: Arc<dyn LogSink>) -> Self {
        self.sink = sink;
        self
    }

    /// Merge a router's routes into the service.
    pub fn routes(mut self, router: Router) -> Self {
        self.routes = self.routes.merge(router);
        self
    }

    /// Add a consumer layer at `position`.
    pub fn layer<L>(mut self, position: Position, layer: L) -> Self
    where
        L: Layer<Route> + Clone + Send + Sync + 'static,
        L::Service: Service<Request> + Clone + Send + Sync + 'static,
        <L::Service as Service<Request>>::Response: IntoResponse + 'static,
        <L::Service as Service<Request>>::Error: Into<Infallible> + 'static,
        <L::Service as Service<Request>>::Future: Send + 'static,
    {
        let stage: Stage = Box::new(move |router: Router| router.layer(layer));
        match position {
            Position::BeforeRoutes => self.before_routes.push(stage),
            Position::AfterRoutes => self.after_routes.push(stage),
        }
        self
    }

    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }

    /// Assemble the router. Layers added later wrap earlier ones, so stages
    /// are applied innermost first.
    pub fn build(self) -> Router {
        let mut app = self.routes;

        for stage in self.after_routes.into_iter().rev() {
            app = stage(app);
        }
        app = app.layer(middleware::from_fn(unknown_route));

        for stage in self.before_routes.into_iter().rev() {
            app = stage(app);
        }
        app = app.layer(middleware::from_fn(crash_safety_net));

        if self.config.allow_cors {
            app = app.layer(CorsLayer::permissive());
        }

        let audit = AuditState {
            sink: self.sink,
            limits: self.config.body_limits(),
            no_logging: self.config.no_logging,
            body_buffer_limit: self.config.body_buffer_limit,
        };
        app.layer(middleware::from_fn_with_state(audit, audit_log))
            .layer(middleware::from_fn(track_request))
    }
}
