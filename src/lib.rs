//! Trellis - request tracking, audit logging and error classification for axum services.
//!
//! Trellis wraps a service's routes in a fixed middleware pipeline so that every
//! request gets a correlation id, a correlated logger, exactly one structured
//! audit record, and a uniform JSON error envelope. It follows a **hexagonal
//! architecture**: pure decision logic lives in `core`, the log destination is a
//! port, and axum glue lives in `adapters`.
//!
//! # Features
//! - Per-request correlation ids, echoed in the `x-request-id` header
//! - A correlated [`RequestLogger`] available to handlers as an extractor
//! - One audit record per request with redacted, length-limited bodies
//! - Declarative error classification via [`RuleSet`] / [`MessageSpec`]
//! - Uniform `{"error": {...}}` envelopes, including 404s and panics
//! - Optional permissive CORS with silent pre-flights
//! - File + environment configuration, graceful shutdown
//!
//! # Quick Example
//! ```no_run
//! use axum::{Router, http::StatusCode, routing::get};
//! use trellis::{Pipeline, RuleSet, Server, ServiceConfig, ServiceError, handle_error};
//!
//! # #[tokio::main] async fn main() -> eyre::Result<()> {
//! let config = ServiceConfig::builder("widgets").port(8080).build();
//! let routes = Router::new().route(
//!     "/widgets/{id}",
//!     get(|| async {
//!         let err = ServiceError::new("NOT_FOUND", "no such widget");
//!         handle_error(&err, RuleSet::new().status("NOT_FOUND", StatusCode::NOT_FOUND))
//!     }),
//! );
//! let app = Pipeline::new(config.clone()).routes(routes).build();
//! Server::new(config).serve(app).await
//! # }
//! ```
//!
//! # Error Handling
//! Library errors are `thiserror` enums; application-level paths return
//! `eyre::Result<T>` with context attached via `WrapErr`. Handlers report
//! failures as [`ServiceError`] and let the classifier pick the status.
//!
//! # Logging
//! All output goes through `tracing`. [`TracingSink`] is the default
//! [`ports::LogSink`]; tests swap in [`MemorySink`] to inspect what was logged.
pub mod config;
pub mod ports;
pub mod tracing_setup;
pub mod utils;

pub mod adapters;
pub mod core;

pub use crate::{
    adapters::{
        ClassifyResultExt, MemorySink, Pipeline, Position, Server, TracingSink, handle_error,
    },
    config::ServiceConfig,
    core::{
        Classification, ErrorEnvelope, ErrorResolution, FieldIssue, LogRecord, MessageSpec,
        Outcome, RequestContext, RequestId, RequestLogger, RuleSet, RuleSpec, ServiceError,
        Severity, classify,
    },
    utils::GracefulShutdown,
};
