//! The axum middleware stages of the request pipeline.
//!
//! In request order:
//! 1. [`track_request`] stamps the correlation id and start instant.
//! 2. [`audit_log`] installs the correlated logger, buffers the request body,
//!    and writes one audit record once the rest of the chain has returned.
//! 3. [`crash_safety_net`] turns a panic anywhere below it into a generic 500.
//! 4. [`unknown_route`] sits directly around the routes and answers requests
//!    no route claimed.
//!
//! [`crate::adapters::Pipeline`] applies them in this order; they are public so
//! that a service with unusual needs can assemble them by hand.
use std::{convert::Infallible, net::SocketAddr, panic::AssertUnwindSafe, sync::Arc};

use axum::{
    body::{Body, HttpBody},
    extract::{ConnectInfo, Request, State},
    http::{HeaderMap, HeaderValue, StatusCode, header},
    middleware::Next,
    response::{IntoResponse, Response},
};
use bytes::Bytes;
use futures_util::{FutureExt, stream};
use http_body::Frame;
use http_body_util::{BodyExt, LengthLimitError, Limited, StreamBody};
use serde_json::{Value, json};
use tracing::Instrument;

use crate::{
    core::{
        audit::{BodyLimits, CompletedRequest, build_record, is_silent_preflight},
        classifier::Classification,
        context::{ErrorReport, Outcome, RequestContext},
        envelope::ErrorEnvelope,
        fallback::{self, CRASH_LOG_MESSAGE},
    },
    ports::log_sink::LogSink,
    tracing_setup::create_request_span,
};

/// Response header echoing the correlation id.
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Logged in place of response bodies that are streamed rather than buffered.
pub const STREAMED_BODY_MARKER: &str = "<streamed>";

/// Shared settings for [`audit_log`].
#[derive(Clone)]
pub struct AuditState {
    pub sink: Arc<dyn LogSink>,
    pub limits: BodyLimits,
    /// Install the logger but write no audit record.
    pub no_logging: bool,
    /// Largest request body buffered, in bytes.
    pub body_buffer_limit: usize,
}

/// Stamp the request with a fresh id and start instant, and echo the id back.
pub async fn track_request(mut req: Request, next: Next) -> Response {
    let context = RequestContext::track();
    let id = context.id().clone();
    let span = create_request_span(req.method().as_str(), req.uri().path(), id.as_str());
    req.extensions_mut().insert(context);

    let mut response = next.run(req).instrument(span).await;

    if let Ok(header_value) = HeaderValue::from_str(id.as_str()) {
        response.headers_mut().insert(REQUEST_ID_HEADER, header_value);
    }
    response
}

/// Install the correlated logger, run the chain, and write the audit record.
pub async fn audit_log(State(audit): State<AuditState>, mut req: Request, next: Next) -> Response {
    let mut context = match req.extensions().get::<RequestContext>() {
        Some(context) => context.clone(),
        None => {
            tracing::warn!("audit_log ran before track_request; tracking here instead");
            RequestContext::track()
        }
    };
    context.install_logger(audit.sink.clone());
    req.extensions_mut().insert(context.clone());

    if audit.no_logging {
        return next.run(req).await;
    }

    let method = req.method().to_string();
    let url = req
        .uri()
        .path_and_query()
        .map(|pq| pq.as_str().to_string())
        .unwrap_or_else(|| req.uri().path().to_string());
    let ip = client_ip(&req);
    let requests_cors_method = req
        .headers()
        .contains_key(header::ACCESS_CONTROL_REQUEST_METHOD);

    let (parts, body) = req.into_parts();
    let (response, request_body) = match buffer_request_body(body, audit.body_buffer_limit).await {
        Ok(bytes) => {
            let request_body = request_body_value(&bytes);
            let req = Request::from_parts(parts, Body::from(bytes));
            (next.run(req).await, request_body)
        }
        Err(classification) => (classification.into_response(), Value::Null),
    };

    let (mut parts, body) = response.into_parts();
    let mut outcome = parts.extensions.remove::<Outcome>().unwrap_or_default();
    let body_is_empty = body.size_hint().exact() == Some(0);
    let (response_body, body) =
        match capture_response_body(body, audit.limits.response, audit.body_buffer_limit).await {
            Ok(captured) => captured,
            Err(classification) => {
                let response_body = classification.envelope.to_json();
                let (failed_parts, failed_body) = classification.into_response().into_parts();
                parts = failed_parts;
                outcome = parts.extensions.remove::<Outcome>().unwrap_or_default();
                (response_body, failed_body)
            }
        };

    if is_silent_preflight(
        &method,
        requests_cors_method,
        parts.status.as_u16(),
        body_is_empty,
    ) {
        return Response::from_parts(parts, body);
    }

    let record = build_record(
        CompletedRequest {
            context: &context,
            method: &method,
            url: &url,
            ip,
            request_body,
            response_status: parts.status.as_u16(),
            response_body,
            outcome,
        },
        audit.limits,
    );
    if let Err(e) = audit.sink.request(&record) {
        tracing::warn!(request_id = %record.id, "Failed to write audit record: {}", e);
    }

    Response::from_parts(parts, body)
}

/// Convert a panic anywhere downstream into a generic 500.
pub async fn crash_safety_net(req: Request, next: Next) -> Response {
    let context = req.extensions().get::<RequestContext>().cloned();

    match AssertUnwindSafe(next.run(req)).catch_unwind().await {
        Ok(response) => response,
        Err(payload) => {
            let classification = fallback::crash(payload.as_ref());
            let meta = json!({ "err": classification.outcome.error() });
            match context.as_ref().and_then(RequestContext::log) {
                Some(log) => log.error(Some(meta), CRASH_LOG_MESSAGE),
                None => {
                    let request_id = context
                        .as_ref()
                        .map(|c| c.id().to_string())
                        .unwrap_or_else(|| "-".to_string());
                    tracing::error!(request_id = %request_id, err = %meta, "{CRASH_LOG_MESSAGE}");
                }
            }
            classification.into_response()
        }
    }
}

/// Answer requests that no route claimed with a 404 envelope.
pub async fn unknown_route(req: Request, next: Next) -> Response {
    let method = req.method().to_string();
    let path = req.uri().path().to_string();

    let response = next.run(req).await;
    let body_is_empty = response.body().size_hint().exact() == Some(0);

    match fallback::unknown_route(&method, &path, response.status(), body_is_empty) {
        Some(classification) => classification.into_response(),
        None => response,
    }
}

async fn buffer_request_body(body: Body, limit: usize) -> Result<Bytes, Classification> {
    match Limited::new(body, limit).collect().await {
        Ok(collected) => Ok(collected.to_bytes()),
        Err(e) if e.downcast_ref::<LengthLimitError>().is_some() => {
            let message = "Request body too large";
            Err(Classification {
                status: StatusCode::PAYLOAD_TOO_LARGE,
                envelope: ErrorEnvelope::message(message),
                outcome: Outcome::Warning(message.to_string()),
            })
        }
        Err(e) => {
            let message = "Could not read request body";
            tracing::debug!("{message}: {e}");
            Err(Classification {
                status: StatusCode::BAD_REQUEST,
                envelope: ErrorEnvelope::message(message),
                outcome: Outcome::Warning(format!("{message}: {e}")),
            })
        }
    }
}

/// Buffer bodies of known length up to `buffer_limit` so they can be logged.
///
/// Streams and oversized bodies pass through untouched and log as
/// [`STREAMED_BODY_MARKER`]; nothing is buffered when the logged length is
/// `Some(0)`. A body that fails mid-read is answered with a generic 500.
async fn capture_response_body(
    body: Body,
    max_logged: Option<usize>,
    buffer_limit: usize,
) -> Result<(Value, Body), Classification> {
    if max_logged == Some(0) {
        return Ok((Value::Null, body));
    }
    match body.size_hint().exact() {
        Some(len) if usize::try_from(len).is_ok_and(|len| len <= buffer_limit) => {}
        _ => return Ok((Value::String(STREAMED_BODY_MARKER.to_string()), body)),
    }

    match Limited::new(body, buffer_limit).collect().await {
        Ok(collected) => {
            let trailers = collected.trailers().cloned();
            let bytes = collected.to_bytes();
            let logged = response_body_value(&bytes);
            let body = match trailers {
                Some(trailers) => Body::new(StreamBody::new(stream::iter([
                    Ok::<_, Infallible>(Frame::data(bytes)),
                    Ok(Frame::trailers(trailers)),
                ]))),
                None => Body::from(bytes),
            };
            Ok((logged, body))
        }
        Err(e) => {
            tracing::warn!("Response body failed while buffering for the audit log: {}", e);
            Err(Classification {
                status: StatusCode::INTERNAL_SERVER_ERROR,
                envelope: ErrorEnvelope::generic(),
                outcome: Outcome::Error(
                    ErrorReport::from_error(e.as_ref(), None)
                        .with_note("response body failed while being read"),
                ),
            })
        }
    }
}

/// Empty request bodies log as `{}`.
fn request_body_value(bytes: &[u8]) -> Value {
    if bytes.is_empty() {
        return Value::Object(Default::default());
    }
    parse_body(bytes)
}

fn response_body_value(bytes: &[u8]) -> Value {
    if bytes.is_empty() {
        return Value::Null;
    }
    parse_body(bytes)
}

fn parse_body(bytes: &[u8]) -> Value {
    serde_json::from_slice(bytes)
        .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(bytes).into_owned()))
}

fn client_ip(req: &Request) -> Option<String> {
    if let Some(ConnectInfo(addr)) = req.extensions().get::<ConnectInfo<SocketAddr>>() {
        return Some(addr.ip().to_string());
    }
    forwarded_for(req.headers())
}

fn forwarded_for(headers: &HeaderMap) -> Option<String> {
    headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(|ip| ip.trim().to_string())
        .filter(|ip| !ip.is_empty())
}
