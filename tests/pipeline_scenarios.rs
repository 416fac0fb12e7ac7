// End-to-end behaviour of the assembled pipeline, driven through `oneshot`
#[cfg(test)]
mod test {
    use std::sync::Arc;

    use axum::{
        Json, Router,
        body::{Body, to_bytes},
        extract::Request,
        http::{self, HeaderValue, StatusCode},
        middleware::{self, Next},
        response::Response,
        routing::{get, options, post},
    };
    use serde_json::{Value, json};
    use tower::ServiceExt; // for oneshot
    use trellis::{
        FieldIssue, MemorySink, Pipeline, Position, RequestContext, RequestLogger, RuleSet,
        RuleSpec, ServiceConfig, ServiceError, Severity, handle_error,
    };

    fn routes() -> Router {
        Router::new()
            .route(
                "/widgets/{id}",
                get(|| async {
                    let err = ServiceError::new("NOT_FOUND", "Widget 7 does not exist");
                    handle_error(
                        &err,
                        RuleSet::new().rule("NOT_FOUND", RuleSpec::new(StatusCode::NOT_FOUND)),
                    )
                }),
            )
            .route(
                "/mystery",
                get(|| async {
                    handle_error(&ServiceError::new("ODD", "something odd"), RuleSet::new())
                }),
            )
            .route(
                "/people",
                post(|| async {
                    let issues = vec![
                        FieldIssue::new("name", "string").with_reason("required"),
                        FieldIssue::new("age", "number"),
                    ];
                    handle_error(&ServiceError::validation(issues), RuleSet::new())
                }),
            )
            .route(
                "/login",
                post(|log: RequestLogger, Json(body): Json<Value>| async move {
                    log.info(Some(json!({ "user": body["name"] })), "login attempt");
                    Json(json!({ "token": "abc", "user": body["name"] }))
                }),
            )
            .route("/boom", get(boom))
            .route("/slow", get(slow))
            .route("/upload", options(|| async { StatusCode::NO_CONTENT }))
    }

    async fn slow() -> &'static str {
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        "done"
    }

    async fn boom() -> &'static str {
        panic!("database handle vanished")
    }

    fn app(config: ServiceConfig, sink: Arc<MemorySink>) -> Router {
        Pipeline::new(config).with_sink(sink).routes(routes()).build()
    }

    fn default_app(sink: Arc<MemorySink>) -> Router {
        app(ServiceConfig::builder("scenarios").build(), sink)
    }

    async fn body_json(response: Response) -> Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn get_request(uri: &str) -> Request {
        http::Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    fn post_json(uri: &str, body: Value) -> Request {
        http::Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn test_configured_discriminant_is_a_warning() {
        let sink = Arc::new(MemorySink::new());
        let response = default_app(sink.clone())
            .oneshot(get_request("/widgets/7"))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(
            body_json(response).await,
            json!({ "error": { "message": "Widget 7 does not exist", "code": "NOT_FOUND" } })
        );

        let records = sink.records();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].severity(), Severity::Warning);
        assert_eq!(records[0].warning.as_deref(), Some("Widget 7 does not exist"));
    }

    #[tokio::test]
    async fn test_unmatched_discriminant_escalates() {
        let sink = Arc::new(MemorySink::new());
        let response = default_app(sink.clone())
            .oneshot(get_request("/mystery"))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(
            body_json(response).await,
            json!({ "error": { "message": "We encountered a problem" } })
        );

        let record = &sink.records()[0];
        let err = record.err.as_ref().unwrap();
        assert_eq!(err.message, "something odd");
        assert!(err.note.as_deref().unwrap().contains("'ODD'"));
        assert!(record.warning.is_none());
    }

    #[tokio::test]
    async fn test_validation_failure_lists_fields() {
        let sink = Arc::new(MemorySink::new());
        let response = default_app(sink.clone())
            .oneshot(post_json("/people", json!({})))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            body_json(response).await,
            json!({
                "error": {
                    "message": "Missing or incorrectly formatted data",
                    "fields": { "name": "required", "age": "must be a number" }
                }
            })
        );
        assert_eq!(
            sink.records()[0].warning.as_deref(),
            Some("Struct validation failure")
        );
    }

    #[tokio::test]
    async fn test_sensitive_fields_are_redacted_in_both_bodies() {
        let sink = Arc::new(MemorySink::new());
        let response = default_app(sink.clone())
            .oneshot(post_json(
                "/login",
                json!({ "password": "secret123", "name": "Al" }),
            ))
            .await
            .unwrap();

        // The client still gets the real value
        assert_eq!(body_json(response).await["token"], json!("abc"));

        let record = &sink.records()[0];
        assert_eq!(
            record.request_body,
            json!({ "password": "*******", "name": "Al" })
        );
        assert_eq!(record.response_body, json!({ "token": "*******", "user": "Al" }));
        assert_eq!(record.severity(), Severity::Info);
    }

    #[tokio::test]
    async fn test_body_logging_limits() {
        let sink = Arc::new(MemorySink::new());
        let config = ServiceConfig::builder("limits")
            .request_body_max_logging_len(0)
            .response_body_max_logging_len(10)
            .build();
        app(config, sink.clone())
            .oneshot(post_json("/login", json!({ "name": "Alexandria" })))
            .await
            .unwrap();

        let record = &sink.records()[0];
        assert_eq!(record.request_body, json!(""));
        let logged = record.response_body.as_str().unwrap();
        assert!(logged.starts_with(r#"{"token":""#));
        assert!(logged.contains("...[truncated "));
    }

    #[tokio::test]
    async fn test_unknown_route_answers_404_envelope() {
        let sink = Arc::new(MemorySink::new());
        let response = default_app(sink.clone())
            .oneshot(get_request("/nope"))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(
            body_json(response).await,
            json!({ "error": { "message": "Unknown endpoint requested: GET /nope" } })
        );

        let record = &sink.records()[0];
        assert_eq!(
            record.warning.as_deref(),
            Some("Unknown endpoint requested: GET /nope")
        );
        assert_eq!(record.response_status, 404);
    }

    #[tokio::test]
    async fn test_panic_becomes_generic_500() {
        let sink = Arc::new(MemorySink::new());
        let response = default_app(sink.clone())
            .oneshot(get_request("/boom"))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = body_json(response).await;
        assert_eq!(body, json!({ "error": { "message": "We encountered a problem" } }));
        assert!(!body.to_string().contains("vanished"));

        let record = &sink.records()[0];
        assert_eq!(record.severity(), Severity::Error);
        assert_eq!(
            record.err.as_ref().unwrap().message,
            "database handle vanished"
        );

        let events = sink.events();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].severity, Severity::Error);
        assert_eq!(
            events[0].message,
            "Something broke that wasn't handled anywhere else"
        );
        assert_eq!(events[0].fields["id"], json!(record.id));
    }

    #[tokio::test]
    async fn test_request_id_correlates_header_logger_and_record() {
        let sink = Arc::new(MemorySink::new());
        let response = default_app(sink.clone())
            .oneshot(post_json("/login", json!({ "name": "Al" })))
            .await
            .unwrap();

        let header = response.headers()["x-request-id"].to_str().unwrap().to_string();
        let record = &sink.records()[0];
        assert_eq!(record.id, header);
        assert_eq!(record.method, "POST");
        assert_eq!(record.url, "/login");

        let events = sink.events();
        assert_eq!(events[0].message, "login attempt");
        assert_eq!(events[0].fields["id"], json!(header));
        assert_eq!(events[0].fields["user"], json!("Al"));
    }

    #[tokio::test]
    async fn test_no_logging_keeps_the_logger() {
        let sink = Arc::new(MemorySink::new());
        let config = ServiceConfig::builder("quiet").no_logging(true).build();
        let response = app(config, sink.clone())
            .oneshot(post_json("/login", json!({ "name": "Al" })))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert!(sink.records().is_empty());
        assert_eq!(sink.events().len(), 1);
    }

    #[tokio::test]
    async fn test_cors_preflight_is_not_logged() {
        let sink = Arc::new(MemorySink::new());
        let config = ServiceConfig::builder("cors").allow_cors(true).build();
        let app = app(config, sink.clone());

        let preflight = http::Request::builder()
            .method("OPTIONS")
            .uri("/login")
            .header("origin", "https://example.com")
            .header("access-control-request-method", "POST")
            .body(Body::empty())
            .unwrap();
        let response = app.clone().oneshot(preflight).await.unwrap();
        assert!(response.status().is_success());
        assert!(response.headers().contains_key("access-control-allow-origin"));
        assert!(sink.records().is_empty());

        let response = app
            .oneshot(
                http::Request::builder()
                    .uri("/widgets/7")
                    .header("origin", "https://example.com")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert!(response.headers().contains_key("access-control-allow-origin"));
        assert_eq!(sink.records().len(), 1);
    }

    #[tokio::test]
    async fn test_response_time_covers_the_handler() {
        let sink = Arc::new(MemorySink::new());
        default_app(sink.clone())
            .oneshot(get_request("/slow"))
            .await
            .unwrap();

        let record = &sink.records()[0];
        assert!(record.response_time_ms >= 20, "{}", record.response_time_ms);
        assert_eq!(record.response_body, json!("done"));
    }

    #[tokio::test]
    async fn test_handler_answered_preflight_is_not_logged() {
        let sink = Arc::new(MemorySink::new());
        let app = default_app(sink.clone());

        let preflight = http::Request::builder()
            .method("OPTIONS")
            .uri("/upload")
            .header("access-control-request-method", "PUT")
            .body(Body::empty())
            .unwrap();
        let response = app.clone().oneshot(preflight).await.unwrap();
        assert_eq!(response.status(), StatusCode::NO_CONTENT);
        assert!(sink.records().is_empty());

        // A plain OPTIONS is an ordinary request
        let plain = http::Request::builder()
            .method("OPTIONS")
            .uri("/upload")
            .body(Body::empty())
            .unwrap();
        app.oneshot(plain).await.unwrap();
        let records = sink.records();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].response_status, 204);
    }

    async fn stamp_before(req: Request, next: Next) -> Response {
        let tracked = req.extensions().get::<RequestContext>().is_some();
        let mut response = next.run(req).await;
        response.headers_mut().insert(
            "x-before",
            HeaderValue::from_static(if tracked { "tracked" } else { "untracked" }),
        );
        response
    }

    async fn stamp_after(req: Request, next: Next) -> Response {
        let mut response = next.run(req).await;
        response
            .headers_mut()
            .insert("x-after", HeaderValue::from_static("seen"));
        response
    }

    #[tokio::test]
    async fn test_consumer_layers_sit_where_requested() {
        let sink = Arc::new(MemorySink::new());
        let app = Pipeline::new(ServiceConfig::builder("layers").build())
            .with_sink(sink.clone())
            .routes(routes())
            .layer(Position::BeforeRoutes, middleware::from_fn(stamp_before))
            .layer(Position::AfterRoutes, middleware::from_fn(stamp_after))
            .build();

        let response = app.clone().oneshot(get_request("/widgets/7")).await.unwrap();
        assert_eq!(response.headers()["x-before"], "tracked");
        assert_eq!(response.headers()["x-after"], "seen");

        // Unknown-route handling replaces the raw response below it
        let response = app.oneshot(get_request("/nope")).await.unwrap();
        assert_eq!(response.headers()["x-before"], "tracked");
        assert!(!response.headers().contains_key("x-after"));
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_every_record_has_exactly_one_severity() {
        let sink = Arc::new(MemorySink::new());
        let app = default_app(sink.clone());
        for uri in ["/widgets/7", "/mystery", "/nope", "/boom"] {
            app.clone().oneshot(get_request(uri)).await.unwrap();
        }

        let records = sink.records();
        assert_eq!(records.len(), 4);
        for record in records {
            assert!(!(record.err.is_some() && record.warning.is_some()));
        }
    }
}
