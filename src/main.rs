use std::path::Path;

use axum::{
    Json, Router,
    body::Bytes,
    extract::Path as UrlPath,
    http::StatusCode,
    routing::{get, post},
};
use clap::Parser;
use color_eyre::{Result, eyre::Context};
use serde_json::{Value, json};
use trellis::{
    ClassifyResultExt, FieldIssue, MessageSpec, Pipeline, RequestLogger, RuleSet, RuleSpec,
    Server, ServiceError,
    config::{ServiceConfigValidator, load_config},
    handle_error, tracing_setup,
};

#[derive(Parser, Debug)]
#[clap(author, version, about)]
struct Args {
    #[clap(subcommand)]
    command: Option<Commands>,

    #[clap(short, long, default_value = "config.toml")]
    config: String,
}

#[derive(Parser, Debug)]
enum Commands {
    /// Validate configuration file
    Validate {
        /// Configuration file to validate
        #[clap(short, long, default_value = "config.toml")]
        config: String,
    },
    /// Initialize a new configuration file
    Init {
        /// Output path for the new config file
        #[clap(short, long, default_value = "config.toml")]
        config: String,
    },
    /// Start the demo service (default)
    Serve {
        /// Configuration file to use
        #[clap(short, long, default_value = "config.toml")]
        config: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;

    let args = Args::parse();

    match args.command {
        Some(Commands::Validate { config }) => validate_config_command(&config).await,
        Some(Commands::Init { config }) => init_config_command(&config).await,
        Some(Commands::Serve { config }) => serve_command(&config).await,
        None => serve_command(&args.config).await,
    }
}

async fn serve_command(config_path: &str) -> Result<()> {
    let config = load_config(config_path)
        .await
        .with_context(|| format!("Failed to load config from {config_path}"))?;
    ServiceConfigValidator::validate(&config).context("Invalid configuration")?;

    tracing_setup::init_tracing(&config.name, &config.log)?;
    tracing::info!(
        service = %config.name,
        "Starting with config from {}",
        config_path
    );

    let app = Pipeline::new(config.clone()).routes(demo_routes()).build();
    Server::new(config).serve(app).await
}

fn demo_routes() -> Router {
    Router::new()
        .route("/healthz", get(|| async { Json(json!({ "status": "ok" })) }))
        .route("/widgets/{id}", get(get_widget))
        .route("/widgets", post(create_widget))
        .route("/boom", get(boom))
}

async fn get_widget(
    log: RequestLogger,
    UrlPath(id): UrlPath<u64>,
) -> Result<Json<Value>, axum::response::Response> {
    log.info(Some(json!({ "widget": id })), "looking up widget");

    let found: Result<Value, ServiceError> = match id {
        1 => Ok(json!({ "id": 1, "name": "sprocket" })),
        13 => Err(ServiceError::new("LOCKED", "Widget 13 is locked")),
        _ => Err(ServiceError::new(
            "NOT_FOUND",
            format!("Widget {id} does not exist"),
        )),
    };

    let widget = found.or_classify(
        RuleSet::new()
            .status("NOT_FOUND", StatusCode::NOT_FOUND)
            .rule(
                "LOCKED",
                RuleSpec::new(StatusCode::CONFLICT).message("Widget is locked"),
            )
            .fallback("Could not load the widget"),
    )?;
    Ok(Json(widget))
}

async fn create_widget(body: Bytes) -> Result<(StatusCode, Json<Value>), axum::response::Response> {
    let payload = serde_json::from_slice::<Value>(&body)
        .map_err(ServiceError::other)
        .or_classify(
            MessageSpec::new("Request body must be JSON")
                .status(StatusCode::BAD_REQUEST)
                .code("INVALID_JSON"),
        )?;

    let mut issues = Vec::new();
    if !payload.get("name").is_some_and(Value::is_string) {
        issues.push(FieldIssue::new("name", "string"));
    }
    if !payload.get("age").is_some_and(Value::is_u64) {
        issues.push(FieldIssue::new("age", "non-negative integer"));
    }
    if !issues.is_empty() {
        return Err(handle_error(&ServiceError::validation(issues), RuleSet::new()));
    }

    Ok((StatusCode::CREATED, Json(payload)))
}

async fn boom() -> &'static str {
    panic!("the boom route always fails")
}

async fn validate_config_command(config_path: &str) -> Result<()> {
    println!("🔍 Validating configuration file: {config_path}");

    if !Path::new(config_path).exists() {
        eprintln!("❌ Error: Configuration file '{config_path}' not found");
        std::process::exit(1);
    }

    let config = match load_config(config_path).await {
        Ok(config) => {
            println!("✅ Configuration parsing: OK");
            config
        }
        Err(e) => {
            eprintln!("❌ Configuration parsing failed:");
            eprintln!("   {e}");
            std::process::exit(1);
        }
    };

    match ServiceConfigValidator::validate(&config) {
        Ok(()) => {
            println!("✅ Configuration validation: OK");
            println!();
            println!("📋 Configuration Summary:");
            println!("   • Service: {}", config.name);
            println!("   • Listen Address: {}", config.listen_addr());
            println!("   • Audit Logging: {}", !config.no_logging);
            println!("   • CORS: {}", config.allow_cors);
            println!("   • Log Level: {}", config.log.level);
            println!();
            println!("🎉 Configuration is valid and ready to use!");
            Ok(())
        }
        Err(e) => {
            eprintln!("❌ Configuration validation failed:");
            eprintln!("{e}");
            println!();
            println!("💡 Common fixes:");
            println!("   • Give the service a non-empty name");
            println!("   • Check that host and port form a valid address (e.g., '127.0.0.1', 3000)");
            println!("   • Use a valid log filter (e.g., 'info' or 'trellis=debug')");
            std::process::exit(1);
        }
    }
}

async fn init_config_command(config_path: &str) -> Result<()> {
    let path = Path::new(config_path);
    if path.exists() {
        eprintln!("❌ Error: Configuration file '{config_path}' already exists");
        std::process::exit(1);
    }

    let default_config = r#"# Trellis service configuration
# Any key can be overridden with TRELLIS__<KEY>, e.g. TRELLIS__PORT=8080

name = "widgets"
host = "127.0.0.1"
port = 3000

# Skip the per-request audit record
no_logging = false

# Answer CORS requests permissively
allow_cors = false

# Maximum logged body lengths (0 logs nothing, omit for no limit)
# request_body_max_logging_len = 2048
# response_body_max_logging_len = 2048

# Largest request body accepted, in bytes
body_buffer_limit = 2097152

# Seconds to wait for in-flight requests on shutdown
shutdown_timeout_secs = 30

[log]
level = "info"
format = "json"
"#;

    tokio::fs::write(path, default_config)
        .await
        .context("Failed to write config file")?;
    println!("✅ Created default configuration at: {config_path}");
    println!("   Run 'trellis serve --config {config_path}' to start the service");
    Ok(())
}
