use std::path::{Path, PathBuf};

use clap::Parser;
use costwise::{
    AppState, StartupError, build_app,
    config::{self, CostwiseConfig},
    observability, updater,
};
use tokio_util::{sync::CancellationToken, task::TaskTracker};

const DEFAULT_CONFIG_FILE: &str = "costwise.toml";

/// CLI arguments for costwise
#[derive(Parser, Debug)]
#[command(version, about = "Cloud, AI model and SaaS cost estimation", long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Option<Command>,

    /// Path to config file (defaults to ./costwise.toml if it exists,
    /// otherwise built-in defaults)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,
}

#[derive(clap::Subcommand, Debug)]
enum Command {
    /// Start the HTTP server and the scheduled price updater (default)
    Serve,
    /// Run one price update cycle and print its report
    Update,
    /// Classify a task description
    Classify {
        /// Free-text description of the task
        text: String,
    },
    /// List the available tools with their input schemas
    Tools,
    /// Call a tool with JSON arguments
    Call {
        /// Tool name, e.g. estimate_compute_cost
        tool: String,
        /// Arguments as a JSON object (defaults to `{}`)
        args: Option<String>,
    },
    /// Write a default configuration file
    Init {
        /// Path to create the config file (defaults to ./costwise.toml)
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Overwrite existing config file
        #[arg(long)]
        force: bool,
    },
    /// Export the JSON schema for the configuration file
    Schema {
        /// Output file (defaults to stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() {
    let args = Args::parse();
    let config_path = args.config.as_deref();

    match args.command {
        Some(Command::Init { output, force }) => run_init(output, force),
        Some(Command::Schema { output }) => {
            #[cfg(feature = "json-schema")]
            run_schema_export(output);
            #[cfg(not(feature = "json-schema"))]
            {
                let _ = output;
                eprintln!("Error: JSON schema export requires the 'json-schema' feature");
                std::process::exit(1);
            }
        }
        Some(Command::Update) => run_update(config_path).await,
        Some(Command::Classify { text }) => run_classify(config_path, &text).await,
        Some(Command::Tools) => run_list_tools(config_path),
        Some(Command::Call { tool, args }) => run_call(config_path, &tool, args.as_deref()).await,
        Some(Command::Serve) | None => run_server(config_path).await,
    }
}

/// An explicit path must exist; otherwise `./costwise.toml` is used when
/// present, and the built-in defaults when not.
fn load_config(explicit_path: Option<&Path>) -> CostwiseConfig {
    let path = match explicit_path {
        Some(path) => path.to_path_buf(),
        None => {
            let default = PathBuf::from(DEFAULT_CONFIG_FILE);
            if !default.exists() {
                return CostwiseConfig::default();
            }
            default
        }
    };

    CostwiseConfig::from_file(&path).unwrap_or_else(|e| {
        eprintln!("Failed to load config from {}: {}", path.display(), e);
        std::process::exit(1);
    })
}

fn build_state(config: &CostwiseConfig) -> AppState {
    let state = config
        .server
        .http_client
        .build_client()
        .map_err(StartupError::from)
        .and_then(|client| AppState::from_config(config, &client));

    state.unwrap_or_else(|e| {
        eprintln!("Failed to initialize: {}", e);
        std::process::exit(1);
    })
}

fn init_tracing(config: &CostwiseConfig) {
    if let Err(e) = observability::init_tracing(&config.observability) {
        eprintln!("{}", e);
        std::process::exit(1);
    }
}

fn print_json(value: &impl serde::Serialize) {
    match serde_json::to_string_pretty(value) {
        Ok(json) => println!("{}", json),
        Err(e) => {
            eprintln!("Failed to serialize output: {}", e);
            std::process::exit(1);
        }
    }
}

async fn run_server(config_path: Option<&Path>) {
    let config = load_config(config_path);
    init_tracing(&config);

    let state = build_state(&config);
    let catalog = state.tools.catalog().snapshot();
    tracing::info!(
        models = catalog.model_count(),
        instances = catalog.instance_count(),
        services = catalog.service_count(),
        zero_shot_fallback = state.tools.classifier().has_fallback(),
        "Starting costwise"
    );

    let task_tracker = TaskTracker::new();
    let shutdown = CancellationToken::new();

    match &state.updater {
        Some(orchestrator) => {
            task_tracker.spawn(updater::start_update_worker(
                orchestrator.clone(),
                config.updater.clone(),
                shutdown.clone(),
            ));
        }
        None => tracing::warn!(
            "No catalog.data_dir configured, serving embedded prices without updates"
        ),
    }

    let app = build_app(&config.server, state);

    let bind_addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = match tokio::net::TcpListener::bind(&bind_addr).await {
        Ok(listener) => listener,
        Err(e) => {
            tracing::error!(address = %bind_addr, error = %e, "Failed to bind to address");
            std::process::exit(1);
        }
    };

    tracing::info!("Server listening on http://{}", bind_addr);

    // Graceful shutdown: wait for SIGINT/SIGTERM, then for background tasks
    if let Err(e) = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(task_tracker.clone(), shutdown))
        .await
    {
        tracing::error!(error = %e, "Server error");
    }

    task_tracker.wait().await;
    tracing::info!("Shutdown complete");
}

async fn shutdown_signal(task_tracker: TaskTracker, shutdown: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received, waiting for background tasks to complete...");

    // Stop the update worker and refuse new tasks
    shutdown.cancel();
    task_tracker.close();
}

async fn run_update(config_path: Option<&Path>) {
    let config = load_config(config_path);
    init_tracing(&config);

    let state = build_state(&config);
    let Some(orchestrator) = state.updater else {
        eprintln!("Price updates need `catalog.data_dir` to be configured");
        std::process::exit(1);
    };

    match orchestrator.run_cycle().await {
        Ok(report) => {
            print_json(&report);
            if report.failures() > 0 {
                std::process::exit(2);
            }
        }
        Err(e) => {
            eprintln!("{}", e);
            std::process::exit(1);
        }
    }
}

async fn run_classify(config_path: Option<&Path>, text: &str) {
    let state = build_state(&load_config(config_path));
    let result = state
        .tools
        .call("classify_task", serde_json::json!({ "text": text }))
        .await;
    print_tool_result(result);
}

fn run_list_tools(config_path: Option<&Path>) {
    let state = build_state(&load_config(config_path));
    print_json(&state.tools.list());
}

async fn run_call(config_path: Option<&Path>, tool: &str, args: Option<&str>) {
    let args = match args.map(serde_json::from_str::<serde_json::Value>) {
        None => serde_json::Value::Null,
        Some(Ok(value)) => value,
        Some(Err(e)) => {
            eprintln!("Arguments are not valid JSON: {}", e);
            std::process::exit(1);
        }
    };

    let state = build_state(&load_config(config_path));
    print_tool_result(state.tools.call(tool, args).await);
}

fn print_tool_result(result: Result<serde_json::Value, costwise::tools::ToolError>) {
    match result {
        Ok(value) => print_json(&value),
        Err(e) => {
            eprintln!("Error [{}]: {}", e.code(), e);
            if let Some(values) = e.valid_values() {
                eprintln!("Valid values: {}", values.join(", "));
            }
            std::process::exit(1);
        }
    }
}

fn run_init(output: Option<PathBuf>, force: bool) {
    let output_path = output.unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE));

    if output_path.exists() && !force {
        eprintln!(
            "Config file already exists: {}\nUse --force to overwrite.",
            output_path.display()
        );
        std::process::exit(1);
    }

    // Create parent directories if needed
    if let Some(parent) = output_path.parent()
        && !parent.as_os_str().is_empty()
        && let Err(e) = std::fs::create_dir_all(parent)
    {
        eprintln!("Failed to create directory {}: {}", parent.display(), e);
        std::process::exit(1);
    }

    if let Err(e) = std::fs::write(&output_path, config::DEFAULT_CONFIG) {
        eprintln!("Failed to write config file: {}", e);
        std::process::exit(1);
    }

    println!("Created config file: {}", output_path.display());
    println!();
    println!("To fetch current prices into the data directory, run:");
    println!("  costwise update");
    println!();
    println!("To start the server, run:");
    println!("  costwise serve");
}

#[cfg(feature = "json-schema")]
fn run_schema_export(output: Option<PathBuf>) {
    let content = match CostwiseConfig::json_schema_string() {
        Ok(content) => content,
        Err(e) => {
            eprintln!("Failed to generate config schema: {}", e);
            std::process::exit(1);
        }
    };

    match output {
        Some(path) => {
            if let Err(e) = std::fs::write(&path, &content) {
                eprintln!("Failed to write to {}: {}", path.display(), e);
                std::process::exit(1);
            }
            eprintln!("Config JSON schema written to {}", path.display());
        }
        None => println!("{}", content),
    }
}
