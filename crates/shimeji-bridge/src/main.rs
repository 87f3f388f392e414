//! HTTP/WS host surface for the terminal bridge.
//!
//! The bridge core is host-agnostic; this binary exposes it to local hosts
//! over a small HTTP API plus an event WebSocket, and doubles as a thin CLI
//! client against a running server.

mod cli;

use std::sync::Arc;

use anyhow::{Context, Result};
use axum::{
    extract::{
        ws::{Message, WebSocket},
        Path, State, WebSocketUpgrade,
    },
    response::{IntoResponse, Json},
    routing::{delete, get, post},
    Router,
};
use clap::{Parser, Subcommand};
use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use tower_http::cors::CorsLayer;
use tracing::info;

use shimeji_bridge::{BridgeError, SessionRegistry, SessionSettings};

// =============================================================================
// CLI Argument Parsing
// =============================================================================

#[derive(Parser)]
#[command(name = "shimeji-bridge")]
#[command(about = "Terminal bridge server and client for embedded shell sessions")]
#[command(version)]
struct Cli {
    /// Server URL for client commands
    #[arg(
        short = 'S',
        long,
        env = "SHIMEJI_BRIDGE_URL",
        default_value = "http://localhost:39484"
    )]
    server: String,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the bridge server
    Server {
        /// Host to bind to
        #[arg(long, env = "BRIDGE_HOST", default_value = "127.0.0.1")]
        host: String,

        /// Port to listen on
        #[arg(short, long, env = "BRIDGE_PORT", default_value = "39484")]
        port: u16,
    },

    /// Execute one command on a session
    Exec {
        /// Session id
        session: String,

        /// Command text
        command: String,

        /// Shell variant (WSL distro on Windows hosts)
        #[arg(long)]
        shell: Option<String>,

        /// Working directory applied before the next command
        #[arg(long)]
        cwd: Option<String>,
    },

    /// Autocomplete a fragment
    Complete {
        /// Session id
        session: String,

        /// Fragment to complete
        fragment: String,

        /// Working directory for filename completion
        #[arg(long)]
        cwd: Option<String>,
    },

    /// Close a session
    Close {
        /// Session id
        session: String,
    },

    /// Close every session
    CloseAll,
}

// =============================================================================
// Request Models
// =============================================================================

#[derive(Debug, Clone, Deserialize)]
struct ExecuteRequest {
    command: String,
    shell: Option<String>,
    cwd: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct CompleteRequest {
    fragment: String,
    shell: Option<String>,
    cwd: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct ResizeRequest {
    cols: u16,
    rows: u16,
    shell: Option<String>,
    cwd: Option<String>,
}

fn settings_from(shell: Option<String>, cwd: Option<String>) -> SessionSettings {
    SessionSettings {
        shell_variant: shell,
        working_directory: cwd,
    }
}

fn error_body(err: &BridgeError) -> serde_json::Value {
    serde_json::json!({ "ok": false, "error": err.to_string() })
}

// =============================================================================
// HTTP Handlers
// =============================================================================

async fn health(State(registry): State<Arc<SessionRegistry>>) -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "sessions": registry.session_count()
    }))
}

async fn execute_command(
    State(registry): State<Arc<SessionRegistry>>,
    Path(session_id): Path<String>,
    Json(request): Json<ExecuteRequest>,
) -> impl IntoResponse {
    let settings = settings_from(request.shell, request.cwd);
    match registry
        .execute(&session_id, &request.command, &settings)
        .await
    {
        Ok(outcome) => Json(serde_json::json!({
            "ok": true,
            "content": outcome.content,
            "exitCode": outcome.exit_code,
            "cwd": outcome.cwd
        })),
        Err(err) => Json(error_body(&err)),
    }
}

async fn complete_fragment(
    State(registry): State<Arc<SessionRegistry>>,
    Path(session_id): Path<String>,
    Json(request): Json<CompleteRequest>,
) -> impl IntoResponse {
    let settings = settings_from(request.shell, request.cwd);
    match registry
        .autocomplete(&session_id, &request.fragment, &settings)
        .await
    {
        Ok(result) => Json(serde_json::json!({
            "ok": true,
            "completion": result.completion,
            "candidates": result.candidates,
            "exact": result.exact
        })),
        Err(err) => Json(error_body(&err)),
    }
}

async fn resize_session(
    State(registry): State<Arc<SessionRegistry>>,
    Path(session_id): Path<String>,
    Json(request): Json<ResizeRequest>,
) -> impl IntoResponse {
    let settings = settings_from(request.shell, request.cwd);
    match registry.resize(&session_id, request.cols, request.rows, &settings) {
        Ok(()) => Json(serde_json::json!({ "ok": true })),
        Err(err) => Json(error_body(&err)),
    }
}

async fn close_session(
    State(registry): State<Arc<SessionRegistry>>,
    Path(session_id): Path<String>,
) -> impl IntoResponse {
    let closed = registry.close_session(&session_id, BridgeError::SessionClosed);
    Json(serde_json::json!({ "ok": true, "closed": closed }))
}

async fn close_all_sessions(State(registry): State<Arc<SessionRegistry>>) -> impl IntoResponse {
    registry.close_all();
    Json(serde_json::json!({ "ok": true }))
}

// =============================================================================
// WebSocket Handler
// =============================================================================

async fn websocket_events(
    ws: WebSocketUpgrade,
    State(registry): State<Arc<SessionRegistry>>,
) -> impl IntoResponse {
    ws.on_upgrade(|socket| handle_event_websocket(socket, registry))
}

async fn handle_event_websocket(socket: WebSocket, registry: Arc<SessionRegistry>) {
    let mut event_rx = registry.subscribe();
    let (mut sender, mut receiver) = socket.split();

    info!("event subscriber connected");

    let send_task = tokio::spawn(async move {
        while let Ok(event) = event_rx.recv().await {
            let Ok(json) = serde_json::to_string(&event) else {
                continue;
            };
            if sender.send(Message::Text(json)).await.is_err() {
                break;
            }
        }
    });

    // Inbound traffic is ignored; the socket only streams events out
    while let Some(msg) = receiver.next().await {
        match msg {
            Ok(Message::Close(_)) | Err(_) => break,
            Ok(_) => continue,
        }
    }

    send_task.abort();
    info!("event subscriber disconnected");
}

// =============================================================================
// Server
// =============================================================================

fn build_router(registry: Arc<SessionRegistry>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/sessions/:session_id/execute", post(execute_command))
        .route("/sessions/:session_id/complete", post(complete_fragment))
        .route("/sessions/:session_id/resize", post(resize_session))
        .route("/sessions/:session_id", delete(close_session))
        .route("/sessions", delete(close_all_sessions))
        .route("/ws/events", get(websocket_events))
        .layer(CorsLayer::permissive())
        .with_state(registry)
}

async fn run_server(host: &str, port: u16) -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let registry = SessionRegistry::new();
    let app = build_router(Arc::clone(&registry));

    let addr = format!("{}:{}", host, port);
    info!("starting bridge server on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .context("Failed to bind to address")?;

    axum::serve(listener, app).await.context("Server error")?;

    // Not reached in practice; keep sessions from leaking on orderly shutdown
    registry.close_all();
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Server { host, port }) => run_server(&host, port).await,

        // No command = server mode
        None => {
            let host = std::env::var("BRIDGE_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
            let port: u16 = std::env::var("BRIDGE_PORT")
                .unwrap_or_else(|_| "39484".to_string())
                .parse()
                .context("Invalid BRIDGE_PORT")?;
            run_server(&host, port).await
        }

        Some(Commands::Exec {
            session,
            command,
            shell,
            cwd,
        }) => cli::cmd_exec(&cli.server, &session, &command, shell, cwd).await,

        Some(Commands::Complete {
            session,
            fragment,
            cwd,
        }) => cli::cmd_complete(&cli.server, &session, &fragment, cwd).await,

        Some(Commands::Close { session }) => cli::cmd_close(&cli.server, &session).await,

        Some(Commands::CloseAll) => cli::cmd_close_all(&cli.server).await,
    }
}

// =============================================================================
// Tests
// =============================================================================
