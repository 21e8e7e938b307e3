use axum::{
    extract::ws::{Message, WebSocket, WebSocketUpgrade},
    extract::State,
    response::IntoResponse,
    routing::get,
    Router,
};
use futures::{sink::SinkExt, stream::StreamExt};
use meshmaker_core::kernel::{ManifestKernel, MemoryMesh, MeshData, MeshHost};
use meshmaker_core::panel::{
    panelize, required_digits, CoreOverrides, Decision, Operator, PanelizeOptions, TriangleError, TriangleRecord,
};
use meshmaker_core::units::LengthUnit;
use serde::Deserialize;
use serde_json::json;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

const DEFAULT_ADDR: &str = "127.0.0.1:3000";

/// Format an error as a JSON message for the frontend
fn format_error(code: &str, message: &str, severity: &str) -> String {
    format!("ERROR_UPDATE:{}", json!({
        "code": code,
        "message": message,
        "severity": severity
    }))
}

// Application State
struct AppState {
    /// Relative output directories in run requests are resolved against this.
    output_root: PathBuf,
}

#[derive(Debug, Deserialize)]
struct ObjUpload {
    name: String,
    #[serde(default)]
    unit: LengthUnit,
    source: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct PanelizeRequest {
    options: PanelizeOptions,
    /// Key strip width of the template. Defaults to the narrowest that fits the mesh.
    binary_digits: Option<usize>,
}

#[derive(Debug)]
enum Command {
    LoadMesh(MeshData),
    LoadObj(ObjUpload),
    SetOverrides(CoreOverrides),
    Panelize(PanelizeRequest),
    Cancel,
}

fn parse_command(text: &str) -> Result<Command, String> {
    fn payload<T: for<'de> Deserialize<'de>>(json: &str) -> Result<T, String> {
        serde_json::from_str(json).map_err(|e| e.to_string())
    }

    if text == "CANCEL" {
        Ok(Command::Cancel)
    } else if text == "PANELIZE" {
        Ok(Command::Panelize(PanelizeRequest::default()))
    } else if let Some(json) = text.strip_prefix("PANELIZE:") {
        payload(json).map(Command::Panelize)
    } else if let Some(json) = text.strip_prefix("LOAD_MESH:") {
        payload(json).map(Command::LoadMesh)
    } else if let Some(json) = text.strip_prefix("LOAD_OBJ:") {
        payload(json).map(Command::LoadObj)
    } else if let Some(json) = text.strip_prefix("SET_OVERRIDES:") {
        payload(json).map(Command::SetOverrides)
    } else {
        Err(format!("unknown command '{}'", text.split(':').next().unwrap_or(text)))
    }
}

fn mesh_summary(mesh: &MemoryMesh) -> String {
    format!("MESH_LOADED:{}", json!({
        "name": mesh.mesh_name(),
        "unit": mesh.native_unit(),
        "vertices": mesh.vertex_count(),
        "faces": mesh.face_count(),
        "unique_edges": mesh.unique_edge_count(),
        "open_edges": mesh.open_edge_count(),
    }))
}

/// Streams progress to the client. A run started from the socket is already confirmed,
/// and per-triangle problems never stop it; the client cancels instead.
struct SocketOperator {
    tx: mpsc::UnboundedSender<String>,
    cancel: Arc<AtomicBool>,
}

impl SocketOperator {
    fn send(&self, prefix: &str, body: serde_json::Value) {
        // The receiving task is gone once the client disconnects.
        let _ = self.tx.send(format!("{}:{}", prefix, body));
    }
}

impl Operator for SocketOperator {
    fn confirm_start(&mut self, faces: usize, unique_edges: usize) -> bool {
        self.send("PANELIZE_START", json!({ "faces": faces, "unique_edges": unique_edges }));
        true
    }

    fn on_triangle_error(&mut self, record: &TriangleRecord, error: &TriangleError) -> Decision {
        self.send("TRIANGLE_ERROR", json!({ "face": record.face, "error": error, "message": error.to_string() }));
        Decision::Continue
    }

    fn on_invalid_triangle(&mut self, _record: &TriangleRecord) -> Decision {
        Decision::Continue
    }

    fn report_triangle(&mut self, record: &TriangleRecord) {
        self.send("TRIANGLE_UPDATE", json!(record));
    }

    fn cancel_requested(&self) -> bool {
        self.cancel.load(Ordering::Relaxed)
    }
}

#[derive(Default)]
struct Session {
    mesh: Option<Arc<MemoryMesh>>,
    overrides: CoreOverrides,
    cancel: Arc<AtomicBool>,
    running: Arc<AtomicBool>,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();

    let addr: SocketAddr = match std::env::var("MESHMAKER_ADDR") {
        Ok(raw) => match raw.parse() {
            Ok(addr) => addr,
            Err(e) => {
                error!("MESHMAKER_ADDR '{}' is not a socket address: {}", raw, e);
                return;
            }
        },
        Err(_) => match DEFAULT_ADDR.parse() {
            Ok(addr) => addr,
            Err(_) => return,
        },
    };

    let shared_state = Arc::new(AppState {
        output_root: std::env::var("MESHMAKER_OUTPUT").map(PathBuf::from).unwrap_or_else(|_| PathBuf::from(".")),
    });

    let app = Router::new()
        .route("/", get(root))
        .route("/ws", get(ws_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(shared_state);

    info!("listening on {}", addr);
    let listener = match tokio::net::TcpListener::bind(addr).await {
        Ok(listener) => listener,
        Err(e) => {
            error!("Could not bind {}: {}", addr, e);
            return;
        }
    };
    if let Err(e) = axum::serve(listener, app).await {
        error!("Server stopped: {}", e);
    }
}

async fn root() -> &'static str {
    "Hello from MeshMaker!"
}

async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    ws.on_upgrade(|socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: Arc<AppState>) {
    info!("Client connected");

    let (mut sender, mut receiver) = socket.split();
    let (tx, mut rx) = mpsc::unbounded_channel::<String>();

    // Runs report from a blocking thread, so every outgoing message goes through the channel.
    let send_task = tokio::spawn(async move {
        while let Some(text) = rx.recv().await {
            if sender.send(Message::Text(text)).await.is_err() {
                break;
            }
        }
    });

    let mut session = Session::default();

    while let Some(Ok(msg)) = receiver.next().await {
        if let Message::Text(text) = msg {
            info!("Received command: {}", text.chars().take(64).collect::<String>());
            match parse_command(&text) {
                Ok(command) => handle_command(command, &mut session, &state, &tx),
                Err(e) => {
                    warn!("Rejected command: {}", e);
                    let _ = tx.send(format_error("BAD_COMMAND", &e, "error"));
                }
            }
        }
    }

    // Stop any run still going for this client.
    session.cancel.store(true, Ordering::Relaxed);
    send_task.abort();
    info!("Client disconnected");
}

fn handle_command(command: Command, session: &mut Session, state: &AppState, tx: &mpsc::UnboundedSender<String>) {
    let loaded = match command {
        Command::LoadMesh(data) => MemoryMesh::from_data(data),
        Command::LoadObj(upload) => MemoryMesh::from_obj(&upload.name, &upload.source, upload.unit),
        Command::SetOverrides(overrides) => {
            info!("Core overrides set for {} bodies", overrides.iter().count());
            let _ = tx.send(format!("OVERRIDES_UPDATE:{}", json!(overrides)));
            session.overrides = overrides;
            return;
        }
        Command::Cancel => {
            if session.running.load(Ordering::Relaxed) {
                info!("Cancelling run");
                session.cancel.store(true, Ordering::Relaxed);
            }
            return;
        }
        Command::Panelize(request) => {
            start_run(request, session, state, tx);
            return;
        }
    };

    match loaded {
        Ok(mesh) => {
            info!("Loaded mesh '{}' with {} faces", mesh.mesh_name(), mesh.face_count());
            let _ = tx.send(mesh_summary(&mesh));
            session.mesh = Some(Arc::new(mesh));
        }
        Err(e) => {
            warn!("Mesh load failed: {}", e);
            let _ = tx.send(format_error("MESH_INVALID", &e.to_string(), "error"));
        }
    }
}

fn start_run(request: PanelizeRequest, session: &mut Session, state: &AppState, tx: &mpsc::UnboundedSender<String>) {
    let Some(mesh) = session.mesh.clone() else {
        let _ = tx.send(format_error("NO_MESH", "Load a mesh before panelizing", "error"));
        return;
    };
    if session.running.swap(true, Ordering::SeqCst) {
        let _ = tx.send(format_error("RUN_IN_PROGRESS", "A panelization run is already in progress", "warning"));
        return;
    }

    let mut options = request.options;
    options.report_each_triangle = true;
    options.core_overrides = session.overrides.clone();
    if options.output_dir.is_relative() {
        options.output_dir = state.output_root.join(&options.output_dir);
    }

    let digits = request
        .binary_digits
        .unwrap_or_else(|| required_digits(mesh.unique_edge_count()));
    let mut kernel = ManifestKernel::from_template(&options.template, digits).persisted();

    session.cancel = Arc::new(AtomicBool::new(false));
    let mut operator = SocketOperator {
        tx: tx.clone(),
        cancel: session.cancel.clone(),
    };
    let running = session.running.clone();
    let done_tx = tx.clone();

    tokio::task::spawn_blocking(move || {
        let report = panelize(&*mesh, &mut kernel, &mut operator, &options);
        info!(
            "Run {} finished: {:?}, {} panels exported",
            report.run_id,
            report.status,
            report.exported().count()
        );
        let _ = done_tx.send(format!("PANELIZE_DONE:{}", json!(report)));
        running.store(false, Ordering::SeqCst);
    });
}
