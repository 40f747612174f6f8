//! Unix Socket Server
//!
//! Async newline-delimited JSON server in front of the identity engine.
//!
//! # Limits
//! - **Connections**: at most `MAX_CONNECTIONS` clients at once
//! - **Messages**: lines over `MAX_MESSAGE_SIZE` are rejected before buffering
//! - **Timeouts**: read and write deadlines per message
//!
//! Checks and capture saves are serialized through one store lock, so identity
//! and log allocation always sees every earlier append and capture files have
//! a single writer.

use std::os::unix::fs::PermissionsExt;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{UnixListener, UnixStream};
use tokio::sync::Mutex;
use tokio::time::timeout;
use tracing::{debug, error, info, trace, warn};

use rv_core::constants::daemon::{MAX_CONNECTIONS, READ_TIMEOUT, SOCKET_PERMISSIONS, WRITE_TIMEOUT};
use rv_core::{check_submission, save_capture_submission, CheckOptions, IdentityStore};
use rv_error::RevisitError;
use rv_protocol::{Request, RequestEnvelope, Response, ResponseEnvelope, MAX_MESSAGE_SIZE};

/// Global connection counter
static ACTIVE_CONNECTIONS: AtomicUsize = AtomicUsize::new(0);

/// Everything a request handler needs
pub struct ServerState {
    store: Mutex<Box<dyn IdentityStore>>,
    options: CheckOptions,
}

impl ServerState {
    pub fn new(store: Box<dyn IdentityStore>, options: CheckOptions) -> Self {
        Self {
            store: Mutex::new(store),
            options,
        }
    }
}

pub(crate) async fn read_line_bounded<R: tokio::io::AsyncBufRead + Unpin>(
    reader: &mut R,
    out: &mut Vec<u8>,
    max_len: usize,
) -> std::io::Result<usize> {
    out.clear();

    loop {
        let available = reader.fill_buf().await?;
        if available.is_empty() {
            return Ok(0);
        }

        let mut take_len = available.len();
        let mut found_newline = false;
        if let Some(pos) = available.iter().position(|b| *b == b'\n') {
            take_len = pos + 1;
            found_newline = true;
        }

        let remaining = max_len.saturating_sub(out.len());
        if take_len > remaining {
            // Consume enough to make forward progress, but don't buffer beyond max_len.
            let consume_len = remaining.min(available.len());
            reader.consume(consume_len);
            return Err(std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                "Message too large",
            ));
        }

        out.extend_from_slice(&available[..take_len]);
        reader.consume(take_len);

        if found_newline {
            return Ok(out.len());
        }
    }
}

/// Bind the socket and serve until ctrl-c
pub async fn run_server(
    socket_path: &str,
    state: Arc<ServerState>,
) -> Result<(), Box<dyn std::error::Error>> {
    let path = Path::new(socket_path);

    // Remove a stale socket, never a symlink
    if path.exists() {
        let metadata = path.symlink_metadata()?;
        if metadata.file_type().is_symlink() {
            return Err("Socket path is a symlink - refusing for security".into());
        }
        std::fs::remove_file(path)?;
        debug!("Removed existing socket file");
    }

    let listener = UnixListener::bind(socket_path)?;
    std::fs::set_permissions(socket_path, std::fs::Permissions::from_mode(SOCKET_PERMISSIONS))?;

    let store_location = state.store.lock().await.location();
    info!("Listening on {} (mode {:o})", socket_path, SOCKET_PERMISSIONS);
    info!(
        max_conn = MAX_CONNECTIONS,
        max_msg = MAX_MESSAGE_SIZE,
        store = %store_location,
        "Server limits"
    );

    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    let mut accepted: u64 = 0;

    loop {
        tokio::select! {
            result = listener.accept() => {
                match result {
                    Ok((stream, _addr)) => {
                        let current = ACTIVE_CONNECTIONS.load(Ordering::SeqCst);
                        if current >= MAX_CONNECTIONS {
                            warn!("Connection limit reached ({}), rejecting new connection", current);
                            drop(stream);
                            continue;
                        }

                        ACTIVE_CONNECTIONS.fetch_add(1, Ordering::SeqCst);
                        accepted += 1;
                        let state = state.clone();

                        tokio::spawn(async move {
                            handle_client(stream, state).await;
                            ACTIVE_CONNECTIONS.fetch_sub(1, Ordering::SeqCst);
                        });
                    }
                    Err(e) => {
                        error!("Accept error: {}", e);
                    }
                }
            }
            _ = &mut shutdown => {
                info!("Shutdown signal received");
                break;
            }
        }
    }

    let _ = std::fs::remove_file(socket_path);
    info!("Server stopped (handled {} total connections)", accepted);

    Ok(())
}

/// Serve one client until it disconnects or misbehaves
async fn handle_client(stream: UnixStream, state: Arc<ServerState>) {
    let (reader, mut writer) = stream.into_split();
    let mut reader = BufReader::new(reader);
    let mut line: Vec<u8> = Vec::with_capacity(4096);
    let mut request_count: u64 = 0;
    let connection_start = Instant::now();

    loop {
        let read_result =
            timeout(READ_TIMEOUT, read_line_bounded(&mut reader, &mut line, MAX_MESSAGE_SIZE)).await;

        match read_result {
            Ok(Ok(0)) => {
                debug!(
                    requests = request_count,
                    duration = ?connection_start.elapsed(),
                    "Client disconnected"
                );
                break;
            }
            Ok(Ok(n)) => {
                request_count += 1;
                trace!("Request #{}: {} bytes", request_count, n);

                let line_str = match std::str::from_utf8(&line) {
                    Ok(s) => s,
                    Err(e) => {
                        debug!("Non-UTF8 request: {}", e);
                        let envelope = ResponseEnvelope::new(0, Response::error("Invalid request encoding"));
                        let _ = send_response(&mut writer, &envelope).await;
                        break;
                    }
                };

                let envelope = process_request(line_str, &state).await;

                if send_response(&mut writer, &envelope).await.is_err() {
                    break;
                }
            }
            Ok(Err(e)) => {
                if e.kind() == std::io::ErrorKind::InvalidData {
                    warn!("Message too large (>{} bytes)", MAX_MESSAGE_SIZE);
                    let envelope = ResponseEnvelope::new(0, Response::error("Message too large"));
                    let _ = send_response(&mut writer, &envelope).await;
                } else {
                    error!("Read error: {}", e);
                }
                break;
            }
            Err(_) => {
                debug!("Read timeout after {} requests", request_count);
                let envelope = ResponseEnvelope::new(0, Response::error("Read timeout"));
                let _ = send_response(&mut writer, &envelope).await;
                break;
            }
        }
    }
}

/// Send response with timeout
async fn send_response(
    writer: &mut tokio::net::unix::OwnedWriteHalf,
    envelope: &ResponseEnvelope,
) -> Result<(), ()> {
    let response_json = serde_json::to_string(envelope).unwrap_or_else(|_| {
        r#"{"id":0,"status":"error","message":"Serialization error"}"#.to_string()
    });

    let write_result = timeout(WRITE_TIMEOUT, async {
        writer.write_all(response_json.as_bytes()).await?;
        writer.write_all(b"\n").await?;
        Ok::<_, std::io::Error>(())
    })
    .await;

    match write_result {
        Ok(Ok(_)) => Ok(()),
        Ok(Err(e)) => {
            error!("Write error: {}", e);
            Err(())
        }
        Err(_) => {
            error!("Write timeout");
            Err(())
        }
    }
}

/// Parse, validate and execute one request line
pub(crate) async fn process_request(line: &str, state: &ServerState) -> ResponseEnvelope {
    let envelope: RequestEnvelope = match serde_json::from_str(line.trim()) {
        Ok(e) => e,
        Err(e) => {
            debug!("Invalid JSON: {}", e);
            return ResponseEnvelope::new(0, Response::error("Invalid request format"));
        }
    };

    let request_id = envelope.id;
    let request = envelope.request;

    if let Err(e) = request.validate() {
        warn!(id = request_id, "Request validation failed: {}", e);
        return ResponseEnvelope::new(request_id, Response::error(e));
    }

    debug!("Processing {} (id={})", request.type_name(), request_id);

    let response = match request {
        Request::Ping => Response::ok_string("pong"),

        Request::Version => Response::ok_string(env!("CARGO_PKG_VERSION")),

        Request::Check { submission } => {
            let mut store = state.store.lock().await;
            match check_submission(&mut **store, submission, &state.options) {
                Ok(report) => Response::ok_check(report),
                Err(e) => error_response(request_id, &e),
            }
        }

        Request::SaveCapture { name, submission } => {
            // Checks append to the same capture files under this lock
            let _store = state.store.lock().await;
            match save_capture_submission(&state.options.capture_dir, &name, submission) {
                Ok(path) => Response::ok_string(path.display().to_string()),
                Err(e) => error_response(request_id, &e),
            }
        }

        Request::Stats => {
            let store = state.store.lock().await;
            match store.stats() {
                Ok(stats) => Response::ok_stats(stats),
                Err(e) => error_response(request_id, &e),
            }
        }
    };

    ResponseEnvelope::new(request_id, response)
}

/// Client mistakes are echoed back; server faults are logged and reported generically
fn error_response(request_id: u64, err: &RevisitError) -> Response {
    if err.is_client_error() {
        debug!(id = request_id, "Rejected submission: {}", err);
        Response::error(err.to_string())
    } else {
        error!(id = request_id, "Request failed: {}", err);
        Response::error("Internal error while processing request")
    }
}
