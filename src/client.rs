/*
 * This file is part of Revisit.
 *
 * Copyright (C) 2025 Revisit contributors
 *
 * Revisit is free software: you can redistribute it and/or modify
 * it under the terms of the GNU General Public License as published by
 * the Free Software Foundation, either version 3 of the License, or
 * (at your option) any later version.
 *
 * Revisit is distributed in the hope that it will be useful,
 * but WITHOUT ANY WARRANTY; without even the implied warranty of
 * MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
 * GNU General Public License for more details.
 *
 * You should have received a copy of the GNU General Public License
 * along with Revisit. If not, see <https://www.gnu.org/licenses/>.
 */

//! Daemon Client
//!
//! Talks to revisitd over its Unix socket, one newline-terminated JSON
//! envelope per request.

use std::io::{BufRead, BufReader, Write};
use std::os::unix::net::UnixStream;
use std::path::Path;

use rv_core::constants::daemon::CLIENT_TIMEOUT;
use rv_error::{Result, RevisitError};
use rv_protocol::{
    generate_request_id, CheckReport, Request, RequestEnvelope, Response, ResponseData,
    ResponseEnvelope, StoreStats, MAX_MESSAGE_SIZE,
};
use serde_json::Value;
use tracing::debug;

/// Initial buffer size for responses; a check report is a few KB
const INITIAL_BUFFER_SIZE: usize = 4096;

pub struct DaemonClient {
    writer: UnixStream,
    reader: BufReader<UnixStream>,
}

impl DaemonClient {
    pub fn connect(socket_path: &Path) -> Result<Self> {
        if !socket_path.exists() {
            debug!(path = ?socket_path, "No daemon socket");
            return Err(RevisitError::DaemonNotAvailable);
        }

        let stream = UnixStream::connect(socket_path).map_err(|e| {
            RevisitError::DaemonConnection(format!(
                "Failed to connect to daemon at {}: {}",
                socket_path.display(),
                e
            ))
        })?;

        let reader_stream = stream.try_clone().map_err(|e| {
            RevisitError::DaemonConnection(format!("Failed to clone daemon socket for reader: {}", e))
        })?;

        for s in [&stream, &reader_stream] {
            s.set_read_timeout(Some(CLIENT_TIMEOUT))?;
            s.set_write_timeout(Some(CLIENT_TIMEOUT))?;
        }

        Ok(Self {
            writer: stream,
            reader: BufReader::new(reader_stream),
        })
    }

    /// Send a request and return the daemon's response
    pub fn request(&mut self, req: Request) -> Result<Response> {
        req.validate()
            .map_err(|e| RevisitError::daemon(format!("Request validation failed: {}", e)))?;

        let request_id = generate_request_id();
        let type_name = req.type_name();
        let envelope = RequestEnvelope::with_id(req, request_id);

        let mut json = serde_json::to_vec(&envelope)?;
        json.push(b'\n');

        if json.len() > MAX_MESSAGE_SIZE {
            return Err(RevisitError::MessageTooLarge {
                size: json.len(),
                max_size: MAX_MESSAGE_SIZE,
            });
        }

        self.writer
            .write_all(&json)
            .map_err(|e| RevisitError::DaemonConnection(format!("Failed to send request: {}", e)))?;

        let mut response_buf: Vec<u8> = Vec::with_capacity(INITIAL_BUFFER_SIZE);
        self.reader
            .read_until(b'\n', &mut response_buf)
            .map_err(|e| RevisitError::DaemonConnection(format!("Failed to read response: {}", e)))?;

        if response_buf.is_empty() {
            return Err(RevisitError::DaemonConnection("Daemon closed connection".to_string()));
        }

        if response_buf.len() > MAX_MESSAGE_SIZE {
            return Err(RevisitError::MessageTooLarge {
                size: response_buf.len(),
                max_size: MAX_MESSAGE_SIZE,
            });
        }

        if response_buf.last() == Some(&b'\n') {
            response_buf.pop();
        }

        let response_envelope: ResponseEnvelope = serde_json::from_slice(&response_buf)
            .map_err(|e| RevisitError::IpcProtocol(format!("Failed to parse response: {}", e)))?;

        // The daemon answers id 0 when it could not read the request at all
        if response_envelope.id != request_id && response_envelope.id != 0 {
            return Err(RevisitError::IpcProtocol(format!(
                "Response ID mismatch: expected {}, got {}",
                request_id, response_envelope.id
            )));
        }

        debug!(id = request_id, request = type_name, "Daemon responded");
        Ok(response_envelope.response)
    }

    fn request_data(&mut self, req: Request) -> Result<ResponseData> {
        match self.request(req)? {
            Response::Ok(data) => Ok(data),
            Response::Error { message } => Err(RevisitError::DaemonResponse(message)),
        }
    }

    pub fn ping(&mut self) -> Result<()> {
        self.request_data(Request::Ping).map(|_| ())
    }

    pub fn version(&mut self) -> Result<String> {
        self.request_data(Request::Version)?
            .value
            .ok_or_else(|| RevisitError::IpcProtocol("Version response without value".to_string()))
    }

    pub fn check(&mut self, submission: Value) -> Result<CheckReport> {
        self.request_data(Request::Check { submission })?
            .check
            .ok_or_else(|| RevisitError::IpcProtocol("Check response without report".to_string()))
    }

    /// Returns the path the daemon wrote
    pub fn save_capture(&mut self, name: &str, submission: Value) -> Result<String> {
        self.request_data(Request::SaveCapture {
            name: name.to_string(),
            submission,
        })?
        .value
        .ok_or_else(|| RevisitError::IpcProtocol("SaveCapture response without path".to_string()))
    }

    pub fn stats(&mut self) -> Result<StoreStats> {
        self.request_data(Request::Stats)?
            .stats
            .ok_or_else(|| RevisitError::IpcProtocol("Stats response without stats".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::os::unix::net::UnixListener;
    use std::thread;
    use tempfile::TempDir;

    /// Answers a single request line with whatever `reply` builds from it
    fn serve_once<F>(dir: &TempDir, reply: F) -> std::path::PathBuf
    where
        F: FnOnce(RequestEnvelope) -> String + Send + 'static,
    {
        let path = dir.path().join("revisit.sock");
        let listener = UnixListener::bind(&path).unwrap();
        thread::spawn(move || {
            let (stream, _) = listener.accept().unwrap();
            let mut reader = BufReader::new(stream.try_clone().unwrap());
            let mut line = String::new();
            reader.read_line(&mut line).unwrap();
            let envelope: RequestEnvelope = serde_json::from_str(line.trim()).unwrap();
            let mut out = reply(envelope);
            out.push('\n');
            (&stream).write_all(out.as_bytes()).unwrap();
        });
        path
    }

    #[test]
    fn test_missing_socket() {
        let dir = TempDir::new().unwrap();
        let err = DaemonClient::connect(&dir.path().join("nope.sock")).err().unwrap();
        assert!(matches!(err, RevisitError::DaemonNotAvailable));
    }

    #[test]
    fn test_ping_round_trip() {
        let dir = TempDir::new().unwrap();
        let path = serve_once(&dir, |env| {
            assert!(matches!(env.request, Request::Ping));
            serde_json::to_string(&ResponseEnvelope::new(env.id, Response::ok_string("pong"))).unwrap()
        });
        let mut client = DaemonClient::connect(&path).unwrap();
        client.ping().unwrap();
    }

    #[test]
    fn test_error_response_is_surfaced() {
        let dir = TempDir::new().unwrap();
        let path = serve_once(&dir, |env| {
            serde_json::to_string(&ResponseEnvelope::new(
                env.id,
                Response::error("Submission is missing required attribute: CPU"),
            ))
            .unwrap()
        });
        let mut client = DaemonClient::connect(&path).unwrap();
        let err = client.check(serde_json::json!({"Attributes": {}})).unwrap_err();
        match err {
            RevisitError::DaemonResponse(msg) => assert!(msg.contains("CPU")),
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_id_mismatch_is_rejected() {
        let dir = TempDir::new().unwrap();
        let path = serve_once(&dir, |env| {
            serde_json::to_string(&ResponseEnvelope::new(env.id + 1, Response::ok_string("pong"))).unwrap()
        });
        let mut client = DaemonClient::connect(&path).unwrap();
        assert!(matches!(client.ping(), Err(RevisitError::IpcProtocol(_))));
    }

    #[test]
    fn test_invalid_request_never_sent() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("revisit.sock");
        let _listener = UnixListener::bind(&path).unwrap();
        let mut client = DaemonClient::connect(&path).unwrap();
        let err = client.save_capture("../x", serde_json::json!({"Attributes": {}})).unwrap_err();
        assert!(matches!(err, RevisitError::DaemonRequest(_)));
    }
}
