//! Newline-delimited JSON-RPC server.
//!
//! Requests are read line by line. Each `tools/call` runs on its own task
//! with a child of the server's cancellation token, and every response goes
//! through a single writer task, so replies may arrive out of order.

use super::protocol::{
    request_key, CallToolParams, CancelledParams, JsonRpcRequest, JsonRpcResponse,
    INTERNAL_ERROR, INVALID_PARAMS, INVALID_REQUEST, JSONRPC_VERSION, METHOD_NOT_FOUND, PARSE_ERROR,
    PROTOCOL_VERSION, SERVER_NAME,
};
use crate::core::dispatcher::Dispatcher;
use crate::VERSION;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

type InFlight = Arc<Mutex<HashMap<String, CancellationToken>>>;

pub struct McpServer {
    dispatcher: Arc<Dispatcher>,
    shutdown: CancellationToken,
    in_flight: InFlight,
}

impl McpServer {
    pub fn new(dispatcher: Arc<Dispatcher>) -> Self {
        Self::with_shutdown(dispatcher, CancellationToken::new())
    }

    /// Use an externally owned token; cancelling it stops the server and every call in flight.
    pub fn with_shutdown(dispatcher: Arc<Dispatcher>, shutdown: CancellationToken) -> Self {
        Self {
            dispatcher,
            shutdown,
            in_flight: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    pub async fn serve_stdio(&self) -> crate::Result<()> {
        self.serve(tokio::io::stdin(), tokio::io::stdout()).await
    }

    /// Serve until EOF on `reader` or until the shutdown token fires.
    ///
    /// After EOF, calls already running are allowed to finish unless the
    /// shutdown token fires first. Responses are flushed before returning.
    pub async fn serve<R, W>(&self, reader: R, writer: W) -> crate::Result<()>
    where
        R: AsyncRead + Unpin,
        W: AsyncWrite + Unpin + Send + 'static,
    {
        let (tx, rx) = mpsc::unbounded_channel::<JsonRpcResponse>();
        let writer_task = tokio::spawn(write_responses(writer, rx, self.shutdown.clone()));
        let mut calls = JoinSet::new();
        let mut lines = BufReader::new(reader).lines();

        info!(server = SERVER_NAME, version = VERSION, "MCP server listening on stdio");

        let drain_on_exit = loop {
            let line = tokio::select! {
                line = lines.next_line() => line,
                _ = self.shutdown.cancelled() => {
                    info!("shutdown requested");
                    break false;
                }
            };

            let line = match line {
                Ok(Some(line)) => line,
                Ok(None) => {
                    info!(pending = calls.len(), "stdin closed");
                    break true;
                }
                Err(err) => {
                    error!(error = %err, "failed to read from stdin");
                    break false;
                }
            };

            let line = line.trim();
            if line.is_empty() {
                continue;
            }

            if let Some(response) = self.handle_line(line, &mut calls, &tx) {
                let _ = tx.send(response);
            }

            while calls.try_join_next().is_some() {}
        };

        if drain_on_exit {
            tokio::select! {
                _ = async { while calls.join_next().await.is_some() {} } => {}
                _ = self.shutdown.cancelled() => info!("shutdown requested while draining calls"),
            }
        }

        self.shutdown.cancel();
        while calls.join_next().await.is_some() {}
        drop(tx);
        if let Err(err) = writer_task.await {
            error!(error = %err, "response writer aborted");
        }

        Ok(())
    }

    /// Handle one inbound line. Immediate replies are returned; `tools/call`
    /// replies are sent later by the spawned task.
    fn handle_line(
        &self,
        line: &str,
        calls: &mut JoinSet<()>,
        tx: &mpsc::UnboundedSender<JsonRpcResponse>,
    ) -> Option<JsonRpcResponse> {
        let request: JsonRpcRequest = match serde_json::from_str(line) {
            Ok(request) => request,
            Err(err) => {
                warn!(error = %err, "unparseable message");
                return Some(JsonRpcResponse::error(
                    Value::Null,
                    PARSE_ERROR,
                    format!("Invalid JSON: {}", err),
                ));
            }
        };

        if request.jsonrpc != JSONRPC_VERSION {
            return request.id.map(|id| {
                JsonRpcResponse::error(id, INVALID_REQUEST, "Invalid JSON-RPC version")
            });
        }

        debug!(method = %request.method, id = ?request.id, "request received");

        let Some(id) = request.id.clone() else {
            self.handle_notification(&request);
            return None;
        };

        match request.method.as_str() {
            "initialize" => Some(JsonRpcResponse::success(id, initialize_result())),
            "ping" => Some(JsonRpcResponse::success(id, json!({}))),
            "tools/list" => Some(JsonRpcResponse::success(
                id,
                json!({ "tools": self.dispatcher.list_tools() }),
            )),
            "tools/call" => self.spawn_call(id, request.params, calls, tx),
            other => Some(JsonRpcResponse::error(
                id,
                METHOD_NOT_FOUND,
                format!("Unknown method: {}", other),
            )),
        }
    }

    fn handle_notification(&self, request: &JsonRpcRequest) {
        match request.method.as_str() {
            "notifications/initialized" | "initialized" => {
                info!("client initialized");
            }
            "notifications/cancelled" => {
                match serde_json::from_value::<CancelledParams>(request.params.clone()) {
                    Ok(params) => self.cancel_request(&params),
                    Err(err) => warn!(error = %err, "malformed cancellation"),
                }
            }
            other => debug!(method = other, "ignoring notification"),
        }
    }

    fn cancel_request(&self, params: &CancelledParams) {
        let key = request_key(&params.request_id);
        let token = self
            .in_flight
            .lock()
            .ok()
            .and_then(|map| map.get(&key).cloned());
        match token {
            Some(token) => {
                info!(request_id = %key, reason = ?params.reason, "cancelling request");
                token.cancel();
            }
            None => debug!(request_id = %key, "cancellation for unknown or finished request"),
        }
    }

    fn spawn_call(
        &self,
        id: Value,
        params: Value,
        calls: &mut JoinSet<()>,
        tx: &mpsc::UnboundedSender<JsonRpcResponse>,
    ) -> Option<JsonRpcResponse> {
        let params: CallToolParams = match serde_json::from_value(params) {
            Ok(params) => params,
            Err(err) => {
                return Some(JsonRpcResponse::error(
                    id,
                    INVALID_PARAMS,
                    format!("Missing or invalid tool name: {}", err),
                ))
            }
        };

        let key = request_key(&id);
        let token = self.shutdown.child_token();
        if let Ok(mut map) = self.in_flight.lock() {
            map.insert(key.clone(), token.clone());
        }

        let dispatcher = Arc::clone(&self.dispatcher);
        let in_flight = Arc::clone(&self.in_flight);
        let tx = tx.clone();
        calls.spawn(async move {
            let result = dispatcher
                .call_tool(&params.name, params.arguments, Some(token))
                .await;
            if let Ok(mut map) = in_flight.lock() {
                map.remove(&key);
            }
            let response = match serde_json::to_value(&result) {
                Ok(value) => JsonRpcResponse::success(id, value),
                Err(err) => JsonRpcResponse::error(id, INTERNAL_ERROR, err.to_string()),
            };
            let _ = tx.send(response);
        });

        None
    }
}

fn initialize_result() -> Value {
    json!({
        "protocolVersion": PROTOCOL_VERSION,
        "capabilities": {
            "tools": { "listChanged": false }
        },
        "serverInfo": {
            "name": SERVER_NAME,
            "version": VERSION
        }
    })
}

async fn write_responses<W>(
    mut writer: W,
    mut rx: mpsc::UnboundedReceiver<JsonRpcResponse>,
    shutdown: CancellationToken,
) where
    W: AsyncWrite + Unpin,
{
    while let Some(response) = rx.recv().await {
        let mut frame = match serde_json::to_string(&response) {
            Ok(frame) => frame,
            Err(err) => {
                error!(error = %err, "failed to serialize response");
                continue;
            }
        };
        frame.push('\n');

        let written = async {
            writer.write_all(frame.as_bytes()).await?;
            writer.flush().await
        }
        .await;

        if let Err(err) = written {
            error!(error = %err, "failed to write response, shutting down");
            shutdown.cancel();
            return;
        }
    }
}
