// Decision log for asynchronous move logging
//
// This module provides fire-and-forget async logging to avoid blocking
// the request/response cycle. Each answered move request is written to a JSONL file.

use log::error;
use serde::Serialize;
use std::sync::Arc;
use tokio::fs::{File, OpenOptions};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

use crate::solver::{MoveRequest, MoveResponse};
use crate::types::{Board, Coord};

/// Represents a single decision log entry
#[derive(Debug, Serialize)]
struct DecisionLogEntry {
    mover: usize,
    position: Coord,
    score: f64,
    win_length: usize,
    board: Board,
    timestamp: String,
}

/// Shared decision logger state
/// Uses Arc<Mutex<File>> to allow concurrent async writes from multiple tasks
#[derive(Clone)]
pub struct DebugLogger {
    file: Arc<Mutex<Option<File>>>,
    enabled: bool,
}

impl DebugLogger {
    /// Creates a new decision logger
    /// If enabled is true, initializes the log file (truncating if it exists)
    pub async fn new(enabled: bool, log_file_path: &str) -> Self {
        if !enabled {
            return Self::disabled();
        }

        match OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(log_file_path)
            .await
        {
            Ok(file) => {
                log::info!("Decision logging enabled: {}", log_file_path);
                DebugLogger {
                    file: Arc::new(Mutex::new(Some(file))),
                    enabled: true,
                }
            }
            Err(e) => {
                error!("Failed to create decision log file '{}': {}", log_file_path, e);
                Self::disabled()
            }
        }
    }

    /// Creates a disabled logger (no-op)
    pub fn disabled() -> Self {
        DebugLogger {
            file: Arc::new(Mutex::new(None)),
            enabled: false,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Logs a move decision asynchronously (fire-and-forget)
    /// This spawns a tokio task that writes to the file without blocking
    pub fn log_decision(&self, request: MoveRequest, response: MoveResponse) {
        if !self.enabled {
            return;
        }

        let file_handle = self.file.clone();
        tokio::spawn(async move {
            Self::write_entry(file_handle, request, response).await;
        });
    }

    async fn write_entry(
        file_handle: Arc<Mutex<Option<File>>>,
        request: MoveRequest,
        response: MoveResponse,
    ) {
        let mut file_guard = file_handle.lock().await;

        if let Some(file) = file_guard.as_mut() {
            let entry = DecisionLogEntry {
                mover: response.mover,
                position: response.position,
                score: response.score,
                win_length: request.win_length,
                board: request.board,
                timestamp: chrono::Utc::now().to_rfc3339(),
            };

            match serde_json::to_string(&entry) {
                Ok(json_line) => {
                    let line_with_newline = format!("{}\n", json_line);
                    if let Err(e) = file.write_all(line_with_newline.as_bytes()).await {
                        error!("Failed to write decision log entry: {}", e);
                    } else if let Err(e) = file.flush().await {
                        error!("Failed to flush decision log: {}", e);
                    }
                }
                Err(e) => {
                    error!("Failed to serialize decision log entry: {}", e);
                }
            }
        }
    }
}
