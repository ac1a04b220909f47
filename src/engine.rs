// Async front of the solver service, shared by the HTTP handlers
//
// The solver runs on its own thread; this wrapper queues a request and polls
// for the reply with tokio sleeps so the async runtime is never blocked while
// a search is in flight.

use log::info;
use serde_json::{json, Value};
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

use crate::config::Config;
use crate::debug_logger::DebugLogger;
use crate::error::Result;
use crate::solver::{MoveRequest, MoveResponse, SolverHandle};

/// Solver engine with OOP-style API
/// Takes static configuration and exposes methods corresponding to API endpoints
pub struct Engine {
    config: Config,
    // One caller at a time; the service answers requests in order anyway
    solver: Mutex<SolverHandle>,
    logger: DebugLogger,
}

impl Engine {
    /// Starts the solver service for `config.solver`
    ///
    /// # Arguments
    /// * `config` - Static configuration that does not change during the engine's lifetime
    /// * `logger` - Decision log, possibly disabled
    pub fn new(config: Config, logger: DebugLogger) -> Result<Self> {
        let solver = SolverHandle::start(config.solver.clone())?;
        Ok(Engine {
            config,
            solver: Mutex::new(solver),
            logger,
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Returns engine metadata
    /// Corresponds to GET / endpoint
    pub fn info(&self) -> Value {
        info!("INFO");

        let solver = &self.config.solver;
        json!({
            "name": env!("CARGO_PKG_NAME"),
            "version": env!("CARGO_PKG_VERSION"),
            "board_size": solver.board_size,
            "win_length": solver.win_length,
            "n_players": solver.n_players,
            "selection_policy": format!("{:?}", solver.selection_policy),
        })
    }

    /// Solves one move request
    /// Corresponds to POST /move endpoint
    ///
    /// Invalid requests are rejected before reaching the solver thread.
    pub async fn get_move(&self, request: MoveRequest) -> Result<MoveResponse> {
        let start_time = Instant::now();
        let polling_interval = Duration::from_millis(self.config.timing.polling_interval_ms.max(1));

        info!("Player #{}: Computing move", request.mover);

        let solver = self.solver.lock().await;
        let id = solver.put_move(request.clone())?;

        // Replies to requests whose callers went away are skipped here
        let response = loop {
            if let Some(response) = solver.try_poll_for(id)? {
                break response;
            }
            tokio::time::sleep(polling_interval).await;
        };
        drop(solver);

        info!(
            "Player #{}: Chose ({}, {}) (score: {:.4}, time: {}ms)",
            response.mover,
            response.position.row,
            response.position.col,
            response.score,
            start_time.elapsed().as_millis()
        );

        self.logger.log_decision(request, response);
        Ok(response)
    }
}
