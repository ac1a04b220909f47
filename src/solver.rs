//! Solver service
//!
//! A dedicated thread owning the value table of one configuration. Callers
//! talk to it through a pair of channels: requests go in one way, replies come
//! back the other, so a caller can poll with a timeout and keep its own loop
//! running while a search is in flight. Requests are served strictly one at a
//! time; each runs a full search episode, picks a move, replies, and
//! checkpoints the table.
//!
//! Every request gets an id that its reply carries back. A caller that gave up
//! on a request leaves its reply in the channel; waiting for a specific id
//! discards such leftovers instead of handing them to the next caller.

use crossbeam_channel::{unbounded, Receiver, RecvTimeoutError, Sender, TryRecvError};
use log::{debug, error, info, warn};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crate::codec::StateKeys;
use crate::config::{SelectionPolicy, SolverConfig};
use crate::error::{Result, SolverError};
use crate::rules::viable_moves;
use crate::search::SearchEpisode;
use crate::table::{TableState, ValueTable};
use crate::types::{Board, Coord};

/// Ask for the best move of `mover` on `board`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MoveRequest {
    pub board: Board,
    pub mover: usize,
    pub win_length: usize,
}

/// Chosen move with its score under the configured selection policy
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MoveResponse {
    pub position: Coord,
    pub score: f64,
    pub mover: usize,
}

/// What travels back on the response channel
pub type Reply = Result<MoveResponse>;

/// Issued by [`SolverHandle::put_move`], echoed with the reply
pub type RequestId = u64;

/// What travels on the request channel
#[derive(Debug)]
enum Message {
    Request(RequestId, MoveRequest),
    Stop,
}

/// A reply tagged with the request it answers
#[derive(Debug)]
struct Ticket {
    id: RequestId,
    reply: Reply,
}

/// Checks a request against the service configuration before it reaches the search
pub fn validate_request(config: &SolverConfig, request: &MoveRequest) -> Result<()> {
    if request.board.size() != config.board_size {
        return Err(SolverError::InvalidRequest(format!(
            "board is {}x{}, service is configured for {}x{}",
            request.board.size(),
            request.board.size(),
            config.board_size,
            config.board_size
        )));
    }
    if request.win_length != config.win_length {
        return Err(SolverError::InvalidRequest(format!(
            "win length {} does not match the configured {}",
            request.win_length, config.win_length
        )));
    }
    if request.mover >= config.n_players {
        return Err(SolverError::InvalidRequest(format!(
            "mover {} out of range for {} players",
            request.mover, config.n_players
        )));
    }
    if let Some(&cell) = request
        .board
        .cells()
        .iter()
        .find(|&&c| c as usize > config.n_players)
    {
        return Err(SolverError::InvalidRequest(format!(
            "cell value {} does not belong to any of {} players",
            cell, config.n_players
        )));
    }
    if request.board.is_full() {
        return Err(SolverError::NoMovesAvailable);
    }
    Ok(())
}

/// Picks the move from `board` once every child state is valued
///
/// Ties go to the first move in row-major order.
pub fn select_move(
    table: &TableState,
    board: &Board,
    mover: usize,
    n_players: usize,
    policy: SelectionPolicy,
) -> Result<MoveResponse> {
    let mut best: Option<(Coord, f64)> = None;

    for mv in viable_moves(board) {
        let keys = StateKeys::new(&board.with_move(mv, mover), n_players);
        let values = table
            .values_for(&keys)
            .ok_or_else(|| SolverError::UnresolvedState(keys.for_player(mover).clone()))?;

        let score = match policy {
            SelectionPolicy::MinimizeOpponents => {
                let others: f64 = (0..n_players).filter(|&p| p != mover).map(|p| values[p]).sum();
                others / (n_players - 1) as f64
            }
            SelectionPolicy::MaximizeOwn => values[mover],
        };
        debug!("Move ({}, {}), score {}", mv.row, mv.col, score);

        let better = match best {
            None => true,
            Some((_, best_score)) => match policy {
                SelectionPolicy::MinimizeOpponents => score < best_score,
                SelectionPolicy::MaximizeOwn => score > best_score,
            },
        };
        if better {
            best = Some((mv, score));
        }
    }

    best.map(|(position, score)| MoveResponse {
        position,
        score,
        mover,
    })
    .ok_or(SolverError::NoMovesAvailable)
}

/// Holds the authoritative table of one configuration and answers move requests
pub struct SolverService {
    config: SolverConfig,
    table: ValueTable,
    workers: usize,
}

impl SolverService {
    /// Validates `config` and loads its cache file (empty if there is none yet)
    pub fn new(config: SolverConfig) -> Result<Self> {
        config.validate()?;
        let table = ValueTable::load(config.cache_file(), config.checkpoint_interval)?;
        Ok(Self::with_table(config, table))
    }

    /// Service around an already built table
    pub fn with_table(config: SolverConfig, table: ValueTable) -> Self {
        let workers = config.effective_worker_threads();
        SolverService {
            config,
            table,
            workers,
        }
    }

    pub fn config(&self) -> &SolverConfig {
        &self.config
    }

    pub fn table(&self) -> &ValueTable {
        &self.table
    }

    /// Serves one request synchronously: search, select, checkpoint
    pub fn solve(&self, request: &MoveRequest) -> Result<MoveResponse> {
        validate_request(&self.config, request)?;

        SearchEpisode::new(
            &self.table,
            self.config.n_players,
            self.config.win_length,
            self.workers,
        )
        .run(&request.board, request.mover)?;

        let response = {
            let state = self.table.lock();
            select_move(
                &state,
                &request.board,
                request.mover,
                self.config.n_players,
                self.config.selection_policy,
            )?
        };

        info!(
            "Player #{} move: ({}, {}), score {:.4}. Total table size: {}",
            response.mover,
            response.position.row,
            response.position.col,
            response.score,
            self.table.len()
        );

        self.table.checkpoint()?;
        Ok(response)
    }

    /// Moves the service onto its own thread and returns the caller's end of the channels
    pub fn spawn(self) -> Result<SolverHandle> {
        let (request_tx, request_rx) = unbounded();
        let (response_tx, response_rx) = unbounded();
        let config = self.config.clone();

        let thread = thread::Builder::new()
            .name("caro-solver".to_string())
            .spawn(move || self.run(request_rx, response_tx))?;

        Ok(SolverHandle {
            requests: request_tx,
            responses: response_rx,
            next_id: AtomicU64::new(0),
            config,
            thread: Some(thread),
        })
    }

    fn run(self, requests: Receiver<Message>, responses: Sender<Ticket>) {
        info!(
            "Solver service started: {}x{} board, win length {}, {} players, {} workers, {} cached entries",
            self.config.board_size,
            self.config.board_size,
            self.config.win_length,
            self.config.n_players,
            self.workers,
            self.table.len()
        );

        for message in requests.iter() {
            let (id, request) = match message {
                Message::Stop => break,
                Message::Request(id, request) => (id, request),
            };

            let reply = self.solve(&request);
            if let Err(e) = &reply {
                error!("Request {} for player #{} failed: {}", id, request.mover, e);
            }
            if responses.send(Ticket { id, reply }).is_err() {
                warn!("Response channel closed, stopping solver service");
                break;
            }
        }

        info!("Solver service stopped, {} entries", self.table.len());
    }
}

/// Caller side of a running [`SolverService`]
pub struct SolverHandle {
    requests: Sender<Message>,
    responses: Receiver<Ticket>,
    next_id: AtomicU64,
    config: SolverConfig,
    thread: Option<JoinHandle<()>>,
}

impl SolverHandle {
    /// Validates `config`, loads its table and starts the service thread
    pub fn start(config: SolverConfig) -> Result<Self> {
        SolverService::new(config)?.spawn()
    }

    pub fn config(&self) -> &SolverConfig {
        &self.config
    }

    /// Queues a request; invalid requests are rejected here and never reach the service
    ///
    /// Returns the id its reply will carry.
    pub fn put_move(&self, request: MoveRequest) -> Result<RequestId> {
        validate_request(&self.config, &request)?;
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.requests
            .send(Message::Request(id, request))
            .map_err(|_| SolverError::ServiceStopped)?;
        Ok(id)
    }

    /// Waits up to `timeout` for the next reply, whichever request it answers;
    /// `Ok(None)` means not ready yet
    pub fn poll(&self, timeout: Duration) -> Result<Option<MoveResponse>> {
        match self.responses.recv_timeout(timeout) {
            Ok(ticket) => ticket.reply.map(Some),
            Err(RecvTimeoutError::Timeout) => Ok(None),
            Err(RecvTimeoutError::Disconnected) => Err(SolverError::ServiceStopped),
        }
    }

    /// Non-blocking variant of [`poll`](Self::poll)
    pub fn try_poll(&self) -> Result<Option<MoveResponse>> {
        match self.responses.try_recv() {
            Ok(ticket) => ticket.reply.map(Some),
            Err(TryRecvError::Empty) => Ok(None),
            Err(TryRecvError::Disconnected) => Err(SolverError::ServiceStopped),
        }
    }

    /// Waits up to `timeout` for the reply to request `id`, dropping replies to other requests
    pub fn poll_for(&self, id: RequestId, timeout: Duration) -> Result<Option<MoveResponse>> {
        let deadline = Instant::now() + timeout;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            match self.responses.recv_timeout(remaining) {
                Ok(ticket) => {
                    if let Some(reply) = Self::answer_to(id, ticket) {
                        return reply.map(Some);
                    }
                }
                Err(RecvTimeoutError::Timeout) => return Ok(None),
                Err(RecvTimeoutError::Disconnected) => return Err(SolverError::ServiceStopped),
            }
        }
    }

    /// Non-blocking variant of [`poll_for`](Self::poll_for)
    pub fn try_poll_for(&self, id: RequestId) -> Result<Option<MoveResponse>> {
        loop {
            match self.responses.try_recv() {
                Ok(ticket) => {
                    if let Some(reply) = Self::answer_to(id, ticket) {
                        return reply.map(Some);
                    }
                }
                Err(TryRecvError::Empty) => return Ok(None),
                Err(TryRecvError::Disconnected) => return Err(SolverError::ServiceStopped),
            }
        }
    }

    /// Queues a request and waits for its reply, forever when `timeout` is `None`
    pub fn get_move(&self, request: MoveRequest, timeout: Option<Duration>) -> Result<Option<MoveResponse>> {
        let id = self.put_move(request)?;
        if let Some(timeout) = timeout {
            return self.poll_for(id, timeout);
        }

        loop {
            let ticket = self.responses.recv().map_err(|_| SolverError::ServiceStopped)?;
            if let Some(reply) = Self::answer_to(id, ticket) {
                return reply.map(Some);
            }
        }
    }

    fn answer_to(id: RequestId, ticket: Ticket) -> Option<Reply> {
        if ticket.id == id {
            Some(ticket.reply)
        } else {
            debug!("Dropping reply to abandoned request {}", ticket.id);
            None
        }
    }

    /// Sends the stop sentinel and waits for the service to finish queued work
    pub fn stop(mut self) -> Result<()> {
        self.shutdown()
    }

    fn shutdown(&mut self) -> Result<()> {
        let Some(thread) = self.thread.take() else {
            return Ok(());
        };

        // The service may already be gone; joining still reports how it ended
        let _ = self.requests.send(Message::Stop);
        thread.join().map_err(|_| SolverError::ServiceStopped)
    }
}

impl Drop for SolverHandle {
    fn drop(&mut self) {
        if let Err(e) = self.shutdown() {
            warn!("Solver service did not shut down cleanly: {}", e);
        }
    }
}
