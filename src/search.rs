//! Search scheduler
//!
//! Exhaustive fixpoint search over the states reachable from a root board.
//! A fixed pool of workers drains one shared worklist. Each popped state is
//! either already valued (skipped), fully resolved (its values are computed
//! from its children and written), or still waiting on children (pushed back
//! unchanged). Terminal children are valued the moment they are generated.
//!
//! The state graph is a DAG whose depth is bounded by the number of empty
//! cells, so requeuing converges without recursion.
//!
//! A child state is pushed at most once per episode; requeued parents do not
//! push the children they are still waiting on again.
//!
//! Shutdown is cooperative: whichever worker sees the root (depth 0) resolved
//! pushes one `Shutdown` sentinel per worker.

use crossbeam_channel::{unbounded, Receiver, Sender};
use log::{debug, error, info};
use parking_lot::Mutex;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Instant;

use crate::codec::{self, StateKey, StateKeys};
use crate::error::{Result, SolverError};
use crate::rules::{check_termination, viable_moves};
use crate::scoring::{resolve_values, terminal_values};
use crate::table::ValueTable;
use crate::types::Board;

/// A state waiting to be expanded or re-evaluated
#[derive(Debug, Clone)]
pub struct WorkItem {
    pub board: Board,
    /// Key of `board` from the mover's perspective
    pub key: StateKey,
    pub mover: usize,
    pub depth: usize,
}

impl WorkItem {
    pub fn new(board: Board, mover: usize, depth: usize) -> Self {
        let key = codec::encode(&board, mover);
        WorkItem {
            board,
            key,
            mover,
            depth,
        }
    }
}

/// Message on the worklist
#[derive(Debug)]
pub enum Job {
    Expand(WorkItem),
    Shutdown,
}

/// Counters of one episode
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SearchStats {
    /// Pops of states not yet valued
    pub expanded: usize,
    /// Pops that had to be pushed back
    pub requeued: usize,
    /// Terminal states valued
    pub terminals: usize,
    /// Child states pushed for expansion
    pub enqueued: usize,
}

/// Shared between the workers of one episode
#[derive(Debug, Default)]
struct SharedSearchState {
    expanded: AtomicUsize,
    requeued: AtomicUsize,
    terminals: AtomicUsize,
    enqueued: AtomicUsize,
    shutdown_sent: AtomicBool,
    /// Mover-perspective keys of every state pushed this episode
    pushed: Mutex<HashSet<StateKey>>,
    /// First error raised by any worker
    failure: Mutex<Option<SolverError>>,
}

impl SharedSearchState {
    fn stats(&self) -> SearchStats {
        SearchStats {
            expanded: self.expanded.load(Ordering::Acquire),
            requeued: self.requeued.load(Ordering::Acquire),
            terminals: self.terminals.load(Ordering::Acquire),
            enqueued: self.enqueued.load(Ordering::Acquire),
        }
    }

    /// Whether `key` is pushed for the first time this episode
    fn claim(&self, key: &str) -> bool {
        let mut pushed = self.pushed.lock();
        if pushed.contains(key) {
            return false;
        }
        pushed.insert(key.to_string())
    }

    fn fail(&self, err: SolverError) {
        let mut failure = self.failure.lock();
        if failure.is_none() {
            *failure = Some(err);
        }
    }
}

/// Unbounded blocking queue shared by the workers
struct Worklist {
    sender: Sender<Job>,
    receiver: Receiver<Job>,
}

impl Worklist {
    fn new() -> Self {
        let (sender, receiver) = unbounded();
        Worklist { sender, receiver }
    }

    fn push(&self, item: WorkItem) {
        // The worklist owns a receiver, so sending cannot fail
        let _ = self.sender.send(Job::Expand(item));
    }

    fn pop(&self) -> Option<Job> {
        self.receiver.recv().ok()
    }
}

/// One search run from a root board to quiescence
pub struct SearchEpisode<'a> {
    table: &'a ValueTable,
    n_players: usize,
    win_length: usize,
    workers: usize,
}

impl<'a> SearchEpisode<'a> {
    /// # Arguments
    /// * `table` - Shared value table, read and extended by every worker
    /// * `n_players` - Number of players taking turns
    /// * `win_length` - Pieces in a row needed to win
    /// * `workers` - Size of the worker pool
    pub fn new(table: &'a ValueTable, n_players: usize, win_length: usize, workers: usize) -> Self {
        SearchEpisode {
            table,
            n_players,
            win_length,
            workers: workers.max(1),
        }
    }

    /// Values `root` (with `mover` to play) and every state below it
    ///
    /// Returns once all workers have exited. The root's values, and those of
    /// every state reachable from it, are in the table afterwards.
    pub fn run(&self, root: &Board, mover: usize) -> Result<SearchStats> {
        if root.is_full() {
            return Err(SolverError::NoMovesAvailable);
        }

        let start_time = Instant::now();
        info!(
            "Starting search: {} workers, {} players, win length {}, {} pieces on board",
            self.workers,
            self.n_players,
            self.win_length,
            root.pieces()
        );

        let worklist = Worklist::new();
        let shared = SharedSearchState::default();
        let root_item = WorkItem::new(root.clone(), mover, 0);
        shared.claim(&root_item.key);
        worklist.push(root_item);

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.workers)
            .thread_name(|i| format!("caro-search-{}", i))
            .build()?;

        pool.scope(|scope| {
            for _ in 0..self.workers {
                scope.spawn(|_| self.worker_loop(&worklist, &shared));
            }
        });

        if let Some(err) = shared.failure.lock().take() {
            return Err(err);
        }

        let stats = shared.stats();
        info!(
            "Search complete in {}ms: {} expanded, {} requeued, {} terminal, {} enqueued, table size {}",
            start_time.elapsed().as_millis(),
            stats.expanded,
            stats.requeued,
            stats.terminals,
            stats.enqueued,
            self.table.len()
        );
        Ok(stats)
    }

    fn worker_loop(&self, worklist: &Worklist, shared: &SharedSearchState) {
        while let Some(job) = worklist.pop() {
            let item = match job {
                Job::Shutdown => break,
                Job::Expand(item) => item,
            };

            if let Err(e) = self.expand(item, worklist, shared) {
                error!("Search worker failed: {}", e);
                shared.fail(e);
                self.shutdown(worklist, shared);
                break;
            }
        }
    }

    /// Pushes one sentinel per worker, at most once per episode
    fn shutdown(&self, worklist: &Worklist, shared: &SharedSearchState) {
        if shared.shutdown_sent.swap(true, Ordering::AcqRel) {
            return;
        }
        for _ in 0..self.workers {
            let _ = worklist.sender.send(Job::Shutdown);
        }
    }

    fn expand(&self, item: WorkItem, worklist: &Worklist, shared: &SharedSearchState) -> Result<()> {
        if self.table.contains(&item.key) {
            if item.depth == 0 {
                self.shutdown(worklist, shared);
            }
            return Ok(());
        }
        shared.expanded.fetch_add(1, Ordering::Relaxed);

        let moves = viable_moves(&item.board);
        let next_mover = (item.mover + 1) % self.n_players;
        let mut children = Vec::with_capacity(moves.len());
        let mut resolved = 0;

        for &mv in &moves {
            let child = item.board.with_move(mv, item.mover);
            let keys = StateKeys::new(&child, self.n_players);

            if self.table.contains(keys.for_player(item.mover)) {
                resolved += 1;
            } else if let Some(outcome) = check_termination(&child, mv, self.win_length) {
                let values = terminal_values(&outcome, self.n_players);
                self.table.put_all(&keys, &values)?;
                shared.terminals.fetch_add(1, Ordering::Relaxed);
                resolved += 1;
            } else if shared.claim(keys.for_player(next_mover)) {
                let key = keys.for_player(next_mover).clone();
                worklist.push(WorkItem {
                    board: child,
                    key,
                    mover: next_mover,
                    depth: item.depth + 1,
                });
                shared.enqueued.fetch_add(1, Ordering::Relaxed);
            }

            children.push(keys);
        }

        if resolved < moves.len() {
            shared.requeued.fetch_add(1, Ordering::Relaxed);
            worklist.push(item);
            return Ok(());
        }

        {
            let own_keys = StateKeys::new(&item.board, self.n_players);
            let mut table = self.table.lock();

            let child_values = children
                .iter()
                .map(|keys| {
                    table
                        .values_for(keys)
                        .ok_or_else(|| SolverError::UnresolvedState(keys.for_player(item.mover).clone()))
                })
                .collect::<Result<Vec<_>>>()?;

            let values = resolve_values(item.mover, self.n_players, &child_values);
            table.insert_all(&own_keys, &values);
            self.table.maybe_checkpoint(&mut table)?;
        }

        if item.depth < 2 {
            debug!("Non-terminal state {} at depth {} computed", item.key, item.depth);
        }
        if item.depth == 0 {
            self.shutdown(worklist, shared);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Coord;

    fn root_values(table: &ValueTable, board: &Board, n_players: usize) -> Vec<f64> {
        table
            .lock()
            .values_for(&StateKeys::new(board, n_players))
            .expect("root should be valued")
    }

    #[test]
    fn test_forced_win_on_two_by_two() {
        // Any two cells of a 2x2 board are in line, so the first player always wins
        let table = ValueTable::in_memory();
        let root = Board::new(2);
        let stats = SearchEpisode::new(&table, 2, 2, 2).run(&root, 0).unwrap();

        assert_eq!(root_values(&table, &root, 2), vec![1.0, -1.0]);
        assert!(stats.expanded > 0);
        assert!(stats.terminals > 0);
        // 4 single-piece boards, 12 two-piece boards, each pushed once
        assert_eq!(stats.enqueued, 16);
    }

    #[test]
    fn test_children_of_root_are_valued() {
        let table = ValueTable::in_memory();
        let root = Board::from_rows(vec![vec![1, 0, 2], vec![2, 1, 0], vec![0, 1, 0]]).unwrap();
        SearchEpisode::new(&table, 2, 3, 3).run(&root, 1).unwrap();

        for mv in viable_moves(&root) {
            let child = root.with_move(mv, 1);
            assert!(table.lock().values_for(&StateKeys::new(&child, 2)).is_some());
        }

        // Player 0 still wins on every line, player 1 at best breaks even on average
        let values = root_values(&table, &root, 2);
        assert_eq!(values[0], 1.0);
        assert!(values[1].abs() < 1e-12);
    }

    #[test]
    fn test_terminal_children_take_winner_values() {
        let table = ValueTable::in_memory();
        let root = Board::from_rows(vec![vec![1, 0, 2], vec![2, 1, 0], vec![0, 1, 2]]).unwrap();
        SearchEpisode::new(&table, 2, 3, 2).run(&root, 0).unwrap();

        let winning = root.with_move(Coord::new(0, 1), 0);
        assert_eq!(
            table.lock().values_for(&StateKeys::new(&winning, 2)),
            Some(vec![1.0, -1.0])
        );
        assert_eq!(root_values(&table, &root, 2)[0], 1.0);
    }

    #[test]
    fn test_worker_count_does_not_change_values() {
        let root = Board::new(3).with_move(Coord::new(1, 1), 0);

        let single = ValueTable::in_memory();
        SearchEpisode::new(&single, 2, 3, 1).run(&root, 1).unwrap();

        let pooled = ValueTable::in_memory();
        SearchEpisode::new(&pooled, 2, 3, 8).run(&root, 1).unwrap();

        assert_eq!(root_values(&single, &root, 2), root_values(&pooled, &root, 2));
        assert_eq!(single.len(), pooled.len());
    }

    #[test]
    fn test_rerun_on_valued_root_is_immediate() {
        let table = ValueTable::in_memory();
        let root = Board::new(3).with_move(Coord::new(0, 0), 0);
        let episode = SearchEpisode::new(&table, 2, 3, 4);

        episode.run(&root, 1).unwrap();
        let first = root_values(&table, &root, 2);
        let size = table.len();

        let stats = episode.run(&root, 1).unwrap();
        assert_eq!(stats, SearchStats::default());
        assert_eq!(root_values(&table, &root, 2), first);
        assert_eq!(table.len(), size);
    }

    #[test]
    fn test_three_players_converge() {
        let table = ValueTable::in_memory();
        let root = Board::new(3);
        SearchEpisode::new(&table, 3, 3, 4).run(&root, 0).unwrap();

        let values = root_values(&table, &root, 3);
        assert_eq!(values.len(), 3);
        assert!(values.iter().all(|v| (-1.0..=2.0).contains(v)));
    }

    #[test]
    fn test_episode_checkpoints_while_searching() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("03_03_02.bin");
        let table = ValueTable::load(&path, 50).unwrap();

        SearchEpisode::new(&table, 2, 3, 4).run(&Board::new(3), 0).unwrap();

        // Nobody called checkpoint(), the file comes from the periodic saves alone
        assert!(path.exists());
        let saved = ValueTable::load(&path, 50).unwrap();
        assert!(!saved.is_empty());
        assert!(saved.len() <= table.len());
    }

    #[test]
    fn test_checkpoint_failure_ends_the_episode() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("blocker");
        std::fs::write(&blocker, b"not a directory").unwrap();
        let table = ValueTable::load(blocker.join("03_03_02.bin"), 10).unwrap();

        let result = SearchEpisode::new(&table, 2, 3, 4).run(&Board::new(3), 0);
        assert!(matches!(result, Err(SolverError::Io(_))));
    }

    #[test]
    fn test_full_board_is_rejected() {
        let table = ValueTable::in_memory();
        let root = Board::from_rows(vec![vec![1, 2], vec![2, 1]]).unwrap();
        let result = SearchEpisode::new(&table, 2, 2, 1).run(&root, 0);
        assert!(matches!(result, Err(SolverError::NoMovesAvailable)));
    }
}
