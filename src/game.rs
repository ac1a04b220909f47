// Turn-taking container for playing a full game against the solver

use crate::config::{MAX_BOARD_SIZE, MAX_PLAYERS, MIN_PLAYERS, MIN_WIN_LENGTH};
use crate::error::{Result, SolverError};
use crate::rules::check_termination;
use crate::solver::MoveRequest;
use crate::types::{Board, Coord, WinnerData};

/// Board plus whose turn it is
#[derive(Debug, Clone)]
pub struct Game {
    board: Board,
    win_length: usize,
    n_players: usize,
    current: usize,
    outcome: Option<WinnerData>,
}

impl Game {
    pub fn new(size: usize, win_length: usize, n_players: usize) -> Result<Self> {
        if !(MIN_PLAYERS..=MAX_PLAYERS).contains(&n_players) {
            return Err(SolverError::InvalidConfig(format!(
                "needs between {} and {} players, given {}",
                MIN_PLAYERS, MAX_PLAYERS, n_players
            )));
        }
        if win_length < MIN_WIN_LENGTH || size < win_length || size > MAX_BOARD_SIZE {
            return Err(SolverError::InvalidConfig(format!(
                "unsupported {}x{} board with win length {}",
                size, size, win_length
            )));
        }

        Ok(Game {
            board: Board::new(size),
            win_length,
            n_players,
            current: 0,
            outcome: None,
        })
    }

    pub fn board(&self) -> &Board {
        &self.board
    }

    pub fn current_player(&self) -> usize {
        self.current
    }

    pub fn n_players(&self) -> usize {
        self.n_players
    }

    /// Result of the game once a move ended it
    pub fn outcome(&self) -> Option<WinnerData> {
        self.outcome
    }

    pub fn is_over(&self) -> bool {
        self.outcome.is_some()
    }

    /// Whether `coord` is on the board and empty
    pub fn is_valid(&self, coord: Coord) -> bool {
        coord.row < self.board.size()
            && coord.col < self.board.size()
            && self.board.is_empty_at(coord)
    }

    /// Places the current player's piece and checks whether the game ended
    ///
    /// Does not pass the turn; call [`advance`](Self::advance) for that.
    pub fn play(&mut self, coord: Coord) -> Result<Option<WinnerData>> {
        if let Some(outcome) = self.outcome {
            return Err(SolverError::InvalidMove {
                coord,
                reason: format!("game already ended (winner id {})", outcome.winner_id),
            });
        }
        if coord.row >= self.board.size() || coord.col >= self.board.size() {
            return Err(SolverError::InvalidMove {
                coord,
                reason: "out of bounds".to_string(),
            });
        }
        if !self.board.is_empty_at(coord) {
            return Err(SolverError::InvalidMove {
                coord,
                reason: "cell is occupied".to_string(),
            });
        }

        self.board.place(coord, self.current);
        self.outcome = check_termination(&self.board, coord, self.win_length);
        Ok(self.outcome)
    }

    /// Passes the turn to the next player
    pub fn advance(&mut self) {
        self.current = (self.current + 1) % self.n_players;
    }

    /// Solver request for the player to move
    pub fn request(&self) -> MoveRequest {
        MoveRequest {
            board: self.board.clone(),
            mover: self.current,
            win_length: self.win_length,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_unsupported_setups() {
        assert!(Game::new(3, 3, 1).is_err());
        assert!(Game::new(3, 4, 2).is_err());
        assert!(Game::new(3, 1, 2).is_err());
        assert!(Game::new(4, 3, 3).is_ok());
    }

    #[test]
    fn test_turns_rotate() {
        let mut game = Game::new(4, 3, 3).unwrap();
        for expected in [0, 1, 2, 0, 1] {
            assert_eq!(game.current_player(), expected);
            game.advance();
        }
    }

    #[test]
    fn test_invalid_moves() {
        let mut game = Game::new(3, 3, 2).unwrap();
        assert!(!game.is_valid(Coord::new(3, 0)));
        assert!(matches!(
            game.play(Coord::new(0, 3)),
            Err(SolverError::InvalidMove { .. })
        ));

        game.play(Coord::new(1, 1)).unwrap();
        assert!(!game.is_valid(Coord::new(1, 1)));
        game.advance();
        assert!(game.play(Coord::new(1, 1)).is_err());
        assert_eq!(game.board().get(Coord::new(1, 1)), 1);
    }

    #[test]
    fn test_play_until_win() {
        let mut game = Game::new(3, 3, 2).unwrap();
        let moves = [(0, 0), (1, 0), (0, 1), (1, 1)];
        for (row, col) in moves {
            assert_eq!(game.play(Coord::new(row, col)).unwrap(), None);
            game.advance();
        }

        let outcome = game.play(Coord::new(0, 2)).unwrap().unwrap();
        assert_eq!(outcome.winner_player(), Some(0));
        assert_eq!(outcome.count, 3);
        assert!(game.is_over());
        assert!(game.play(Coord::new(2, 2)).is_err());
    }

    #[test]
    fn test_request_reflects_turn() {
        let mut game = Game::new(3, 3, 2).unwrap();
        game.play(Coord::new(0, 0)).unwrap();
        game.advance();

        let request = game.request();
        assert_eq!(request.mover, 1);
        assert_eq!(request.win_length, 3);
        assert_eq!(request.board.get(Coord::new(0, 0)), 1);
    }
}
