// State keys for the value table
//
// A key is "<perspective, 2 digits>:<cells, 2 digits each, row-major>", so two
// boards share a key exactly when their contents and perspective match.

use std::fmt::Write;

use crate::types::Board;

/// Cache index of one (board, perspective) pair
pub type StateKey = String;

/// Largest player id or cell value that fits the two-digit fields
pub const MAX_CODE: usize = 99;

/// Cell part of a key, shared by every perspective of the same board
pub fn encode_board(board: &Board) -> String {
    let mut code = String::with_capacity(board.cells().len() * 2);
    for &cell in board.cells() {
        // Writing into a String cannot fail
        let _ = write!(code, "{:02}", cell);
    }
    code
}

/// Key of an already encoded board from one player's perspective
pub fn player_key(board_code: &str, perspective: usize) -> StateKey {
    format!("{:02}:{}", perspective, board_code)
}

/// Key of `board` from `perspective`'s point of view
pub fn encode(board: &Board, perspective: usize) -> StateKey {
    player_key(&encode_board(board), perspective)
}

/// Keys of one board for every player, indexed by player id
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StateKeys {
    keys: Vec<StateKey>,
}

impl StateKeys {
    /// Encodes the board once and derives each perspective's key from it
    pub fn new(board: &Board, n_players: usize) -> Self {
        let code = encode_board(board);
        StateKeys {
            keys: (0..n_players).map(|p| player_key(&code, p)).collect(),
        }
    }

    pub fn for_player(&self, player: usize) -> &StateKey {
        &self.keys[player]
    }

    pub fn iter(&self) -> impl Iterator<Item = &StateKey> {
        self.keys.iter()
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}
