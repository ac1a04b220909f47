//! Line detection and move enumeration
//!
//! Pure functions consulted for every state the search visits. Nothing here
//! takes a lock or allocates beyond the returned move list.

use crate::types::{Board, Coord, WinnerData};

/// The 4 axes as opposite direction pairs, in the order wins are reported
const AXES: [((isize, isize), (isize, isize)); 4] = [
    ((-1, -1), (1, 1)), // Main diagonal
    ((-1, 0), (1, 0)),  // Vertical
    ((-1, 1), (1, -1)), // Anti-diagonal
    ((0, -1), (0, 1)),  // Horizontal
];

/// Result of walking away from the last move in one direction
#[derive(Debug, Clone, Copy)]
struct Trace {
    /// Same-valued cells passed, excluding the origin
    count: usize,
    /// Stopped on an in-bounds occupied cell (an opponent piece)
    blocked: bool,
}

fn trace(board: &Board, origin: Coord, (dr, dc): (isize, isize)) -> Trace {
    let value = board.get(origin);
    let mut count = 0;
    let mut r = origin.row as isize + dr;
    let mut c = origin.col as isize + dc;

    while board.in_bounds(r, c) && board.get(Coord::new(r as usize, c as usize)) == value {
        count += 1;
        r += dr;
        c += dc;
    }

    let blocked = board.in_bounds(r, c) && board.get(Coord::new(r as usize, c as usize)) != 0;
    Trace { count, blocked }
}

fn offset(origin: Coord, (dr, dc): (isize, isize), steps: usize) -> Coord {
    let steps = steps as isize;
    Coord::new(
        (origin.row as isize + dr * steps) as usize,
        (origin.col as isize + dc * steps) as usize,
    )
}

/// Checks whether the piece just placed on `last_move` ended the game
///
/// Returns a win when one axis through `last_move` holds a run of at least
/// `win_length` pieces that is not closed by opponent pieces on both ends.
/// Running off the board never counts as closed. Returns the draw sentinel
/// when nothing qualifies and the board is full, and `None` while the game
/// goes on.
pub fn check_termination(board: &Board, last_move: Coord, win_length: usize) -> Option<WinnerData> {
    let winner_id = board.get(last_move) as i32;

    for &(back_dir, fwd_dir) in AXES.iter() {
        let back = trace(board, last_move, back_dir);
        let fwd = trace(board, last_move, fwd_dir);
        let count = back.count + fwd.count + 1;

        if count >= win_length && !(back.blocked && fwd.blocked) {
            return Some(WinnerData {
                start: offset(last_move, back_dir, back.count),
                end: offset(last_move, fwd_dir, fwd.count),
                count,
                winner_id,
            });
        }
    }

    if board.is_full() {
        Some(WinnerData::draw())
    } else {
        None
    }
}

/// Empty cells in row-major order
///
/// This is both the legal move set and the expansion order; move selection
/// breaks ties in favor of the earliest entry.
pub fn viable_moves(board: &Board) -> Vec<Coord> {
    let size = board.size();
    board
        .cells()
        .iter()
        .enumerate()
        .filter(|&(_, &cell)| cell == 0)
        .map(|(i, _)| Coord::new(i / size, i % size))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn board(rows: &[&[u8]]) -> Board {
        Board::from_rows(rows.iter().map(|r| r.to_vec()).collect()).unwrap()
    }

    #[test]
    fn test_vertical_win_reports_both_ends() {
        let b = board(&[&[1, 1, 2], &[2, 1, 0], &[0, 1, 2]]);
        let win = check_termination(&b, Coord::new(0, 1), 3).expect("column 1 is complete");
        assert_eq!(win.start, Coord::new(0, 1));
        assert_eq!(win.end, Coord::new(2, 1));
        assert_eq!(win.count, 3);
        assert_eq!(win.winner_id, 1);
    }

    #[test]
    fn test_win_from_middle_of_run() {
        let b = board(&[&[0, 0, 0, 0], &[2, 2, 2, 0], &[1, 1, 0, 0], &[0, 0, 0, 0]]);
        let win = check_termination(&b, Coord::new(1, 1), 3).unwrap();
        assert_eq!(win.start, Coord::new(1, 0));
        assert_eq!(win.end, Coord::new(1, 2));
        assert_eq!(win.winner_id, 2);
        assert_eq!(win.winner_player(), Some(1));
    }

    #[test]
    fn test_diagonal_wins() {
        let main = board(&[&[1, 2, 0], &[0, 1, 2], &[0, 0, 1]]);
        let win = check_termination(&main, Coord::new(1, 1), 3).unwrap();
        assert_eq!((win.start, win.end), (Coord::new(0, 0), Coord::new(2, 2)));

        let anti = board(&[&[1, 1, 2], &[0, 2, 0], &[2, 0, 1]]);
        let win = check_termination(&anti, Coord::new(2, 0), 3).unwrap();
        assert_eq!((win.start, win.end), (Coord::new(0, 2), Coord::new(2, 0)));
        assert_eq!(win.cells(), vec![Coord::new(0, 2), Coord::new(1, 1), Coord::new(2, 0)]);
    }

    #[test]
    fn test_run_blocked_on_both_ends_is_not_a_win() {
        let b = board(&[
            &[0, 0, 0, 0, 0],
            &[2, 1, 1, 1, 2],
            &[0, 0, 0, 0, 0],
            &[0, 0, 0, 0, 0],
            &[0, 0, 0, 0, 0],
        ]);
        assert_eq!(check_termination(&b, Coord::new(1, 2), 3), None);
    }

    #[test]
    fn test_run_blocked_on_one_end_wins() {
        let b = board(&[
            &[0, 0, 0, 0, 0],
            &[2, 1, 1, 1, 0],
            &[0, 0, 0, 0, 0],
            &[0, 0, 0, 0, 0],
            &[0, 0, 0, 0, 0],
        ]);
        let win = check_termination(&b, Coord::new(1, 3), 3).unwrap();
        assert_eq!((win.start, win.end), (Coord::new(1, 1), Coord::new(1, 3)));
    }

    #[test]
    fn test_board_edge_does_not_block() {
        // Closed by an opponent on the right, by the edge on the left
        let b = board(&[&[1, 1, 1, 2], &[0, 0, 0, 0], &[0, 0, 0, 0], &[2, 0, 0, 0]]);
        let win = check_termination(&b, Coord::new(0, 0), 3).unwrap();
        assert_eq!((win.start, win.end), (Coord::new(0, 0), Coord::new(0, 2)));
    }

    #[test]
    fn test_full_board_without_line_is_draw() {
        let b = board(&[&[1, 2, 1], &[1, 2, 2], &[2, 1, 1]]);
        let result = check_termination(&b, Coord::new(2, 2), 3).unwrap();
        assert_eq!(result, WinnerData::draw());
        assert_eq!(result.winner_id, -1);
        assert_eq!(result.count, 0);
    }

    #[test]
    fn test_blocked_run_on_full_board_is_draw() {
        let b = board(&[
            &[2, 1, 1, 1, 2],
            &[1, 2, 2, 2, 1],
            &[2, 1, 1, 2, 1],
            &[1, 2, 1, 2, 2],
            &[2, 1, 2, 1, 2],
        ]);
        // The only run of three through (0,2) is capped on both ends
        let result = check_termination(&b, Coord::new(0, 2), 3);
        assert_eq!(result, Some(WinnerData::draw()));
    }

    #[test]
    fn test_game_continues() {
        let b = board(&[&[1, 0, 0], &[0, 2, 0], &[0, 0, 0]]);
        assert_eq!(check_termination(&b, Coord::new(1, 1), 3), None);
    }

    #[test]
    fn test_viable_moves_row_major() {
        let b = board(&[&[1, 0, 2], &[2, 1, 0], &[0, 1, 2]]);
        assert_eq!(
            viable_moves(&b),
            vec![Coord::new(0, 1), Coord::new(1, 2), Coord::new(2, 0)]
        );
        assert_eq!(viable_moves(&Board::new(2)).len(), 4);
    }

    #[test]
    fn test_viable_moves_are_exactly_empty_cells_on_random_boards() {
        let mut rng = StdRng::seed_from_u64(7);

        for _ in 0..200 {
            let size = rng.random_range(1..7);
            let rows: Vec<Vec<u8>> = (0..size)
                .map(|_| (0..size).map(|_| rng.random_range(0..4)).collect())
                .collect();
            let b = Board::from_rows(rows).unwrap();

            let moves = viable_moves(&b);
            let expected: Vec<Coord> = (0..size)
                .flat_map(|r| (0..size).map(move |c| Coord::new(r, c)))
                .filter(|&c| b.is_empty_at(c))
                .collect();

            assert_eq!(moves, expected);
            assert!(moves.windows(2).all(|w| w[0] < w[1]));
        }
    }
}
