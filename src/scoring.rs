// N-player generalization of minimax values
//
// Terminal: the winner scores n_players - 1, everyone else -1, a draw is 0 for all.
// Resolved non-terminal: the mover takes the max over its moves of its own value,
// every other player the mean of theirs.

use crate::types::WinnerData;

/// Value of a finished game for every player
pub fn terminal_values(outcome: &WinnerData, n_players: usize) -> Vec<f64> {
    match outcome.winner_player() {
        None => vec![0.0; n_players],
        Some(winner) => (0..n_players)
            .map(|p| {
                if p == winner {
                    (n_players - 1) as f64
                } else {
                    -1.0
                }
            })
            .collect(),
    }
}

/// Value of a state once every child's values are known
///
/// `children` holds one per-player value vector per viable move, in move order.
/// Callers never pass an empty slice: a state without moves is terminal.
pub fn resolve_values(mover: usize, n_players: usize, children: &[Vec<f64>]) -> Vec<f64> {
    let n_children = children.len() as f64;

    (0..n_players)
        .map(|p| {
            let column = children.iter().map(|values| values[p]);
            if p == mover {
                column.fold(f64::NEG_INFINITY, f64::max)
            } else {
                column.sum::<f64>() / n_children
            }
        })
        .collect()
}
