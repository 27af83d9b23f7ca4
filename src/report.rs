//! Plain-text rendering of combined simulation results.

use crate::types::CombinedMove;

fn cell(value: Option<f64>, precision: usize) -> String {
    match value {
        Some(v) => format!("{:.*}", precision, v),
        None => String::from("-"),
    }
}

/// Fixed-width table of the ranked moves followed by a one-line summary.
///
/// Statistics that have not been computed yet print as `-`.
pub fn statistic_table(moves: &[CombinedMove], progress: u64) -> String {
    if moves.is_empty() {
        return String::from("No candidate moves.\n");
    }

    let width = moves
        .iter()
        .map(|m| m.candidate.description.len())
        .max()
        .unwrap_or(0)
        .max(4);

    let mut output = format!(
        "{:>4}  {:<width$}  {:>5}  {:>9}  {:>8}  {:>7}  {:>7}\n",
        "Rank", "Move", "Score", "Rollouts", "Equity", "Win %", "Std dev",
        width = width
    );
    for (rank, mv) in moves.iter().enumerate() {
        let marker = if mv.candidate.excluded { "*" } else { "" };
        output.push_str(&format!(
            "{:>4}  {:<width$}  {:>5}  {:>9}  {:>8}  {:>7}  {:>7}{}\n",
            rank + 1,
            mv.candidate.description,
            mv.candidate.score,
            mv.iterations,
            cell(Some(mv.value()), 2),
            cell(mv.win_rate.map(|w| w * 100.0), 1),
            cell(mv.equity_std_dev, 2),
            marker,
            width = width
        ));
    }

    if progress == 0 {
        output.push_str("\nNot simulated yet; equity is the static move value.\n");
    } else {
        output.push_str(&format!("\n{} rollouts across all workers.\n", progress));
    }
    if moves.iter().any(|m| m.candidate.excluded) {
        output.push_str("* excluded from simulation\n");
    }
    output
}
