//! Minimum-cost bipartite assignment (Kuhn-Munkres) between vehicles and requests.
//!
//! Costs are scaled to `i64` and negated, since `pathfinding`'s solver maximises. Pairs the cost
//! function rejects get the highest observed cost plus one, which keeps the matrix finite; such
//! pairs never appear in the solution.

use h3o::CellIndex;
use pathfinding::kuhn_munkres::{kuhn_munkres, Weights};

use crate::spatial::grid_distance;

/// Scale factor to convert f64 costs to i64 weights.
const SCALE: f64 = 1_000.0;

/// Dense weight matrix implementing pathfinding's `Weights` for i64.
struct I64Weights(Vec<Vec<i64>>);

impl Weights<i64> for I64Weights {
    fn rows(&self) -> usize {
        self.0.len()
    }

    fn columns(&self) -> usize {
        self.0.first().map_or(0, |r| r.len())
    }

    fn at(&self, row: usize, col: usize) -> i64 {
        self.0[row][col]
    }

    fn neg(&self) -> Self {
        I64Weights(
            self.0
                .iter()
                .map(|r| r.iter().map(|&x| x.saturating_neg()).collect())
                .collect(),
        )
    }
}

/// Assigned `(assignee index, target index)` pairs and their summed cost.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AssignmentSolution {
    pub pairs: Vec<(usize, usize)>,
    pub cost: f64,
}

/// Solve the assignment between `assignees` and `targets`. `cost_fn` returns `None` for pairs
/// that must not be matched. Pairs are returned in ascending assignee order.
pub fn find_assignment<A, T, F>(assignees: &[A], targets: &[T], cost_fn: F) -> AssignmentSolution
where
    F: Fn(&A, &T) -> Option<f64>,
{
    if assignees.is_empty() || targets.is_empty() {
        return AssignmentSolution::default();
    }

    let costs: Vec<Vec<Option<f64>>> = assignees
        .iter()
        .map(|a| targets.iter().map(|t| cost_fn(a, t)).collect())
        .collect();
    let upper_bound = costs
        .iter()
        .flatten()
        .flatten()
        .copied()
        .fold(None, |acc: Option<f64>, c| Some(acc.map_or(c, |m| m.max(c))));
    let Some(upper_bound) = upper_bound else {
        return AssignmentSolution::default();
    };
    let infeasible = upper_bound + 1.0;

    // the solver needs rows <= columns
    let transpose = assignees.len() > targets.len();
    let (rows, cols) = if transpose {
        (targets.len(), assignees.len())
    } else {
        (assignees.len(), targets.len())
    };
    let cost_at = |row: usize, col: usize| {
        let (a, t) = if transpose { (col, row) } else { (row, col) };
        costs[a][t]
    };
    let matrix: Vec<Vec<i64>> = (0..rows)
        .map(|r| {
            (0..cols)
                .map(|c| -((cost_at(r, c).unwrap_or(infeasible) * SCALE).round() as i64))
                .collect()
        })
        .collect();

    let (_, assignments) = kuhn_munkres(&I64Weights(matrix));

    let mut solution = AssignmentSolution::default();
    for (row, col) in assignments.into_iter().enumerate() {
        let Some(cost) = cost_at(row, col) else {
            continue;
        };
        let pair = if transpose { (col, row) } else { (row, col) };
        solution.pairs.push(pair);
        solution.cost += cost;
    }
    solution.pairs.sort_unstable();
    solution
}

/// Hex-grid steps between two cells. `None` when H3 cannot compute it.
pub fn h3_distance_cost(a: CellIndex, b: CellIndex) -> Option<f64> {
    grid_distance(a, b).map(f64::from)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::{test_cell, test_cell_offset};

    fn abs_cost(a: &f64, b: &f64) -> Option<f64> {
        Some((a - b).abs())
    }

    #[test]
    fn empty_inputs_produce_no_pairs() {
        let none: [f64; 0] = [];
        assert!(find_assignment(&none, &[1.0], abs_cost).pairs.is_empty());
        assert!(find_assignment(&[1.0], &none, abs_cost).pairs.is_empty());
    }

    #[test]
    fn minimises_total_cost() {
        // matching assignee 0 to its nearest target first would cost 1.0 + 3.1
        let assignees = [1.0, 2.1];
        let targets = [2.0, -1.0];
        let solution = find_assignment(&assignees, &targets, abs_cost);
        assert_eq!(solution.pairs, vec![(0, 1), (1, 0)]);
        assert!((solution.cost - 2.1).abs() < 1e-9);
    }

    #[test]
    fn handles_more_assignees_than_targets() {
        let assignees = [0.0, 5.0, 9.0];
        let targets = [8.0];
        let solution = find_assignment(&assignees, &targets, abs_cost);
        assert_eq!(solution.pairs, vec![(2, 0)]);
    }

    #[test]
    fn infeasible_pairs_are_never_assigned() {
        let assignees = [0.0, 1.0];
        let targets = [0.0];
        let solution = find_assignment(&assignees, &targets, |a: &f64, _: &f64| (*a > 0.5).then_some(3.0));
        assert_eq!(solution.pairs, vec![(1, 0)]);

        let none = find_assignment(&assignees, &targets, |_: &f64, _: &f64| None);
        assert!(none.pairs.is_empty());
    }

    #[test]
    fn h3_cost_counts_grid_steps() {
        assert_eq!(h3_distance_cost(test_cell(), test_cell()), Some(0.0));
        assert!(h3_distance_cost(test_cell(), test_cell_offset(0.001, 0.0)).is_some_and(|d| d > 0.0));
    }
}
