use proptest::prelude::*;

use crate::{AddPair, Edge, Matrix};

const MAX_SIZE: usize = 10;

pub fn arb_edges(rows: usize, cols: usize) -> impl Strategy<Value = Vec<Edge>> {
    proptest::collection::vec((0..rows, 0..cols), 0..=(2 * rows * cols))
}

// square vertex count paired with an unordered edge list, duplicates allowed
pub fn arb_edge_list() -> impl Strategy<Value = (usize, Vec<Edge>)> {
    (1..MAX_SIZE).prop_flat_map(|n| (Just(n), arb_edges(n, n)))
}

// edges stably grouped by row, column order within a row left as generated
pub fn arb_row_sorted_edge_list() -> impl Strategy<Value = (usize, Vec<Edge>)> {
    arb_edge_list().prop_map(|(n, mut edges)| {
        edges.sort_by_key(|&(r, _)| r);
        (n, edges)
    })
}

pub fn arb_matrix<F: Fn(usize) -> S, S: Strategy>(
    arb_square_matrix: F,
) -> impl Strategy<Value = S::Value>
where
    S::Value: Matrix,
{
    (1..MAX_SIZE).prop_flat_map(arb_square_matrix)
}

pub fn arb_add_pair<F: Fn(usize) -> S + Copy, S: Strategy>(
    arb_square_matrix: F,
) -> impl Strategy<Value = AddPair<S::Value>>
where
    S::Value: Matrix + Clone,
{
    (1..MAX_SIZE).prop_flat_map(move |n| {
        arb_square_matrix(n).prop_flat_map(move |m| {
            arb_square_matrix(n).prop_map(move |m1| AddPair(m.clone(), m1))
        })
    })
}
