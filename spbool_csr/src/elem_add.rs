use std::mem;

use itertools::Itertools;
use rayon::prelude::*;
use spbool_matrix::Matrix;
use thiserror::Error;

use crate::{checked_inclusive_scan, col_set::ColSet, BoolCsrMatrix};

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("cannot add a {}x{} matrix to a {}x{} matrix", .lhs.0, .lhs.1, .rhs.0, .rhs.1)]
pub struct ShapeError {
    pub lhs: (usize, usize),
    pub rhs: (usize, usize),
}

impl BoolCsrMatrix {
    /// Elementwise addition over the boolean semiring: an entry is present in the
    /// result iff it is present in either operand.
    ///
    /// Row `i` of the result is the union of the `i`-th row slices of both
    /// operands, written in increasing column order without duplicates. Work is
    /// split into row ranges of similar size across the threads of the current
    /// rayon pool.
    pub fn elem_add(&self, rhs: &BoolCsrMatrix) -> Result<BoolCsrMatrix, ShapeError> {
        if self.shape() != rhs.shape() {
            return Err(ShapeError {
                lhs: self.shape(),
                rhs: rhs.shape(),
            });
        }
        let (mut row_nz, rows_offset) = self.rows_to_threads(rhs);
        self.elem_add_symbolic(rhs, &mut row_nz, &rows_offset);
        let (row_pointer, col_indices) = self.elem_add_numeric(rhs, &row_nz, &rows_offset);
        Ok(BoolCsrMatrix {
            num_rows: self.num_rows,
            num_cols: self.num_cols,
            row_pointer,
            col_indices,
        })
    }

    // upper bound of every output row, and the row ranges handed to each thread
    fn rows_to_threads(&self, rhs: &BoolCsrMatrix) -> (Vec<usize>, Vec<usize>) {
        let row_nz: Vec<_> = (0..self.num_rows)
            .into_par_iter()
            .map(|i| self.row_len(i) + rhs.row_len(i))
            .collect();
        let ps_row_nz = checked_inclusive_scan(&row_nz);
        let total = ps_row_nz[self.num_rows];
        let tnum = rayon::current_num_threads().max(1);
        let average = (total + tnum - 1) / tnum;
        let mut rows_offset = vec![0];
        rows_offset.par_extend(
            (1..tnum)
                .into_par_iter()
                .map(|tid| ps_row_nz.partition_point(|&x| x <= average * tid) - 1),
        );
        rows_offset.push(self.num_rows);
        (row_nz, rows_offset)
    }

    fn elem_add_symbolic(&self, rhs: &BoolCsrMatrix, mut rest: &mut [usize], rows_offset: &[usize]) {
        rayon::scope(move |s| {
            for (tlo, thi) in rows_offset.iter().copied().tuple_windows() {
                let (trow_nz, s2) = mem::take(&mut rest).split_at_mut(thi - tlo);
                rest = s2;
                s.spawn(move |_| {
                    let max_capacity = trow_nz.iter().copied().max().unwrap_or(0);
                    let mut set = ColSet::with_capacity(max_capacity);
                    for (i, row_nz) in (tlo..thi).zip(trow_nz.iter_mut()) {
                        if *row_nz == 0 {
                            continue;
                        }
                        set.shrink_to(*row_nz);
                        for &j in self.row(i).iter().chain(rhs.row(i)) {
                            set.insert(j);
                        }
                        *row_nz = set.len();
                        set.clear();
                    }
                });
            }
        });
    }

    fn elem_add_numeric(
        &self,
        rhs: &BoolCsrMatrix,
        row_nz: &[usize],
        rows_offset: &[usize],
    ) -> (Vec<usize>, Vec<usize>) {
        debug_assert_eq!(rows_offset.first().copied(), Some(0));
        debug_assert_eq!(rows_offset.last().copied(), Some(self.num_rows));
        debug_assert_eq!(row_nz.len(), self.num_rows);

        let offsets = checked_inclusive_scan(row_nz);
        let mut indices = vec![0; offsets[self.num_rows]];
        rayon::scope(|s| {
            let mut indices_rest = &mut indices[..];
            for (tlo, thi) in rows_offset.iter().copied().tuple_windows() {
                let trow_nz = &row_nz[tlo..thi];
                let (tindices, s2) =
                    mem::take(&mut indices_rest).split_at_mut(offsets[thi] - offsets[tlo]);
                indices_rest = s2;
                s.spawn(move |_| {
                    let capacity = trow_nz.iter().copied().max().unwrap_or(0);
                    let mut set = ColSet::with_capacity(capacity);
                    let mut curr = 0;
                    for (i, &row_nz) in (tlo..thi).zip(trow_nz) {
                        if row_nz == 0 {
                            continue;
                        }
                        set.shrink_to(row_nz);
                        for &j in self.row(i).iter().chain(rhs.row(i)) {
                            set.insert(j);
                        }
                        let written = set.drain_sorted_into(&mut tindices[curr..curr + row_nz]);
                        debug_assert_eq!(written, row_nz);
                        curr += row_nz;
                    }
                    assert_eq!(curr, tindices.len());
                });
            }
        });
        (offsets, indices)
    }
}
