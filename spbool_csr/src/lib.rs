use itertools::Itertools;
use spbool_coo::CooMatrix;
use spbool_matrix::{check_bounds, Edge, IndexError, Matrix};

mod col_set;
mod elem_add;

pub use elem_add::ShapeError;

/// Builds the row pointer and column index arrays of an `n`-row matrix from
/// parallel coordinate arrays, counting-sort style.
///
/// `row_pointer` is an exclusive prefix sum of the per-row entry counts, so
/// `row_pointer[i + 1] - row_pointer[i]` is the degree of row `i` and
/// `row_pointer[n]` is the number of entries. `col_indices` is a copy of `cols`
/// in input order: entries are not scattered into row buckets, so the slice
/// `row_pointer[i]..row_pointer[i + 1]` only holds the columns of row `i` when
/// the input is already grouped by row.
///
/// # Panics
///
/// Panics if `rows` and `cols` differ in length or a row index is not below `n`.
pub fn build_csr(n: usize, rows: &[usize], cols: &[usize]) -> (Vec<usize>, Vec<usize>) {
    assert_eq!(rows.len(), cols.len(), "coordinate arrays differ in length");
    let mut row_pointer = vec![0; n + 1];
    let mut col_indices = vec![0; cols.len()];
    for (k, (&i, &j)) in rows.iter().zip(cols).enumerate() {
        row_pointer[i] += 1;
        col_indices[k] = j;
    }

    let mut sum = 0;
    for r in &mut row_pointer {
        let prev = sum;
        sum += *r;
        *r = prev;
    }
    (row_pointer, col_indices)
}

/// Boolean sparse matrix in compressed sparse row form.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct BoolCsrMatrix {
    num_rows: usize,
    num_cols: usize,
    row_pointer: Vec<usize>,
    col_indices: Vec<usize>,
}

impl Default for BoolCsrMatrix {
    fn default() -> Self {
        BoolCsrMatrix::new((0, 0))
    }
}

impl BoolCsrMatrix {
    pub fn new((num_rows, num_cols): (usize, usize)) -> Self {
        BoolCsrMatrix {
            num_rows,
            num_cols,
            row_pointer: vec![0; num_rows + 1],
            col_indices: vec![],
        }
    }

    pub fn new_square(n: usize) -> Self {
        Self::new((n, n))
    }

    pub fn identity(n: usize) -> Self {
        BoolCsrMatrix {
            num_rows: n,
            num_cols: n,
            row_pointer: (0..=n).collect(),
            col_indices: (0..n).collect(),
        }
    }

    /// Square `n`x`n` matrix from coordinate arrays, see [`build_csr`].
    pub fn from_edges(n: usize, rows: &[usize], cols: &[usize]) -> Self {
        let (row_pointer, col_indices) = build_csr(n, rows, cols);
        BoolCsrMatrix {
            num_rows: n,
            num_cols: n,
            row_pointer,
            col_indices,
        }
    }

    /// Like [`BoolCsrMatrix::from_edges`], but checks every entry against `shape` first.
    pub fn try_from_edges(shape: (usize, usize), edges: &[Edge]) -> Result<Self, IndexError> {
        for &e in edges {
            check_bounds(e, shape)?;
        }
        let (rows, cols): (Vec<_>, Vec<_>) = edges.iter().copied().unzip();
        let (row_pointer, col_indices) = build_csr(shape.0, &rows, &cols);
        Ok(BoolCsrMatrix {
            num_rows: shape.0,
            num_cols: shape.1,
            row_pointer,
            col_indices,
        })
    }

    pub fn row_pointer(&self) -> &[usize] {
        &self.row_pointer
    }

    pub fn col_indices(&self) -> &[usize] {
        &self.col_indices
    }

    pub fn row(&self, i: usize) -> &[usize] {
        &self.col_indices[self.row_pointer[i]..self.row_pointer[i + 1]]
    }

    pub fn row_len(&self, i: usize) -> usize {
        self.row_pointer[i + 1] - self.row_pointer[i]
    }

    pub fn iter(&self) -> impl Iterator<Item = Edge> + '_ {
        self.row_pointer
            .iter()
            .copied()
            .tuple_windows()
            .enumerate()
            .flat_map(move |(r, (rlo, rhi))| self.col_indices[rlo..rhi].iter().map(move |&c| (r, c)))
    }

    /// Whether the slice of every row holds exactly the entries whose row index is
    /// that row, given the row index of each stored entry in storage order.
    pub fn is_row_grouped_by(&self, rows: &[usize]) -> bool {
        rows.len() == self.col_indices.len()
            && self
                .row_pointer
                .iter()
                .copied()
                .tuple_windows()
                .enumerate()
                .all(|(r, (rlo, rhi))| rows[rlo..rhi].iter().all(|&i| i == r))
    }

    // every row strictly increasing, which implies no duplicate entries
    pub fn has_sorted_rows(&self) -> bool {
        self.row_pointer
            .iter()
            .copied()
            .tuple_windows()
            .all(|(a, b)| is_increasing(&self.col_indices[a..b]))
    }

    fn invariant1(&self) -> bool {
        self.row_pointer.len() == self.num_rows + 1
    }

    fn invariant2(&self) -> bool {
        self.row_pointer[0] == 0
    }

    fn invariant3(&self) -> bool {
        self.row_pointer.iter().tuple_windows().all(|(a, b)| a <= b)
    }

    fn invariant4(&self) -> bool {
        self.row_pointer[self.num_rows] == self.col_indices.len()
    }

    fn invariant5(&self) -> bool {
        self.col_indices.iter().all(|&c| c < self.num_cols)
    }
}

impl Matrix for BoolCsrMatrix {
    fn invariants(&self) -> bool {
        self.invariant1()
            && self.invariant2()
            && self.invariant3()
            && self.invariant4()
            && self.invariant5()
    }

    fn num_rows(&self) -> usize {
        self.num_rows
    }

    fn num_cols(&self) -> usize {
        self.num_cols
    }

    fn num_nonzeros(&self) -> usize {
        self.col_indices.len()
    }
}

impl From<&CooMatrix> for BoolCsrMatrix {
    fn from(m: &CooMatrix) -> Self {
        let (row_pointer, col_indices) = build_csr(m.nrows(), m.rows(), m.cols());
        BoolCsrMatrix {
            num_rows: m.nrows(),
            num_cols: m.ncols(),
            row_pointer,
            col_indices,
        }
    }
}

fn is_increasing<T: Ord>(s: &[T]) -> bool {
    s.iter().tuple_windows().all(|(a, b)| a < b)
}

fn checked_inclusive_scan(v: &[usize]) -> Vec<usize> {
    std::iter::once(0)
        .chain(v.iter().copied().scan(0usize, |sum, x| {
            *sum = sum.checked_add(x).expect("entry count overflows a usize");
            Some(*sum)
        }))
        .collect()
}
