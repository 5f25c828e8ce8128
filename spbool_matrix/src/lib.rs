use thiserror::Error;

#[cfg(feature = "proptest")]
pub mod proptest;

/// A `(row, col)` pair in coordinate form.
pub type Edge = (usize, usize);

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("entry ({row}, {col}) is out of bounds for a {rows}x{cols} matrix")]
pub struct IndexError {
    pub row: usize,
    pub col: usize,
    pub rows: usize,
    pub cols: usize,
}

pub fn check_bounds((row, col): Edge, (rows, cols): (usize, usize)) -> Result<(), IndexError> {
    if row < rows && col < cols {
        Ok(())
    } else {
        Err(IndexError {
            row,
            col,
            rows,
            cols,
        })
    }
}

/// Boolean sparse matrix: only the presence of an entry is stored.
pub trait Matrix: Sized {
    fn invariants(&self) -> bool;
    fn num_rows(&self) -> usize;
    fn num_cols(&self) -> usize;
    // the number of stored entries, duplicates included
    fn num_nonzeros(&self) -> usize;

    fn shape(&self) -> (usize, usize) {
        (self.num_rows(), self.num_cols())
    }

    fn is_square(&self) -> bool {
        self.num_rows() == self.num_cols()
    }
}

// pair of matrices conformable for addition
#[derive(Clone, Debug)]
pub struct AddPair<M>(pub M, pub M);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bounds() {
        assert_eq!(check_bounds((0, 2), (1, 3)), Ok(()));
        assert_eq!(
            check_bounds((1, 2), (1, 3)),
            Err(IndexError {
                row: 1,
                col: 2,
                rows: 1,
                cols: 3
            })
        );
        assert!(check_bounds((0, 3), (1, 3)).is_err());
    }
}
