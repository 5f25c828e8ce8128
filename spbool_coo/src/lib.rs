use itertools::Itertools;
use nom::{Finish, IResult};
#[cfg(any(test, feature = "proptest-arbitrary"))]
use proptest::prelude::*;
use spbool_matrix::{check_bounds, Edge, IndexError, Matrix};
use std::{
    fmt, fs, io,
    path::{Path, PathBuf},
};
use thiserror::Error;


/// Boolean sparse matrix in coordinate form: parallel row and column index arrays.
///
/// Entries keep the order they were pushed in until [`CooMatrix::canonicalize`]
/// is called.
#[derive(Debug, Eq, PartialEq, Clone, Default)]
pub struct CooMatrix {
    nrows: usize,
    ncols: usize,
    rows: Vec<usize>,
    cols: Vec<usize>,
}

impl CooMatrix {
    pub fn new((nrows, ncols): (usize, usize)) -> Self {
        CooMatrix {
            nrows,
            ncols,
            rows: vec![],
            cols: vec![],
        }
    }

    pub fn new_square(n: usize) -> Self {
        Self::new((n, n))
    }

    pub fn from_edges<I: IntoIterator<Item = Edge>>(
        shape: (usize, usize),
        edges: I,
    ) -> Result<Self, IndexError> {
        let mut m = Self::new(shape);
        for edge in edges {
            m.push(edge)?;
        }
        Ok(m)
    }

    pub fn push(&mut self, (i, j): Edge) -> Result<(), IndexError> {
        check_bounds((i, j), (self.nrows, self.ncols))?;
        self.rows.push(i);
        self.cols.push(j);
        Ok(())
    }

    pub fn nrows(&self) -> usize {
        self.nrows
    }

    pub fn ncols(&self) -> usize {
        self.ncols
    }

    pub fn nvals(&self) -> usize {
        self.rows.len()
    }

    pub fn rows(&self) -> &[usize] {
        &self.rows
    }

    pub fn cols(&self) -> &[usize] {
        &self.cols
    }

    pub fn edges(&self) -> impl Iterator<Item = Edge> + '_ {
        self.rows.iter().copied().zip(self.cols.iter().copied())
    }

    /// Appends the mirrored `(j, i)` of every off-diagonal entry `(i, j)`.
    ///
    /// # Panics
    ///
    /// Panics if the matrix is not square.
    pub fn symmetrize(&mut self) {
        assert_eq!(self.nrows, self.ncols, "only square matrices can be symmetrized");
        let mirrored: Vec<_> = self.edges().filter(|(i, j)| i != j).collect();
        for (i, j) in mirrored {
            self.rows.push(j);
            self.cols.push(i);
        }
    }

    /// Sorts entries by `(row, col)` and drops duplicates.
    pub fn canonicalize(&mut self) {
        let mut edges: Vec<_> = self.edges().collect();
        edges.sort_unstable();
        edges.dedup();
        let (rows, cols): (Vec<_>, Vec<_>) = edges.into_iter().unzip();
        self.rows = rows;
        self.cols = cols;
    }

    pub fn is_canonical(&self) -> bool {
        self.edges().tuple_windows().all(|(a, b)| a < b)
    }
}

impl Matrix for CooMatrix {
    fn invariants(&self) -> bool {
        self.rows.len() == self.cols.len()
            && self
                .edges()
                .all(|e| check_bounds(e, (self.nrows, self.ncols)).is_ok())
    }

    fn num_rows(&self) -> usize {
        self.nrows
    }

    fn num_cols(&self) -> usize {
        self.ncols
    }

    fn num_nonzeros(&self) -> usize {
        self.nvals()
    }
}

#[cfg(any(test, feature = "proptest-arbitrary"))]
impl CooMatrix {
    pub fn arb_square_matrix(n: usize) -> impl Strategy<Value = Self> {
        spbool_matrix::proptest::arb_edges(n, n).prop_map(move |edges| {
            CooMatrix::from_edges((n, n), edges).expect("generated edges are in bounds")
        })
    }

    pub fn arb_matrix() -> impl Strategy<Value = Self> {
        spbool_matrix::proptest::arb_matrix(Self::arb_square_matrix)
    }
}

#[derive(Error, Debug)]
pub enum FromMatrixMarketError {
    #[error("parsing error ({:?})", .0.code)]
    Nom(#[from] nom::error::Error<String>),
    #[error("number of rows or columns is 0")]
    HasZeroDimension,
    #[error("{rows}x{cols} matrix is too large")]
    TooLarge { rows: usize, cols: usize },
    #[error("matrix market indices are 1-based, found index 0")]
    ZeroIndex,
    #[error(transparent)]
    IndexOutOfBounds(#[from] IndexError),
}

/// Parses a Matrix Market coordinate file into a canonical boolean [`CooMatrix`].
///
/// Only the sparsity pattern is kept: values are read so that explicit zeros can be
/// skipped, then discarded. Symmetric shapes, and every shape when `undirected` is
/// set, get their off-diagonal entries mirrored. The output is sorted by
/// `(row, col)` without duplicates.
pub fn parse_matrix_market(input: &str, undirected: bool) -> Result<CooMatrix, FromMatrixMarketError> {
    #[derive(Clone, Copy)]
    enum Field {
        Pattern,
        Integer,
        Real,
        Complex,
    }

    #[derive(Clone, Copy)]
    enum Shape {
        General,
        Symmetric,
    }

    // (row, col, is the stored value nonzero)
    type RawEntry = (usize, usize, bool);

    fn inner(input: &str) -> IResult<&str, (usize, usize, Shape, Vec<RawEntry>)> {
        use nom::{
            branch::alt,
            bytes::complete::{tag, tag_no_case},
            character::complete::{char, digit1, line_ending, multispace0, not_line_ending, space0, space1},
            combinator::{eof, map, map_res, opt, recognize, value},
            multi::{fold_many0, many0},
            number::complete::recognize_float,
            sequence::{delimited, pair, preceded, terminated, tuple},
        };

        fn recognize_int(input: &str) -> IResult<&str, &str> {
            recognize(pair(opt(alt((char('-'), char('+')))), digit1))(input)
        }
        fn parse_usize(input: &str) -> IResult<&str, usize> {
            map_res(digit1, str::parse)(input)
        }
        fn parse_float(input: &str) -> IResult<&str, f64> {
            map_res(recognize_float, str::parse)(input)
        }
        fn end_of_line(input: &str) -> IResult<&str, &str> {
            preceded(space0, alt((line_ending, eof)))(input)
        }
        fn matrix_size(input: &str) -> IResult<&str, (usize, usize)> {
            map(
                tuple((
                    preceded(space0, parse_usize),
                    preceded(space1, parse_usize),
                    preceded(space1, parse_usize),
                    end_of_line,
                )),
                |(r, c, _, _)| (r, c),
            )(input)
        }
        fn nonzero(field: Field) -> impl FnMut(&str) -> IResult<&str, bool> {
            move |input| match field {
                Field::Pattern => Ok((input, true)),
                Field::Integer => map(
                    preceded(space1, map_res(recognize_int, str::parse::<i64>)),
                    |t| t != 0,
                )(input),
                Field::Real => map(preceded(space1, parse_float), |t| t != 0.0)(input),
                Field::Complex => map(
                    pair(preceded(space1, parse_float), preceded(space1, parse_float)),
                    |(re, im)| re != 0.0 || im != 0.0,
                )(input),
            }
        }

        // parse header
        let (input, _) = tag("%%MatrixMarket")(input)?;
        let (input, _) = preceded(space1, tag_no_case("matrix"))(input)?;
        let (input, _) = preceded(space1, tag_no_case("coordinate"))(input)?;
        let (input, field) = preceded(
            space1,
            alt((
                value(Field::Pattern, tag_no_case("pattern")),
                value(Field::Integer, tag_no_case("integer")),
                value(Field::Real, tag_no_case("real")),
                value(Field::Complex, tag_no_case("complex")),
            )),
        )(input)?;
        // the sparsity pattern of skew-symmetric and hermitian matrices is symmetric
        let (input, shape) = delimited(
            space1,
            alt((
                value(Shape::General, tag_no_case("general")),
                value(Shape::Symmetric, tag_no_case("symmetric")),
                value(Shape::Symmetric, tag_no_case("skew-symmetric")),
                value(Shape::Symmetric, tag_no_case("hermitian")),
            )),
            end_of_line,
        )(input)?;
        // parse comments
        let (input, _) = many0(delimited(char('%'), not_line_ending, line_ending))(input)?;
        let (input, (rows, cols)) = matrix_size(input)?;

        let (input, entries) = fold_many0(
            map(
                tuple((
                    preceded(space0, parse_usize),
                    preceded(space1, parse_usize),
                    nonzero(field),
                    end_of_line,
                )),
                |(r, c, nz, _)| (r, c, nz),
            ),
            Vec::new,
            |mut entries, entry| {
                entries.push(entry);
                entries
            },
        )(input)?;
        let (input, _) = terminated(multispace0, eof)(input)?;
        Ok((input, (rows, cols, shape, entries)))
    }

    let (_, (rows, cols, shape, entries)) =
        inner(input)
            .finish()
            .map_err(|nom::error::Error { input, code }| nom::error::Error {
                input: input.to_string(),
                code,
            })?;
    if rows == 0 || cols == 0 {
        return Err(FromMatrixMarketError::HasZeroDimension);
    }
    // the row pointer of the CSR form holds rows + 1 entries
    if rows == usize::MAX {
        return Err(FromMatrixMarketError::TooLarge { rows, cols });
    }

    let mut m = CooMatrix::new((rows, cols));
    for (r, c, nz) in entries {
        if r == 0 || c == 0 {
            return Err(FromMatrixMarketError::ZeroIndex);
        }
        if nz {
            // matrix market format is 1-indexed, but our matrix is 0-indexed
            m.push((r - 1, c - 1))?;
        }
    }
    if matches!(shape, Shape::Symmetric) || undirected {
        if m.nrows() != m.ncols() {
            log::warn!(
                "cannot mirror entries of a non-square {}x{} matrix",
                m.nrows(),
                m.ncols()
            );
        } else {
            m.symmetrize();
        }
    }
    m.canonicalize();
    Ok(m)
}

pub fn into_matrix_market<W: fmt::Write>(m: &CooMatrix, w: &mut W) -> fmt::Result {
    writeln!(w, "%%MatrixMarket matrix coordinate pattern general")?;
    writeln!(w, "{} {} {}", m.nrows(), m.ncols(), m.nvals())?;
    for (i, j) in m.edges() {
        writeln!(w, "{} {}", i + 1, j + 1)?;
    }
    Ok(())
}

#[derive(Error, Debug)]
pub enum LoadError {
    #[error("failed to read {}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to parse {}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: FromMatrixMarketError,
    },
}

/// Reads and parses a Matrix Market file, see [`parse_matrix_market`].
pub fn load_matrix<P: AsRef<Path>>(path: P, undirected: bool) -> Result<CooMatrix, LoadError> {
    let path = path.as_ref();
    let input = fs::read_to_string(path).map_err(|source| LoadError::Io {
        path: path.to_owned(),
        source,
    })?;
    let m = parse_matrix_market(&input, undirected).map_err(|source| LoadError::Parse {
        path: path.to_owned(),
        source,
    })?;
    log::debug!(
        "loaded {:?}: {}x{} with {} entries (undirected: {})",
        path,
        m.nrows(),
        m.ncols(),
        m.nvals(),
        undirected
    );
    Ok(m)
}
