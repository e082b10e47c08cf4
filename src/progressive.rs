//! Streaming construction of typed aggregates

use crate::consts::DEFAULT_PAGE_SIZE;
use crate::conv::parse_literal;
use crate::error::Error;
use crate::object::{Shape, TypedObject};
use crate::page::MemoryPage;
use crate::types::{TypeDescriptor, TypeKind};

use tracing::debug;

/// Where the creator stands in the shape it has observed so far.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    NotStarted,
    /// Type fixed, no element yet.
    Started,
    /// One element, current row still open.
    Scalar,
    /// Several elements, current row still open.
    Vector,
    /// First row closed.
    VectorEnd,
    /// Element added to a later row; all closed rows share a length.
    MatrixRow,
    /// Later row closed; all closed rows share a length.
    MatrixRowEnd,
    /// Element added to a later row after a length mismatch.
    SparseMatrixRow,
    /// Later row closed after a length mismatch.
    SparseMatrixRowEnd,
    FinishedScalar,
    FinishedVector,
    FinishedMatrix,
    FinishedSparse,
    /// A failure happened; only `clean` or `start` recover.
    Error,
}

/// Streaming builder fed by a parser that deposits scalars one at a time
/// without knowing the final shape.
///
/// The result grows from scalar through vector and matrix to sparse matrix
/// as elements and row terminators arrive; [`end`] closes the builder and
/// [`get_reference`] hands the accumulated pages over as a [`TypedObject`].
/// Pages are released on drop through the arena's own teardown, so an
/// abandoned builder leaks nothing.
///
/// [`end`]: ProgressiveTypeCreator::end
/// [`get_reference`]: ProgressiveTypeCreator::get_reference
pub struct ProgressiveTypeCreator {
    state: State,
    element_type: TypeDescriptor,
    is_string: bool,
    /// Bytes of one element; zero for variable-width payloads.
    object_size: usize,
    default_page_size: usize,
    page: MemoryPage,
    string_index: Vec<(usize, usize, usize)>,
    /// Length of every closed row, kept once rows stop agreeing.
    size_stack: Vec<u32>,
    /// Length the first row fixed for all rows of a dense matrix.
    vector_size: u32,
    /// Closed rows so far.
    matrix_row_size: u32,
    /// Elements in the row currently open.
    current_vector_size: u32,
    /// Elements over all rows.
    number_of_elements: u64,
}

impl Default for ProgressiveTypeCreator {
    fn default() -> Self {
        Self::new(DEFAULT_PAGE_SIZE)
    }
}

impl ProgressiveTypeCreator {
    /// Builder whose pages default to `page_size` bytes.
    pub fn new(page_size: usize) -> Self {
        Self {
            state: State::NotStarted,
            element_type: TypeDescriptor::INVALID,
            is_string: false,
            object_size: 0,
            default_page_size: page_size.max(1),
            page: MemoryPage::new(page_size),
            string_index: Vec::new(),
            size_stack: Vec::new(),
            vector_size: 0,
            matrix_row_size: 0,
            current_vector_size: 0,
            number_of_elements: 0,
        }
    }

    /// The page size new pages are opened with.
    pub const fn default_page_size(&self) -> usize {
        self.default_page_size
    }

    /// Elements accepted so far.
    pub const fn number_of_elements(&self) -> u64 {
        self.number_of_elements
    }

    /// Fixes the payload type and readies the builder. Callable from the
    /// pristine and error states; use [`clean`](Self::clean) to abandon a
    /// build in progress.
    pub fn start(&mut self, element_type: TypeDescriptor) -> Result<(), Error> {
        if !matches!(self.state, State::NotStarted | State::Error) {
            return Err(Error::invalid_operation(
                "start is only callable before building or after an error",
            ));
        }
        let is_string = matches!(
            element_type.kind(),
            TypeKind::CString | TypeKind::DynamicString | TypeKind::ManagedString
        );
        if !is_string && !element_type.is_numeric() {
            return Err(Error::unsupported_feature(format!(
                "cannot build aggregates of {element_type}"
            )));
        }
        self.clean();
        self.state = State::Started;
        self.element_type = element_type;
        self.is_string = is_string;
        self.object_size = element_type.storage_size();
        Ok(())
    }

    /// Frees the pages and resets to the pristine state. Works from any
    /// state.
    pub fn clean(&mut self) {
        self.page = MemoryPage::new(self.default_page_size);
        self.string_index.clear();
        self.size_stack.clear();
        self.state = State::NotStarted;
        self.element_type = TypeDescriptor::INVALID;
        self.is_string = false;
        self.object_size = 0;
        self.vector_size = 0;
        self.matrix_row_size = 0;
        self.current_vector_size = 0;
        self.number_of_elements = 0;
    }

    /// Parses one element into the paged storage and grows the observed
    /// shape. A failure moves the builder to the error state.
    pub fn add_element(&mut self, token: &str) -> Result<(), Error> {
        let next = match self.state {
            State::Started => State::Scalar,
            State::Scalar | State::Vector => State::Vector,
            State::VectorEnd | State::MatrixRowEnd => State::MatrixRow,
            State::MatrixRow => State::MatrixRow,
            State::SparseMatrixRow | State::SparseMatrixRowEnd => State::SparseMatrixRow,
            _ => {
                return Err(self.fail(Error::invalid_operation(
                    "add_element is only callable while building",
                )))
            }
        };
        let new_row = matches!(
            self.state,
            State::Started | State::VectorEnd | State::MatrixRowEnd | State::SparseMatrixRowEnd
        );

        let stored = if self.is_string {
            self.store_string(token, new_row)
        } else {
            self.store_fixed(token, new_row)
        };
        if let Err(error) = stored {
            return Err(self.fail(error));
        }

        self.state = next;
        self.current_vector_size += 1;
        self.number_of_elements += 1;

        // a row growing past the established width turns the matrix sparse
        if self.state == State::MatrixRow && self.current_vector_size > self.vector_size {
            for _ in 0..self.matrix_row_size {
                self.size_stack.push(self.vector_size);
            }
            self.state = State::SparseMatrixRow;
            debug!(rows = self.matrix_row_size, "matrix turned sparse");
        }
        Ok(())
    }

    /// Closes the row currently open.
    pub fn end_vector(&mut self) -> Result<(), Error> {
        match self.state {
            State::Scalar | State::Vector => {
                self.vector_size = self.current_vector_size;
                self.matrix_row_size = 1;
                self.state = State::VectorEnd;
            }
            State::MatrixRow => {
                if self.current_vector_size == self.vector_size {
                    self.matrix_row_size += 1;
                    self.state = State::MatrixRowEnd;
                } else {
                    // shorter row: remember every length seen so far
                    for _ in 0..self.matrix_row_size {
                        self.size_stack.push(self.vector_size);
                    }
                    self.size_stack.push(self.current_vector_size);
                    self.matrix_row_size += 1;
                    self.state = State::SparseMatrixRowEnd;
                }
            }
            State::SparseMatrixRow => {
                self.size_stack.push(self.current_vector_size);
                self.matrix_row_size += 1;
                self.state = State::SparseMatrixRowEnd;
            }
            _ => {
                return Err(self.fail(Error::invalid_operation(
                    "end_vector without an open row",
                )))
            }
        }
        self.current_vector_size = 0;
        Ok(())
    }

    /// Closes the builder into the finished state matching the shape
    /// observed. An unterminated row is closed implicitly.
    pub fn end(&mut self) -> Result<(), Error> {
        if matches!(self.state, State::MatrixRow | State::SparseMatrixRow) {
            self.end_vector()?;
        }
        self.state = match self.state {
            State::Scalar => State::FinishedScalar,
            State::Vector => {
                self.vector_size = self.current_vector_size;
                State::FinishedVector
            }
            State::VectorEnd => State::FinishedVector,
            State::MatrixRowEnd => State::FinishedMatrix,
            State::SparseMatrixRowEnd => State::FinishedSparse,
            _ => {
                return Err(self.fail(Error::invalid_operation(
                    "end is only callable on a non-empty build",
                )))
            }
        };

        let consistent = match self.state {
            State::FinishedScalar => self.number_of_elements == 1,
            State::FinishedVector => self.number_of_elements == u64::from(self.vector_size),
            State::FinishedMatrix => {
                self.number_of_elements
                    == u64::from(self.vector_size) * u64::from(self.matrix_row_size)
            }
            State::FinishedSparse => {
                self.number_of_elements
                    == self.size_stack.iter().map(|&s| u64::from(s)).sum::<u64>()
            }
            _ => true,
        };
        if !consistent {
            return Err(self.fail(Error::internal_setup(
                "element count does not match the observed shape",
            )));
        }

        self.page.trim();
        self.page.flip();
        Ok(())
    }

    /// Hands the built aggregate over, transferring page ownership, and
    /// resets the builder. Callable only in a finished state.
    pub fn get_reference(&mut self) -> Result<TypedObject, Error> {
        let shape = match self.state {
            State::FinishedScalar => Shape::Scalar,
            State::FinishedVector => Shape::Vector(self.vector_size as usize),
            State::FinishedMatrix => Shape::Matrix {
                rows: self.matrix_row_size as usize,
                cols: self.vector_size as usize,
            },
            State::FinishedSparse => {
                Shape::Sparse(self.size_stack.iter().map(|&s| s as usize).collect())
            }
            _ => return Err(Error::invalid_operation("object construction not finished")),
        };
        let pages = std::mem::take(&mut self.page);
        let index = std::mem::take(&mut self.string_index);
        let object = TypedObject::new(self.element_type, shape, pages, index);
        self.clean();
        Ok(object)
    }

    fn fail(&mut self, error: Error) -> Error {
        self.state = State::Error;
        error
    }

    /// Makes room for `needed` bytes: a fresh page at a row boundary, an
    /// enlarged current page mid-row. Rows therefore never straddle pages.
    fn make_room(&mut self, needed: usize, new_row: bool) {
        if self.page.fits(needed) {
            return;
        }
        if new_row || self.page.page_count() == 0 {
            self.page.seal();
        } else {
            let capacity = self.page.capacity();
            self.page.grow((capacity * 2).max(capacity + needed));
        }
    }

    fn store_fixed(&mut self, token: &str, new_row: bool) -> Result<(), Error> {
        let mut buf = [0u8; 8];
        parse_literal(self.element_type, token, &mut buf)?;
        self.make_room(self.object_size, new_row);
        self.page.push_bytes(&buf[..self.object_size]);
        Ok(())
    }

    fn store_string(&mut self, token: &str, new_row: bool) -> Result<(), Error> {
        // zero terminator inside the page, excluded from the index length
        let mut bytes = Vec::with_capacity(token.len() + 1);
        bytes.extend_from_slice(token.as_bytes());
        bytes.push(0);
        self.make_room(bytes.len(), new_row);
        let (page, offset) = self.page.push_bytes(&bytes);
        self.string_index.push((page, offset, token.len()));
        Ok(())
    }
}

impl Drop for ProgressiveTypeCreator {
    fn drop(&mut self) {
        self.clean();
    }
}
