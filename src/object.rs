//! Typed aggregates produced by the progressive creator

use crate::error::Error;
use crate::page::MemoryPage;
use crate::types::{Scalar, TypeDescriptor};

/// Dynamic shape of a [`TypedObject`].
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde-types", derive(serde::Serialize, serde::Deserialize))]
pub enum Shape {
    Scalar,
    Vector(usize),
    Matrix { rows: usize, cols: usize },
    /// Matrix whose rows do not share a common length; the vector holds the
    /// length of each row.
    Sparse(Vec<usize>),
}

impl Shape {
    /// Total element count.
    pub fn len(&self) -> usize {
        match self {
            Shape::Scalar => 1,
            Shape::Vector(n) => *n,
            Shape::Matrix { rows, cols } => rows * cols,
            Shape::Sparse(rows) => rows.iter().sum(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of rows; scalars and vectors count as one row.
    pub fn rows(&self) -> usize {
        match self {
            Shape::Scalar | Shape::Vector(_) => 1,
            Shape::Matrix { rows, .. } => *rows,
            Shape::Sparse(rows) => rows.len(),
        }
    }

    /// Length of row `row`, if it exists.
    pub fn row_len(&self, row: usize) -> Option<usize> {
        match self {
            Shape::Scalar => (row == 0).then_some(1),
            Shape::Vector(n) => (row == 0).then_some(*n),
            Shape::Matrix { rows, cols } => (row < *rows).then_some(*cols),
            Shape::Sparse(rows) => rows.get(row).copied(),
        }
    }

    /// Position of `(row, col)` in the element sequence.
    fn flat_index(&self, row: usize, col: usize) -> Option<usize> {
        if col >= self.row_len(row)? {
            return None;
        }
        let skipped = match self {
            Shape::Scalar | Shape::Vector(_) => 0,
            Shape::Matrix { cols, .. } => row * cols,
            Shape::Sparse(rows) => rows[..row].iter().sum(),
        };
        Some(skipped + col)
    }
}

/// A typed aggregate owning the paged storage it was built in.
///
/// The pages hold the element payload in allocation order; rows never
/// straddle a page boundary. Accessors copy values out, which keeps the
/// byte-oriented page storage free of alignment obligations.
pub struct TypedObject {
    element_type: TypeDescriptor,
    shape: Shape,
    pages: MemoryPage,
    /// For string payloads: one `(page, offset, byte length)` entry per
    /// element, in element order.
    string_index: Vec<(usize, usize, usize)>,
}

impl TypedObject {
    pub(crate) fn new(
        element_type: TypeDescriptor,
        shape: Shape,
        pages: MemoryPage,
        string_index: Vec<(usize, usize, usize)>,
    ) -> Self {
        Self {
            element_type,
            shape,
            pages,
            string_index,
        }
    }

    pub fn element_type(&self) -> TypeDescriptor {
        self.element_type
    }

    pub fn shape(&self) -> &Shape {
        &self.shape
    }

    /// Total element count.
    pub fn len(&self) -> usize {
        self.shape.len()
    }

    pub fn is_empty(&self) -> bool {
        self.shape.is_empty()
    }

    /// The single element of a scalar-shaped object.
    pub fn scalar<T: Scalar>(&self) -> Result<T, Error> {
        if self.shape != Shape::Scalar {
            return Err(Error::invalid_operation("object is not a scalar"));
        }
        self.element(0, 0)
    }

    /// Element at `(row, col)`. Scalars and vectors live in row 0.
    pub fn element<T: Scalar>(&self, row: usize, col: usize) -> Result<T, Error> {
        if T::DESCRIPTOR != self.element_type {
            return Err(Error::parameters(format!(
                "object holds {}, not {}",
                self.element_type,
                T::DESCRIPTOR
            )));
        }
        let index = self
            .shape
            .flat_index(row, col)
            .ok_or_else(|| Error::parameters(format!("no element at ({row},{col})")))?;
        let bytes = self
            .fixed_element_bytes(index, T::SIZE)
            .ok_or_else(|| Error::internal_setup("element storage is shorter than the shape"))?;
        Ok(T::load(bytes))
    }

    /// Row `row` copied out of the paged storage.
    pub fn row<T: Scalar>(&self, row: usize) -> Result<Vec<T>, Error> {
        let len = self
            .shape
            .row_len(row)
            .ok_or_else(|| Error::parameters(format!("no row {row}")))?;
        (0..len).map(|col| self.element(row, col)).collect()
    }

    /// String element at `(row, col)` of a string-typed object.
    pub fn string_element(&self, row: usize, col: usize) -> Result<&str, Error> {
        if self.element_type.is_numeric() {
            return Err(Error::parameters(format!(
                "object holds {}, not strings",
                self.element_type
            )));
        }
        let index = self
            .shape
            .flat_index(row, col)
            .ok_or_else(|| Error::parameters(format!("no element at ({row},{col})")))?;
        let (page, offset, len) = *self
            .string_index
            .get(index)
            .ok_or_else(|| Error::internal_setup("string index is shorter than the shape"))?;
        let bytes = self
            .pages
            .page(page)
            .and_then(|data| data.get(offset..offset + len))
            .ok_or_else(|| Error::internal_setup("string storage is shorter than its index"))?;
        std::str::from_utf8(bytes)
            .map_err(|_| Error::internal_setup("string element is not valid UTF-8"))
    }

    /// Locates fixed-width element `index` by walking the page chain.
    fn fixed_element_bytes(&self, index: usize, size: usize) -> Option<&[u8]> {
        let mut remaining = index;
        for page in self.pages.iter() {
            let elements = page.len() / size;
            if remaining < elements {
                let offset = remaining * size;
                return page.get(offset..offset + size);
            }
            remaining -= elements;
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shape_flat_indexing() {
        let matrix = Shape::Matrix { rows: 2, cols: 3 };
        assert_eq!(matrix.flat_index(0, 0), Some(0));
        assert_eq!(matrix.flat_index(1, 2), Some(5));
        assert_eq!(matrix.flat_index(2, 0), None);
        assert_eq!(matrix.flat_index(0, 3), None);

        let sparse = Shape::Sparse(vec![3, 2]);
        assert_eq!(sparse.len(), 5);
        assert_eq!(sparse.flat_index(1, 1), Some(4));
        assert_eq!(sparse.flat_index(1, 2), None);
        assert_eq!(sparse.row_len(1), Some(2));
    }

    #[test]
    fn elements_span_the_page_chain() {
        let mut pages = MemoryPage::new(8);
        // two pages of two u32 elements each, in allocation order after flip
        for value in [1u32, 2, 3, 4] {
            pages.push_bytes(&value.to_le_bytes());
        }
        pages.flip();

        let object = TypedObject::new(
            TypeDescriptor::UINT32,
            Shape::Vector(4),
            pages,
            Vec::new(),
        );
        for (i, expected) in [1u32, 2, 3, 4].into_iter().enumerate() {
            assert_eq!(object.element::<u32>(0, i).unwrap(), expected);
        }
        assert!(object.element::<u32>(0, 4).is_err());
        assert!(object.element::<i32>(0, 0).is_err());
    }
}
