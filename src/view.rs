//! Dynamic-rank strided views over borrowed slices.
//!
//! [`StridedSlice`] and [`StridedSliceMut`] are the generic strided-array
//! adapters for the buffer protocol: any borrowed slice plus dims, signed
//! element strides, and a starting offset becomes a queryable buffer. Their
//! [`Buffer`] implementations supply the default accessor derivations
//! (pointer to the logical first element, byte stride = element stride ×
//! item size, read-only from the view's mutability) and their [`AsBuffer`]
//! implementations yield the view itself as the token.

use std::sync::Arc;

use crate::buffer::{AsBuffer, Buffer};
use crate::element::Element;
use crate::format::compile_format;
use crate::{BufferError, Result};

// ============================================================================
// Validation helpers
// ============================================================================

/// Validate that all accessed offsets stay within `[0, len)`.
fn validate_bounds(len: usize, dims: &[usize], strides: &[isize], offset: isize) -> Result<()> {
    if dims.len() != strides.len() {
        return Err(BufferError::StrideLengthMismatch);
    }
    // Empty view: no element is ever addressed.
    if dims.iter().any(|&d| d == 0) {
        return Ok(());
    }
    let mut min_offset = offset;
    let mut max_offset = offset;
    for (&dim, &stride) in dims.iter().zip(strides.iter()) {
        if dim > 1 {
            let end = stride
                .checked_mul(dim as isize - 1)
                .ok_or(BufferError::OffsetOverflow)?;
            if end >= 0 {
                max_offset = max_offset
                    .checked_add(end)
                    .ok_or(BufferError::OffsetOverflow)?;
            } else {
                min_offset = min_offset
                    .checked_add(end)
                    .ok_or(BufferError::OffsetOverflow)?;
            }
        }
    }
    if min_offset < 0 || max_offset < 0 {
        return Err(BufferError::OffsetOverflow);
    }
    if max_offset as usize >= len {
        return Err(BufferError::OffsetOverflow);
    }
    Ok(())
}

/// Row-major element strides (last index varies fastest).
pub fn row_major_strides(dims: &[usize]) -> Vec<isize> {
    let rank = dims.len();
    if rank == 0 {
        return vec![];
    }
    let mut strides = vec![1isize; rank];
    for i in (0..rank - 1).rev() {
        strides[i] = strides[i + 1] * dims[i + 1] as isize;
    }
    strides
}

/// Column-major element strides (first index varies fastest).
pub fn col_major_strides(dims: &[usize]) -> Vec<isize> {
    let rank = dims.len();
    if rank == 0 {
        return vec![];
    }
    let mut strides = vec![1isize; rank];
    for i in 1..rank {
        strides[i] = strides[i - 1] * dims[i - 1] as isize;
    }
    strides
}

fn element_offset(dims: &[usize], strides: &[isize], offset: isize, idx: &[usize]) -> isize {
    assert_eq!(idx.len(), dims.len(), "index rank mismatch");
    let mut at = offset;
    for axis in 0..dims.len() {
        assert!(idx[axis] < dims[axis], "index out of bounds on axis {axis}");
        at += idx[axis] as isize * strides[axis];
    }
    at
}

// ============================================================================
// StridedSlice
// ============================================================================

/// Read-only dynamic-rank strided view over a borrowed slice.
///
/// Strides are in elements and may be negative; `offset` is the element
/// index of the logical first element `(0, ..., 0)`. Construction validates
/// that every addressable element stays inside the slice.
pub struct StridedSlice<'a, T> {
    ptr: *const T,
    data: &'a [T],
    dims: Arc<[usize]>,
    strides: Arc<[isize]>,
    offset: isize,
}

unsafe impl<T: Sync> Send for StridedSlice<'_, T> {}
unsafe impl<T: Sync> Sync for StridedSlice<'_, T> {}

impl<T> Clone for StridedSlice<'_, T> {
    fn clone(&self) -> Self {
        Self {
            ptr: self.ptr,
            data: self.data,
            dims: self.dims.clone(),
            strides: self.strides.clone(),
            offset: self.offset,
        }
    }
}

impl<T> std::fmt::Debug for StridedSlice<'_, T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StridedSlice")
            .field("dims", &self.dims)
            .field("strides", &self.strides)
            .field("offset", &self.offset)
            .finish()
    }
}

impl<'a, T> StridedSlice<'a, T> {
    /// Create a validated view.
    pub fn new(data: &'a [T], dims: &[usize], strides: &[isize], offset: isize) -> Result<Self> {
        validate_bounds(data.len(), dims, strides, offset)?;
        let ptr = unsafe { data.as_ptr().offset(offset) };
        Ok(Self {
            ptr,
            data,
            dims: Arc::from(dims),
            strides: Arc::from(strides),
            offset,
        })
    }

    /// Create a view without bounds checking.
    ///
    /// # Safety
    /// Every index combination in `dims` must address an element inside
    /// `data`.
    pub unsafe fn new_unchecked(
        data: &'a [T],
        dims: &[usize],
        strides: &[isize],
        offset: isize,
    ) -> Self {
        let ptr = data.as_ptr().offset(offset);
        Self {
            ptr,
            data,
            dims: Arc::from(dims),
            strides: Arc::from(strides),
            offset,
        }
    }

    /// Densely packed row-major view over the whole slice.
    pub fn contiguous(data: &'a [T], dims: &[usize]) -> Result<Self> {
        let strides = row_major_strides(dims);
        Self::new(data, dims, &strides, 0)
    }

    #[inline]
    pub fn dims(&self) -> &[usize] {
        &self.dims
    }

    #[inline]
    pub fn strides(&self) -> &[isize] {
        &self.strides
    }

    #[inline]
    pub fn offset(&self) -> isize {
        self.offset
    }

    #[inline]
    pub fn ndim(&self) -> usize {
        self.dims.len()
    }

    /// Total number of elements.
    #[inline]
    pub fn len(&self) -> usize {
        self.dims.iter().product()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.dims.iter().any(|&d| d == 0)
    }

    /// Pointer to the logical first element.
    #[inline]
    pub fn as_ptr(&self) -> *const T {
        self.ptr
    }

    /// Whether the view is packed row-major with no gaps.
    pub fn is_contiguous(&self) -> bool {
        let mut expected = 1isize;
        for axis in (0..self.ndim()).rev() {
            if self.dims[axis] <= 1 {
                continue;
            }
            if self.strides[axis] != expected {
                return false;
            }
            expected *= self.dims[axis] as isize;
        }
        true
    }
}

impl<T: Copy> StridedSlice<'_, T> {
    /// Element at the given multi-dimensional index.
    ///
    /// # Panics
    /// Panics if the index rank or any coordinate is out of range.
    pub fn get(&self, idx: &[usize]) -> T {
        let at = element_offset(&self.dims, &self.strides, self.offset, idx);
        self.data[at as usize]
    }
}

impl<T: Element> Buffer for StridedSlice<'_, T> {
    #[inline]
    fn buf_ptr(&self) -> *const u8 {
        self.ptr as *const u8
    }

    #[inline]
    fn readonly(&self) -> bool {
        true
    }

    #[inline]
    fn item_size(&self) -> usize {
        std::mem::size_of::<T>()
    }

    fn format(&self) -> Result<String> {
        compile_format(&T::layout())
    }

    #[inline]
    fn ndim(&self) -> usize {
        self.dims.len()
    }

    #[inline]
    fn dim(&self, axis: usize) -> usize {
        self.dims[axis]
    }

    #[inline]
    fn byte_stride(&self, axis: usize) -> isize {
        self.strides[axis] * std::mem::size_of::<T>() as isize
    }
}

impl<T: Element> AsBuffer for StridedSlice<'_, T> {
    fn query_buffer(&self) -> Option<&dyn Buffer> {
        if element_is_describable::<T>() {
            Some(self)
        } else {
            None
        }
    }
}

// ============================================================================
// StridedSliceMut
// ============================================================================

/// Mutable dynamic-rank strided view over a borrowed slice.
pub struct StridedSliceMut<'a, T> {
    data: &'a mut [T],
    dims: Arc<[usize]>,
    strides: Arc<[isize]>,
    offset: isize,
}

unsafe impl<T: Send> Send for StridedSliceMut<'_, T> {}
unsafe impl<T: Sync> Sync for StridedSliceMut<'_, T> {}

impl<T> std::fmt::Debug for StridedSliceMut<'_, T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StridedSliceMut")
            .field("dims", &self.dims)
            .field("strides", &self.strides)
            .field("offset", &self.offset)
            .finish()
    }
}

impl<'a, T> StridedSliceMut<'a, T> {
    /// Create a validated mutable view.
    pub fn new(
        data: &'a mut [T],
        dims: &[usize],
        strides: &[isize],
        offset: isize,
    ) -> Result<Self> {
        validate_bounds(data.len(), dims, strides, offset)?;
        Ok(Self {
            data,
            dims: Arc::from(dims),
            strides: Arc::from(strides),
            offset,
        })
    }

    /// Densely packed row-major mutable view over the whole slice.
    pub fn contiguous(data: &'a mut [T], dims: &[usize]) -> Result<Self> {
        let strides = row_major_strides(dims);
        Self::new(data, dims, &strides, 0)
    }

    #[inline]
    pub fn dims(&self) -> &[usize] {
        &self.dims
    }

    #[inline]
    pub fn strides(&self) -> &[isize] {
        &self.strides
    }

    #[inline]
    pub fn offset(&self) -> isize {
        self.offset
    }

    #[inline]
    pub fn ndim(&self) -> usize {
        self.dims.len()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.dims.iter().product()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.dims.iter().any(|&d| d == 0)
    }

    /// Pointer to the logical first element.
    #[inline]
    pub fn as_ptr(&self) -> *const T {
        unsafe { self.data.as_ptr().offset(self.offset) }
    }

    /// Mutable pointer to the logical first element.
    #[inline]
    pub fn as_mut_ptr(&mut self) -> *mut T {
        unsafe { self.data.as_mut_ptr().offset(self.offset) }
    }

    /// Reborrow as a read-only view.
    pub fn as_view(&self) -> StridedSlice<'_, T> {
        StridedSlice {
            ptr: self.as_ptr(),
            data: &self.data[..],
            dims: self.dims.clone(),
            strides: self.strides.clone(),
            offset: self.offset,
        }
    }
}

impl<T: Copy> StridedSliceMut<'_, T> {
    /// Element at the given multi-dimensional index.
    ///
    /// # Panics
    /// Panics if the index rank or any coordinate is out of range.
    pub fn get(&self, idx: &[usize]) -> T {
        let at = element_offset(&self.dims, &self.strides, self.offset, idx);
        self.data[at as usize]
    }

    /// Store `value` at the given multi-dimensional index.
    ///
    /// # Panics
    /// Panics if the index rank or any coordinate is out of range.
    pub fn set(&mut self, idx: &[usize], value: T) {
        let at = element_offset(&self.dims, &self.strides, self.offset, idx);
        self.data[at as usize] = value;
    }
}

impl<T: Element> Buffer for StridedSliceMut<'_, T> {
    #[inline]
    fn buf_ptr(&self) -> *const u8 {
        self.as_ptr() as *const u8
    }

    #[inline]
    fn readonly(&self) -> bool {
        false
    }

    #[inline]
    fn item_size(&self) -> usize {
        std::mem::size_of::<T>()
    }

    fn format(&self) -> Result<String> {
        compile_format(&T::layout())
    }

    #[inline]
    fn ndim(&self) -> usize {
        self.dims.len()
    }

    #[inline]
    fn dim(&self, axis: usize) -> usize {
        self.dims[axis]
    }

    #[inline]
    fn byte_stride(&self, axis: usize) -> isize {
        self.strides[axis] * std::mem::size_of::<T>() as isize
    }
}

impl<T: Element> AsBuffer for StridedSliceMut<'_, T> {
    fn query_buffer(&self) -> Option<&dyn Buffer> {
        if element_is_describable::<T>() {
            Some(self)
        } else {
            None
        }
    }
}

/// Gate for the adapter's buffer capability: the declared layout must be
/// eligible and must cover exactly one Rust element. A misdeclared
/// [`Element`] impl degrades to "not a buffer" rather than a descriptor
/// that misstates the layout.
fn element_is_describable<T: Element>() -> bool {
    let layout = T::layout();
    layout.is_eligible() && layout.size() == std::mem::size_of::<T>()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::{Aggregate, Field, Primitive, TypeLayout};

    #[test]
    fn test_new_validates_bounds() {
        let data = vec![0.0f64; 6];
        assert!(StridedSlice::new(&data, &[2, 3], &[3, 1], 0).is_ok());
        // One element past the end.
        assert!(matches!(
            StridedSlice::new(&data, &[2, 3], &[3, 1], 1),
            Err(BufferError::OffsetOverflow)
        ));
        // Negative reach below zero.
        assert!(matches!(
            StridedSlice::new(&data, &[6], &[-1], 2),
            Err(BufferError::OffsetOverflow)
        ));
        assert!(matches!(
            StridedSlice::new(&data, &[2, 3], &[3], 0),
            Err(BufferError::StrideLengthMismatch)
        ));
    }

    #[test]
    fn test_empty_view_skips_bounds_check() {
        let data: Vec<f64> = vec![];
        let view = StridedSlice::new(&data, &[0, 4], &[4, 1], 0).unwrap();
        assert!(view.is_empty());
        assert_eq!(view.len(), 0);
    }

    #[test]
    fn test_get_row_major() {
        let data: Vec<i32> = (0..6).collect();
        let view = StridedSlice::contiguous(&data, &[2, 3]).unwrap();
        assert_eq!(view.get(&[0, 0]), 0);
        assert_eq!(view.get(&[1, 2]), 5);
        assert!(view.is_contiguous());
    }

    #[test]
    fn test_get_negative_stride() {
        let data: Vec<i32> = (0..5).collect();
        let rev = StridedSlice::new(&data, &[5], &[-1], 4).unwrap();
        assert_eq!(rev.get(&[0]), 4);
        assert_eq!(rev.get(&[4]), 0);
        assert_eq!(rev.as_ptr(), unsafe { data.as_ptr().add(4) });
        assert!(!rev.is_contiguous());
    }

    #[test]
    fn test_stride_helpers() {
        assert_eq!(row_major_strides(&[2, 3, 4]), vec![12, 4, 1]);
        assert_eq!(col_major_strides(&[2, 3, 4]), vec![1, 2, 6]);
        assert_eq!(row_major_strides(&[]), Vec::<isize>::new());
    }

    #[test]
    fn test_mut_view_set_get() {
        let mut data = vec![0i64; 4];
        let mut view = StridedSliceMut::contiguous(&mut data, &[2, 2]).unwrap();
        view.set(&[1, 0], 7);
        assert_eq!(view.get(&[1, 0]), 7);
        assert_eq!(view.as_view().get(&[1, 0]), 7);
        drop(view);
        assert_eq!(data[2], 7);
    }

    #[test]
    fn test_byte_strides_scale_by_item_size() {
        let data = vec![0.0f64; 6];
        let view = StridedSlice::new(&data, &[2, 3], &[3, 1], 0).unwrap();
        assert_eq!(view.byte_stride(0), 24);
        assert_eq!(view.byte_stride(1), 8);
        assert_eq!(Buffer::nbytes(&view), 48);
    }

    #[test]
    fn test_misdeclared_element_is_not_a_buffer() {
        // Claims two bytes but is four wide.
        #[derive(Clone, Copy)]
        struct Lying(#[allow(dead_code)] u32);
        impl Element for Lying {
            fn layout() -> TypeLayout {
                TypeLayout::Primitive(Primitive::U16)
            }
        }
        let data = vec![Lying(0); 4];
        let view = StridedSlice::contiguous(&data, &[4]).unwrap();
        assert!(view.query_buffer().is_none());
    }

    #[test]
    fn test_ineligible_element_layout_is_not_a_buffer() {
        #[derive(Clone, Copy)]
        struct Bad(#[allow(dead_code)] u64);
        impl Element for Bad {
            fn layout() -> TypeLayout {
                TypeLayout::Aggregate(Aggregate {
                    size: 8,
                    fields: vec![
                        Field::named("a", 0, TypeLayout::Primitive(Primitive::I32)),
                        Field::named("b", 2, TypeLayout::Primitive(Primitive::I32)),
                    ],
                })
            }
        }
        let data = vec![Bad(0); 2];
        let view = StridedSlice::contiguous(&data, &[2]).unwrap();
        assert!(view.query_buffer().is_none());
    }
}
