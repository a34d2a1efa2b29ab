//! The capability-query protocol and buffer descriptors.
//!
//! A producer opts in by implementing [`AsBuffer`]: its `query_buffer`
//! either returns a token on which the [`Buffer`] accessors are well-defined,
//! or `None` to signal that the value does not expose a buffer at all.
//! Consumers call [`describe`] and branch on the `Option` explicitly; there
//! is no "assume it's a buffer" path.
//!
//! A [`BufferDescriptor`] borrows its token, so the borrow checker enforces
//! that a descriptor never outlives the value it describes. The raw pointer
//! inside is only meaningful while that borrow is live and the underlying
//! storage is not resized, reallocated, or freed.

use crate::Result;

// ============================================================================
// Accessor trait
// ============================================================================

/// Accessor operations on a buffer token.
///
/// Each accessor is a pure query against live storage. Per-axis accessors
/// take 0-based axis indices in `0..ndim`. The aggregate accessors and
/// [`suboffset`](Buffer::suboffset) have default bodies; producers override
/// them only when the generic derivations do not apply.
pub trait Buffer {
    /// Address of the first byte of element `(0, 0, ..., 0)`.
    ///
    /// For views with negative strides this is the logical first element,
    /// not the lowest address in the region.
    fn buf_ptr(&self) -> *const u8;

    /// Whether in-place element mutation is unsupported through this buffer.
    fn readonly(&self) -> bool;

    /// Bytes per element.
    fn item_size(&self) -> usize;

    /// Format string for one element.
    ///
    /// Fails with an ineligible-element error when the element type cannot
    /// be described; see [`compile_format`](crate::compile_format).
    fn format(&self) -> Result<String>;

    /// Number of axes.
    fn ndim(&self) -> usize;

    /// Element count along `axis`.
    fn dim(&self, axis: usize) -> usize;

    /// Signed byte delta for one step along `axis`.
    fn byte_stride(&self, axis: usize) -> isize;

    /// Per-axis indirection marker; `-1` means direct affine addressing.
    ///
    /// No default producer uses indirection. The accessor exists so the
    /// descriptor carries a complete suboffset vector for consumers that
    /// expect one.
    #[inline]
    fn suboffset(&self, _axis: usize) -> isize {
        -1
    }

    /// Element counts for all axes, in axis order.
    fn dims(&self) -> Vec<usize> {
        (0..self.ndim()).map(|i| self.dim(i)).collect()
    }

    /// Byte strides for all axes, in axis order.
    fn byte_strides(&self) -> Vec<isize> {
        (0..self.ndim()).map(|i| self.byte_stride(i)).collect()
    }

    /// Suboffsets for all axes, in axis order.
    fn suboffsets(&self) -> Vec<isize> {
        (0..self.ndim()).map(|i| self.suboffset(i)).collect()
    }

    /// Nominal byte length: product of all dims times the item size.
    ///
    /// This is the length the data would occupy repacked contiguously. For
    /// non-contiguous or negative strides it is not the extent of the
    /// underlying storage.
    fn nbytes(&self) -> usize {
        self.dims().iter().product::<usize>() * self.item_size()
    }
}

// ============================================================================
// Opt-in query
// ============================================================================

/// The single extension point producers implement.
pub trait AsBuffer {
    /// Return a buffer token for this value, or `None` when the value does
    /// not expose a buffer.
    ///
    /// The token is commonly the value itself. Its accessors must stay valid
    /// for as long as the caller keeps the value borrowed.
    fn query_buffer(&self) -> Option<&dyn Buffer>;
}

// ============================================================================
// Descriptor
// ============================================================================

/// Immutable snapshot of a buffer's layout at the moment of the query.
///
/// Holds a borrow of the token as its only retained reference to the source
/// storage, so it cannot outlive the source value. Reading through
/// [`ptr`](BufferDescriptor::ptr) after the source storage has been released
/// or resized is undefined; keeping the source alive is the caller's
/// obligation, enforced here only up to the borrow.
pub struct BufferDescriptor<'a> {
    token: &'a dyn Buffer,
    ptr: *const u8,
    nbytes: usize,
    readonly: bool,
    item_size: usize,
    format: String,
    ndim: usize,
    dims: Vec<usize>,
    byte_strides: Vec<isize>,
    suboffsets: Vec<isize>,
}

impl<'a> BufferDescriptor<'a> {
    /// The token the descriptor was built from.
    #[inline]
    pub fn token(&self) -> &'a dyn Buffer {
        self.token
    }

    /// Address of the first byte of the logical first element.
    #[inline]
    pub fn ptr(&self) -> *const u8 {
        self.ptr
    }

    /// Nominal contiguous byte length; see [`Buffer::nbytes`].
    #[inline]
    pub fn nbytes(&self) -> usize {
        self.nbytes
    }

    /// Whether the buffer refuses in-place mutation.
    #[inline]
    pub fn readonly(&self) -> bool {
        self.readonly
    }

    /// Bytes per element.
    #[inline]
    pub fn item_size(&self) -> usize {
        self.item_size
    }

    /// Element format string.
    #[inline]
    pub fn format(&self) -> &str {
        &self.format
    }

    /// Number of axes.
    #[inline]
    pub fn ndim(&self) -> usize {
        self.ndim
    }

    /// Element count per axis.
    #[inline]
    pub fn dims(&self) -> &[usize] {
        &self.dims
    }

    /// Signed byte stride per axis.
    #[inline]
    pub fn byte_strides(&self) -> &[isize] {
        &self.byte_strides
    }

    /// Indirection marker per axis (`-1` throughout for direct addressing).
    #[inline]
    pub fn suboffsets(&self) -> &[isize] {
        &self.suboffsets
    }

    /// Whether the described data is packed row-major with no gaps.
    pub fn is_contiguous(&self) -> bool {
        let mut expected = self.item_size as isize;
        for axis in (0..self.ndim).rev() {
            if self.dims[axis] <= 1 {
                continue;
            }
            if self.byte_strides[axis] != expected {
                return false;
            }
            expected *= self.dims[axis] as isize;
        }
        true
    }
}

impl std::fmt::Debug for BufferDescriptor<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BufferDescriptor")
            .field("ptr", &self.ptr)
            .field("nbytes", &self.nbytes)
            .field("readonly", &self.readonly)
            .field("item_size", &self.item_size)
            .field("format", &self.format)
            .field("ndim", &self.ndim)
            .field("dims", &self.dims)
            .field("byte_strides", &self.byte_strides)
            .field("suboffsets", &self.suboffsets)
            .finish()
    }
}

// ============================================================================
// Entry point
// ============================================================================

/// Query a value for its buffer and assemble a descriptor.
///
/// Returns `Ok(None)` when the value exposes no buffer — the normal outcome
/// for non-buffer values, which callers must branch on. Returns `Err` only
/// for the ineligible-element class surfaced through [`Buffer::format`].
///
/// Every accessor is invoked exactly once per call and nothing is cached
/// across calls, so the descriptor reflects the buffer's layout at the
/// moment of the query.
pub fn describe<T: AsBuffer + ?Sized>(value: &T) -> Result<Option<BufferDescriptor<'_>>> {
    let Some(token) = value.query_buffer() else {
        return Ok(None);
    };
    let ptr = token.buf_ptr();
    let nbytes = token.nbytes();
    let readonly = token.readonly();
    let item_size = token.item_size();
    let format = token.format()?;
    let ndim = token.ndim();
    let dims = token.dims();
    let byte_strides = token.byte_strides();
    let suboffsets = token.suboffsets();
    Ok(Some(BufferDescriptor {
        token,
        ptr,
        nbytes,
        readonly,
        item_size,
        format,
        ndim,
        dims,
        byte_strides,
        suboffsets,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Minimal hand-rolled producer: a 1-D f64 buffer over a boxed slice,
    /// exercising the default accessor bodies.
    struct Samples {
        data: Vec<f64>,
    }

    impl Buffer for Samples {
        fn buf_ptr(&self) -> *const u8 {
            self.data.as_ptr() as *const u8
        }
        fn readonly(&self) -> bool {
            true
        }
        fn item_size(&self) -> usize {
            std::mem::size_of::<f64>()
        }
        fn format(&self) -> Result<String> {
            crate::format_of::<f64>()
        }
        fn ndim(&self) -> usize {
            1
        }
        fn dim(&self, _axis: usize) -> usize {
            self.data.len()
        }
        fn byte_stride(&self, _axis: usize) -> isize {
            std::mem::size_of::<f64>() as isize
        }
    }

    impl AsBuffer for Samples {
        fn query_buffer(&self) -> Option<&dyn Buffer> {
            Some(self)
        }
    }

    struct NotABuffer;

    impl AsBuffer for NotABuffer {
        fn query_buffer(&self) -> Option<&dyn Buffer> {
            None
        }
    }

    #[test]
    fn test_default_aggregate_accessors() {
        let s = Samples {
            data: vec![0.0; 6],
        };
        assert_eq!(s.dims(), vec![6]);
        assert_eq!(s.byte_strides(), vec![8]);
        assert_eq!(s.suboffsets(), vec![-1]);
        assert_eq!(s.nbytes(), 48);
    }

    #[test]
    fn test_describe_custom_producer() {
        let s = Samples {
            data: vec![1.0, 2.0, 3.0],
        };
        let desc = describe(&s).unwrap().expect("Samples exposes a buffer");
        assert_eq!(desc.ptr(), s.data.as_ptr() as *const u8);
        assert_eq!(desc.nbytes(), 24);
        assert!(desc.readonly());
        assert_eq!(desc.format(), "d");
        assert_eq!(desc.ndim(), 1);
        assert_eq!(desc.dims(), &[3]);
        assert_eq!(desc.byte_strides(), &[8]);
        assert_eq!(desc.suboffsets(), &[-1]);
        assert!(desc.is_contiguous());
    }

    #[test]
    fn test_describe_absence() {
        assert!(describe(&NotABuffer).unwrap().is_none());
    }

    #[test]
    fn test_zero_dim_descriptor() {
        struct Scalar(f64);
        impl Buffer for Scalar {
            fn buf_ptr(&self) -> *const u8 {
                &self.0 as *const f64 as *const u8
            }
            fn readonly(&self) -> bool {
                true
            }
            fn item_size(&self) -> usize {
                8
            }
            fn format(&self) -> Result<String> {
                crate::format_of::<f64>()
            }
            fn ndim(&self) -> usize {
                0
            }
            fn dim(&self, _axis: usize) -> usize {
                unreachable!("0-d buffer has no axes")
            }
            fn byte_stride(&self, _axis: usize) -> isize {
                unreachable!("0-d buffer has no axes")
            }
        }
        impl AsBuffer for Scalar {
            fn query_buffer(&self) -> Option<&dyn Buffer> {
                Some(self)
            }
        }

        let s = Scalar(2.5);
        let desc = describe(&s).unwrap().unwrap();
        assert_eq!(desc.ndim(), 0);
        assert_eq!(desc.dims(), &[] as &[usize]);
        // Empty product: one element's worth of bytes.
        assert_eq!(desc.nbytes(), 8);
        assert!(desc.is_contiguous());
    }
}
