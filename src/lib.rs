//! Buffer-protocol layout descriptors for strided in-memory arrays.
//!
//! This crate lets foreign consumers read the raw bytes of array-like data
//! without copying, given only a pointer, an element format string, and
//! shape/stride/suboffset metadata. Any producer that can expose a
//! contiguous-or-strided region of fixed-size elements can participate; any
//! consumer that understands the format grammar can interpret the region
//! regardless of who produced it.
//!
//! # Core Pieces
//!
//! - [`TypeLayout`] / [`compile_format`]: reflected element layouts and the
//!   pure compiler rendering them to the interchange format grammar
//!   (primitive codes, `Z` complex marker, `Nx` padding skips, `T{...}`
//!   aggregates with `:name:` field tags)
//! - [`Element`]: registry trait binding static Rust types to their layouts
//! - [`Buffer`] / [`AsBuffer`]: the capability-query protocol — one required
//!   `query_buffer` operation, six accessors with default derivations
//! - [`describe`] / [`BufferDescriptor`]: the consumer entry point and the
//!   immutable snapshot it assembles
//! - [`StridedSlice`] / [`StridedSliceMut`]: generic strided-slice adapters
//!   that make any borrowed slice a queryable buffer
//!
//! # Example
//!
//! ```rust
//! use strided_buffer::{describe, StridedSlice};
//!
//! let data = vec![1.0f64, 2.0, 3.0, 4.0, 5.0, 6.0];
//! let view = StridedSlice::new(&data, &[2, 3], &[3, 1], 0).unwrap();
//!
//! let desc = describe(&view).unwrap().expect("slices expose buffers");
//! assert_eq!(desc.format(), "d");
//! assert_eq!(desc.item_size(), 8);
//! assert_eq!(desc.dims(), &[2, 3]);
//! assert_eq!(desc.byte_strides(), &[24, 8]);
//! assert_eq!(desc.nbytes(), 48);
//! assert!(desc.readonly());
//! ```
//!
//! # Lifetimes
//!
//! A [`BufferDescriptor`] borrows the value it describes, so the compiler
//! enforces that it never outlives its source. The raw pointer inside is
//! valid only while the source storage itself is; keeping that storage
//! un-resized and un-freed for the descriptor's useful life is the caller's
//! obligation.

mod buffer;
mod element;
mod format;
mod view;

// ============================================================================
// Format compilation
// ============================================================================
pub use format::{compile_format, Aggregate, Field, Primitive, TypeLayout};

// ============================================================================
// Element registry
// ============================================================================
pub use element::{format_of, layout_of, Element};

// ============================================================================
// Capability protocol
// ============================================================================
pub use buffer::{describe, AsBuffer, Buffer, BufferDescriptor};

// ============================================================================
// Strided-slice adapters
// ============================================================================
pub use view::{col_major_strides, row_major_strides, StridedSlice, StridedSliceMut};

// ============================================================================
// Error types
// ============================================================================

/// Errors surfaced by layout compilation and view construction.
///
/// The first three variants form the "ineligible element type" class: the
/// layout cannot be described and the failure is reported immediately rather
/// than coerced to a best-effort string. A value simply not exposing a
/// buffer is never an error; [`describe`] reports that as `Ok(None)`.
#[derive(Debug, thiserror::Error)]
pub enum BufferError {
    /// Element types must occupy at least one byte.
    #[error("ineligible element type: zero-sized layout")]
    ZeroSized,

    /// A field begins before the previous field ends (negative computed
    /// padding, an impossible layout).
    #[error("ineligible element type: field at offset {offset} overlaps previous field ending at {end}")]
    OverlappingFields { offset: usize, end: usize },

    /// A field extends past the declared aggregate size.
    #[error("ineligible element type: field at offset {offset} with size {size} exceeds aggregate size {total}")]
    FieldPastEnd {
        offset: usize,
        size: usize,
        total: usize,
    },

    /// Stride array length doesn't match dimensions.
    #[error("stride and dims length mismatch")]
    StrideLengthMismatch,

    /// A view would address memory outside its slice, or offset arithmetic
    /// overflowed.
    #[error("offset overflow while computing pointer")]
    OffsetOverflow,
}

/// Result type for buffer-protocol operations.
pub type Result<T> = std::result::Result<T, BufferError>;
