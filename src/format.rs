//! Format-string compilation for fixed-layout element types.
//!
//! A [`TypeLayout`] is a reflected description of an element type: a
//! primitive from a fixed table, an aggregate of fields at explicit byte
//! offsets, or an opaque sized blob. [`compile_format`] renders a layout to
//! the textual grammar used by the cross-language buffer-interchange
//! convention: one reserved code character per primitive (`Z`-prefixed for
//! complex pairs), `Nx` for N skipped padding bytes, and `T{...}` around an
//! aggregate's members, each optionally tagged with `:name:`.
//!
//! Rendering is a pure function of the layout. The rendered extent of an
//! eligible layout always equals its true in-memory size, including interior
//! and trailing padding, so consumers can derive the stride between array
//! elements from the format string alone.

use std::fmt::Write as _;

use crate::{BufferError, Result};

// ============================================================================
// Primitive table
// ============================================================================

/// The fixed table of primitive element kinds.
///
/// Any primitive kind outside this table is not describable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Primitive {
    I8,
    U8,
    I16,
    U16,
    I32,
    U32,
    I64,
    U64,
    F16,
    F32,
    F64,
    ComplexF16,
    ComplexF32,
    ComplexF64,
    Bool,
    /// An opaque pointer value (the pointer itself, not what it points at).
    Ptr,
}

impl Primitive {
    /// Size of the primitive in bytes.
    #[inline]
    pub const fn size(self) -> usize {
        match self {
            Primitive::I8 | Primitive::U8 | Primitive::Bool => 1,
            Primitive::I16 | Primitive::U16 | Primitive::F16 => 2,
            Primitive::I32 | Primitive::U32 | Primitive::F32 | Primitive::ComplexF16 => 4,
            Primitive::I64 | Primitive::U64 | Primitive::F64 | Primitive::ComplexF32 => 8,
            Primitive::ComplexF64 => 16,
            Primitive::Ptr => std::mem::size_of::<*const ()>(),
        }
    }

    /// Reserved format code for the primitive.
    ///
    /// Complex kinds are the `Z` marker followed by the underlying float's
    /// code.
    #[inline]
    pub const fn code(self) -> &'static str {
        match self {
            Primitive::I8 => "b",
            Primitive::U8 => "B",
            Primitive::I16 => "h",
            Primitive::U16 => "H",
            Primitive::I32 => "i",
            Primitive::U32 => "I",
            Primitive::I64 => "q",
            Primitive::U64 => "Q",
            Primitive::F16 => "e",
            Primitive::F32 => "f",
            Primitive::F64 => "d",
            Primitive::ComplexF16 => "Ze",
            Primitive::ComplexF32 => "Zf",
            Primitive::ComplexF64 => "Zd",
            Primitive::Bool => "?",
            Primitive::Ptr => "P",
        }
    }
}

// ============================================================================
// Aggregate layouts
// ============================================================================

/// One member of an [`Aggregate`]: an optional name, a byte offset from the
/// start of the aggregate, and the member's own layout.
#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    pub name: Option<String>,
    pub offset: usize,
    pub layout: TypeLayout,
}

impl Field {
    /// A named field at the given offset.
    pub fn named(name: impl Into<String>, offset: usize, layout: TypeLayout) -> Self {
        Field {
            name: Some(name.into()),
            offset,
            layout,
        }
    }

    /// An anonymous field at the given offset.
    pub fn anonymous(offset: usize, layout: TypeLayout) -> Self {
        Field {
            name: None,
            offset,
            layout,
        }
    }
}

/// A struct-like layout: a total size and an ordered field list.
///
/// Fields must appear in declaration order (non-decreasing, non-overlapping
/// offsets). `size` is the full in-memory size including trailing padding,
/// i.e. the stride between consecutive array elements of this type.
#[derive(Debug, Clone, PartialEq)]
pub struct Aggregate {
    pub size: usize,
    pub fields: Vec<Field>,
}

// ============================================================================
// TypeLayout
// ============================================================================

/// Reflected layout of a fixed-size, fixed-layout element type.
///
/// Every layout has a statically known byte size and contains no
/// runtime-dependent structure. A [`Primitive::Ptr`] member describes the
/// pointer value itself; pointed-to data is never considered contained.
#[derive(Debug, Clone, PartialEq)]
pub enum TypeLayout {
    Primitive(Primitive),
    Aggregate(Aggregate),
    /// A fixed-size blob with no decodable interior, rendered as one skip
    /// marker of its exact size.
    Opaque { size: usize },
}

impl TypeLayout {
    /// Total size of the layout in bytes.
    pub fn size(&self) -> usize {
        match self {
            TypeLayout::Primitive(p) => p.size(),
            TypeLayout::Aggregate(agg) => agg.size,
            TypeLayout::Opaque { size } => *size,
        }
    }

    /// Whether the layout is describable by [`compile_format`].
    ///
    /// True iff the size is non-zero and, for aggregates, every field is
    /// itself eligible, fields do not overlap, and no field extends past the
    /// aggregate's size. Depends only on the layout value, so the result is
    /// safe to cache.
    pub fn is_eligible(&self) -> bool {
        match self {
            TypeLayout::Primitive(_) => true,
            TypeLayout::Opaque { size } => *size > 0,
            TypeLayout::Aggregate(agg) => {
                if agg.size == 0 {
                    return false;
                }
                let mut end = 0usize;
                for field in &agg.fields {
                    if field.offset < end || !field.layout.is_eligible() {
                        return false;
                    }
                    end = field.offset + field.layout.size();
                    if end > agg.size {
                        return false;
                    }
                }
                true
            }
        }
    }

    /// Render the layout to a format string. See [`compile_format`].
    pub fn format(&self) -> Result<String> {
        compile_format(self)
    }
}

// ============================================================================
// Compilation
// ============================================================================

/// Compile a layout to its format string.
///
/// Deterministic: the same layout always yields a byte-identical string.
/// Fails with an ineligible-element error (zero size, overlapping fields, a
/// field past the end of its aggregate) rather than producing a partial or
/// misleading string.
pub fn compile_format(layout: &TypeLayout) -> Result<String> {
    let mut out = String::new();
    render(layout, None, &mut out)?;
    Ok(out)
}

fn render(layout: &TypeLayout, name: Option<&str>, out: &mut String) -> Result<()> {
    match layout {
        TypeLayout::Primitive(p) => out.push_str(p.code()),
        TypeLayout::Opaque { size } => {
            if *size == 0 {
                return Err(BufferError::ZeroSized);
            }
            let _ = write!(out, "{size}x");
        }
        TypeLayout::Aggregate(agg) => render_aggregate(agg, out)?,
    }
    if let Some(name) = name {
        let _ = write!(out, ":{name}:");
    }
    Ok(())
}

fn render_aggregate(agg: &Aggregate, out: &mut String) -> Result<()> {
    if agg.size == 0 {
        return Err(BufferError::ZeroSized);
    }
    out.push_str("T{");
    let mut end = 0usize;
    let mut first = true;
    let pad = |out: &mut String, first: &mut bool, gap: usize| {
        if gap > 0 {
            if !*first {
                out.push(' ');
            }
            let _ = write!(out, "{gap}x");
            *first = false;
        }
    };
    for field in &agg.fields {
        if field.offset < end {
            return Err(BufferError::OverlappingFields {
                offset: field.offset,
                end,
            });
        }
        let size = field.layout.size();
        if field.offset + size > agg.size {
            return Err(BufferError::FieldPastEnd {
                offset: field.offset,
                size,
                total: agg.size,
            });
        }
        pad(out, &mut first, field.offset - end);
        if !first {
            out.push(' ');
        }
        render(&field.layout, field.name.as_deref(), out)?;
        first = false;
        end = field.offset + size;
    }
    // Trailing (or, for a field-less aggregate, total) padding keeps the
    // rendered extent equal to the true size.
    pad(out, &mut first, agg.size - end);
    out.push('}');
    Ok(())
}
