//! Registry trait binding static Rust types to reflected layouts.

use half::f16;
use num_complex::Complex;

use crate::format::{compile_format, Primitive, TypeLayout};
use crate::Result;

/// A Rust type usable as a buffer element.
///
/// Implementors declare their own layout. The contract is that
/// `Self::layout()` is eligible and describes exactly
/// `std::mem::size_of::<Self>()` bytes; the strided-slice adapter re-checks
/// this at query time and treats a mismatch as "not a buffer".
///
/// Aggregate types implement this by returning an
/// [`Aggregate`](crate::Aggregate) layout, typically built with
/// `std::mem::offset_of!` so the declared offsets track the real ones:
///
/// ```rust
/// use std::mem::{offset_of, size_of};
/// use strided_buffer::{Aggregate, Element, Field, Primitive, TypeLayout};
///
/// #[repr(C)]
/// #[derive(Clone, Copy)]
/// struct Sample {
///     tag: u8,
///     count: i32,
/// }
///
/// impl Element for Sample {
///     fn layout() -> TypeLayout {
///         TypeLayout::Aggregate(Aggregate {
///             size: size_of::<Sample>(),
///             fields: vec![
///                 Field::named("tag", offset_of!(Sample, tag),
///                     TypeLayout::Primitive(Primitive::U8)),
///                 Field::named("count", offset_of!(Sample, count),
///                     TypeLayout::Primitive(Primitive::I32)),
///             ],
///         })
///     }
/// }
///
/// assert_eq!(strided_buffer::format_of::<Sample>().unwrap(), "T{B:tag: 3x i:count:}");
/// ```
pub trait Element: Copy + 'static {
    /// Reflected layout of `Self`.
    fn layout() -> TypeLayout;
}

/// Layout of `T`, by value.
#[inline]
pub fn layout_of<T: Element>() -> TypeLayout {
    T::layout()
}

/// Format string of `T`.
pub fn format_of<T: Element>() -> Result<String> {
    compile_format(&T::layout())
}

macro_rules! primitive_elements {
    ($($ty:ty => $kind:ident),* $(,)?) => {
        $(
            impl Element for $ty {
                #[inline]
                fn layout() -> TypeLayout {
                    TypeLayout::Primitive(Primitive::$kind)
                }
            }
        )*
    };
}

primitive_elements! {
    i8 => I8,
    u8 => U8,
    i16 => I16,
    u16 => U16,
    i32 => I32,
    u32 => U32,
    i64 => I64,
    u64 => U64,
    f16 => F16,
    f32 => F32,
    f64 => F64,
    bool => Bool,
    Complex<f16> => ComplexF16,
    Complex<f32> => ComplexF32,
    Complex<f64> => ComplexF64,
}

impl<T: 'static> Element for *const T {
    #[inline]
    fn layout() -> TypeLayout {
        TypeLayout::Primitive(Primitive::Ptr)
    }
}

impl<T: 'static> Element for *mut T {
    #[inline]
    fn layout() -> TypeLayout {
        TypeLayout::Primitive(Primitive::Ptr)
    }
}
