//! Native numeric element types that signal matrices can be built from.

use bytemuck::{Pod, Zeroable};
use std::fmt;

/// Native element type of an in-memory buffer.
///
/// This is wider than [`DataType`](super::DataType): 64-bit integers exist in
/// memory but have no on-disk representation, so writing them fails.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum NativeType {
    Int8,
    Uint8,
    Int16,
    Uint16,
    Int32,
    Uint32,
    Int64,
    Uint64,
    Float32,
    Float64,
}

impl NativeType {
    /// Returns the Rust spelling of this type.
    #[inline]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Int8 => "i8",
            Self::Uint8 => "u8",
            Self::Int16 => "i16",
            Self::Uint16 => "u16",
            Self::Int32 => "i32",
            Self::Uint32 => "u32",
            Self::Int64 => "i64",
            Self::Uint64 => "u64",
            Self::Float32 => "f32",
            Self::Float64 => "f64",
        }
    }

    /// Returns true if this is a floating point type.
    #[inline]
    pub const fn is_float(self) -> bool {
        matches!(self, Self::Float32 | Self::Float64)
    }
}

impl fmt::Display for NativeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Trait for element types a signal matrix can hold.
pub trait Sample: Pod + Zeroable + Copy + Default + PartialEq + fmt::Debug {
    /// The corresponding native type tag.
    const NATIVE: NativeType;

    /// Widen to f64.
    fn to_f64(self) -> f64;

    /// Narrow from f64 (saturating for integers).
    fn from_f64(v: f64) -> Self;
}

macro_rules! impl_sample {
    ($($ty:ty => $native:ident),* $(,)?) => {
        $(
            impl Sample for $ty {
                const NATIVE: NativeType = NativeType::$native;

                #[inline]
                fn to_f64(self) -> f64 {
                    self as f64
                }

                #[inline]
                fn from_f64(v: f64) -> Self {
                    v as $ty
                }
            }
        )*
    };
}

impl_sample! {
    i8 => Int8,
    u8 => Uint8,
    i16 => Int16,
    u16 => Uint16,
    i32 => Int32,
    u32 => Uint32,
    i64 => Int64,
    u64 => Uint64,
    f32 => Float32,
    f64 => Float64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_native_tags() {
        assert_eq!(<i16 as Sample>::NATIVE, NativeType::Int16);
        assert_eq!(<f64 as Sample>::NATIVE, NativeType::Float64);
        assert!(NativeType::Float32.is_float());
        assert!(!NativeType::Uint32.is_float());
    }

    #[test]
    fn test_from_f64_saturates() {
        assert_eq!(<i8 as Sample>::from_f64(300.0), i8::MAX);
        assert_eq!(<u8 as Sample>::from_f64(-3.0), 0);
        assert_eq!(<i16 as Sample>::from_f64(-12.0), -12);
    }
}
