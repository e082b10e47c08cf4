//! Bounded numeric conversion and literal handling

use crate::error::Error;
use crate::types::{Scalar, TypeDescriptor, TypeKind};

use std::str::FromStr;

/// Bounded conversion between stack scalars.
///
/// `safe_cast` always produces a destination value; the flag reports whether
/// the conversion preserved the source:
///
/// * int → int keeps the low bits on narrowing and reports `false` when the
///   value does not round-trip;
/// * float → int saturates (NaN becomes 0) and reports `false` outside the
///   destination range, discarded fractions are accepted;
/// * float64 → float32 reports `false` only when a finite value overflows to
///   infinity, plain precision loss is accepted;
/// * int → float and every widening conversion report `true`.
pub trait SafeCast<T: Scalar>: Scalar {
    fn safe_cast(self) -> (T, bool);
}

macro_rules! cast_int_to_int {
    ($src:ty => $($dst:ty),*) => {$(
        impl SafeCast<$dst> for $src {
            fn safe_cast(self) -> ($dst, bool) {
                let converted = self as $dst;
                (converted, converted as i128 == self as i128)
            }
        }
    )*};
}

macro_rules! cast_int_to_float {
    ($src:ty => $($dst:ty),*) => {$(
        impl SafeCast<$dst> for $src {
            fn safe_cast(self) -> ($dst, bool) {
                (self as $dst, true)
            }
        }
    )*};
}

macro_rules! cast_float_to_int {
    ($src:ty => $($dst:ty),*) => {$(
        impl SafeCast<$dst> for $src {
            fn safe_cast(self) -> ($dst, bool) {
                let converted = self as $dst;
                (converted, self.is_finite() && converted as $src == self.trunc())
            }
        }
    )*};
}

macro_rules! cast_int {
    ($($src:ty),*) => {$(
        cast_int_to_int!($src => u8, i8, u16, i16, u32, i32, u64, i64);
        cast_int_to_float!($src => f32, f64);
    )*};
}

cast_int!(u8, i8, u16, i16, u32, i32, u64, i64);
cast_float_to_int!(f32 => u8, i8, u16, i16, u32, i32, u64, i64);
cast_float_to_int!(f64 => u8, i8, u16, i16, u32, i32, u64, i64);

impl SafeCast<f32> for f32 {
    fn safe_cast(self) -> (f32, bool) {
        (self, true)
    }
}

impl SafeCast<f64> for f32 {
    fn safe_cast(self) -> (f64, bool) {
        (f64::from(self), true)
    }
}

impl SafeCast<f64> for f64 {
    fn safe_cast(self) -> (f64, bool) {
        (self, true)
    }
}

impl SafeCast<f32> for f64 {
    fn safe_cast(self) -> (f32, bool) {
        let converted = self as f32;
        (converted, converted.is_finite() || !self.is_finite())
    }
}

fn parse_into<T>(literal: &str, buf: &mut [u8]) -> Result<(), Error>
where
    T: Scalar + FromStr,
{
    let value = literal.parse::<T>().map_err(|_| {
        Error::invalid_operation(format!(
            "cannot convert `{literal}` to {}",
            T::DESCRIPTOR
        ))
    })?;
    value.store(buf);
    Ok(())
}

/// Parses a decimal literal of the given descriptor into the front of `buf`.
///
/// Integer literals must fit the destination; float literals follow the
/// standard library grammar (a superset of C99 `strtod` decimals).
pub fn parse_literal(td: TypeDescriptor, literal: &str, buf: &mut [u8]) -> Result<(), Error> {
    match (td.kind(), td.storage_size()) {
        (TypeKind::UnsignedInt, 1) => parse_into::<u8>(literal, buf),
        (TypeKind::UnsignedInt, 2) => parse_into::<u16>(literal, buf),
        (TypeKind::UnsignedInt, 4) => parse_into::<u32>(literal, buf),
        (TypeKind::UnsignedInt, 8) => parse_into::<u64>(literal, buf),
        (TypeKind::SignedInt, 1) => parse_into::<i8>(literal, buf),
        (TypeKind::SignedInt, 2) => parse_into::<i16>(literal, buf),
        (TypeKind::SignedInt, 4) => parse_into::<i32>(literal, buf),
        (TypeKind::SignedInt, 8) => parse_into::<i64>(literal, buf),
        (TypeKind::Float, 4) => parse_into::<f32>(literal, buf),
        (TypeKind::Float, 8) => parse_into::<f64>(literal, buf),
        _ => Err(Error::unsupported_feature(format!(
            "type {td} has no literal representation"
        ))),
    }
}

/// Renders the value stored at the front of `buf` for the given descriptor.
///
/// Floats print in the shortest form that round-trips, so rendering a value
/// and parsing it back reproduces the stored bits.
pub fn format_value(td: TypeDescriptor, buf: &[u8]) -> Option<String> {
    let text = match (td.kind(), td.storage_size()) {
        (TypeKind::UnsignedInt, 1) => u8::load(buf).to_string(),
        (TypeKind::UnsignedInt, 2) => u16::load(buf).to_string(),
        (TypeKind::UnsignedInt, 4) => u32::load(buf).to_string(),
        (TypeKind::UnsignedInt, 8) => u64::load(buf).to_string(),
        (TypeKind::SignedInt, 1) => i8::load(buf).to_string(),
        (TypeKind::SignedInt, 2) => i16::load(buf).to_string(),
        (TypeKind::SignedInt, 4) => i32::load(buf).to_string(),
        (TypeKind::SignedInt, 8) => i64::load(buf).to_string(),
        (TypeKind::Float, 4) => f32::load(buf).to_string(),
        (TypeKind::Float, 8) => f64::load(buf).to_string(),
        _ => return None,
    };
    Some(text)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn narrowing_int_keeps_low_bits() {
        let (value, exact): (i8, bool) = 200i32.safe_cast();
        assert_eq!(value, -56);
        assert!(!exact);
    }

    #[test]
    fn sign_flip_is_not_exact() {
        let (value, exact): (i8, bool) = 200u8.safe_cast();
        assert_eq!(value, -56);
        assert!(!exact);

        let (value, exact): (u8, bool) = (-1i8).safe_cast();
        assert_eq!(value, 255);
        assert!(!exact);
    }

    #[test]
    fn fitting_int_is_exact() {
        let (value, exact): (i8, bool) = 100i32.safe_cast();
        assert_eq!(value, 100);
        assert!(exact);
    }

    #[test]
    fn float_to_int_saturates_and_flags() {
        let (value, exact): (i8, bool) = 1000.0f64.safe_cast();
        assert_eq!(value, 127);
        assert!(!exact);

        let (value, exact): (u8, bool) = (-1.0f32).safe_cast();
        assert_eq!(value, 0);
        assert!(!exact);

        let (value, exact): (i32, bool) = f64::NAN.safe_cast();
        assert_eq!(value, 0);
        assert!(!exact);
    }

    #[test]
    fn float_to_int_accepts_truncation() {
        let (value, exact): (i32, bool) = 3.75f64.safe_cast();
        assert_eq!(value, 3);
        assert!(exact);
    }

    #[test]
    fn float_narrowing_accepts_precision_loss() {
        let (value, exact): (f32, bool) = 3.14f64.safe_cast();
        assert_eq!(value, 3.14f32);
        assert!(exact);
    }

    #[test]
    fn float_narrowing_flags_overflow() {
        let (value, exact): (f32, bool) = 1.0e300f64.safe_cast();
        assert!(value.is_infinite());
        assert!(!exact);

        let (value, exact): (f32, bool) = f64::INFINITY.safe_cast();
        assert!(value.is_infinite());
        assert!(exact);
    }

    #[test]
    fn literal_round_trip() {
        let mut buf = [0u8; 8];
        for (td, literal) in [
            (TypeDescriptor::FLOAT64, "3.14"),
            (TypeDescriptor::FLOAT32, "0.5"),
            (TypeDescriptor::INT16, "-32768"),
            (TypeDescriptor::UINT64, "18446744073709551615"),
        ] {
            parse_literal(td, literal, &mut buf).unwrap();
            assert_eq!(format_value(td, &buf).unwrap(), literal);
        }
    }

    #[test]
    fn integer_literal_must_fit() {
        let mut buf = [0u8; 8];
        assert!(parse_literal(TypeDescriptor::UINT8, "256", &mut buf).is_err());
        assert!(parse_literal(TypeDescriptor::UINT8, "-1", &mut buf).is_err());
        assert!(parse_literal(TypeDescriptor::INT8, "3x", &mut buf).is_err());
    }
}
