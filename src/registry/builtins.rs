//! The standard opcode set

use super::{FunctionRecord, Registry};
use crate::conv::SafeCast;
use crate::error::{Error, Flags};
use crate::interpreter::Interpreter;
use crate::types::Scalar;

use lazy_static::lazy_static;

lazy_static! {
    static ref STANDARD: Registry =
        standard().expect("standard opcode set does not fit the registry");
}

/// The process-wide registry holding the standard opcode set. Populated on
/// first use, before any compilation can consult it, and read-only
/// thereafter.
pub fn standard_registry() -> &'static Registry {
    &STANDARD
}

/* OPCODE IMPLEMENTATIONS */

fn read<T: Scalar>(vm: &mut Interpreter<'_>) {
    let location = vm.fetch();
    let value = vm.load_data::<T>(location);
    vm.push(value);
}

fn write<T: Scalar>(vm: &mut Interpreter<'_>) {
    let location = vm.fetch();
    let value: T = vm.pop();
    vm.store_data(location, value);
}

fn write_converting<S, D>(vm: &mut Interpreter<'_>)
where
    S: Scalar + SafeCast<D>,
    D: Scalar,
{
    let location = vm.fetch();
    let value: S = vm.pop();
    let (converted, exact) = value.safe_cast();
    if !exact {
        vm.raise(Flags::OUT_OF_RANGE);
    }
    vm.store_data(location, converted);
}

fn dup<T: Scalar>(vm: &mut Interpreter<'_>) {
    let value: T = vm.pop();
    vm.push(value);
    vm.push(value);
}

fn cast<S, D>(vm: &mut Interpreter<'_>)
where
    S: Scalar + SafeCast<D>,
    D: Scalar,
{
    let value: S = vm.pop();
    let (converted, exact) = value.safe_cast();
    if !exact {
        vm.raise(Flags::OUT_OF_RANGE);
    }
    vm.push(converted);
}

/// Arithmetic over one stack scalar type. Integers wrap; integer division
/// by zero (and signed `MIN / -1`) reports an unrepresentable result.
trait Arith: Scalar {
    fn add(lhs: Self, rhs: Self) -> Self;
    fn sub(lhs: Self, rhs: Self) -> Self;
    fn mul(lhs: Self, rhs: Self) -> Self;
    fn div(lhs: Self, rhs: Self) -> (Self, bool);
}

macro_rules! impl_arith_int {
    ($($t:ty),*) => {$(
        impl Arith for $t {
            fn add(lhs: Self, rhs: Self) -> Self { lhs.wrapping_add(rhs) }
            fn sub(lhs: Self, rhs: Self) -> Self { lhs.wrapping_sub(rhs) }
            fn mul(lhs: Self, rhs: Self) -> Self { lhs.wrapping_mul(rhs) }
            fn div(lhs: Self, rhs: Self) -> (Self, bool) {
                if rhs == 0 {
                    (0, false)
                } else {
                    match lhs.checked_div(rhs) {
                        Some(quotient) => (quotient, true),
                        // signed MIN / -1 wraps and is reported out of range
                        None => (lhs.wrapping_div(rhs), false),
                    }
                }
            }
        }
    )*};
}

macro_rules! impl_arith_float {
    ($($t:ty),*) => {$(
        impl Arith for $t {
            fn add(lhs: Self, rhs: Self) -> Self { lhs + rhs }
            fn sub(lhs: Self, rhs: Self) -> Self { lhs - rhs }
            fn mul(lhs: Self, rhs: Self) -> Self { lhs * rhs }
            fn div(lhs: Self, rhs: Self) -> (Self, bool) { (lhs / rhs, true) }
        }
    )*};
}

impl_arith_int!(u8, i8, u16, i16, u32, i32, u64, i64);
impl_arith_float!(f32, f64);

fn add_op<T: Arith>(vm: &mut Interpreter<'_>) {
    let rhs: T = vm.pop();
    let lhs: T = vm.pop();
    vm.push(T::add(lhs, rhs));
}

fn sub_op<T: Arith>(vm: &mut Interpreter<'_>) {
    let rhs: T = vm.pop();
    let lhs: T = vm.pop();
    vm.push(T::sub(lhs, rhs));
}

fn mul_op<T: Arith>(vm: &mut Interpreter<'_>) {
    let rhs: T = vm.pop();
    let lhs: T = vm.pop();
    vm.push(T::mul(lhs, rhs));
}

fn div_op<T: Arith>(vm: &mut Interpreter<'_>) {
    let rhs: T = vm.pop();
    let lhs: T = vm.pop();
    let (quotient, representable) = T::div(lhs, rhs);
    if !representable {
        vm.raise(Flags::OUT_OF_RANGE);
    }
    vm.push(quotient);
}

macro_rules! compare_fn {
    ($name:ident, $op:tt) => {
        fn $name<T: Scalar + PartialOrd>(vm: &mut Interpreter<'_>) {
            let rhs: T = vm.pop();
            let lhs: T = vm.pop();
            vm.push(u8::from(lhs $op rhs));
        }
    };
}

compare_fn!(eq_op, ==);
compare_fn!(neq_op, !=);
compare_fn!(gt_op, >);
compare_fn!(lt_op, <);
compare_fn!(gte_op, >=);
compare_fn!(lte_op, <=);

fn and_op(vm: &mut Interpreter<'_>) {
    let rhs: u8 = vm.pop();
    let lhs: u8 = vm.pop();
    vm.push(u8::from(lhs != 0 && rhs != 0));
}

fn or_op(vm: &mut Interpreter<'_>) {
    let rhs: u8 = vm.pop();
    let lhs: u8 = vm.pop();
    vm.push(u8::from(lhs != 0 || rhs != 0));
}

fn xor_op(vm: &mut Interpreter<'_>) {
    let rhs: u8 = vm.pop();
    let lhs: u8 = vm.pop();
    vm.push(u8::from((lhs != 0) ^ (rhs != 0)));
}

trait FloatMath: Scalar {
    fn sin(x: Self) -> Self;
    fn cos(x: Self) -> Self;
    fn tan(x: Self) -> Self;
    fn exp(x: Self) -> Self;
    fn ln(x: Self) -> Self;
    fn log10(x: Self) -> Self;
    fn powf(base: Self, exp: Self) -> Self;
}

macro_rules! impl_float_math {
    ($($t:ty),*) => {$(
        impl FloatMath for $t {
            fn sin(x: Self) -> Self { <$t>::sin(x) }
            fn cos(x: Self) -> Self { <$t>::cos(x) }
            fn tan(x: Self) -> Self { <$t>::tan(x) }
            fn exp(x: Self) -> Self { <$t>::exp(x) }
            fn ln(x: Self) -> Self { <$t>::ln(x) }
            fn log10(x: Self) -> Self { <$t>::log10(x) }
            fn powf(base: Self, exp: Self) -> Self { <$t>::powf(base, exp) }
        }
    )*};
}

impl_float_math!(f32, f64);

macro_rules! unary_float_fn {
    ($name:ident, $method:ident) => {
        fn $name<T: FloatMath>(vm: &mut Interpreter<'_>) {
            let x: T = vm.pop();
            vm.push(T::$method(x));
        }
    };
}

unary_float_fn!(sin_op, sin);
unary_float_fn!(cos_op, cos);
unary_float_fn!(tan_op, tan);
unary_float_fn!(exp_op, exp);
unary_float_fn!(ln_op, ln);
unary_float_fn!(log10_op, log10);

fn pow_op<T: FloatMath>(vm: &mut Interpreter<'_>) {
    let exp: T = vm.pop();
    let base: T = vm.pop();
    vm.push(T::powf(base, exp));
}

// Promoting overloads: the float32 operand widens and the result is float64.

fn sum_promote_lhs(vm: &mut Interpreter<'_>) {
    let rhs: f64 = vm.pop();
    let lhs: f32 = vm.pop();
    vm.push(f64::from(lhs) + rhs);
}

fn sum_promote_rhs(vm: &mut Interpreter<'_>) {
    let rhs: f32 = vm.pop();
    let lhs: f64 = vm.pop();
    vm.push(lhs + f64::from(rhs));
}

fn prod_promote_lhs(vm: &mut Interpreter<'_>) {
    let rhs: f64 = vm.pop();
    let lhs: f32 = vm.pop();
    vm.push(f64::from(lhs) * rhs);
}

fn prod_promote_rhs(vm: &mut Interpreter<'_>) {
    let rhs: f32 = vm.pop();
    let lhs: f64 = vm.pop();
    vm.push(lhs * f64::from(rhs));
}

// POW with a float32 exponent over a float64 base narrows to the exponent's
// width; the symmetric form widens the base.

fn pow_exp_f32(vm: &mut Interpreter<'_>) {
    let exp: f32 = vm.pop();
    let base: f64 = vm.pop();
    vm.push(base.powf(f64::from(exp)) as f32);
}

fn pow_exp_f64(vm: &mut Interpreter<'_>) {
    let exp: f64 = vm.pop();
    let base: f32 = vm.pop();
    vm.push(f64::from(base).powf(exp));
}

/* REGISTRATION */

macro_rules! desc {
    ($t:ty) => {
        <$t as Scalar>::DESCRIPTOR
    };
}

macro_rules! for_each_numeric {
    ($mac:ident, $reg:ident $(, $extra:tt)*) => {
        $mac!($reg, f64 $(, $extra)*);
        $mac!($reg, f32 $(, $extra)*);
        $mac!($reg, u64 $(, $extra)*);
        $mac!($reg, i64 $(, $extra)*);
        $mac!($reg, u32 $(, $extra)*);
        $mac!($reg, i32 $(, $extra)*);
        $mac!($reg, u16 $(, $extra)*);
        $mac!($reg, i16 $(, $extra)*);
        $mac!($reg, u8 $(, $extra)*);
        $mac!($reg, i8 $(, $extra)*);
    };
}

macro_rules! register_dup {
    ($reg:ident, $t:ty) => {
        $reg.register(FunctionRecord::new(
            "DUP",
            vec![desc!($t)],
            vec![desc!($t), desc!($t)],
            dup::<$t>,
        ))?;
    };
}

macro_rules! register_read {
    ($reg:ident, $t:ty) => {
        $reg.register(FunctionRecord::new(
            "READ",
            vec![],
            vec![desc!($t)],
            read::<$t>,
        ))?;
    };
}

macro_rules! register_write {
    ($reg:ident, $t:ty) => {
        $reg.register(FunctionRecord::with_sink(
            "WRITE",
            vec![desc!($t)],
            desc!($t),
            write::<$t>,
        ))?;
    };
}

macro_rules! register_cast {
    ($reg:ident, $src:ty => $($dst:ty),*) => {$(
        $reg.register(FunctionRecord::new(
            "CAST",
            vec![desc!($src)],
            vec![desc!($dst)],
            cast::<$src, $dst>,
        ))?;
    )*};
}

macro_rules! register_casts_from {
    ($reg:ident, $($src:ty),*) => {$(
        register_cast!($reg, $src => f64, f32, u64, i64, u32, i32, u16, i16, u8, i8);
    )*};
}

macro_rules! register_arith {
    ($reg:ident, $t:ty, $name:tt, $op:tt) => {
        $reg.register(FunctionRecord::new(
            $name,
            vec![desc!($t), desc!($t)],
            vec![desc!($t)],
            $op::<$t>,
        ))?;
    };
}

macro_rules! register_compare {
    ($reg:ident, $t:ty, $name:tt, $op:tt) => {
        $reg.register(FunctionRecord::new(
            $name,
            vec![desc!($t), desc!($t)],
            vec![desc!(u8)],
            $op::<$t>,
        ))?;
    };
}

macro_rules! register_unary_float {
    ($reg:ident, $name:literal, $op:ident) => {
        $reg.register(FunctionRecord::new(
            $name,
            vec![desc!(f32)],
            vec![desc!(f32)],
            $op::<f32>,
        ))?;
        $reg.register(FunctionRecord::new(
            $name,
            vec![desc!(f64)],
            vec![desc!(f64)],
            $op::<f64>,
        ))?;
    };
}

/// Builds the standard opcode set in its canonical registration order.
///
/// Overload resolution is registration order, so every exact-type record
/// precedes the converting and promoting overloads of the same mnemonic.
pub fn standard() -> Result<Registry, Error> {
    let mut reg = Registry::new();

    for_each_numeric!(register_dup, reg);
    for_each_numeric!(register_read, reg);
    for_each_numeric!(register_write, reg);

    // converting writes: the value on the stack narrows or widens into the
    // destination variable
    reg.register(FunctionRecord::with_sink(
        "WRITE",
        vec![desc!(f64)],
        desc!(f32),
        write_converting::<f64, f32>,
    ))?;
    reg.register(FunctionRecord::with_sink(
        "WRITE",
        vec![desc!(f32)],
        desc!(f64),
        write_converting::<f32, f64>,
    ))?;

    register_casts_from!(reg, f64, f32, u64, i64, u32, i32, u16, i16, u8, i8);

    for_each_numeric!(register_arith, reg, "ADD", add_op);
    for_each_numeric!(register_arith, reg, "SUB", sub_op);
    for_each_numeric!(register_arith, reg, "MUL", mul_op);
    for_each_numeric!(register_arith, reg, "DIV", div_op);

    for_each_numeric!(register_arith, reg, "SUM", add_op);
    reg.register(FunctionRecord::new(
        "SUM",
        vec![desc!(f64), desc!(f32)],
        vec![desc!(f64)],
        sum_promote_lhs,
    ))?;
    reg.register(FunctionRecord::new(
        "SUM",
        vec![desc!(f32), desc!(f64)],
        vec![desc!(f64)],
        sum_promote_rhs,
    ))?;

    for_each_numeric!(register_arith, reg, "PROD", mul_op);
    reg.register(FunctionRecord::new(
        "PROD",
        vec![desc!(f64), desc!(f32)],
        vec![desc!(f64)],
        prod_promote_lhs,
    ))?;
    reg.register(FunctionRecord::new(
        "PROD",
        vec![desc!(f32), desc!(f64)],
        vec![desc!(f64)],
        prod_promote_rhs,
    ))?;

    register_unary_float!(reg, "SIN", sin_op);
    register_unary_float!(reg, "COS", cos_op);
    register_unary_float!(reg, "TAN", tan_op);
    register_unary_float!(reg, "EXP", exp_op);
    register_unary_float!(reg, "LOG", ln_op);
    register_unary_float!(reg, "LOG10", log10_op);

    reg.register(FunctionRecord::new(
        "POW",
        vec![desc!(f32), desc!(f32)],
        vec![desc!(f32)],
        pow_op::<f32>,
    ))?;
    reg.register(FunctionRecord::new(
        "POW",
        vec![desc!(f64), desc!(f64)],
        vec![desc!(f64)],
        pow_op::<f64>,
    ))?;
    reg.register(FunctionRecord::new(
        "POW",
        vec![desc!(f32), desc!(f64)],
        vec![desc!(f32)],
        pow_exp_f32,
    ))?;
    reg.register(FunctionRecord::new(
        "POW",
        vec![desc!(f64), desc!(f32)],
        vec![desc!(f64)],
        pow_exp_f64,
    ))?;

    for_each_numeric!(register_compare, reg, "EQ", eq_op);
    for_each_numeric!(register_compare, reg, "NEQ", neq_op);
    for_each_numeric!(register_compare, reg, "GT", gt_op);
    for_each_numeric!(register_compare, reg, "LT", lt_op);
    for_each_numeric!(register_compare, reg, "GTE", gte_op);
    for_each_numeric!(register_compare, reg, "LTE", lte_op);

    reg.register(FunctionRecord::new(
        "AND",
        vec![desc!(u8), desc!(u8)],
        vec![desc!(u8)],
        and_op,
    ))?;
    reg.register(FunctionRecord::new(
        "OR",
        vec![desc!(u8), desc!(u8)],
        vec![desc!(u8)],
        or_op,
    ))?;
    reg.register(FunctionRecord::new(
        "XOR",
        vec![desc!(u8), desc!(u8)],
        vec![desc!(u8)],
        xor_op,
    ))?;

    Ok(reg)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::TypeStack;
    use crate::types::TypeDescriptor;

    #[test]
    fn standard_set_is_well_within_capacity() {
        let reg = standard().unwrap();
        assert!(reg.len() >= 250);
        assert!(reg.len() < crate::consts::MAX_FUNCTIONS);
    }

    #[test]
    fn exact_write_wins_over_converting_write() {
        let reg = standard_registry();

        let mut stack = TypeStack::default();
        stack.push(TypeDescriptor::FLOAT32).unwrap();
        stack.push(TypeDescriptor::FLOAT32).unwrap(); // sink
        let mut data_stack = 4usize;

        let code = reg
            .find("WRITE", &mut stack, true, &mut data_stack)
            .unwrap()
            .unwrap();
        let record = reg.record(code).unwrap();
        assert_eq!(record.inputs(), [TypeDescriptor::FLOAT32]);
    }

    #[test]
    fn converting_write_accepts_a_wider_stack_value() {
        let reg = standard_registry();

        let mut stack = TypeStack::default();
        stack.push(TypeDescriptor::FLOAT64).unwrap();
        stack.push(TypeDescriptor::FLOAT32).unwrap(); // sink
        let mut data_stack = 8usize;

        let code = reg
            .find("WRITE", &mut stack, true, &mut data_stack)
            .unwrap()
            .unwrap();
        let record = reg.record(code).unwrap();
        assert_eq!(record.inputs(), [TypeDescriptor::FLOAT64]);
        assert!(stack.is_empty());
        assert_eq!(data_stack, 0);
    }

    #[test]
    fn promoting_sum_resolves_mixed_floats() {
        let reg = standard_registry();

        let mut stack = TypeStack::default();
        stack.push(TypeDescriptor::FLOAT32).unwrap();
        stack.push(TypeDescriptor::FLOAT64).unwrap();
        let mut data_stack = 12usize;

        let code = reg
            .find("SUM", &mut stack, false, &mut data_stack)
            .unwrap()
            .unwrap();
        let record = reg.record(code).unwrap();
        assert_eq!(record.outputs(), [TypeDescriptor::FLOAT64]);
        assert_eq!(stack.peek(0), Some(TypeDescriptor::FLOAT64));
        assert_eq!(data_stack, 8);
    }

    #[test]
    fn every_cast_pair_is_registered() {
        let reg = standard_registry();
        for src in TypeDescriptor::NUMERICS {
            for dst in TypeDescriptor::NUMERICS {
                let mut stack = TypeStack::default();
                stack.push(src).unwrap();
                stack.push(dst).unwrap(); // sink pushed by the CAST statement
                let mut data_stack = src.storage_size();
                let code = reg.find("CAST", &mut stack, true, &mut data_stack).unwrap();
                assert!(code.is_some(), "missing CAST {src} -> {dst}");
            }
        }
    }
}
