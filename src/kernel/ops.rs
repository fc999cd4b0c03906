//! Arithmetic and comparison primitives

use std::cmp::Ordering;

use super::decimal::Dec128;
use super::error::{MachineError, MachineResult};
use super::stmt::{ArithOp, RelOp};
use super::value::Value;

fn overflow(op: ArithOp) -> MachineError {
    match op {
        ArithOp::Div | ArithOp::Mod => {
            MachineError::Arithmetic("division by zero or overflow".into())
        }
        _ => MachineError::Arithmetic("integer overflow".into()),
    }
}

fn int32(op: ArithOp, a: i32, b: i32) -> MachineResult<Value> {
    let result = match op {
        ArithOp::Add => a.checked_add(b),
        ArithOp::Sub => a.checked_sub(b),
        ArithOp::Mul => a.checked_mul(b),
        ArithOp::Div => a.checked_div(b),
        ArithOp::Mod => a.checked_rem(b),
    };
    result.map(Value::Int32).ok_or_else(|| overflow(op))
}

fn int64(op: ArithOp, a: i64, b: i64) -> MachineResult<Value> {
    let result = match op {
        ArithOp::Add => a.checked_add(b),
        ArithOp::Sub => a.checked_sub(b),
        ArithOp::Mul => a.checked_mul(b),
        ArithOp::Div => a.checked_div(b),
        ArithOp::Mod => a.checked_rem(b),
    };
    result.map(Value::Int64).ok_or_else(|| overflow(op))
}

fn dec128(op: ArithOp, a: Dec128, b: Dec128) -> MachineResult<Value> {
    let result = match op {
        ArithOp::Add => a.checked_add(&b),
        ArithOp::Sub => a.checked_sub(&b),
        ArithOp::Mul => a.checked_mul(&b),
        ArithOp::Div => a.checked_div(&b),
        ArithOp::Mod => a.checked_rem(&b),
    };
    result.map(Value::Dec128).ok_or_else(|| overflow(op))
}

fn flt64(op: ArithOp, a: f64, b: f64) -> Value {
    Value::Flt64(match op {
        ArithOp::Add => a + b,
        ArithOp::Sub => a - b,
        ArithOp::Mul => a * b,
        ArithOp::Div => a / b,
        ArithOp::Mod => a % b,
    })
}

fn flt32(op: ArithOp, a: f32, b: f32) -> Value {
    Value::Flt32(match op {
        ArithOp::Add => a + b,
        ArithOp::Sub => a - b,
        ArithOp::Mul => a * b,
        ArithOp::Div => a / b,
        ArithOp::Mod => a % b,
    })
}

fn as_dec(value: &Value) -> Option<Dec128> {
    match value {
        Value::Dec128(d) => Some(*d),
        other => other.as_i64().map(Dec128::from_i64),
    }
}

/// Apply a binary arithmetic operator to determined operands
///
/// Int32 stays Int32 (checked), mixed integer widths widen to Int64, any
/// float widens to float, Dec128 absorbs integers, and `Str + Str` concatenates.
pub fn arith(op: ArithOp, a: &Value, b: &Value) -> MachineResult<Value> {
    match (a, b) {
        (Value::Int32(x), Value::Int32(y)) => int32(op, *x, *y),
        (Value::Int32(_) | Value::Int64(_), Value::Int32(_) | Value::Int64(_)) => {
            let (x, y) = (a.as_i64().unwrap_or_default(), b.as_i64().unwrap_or_default());
            int64(op, x, y)
        }
        (Value::Str(x), Value::Str(y)) if op == ArithOp::Add => {
            Ok(Value::str(format!("{}{}", x, y)))
        }
        (Value::Dec128(_), Value::Int32(_) | Value::Int64(_) | Value::Dec128(_))
        | (Value::Int32(_) | Value::Int64(_), Value::Dec128(_)) => match (as_dec(a), as_dec(b)) {
            (Some(x), Some(y)) => dec128(op, x, y),
            _ => Err(MachineError::type_mismatch("Dec128", b)),
        },
        (Value::Flt32(x), Value::Flt32(y)) => Ok(flt32(op, *x, *y)),
        (Value::Flt32(x), Value::Int32(_) | Value::Int64(_)) => {
            Ok(flt32(op, *x, b.as_f64().unwrap_or_default() as f32))
        }
        (Value::Int32(_) | Value::Int64(_), Value::Flt32(y)) => {
            Ok(flt32(op, a.as_f64().unwrap_or_default() as f32, *y))
        }
        (Value::Flt64(_), Value::Int32(_) | Value::Int64(_) | Value::Flt32(_) | Value::Flt64(_))
        | (Value::Int32(_) | Value::Int64(_) | Value::Flt32(_), Value::Flt64(_)) => {
            match (a.as_f64(), b.as_f64()) {
                (Some(x), Some(y)) => Ok(flt64(op, x, y)),
                _ => Err(MachineError::type_mismatch("Flt64", b)),
            }
        }
        (
            Value::Int32(_)
            | Value::Int64(_)
            | Value::Flt32(_)
            | Value::Flt64(_)
            | Value::Dec128(_),
            other,
        )
        | (Value::Str(_), other) => Err(MachineError::type_mismatch(a.type_name(), other)),
        (other, _) => Err(MachineError::type_mismatch("number", other)),
    }
}

/// Arithmetic negation
pub fn negate(value: &Value) -> MachineResult<Value> {
    match value {
        Value::Int32(i) => i.checked_neg().map(Value::Int32).ok_or_else(|| overflow(ArithOp::Sub)),
        Value::Int64(i) => i.checked_neg().map(Value::Int64).ok_or_else(|| overflow(ArithOp::Sub)),
        Value::Flt32(f) => Ok(Value::Flt32(-f)),
        Value::Flt64(f) => Ok(Value::Flt64(-f)),
        Value::Dec128(d) => d
            .checked_neg()
            .map(Value::Dec128)
            .ok_or_else(|| overflow(ArithOp::Sub)),
        other => Err(MachineError::type_mismatch("number", other)),
    }
}

/// Boolean negation
pub fn not(value: &Value) -> MachineResult<Value> {
    match value {
        Value::Bool(b) => Ok(Value::Bool(!b)),
        other => Err(MachineError::type_mismatch("Bool", other)),
    }
}

/// Ordering comparison of numbers, strings, or characters
pub fn relational(op: RelOp, a: &Value, b: &Value) -> MachineResult<Value> {
    let ordering = a.compare(b).ok_or_else(|| MachineError::TypeMismatch {
        expected: a.type_name(),
        found: b.to_string(),
    })?;
    let result = match op {
        RelOp::Lt => ordering == Ordering::Less,
        RelOp::Le => ordering != Ordering::Greater,
        RelOp::Gt => ordering == Ordering::Greater,
        RelOp::Ge => ordering != Ordering::Less,
    };
    Ok(Value::Bool(result))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_int32_overflow_is_an_error() {
        let err = arith(ArithOp::Add, &Value::Int32(i32::MAX), &Value::Int32(1)).unwrap_err();
        assert_eq!(err.name(), "ArithmeticError");
        assert_eq!(
            arith(ArithOp::Add, &Value::Int32(i32::MAX), &Value::Int64(1)).unwrap(),
            Value::Int64(i32::MAX as i64 + 1)
        );
    }

    #[test]
    fn test_division_by_zero() {
        assert!(arith(ArithOp::Div, &Value::Int32(1), &Value::Int32(0)).is_err());
        assert!(arith(ArithOp::Mod, &Value::Int64(1), &Value::Int64(0)).is_err());
    }

    #[test]
    fn test_widening_and_concat() {
        assert_eq!(
            arith(ArithOp::Mul, &Value::Int32(2), &Value::Flt64(1.5)).unwrap(),
            Value::Flt64(3.0)
        );
        assert_eq!(
            arith(ArithOp::Add, &Value::str("ab"), &Value::str("cd")).unwrap(),
            Value::str("abcd")
        );
        let dec = arith(
            ArithOp::Add,
            &Value::Dec128(Dec128::parse("1.25").unwrap()),
            &Value::Int32(1),
        )
        .unwrap();
        assert_eq!(dec.to_string(), "2.25m");
        assert!(arith(ArithOp::Sub, &Value::str("a"), &Value::Int32(1)).is_err());
    }

    #[test]
    fn test_relational() {
        assert_eq!(
            relational(RelOp::Le, &Value::Int32(2), &Value::Int64(2)).unwrap(),
            Value::Bool(true)
        );
        assert_eq!(
            relational(RelOp::Gt, &Value::str("b"), &Value::str("a")).unwrap(),
            Value::Bool(true)
        );
        assert!(relational(RelOp::Lt, &Value::Bool(true), &Value::Int32(1)).is_err());
    }
}
