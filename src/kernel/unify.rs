//! Strict unification
//!
//! Unification never suspends: unbound variables are bound (or linked) and
//! determined values must match exactly. A mismatch is an immediate
//! [`MachineError::Unification`]; bindings made before the mismatch stay.

use std::sync::Arc;

use super::error::{MachineError, MachineResult};
use super::value::{Rec, Value, ValueOrVar};
use super::var::Var;

/// Unify two operands
pub fn unify(left: &ValueOrVar, right: &ValueOrVar) -> MachineResult<()> {
    match (left.resolve(), right.resolve()) {
        (ValueOrVar::Var(a), ValueOrVar::Var(b)) => link_vars(&a, &b),
        (ValueOrVar::Var(var), ValueOrVar::Value(value))
        | (ValueOrVar::Value(value), ValueOrVar::Var(var)) => {
            var.bind_to_value(value)?;
            Ok(())
        }
        (ValueOrVar::Value(a), ValueOrVar::Value(b)) => unify_values(&a, &b),
    }
}

/// Bind the variable with the higher id to the one with the lower id
///
/// Choosing by id makes `unify(a, b)` and `unify(b, a)` produce the same chain.
fn link_vars(a: &Var, b: &Var) -> MachineResult<()> {
    if a.same(b) {
        return Ok(());
    }
    if a.id() > b.id() {
        a.link_to(b)?;
    } else {
        b.link_to(a)?;
    }
    Ok(())
}

fn unify_values(a: &Value, b: &Value) -> MachineResult<()> {
    match (a, b) {
        (Value::Rec(x), Value::Rec(y)) => unify_recs(x, y),
        _ if a == b => Ok(()),
        _ => Err(mismatch(a, b)),
    }
}

fn unify_recs(x: &Arc<Rec>, y: &Arc<Rec>) -> MachineResult<()> {
    if Arc::ptr_eq(x, y) {
        return Ok(());
    }
    if !x.same_arity(y) {
        return Err(MachineError::Unification {
            left: Value::Rec(x.clone()).to_string(),
            right: Value::Rec(y.clone()).to_string(),
        });
    }
    for ((_, left), (_, right)) in x.fields().iter().zip(y.fields().iter()) {
        unify(left, right)?;
    }
    Ok(())
}

fn mismatch(a: &Value, b: &Value) -> MachineError {
    MachineError::Unification {
        left: a.to_string(),
        right: b.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kernel::value::Feature;

    fn partial(label: &str, field: ValueOrVar) -> ValueOrVar {
        let rec = Rec::new(Some(Feature::str(label)), vec![(Feature::str("a"), field)]).unwrap();
        ValueOrVar::Value(Value::Rec(Arc::new(rec)))
    }

    #[test]
    fn test_unify_binds_nested_var() {
        let hole = Var::new();
        let left = partial("p", hole.clone().into());
        let right = partial("p", Value::Int32(5).into());
        unify(&left, &right).unwrap();
        assert_eq!(hole.value(), Some(Value::Int32(5)));
    }

    #[test]
    fn test_unify_is_symmetric_for_vars() {
        let a = Var::new();
        let b = Var::new();
        unify(&b.clone().into(), &a.clone().into()).unwrap();
        let (low, high) = if a.id() < b.id() { (&a, &b) } else { (&b, &a) };
        assert!(high.representative().same(low));

        let c = Var::new();
        let d = Var::new();
        unify(&c.clone().into(), &d.clone().into()).unwrap();
        let (low, high) = if c.id() < d.id() { (&c, &d) } else { (&d, &c) };
        assert!(high.representative().same(low));
    }

    #[test]
    fn test_unify_mismatch_fails_both_ways() {
        let one: ValueOrVar = Value::Int32(1).into();
        let two: ValueOrVar = Value::Int32(2).into();
        assert!(matches!(unify(&one, &two), Err(MachineError::Unification { .. })));
        assert!(matches!(unify(&two, &one), Err(MachineError::Unification { .. })));

        let p = partial("p", Value::Int32(1).into());
        let q = partial("q", Value::Int32(1).into());
        assert!(unify(&p, &q).is_err());
        assert!(unify(&q, &p).is_err());
    }

    #[test]
    fn test_rebinding_is_a_mismatch() {
        let var = Var::bound(Value::str("x"));
        let err = unify(&var.into(), &Value::str("y").into()).unwrap_err();
        assert_eq!(err.name(), "UnificationError");
    }
}
