//! Built-in `system` module
//!
//! Exports `Cell`, `Iter`, `RangeIter` and `HashMap`, each a record with a
//! `new` constructor. Iterators are one-argument procedures that bind the
//! next element, or `eof` once exhausted. `HashMap.get` answers `null` for
//! a missing key.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, AtomicUsize, Ordering};
use std::sync::{Arc, LazyLock};

use super::error::MachineError;
use super::machine::{Interrupt, NativeCtx, bind_result, require, require_complete};
use super::value::{CellObj, Feature, HostObj, NativeProc, Rec, Value, ValueOrVar};

/// Path of the built-in module
pub const SYSTEM_MODULE: &str = "system";

static ITER_NEW: LazyLock<Arc<NativeProc>> =
    LazyLock::new(|| Arc::new(NativeProc::new("Iter.new", 2, iter_new_body)));

/// `Iter.new(source, result)`, also used directly by `for` loops
pub fn iter_new() -> Value {
    Value::Native(ITER_NEW.clone())
}

fn native<F>(name: &str, arity: usize, body: F) -> Value
where
    F: Fn(&mut NativeCtx<'_>, &[ValueOrVar]) -> Result<(), Interrupt> + Send + Sync + 'static,
{
    Value::Native(Arc::new(NativeProc::new(name, arity, body)))
}

fn class(constructor: Value) -> Value {
    Value::rec(None, vec![(Feature::str("new"), constructor)])
        .unwrap_or_else(|_| Value::tuple(None, Vec::new()))
}

/// Exports of the `system` module
pub fn system_module() -> Value {
    let exports = vec![
        (Feature::str("Cell"), class(native("Cell.new", 2, cell_new))),
        (Feature::str("HashMap"), class(native("HashMap.new", 1, hash_map_new))),
        (Feature::str("Iter"), class(iter_new())),
        (Feature::str("RangeIter"), class(native("RangeIter.new", 3, range_iter_new))),
    ];
    Value::rec(None, exports).unwrap_or_else(|_| Value::tuple(None, Vec::new()))
}

fn cell_new(_ctx: &mut NativeCtx<'_>, args: &[ValueOrVar]) -> Result<(), Interrupt> {
    let cell = CellObj::new(args[0].clone());
    bind_result(&args[1], Value::Cell(Arc::new(cell)))
}

fn iter_new_body(_ctx: &mut NativeCtx<'_>, args: &[ValueOrVar]) -> Result<(), Interrupt> {
    let source = require(&args[0])?;
    let iter = match source {
        Value::Rec(rec) => rec_iter(rec),
        proc if proc.is_proc() => proc,
        other => return Err(MachineError::type_mismatch("Rec or Proc", &other).into()),
    };
    bind_result(&args[1], iter)
}

fn rec_iter(rec: Arc<Rec>) -> Value {
    let position = AtomicUsize::new(0);
    native("Iter.next", 1, move |_ctx, args| {
        let index = position.fetch_add(1, Ordering::SeqCst);
        match rec.fields().get(index) {
            Some((_, field)) => {
                super::unify::unify(&args[0], field)?;
                Ok(())
            }
            None => {
                position.store(rec.len(), Ordering::SeqCst);
                bind_result(&args[0], Value::Eof)
            }
        }
    })
}

fn range_iter_new(_ctx: &mut NativeCtx<'_>, args: &[ValueOrVar]) -> Result<(), Interrupt> {
    let from = require(&args[0])?;
    let to = require(&args[1])?;
    let (Some(start), Some(end)) = (from.as_i64(), to.as_i64()) else {
        let bad = if from.as_i64().is_none() { &from } else { &to };
        return Err(MachineError::type_mismatch("Int", bad).into());
    };
    let narrow = matches!((&from, &to), (Value::Int32(_), Value::Int32(_)));
    let next = AtomicI64::new(start);
    let iter = native("RangeIter.next", 1, move |_ctx, args| {
        let current = next.load(Ordering::SeqCst);
        if current >= end {
            return bind_result(&args[0], Value::Eof);
        }
        next.store(current + 1, Ordering::SeqCst);
        let value = if narrow {
            Value::Int32(current as i32)
        } else {
            Value::Int64(current)
        };
        bind_result(&args[0], value)
    });
    bind_result(&args[2], iter)
}

/// Mutable hash map exposed to programs as a host object
#[derive(Debug, Default)]
pub struct HashMapObj {
    entries: Arc<Mutex<HashMap<Feature, Value>>>,
}

impl HashMapObj {
    /// Number of entries
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    /// Whether the map is empty
    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}

fn key_of(arg: &ValueOrVar) -> Result<Feature, Interrupt> {
    let key = require_complete(arg)?;
    key.to_feature()
        .ok_or_else(|| MachineError::InvalidKey(key.to_string()).into())
}

impl HostObj for HashMapObj {
    fn type_name(&self) -> &str {
        "HashMap"
    }

    fn select(&self, feature: &Feature) -> Option<Value> {
        let Feature::Str(name) = feature else {
            return None;
        };
        let entries = self.entries.clone();
        let method = match name.as_ref() {
            "get" => native("HashMap.get", 2, move |_ctx, args| {
                let key = key_of(&args[0])?;
                let found = entries.lock().get(&key).cloned();
                bind_result(&args[1], found.unwrap_or(Value::Null))
            }),
            "put" => native("HashMap.put", 2, move |_ctx, args| {
                let key = key_of(&args[0])?;
                let value = require_complete(&args[1])?;
                entries.lock().insert(key, value);
                Ok(())
            }),
            "remove" => native("HashMap.remove", 2, move |_ctx, args| {
                let key = key_of(&args[0])?;
                let removed = entries.lock().remove(&key);
                bind_result(&args[1], removed.unwrap_or(Value::Null))
            }),
            "contains_key" => native("HashMap.contains_key", 2, move |_ctx, args| {
                let key = key_of(&args[0])?;
                let found = entries.lock().contains_key(&key);
                bind_result(&args[1], Value::Bool(found))
            }),
            "size" => native("HashMap.size", 1, move |_ctx, args| {
                let size = entries.lock().len() as i32;
                bind_result(&args[0], Value::Int32(size))
            }),
            _ => return None,
        };
        Some(method)
    }
}

fn hash_map_new(_ctx: &mut NativeCtx<'_>, args: &[ValueOrVar]) -> Result<(), Interrupt> {
    bind_result(&args[0], Value::Obj(Arc::new(HashMapObj::default())))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kernel::machine::DetachedHost;
    use crate::kernel::var::Var;
    use crate::util::span::Span;

    fn call(proc: &Value, args: &[ValueOrVar]) -> Result<(), Interrupt> {
        let Value::Native(native) = proc else {
            panic!("not a native: {}", proc);
        };
        let span = Span::none();
        let mut host = DetachedHost;
        let mut ctx = NativeCtx {
            span: &span,
            host: &mut host,
        };
        native.invoke(&mut ctx, args)
    }

    fn next(iter: &Value) -> Value {
        let out = Var::new();
        call(iter, &[out.clone().into()]).unwrap();
        out.value().unwrap()
    }

    #[test]
    fn test_tuple_iterator_yields_elements_then_eof() {
        let tuple = Value::tuple(None, vec![Value::Int32(1), Value::Int32(2)]);
        let iter = Var::new();
        call(&iter_new(), &[tuple.into(), iter.clone().into()]).unwrap();
        let iter = iter.value().unwrap();
        assert_eq!(next(&iter), Value::Int32(1));
        assert_eq!(next(&iter), Value::Int32(2));
        assert_eq!(next(&iter), Value::Eof);
        assert_eq!(next(&iter), Value::Eof);
    }

    #[test]
    fn test_iter_waits_on_unbound_source() {
        let source = Var::new();
        let err = call(&iter_new(), &[source.clone().into(), Var::new().into()]).unwrap_err();
        assert!(matches!(err, Interrupt::Wait(var) if var.same(&source)));
    }

    #[test]
    fn test_range_iterator() {
        let module = system_module();
        let Value::Rec(module) = module else {
            panic!("module is a record");
        };
        let class = module.get(&Feature::str("RangeIter")).unwrap().value().unwrap();
        let Value::Rec(class) = class else {
            panic!("class is a record");
        };
        let ctor = class.get(&Feature::str("new")).unwrap().value().unwrap();
        let iter = Var::new();
        call(
            &ctor,
            &[Value::Int32(3).into(), Value::Int32(5).into(), iter.clone().into()],
        )
        .unwrap();
        let iter = iter.value().unwrap();
        assert_eq!(next(&iter), Value::Int32(3));
        assert_eq!(next(&iter), Value::Int32(4));
        assert_eq!(next(&iter), Value::Eof);
    }

    #[test]
    fn test_hash_map_missing_key_is_null() {
        let map = HashMapObj::default();
        let put = map.select(&Feature::str("put")).unwrap();
        let get = map.select(&Feature::str("get")).unwrap();
        call(&put, &[Value::str("a").into(), Value::Int32(1).into()]).unwrap();
        let found = Var::new();
        call(&get, &[Value::str("a").into(), found.clone().into()]).unwrap();
        assert_eq!(found.value(), Some(Value::Int32(1)));
        let missing = Var::new();
        call(&get, &[Value::str("b").into(), missing.clone().into()]).unwrap();
        assert_eq!(missing.value(), Some(Value::Null));
        assert_eq!(map.len(), 1);
        assert!(map.select(&Feature::str("frobnicate")).is_none());
    }
}
