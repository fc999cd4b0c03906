//! Single-assignment dataflow variables
//!
//! A [`Var`] starts unbound and is bound at most once, either to a value or
//! to another variable. Variables bound to variables form chains; resolution
//! walks a chain to its representative and compresses the path on the way
//! back so later lookups are one hop.

use parking_lot::Mutex;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use thiserror::Error;

use super::value::{Value, ValueOrVar};

static NEXT_VAR_ID: AtomicU64 = AtomicU64::new(1);

/// One-shot callback fired when a variable becomes bound to a value
pub type BindCallback = Box<dyn FnOnce(&Value) + Send>;

/// Errors raised by variable binding
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum VarError {
    /// The representative variable already holds a value
    #[error("variable #{0} is already bound")]
    AlreadyBound(u64),
}

/// Dataflow variable handle
#[derive(Clone)]
pub struct Var(Arc<VarCell>);

struct VarCell {
    id: u64,
    state: Mutex<VarState>,
}

enum VarState {
    Unbound { callbacks: Vec<BindCallback> },
    Bound(Value),
    Linked(Var),
}

impl Var {
    /// Create a fresh unbound variable
    pub fn new() -> Self {
        Self(Arc::new(VarCell {
            id: NEXT_VAR_ID.fetch_add(1, Ordering::Relaxed),
            state: Mutex::new(VarState::Unbound {
                callbacks: Vec::new(),
            }),
        }))
    }

    /// Create a variable already bound to `value`
    pub fn bound(value: Value) -> Self {
        Self(Arc::new(VarCell {
            id: NEXT_VAR_ID.fetch_add(1, Ordering::Relaxed),
            state: Mutex::new(VarState::Bound(value)),
        }))
    }

    /// Process-unique variable id
    pub fn id(&self) -> u64 {
        self.0.id
    }

    /// Whether two handles name the same variable cell
    pub fn same(&self, other: &Var) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    /// Follow the binding chain to the representative variable
    pub fn representative(&self) -> Var {
        let next = {
            let state = self.0.state.lock();
            match &*state {
                VarState::Linked(next) => next.clone(),
                _ => return self.clone(),
            }
        };
        let root = next.representative();
        if !root.same(&next) {
            let mut state = self.0.state.lock();
            if let VarState::Linked(link) = &mut *state {
                *link = root.clone();
            }
        }
        root
    }

    /// Resolve to the bound value or to the unbound representative
    pub fn resolve(&self) -> ValueOrVar {
        let root = self.representative();
        let state = root.0.state.lock();
        match &*state {
            VarState::Bound(value) => ValueOrVar::Value(value.clone()),
            _ => ValueOrVar::Var(root.clone()),
        }
    }

    /// Bound value, if any
    pub fn value(&self) -> Option<Value> {
        match self.resolve() {
            ValueOrVar::Value(value) => Some(value),
            ValueOrVar::Var(_) => None,
        }
    }

    /// Whether the variable (through its chain) holds a value
    pub fn is_bound(&self) -> bool {
        self.value().is_some()
    }

    /// Bind the representative to `value`; a second bind always fails
    pub fn bind_to_value(&self, value: Value) -> Result<(), VarError> {
        let root = self.representative();
        let callbacks = {
            let mut state = root.0.state.lock();
            match &mut *state {
                VarState::Unbound { callbacks } => {
                    let callbacks = std::mem::take(callbacks);
                    *state = VarState::Bound(value.clone());
                    callbacks
                }
                _ => return Err(VarError::AlreadyBound(root.id())),
            }
        };
        for callback in callbacks {
            callback(&value);
        }
        Ok(())
    }

    /// Bind the representative of `self` to the representative of `other`
    ///
    /// Both must be unbound. Pending callbacks move to the new representative.
    pub(crate) fn link_to(&self, other: &Var) -> Result<(), VarError> {
        let root = self.representative();
        let target = other.representative();
        if root.same(&target) {
            return Ok(());
        }
        let moved = {
            let mut state = root.0.state.lock();
            match &mut *state {
                VarState::Unbound { callbacks } => {
                    let moved = std::mem::take(callbacks);
                    *state = VarState::Linked(target.clone());
                    moved
                }
                _ => return Err(VarError::AlreadyBound(root.id())),
            }
        };
        for callback in moved {
            target.on_bind(callback);
        }
        Ok(())
    }

    /// Register a callback fired once when this variable is bound to a value
    ///
    /// Fires immediately when the variable is already bound.
    pub fn on_bind(&self, callback: BindCallback) {
        let root = self.representative();
        let resolved = {
            let mut state = root.0.state.lock();
            match &mut *state {
                VarState::Unbound { callbacks } => {
                    callbacks.push(callback);
                    return;
                }
                VarState::Bound(value) => ValueOrVar::Value(value.clone()),
                VarState::Linked(next) => ValueOrVar::Var(next.clone()),
            }
        };
        match resolved {
            ValueOrVar::Value(value) => callback(&value),
            ValueOrVar::Var(next) => next.on_bind(callback),
        }
    }
}

impl Default for Var {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Var {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.resolve() {
            ValueOrVar::Value(value) => write!(f, "Var(#{} = {})", self.id(), value),
            ValueOrVar::Var(root) => write!(f, "Var(#{})", root.id()),
        }
    }
}
