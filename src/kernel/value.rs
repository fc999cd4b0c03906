//! Kernel values
//!
//! [`Value`] is the universal result type of the machine. Records and tuples
//! share one representation ([`Rec`]): a tuple is a record whose features are
//! exactly `0..n`. Record fields hold [`ValueOrVar`], so a record may be
//! *partial* (some field still an unbound variable) or *complete*.

use parking_lot::Mutex;
use std::cmp::Ordering;
use std::fmt;
use std::sync::Arc;

use super::decimal::Dec128;
use super::env::Env;
use super::ident::is_plain_name;
use super::machine::{Interrupt, NativeCtx};
use super::stmt::ProcDef;
use super::var::Var;
use crate::runtime::envelope::ActorRefHandle;
use crate::util::span::Span;

/// Record feature (field name) or record label
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Feature {
    /// Integer feature; tuple positions use `0..n`
    Int(i64),
    /// String feature
    Str(Arc<str>),
    /// Boolean feature
    Bool(bool),
    /// Character feature
    Char(char),
    /// `eof` literal
    Eof,
    /// `null` literal
    Null,
    /// `nothing` literal
    Nothing,
}

impl Feature {
    /// String feature
    pub fn str(text: impl Into<Arc<str>>) -> Self {
        Feature::Str(text.into())
    }

    /// Feature as a value
    pub fn to_value(&self) -> Value {
        match self {
            Feature::Int(i) => match i32::try_from(*i) {
                Ok(small) => Value::Int32(small),
                Err(_) => Value::Int64(*i),
            },
            Feature::Str(s) => Value::Str(s.clone()),
            Feature::Bool(b) => Value::Bool(*b),
            Feature::Char(c) => Value::Char(*c),
            Feature::Eof => Value::Eof,
            Feature::Null => Value::Null,
            Feature::Nothing => Value::Nothing,
        }
    }
}

impl fmt::Display for Feature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Feature::Str(name) if is_plain_name(name) => write!(f, "{}", name),
            other => write!(f, "{}", other.to_value()),
        }
    }
}

/// Either a value or an (unresolved) variable
#[derive(Debug, Clone)]
pub enum ValueOrVar {
    /// Determined value
    Value(Value),
    /// Variable, possibly unbound
    Var(Var),
}

impl ValueOrVar {
    /// Follow variables to a value, or to the unbound representative
    pub fn resolve(&self) -> ValueOrVar {
        match self {
            ValueOrVar::Value(value) => ValueOrVar::Value(value.clone()),
            ValueOrVar::Var(var) => var.resolve(),
        }
    }

    /// Resolved value, if determined
    pub fn value(&self) -> Option<Value> {
        match self.resolve() {
            ValueOrVar::Value(value) => Some(value),
            ValueOrVar::Var(_) => None,
        }
    }

    /// Resolved value, or the variable blocking it
    pub fn require(&self) -> Result<Value, Var> {
        match self.resolve() {
            ValueOrVar::Value(value) => Ok(value),
            ValueOrVar::Var(var) => Err(var),
        }
    }

    /// Resolve and require the value to be complete
    pub fn check_complete(&self) -> Result<Value, Var> {
        self.require()?.check_complete()
    }
}

impl From<Value> for ValueOrVar {
    fn from(value: Value) -> Self {
        ValueOrVar::Value(value)
    }
}

impl From<Var> for ValueOrVar {
    fn from(var: Var) -> Self {
        ValueOrVar::Var(var)
    }
}

/// Record (or tuple) value
#[derive(Debug, Clone)]
pub struct Rec {
    label: Option<Feature>,
    fields: Vec<(Feature, ValueOrVar)>,
}

impl Rec {
    /// Build a record; fields are sorted by feature. Returns the duplicate feature on error.
    pub fn new(
        label: Option<Feature>,
        mut fields: Vec<(Feature, ValueOrVar)>,
    ) -> Result<Self, Feature> {
        fields.sort_by(|a, b| a.0.cmp(&b.0));
        for pair in fields.windows(2) {
            if pair[0].0 == pair[1].0 {
                return Err(pair[0].0.clone());
            }
        }
        Ok(Self { label, fields })
    }

    /// Build a tuple with features `0..n`
    pub fn tuple(label: Option<Feature>, values: Vec<ValueOrVar>) -> Self {
        let fields = values
            .into_iter()
            .enumerate()
            .map(|(i, v)| (Feature::Int(i as i64), v))
            .collect();
        Self { label, fields }
    }

    /// Record label (`None` is the default label)
    pub fn label(&self) -> Option<&Feature> {
        self.label.as_ref()
    }

    /// Fields in canonical feature order
    pub fn fields(&self) -> &[(Feature, ValueOrVar)] {
        &self.fields
    }

    /// Number of fields
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Whether the record has no fields
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Whether the features are exactly `0..n`
    pub fn is_tuple(&self) -> bool {
        self.fields
            .iter()
            .enumerate()
            .all(|(i, (feature, _))| *feature == Feature::Int(i as i64))
    }

    /// Field value or variable at `feature`
    pub fn get(&self, feature: &Feature) -> Option<&ValueOrVar> {
        self.fields
            .binary_search_by(|(f, _)| f.cmp(feature))
            .ok()
            .map(|index| &self.fields[index].1)
    }

    /// Whether `other` has exactly the same label and features
    pub fn same_arity(&self, other: &Rec) -> bool {
        self.label == other.label
            && self.fields.len() == other.fields.len()
            && self
                .fields
                .iter()
                .zip(other.fields.iter())
                .all(|(a, b)| a.0 == b.0)
    }

    fn check_complete(self: &Arc<Self>) -> Result<Value, Var> {
        let mut rebuilt = None;
        for (index, (feature, field)) in self.fields.iter().enumerate() {
            let value = field.check_complete()?;
            let unchanged =
                matches!(field, ValueOrVar::Value(existing) if existing.same_identity(&value));
            if !unchanged {
                let fields = rebuilt.get_or_insert_with(|| self.fields[..index].to_vec());
                fields.push((feature.clone(), ValueOrVar::Value(value)));
            } else if let Some(fields) = rebuilt.as_mut() {
                fields.push((feature.clone(), ValueOrVar::Value(value)));
            }
        }
        match rebuilt {
            None => Ok(Value::Rec(self.clone())),
            Some(fields) => Ok(Value::Rec(Arc::new(Rec {
                label: self.label.clone(),
                fields,
            }))),
        }
    }
}

/// Closure: procedure definition plus its captured environment
#[derive(Debug)]
pub struct Closure {
    /// Procedure definition
    pub def: Arc<ProcDef>,
    /// Captured free variables
    pub env: Env,
}

/// Signature of a native procedure body
pub type NativeFn =
    dyn Fn(&mut NativeCtx<'_>, &[ValueOrVar]) -> Result<(), Interrupt> + Send + Sync;

/// Procedure implemented in Rust
pub struct NativeProc {
    /// Display name
    pub name: String,
    /// Number of arguments (including a trailing result argument)
    pub arity: usize,
    body: Box<NativeFn>,
}

impl NativeProc {
    /// Create a native procedure
    pub fn new<F>(name: impl Into<String>, arity: usize, body: F) -> Self
    where
        F: Fn(&mut NativeCtx<'_>, &[ValueOrVar]) -> Result<(), Interrupt> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            arity,
            body: Box::new(body),
        }
    }

    /// Invoke the procedure
    pub fn invoke(&self, ctx: &mut NativeCtx<'_>, args: &[ValueOrVar]) -> Result<(), Interrupt> {
        (self.body)(ctx, args)
    }
}

impl fmt::Debug for NativeProc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NativeProc({}/{})", self.name, self.arity)
    }
}

/// Mutable cell holding a value or variable
#[derive(Debug)]
pub struct CellObj {
    content: Mutex<ValueOrVar>,
}

impl CellObj {
    /// Create a cell with an initial content
    pub fn new(initial: ValueOrVar) -> Self {
        Self {
            content: Mutex::new(initial),
        }
    }

    /// Current content
    pub fn get(&self) -> ValueOrVar {
        self.content.lock().clone()
    }

    /// Replace the content
    pub fn set(&self, content: ValueOrVar) {
        *self.content.lock() = content;
    }
}

/// Actor configurator: applied to construction arguments it yields an [`ActorCfg`]
#[derive(Debug)]
pub struct ActorCfgtr {
    /// Handler constructor (`formals..., $handlers`)
    pub ctor: Arc<Closure>,
}

impl ActorCfgtr {
    /// Number of construction arguments
    pub fn arg_count(&self) -> usize {
        self.ctor.def.formals.len().saturating_sub(1)
    }
}

/// Everything needed to configure a fresh actor
#[derive(Debug)]
pub struct ActorCfg {
    /// Handler constructor (`formals..., $handlers`)
    pub ctor: Arc<Closure>,
    /// Complete construction arguments
    pub args: Vec<Value>,
}

/// Opaque object supplied by the host
pub trait HostObj: fmt::Debug + Send + Sync {
    /// Type name used in diagnostics
    fn type_name(&self) -> &str;

    /// Select a member (typically a native method)
    fn select(&self, feature: &Feature) -> Option<Value>;
}

/// A captured computation failure, usable as an ordinary value
#[derive(Debug)]
pub struct FailedValue {
    /// Address of the actor (or evaluator) that failed
    pub address: String,
    /// Uncaught error value
    pub error: Value,
    /// Source spans of the stack frames at failure time, innermost first
    pub stack: Vec<Span>,
    /// Failure that caused this one, when it crossed an actor boundary
    pub parent: Option<Arc<FailedValue>>,
    /// Rust-level error detail, when the failure started as a kernel error
    pub native_cause: Option<String>,
}

impl FailedValue {
    /// Name of the error record, if it is one
    pub fn error_name(&self) -> Option<Arc<str>> {
        self.error.error_name()
    }

    /// Innermost failure in the parent chain
    pub fn root_cause(&self) -> &FailedValue {
        let mut current = self;
        while let Some(parent) = &current.parent {
            current = parent;
        }
        current
    }
}

impl fmt::Display for FailedValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "failed at {}: {}", self.address, self.error)?;
        if let Some(parent) = &self.parent {
            write!(f, " (caused by {})", parent)?;
        }
        Ok(())
    }
}

/// Kernel value
#[derive(Clone)]
pub enum Value {
    /// 32-bit integer
    Int32(i32),
    /// 64-bit integer
    Int64(i64),
    /// 32-bit float
    Flt32(f32),
    /// 64-bit float
    Flt64(f64),
    /// 128-bit decimal
    Dec128(Dec128),
    /// String
    Str(Arc<str>),
    /// Boolean
    Bool(bool),
    /// Character
    Char(char),
    /// End-of-stream marker
    Eof,
    /// Absence of a value
    Nothing,
    /// Null reference
    Null,
    /// Record or tuple, possibly partial
    Rec(Arc<Rec>),
    /// User procedure
    Closure(Arc<Closure>),
    /// Native procedure
    Native(Arc<NativeProc>),
    /// Mutable cell
    Cell(Arc<CellObj>),
    /// Actor configurator
    ActorCfgtr(Arc<ActorCfgtr>),
    /// Actor configuration ready to spawn
    ActorCfg(Arc<ActorCfg>),
    /// Reference to a running actor
    ActorRef(ActorRefHandle),
    /// Opaque host object
    Obj(Arc<dyn HostObj>),
    /// Error captured as a value
    Failed(Arc<FailedValue>),
}

impl Value {
    /// String value
    pub fn str(text: impl Into<Arc<str>>) -> Self {
        Value::Str(text.into())
    }

    /// Record value from complete fields
    pub fn rec(label: Option<Feature>, fields: Vec<(Feature, Value)>) -> Result<Self, Feature> {
        let fields = fields
            .into_iter()
            .map(|(f, v)| (f, ValueOrVar::Value(v)))
            .collect();
        Ok(Value::Rec(Arc::new(Rec::new(label, fields)?)))
    }

    /// Tuple value from complete elements
    pub fn tuple(label: Option<Feature>, values: Vec<Value>) -> Self {
        Value::Rec(Arc::new(Rec::tuple(
            label,
            values.into_iter().map(ValueOrVar::Value).collect(),
        )))
    }

    /// Error record `'error'#{name: ..., message: ...}` plus extra fields
    pub fn error(name: &str, message: impl Into<Arc<str>>, extra: Vec<(&str, Value)>) -> Self {
        let mut fields = vec![
            (Feature::str("name"), ValueOrVar::Value(Value::str(name))),
            (
                Feature::str("message"),
                ValueOrVar::Value(Value::Str(message.into())),
            ),
        ];
        for (feature, value) in extra {
            fields.push((Feature::str(feature), ValueOrVar::Value(value)));
        }
        let rec = Rec::new(Some(Feature::str("error")), fields)
            .unwrap_or_else(|_| Rec::tuple(Some(Feature::str("error")), Vec::new()));
        Value::Rec(Arc::new(rec))
    }

    /// `name` field of an error record
    pub fn error_name(&self) -> Option<Arc<str>> {
        match self {
            Value::Rec(rec) if rec.label() == Some(&Feature::str("error")) => {
                match rec.get(&Feature::str("name"))?.value()? {
                    Value::Str(name) => Some(name),
                    _ => None,
                }
            }
            Value::Failed(failed) => failed.error_name(),
            _ => None,
        }
    }

    /// Convert a scalar value to a record feature
    pub fn to_feature(&self) -> Option<Feature> {
        match self {
            Value::Int32(i) => Some(Feature::Int(*i as i64)),
            Value::Int64(i) => Some(Feature::Int(*i)),
            Value::Str(s) => Some(Feature::Str(s.clone())),
            Value::Bool(b) => Some(Feature::Bool(*b)),
            Value::Char(c) => Some(Feature::Char(*c)),
            Value::Eof => Some(Feature::Eof),
            Value::Null => Some(Feature::Null),
            Value::Nothing => Some(Feature::Nothing),
            _ => None,
        }
    }

    /// Type name used in error messages
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Int32(_) => "Int32",
            Value::Int64(_) => "Int64",
            Value::Flt32(_) => "Flt32",
            Value::Flt64(_) => "Flt64",
            Value::Dec128(_) => "Dec128",
            Value::Str(_) => "Str",
            Value::Bool(_) => "Bool",
            Value::Char(_) => "Char",
            Value::Eof => "Eof",
            Value::Nothing => "Nothing",
            Value::Null => "Null",
            Value::Rec(rec) if rec.is_tuple() => "Tuple",
            Value::Rec(_) => "Rec",
            Value::Closure(_) | Value::Native(_) => "Proc",
            Value::Cell(_) => "Cell",
            Value::ActorCfgtr(_) => "ActorCfgtr",
            Value::ActorCfg(_) => "ActorCfg",
            Value::ActorRef(_) => "ActorRef",
            Value::Obj(_) => "Obj",
            Value::Failed(_) => "FailedValue",
        }
    }

    /// Whether this is a procedure
    pub fn is_proc(&self) -> bool {
        matches!(self, Value::Closure(_) | Value::Native(_))
    }

    /// Return the value with every nested variable resolved, or the first unbound variable
    ///
    /// Procedures, cells and actor values count as complete.
    pub fn check_complete(&self) -> Result<Value, Var> {
        match self {
            Value::Rec(rec) => rec.check_complete(),
            other => Ok(other.clone()),
        }
    }

    fn same_identity(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Rec(a), Value::Rec(b)) => Arc::ptr_eq(a, b),
            _ => self == other,
        }
    }

    /// Numeric or lexical ordering between comparable scalar values
    pub fn compare(&self, other: &Value) -> Option<Ordering> {
        match (self, other) {
            (Value::Str(a), Value::Str(b)) => Some(a.cmp(b)),
            (Value::Char(a), Value::Char(b)) => Some(a.cmp(b)),
            (Value::Bool(a), Value::Bool(b)) => Some(a.cmp(b)),
            (Value::Dec128(a), Value::Dec128(b)) => Some(a.cmp(b)),
            (Value::Dec128(a), b) => b
                .as_i64()
                .map(|b| a.cmp(&super::decimal::Dec128::from_i64(b))),
            (a, Value::Dec128(b)) => a.as_i64().map(|a| super::decimal::Dec128::from_i64(a).cmp(b)),
            _ => match (self.as_i64(), other.as_i64()) {
                (Some(a), Some(b)) => Some(a.cmp(&b)),
                _ => match (self.as_f64(), other.as_f64()) {
                    (Some(a), Some(b)) => a.partial_cmp(&b),
                    _ => None,
                },
            },
        }
    }

    /// Integer content of Int32/Int64 values
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int32(i) => Some(*i as i64),
            Value::Int64(i) => Some(*i),
            _ => None,
        }
    }

    /// Numeric content as `f64`
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int32(i) => Some(*i as f64),
            Value::Int64(i) => Some(*i as f64),
            Value::Flt32(f) => Some(*f as f64),
            Value::Flt64(f) => Some(*f),
            Value::Dec128(d) => Some(d.to_f64()),
            _ => None,
        }
    }

    /// Equality used by `==` on complete values: numbers compare by magnitude
    pub fn entails(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Rec(a), Value::Rec(b)) => {
                a.same_arity(b)
                    && a.fields().iter().zip(b.fields().iter()).all(|(x, y)| {
                        match (x.1.value(), y.1.value()) {
                            (Some(x), Some(y)) => x.entails(&y),
                            _ => false,
                        }
                    })
            }
            _ if self.as_f64().is_some() && other.as_f64().is_some() => {
                self.compare(other) == Some(Ordering::Equal)
            }
            _ => self == other,
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Int32(a), Value::Int32(b)) => a == b,
            (Value::Int64(a), Value::Int64(b)) => a == b,
            (Value::Flt32(a), Value::Flt32(b)) => a == b,
            (Value::Flt64(a), Value::Flt64(b)) => a == b,
            (Value::Dec128(a), Value::Dec128(b)) => a == b,
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Char(a), Value::Char(b)) => a == b,
            (Value::Eof, Value::Eof)
            | (Value::Nothing, Value::Nothing)
            | (Value::Null, Value::Null) => true,
            (Value::Rec(a), Value::Rec(b)) => {
                Arc::ptr_eq(a, b)
                    || (a.same_arity(b)
                        && a.fields().iter().zip(b.fields().iter()).all(|(x, y)| {
                            match (x.1.resolve(), y.1.resolve()) {
                                (ValueOrVar::Value(x), ValueOrVar::Value(y)) => x == y,
                                (ValueOrVar::Var(x), ValueOrVar::Var(y)) => x.same(&y),
                                _ => false,
                            }
                        }))
            }
            (Value::Closure(a), Value::Closure(b)) => Arc::ptr_eq(a, b),
            (Value::Native(a), Value::Native(b)) => Arc::ptr_eq(a, b),
            (Value::Cell(a), Value::Cell(b)) => Arc::ptr_eq(a, b),
            (Value::ActorCfgtr(a), Value::ActorCfgtr(b)) => Arc::ptr_eq(a, b),
            (Value::ActorCfg(a), Value::ActorCfg(b)) => Arc::ptr_eq(a, b),
            (Value::ActorRef(a), Value::ActorRef(b)) => a.address() == b.address(),
            (Value::Obj(a), Value::Obj(b)) => Arc::ptr_eq(a, b),
            (Value::Failed(a), Value::Failed(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Int32(i) => write!(f, "{}", i),
            Value::Int64(i) => write!(f, "{}L", i),
            Value::Flt32(x) => write!(f, "{}f", format_float(*x as f64)),
            Value::Flt64(x) => write!(f, "{}", format_float(*x)),
            Value::Dec128(d) => write!(f, "{}m", d),
            Value::Str(s) => write!(f, "'{}'", escape_text(s, '\'')),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Char(c) => write!(f, "&{}", escape_char(*c)),
            Value::Eof => write!(f, "eof"),
            Value::Nothing => write!(f, "nothing"),
            Value::Null => write!(f, "null"),
            Value::Rec(rec) => write_rec(f, rec),
            Value::Closure(closure) => write!(f, "<proc/{}>", closure.def.formals.len()),
            Value::Native(native) => write!(f, "<native {}/{}>", native.name, native.arity),
            Value::Cell(cell) => match cell.get().value() {
                Some(value) => write!(f, "<cell {}>", value),
                None => write!(f, "<cell _>"),
            },
            Value::ActorCfgtr(_) => write!(f, "<actor-configurator>"),
            Value::ActorCfg(_) => write!(f, "<actor-cfg>"),
            Value::ActorRef(actor) => write!(f, "<actor {}>", actor.address()),
            Value::Obj(obj) => write!(f, "<{}>", obj.type_name()),
            Value::Failed(failed) => write!(f, "<{}>", failed),
        }
    }
}

fn write_rec(f: &mut fmt::Formatter<'_>, rec: &Rec) -> fmt::Result {
    if let Some(label) = rec.label() {
        write!(f, "{}#", label.to_value())?;
    }
    let tuple = rec.is_tuple() && !rec.is_empty();
    write!(f, "{}", if tuple { "[" } else { "{" })?;
    for (index, (feature, field)) in rec.fields().iter().enumerate() {
        if index > 0 {
            write!(f, ", ")?;
        }
        if !tuple {
            write!(f, "{}: ", feature)?;
        }
        match field.resolve() {
            ValueOrVar::Value(value) => write!(f, "{}", value)?,
            ValueOrVar::Var(_) => write!(f, "_")?,
        }
    }
    write!(f, "{}", if tuple { "]" } else { "}" })
}

fn format_float(x: f64) -> String {
    let text = format!("{}", x);
    if x.is_finite() && !text.contains(['.', 'e', 'E']) {
        format!("{}.0", text)
    } else {
        text
    }
}

/// Escape text for a quoted literal
pub fn escape_text(text: &str, quote: char) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            '\u{8}' => out.push_str("\\b"),
            '\u{c}' => out.push_str("\\f"),
            c if c == quote => {
                out.push('\\');
                out.push(c);
            }
            c if c.is_control() => out.push_str(&format!("\\u{:04x}", c as u32)),
            c => out.push(c),
        }
    }
    out
}

/// Escape a character literal body (the text after `&`)
pub fn escape_char(ch: char) -> String {
    match ch {
        '\\' => "\\\\".to_string(),
        '\n' => "\\n".to_string(),
        '\r' => "\\r".to_string(),
        '\t' => "\\t".to_string(),
        '\u{8}' => "\\b".to_string(),
        '\u{c}' => "\\f".to_string(),
        c if c.is_control() || c.is_whitespace() => format!("\\u{:04x}", c as u32),
        c => c.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tuple_is_record_with_positional_features() {
        let tuple = Value::tuple(None, vec![Value::Int32(1), Value::Int32(2)]);
        let rec = Value::rec(
            None,
            vec![
                (Feature::Int(1), Value::Int32(2)),
                (Feature::Int(0), Value::Int32(1)),
            ],
        )
        .unwrap();
        assert_eq!(tuple, rec);
        assert_eq!(tuple.to_string(), "[1, 2]");
    }

    #[test]
    fn test_duplicate_features_rejected() {
        let err = Value::rec(
            None,
            vec![
                (Feature::str("a"), Value::Int32(1)),
                (Feature::str("a"), Value::Int32(2)),
            ],
        )
        .unwrap_err();
        assert_eq!(err, Feature::str("a"));
    }

    #[test]
    fn test_check_complete_reports_blocking_var() {
        let var = Var::new();
        let rec = Rec::new(
            Some(Feature::str("p")),
            vec![
                (Feature::str("a"), ValueOrVar::Value(Value::Int32(1))),
                (Feature::str("b"), ValueOrVar::Var(var.clone())),
            ],
        )
        .unwrap();
        let value = Value::Rec(Arc::new(rec));
        let blocking = value.check_complete().unwrap_err();
        assert!(blocking.same(&var));

        var.bind_to_value(Value::str("x")).unwrap();
        let complete = value.check_complete().unwrap();
        assert_eq!(complete.to_string(), "'p'#{a: 1, b: 'x'}");
    }

    #[test]
    fn test_entails_compares_numbers_by_magnitude() {
        assert!(Value::Int32(3).entails(&Value::Int64(3)));
        assert!(Value::Flt64(2.0).entails(&Value::Int32(2)));
        assert!(!Value::Int32(3).entails(&Value::str("3")));
        assert_ne!(Value::Int32(3), Value::Int64(3));
    }

    #[test]
    fn test_error_record_name() {
        let err = Value::error("AskNotHandledError", "not handled", vec![]);
        assert_eq!(err.error_name().as_deref(), Some("AskNotHandledError"));
    }
}
