//! Conversions between kernel values and `preserves::IOValue`
//!
//! Host code uses these to build messages for actors and to print what
//! comes back. Only complete data crosses the bridge:
//!
//! | kernel                    | preserves                          |
//! |---------------------------|------------------------------------|
//! | `Int32`, `Int64`          | signed integer                     |
//! | `Flt32`, `Flt64`          | double                             |
//! | `Str`, `Bool`             | string, boolean                    |
//! | `eof`, `nothing`, `null`  | symbols of the same name           |
//! | `Char`, `Dec128`          | `<torq:char "c">`, `<torq:dec "1.5">` |
//! | unlabelled tuple          | sequence                           |
//! | labelled tuple            | record, label as a symbol          |
//! | record                    | `<torq:rec label [[key value] ...]>` |
//! | failed value              | `<torq:failed "address" error>`    |
//!
//! Integers come back as `Int32` when they fit and floats as `Flt64`. A
//! failed value comes back without its stack or parent chain.

use preserves::IOValue;
use std::convert::TryFrom;
use std::sync::Arc;
use thiserror::Error;

use crate::kernel::decimal::Dec128;
use crate::kernel::value::{FailedValue, Feature, Rec, Value, ValueOrVar};

const CHAR_LABEL: &str = "torq:char";
const DEC_LABEL: &str = "torq:dec";
const REC_LABEL: &str = "torq:rec";
const FAILED_LABEL: &str = "torq:failed";

/// Errors converting across the host bridge
#[derive(Debug, Error, Clone, PartialEq)]
pub enum IoValueError {
    /// The value has no data representation
    #[error("{0} values cannot be converted")]
    Unsupported(&'static str),

    /// The value still contains unbound variables
    #[error("value is not complete")]
    Incomplete,

    /// Integer outside the 64-bit range
    #[error("integer out of range: {0}")]
    IntegerRange(String),

    /// Malformed encoded value
    #[error("malformed value: {0}")]
    Malformed(String),

    /// A record repeats a feature
    #[error("duplicate feature {0}")]
    DuplicateFeature(String),
}

/// Convert a complete kernel value
pub fn value_to_io(value: &Value) -> Result<IOValue, IoValueError> {
    Ok(match value {
        Value::Int32(i) => IOValue::new(*i as i64),
        Value::Int64(i) => IOValue::new(*i),
        Value::Flt32(f) => IOValue::new(*f as f64),
        Value::Flt64(f) => IOValue::new(*f),
        Value::Dec128(d) => tagged(DEC_LABEL, IOValue::new(d.to_string())),
        Value::Str(s) => IOValue::new(s.to_string()),
        Value::Bool(b) => IOValue::new(*b),
        Value::Char(c) => tagged(CHAR_LABEL, IOValue::new(c.to_string())),
        Value::Eof => IOValue::symbol("eof"),
        Value::Nothing => IOValue::symbol("nothing"),
        Value::Null => IOValue::symbol("null"),
        Value::Rec(rec) => rec_to_io(rec)?,
        Value::Failed(failed) => IOValue::record(
            IOValue::symbol(FAILED_LABEL),
            vec![
                IOValue::new(failed.address.clone()),
                value_to_io(&failed.error)?,
            ],
        ),
        other => return Err(IoValueError::Unsupported(other.type_name())),
    })
}

fn tagged(label: &'static str, payload: IOValue) -> IOValue {
    IOValue::record(IOValue::symbol(label), vec![payload])
}

fn field_to_io(field: &ValueOrVar) -> Result<IOValue, IoValueError> {
    match field.resolve() {
        ValueOrVar::Value(value) => value_to_io(&value),
        ValueOrVar::Var(_) => Err(IoValueError::Incomplete),
    }
}

fn feature_to_io(feature: &Feature) -> Result<IOValue, IoValueError> {
    match feature {
        Feature::Str(s) => Ok(IOValue::symbol(s.to_string())),
        other => value_to_io(&other.to_value()),
    }
}

fn rec_to_io(rec: &Rec) -> Result<IOValue, IoValueError> {
    if rec.is_tuple() {
        let fields = rec
            .fields()
            .iter()
            .map(|(_, field)| field_to_io(field))
            .collect::<Result<Vec<_>, _>>()?;
        return Ok(match rec.label() {
            Some(label) => IOValue::record(feature_to_io(label)?, fields),
            None => IOValue::new(fields),
        });
    }
    let label = match rec.label() {
        Some(label) => feature_to_io(label)?,
        None => IOValue::new(Vec::<IOValue>::new()),
    };
    let pairs = rec
        .fields()
        .iter()
        .map(|(feature, field)| {
            Ok(IOValue::new(vec![
                value_to_io(&feature.to_value())?,
                field_to_io(field)?,
            ]))
        })
        .collect::<Result<Vec<_>, IoValueError>>()?;
    Ok(IOValue::record(
        IOValue::symbol(REC_LABEL),
        vec![label, IOValue::new(pairs)],
    ))
}

/// Convert a preserves value back into a kernel value
pub fn io_to_value(value: &IOValue) -> Result<Value, IoValueError> {
    if let Some(sym) = value.as_symbol() {
        return Ok(match sym.as_ref() {
            "eof" => Value::Eof,
            "nothing" => Value::Nothing,
            "null" => Value::Null,
            other => Value::str(other),
        });
    }
    if let Some(text) = value.as_string() {
        return Ok(Value::str(text.as_ref()));
    }
    if let Some(flag) = value.as_boolean() {
        return Ok(Value::Bool(flag));
    }
    if let Some(int) = value.as_signed_integer() {
        let wide = i64::try_from(int.as_ref())
            .map_err(|_| IoValueError::IntegerRange(format!("{value:?}")))?;
        return Ok(match i32::try_from(wide) {
            Ok(small) => Value::Int32(small),
            Err(_) => Value::Int64(wide),
        });
    }
    if let Some(float) = value.as_double() {
        return Ok(Value::Flt64(float));
    }
    if value.is_sequence() {
        let items = value
            .iter()
            .map(|item| io_to_value(&IOValue::from(item)))
            .collect::<Result<Vec<_>, _>>()?;
        return Ok(Value::tuple(None, items));
    }
    if value.is_record() {
        return record_to_value(value);
    }
    Err(IoValueError::Malformed(format!("{value:?}")))
}

fn field(value: &IOValue, index: usize) -> IOValue {
    IOValue::from(value.index(index))
}

fn record_to_value(value: &IOValue) -> Result<Value, IoValueError> {
    let label = IOValue::from(value.label());
    let malformed = || IoValueError::Malformed(format!("{value:?}"));
    match label.as_symbol().map(|sym| sym.as_ref().to_string()).as_deref() {
        Some(CHAR_LABEL) if value.len() == 1 => {
            let text = field(value, 0).as_string().map(|s| s.to_string());
            let mut chars = text.as_deref().unwrap_or_default().chars();
            match (chars.next(), chars.next()) {
                (Some(c), None) => Ok(Value::Char(c)),
                _ => Err(malformed()),
            }
        }
        Some(DEC_LABEL) if value.len() == 1 => field(value, 0)
            .as_string()
            .and_then(|text| Dec128::parse(text.as_ref()))
            .map(Value::Dec128)
            .ok_or_else(malformed),
        Some(REC_LABEL) if value.len() == 2 => {
            let label = field(value, 0);
            let label = if label.is_sequence() && label.len() == 0 {
                None
            } else {
                Some(io_to_feature(&label)?)
            };
            let pairs = field(value, 1);
            if !pairs.is_sequence() {
                return Err(malformed());
            }
            let mut fields = Vec::new();
            for pair in pairs.iter() {
                let pair = IOValue::from(pair);
                if !pair.is_sequence() || pair.len() != 2 {
                    return Err(malformed());
                }
                let feature = io_to_value(&field(&pair, 0))?
                    .to_feature()
                    .ok_or_else(malformed)?;
                fields.push((feature, io_to_value(&field(&pair, 1))?));
            }
            Value::rec(label, fields)
                .map_err(|feature| IoValueError::DuplicateFeature(feature.to_string()))
        }
        Some(FAILED_LABEL) if value.len() == 2 => {
            let address = field(value, 0)
                .as_string()
                .map(|s| s.to_string())
                .ok_or_else(malformed)?;
            Ok(Value::Failed(Arc::new(FailedValue {
                address,
                error: io_to_value(&field(value, 1))?,
                stack: Vec::new(),
                parent: None,
                native_cause: None,
            })))
        }
        _ => {
            let label = io_to_feature(&label)?;
            let items = (0..value.len())
                .map(|index| io_to_value(&field(value, index)))
                .collect::<Result<Vec<_>, _>>()?;
            Ok(Value::tuple(Some(label), items))
        }
    }
}

fn io_to_feature(value: &IOValue) -> Result<Feature, IoValueError> {
    if let Some(sym) = value.as_symbol() {
        return Ok(Feature::Str(Arc::from(sym.as_ref())));
    }
    io_to_value(value)?
        .to_feature()
        .ok_or_else(|| IoValueError::Malformed(format!("{value:?}")))
}
