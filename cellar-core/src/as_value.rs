use crate::{Error, Result, Value};
use rust_decimal::{
    Decimal,
    prelude::{FromPrimitive, ToPrimitive},
};
use std::any;
use time::{
    Date, PrimitiveDateTime, Time, format_description::well_known::Iso8601,
    macros::format_description,
};
use uuid::Uuid;

/// Conversion between native Rust types and the dynamically typed [`Value`].
///
/// `try_from_value` accepts the canonical variant for the type and, where no
/// information is lost, the neighbouring ones: integers of either width with a
/// range check, integers into floats and decimals, ISO-8601 text into temporal
/// types (SQLite stores them as text).
///
/// ```rust
/// use cellar_core::{AsValue, Value};
/// let v = 42i32.as_value();
/// assert_eq!(v, Value::Int32(Some(42)));
/// let n: i64 = AsValue::try_from_value(v).unwrap();
/// assert_eq!(n, 42);
/// ```
pub trait AsValue {
    /// The NULL of this type.
    fn as_empty_value() -> Value;
    fn as_value(self) -> Value;
    fn try_from_value(value: Value) -> Result<Self>
    where
        Self: Sized;
}

impl<T: AsValue> From<T> for Value {
    fn from(value: T) -> Self {
        value.as_value()
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Varchar(Some(value.into()))
    }
}

fn mismatch<T>(value: &Value) -> Error {
    Error::msg(format!(
        "Cannot convert {} value `{}` into {}",
        value.type_name(),
        value,
        any::type_name::<T>()
    ))
}

fn out_of_range<T>(value: impl std::fmt::Display) -> Error {
    Error::msg(format!(
        "Value `{}` is out of range for {}",
        value,
        any::type_name::<T>()
    ))
}

impl AsValue for bool {
    fn as_empty_value() -> Value {
        Value::Boolean(None)
    }
    fn as_value(self) -> Value {
        Value::Boolean(Some(self))
    }
    fn try_from_value(value: Value) -> Result<Self> {
        match value {
            Value::Boolean(Some(v)) => Ok(v),
            Value::Int32(Some(v)) => Ok(v != 0),
            Value::Int64(Some(v)) => Ok(v != 0),
            _ => Err(mismatch::<Self>(&value)),
        }
    }
}

impl AsValue for i32 {
    fn as_empty_value() -> Value {
        Value::Int32(None)
    }
    fn as_value(self) -> Value {
        Value::Int32(Some(self))
    }
    fn try_from_value(value: Value) -> Result<Self> {
        match value {
            Value::Int32(Some(v)) => Ok(v),
            Value::Int64(Some(v)) => i32::try_from(v).map_err(|_| out_of_range::<Self>(v)),
            Value::Boolean(Some(v)) => Ok(v as i32),
            _ => Err(mismatch::<Self>(&value)),
        }
    }
}

impl AsValue for i64 {
    fn as_empty_value() -> Value {
        Value::Int64(None)
    }
    fn as_value(self) -> Value {
        Value::Int64(Some(self))
    }
    fn try_from_value(value: Value) -> Result<Self> {
        match value {
            Value::Int64(Some(v)) => Ok(v),
            Value::Int32(Some(v)) => Ok(v as i64),
            Value::Boolean(Some(v)) => Ok(v as i64),
            _ => Err(mismatch::<Self>(&value)),
        }
    }
}

impl AsValue for u32 {
    fn as_empty_value() -> Value {
        Value::Int64(None)
    }
    fn as_value(self) -> Value {
        Value::Int64(Some(self as i64))
    }
    fn try_from_value(value: Value) -> Result<Self> {
        let v = i64::try_from_value(value)?;
        u32::try_from(v).map_err(|_| out_of_range::<Self>(v))
    }
}

impl AsValue for f64 {
    fn as_empty_value() -> Value {
        Value::Float64(None)
    }
    fn as_value(self) -> Value {
        Value::Float64(Some(self))
    }
    fn try_from_value(value: Value) -> Result<Self> {
        match value {
            Value::Float64(Some(v)) => Ok(v),
            Value::Int32(Some(v)) => Ok(v as f64),
            Value::Int64(Some(v)) => Ok(v as f64),
            Value::Decimal(Some(v)) => v.to_f64().ok_or_else(|| out_of_range::<Self>(v)),
            _ => Err(mismatch::<Self>(&value)),
        }
    }
}

impl AsValue for Decimal {
    fn as_empty_value() -> Value {
        Value::Decimal(None)
    }
    fn as_value(self) -> Value {
        Value::Decimal(Some(self))
    }
    fn try_from_value(value: Value) -> Result<Self> {
        match value {
            Value::Decimal(Some(v)) => Ok(v),
            Value::Int32(Some(v)) => Ok(Decimal::from(v)),
            Value::Int64(Some(v)) => Ok(Decimal::from(v)),
            Value::Float64(Some(v)) => Decimal::from_f64(v).ok_or_else(|| out_of_range::<Self>(v)),
            Value::Varchar(Some(ref v)) => v
                .parse::<Decimal>()
                .map_err(|e| Error::new(e).context(mismatch::<Self>(&value))),
            _ => Err(mismatch::<Self>(&value)),
        }
    }
}

impl AsValue for String {
    fn as_empty_value() -> Value {
        Value::Varchar(None)
    }
    fn as_value(self) -> Value {
        Value::Varchar(Some(self))
    }
    fn try_from_value(value: Value) -> Result<Self> {
        match value {
            Value::Varchar(Some(v)) => Ok(v),
            _ => Err(mismatch::<Self>(&value)),
        }
    }
}

impl AsValue for Vec<u8> {
    fn as_empty_value() -> Value {
        Value::Blob(None)
    }
    fn as_value(self) -> Value {
        Value::Blob(Some(self.into_boxed_slice()))
    }
    fn try_from_value(value: Value) -> Result<Self> {
        match value {
            Value::Blob(Some(v)) => Ok(v.into_vec()),
            _ => Err(mismatch::<Self>(&value)),
        }
    }
}

impl AsValue for Date {
    fn as_empty_value() -> Value {
        Value::Date(None)
    }
    fn as_value(self) -> Value {
        Value::Date(Some(self))
    }
    fn try_from_value(value: Value) -> Result<Self> {
        match value {
            Value::Date(Some(v)) => Ok(v),
            Value::Timestamp(Some(v)) => Ok(v.date()),
            Value::Varchar(Some(ref v)) => Date::parse(v, &Iso8601::DEFAULT)
                .or_else(|_| Date::parse(v, format_description!("[year]-[month]-[day]")))
                .map_err(|e| Error::new(e).context(mismatch::<Self>(&value))),
            _ => Err(mismatch::<Self>(&value)),
        }
    }
}

impl AsValue for Time {
    fn as_empty_value() -> Value {
        Value::Time(None)
    }
    fn as_value(self) -> Value {
        Value::Time(Some(self))
    }
    fn try_from_value(value: Value) -> Result<Self> {
        match value {
            Value::Time(Some(v)) => Ok(v),
            Value::Varchar(Some(ref v)) => Time::parse(
                v,
                format_description!("[hour]:[minute]:[second][optional [.[subsecond]]]"),
            )
            .or_else(|_| Time::parse(v, &Iso8601::DEFAULT))
            .map_err(|e| Error::new(e).context(mismatch::<Self>(&value))),
            _ => Err(mismatch::<Self>(&value)),
        }
    }
}

impl AsValue for PrimitiveDateTime {
    fn as_empty_value() -> Value {
        Value::Timestamp(None)
    }
    fn as_value(self) -> Value {
        Value::Timestamp(Some(self))
    }
    fn try_from_value(value: Value) -> Result<Self> {
        match value {
            Value::Timestamp(Some(v)) => Ok(v),
            Value::Varchar(Some(ref v)) => PrimitiveDateTime::parse(v, &Iso8601::DEFAULT)
                .or_else(|_| {
                    PrimitiveDateTime::parse(
                        v,
                        format_description!(
                            "[year]-[month]-[day] [hour]:[minute]:[second][optional [.[subsecond]]]"
                        ),
                    )
                })
                .map_err(|e| Error::new(e).context(mismatch::<Self>(&value))),
            _ => Err(mismatch::<Self>(&value)),
        }
    }
}

impl AsValue for Uuid {
    fn as_empty_value() -> Value {
        Value::Uuid(None)
    }
    fn as_value(self) -> Value {
        Value::Uuid(Some(self))
    }
    fn try_from_value(value: Value) -> Result<Self> {
        match value {
            Value::Uuid(Some(v)) => Ok(v),
            Value::Varchar(Some(ref v)) => {
                Uuid::parse_str(v).map_err(|e| Error::new(e).context(mismatch::<Self>(&value)))
            }
            Value::Blob(Some(ref v)) => {
                Uuid::from_slice(v).map_err(|e| Error::new(e).context(mismatch::<Self>(&value)))
            }
            _ => Err(mismatch::<Self>(&value)),
        }
    }
}

impl<T: AsValue> AsValue for Option<T> {
    fn as_empty_value() -> Value {
        T::as_empty_value()
    }
    fn as_value(self) -> Value {
        match self {
            Some(v) => v.as_value(),
            None => T::as_empty_value(),
        }
    }
    fn try_from_value(value: Value) -> Result<Self> {
        if value.is_null() {
            Ok(None)
        } else {
            T::try_from_value(value).map(Some)
        }
    }
}

/// Builds a parameter vector, converting each element into a [`Value`].
///
/// ```rust
/// use cellar_core::{Value, params};
/// let params = params![1, "Apple", None::<i64>];
/// assert_eq!(params[1], Value::Varchar(Some("Apple".into())));
/// ```
#[macro_export]
macro_rules! params {
    () => {
        ::std::vec::Vec::<$crate::Value>::new()
    };
    ($($value:expr),+ $(,)?) => {
        ::std::vec![$($crate::Value::from($value)),+]
    };
}
