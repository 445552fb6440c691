use crate::{Error, Result};
use std::{
    any,
    fmt::{self, Display},
};

/// Untyped scalar stored in a field buffer or bound as a statement parameter.
///
/// The dataset layer never coerces values to a column type: whatever the
/// backend returns is kept as is, and whatever the caller assigns is sent back
/// unchanged.
#[derive(Default, Debug, Clone, PartialEq)]
pub enum Value {
    #[default]
    Null,
    Boolean(bool),
    Integer(i64),
    Float(f64),
    Text(String),
    Blob(Box<[u8]>),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Null or zero-length text. Both count as "not explicitly set" when a new row is inserted.
    pub fn is_empty(&self) -> bool {
        match self {
            Value::Null => true,
            Value::Text(v) => v.is_empty(),
            _ => false,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Boolean(v) => Some(*v as i64),
            Value::Integer(v) => Some(*v),
            Value::Float(v) if v.fract() == 0.0 => Some(*v as i64),
            Value::Text(v) => v.trim().parse().ok(),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Integer(v) => Some(*v as f64),
            Value::Float(v) => Some(*v),
            Value::Text(v) => v.trim().parse().ok(),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Boolean(v) => Some(*v),
            Value::Integer(v) => Some(*v != 0),
            Value::Text(v) => match v.trim().to_ascii_lowercase().as_str() {
                "true" | "t" | "1" => Some(true),
                "false" | "f" | "0" => Some(false),
                _ => None,
            },
            _ => None,
        }
    }

    /// Equality that treats numbers of different representation as equal (`1 == 1.0`).
    pub fn same_as(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Integer(l), Value::Float(r)) | (Value::Float(r), Value::Integer(l)) => {
                *l as f64 == *r
            }
            _ => self == other,
        }
    }
}

impl Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("NULL"),
            Value::Boolean(v) => write!(f, "{}", v),
            Value::Integer(v) => write!(f, "{}", v),
            Value::Float(v) => write!(f, "{}", v),
            Value::Text(v) => f.write_str(v),
            Value::Blob(v) => write!(f, "X'{}'", hex::encode_upper(v)),
        }
    }
}

/// Conversion between native Rust types and the dynamic [`Value`].
///
/// `as_value` is infallible. `try_from_value` accepts the canonical variant and
/// a few lossless alternatives (for example integral text for integers), failing
/// with a message naming the target type otherwise.
///
/// ```rust
/// use recordset_core::{AsValue, Value};
/// let v = 42i32.as_value();
/// assert_eq!(v, Value::Integer(42));
/// let n: i32 = AsValue::try_from_value(v).unwrap();
/// assert_eq!(n, 42);
/// ```
pub trait AsValue {
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
        Value::Text(value.into())
    }
}

fn mismatch<T>(value: &Value) -> Error {
    Error::msg(format!(
        "Cannot convert {:?} into {}",
        value,
        any::type_name::<T>()
    ))
}

macro_rules! impl_as_value_integer {
    ($($source:ty),+ $(,)?) => {
        $(
            impl AsValue for $source {
                fn as_value(self) -> Value {
                    Value::Integer(self as i64)
                }
                fn try_from_value(value: Value) -> Result<Self> {
                    let Some(v) = value.as_i64() else {
                        return Err(mismatch::<Self>(&value));
                    };
                    <$source>::try_from(v).map_err(|_| {
                        Error::msg(format!(
                            "Value {} is out of range for {}",
                            v,
                            any::type_name::<Self>()
                        ))
                    })
                }
            }
        )+
    };
}

impl_as_value_integer!(i8, i16, i32, i64, u8, u16, u32);

// Wider unsigned values do not always fit in a 64 bits signed integer, they fall back to text
macro_rules! impl_as_value_wide_integer {
    ($($source:ty),+ $(,)?) => {
        $(
            impl AsValue for $source {
                fn as_value(self) -> Value {
                    i64::try_from(self)
                        .map(Value::Integer)
                        .unwrap_or_else(|_| Value::Text(self.to_string()))
                }
                fn try_from_value(value: Value) -> Result<Self> {
                    match &value {
                        Value::Integer(v) => <$source>::try_from(*v).map_err(|_| {
                            Error::msg(format!(
                                "Value {} is out of range for {}",
                                v,
                                any::type_name::<Self>()
                            ))
                        }),
                        Value::Text(v) => v.trim().parse().map_err(|_| mismatch::<Self>(&value)),
                        _ => Err(mismatch::<Self>(&value)),
                    }
                }
            }
        )+
    };
}

impl_as_value_wide_integer!(u64, usize, isize);

impl AsValue for f64 {
    fn as_value(self) -> Value {
        Value::Float(self)
    }
    fn try_from_value(value: Value) -> Result<Self> {
        value.as_f64().ok_or_else(|| mismatch::<Self>(&value))
    }
}

impl AsValue for f32 {
    fn as_value(self) -> Value {
        Value::Float(self as f64)
    }
    fn try_from_value(value: Value) -> Result<Self> {
        value
            .as_f64()
            .map(|v| v as f32)
            .ok_or_else(|| mismatch::<Self>(&value))
    }
}

impl AsValue for bool {
    fn as_value(self) -> Value {
        Value::Boolean(self)
    }
    fn try_from_value(value: Value) -> Result<Self> {
        value.as_bool().ok_or_else(|| mismatch::<Self>(&value))
    }
}

impl AsValue for String {
    fn as_value(self) -> Value {
        Value::Text(self)
    }
    fn try_from_value(value: Value) -> Result<Self> {
        match value {
            Value::Text(v) => Ok(v),
            Value::Boolean(..) | Value::Integer(..) | Value::Float(..) => Ok(value.to_string()),
            _ => Err(mismatch::<Self>(&value)),
        }
    }
}

impl AsValue for Box<[u8]> {
    fn as_value(self) -> Value {
        Value::Blob(self)
    }
    fn try_from_value(value: Value) -> Result<Self> {
        match value {
            Value::Blob(v) => Ok(v),
            Value::Text(v) => Ok(v.into_bytes().into_boxed_slice()),
            _ => Err(mismatch::<Self>(&value)),
        }
    }
}

impl AsValue for Vec<u8> {
    fn as_value(self) -> Value {
        Value::Blob(self.into_boxed_slice())
    }
    fn try_from_value(value: Value) -> Result<Self> {
        Box::<[u8]>::try_from_value(value).map(Into::into)
    }
}

impl<T: AsValue> AsValue for Option<T> {
    fn as_value(self) -> Value {
        match self {
            Some(v) => v.as_value(),
            None => Value::Null,
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
