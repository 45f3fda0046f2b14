use bytes::Bytes;
use enum_as_inner::EnumAsInner;
use rustc_hash::FxHashMap;

/// [KeelValue] is the application-level form of a key or a value before it
/// is encoded to bytes, and after it is decoded from bytes.
///
/// `Null` stands for a missing argument. It is never a legal key or value.
#[derive(Debug, PartialEq, Clone, EnumAsInner, Default)]
pub enum KeelValue {
    #[default]
    Null,
    Bool(bool),
    I64(i64),
    Double(f64),
    String(String),
    Binary(Bytes),
    List(Vec<KeelValue>),
    Map(FxHashMap<String, KeelValue>),
}

impl KeelValue {
    /// The kind name of an empty string, binary or list, used when rejecting
    /// empty keys. Returns `None` for every non-empty or non-container value.
    pub fn empty_kind(&self) -> Option<&'static str> {
        match self {
            KeelValue::String(s) if s.is_empty() => Some("String"),
            KeelValue::Binary(b) if b.is_empty() => Some("Buffer"),
            KeelValue::List(l) if l.is_empty() => Some("Array"),
            _ => None,
        }
    }

    /// Text form used by text codecs for scalars. Containers have none.
    pub fn to_text(&self) -> Option<String> {
        match self {
            KeelValue::Bool(b) => Some(b.to_string()),
            KeelValue::I64(i) => Some(i.to_string()),
            KeelValue::Double(d) => Some(d.to_string()),
            KeelValue::String(s) => Some(s.clone()),
            _ => None,
        }
    }

    pub fn to_json_value(&self) -> serde_json::Value {
        use serde_json::Value;
        match self {
            KeelValue::Null => Value::Null,
            KeelValue::Bool(b) => Value::Bool(*b),
            KeelValue::I64(i) => Value::from(*i),
            KeelValue::Double(d) => serde_json::Number::from_f64(*d)
                .map(Value::Number)
                .unwrap_or(Value::Null),
            KeelValue::String(s) => Value::String(s.clone()),
            KeelValue::Binary(b) => Value::Array(b.iter().map(|x| Value::from(*x)).collect()),
            KeelValue::List(l) => Value::Array(l.iter().map(|x| x.to_json_value()).collect()),
            KeelValue::Map(m) => Value::Object(
                m.iter()
                    .map(|(k, v)| (k.clone(), v.to_json_value()))
                    .collect(),
            ),
        }
    }
}

impl From<serde_json::Value> for KeelValue {
    fn from(value: serde_json::Value) -> Self {
        use serde_json::Value;
        match value {
            Value::Null => KeelValue::Null,
            Value::Bool(b) => KeelValue::Bool(b),
            Value::Number(n) => match n.as_i64() {
                Some(i) => KeelValue::I64(i),
                None => KeelValue::Double(n.as_f64().unwrap_or(f64::NAN)),
            },
            Value::String(s) => KeelValue::String(s),
            Value::Array(a) => KeelValue::List(a.into_iter().map(KeelValue::from).collect()),
            Value::Object(o) => {
                KeelValue::Map(o.into_iter().map(|(k, v)| (k, v.into())).collect())
            }
        }
    }
}

impl From<&str> for KeelValue {
    fn from(s: &str) -> Self {
        KeelValue::String(s.to_owned())
    }
}

impl From<String> for KeelValue {
    fn from(s: String) -> Self {
        KeelValue::String(s)
    }
}

impl From<&String> for KeelValue {
    fn from(s: &String) -> Self {
        KeelValue::String(s.clone())
    }
}

impl From<Bytes> for KeelValue {
    fn from(b: Bytes) -> Self {
        KeelValue::Binary(b)
    }
}

impl From<&[u8]> for KeelValue {
    fn from(b: &[u8]) -> Self {
        KeelValue::Binary(Bytes::copy_from_slice(b))
    }
}

impl<const N: usize> From<&[u8; N]> for KeelValue {
    fn from(b: &[u8; N]) -> Self {
        KeelValue::Binary(Bytes::copy_from_slice(b))
    }
}

impl From<Vec<u8>> for KeelValue {
    fn from(b: Vec<u8>) -> Self {
        KeelValue::Binary(b.into())
    }
}

impl From<bool> for KeelValue {
    fn from(b: bool) -> Self {
        KeelValue::Bool(b)
    }
}

impl From<i32> for KeelValue {
    fn from(i: i32) -> Self {
        KeelValue::I64(i as i64)
    }
}

impl From<i64> for KeelValue {
    fn from(i: i64) -> Self {
        KeelValue::I64(i)
    }
}

impl From<f64> for KeelValue {
    fn from(d: f64) -> Self {
        KeelValue::Double(d)
    }
}

impl From<Vec<KeelValue>> for KeelValue {
    fn from(l: Vec<KeelValue>) -> Self {
        KeelValue::List(l)
    }
}

impl<T: Into<KeelValue>> From<Option<T>> for KeelValue {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(KeelValue::Null)
    }
}
