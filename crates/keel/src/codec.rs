//! Key and value encodings.
//!
//! A [`Codec`] converts between [`KeelValue`] and the bytes stored by the
//! backend. Codecs are looked up by name through a [`CodecRegistry`], or handed
//! in directly through [`Encoding::Custom`].
//!
//! | name               | format | stored as                            |
//! |--------------------|--------|--------------------------------------|
//! | `buffer`, `binary` | buffer | raw bytes, strings as UTF-8          |
//! | `view`             | view   | raw bytes, strings as UTF-8          |
//! | `utf8`, `utf-8`    | utf8   | UTF-8 text                           |
//! | `json`             | utf8   | JSON text                            |
//! | `base64`           | utf8   | bytes decoded from base64 text       |
use std::fmt::Debug;
use std::sync::Arc;

use base64::{engine::general_purpose::STANDARD, Engine as _};
use bytes::Bytes;
use keel_common::{KeelError, KeelResult, KeelValue};
use once_cell::sync::Lazy;
use rustc_hash::FxHashMap;

use crate::config::Encoding;

/// The native representation a codec works with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Format {
    Buffer,
    View,
    Utf8,
}

impl Format {
    /// Turn a value already in this format into bytes.
    pub fn to_bytes(self, value: KeelValue) -> KeelResult<Bytes> {
        match (self, value) {
            (_, KeelValue::Binary(b)) => Ok(b),
            (_, KeelValue::String(s)) => Ok(Bytes::from(s)),
            (Format::Utf8, other) => other
                .to_text()
                .map(Bytes::from)
                .ok_or_else(|| cannot_encode(&other, "utf8")),
            (format, other) => Err(cannot_encode(&other, format.name())),
        }
    }

    /// Turn stored bytes into a value of this format.
    pub fn from_bytes(self, bytes: Bytes) -> KeelResult<KeelValue> {
        match self {
            Format::Buffer | Format::View => Ok(KeelValue::Binary(bytes)),
            Format::Utf8 => String::from_utf8(bytes.to_vec())
                .map(KeelValue::String)
                .map_err(|e| KeelError::encoding(format!("invalid utf8: {}", e))),
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Format::Buffer => "buffer",
            Format::View => "view",
            Format::Utf8 => "utf8",
        }
    }
}

fn cannot_encode(value: &KeelValue, codec: &str) -> KeelError {
    let kind = match value {
        KeelValue::Null => "null",
        KeelValue::Bool(_) => "bool",
        KeelValue::I64(_) | KeelValue::Double(_) => "number",
        KeelValue::String(_) => "string",
        KeelValue::Binary(_) => "binary",
        KeelValue::List(_) => "list",
        KeelValue::Map(_) => "map",
    };
    KeelError::encoding(format!("cannot encode a {} with '{}'", kind, codec))
}

pub trait Codec: Debug + Send + Sync {
    fn name(&self) -> &str;
    fn format(&self) -> Format;
    fn encode(&self, value: &KeelValue) -> KeelResult<Bytes>;
    fn decode(&self, bytes: Bytes) -> KeelResult<KeelValue>;

    /// Decoding is the identity on bytes, so callers may skip it.
    fn is_passthrough(&self) -> bool {
        false
    }
}

/// Decode `bytes`, taking the fast path for byte-native codecs.
pub(crate) fn decode_with(codec: &dyn Codec, bytes: Bytes) -> KeelResult<KeelValue> {
    if codec.is_passthrough() {
        return Ok(KeelValue::Binary(bytes));
    }

    codec.decode(bytes)
}

#[derive(Debug)]
struct BufferCodec {
    name: &'static str,
    format: Format,
}

impl Codec for BufferCodec {
    fn name(&self) -> &str {
        self.name
    }

    fn format(&self) -> Format {
        self.format
    }

    fn encode(&self, value: &KeelValue) -> KeelResult<Bytes> {
        match value {
            KeelValue::Binary(b) => Ok(b.clone()),
            KeelValue::String(s) => Ok(Bytes::copy_from_slice(s.as_bytes())),
            other => Err(cannot_encode(other, self.name)),
        }
    }

    fn decode(&self, bytes: Bytes) -> KeelResult<KeelValue> {
        Ok(KeelValue::Binary(bytes))
    }

    fn is_passthrough(&self) -> bool {
        true
    }
}

#[derive(Debug)]
struct Utf8Codec {
    name: &'static str,
}

impl Codec for Utf8Codec {
    fn name(&self) -> &str {
        self.name
    }

    fn format(&self) -> Format {
        Format::Utf8
    }

    fn encode(&self, value: &KeelValue) -> KeelResult<Bytes> {
        match value {
            KeelValue::Binary(b) => Ok(b.clone()),
            other => other
                .to_text()
                .map(Bytes::from)
                .ok_or_else(|| cannot_encode(other, self.name)),
        }
    }

    fn decode(&self, bytes: Bytes) -> KeelResult<KeelValue> {
        Format::Utf8.from_bytes(bytes)
    }
}

#[derive(Debug)]
struct JsonCodec;

impl Codec for JsonCodec {
    fn name(&self) -> &str {
        "json"
    }

    fn format(&self) -> Format {
        Format::Utf8
    }

    fn encode(&self, value: &KeelValue) -> KeelResult<Bytes> {
        Ok(serde_json::to_vec(&value.to_json_value())?.into())
    }

    fn decode(&self, bytes: Bytes) -> KeelResult<KeelValue> {
        let json: serde_json::Value = serde_json::from_slice(&bytes)?;
        Ok(json.into())
    }
}

#[derive(Debug)]
struct Base64Codec;

impl Codec for Base64Codec {
    fn name(&self) -> &str {
        "base64"
    }

    fn format(&self) -> Format {
        Format::Utf8
    }

    fn encode(&self, value: &KeelValue) -> KeelResult<Bytes> {
        match value {
            KeelValue::Binary(b) => Ok(b.clone()),
            KeelValue::String(s) => STANDARD
                .decode(s)
                .map(Bytes::from)
                .map_err(|e| KeelError::encoding(format!("invalid base64: {}", e))),
            other => Err(cannot_encode(other, "base64")),
        }
    }

    fn decode(&self, bytes: Bytes) -> KeelResult<KeelValue> {
        Ok(KeelValue::String(STANDARD.encode(&bytes)))
    }
}

type EncodeFn = dyn Fn(&KeelValue) -> KeelResult<KeelValue> + Send + Sync;
type DecodeFn = dyn Fn(KeelValue) -> KeelResult<KeelValue> + Send + Sync;

/// An ad-hoc codec built from closures.
///
/// `encode` produces a value in the codec's [`Format`] (a string for
/// [`Format::Utf8`], a string or binary otherwise), which is then turned
/// into bytes. `decode` receives the stored bytes already converted to the
/// format. Without a decode function the codec can only write; reading
/// through it fails with [`KeelError::EncodingError`].
#[derive(Clone)]
pub struct CustomCodec {
    name: String,
    format: Format,
    encode: Arc<EncodeFn>,
    decode: Option<Arc<DecodeFn>>,
}

impl CustomCodec {
    pub fn new(
        format: Format,
        encode: impl Fn(&KeelValue) -> KeelResult<KeelValue> + Send + Sync + 'static,
    ) -> Self {
        Self {
            name: "custom".to_owned(),
            format,
            encode: Arc::new(encode),
            decode: None,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_decode(
        mut self,
        decode: impl Fn(KeelValue) -> KeelResult<KeelValue> + Send + Sync + 'static,
    ) -> Self {
        self.decode = Some(Arc::new(decode));
        self
    }
}

impl Debug for CustomCodec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CustomCodec")
            .field("name", &self.name)
            .field("format", &self.format)
            .field("has_decode", &self.decode.is_some())
            .finish()
    }
}

impl Codec for CustomCodec {
    fn name(&self) -> &str {
        &self.name
    }

    fn format(&self) -> Format {
        self.format
    }

    fn encode(&self, value: &KeelValue) -> KeelResult<Bytes> {
        let native = (self.encode)(value)?;
        self.format.to_bytes(native)
    }

    fn decode(&self, bytes: Bytes) -> KeelResult<KeelValue> {
        let decode = self.decode.as_ref().ok_or_else(|| {
            KeelError::encoding(format!("codec '{}' does not support decoding", self.name))
        })?;
        decode(self.format.from_bytes(bytes)?)
    }
}

static BUILTIN_CODECS: Lazy<FxHashMap<&'static str, Arc<dyn Codec>>> = Lazy::new(|| {
    let buffer: Arc<dyn Codec> = Arc::new(BufferCodec {
        name: "buffer",
        format: Format::Buffer,
    });
    let binary: Arc<dyn Codec> = Arc::new(BufferCodec {
        name: "binary",
        format: Format::Buffer,
    });
    let view: Arc<dyn Codec> = Arc::new(BufferCodec {
        name: "view",
        format: Format::View,
    });
    let utf8: Arc<dyn Codec> = Arc::new(Utf8Codec { name: "utf8" });
    let json: Arc<dyn Codec> = Arc::new(JsonCodec);
    let base64: Arc<dyn Codec> = Arc::new(Base64Codec);

    let mut map = FxHashMap::default();
    map.insert("buffer", buffer);
    map.insert("binary", binary);
    map.insert("view", view);
    map.insert("utf-8", utf8.clone());
    map.insert("utf8", utf8);
    map.insert("json", json);
    map.insert("base64", base64);
    map
});

/// Resolves [`Encoding`]s to codecs: registered names first, then built-ins.
#[derive(Debug, Clone, Default)]
pub struct CodecRegistry {
    registered: FxHashMap<String, Arc<dyn Codec>>,
}

impl CodecRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, codec: Arc<dyn Codec>) {
        self.registered.insert(codec.name().to_owned(), codec);
    }

    pub fn resolve(&self, encoding: &Encoding) -> KeelResult<Arc<dyn Codec>> {
        match encoding {
            Encoding::Custom(codec) => Ok(codec.clone()),
            Encoding::Named(name) => self.resolve_name(name),
        }
    }

    pub fn resolve_name(&self, name: &str) -> KeelResult<Arc<dyn Codec>> {
        self.registered
            .get(name)
            .or_else(|| BUILTIN_CODECS.get(name))
            .cloned()
            .ok_or_else(|| KeelError::EncodingNotFound(name.into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn builtin(name: &str) -> Arc<dyn Codec> {
        CodecRegistry::new().resolve_name(name).unwrap()
    }

    #[test]
    fn builtins_always_resolve() {
        for name in ["buffer", "binary", "view", "utf8", "utf-8", "json", "base64"] {
            let codec = builtin(name);
            assert!(!codec.name().is_empty());
        }
        let err = CodecRegistry::new().resolve_name("nope").unwrap_err();
        assert_eq!(err.code(), "LEVEL_ENCODING_NOT_FOUND");
    }

    #[test]
    fn utf8_round_trip_and_scalars() {
        let codec = builtin("utf8");
        let bytes = codec.encode(&"héllo".into()).unwrap();
        assert_eq!(codec.decode(bytes).unwrap(), KeelValue::from("héllo"));
        assert_eq!(codec.encode(&12.into()).unwrap(), Bytes::from_static(b"12"));
        assert_eq!(
            codec.encode(&true.into()).unwrap(),
            Bytes::from_static(b"true")
        );
        assert!(codec.encode(&KeelValue::Null).is_err());
        let bad = codec.decode(Bytes::from_static(&[0xff, 0xfe])).unwrap_err();
        assert_eq!(bad.code(), "LEVEL_ENCODING_ERROR");
    }

    #[test]
    fn buffer_is_passthrough() {
        let codec = builtin("buffer");
        assert!(codec.is_passthrough());
        assert_eq!(codec.format(), Format::Buffer);
        let bytes = codec.encode(&"two".into()).unwrap();
        assert_eq!(bytes, Bytes::from_static(b"two"));
        assert_eq!(
            decode_with(codec.as_ref(), bytes.clone()).unwrap(),
            KeelValue::Binary(bytes)
        );
        assert!(codec.encode(&1.into()).is_err());
    }

    #[test]
    fn json_codec() {
        let codec = builtin("json");
        let v: KeelValue = serde_json::json!({"a": 1, "b": [true, null]}).into();
        let bytes = codec.encode(&v).unwrap();
        assert_eq!(codec.decode(bytes).unwrap(), v);
        assert!(codec.decode(Bytes::from_static(b"{nope")).is_err());
    }

    #[test]
    fn base64_codec() {
        let codec = builtin("base64");
        let bytes = codec.encode(&"aGVsbG8=".into()).unwrap();
        assert_eq!(bytes, Bytes::from_static(b"hello"));
        assert_eq!(codec.decode(bytes).unwrap(), KeelValue::from("aGVsbG8="));
        assert!(codec.encode(&"***".into()).is_err());
    }

    #[test]
    fn custom_codec_uses_format() {
        let codec = CustomCodec::new(Format::Utf8, |_| Ok("two".into()));
        assert_eq!(
            codec.encode(&"xyz".into()).unwrap(),
            Bytes::from_static(b"two")
        );
        let err = codec.decode(Bytes::from_static(b"two")).unwrap_err();
        assert_eq!(err.code(), "LEVEL_ENCODING_ERROR");

        let upper = CustomCodec::new(Format::Utf8, |v| {
            Ok(v.to_text().unwrap_or_default().to_uppercase().into())
        })
        .with_name("upper")
        .with_decode(|v| Ok(v.as_string().map(|s| s.to_lowercase()).into()));
        let bytes = upper.encode(&"abc".into()).unwrap();
        assert_eq!(bytes, Bytes::from_static(b"ABC"));
        assert_eq!(upper.decode(bytes).unwrap(), KeelValue::from("abc"));
    }

    #[test]
    fn registered_codec_shadows_builtin() {
        let mut registry = CodecRegistry::new();
        registry.register(Arc::new(
            CustomCodec::new(Format::Buffer, |v| Ok(v.clone())).with_name("json"),
        ));
        let codec = registry.resolve(&Encoding::from("json")).unwrap();
        assert_eq!(codec.format(), Format::Buffer);
    }
}
