use std::fmt::Debug;
use std::sync::Arc;

use keel_common::KeelValue;

use crate::codec::{Codec, CustomCodec};

/// Selects a codec, either by registered name or by handing one in directly.
#[derive(Debug, Clone)]
pub enum Encoding {
    Named(String),
    Custom(Arc<dyn Codec>),
}

impl From<&str> for Encoding {
    fn from(name: &str) -> Self {
        Encoding::Named(name.to_owned())
    }
}

impl From<String> for Encoding {
    fn from(name: String) -> Self {
        Encoding::Named(name)
    }
}

impl From<Arc<dyn Codec>> for Encoding {
    fn from(codec: Arc<dyn Codec>) -> Self {
        Encoding::Custom(codec)
    }
}

impl From<CustomCodec> for Encoding {
    fn from(codec: CustomCodec) -> Self {
        Encoding::Custom(Arc::new(codec))
    }
}

/// Store-wide configuration.
#[derive(Debug, Clone)]
pub struct DbConfig {
    pub(crate) key_encoding: Encoding,
    pub(crate) value_encoding: Encoding,
    pub(crate) codecs: Vec<Arc<dyn Codec>>,
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            key_encoding: Encoding::from("buffer"),
            value_encoding: Encoding::from("buffer"),
            codecs: Vec::new(),
        }
    }
}

impl DbConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Default encoding for keys of every operation. `buffer` unless set.
    pub fn key_encoding(mut self, encoding: impl Into<Encoding>) -> Self {
        self.key_encoding = encoding.into();
        self
    }

    /// Default encoding for values of every operation. `buffer` unless set.
    pub fn value_encoding(mut self, encoding: impl Into<Encoding>) -> Self {
        self.value_encoding = encoding.into();
        self
    }

    /// Make `codec` resolvable by its name. It shadows a built-in of the same
    /// name.
    pub fn register_codec(mut self, codec: impl Codec + 'static) -> Self {
        self.codecs.push(Arc::new(codec));
        self
    }
}

#[derive(Debug, Clone, Default)]
pub struct ReadOptions {
    pub(crate) key_encoding: Option<Encoding>,
    pub(crate) value_encoding: Option<Encoding>,
    pub(crate) as_buffer: Option<bool>,
}

impl ReadOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn key_encoding(mut self, encoding: impl Into<Encoding>) -> Self {
        self.key_encoding = Some(encoding.into());
        self
    }

    /// Takes precedence over [`ReadOptions::as_buffer`].
    pub fn value_encoding(mut self, encoding: impl Into<Encoding>) -> Self {
        self.value_encoding = Some(encoding.into());
        self
    }

    /// `true` returns raw bytes, `false` returns a UTF-8 string.
    pub fn as_buffer(mut self, as_buffer: bool) -> Self {
        self.as_buffer = Some(as_buffer);
        self
    }
}

#[derive(Debug, Clone, Default)]
pub struct WriteOptions {
    pub(crate) key_encoding: Option<Encoding>,
    pub(crate) value_encoding: Option<Encoding>,
}

impl WriteOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn key_encoding(mut self, encoding: impl Into<Encoding>) -> Self {
        self.key_encoding = Some(encoding.into());
        self
    }

    pub fn value_encoding(mut self, encoding: impl Into<Encoding>) -> Self {
        self.value_encoding = Some(encoding.into());
        self
    }
}

/// Range, direction and projection of a cursor.
///
/// `gt`/`lt` are exclusive and win over `gte`/`lte` when both are given.
/// A `limit` of zero or below means unbounded.
#[derive(Debug, Clone)]
pub struct IteratorOptions {
    pub(crate) gt: Option<KeelValue>,
    pub(crate) gte: Option<KeelValue>,
    pub(crate) lt: Option<KeelValue>,
    pub(crate) lte: Option<KeelValue>,
    pub(crate) reverse: bool,
    pub(crate) limit: i64,
    pub(crate) keys: bool,
    pub(crate) values: bool,
    pub(crate) key_encoding: Option<Encoding>,
    pub(crate) value_encoding: Option<Encoding>,
}

impl Default for IteratorOptions {
    fn default() -> Self {
        Self {
            gt: None,
            gte: None,
            lt: None,
            lte: None,
            reverse: false,
            limit: -1,
            keys: true,
            values: true,
            key_encoding: None,
            value_encoding: None,
        }
    }
}

impl IteratorOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn gt(mut self, key: impl Into<KeelValue>) -> Self {
        self.gt = Some(key.into());
        self
    }

    pub fn gte(mut self, key: impl Into<KeelValue>) -> Self {
        self.gte = Some(key.into());
        self
    }

    pub fn lt(mut self, key: impl Into<KeelValue>) -> Self {
        self.lt = Some(key.into());
        self
    }

    pub fn lte(mut self, key: impl Into<KeelValue>) -> Self {
        self.lte = Some(key.into());
        self
    }

    pub fn reverse(mut self, reverse: bool) -> Self {
        self.reverse = reverse;
        self
    }

    pub fn limit(mut self, limit: i64) -> Self {
        self.limit = limit;
        self
    }

    /// Whether entries carry their decoded key.
    pub fn keys(mut self, keys: bool) -> Self {
        self.keys = keys;
        self
    }

    /// Whether entries carry their decoded value.
    pub fn values(mut self, values: bool) -> Self {
        self.values = values;
        self
    }

    pub fn key_encoding(mut self, encoding: impl Into<Encoding>) -> Self {
        self.key_encoding = Some(encoding.into());
        self
    }

    pub fn value_encoding(mut self, encoding: impl Into<Encoding>) -> Self {
        self.value_encoding = Some(encoding.into());
        self
    }
}

#[derive(Debug, Clone, Default)]
pub struct SeekOptions {
    pub(crate) key_encoding: Option<Encoding>,
}

impl SeekOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Encode the seek target with this codec instead of the cursor's.
    pub fn key_encoding(mut self, encoding: impl Into<Encoding>) -> Self {
        self.key_encoding = Some(encoding.into());
        self
    }
}
