use std::future::Future;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, Mutex};

use bytes::Bytes;
use keel_common::{KeelError, KeelResult, KeelValue};
use keel_kv_store::{KvOp, KvStore, MemKvStore};
use tracing::{debug, debug_span, trace, Instrument};

use crate::codec::{decode_with, Codec, CodecRegistry};
use crate::config::{DbConfig, Encoding, IteratorOptions, ReadOptions, WriteOptions};
use crate::cursor::Cursor;

const OPEN: u8 = 0;
const CLOSED: u8 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DbStatus {
    Open,
    Closed,
}

/// One write of a [`KeelDb::batch`].
#[derive(Debug, Clone)]
pub enum BatchOp {
    Put {
        key: KeelValue,
        value: KeelValue,
        key_encoding: Option<Encoding>,
        value_encoding: Option<Encoding>,
    },
    Del {
        key: KeelValue,
        key_encoding: Option<Encoding>,
    },
}

impl BatchOp {
    pub fn put(key: impl Into<KeelValue>, value: impl Into<KeelValue>) -> Self {
        BatchOp::Put {
            key: key.into(),
            value: value.into(),
            key_encoding: None,
            value_encoding: None,
        }
    }

    pub fn del(key: impl Into<KeelValue>) -> Self {
        BatchOp::Del {
            key: key.into(),
            key_encoding: None,
        }
    }

    pub fn key_encoding(mut self, encoding: impl Into<Encoding>) -> Self {
        match &mut self {
            BatchOp::Put { key_encoding, .. } | BatchOp::Del { key_encoding, .. } => {
                *key_encoding = Some(encoding.into())
            }
        }
        self
    }

    /// Has no effect on a `Del`.
    pub fn value_encoding(mut self, encoding: impl Into<Encoding>) -> Self {
        if let BatchOp::Put { value_encoding, .. } = &mut self {
            *value_encoding = Some(encoding.into());
        }
        self
    }
}

/// Every result reaches its caller after a scheduling point, never from
/// inside the call that asked for it.
pub(crate) async fn yield_to_scheduler() {
    tokio::task::yield_now().await
}

pub(crate) fn check_key(key: &KeelValue) -> KeelResult<()> {
    if key.is_null() {
        return Err(KeelError::InvalidKey(
            "key cannot be `null` or `undefined`".into(),
        ));
    }

    if let Some(kind) = key.empty_kind() {
        return Err(KeelError::InvalidKey(
            format!("key cannot be an empty {}", kind).into_boxed_str(),
        ));
    }

    Ok(())
}

fn check_value(value: &KeelValue) -> KeelResult<()> {
    if value.is_null() {
        return Err(KeelError::InvalidValue(
            "value cannot be `null` or `undefined`".into(),
        ));
    }

    Ok(())
}

fn encode_key(key: &KeelValue, codec: &dyn Codec) -> KeelResult<Bytes> {
    check_key(key)?;
    let bytes = codec.encode(key)?;
    if bytes.is_empty() {
        return Err(KeelError::InvalidKey("key cannot be an empty Buffer".into()));
    }

    Ok(bytes)
}

fn encode_value(value: &KeelValue, codec: &dyn Codec) -> KeelResult<Bytes> {
    check_value(value)?;
    codec.encode(value)
}

#[derive(Debug)]
pub(crate) struct DbInner {
    store: Arc<Mutex<dyn KvStore>>,
    codecs: CodecRegistry,
    key_codec: Arc<dyn Codec>,
    value_codec: Arc<dyn Codec>,
    status: AtomicU8,
}

impl DbInner {
    pub(crate) fn ensure_open(&self) -> KeelResult<()> {
        if self.status.load(Ordering::Acquire) == OPEN {
            Ok(())
        } else {
            Err(KeelError::DatabaseNotOpen)
        }
    }

    pub(crate) fn codecs(&self) -> &CodecRegistry {
        &self.codecs
    }

    pub(crate) fn key_codec(&self, encoding: Option<&Encoding>) -> KeelResult<Arc<dyn Codec>> {
        match encoding {
            Some(encoding) => self.codecs.resolve(encoding),
            None => Ok(self.key_codec.clone()),
        }
    }

    /// An explicit encoding wins over `as_buffer`, which wins over the store
    /// default.
    pub(crate) fn value_codec(
        &self,
        encoding: Option<&Encoding>,
        as_buffer: Option<bool>,
    ) -> KeelResult<Arc<dyn Codec>> {
        match (encoding, as_buffer) {
            (Some(encoding), _) => self.codecs.resolve(encoding),
            (None, Some(true)) => self.codecs.resolve_name("buffer"),
            (None, Some(false)) => self.codecs.resolve_name("utf8"),
            (None, None) => Ok(self.value_codec.clone()),
        }
    }

    pub(crate) fn read<R>(&self, f: impl FnOnce(&dyn KvStore) -> KeelResult<R>) -> KeelResult<R> {
        let kv = self.store.lock()?;
        f(&*kv)
    }

    fn write<R>(&self, f: impl FnOnce(&mut dyn KvStore) -> KeelResult<R>) -> KeelResult<R> {
        let mut kv = self.store.lock()?;
        f(&mut *kv)
    }

    fn get(&self, key: &KeelValue, options: &ReadOptions) -> KeelResult<KeelValue> {
        self.ensure_open()?;
        let key_codec = self.key_codec(options.key_encoding.as_ref())?;
        let value_codec = self.value_codec(options.value_encoding.as_ref(), options.as_buffer)?;
        let key = encode_key(key, key_codec.as_ref())?;
        let value = self.read(|kv| kv.get(&key))?.ok_or(KeelError::NotFound)?;
        decode_with(value_codec.as_ref(), value)
    }

    fn get_many(
        &self,
        keys: &[KeelValue],
        options: &ReadOptions,
    ) -> KeelResult<Vec<Option<KeelValue>>> {
        self.ensure_open()?;
        let key_codec = self.key_codec(options.key_encoding.as_ref())?;
        let value_codec = self.value_codec(options.value_encoding.as_ref(), options.as_buffer)?;
        let keys = keys
            .iter()
            .map(|k| encode_key(k, key_codec.as_ref()))
            .collect::<KeelResult<Vec<_>>>()?;
        let values = self.read(|kv| {
            keys.iter()
                .map(|k| kv.get(k))
                .collect::<KeelResult<Vec<_>>>()
        })?;
        values
            .into_iter()
            .map(|v| v.map(|v| decode_with(value_codec.as_ref(), v)).transpose())
            .collect()
    }

    fn put(&self, key: &KeelValue, value: &KeelValue, options: &WriteOptions) -> KeelResult<()> {
        self.ensure_open()?;
        let key_codec = self.key_codec(options.key_encoding.as_ref())?;
        let value_codec = self.value_codec(options.value_encoding.as_ref(), None)?;
        let key = encode_key(key, key_codec.as_ref())?;
        let value = encode_value(value, value_codec.as_ref())?;
        self.write(|kv| kv.set(&key, value))
    }

    fn del(&self, key: &KeelValue, options: &WriteOptions) -> KeelResult<()> {
        self.ensure_open()?;
        let key_codec = self.key_codec(options.key_encoding.as_ref())?;
        let key = encode_key(key, key_codec.as_ref())?;
        self.write(|kv| kv.remove(&key))
    }

    /// Every op is validated and encoded before the first one is applied.
    fn batch(&self, ops: &[BatchOp], options: &WriteOptions) -> KeelResult<()> {
        self.ensure_open()?;
        let key_codec = self.key_codec(options.key_encoding.as_ref())?;
        let value_codec = self.value_codec(options.value_encoding.as_ref(), None)?;
        let mut kv_ops = Vec::with_capacity(ops.len());
        for op in ops {
            let kv_op = match op {
                BatchOp::Put {
                    key,
                    value,
                    key_encoding,
                    value_encoding,
                } => {
                    let kc = match key_encoding {
                        Some(e) => self.codecs.resolve(e)?,
                        None => key_codec.clone(),
                    };
                    let vc = match value_encoding {
                        Some(e) => self.codecs.resolve(e)?,
                        None => value_codec.clone(),
                    };
                    KvOp::Put {
                        key: encode_key(key, kc.as_ref())?,
                        value: encode_value(value, vc.as_ref())?,
                    }
                }
                BatchOp::Del { key, key_encoding } => {
                    let kc = match key_encoding {
                        Some(e) => self.codecs.resolve(e)?,
                        None => key_codec.clone(),
                    };
                    KvOp::Del {
                        key: encode_key(key, kc.as_ref())?,
                    }
                }
            };
            kv_ops.push(kv_op);
        }

        trace!("batch of {} ops", kv_ops.len());
        self.write(|kv| kv.apply(kv_ops))
    }
}

/// The store facade.
///
/// `KeelDb` is cheap to clone and can be shared between tasks; clones refer to
/// the same store. Every operation returns a future that owns everything it
/// needs, so it can be spawned or handed to [`crate::callback`].
#[derive(Debug, Clone)]
pub struct KeelDb {
    inner: Arc<DbInner>,
}

impl KeelDb {
    /// Open a store over a fresh in-memory backend.
    pub async fn open(config: DbConfig) -> KeelResult<Self> {
        Self::open_with_store(config, Arc::new(Mutex::new(MemKvStore::new()))).await
    }

    /// Open a store over the given backend.
    pub async fn open_with_store(
        config: DbConfig,
        store: Arc<Mutex<dyn KvStore>>,
    ) -> KeelResult<Self> {
        let DbConfig {
            key_encoding,
            value_encoding,
            codecs: extra_codecs,
        } = config;
        let mut codecs = CodecRegistry::new();
        for codec in extra_codecs {
            codecs.register(codec);
        }

        let key_codec = codecs.resolve(&key_encoding)?;
        let value_codec = codecs.resolve(&value_encoding)?;
        yield_to_scheduler().await;
        debug!(
            key_encoding = key_codec.name(),
            value_encoding = value_codec.name(),
            "open"
        );
        Ok(Self {
            inner: Arc::new(DbInner {
                store,
                codecs,
                key_codec,
                value_codec,
                status: AtomicU8::new(OPEN),
            }),
        })
    }

    pub fn status(&self) -> DbStatus {
        match self.inner.status.load(Ordering::Acquire) {
            OPEN => DbStatus::Open,
            _ => DbStatus::Closed,
        }
    }

    /// Close the store. Closing twice is fine. Cursors created before fail
    /// their next step with [`KeelError::DatabaseNotOpen`].
    pub fn close(&self) -> impl Future<Output = KeelResult<()>> + Send + 'static {
        let prev = self.inner.status.swap(CLOSED, Ordering::AcqRel);
        if prev == OPEN {
            debug!("close");
        }

        async {
            yield_to_scheduler().await;
            Ok(())
        }
    }

    /// Get the value of `key`. Fails with [`KeelError::NotFound`] when absent.
    pub fn get(
        &self,
        key: impl Into<KeelValue>,
        options: ReadOptions,
    ) -> impl Future<Output = KeelResult<KeelValue>> + Send + 'static {
        self.get_value(key.into(), options)
    }

    fn get_value(
        &self,
        key: KeelValue,
        options: ReadOptions,
    ) -> impl Future<Output = KeelResult<KeelValue>> + Send + 'static {
        let inner = self.inner.clone();
        async move {
            yield_to_scheduler().await;
            inner.get(&key, &options)
        }
        .instrument(debug_span!("get"))
    }

    /// Get several values at once. Absent keys map to `None`.
    pub fn get_many(
        &self,
        keys: Vec<KeelValue>,
        options: ReadOptions,
    ) -> impl Future<Output = KeelResult<Vec<Option<KeelValue>>>> + Send + 'static {
        let inner = self.inner.clone();
        async move {
            yield_to_scheduler().await;
            inner.get_many(&keys, &options)
        }
        .instrument(debug_span!("get_many"))
    }

    pub fn put(
        &self,
        key: impl Into<KeelValue>,
        value: impl Into<KeelValue>,
        options: WriteOptions,
    ) -> impl Future<Output = KeelResult<()>> + Send + 'static {
        self.put_value(key.into(), value.into(), options)
    }

    fn put_value(
        &self,
        key: KeelValue,
        value: KeelValue,
        options: WriteOptions,
    ) -> impl Future<Output = KeelResult<()>> + Send + 'static {
        let inner = self.inner.clone();
        async move {
            yield_to_scheduler().await;
            inner.put(&key, &value, &options)
        }
        .instrument(debug_span!("put"))
    }

    /// Delete `key`. Deleting an absent key succeeds.
    pub fn del(
        &self,
        key: impl Into<KeelValue>,
        options: WriteOptions,
    ) -> impl Future<Output = KeelResult<()>> + Send + 'static {
        self.del_value(key.into(), options)
    }

    fn del_value(
        &self,
        key: KeelValue,
        options: WriteOptions,
    ) -> impl Future<Output = KeelResult<()>> + Send + 'static {
        let inner = self.inner.clone();
        async move {
            yield_to_scheduler().await;
            inner.del(&key, &options)
        }
        .instrument(debug_span!("del"))
    }

    /// Apply `ops` in order, all or nothing.
    pub fn batch(
        &self,
        ops: Vec<BatchOp>,
        options: WriteOptions,
    ) -> impl Future<Output = KeelResult<()>> + Send + 'static {
        let inner = self.inner.clone();
        async move {
            yield_to_scheduler().await;
            inner.batch(&ops, &options)
        }
        .instrument(debug_span!("batch"))
    }

    /// Create a cursor. No I/O happens until its first step, and problems with
    /// the options are reported by that step.
    pub fn iterator(&self, options: IteratorOptions) -> Cursor {
        Cursor::new(self.inner.clone(), options)
    }
}
