//! Completion-callback flavour of the API.
//!
//! Each `*_with_callback` method drives the same future as its plain
//! counterpart on the current tokio runtime and hands the result to the
//! callback exactly once. The callback always runs on a runtime task, never
//! inside the call that registered it, and it receives exactly the error the
//! future would have produced.
//!
//! # Panics
//!
//! Like [`tokio::spawn`], these methods panic when called outside of a tokio
//! runtime.
use std::future::Future;

use keel_common::{KeelResult, KeelValue};
use tokio::task::JoinHandle;

use crate::config::{ReadOptions, WriteOptions};
use crate::cursor::{Cursor, Entry};
use crate::db::{BatchOp, KeelDb};

/// Run `future` on the runtime and pass its output to `callback`.
pub fn complete<T, F, C>(future: F, callback: C) -> JoinHandle<()>
where
    T: Send + 'static,
    F: Future<Output = KeelResult<T>> + Send + 'static,
    C: FnOnce(KeelResult<T>) + Send + 'static,
{
    tokio::spawn(async move {
        let result = future.await;
        callback(result);
    })
}

impl KeelDb {
    pub fn get_with_callback(
        &self,
        key: impl Into<KeelValue>,
        options: ReadOptions,
        callback: impl FnOnce(KeelResult<KeelValue>) + Send + 'static,
    ) -> JoinHandle<()> {
        complete(self.get(key, options), callback)
    }

    pub fn put_with_callback(
        &self,
        key: impl Into<KeelValue>,
        value: impl Into<KeelValue>,
        options: WriteOptions,
        callback: impl FnOnce(KeelResult<()>) + Send + 'static,
    ) -> JoinHandle<()> {
        complete(self.put(key, value, options), callback)
    }

    pub fn del_with_callback(
        &self,
        key: impl Into<KeelValue>,
        options: WriteOptions,
        callback: impl FnOnce(KeelResult<()>) + Send + 'static,
    ) -> JoinHandle<()> {
        complete(self.del(key, options), callback)
    }

    pub fn batch_with_callback(
        &self,
        ops: Vec<BatchOp>,
        options: WriteOptions,
        callback: impl FnOnce(KeelResult<()>) + Send + 'static,
    ) -> JoinHandle<()> {
        complete(self.batch(ops, options), callback)
    }
}

impl Cursor {
    /// Like [`Cursor::next`], the busy check still happens synchronously and
    /// is the only error returned directly.
    pub fn next_with_callback(
        &self,
        callback: impl FnOnce(KeelResult<Option<Entry>>) + Send + 'static,
    ) -> KeelResult<JoinHandle<()>> {
        let step = self.next()?;
        Ok(complete(step, callback))
    }

    pub fn close_with_callback(
        &self,
        callback: impl FnOnce(KeelResult<()>) + Send + 'static,
    ) -> JoinHandle<()> {
        complete(self.close(), callback)
    }
}
