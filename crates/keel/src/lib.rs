//! # Keel
//!
//! Keel is an ordered key-value store facade: point reads and writes, atomic
//! batches, and a seekable cursor over key ranges, with pluggable encodings
//! between application values and stored bytes.
//!
//! Every operation returns a future. Nothing happens until the future is
//! polled, so results are never delivered from inside the call that asked for
//! them. The one exception is misuse of a cursor: stepping or seeking a cursor
//! that already has a step outstanding fails on the spot with
//! [`KeelError::IteratorBusy`].
//!
//! ```no_run
//! use keel::{
//!     DbConfig, IteratorOptions, KeelDb, KeelValue, ReadOptions, SeekOptions, WriteOptions,
//! };
//!
//! # async fn run() -> keel::KeelResult<()> {
//! let db = KeelDb::open(DbConfig::new().key_encoding("utf8").value_encoding("utf8")).await?;
//! db.put("one", "1", WriteOptions::default()).await?;
//! db.put("two", "2", WriteOptions::default()).await?;
//! assert_eq!(db.get("one", ReadOptions::default()).await?, KeelValue::from("1"));
//!
//! let cursor = db.iterator(IteratorOptions::new().gt("a").reverse(true));
//! cursor.seek("three", SeekOptions::default())?;
//! while let Some(entry) = cursor.next()?.await? {
//!     println!("{:?} = {:?}", entry.key, entry.value);
//! }
//! cursor.close().await?;
//! # Ok(())
//! # }
//! ```
//!
//! Encodings are described in [`codec`]. The callback flavour of the API lives
//! in [`callback`].

pub mod callback;
pub mod codec;
mod config;
mod cursor;
mod db;
mod range;

pub use codec::{Codec, CodecRegistry, CustomCodec, Format};
pub use config::{DbConfig, Encoding, IteratorOptions, ReadOptions, SeekOptions, WriteOptions};
pub use cursor::{Cursor, Entry};
pub use db::{BatchOp, DbStatus, KeelDb};
pub use keel_common::{KeelError, KeelResult, KeelValue};
pub use keel_kv_store::{KvOp, KvScan, KvStore, MemKvStore};
pub use range::KeyRange;
