//! The range-bound cursor.
//!
//! A cursor is in one of three states:
//!
//! ```text
//!            next() / seek()
//!   ready ───────────────────▶ stepping
//!     ▲                           │
//!     └───────── step done ───────┘
//!
//!   ready | stepping ── close() ──▶ closed
//! ```
//!
//! Only one step may be outstanding. A second `next()` or a `seek()` during a
//! step is rejected right away with [`KeelError::IteratorBusy`]; it is never
//! queued. Everything else, including backend failures, comes back through the
//! future returned by `next()`.
use std::fmt::Debug;
use std::future::Future;
use std::ops::Bound;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use bytes::Bytes;
use keel_common::{KeelError, KeelResult, KeelValue};
use tracing::trace;

use crate::codec::{decode_with, Codec};
use crate::config::{IteratorOptions, SeekOptions};
use crate::db::{yield_to_scheduler, DbInner};
use crate::range::KeyRange;

const READY: u8 = 0;
const STEPPING: u8 = 1;
const CLOSED: u8 = 2;

/// One step of a cursor. A half is `None` when the cursor was created with
/// `keys(false)` or `values(false)`.
#[derive(Debug, Clone, PartialEq)]
pub struct Entry {
    pub key: Option<KeelValue>,
    pub value: Option<KeelValue>,
}

#[derive(Debug)]
enum Position {
    Start,
    /// The last yielded key.
    After(Bytes),
    /// A seek target inside the range.
    Seek(Bytes),
    /// A seek target that could not be encoded. Reported by the next step.
    Failed(KeelError),
    Exhausted,
}

#[derive(Debug)]
struct Walk {
    position: Position,
    yielded: usize,
}

#[derive(Debug)]
struct Plan {
    range: KeyRange,
    key_codec: Arc<dyn Codec>,
    value_codec: Arc<dyn Codec>,
}

impl Plan {
    fn new(db: &DbInner, options: &IteratorOptions) -> KeelResult<Self> {
        let key_codec = db.key_codec(options.key_encoding.as_ref())?;
        let value_codec = db.value_codec(options.value_encoding.as_ref(), None)?;
        let range = KeyRange::resolve(options, key_codec.as_ref())?;
        Ok(Self {
            range,
            key_codec,
            value_codec,
        })
    }

    /// The bounds of the scan whose first entry, in the cursor's direction,
    /// is the next one to yield from `position`.
    fn scan_bounds<'a>(&'a self, position: &'a Position) -> (Bound<&'a [u8]>, Bound<&'a [u8]>) {
        let lower = self.range.lower();
        let upper = self.range.upper();
        match (position, self.range.is_reverse()) {
            (Position::After(key), false) => (Bound::Excluded(key.as_ref()), upper),
            (Position::After(key), true) => (lower, Bound::Excluded(key.as_ref())),
            (Position::Seek(key), false) => (Bound::Included(key.as_ref()), upper),
            (Position::Seek(key), true) => (lower, Bound::Included(key.as_ref())),
            _ => (lower, upper),
        }
    }
}

#[derive(Debug)]
struct CursorInner {
    db: Arc<DbInner>,
    plan: KeelResult<Plan>,
    keys: bool,
    values: bool,
    state: AtomicU8,
    walk: Mutex<Walk>,
}

impl CursorInner {
    fn is_closed(&self) -> bool {
        self.state.load(Ordering::Acquire) == CLOSED
    }

    fn step(&self) -> KeelResult<Option<Entry>> {
        let plan = self.plan.as_ref().map_err(Clone::clone)?;
        self.db.ensure_open()?;
        let mut walk = self.walk.lock()?;
        if plan
            .range
            .limit()
            .is_some_and(|limit| walk.yielded >= limit)
        {
            walk.position = Position::Exhausted;
            return Ok(None);
        }

        let position = match std::mem::replace(&mut walk.position, Position::Exhausted) {
            Position::Exhausted => return Ok(None),
            Position::Failed(err) => return Err(err),
            position => position,
        };
        if plan.range.is_empty() {
            trace!("cursor over an empty range");
            return Ok(None);
        }

        let reverse = plan.range.is_reverse();
        let found = self.db.read(|kv| {
            let (start, end) = plan.scan_bounds(&position);
            kv.first_in(start, end, reverse)
        });
        match found {
            Err(err) => {
                walk.position = position;
                Err(err)
            }
            Ok(None) => {
                trace!("cursor exhausted");
                Ok(None)
            }
            Ok(Some((key, value))) => {
                walk.position = Position::After(key.clone());
                walk.yielded += 1;
                drop(walk);
                self.decode(plan, key, value).map(Some)
            }
        }
    }

    fn decode(&self, plan: &Plan, key: Bytes, value: Bytes) -> KeelResult<Entry> {
        let key = if self.keys {
            Some(decode_with(plan.key_codec.as_ref(), key)?)
        } else {
            None
        };
        let value = if self.values {
            Some(decode_with(plan.value_codec.as_ref(), value)?)
        } else {
            None
        };
        Ok(Entry { key, value })
    }

    /// Where a seek to `target` leaves the cursor. Targets outside the range
    /// exhaust it.
    fn seek_position(&self, target: &KeelValue, options: &SeekOptions) -> Position {
        let Ok(plan) = &self.plan else {
            // the next step reports why the cursor is unusable
            return Position::Start;
        };

        let codec = match &options.key_encoding {
            Some(encoding) => self.db.codecs().resolve(encoding),
            None => Ok(plan.key_codec.clone()),
        };
        match codec.and_then(|codec| codec.encode(target)) {
            Ok(key) if plan.range.contains(&key) => Position::Seek(key),
            Ok(_) => Position::Exhausted,
            Err(err) => Position::Failed(err),
        }
    }
}

/// Puts the cursor back to `ready` when a step ends or is abandoned, unless it
/// was closed in the meantime.
struct StepGuard {
    inner: Arc<CursorInner>,
}

impl StepGuard {
    /// `Ok(None)` means the cursor is closed.
    fn acquire(inner: &Arc<CursorInner>) -> KeelResult<Option<Self>> {
        match inner
            .state
            .compare_exchange(READY, STEPPING, Ordering::AcqRel, Ordering::Acquire)
        {
            Ok(_) => Ok(Some(StepGuard {
                inner: inner.clone(),
            })),
            Err(CLOSED) => Ok(None),
            Err(_) => Err(KeelError::IteratorBusy),
        }
    }
}

impl Drop for StepGuard {
    fn drop(&mut self) {
        let _ = self.inner.state.compare_exchange(
            STEPPING,
            READY,
            Ordering::AcqRel,
            Ordering::Acquire,
        );
    }
}

/// A stateful walk over a range of the store, created by
/// [`KeelDb::iterator`](crate::KeelDb::iterator).
///
/// A cursor must not be stepped from two places at once: see the module docs.
pub struct Cursor {
    inner: Arc<CursorInner>,
}

impl Debug for Cursor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = match self.inner.state.load(Ordering::Acquire) {
            READY => "ready",
            STEPPING => "stepping",
            _ => "closed",
        };
        f.debug_struct("Cursor").field("state", &state).finish()
    }
}

impl Cursor {
    pub(crate) fn new(db: Arc<DbInner>, options: IteratorOptions) -> Self {
        let plan = Plan::new(&db, &options);
        if let Err(err) = &plan {
            trace!("cursor created with unusable options: {}", err);
        }

        Self {
            inner: Arc::new(CursorInner {
                db,
                plan,
                keys: options.keys,
                values: options.values,
                state: AtomicU8::new(READY),
                walk: Mutex::new(Walk {
                    position: Position::Start,
                    yielded: 0,
                }),
            }),
        }
    }

    pub fn is_closed(&self) -> bool {
        self.inner.is_closed()
    }

    /// Start the next step.
    ///
    /// Fails immediately with [`KeelError::IteratorBusy`] if a step is still
    /// outstanding. Otherwise the returned future yields the next entry, or
    /// `None` at the end of the range, or after `limit` entries. On a closed
    /// cursor it yields [`KeelError::IteratorClosed`], as does a step that was
    /// outstanding when the cursor got closed.
    pub fn next(
        &self,
    ) -> KeelResult<impl Future<Output = KeelResult<Option<Entry>>> + Send + 'static> {
        let guard = StepGuard::acquire(&self.inner)?;
        let inner = self.inner.clone();
        Ok(async move {
            yield_to_scheduler().await;
            let Some(guard) = guard else {
                return Err(KeelError::IteratorClosed);
            };

            let result = inner.step();
            drop(guard);
            if inner.is_closed() {
                trace!("discarding step of a closed cursor");
                return Err(KeelError::IteratorClosed);
            }

            result
        })
    }

    /// Move the cursor so the next step starts at `target`: at-or-after it
    /// going forward, at-or-before it in reverse.
    ///
    /// Does no I/O. A no-op on a closed cursor. A target outside the range
    /// makes the next step yield `None`, and a target that cannot be encoded
    /// makes it fail with [`KeelError::EncodingError`]. The only error
    /// returned here is [`KeelError::IteratorBusy`].
    pub fn seek(&self, target: impl Into<KeelValue>, options: SeekOptions) -> KeelResult<()> {
        let Some(_guard) = StepGuard::acquire(&self.inner)? else {
            return Ok(());
        };

        let position = self.inner.seek_position(&target.into(), &options);
        trace!("seek to {:?}", position);
        let mut walk = self
            .inner
            .walk
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        walk.position = position;
        Ok(())
    }

    /// Close the cursor. Takes effect immediately; the future only reports
    /// completion. Closing twice is fine.
    pub fn close(&self) -> impl Future<Output = KeelResult<()>> + Send + 'static {
        let prev = self.inner.state.swap(CLOSED, Ordering::AcqRel);
        if prev != CLOSED {
            trace!("cursor closed");
        }

        async {
            yield_to_scheduler().await;
            Ok(())
        }
    }

    /// Collect every remaining entry, then close the cursor.
    pub async fn all(self) -> KeelResult<Vec<Entry>> {
        let mut entries = Vec::new();
        let result = loop {
            match self.next()?.await {
                Ok(Some(entry)) => entries.push(entry),
                Ok(None) => break Ok(entries),
                Err(err) => break Err(err),
            }
        };
        self.close().await?;
        result
    }
}
