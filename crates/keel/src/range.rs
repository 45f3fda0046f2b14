use std::ops::Bound;

use bytes::Bytes;
use keel_common::{KeelResult, KeelValue};

use crate::codec::Codec;
use crate::config::IteratorOptions;

/// The canonical form of `{gt, gte, lt, lte, reverse, limit}`.
///
/// Both bounds are already encoded. A lower bound above the upper bound is
/// legal and simply contains nothing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyRange {
    lower: Bound<Bytes>,
    upper: Bound<Bytes>,
    reverse: bool,
    limit: Option<usize>,
}

impl Default for KeyRange {
    fn default() -> Self {
        Self::all()
    }
}

impl KeyRange {
    pub fn all() -> Self {
        Self {
            lower: Bound::Unbounded,
            upper: Bound::Unbounded,
            reverse: false,
            limit: None,
        }
    }

    pub fn new(lower: Bound<Bytes>, upper: Bound<Bytes>) -> Self {
        Self {
            lower,
            upper,
            ..Self::all()
        }
    }

    pub fn with_reverse(mut self, reverse: bool) -> Self {
        self.reverse = reverse;
        self
    }

    /// A limit of zero or below is unbounded.
    pub fn with_limit(mut self, limit: i64) -> Self {
        self.limit = if limit > 0 {
            Some(limit as usize)
        } else {
            None
        };
        self
    }

    /// Build the range described by `options`, encoding its bounds with
    /// `key_codec`.
    pub fn resolve(options: &IteratorOptions, key_codec: &dyn Codec) -> KeelResult<Self> {
        let lower = pick_bound(options.gt.as_ref(), options.gte.as_ref(), key_codec)?;
        let upper = pick_bound(options.lt.as_ref(), options.lte.as_ref(), key_codec)?;
        Ok(Self::new(lower, upper)
            .with_reverse(options.reverse)
            .with_limit(options.limit))
    }

    pub fn lower(&self) -> Bound<&[u8]> {
        as_slice_bound(&self.lower)
    }

    pub fn upper(&self) -> Bound<&[u8]> {
        as_slice_bound(&self.upper)
    }

    pub fn is_reverse(&self) -> bool {
        self.reverse
    }

    pub fn limit(&self) -> Option<usize> {
        self.limit
    }

    pub fn contains(&self, key: &[u8]) -> bool {
        let above_lower = match self.lower() {
            Bound::Included(l) => key >= l,
            Bound::Excluded(l) => key > l,
            Bound::Unbounded => true,
        };
        let below_upper = match self.upper() {
            Bound::Included(u) => key <= u,
            Bound::Excluded(u) => key < u,
            Bound::Unbounded => true,
        };
        above_lower && below_upper
    }

    /// Whether no key at all can satisfy the range.
    pub fn is_empty(&self) -> bool {
        match (self.lower(), self.upper()) {
            (Bound::Included(l), Bound::Included(u)) => l > u,
            (Bound::Included(l), Bound::Excluded(u))
            | (Bound::Excluded(l), Bound::Included(u))
            | (Bound::Excluded(l), Bound::Excluded(u)) => l >= u,
            _ => false,
        }
    }
}

/// The exclusive bound wins when both members of a pair are present. `Null`
/// and bounds that encode to nothing count as absent.
fn pick_bound(
    exclusive: Option<&KeelValue>,
    inclusive: Option<&KeelValue>,
    key_codec: &dyn Codec,
) -> KeelResult<Bound<Bytes>> {
    let exclusive = exclusive.filter(|v| !v.is_null());
    let inclusive = inclusive.filter(|v| !v.is_null());
    let (value, make): (_, fn(Bytes) -> Bound<Bytes>) = match (exclusive, inclusive) {
        (Some(v), _) => (v, Bound::Excluded),
        (None, Some(v)) => (v, Bound::Included),
        (None, None) => return Ok(Bound::Unbounded),
    };

    let encoded = key_codec.encode(value)?;
    if encoded.is_empty() {
        return Ok(Bound::Unbounded);
    }

    Ok(make(encoded))
}

fn as_slice_bound(bound: &Bound<Bytes>) -> Bound<&[u8]> {
    match bound {
        Bound::Included(b) => Bound::Included(b.as_ref()),
        Bound::Excluded(b) => Bound::Excluded(b.as_ref()),
        Bound::Unbounded => Bound::Unbounded,
    }
}
