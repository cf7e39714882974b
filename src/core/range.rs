//! core::range
//!
//! Translation of a requested item range into a concrete result window.
//!
//! # Semantics
//!
//! Clients request ranges with a 0-based, *inclusive* `first`/`last` pair.
//! The server may impose a ceiling (`max`, where 0 means no ceiling). The
//! resolver turns those into a half-open [`Window`] over a result set of
//! `size` items:
//!
//! 1. `first < 0` is rejected ([`RangeError::NegativeStart`])
//! 2. `first > last` is rejected ([`RangeError::Inverted`])
//! 3. `first >= size` is rejected ([`RangeError::BeyondDataset`])
//! 4. `first == last == 0` with a ceiling means "no range requested" and
//!    the window becomes `[0, max)`
//! 5. otherwise `last` is made exclusive by adding one
//! 6. the end is clamped to `size`
//! 7. a window longer than `max` is cut to `first + max`
//!
//! # The zero/zero request
//!
//! `first == last == 0` is ambiguous: it is both "only the first record" and
//! "nothing requested". When a ceiling is configured it is read as the
//! latter. Without a ceiling it yields the first record only.
//!
//! # Example
//!
//! ```
//! use taxii_datastore::core::range::resolve;
//!
//! // Nothing requested, server pages at 5
//! let w = resolve(0, 0, 5, 12).unwrap();
//! assert_eq!((w.start, w.end), (0, 5));
//!
//! // Explicit inclusive range
//! let w = resolve(2, 4, 0, 10).unwrap();
//! assert_eq!((w.start, w.end, w.last()), (2, 5, 4));
//! ```

use thiserror::Error;

/// Errors from range resolution.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RangeError {
    /// The starting value is negative.
    #[error("the starting value can not be negative: {first}")]
    NegativeStart { first: i64 },

    /// The starting value is larger than the ending value.
    #[error("the starting range value {first} is larger than the ending range value {last}")]
    Inverted { first: i64, last: i64 },

    /// The starting value lies beyond the end of the result set.
    #[error("the starting range value {first} is out of scope for {size} records")]
    BeyondDataset { first: i64, size: usize },
}

impl RangeError {
    /// Check whether this error means "valid request, nothing there".
    ///
    /// Malformed requests return `false`.
    pub fn is_out_of_range(&self) -> bool {
        matches!(self, RangeError::BeyondDataset { .. })
    }
}

/// A resolved, half-open window `[start, end)` over a result set.
///
/// A window produced by [`resolve`] is never empty.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Window {
    /// First index included.
    pub start: usize,
    /// First index excluded.
    pub end: usize,
}

impl Window {
    /// The inclusive index of the last item, as reported back to clients.
    pub fn last(&self) -> usize {
        self.end.saturating_sub(1)
    }

    /// Number of items in the window.
    pub fn len(&self) -> usize {
        self.end - self.start
    }

    /// Check whether the window covers no items.
    pub fn is_empty(&self) -> bool {
        self.end <= self.start
    }

    /// The window as a slice range.
    pub fn as_range(&self) -> std::ops::Range<usize> {
        self.start..self.end
    }
}

/// Resolve a requested range against a ceiling and a result-set size.
///
/// `first` and `last` are inclusive indices as received from the client;
/// `max` is the server ceiling (0 = none); `size` is the number of items
/// that matched before windowing.
///
/// # Errors
///
/// - [`RangeError::NegativeStart`] if `first < 0`
/// - [`RangeError::Inverted`] if `first > last`
/// - [`RangeError::BeyondDataset`] if `first >= size`
pub fn resolve(first: i64, last: i64, max: usize, size: usize) -> Result<Window, RangeError> {
    if first < 0 {
        return Err(RangeError::NegativeStart { first });
    }

    if first > last {
        return Err(RangeError::Inverted { first, last });
    }

    // first is non-negative from here on
    let start = first as u64;
    if start >= size as u64 {
        return Err(RangeError::BeyondDataset { first, size });
    }
    let start = start as usize;

    let mut end = if first == 0 && last == 0 && max != 0 {
        start.saturating_add(max)
    } else {
        usize::try_from(last).unwrap_or(usize::MAX).saturating_add(1)
    };

    if end > size {
        end = size;
    }

    if max != 0 && end - start > max {
        end = start + max;
    }

    Ok(Window { start, end })
}
