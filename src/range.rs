const UNIT_PREFIX: &str = "bytes=";

/// A satisfiable byte span, both ends inclusive.
///
/// Only constructible when `start <= end < size`, so an empty span cannot be
/// represented.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ByteRange {
    start: u64,
    end: u64,
}

impl ByteRange {
    /// Returns `None` unless `start <= end < size`.
    pub fn new(start: u64, end: u64, size: u64) -> Option<Self> {
        if start <= end && end < size {
            Some(ByteRange { start, end })
        } else {
            None
        }
    }

    /// The span covering a whole resource, or `None` for an empty resource.
    pub fn full(size: u64) -> Option<Self> {
        ByteRange::new(0, size.checked_sub(1)?, size)
    }

    pub fn start(&self) -> u64 {
        self.start
    }

    pub fn end(&self) -> u64 {
        self.end
    }

    /// Number of bytes in the span, `end - start + 1`.
    pub fn len(&self) -> u64 {
        self.end - self.start + 1
    }
}

/// Result of matching a `Range` header against a resource size.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RangeOutcome {
    NoRangeRequested,
    Satisfiable(ByteRange),
    /// Malformed, multi-range, wrong unit, or out of bounds.
    Unsatisfiable,
}

/// Resolves a raw `Range` header value against a resource of `size` bytes.
///
/// Accepted forms are `bytes=<start>-<end>`, `bytes=<start>-` and
/// `bytes=-<suffix>`. Anything else, including multiple ranges, is
/// unsatisfiable. A suffix longer than the resource is rejected rather than
/// clamped.
pub fn resolve(raw: Option<&str>, size: u64) -> RangeOutcome {
    let Some(raw) = raw else {
        return RangeOutcome::NoRangeRequested;
    };

    match parse_spec(raw).and_then(|spec| spec.bounds(size)) {
        Some((start, end)) => match ByteRange::new(start, end, size) {
            Some(range) => RangeOutcome::Satisfiable(range),
            None => RangeOutcome::Unsatisfiable,
        },
        None => RangeOutcome::Unsatisfiable,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RangeSpec {
    Bounded { start: u64, end: u64 },
    From { start: u64 },
    Suffix { len: u64 },
}

impl RangeSpec {
    /// Numeric `(start, end)` before the satisfiability check. `None` when the
    /// arithmetic leaves the valid domain (empty resource, suffix too long).
    fn bounds(self, size: u64) -> Option<(u64, u64)> {
        match self {
            RangeSpec::Bounded { start, end } => Some((start, end)),
            RangeSpec::From { start } => Some((start, size.checked_sub(1)?)),
            RangeSpec::Suffix { len } => Some((size.checked_sub(len)?, size.checked_sub(1)?)),
        }
    }
}

fn parse_spec(raw: &str) -> Option<RangeSpec> {
    let spec = raw.trim().strip_prefix(UNIT_PREFIX)?;
    let (first, last) = spec.split_once('-')?;

    match (parse_position(first)?, parse_position(last)?) {
        (Some(start), Some(end)) => Some(RangeSpec::Bounded { start, end }),
        (Some(start), None) => Some(RangeSpec::From { start }),
        (None, Some(len)) => Some(RangeSpec::Suffix { len }),
        (None, None) => None,
    }
}

/// `Some(None)` for an omitted position, `None` for anything that is not a
/// plain run of ASCII digits fitting in a `u64`.
fn parse_position(s: &str) -> Option<Option<u64>> {
    if s.is_empty() {
        return Some(None);
    }
    if !s.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    s.parse().ok().map(Some)
}
