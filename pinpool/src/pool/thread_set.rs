//! # Thread Sets
//!
//! Workers are addressed with a compact notation of comma separated entries,
//! each a single index or an inclusive dash range: `"0-7"`, `"1,2,5-7"`.
//!
//! ```text
//! spec  := range (',' range)*
//! range := INT | INT '-' INT
//! ```
//!
//! Duplicates collapse. Reversed ranges, non-numeric entries and indices
//! outside the pool are rejected rather than silently ignored.

use std::collections::btree_set::{self, BTreeSet};
use std::fmt;

use crate::pool::error::ThreadSpecError;

/// Selects the workers a submission or dismissal applies to.
#[derive(Debug, Clone, Copy, Default)]
pub enum Threads<'a> {
    /// Every worker in the pool.
    #[default]
    All,
    /// A thread-set string such as `"0-1,3"`.
    Spec(&'a str),
    /// Explicit indices.
    Indices(&'a [usize]),
}

impl<'a> From<&'a str> for Threads<'a> {
    fn from(spec: &'a str) -> Self {
        Threads::Spec(spec)
    }
}

impl<'a> From<&'a [usize]> for Threads<'a> {
    fn from(indices: &'a [usize]) -> Self {
        Threads::Indices(indices)
    }
}

impl Threads<'_> {
    /// Resolve against a pool of `pool_size` workers.
    pub fn resolve(&self, pool_size: usize) -> Result<ThreadSet, ThreadSpecError> {
        match self {
            Threads::All => Ok(ThreadSet::all(pool_size)),
            Threads::Spec(spec) => ThreadSet::parse(spec, pool_size),
            Threads::Indices(indices) => ThreadSet::from_indices(indices, pool_size),
        }
    }
}

/// An ordered, duplicate-free set of worker indices.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ThreadSet {
    indices: BTreeSet<usize>,
}

impl ThreadSet {
    /// Parse a thread-set string for a pool of `pool_size` workers.
    pub fn parse(spec: &str, pool_size: usize) -> Result<Self, ThreadSpecError> {
        if spec.trim().is_empty() {
            return Err(ThreadSpecError::Empty);
        }

        let mut indices = BTreeSet::new();
        for token in spec.split(',') {
            let token = token.trim();
            if token.is_empty() {
                return Err(ThreadSpecError::EmptyToken(spec.to_string()));
            }

            let (low, high) = match token.split_once('-') {
                Some((low, high)) => (parse_index(low, token)?, parse_index(high, token)?),
                None => {
                    let index = parse_index(token, token)?;
                    (index, index)
                }
            };

            if low > high {
                return Err(ThreadSpecError::Reversed { low, high });
            }
            if high >= pool_size {
                return Err(ThreadSpecError::OutOfRange { index: high, size: pool_size });
            }
            indices.extend(low..=high);
        }

        Ok(Self { indices })
    }

    /// Validate explicit indices against the pool size.
    pub fn from_indices(indices: &[usize], pool_size: usize) -> Result<Self, ThreadSpecError> {
        if indices.is_empty() {
            return Err(ThreadSpecError::Empty);
        }
        if let Some(&index) = indices.iter().find(|&&index| index >= pool_size) {
            return Err(ThreadSpecError::OutOfRange { index, size: pool_size });
        }
        Ok(Self {
            indices: indices.iter().copied().collect(),
        })
    }

    pub fn all(pool_size: usize) -> Self {
        Self {
            indices: (0..pool_size).collect(),
        }
    }

    /// The canonical string naming every worker: `"0"` or `"0-<n-1>"`.
    pub fn canonical_all(pool_size: usize) -> String {
        if pool_size <= 1 {
            "0".to_string()
        } else {
            format!("0-{}", pool_size - 1)
        }
    }

    pub fn len(&self) -> usize {
        self.indices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    pub fn contains(&self, index: usize) -> bool {
        self.indices.contains(&index)
    }

    pub fn iter(&self) -> btree_set::Iter<'_, usize> {
        self.indices.iter()
    }
}

impl<'a> IntoIterator for &'a ThreadSet {
    type Item = &'a usize;
    type IntoIter = btree_set::Iter<'a, usize>;

    fn into_iter(self) -> Self::IntoIter {
        self.indices.iter()
    }
}

impl IntoIterator for ThreadSet {
    type Item = usize;
    type IntoIter = btree_set::IntoIter<usize>;

    fn into_iter(self) -> Self::IntoIter {
        self.indices.into_iter()
    }
}

/// Renders compressed ranges, e.g. `{0,1,2,5}` as `"0-2,5"`.
impl fmt::Display for ThreadSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut iter = self.indices.iter().copied().peekable();
        let mut first = true;
        while let Some(low) = iter.next() {
            let mut high = low;
            while iter.peek() == Some(&(high + 1)) {
                high += 1;
                iter.next();
            }
            if !first {
                f.write_str(",")?;
            }
            first = false;
            if low == high {
                write!(f, "{}", low)?;
            } else {
                write!(f, "{}-{}", low, high)?;
            }
        }
        Ok(())
    }
}

fn parse_index(text: &str, token: &str) -> Result<usize, ThreadSpecError> {
    let text = text.trim();
    // usize::from_str accepts a leading '+'
    if text.is_empty() || !text.bytes().all(|b| b.is_ascii_digit()) {
        return Err(ThreadSpecError::Malformed(token.to_string()));
    }
    text.parse()
        .map_err(|_| ThreadSpecError::Malformed(token.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(indices: &[usize]) -> ThreadSet {
        ThreadSet { indices: indices.iter().copied().collect() }
    }

    #[test]
    fn test_display_compresses_ranges() {
        assert_eq!(set(&[0, 1, 2, 5]).to_string(), "0-2,5");
        assert_eq!(set(&[3]).to_string(), "3");
        assert_eq!(set(&[1, 3, 4, 6, 7, 8]).to_string(), "1,3-4,6-8");
        assert_eq!(ThreadSet::default().to_string(), "");
    }

    #[test]
    fn test_display_parses_back() {
        let original = set(&[0, 2, 3, 4, 9]);
        assert_eq!(ThreadSet::parse(&original.to_string(), 10).unwrap(), original);
    }

    #[test]
    fn test_negative_index_is_malformed() {
        // "-1" splits into an empty low bound
        assert_eq!(
            ThreadSet::parse("-1", 4),
            Err(ThreadSpecError::Malformed("-1".to_string()))
        );
        assert_eq!(
            ThreadSet::parse("1-2-3", 4),
            Err(ThreadSpecError::Malformed("1-2-3".to_string()))
        );
    }
}
