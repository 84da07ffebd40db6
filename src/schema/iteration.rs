// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Iteration vectors and query selectors.
//!
//! An iteration vector identifies one instance of a processor's repeated
//! invocation (`[2,0]`) and, extended by element positions, one element of a
//! nested list value. The text form is the bracketed, comma separated list
//! used in the persisted schema: `[]`, `[0]`, `[2,0]`.

use std::fmt::{Display, Formatter};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::config::consts::ALL_ITERATIONS;
use crate::errors::SchemaError;

/// Ordered tuple of iteration indices.
///
/// # Examples
/// ```
/// use dagwood_lineage::schema::IterationVector;
///
/// let parent: IterationVector = "[2]".parse().unwrap();
/// let child = parent.child(0);
///
/// assert_eq!(child.to_string(), "[2,0]");
/// assert!(parent.is_parent_of(&child));
/// assert_eq!(child.parent(), Some(parent));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct IterationVector(pub Vec<u32>);

impl IterationVector {
    /// The empty vector `[]`: the whole value of a port, or an un-iterated invocation
    pub fn root() -> Self {
        Self(Vec::new())
    }

    pub fn new(components: Vec<u32>) -> Self {
        Self(components)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn components(&self) -> &[u32] {
        &self.0
    }

    /// The vector extended by one more component
    pub fn child(&self, position: u32) -> Self {
        let mut components = self.0.clone();
        components.push(position);
        Self(components)
    }

    /// The vector with its last component removed, `None` for the root
    pub fn parent(&self) -> Option<Self> {
        if self.0.is_empty() {
            return None;
        }
        Some(Self(self.0[..self.0.len() - 1].to_vec()))
    }

    pub fn last(&self) -> Option<u32> {
        self.0.last().copied()
    }

    /// Component-wise prefix test
    pub fn starts_with(&self, prefix: &IterationVector) -> bool {
        self.0.starts_with(&prefix.0)
    }

    /// True iff `other` has exactly one more component and `self` is its prefix.
    ///
    /// The comparison is per component, so `[1]` is not the parent of `[10,2]`.
    pub fn is_parent_of(&self, other: &IterationVector) -> bool {
        other.len() == self.len() + 1 && other.starts_with(self)
    }

    /// Split into the first `n` components and the remainder
    pub fn split_at(&self, n: usize) -> (Self, Self) {
        let n = n.min(self.0.len());
        let (head, tail) = self.0.split_at(n);
        (Self(head.to_vec()), Self(tail.to_vec()))
    }
}

impl From<Vec<u32>> for IterationVector {
    fn from(components: Vec<u32>) -> Self {
        Self(components)
    }
}

impl Display for IterationVector {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "[")?;
        for (i, component) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, ",")?;
            }
            write!(f, "{}", component)?;
        }
        write!(f, "]")
    }
}

impl FromStr for IterationVector {
    type Err = SchemaError;

    /// Accepts `""`, `"[]"`, `"[0,1]"` and the unbracketed `"0,1"`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let inner = match (trimmed.strip_prefix('['), trimmed.strip_suffix(']')) {
            (Some(_), Some(_)) => &trimmed[1..trimmed.len() - 1],
            (None, None) => trimmed,
            _ => {
                return Err(SchemaError::InvalidIteration {
                    input: s.to_string(),
                    reason: "unbalanced brackets".to_string(),
                })
            }
        };

        if inner.trim().is_empty() {
            return Ok(Self::root());
        }

        inner
            .split(',')
            .map(|part| {
                part.trim()
                    .parse::<u32>()
                    .map_err(|e| SchemaError::InvalidIteration {
                        input: s.to_string(),
                        reason: e.to_string(),
                    })
            })
            .collect::<Result<Vec<_>, _>>()
            .map(Self)
    }
}

/// Which iteration(s) of a port a lineage query is about.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IterationSelector {
    /// Every concrete iteration vector bound to the port, each resolved on its own
    All,
    /// One iteration path; the empty path means "no pinpoint"
    Path(IterationVector),
}

impl Default for IterationSelector {
    fn default() -> Self {
        Self::Path(IterationVector::root())
    }
}

impl FromStr for IterationSelector {
    type Err = SchemaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.trim().eq_ignore_ascii_case(ALL_ITERATIONS) {
            Ok(Self::All)
        } else {
            s.parse().map(Self::Path)
        }
    }
}

impl Display for IterationSelector {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            IterationSelector::All => write!(f, "{}", ALL_ITERATIONS),
            IterationSelector::Path(path) => write!(f, "{}", path),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_and_parse() {
        let vector = IterationVector::new(vec![2, 0, 11]);
        assert_eq!(vector.to_string(), "[2,0,11]");
        assert_eq!("[2,0,11]".parse::<IterationVector>().unwrap(), vector);
        assert_eq!(" 2, 0 ,11 ".parse::<IterationVector>().unwrap(), vector);
        assert_eq!("".parse::<IterationVector>().unwrap(), IterationVector::root());
        assert_eq!("[]".parse::<IterationVector>().unwrap(), IterationVector::root());
        assert_eq!(IterationVector::root().to_string(), "[]");
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!("[1,x]".parse::<IterationVector>().is_err());
        assert!("[1,2".parse::<IterationVector>().is_err());
        assert!("-1".parse::<IterationVector>().is_err());
    }

    #[test]
    fn test_parent_relation_is_component_wise() {
        let one: IterationVector = "[1]".parse().unwrap();
        let ten_two: IterationVector = "[10,2]".parse().unwrap();
        let one_two: IterationVector = "[1,2]".parse().unwrap();

        assert!(!one.is_parent_of(&ten_two));
        assert!(one.is_parent_of(&one_two));
        assert!(!one.is_parent_of(&one_two.child(0)));
        assert!(IterationVector::root().is_parent_of(&one));
    }

    #[test]
    fn test_split_at() {
        let vector = IterationVector::new(vec![3, 1, 4]);
        let (head, tail) = vector.split_at(1);
        assert_eq!(head, IterationVector::new(vec![3]));
        assert_eq!(tail, IterationVector::new(vec![1, 4]));

        let (head, tail) = vector.split_at(7);
        assert_eq!(head, vector);
        assert!(tail.is_empty());
    }

    #[test]
    fn test_selector_parse() {
        assert_eq!("ALL".parse::<IterationSelector>().unwrap(), IterationSelector::All);
        assert_eq!("all".parse::<IterationSelector>().unwrap(), IterationSelector::All);
        assert_eq!(
            "[0,1]".parse::<IterationSelector>().unwrap(),
            IterationSelector::Path(IterationVector::new(vec![0, 1]))
        );
        assert_eq!(
            "".parse::<IterationSelector>().unwrap(),
            IterationSelector::Path(IterationVector::root())
        );
    }
}
