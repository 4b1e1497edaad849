//! Stable ID newtypes for graph entities.
//!
//! Node identity is an opaque string so that IDs can carry the
//! `{fingerprint}_{sequence}` convention used for file-scoped nodes. Edges are
//! identified by the `(from, to, kind)` triple.

use std::cmp::Ordering;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Sentinel ID of the project container node.
pub const PROJECT_ID: &str = "project";

/// Prefix used for nodes created by code-only (ephemeral) ingestion.
pub const EPHEMERAL_PREFIX: &str = "node";

/// Stable node identifier.
///
/// Ordering is *natural*: digit runs compare by numeric value, so
/// `a1b2_2` sorts before `a1b2_10`. Root discovery relies on this to return
/// top-level statements in document order.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(String);

impl NodeId {
    pub fn new(id: impl Into<String>) -> Self {
        NodeId(id.into())
    }

    /// The project sentinel ID.
    pub fn project() -> Self {
        NodeId(PROJECT_ID.to_string())
    }

    /// ID of the `seq`-th node ingested under the given file fingerprint.
    pub fn scoped(prefix: &str, seq: u64) -> Self {
        NodeId(format!("{prefix}_{seq}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_project(&self) -> bool {
        self.0 == PROJECT_ID
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for NodeId {
    fn from(s: &str) -> Self {
        NodeId(s.to_string())
    }
}

impl From<String> for NodeId {
    fn from(s: String) -> Self {
        NodeId(s)
    }
}

impl AsRef<str> for NodeId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Ord for NodeId {
    fn cmp(&self, other: &Self) -> Ordering {
        natural_cmp(&self.0, &other.0)
    }
}

impl PartialOrd for NodeId {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Compares two strings treating runs of ASCII digits as numbers.
///
/// Ties between numerically equal runs (`"07"` vs `"7"`) fall back to a plain
/// byte comparison so the ordering stays consistent with `Eq`.
pub fn natural_cmp(a: &str, b: &str) -> Ordering {
    let (ab, bb) = (a.as_bytes(), b.as_bytes());
    let (mut i, mut j) = (0, 0);

    while i < ab.len() && j < bb.len() {
        if ab[i].is_ascii_digit() && bb[j].is_ascii_digit() {
            let si = i;
            while i < ab.len() && ab[i].is_ascii_digit() {
                i += 1;
            }
            let sj = j;
            while j < bb.len() && bb[j].is_ascii_digit() {
                j += 1;
            }
            let da = trim_zeros(&ab[si..i]);
            let db = trim_zeros(&bb[sj..j]);
            let ord = da.len().cmp(&db.len()).then_with(|| da.cmp(db));
            if ord != Ordering::Equal {
                return ord;
            }
        } else {
            let ord = ab[i].cmp(&bb[j]);
            if ord != Ordering::Equal {
                return ord;
            }
            i += 1;
            j += 1;
        }
    }

    (ab.len() - i)
        .cmp(&(bb.len() - j))
        .then_with(|| a.cmp(b))
}

fn trim_zeros(digits: &[u8]) -> &[u8] {
    let start = digits
        .iter()
        .position(|&d| d != b'0')
        .unwrap_or(digits.len());
    &digits[start..]
}
