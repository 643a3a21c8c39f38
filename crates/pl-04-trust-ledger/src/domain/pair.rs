//! Unordered pair key: `(a, b, ctx)` and `(b, a, ctx)` address the same tensor.

use shared_types::ComponentRef;

/// Index key of a tensor.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct PairKey {
    low: String,
    high: String,
    context: String,
}

impl PairKey {
    /// Build the key for a pair in a context.
    pub fn new(a: &ComponentRef, b: &ComponentRef, context: &str) -> Self {
        let (low, high) = if a.id() <= b.id() {
            (a.id(), b.id())
        } else {
            (b.id(), a.id())
        };
        Self {
            low: low.to_string(),
            high: high.to_string(),
            context: context.to_string(),
        }
    }
}
