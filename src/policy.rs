//! Program-name based forwarding policy.
//!
//! Decides, per discovered listener, whether its port is eligible for
//! forwarding to the host. Filtering is by program name only: two distinct
//! processes sharing a program name are indistinguishable to the policy.
//! That coarseness is accepted; anything finer (pid, binary path) would not
//! survive process restarts inside WSL anyway.

use std::collections::HashSet;

/// Allow/disallow program-name filter.
///
/// Semantics:
/// - a name in `allow` is always eligible,
/// - otherwise a name in `disallow` is never eligible,
/// - otherwise eligibility defaults to whether `allow` is empty (an empty
///   allow list means "everything not disallowed").
///
/// The two sets need not be disjoint; `allow` takes precedence.
#[derive(Debug, Clone, Default)]
pub struct ForwardPolicy {
    allow: HashSet<String>,
    disallow: HashSet<String>,
}

impl ForwardPolicy {
    /// Build a policy from allow and disallow name lists.
    pub fn new<I, J>(allow: I, disallow: J) -> Self
    where
        I: IntoIterator<Item = String>,
        J: IntoIterator<Item = String>,
    {
        Self {
            allow: allow.into_iter().collect(),
            disallow: disallow.into_iter().collect(),
        }
    }

    /// Whether a listener owned by `program` should be forwarded.
    ///
    /// Pure function, no failure modes.
    #[must_use]
    pub fn is_eligible(&self, program: &str) -> bool {
        if self.allow.contains(program) {
            return true;
        }
        if self.disallow.contains(program) {
            return false;
        }
        self.allow.is_empty()
    }
}
