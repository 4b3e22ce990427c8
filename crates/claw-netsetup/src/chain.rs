//! Per-container chain naming.
//!
//! `down` must recompute exactly the same chain name `up` created, so
//! truncation is a plain, deterministic prefix cut of the handle rather
//! than a hash — two handles that agree on their first 20/21 characters
//! would collide, which is an accepted tradeoff for predictability.

/// Maximum total chain-name length accepted by the host's packet-filter
/// tool.
const MAX_CHAIN_NAME_LEN: usize = 28;

/// Builds a chain name `<prefix><handle, truncated to fit 28 chars total>`.
#[must_use]
pub fn chain_name(prefix: &str, handle: &str) -> String {
    let budget = MAX_CHAIN_NAME_LEN.saturating_sub(prefix.len());
    let truncated: String = handle.chars().take(budget).collect();
    format!("{prefix}{truncated}")
}

/// The netout chain name for `handle`.
#[must_use]
pub fn netout_chain(handle: &str) -> String {
    chain_name("netout--", handle)
}

/// The netin chain name for `handle`.
#[must_use]
pub fn netin_chain(handle: &str) -> String {
    chain_name("netin--", handle)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_handles_pass_through() {
        assert_eq!(netout_chain("some-container-handle"), "netout--some-container-handle");
    }

    #[test]
    fn long_handles_truncate_to_28_total() {
        let handle = "a".repeat(64);
        let name = netout_chain(&handle);
        assert_eq!(name.len(), 28);
        assert!(name.starts_with("netout--"));
    }

    #[test]
    fn truncation_is_deterministic() {
        let handle = "b".repeat(40);
        assert_eq!(netout_chain(&handle), netout_chain(&handle));
    }

    #[test]
    fn netin_budget_is_one_char_more_than_netout() {
        let handle = "c".repeat(64);
        let netout = netout_chain(&handle);
        let netin = netin_chain(&handle);
        assert_eq!(netout.len(), 28);
        assert_eq!(netin.len(), 28);
    }
}
