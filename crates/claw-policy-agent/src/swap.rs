//! Atomic chain swap: publish a freshly planned chain and retire stale
//! ones from the same planner, without ever leaving the parent chain
//! without a jump target.

use std::time::{SystemTime, UNIX_EPOCH};

use claw_netrules::{FilterClient, IpTablesRule};
use regex::Regex;

use crate::error::Result;

/// Builds the monotonic-enough chain name `<prefix><unix_nanos>`.
fn new_chain_name(prefix: &str) -> String {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or_default();
    format!("{prefix}{nanos}")
}

/// Extracts the jump target from one `iptables -S` line, e.g.
/// `-A FORWARD -j vpa--local-172...` -> `Some("vpa--local-172...")`.
fn jump_target(rule_line: &str) -> Option<&str> {
    let tokens: Vec<&str> = rule_line.split_whitespace().collect();
    tokens
        .iter()
        .position(|t| *t == "-j" || *t == "--jump")
        .and_then(|i| tokens.get(i + 1))
        .copied()
}

/// Creates a new chain for `prefix`, populates it with `rules`, inserts a
/// jump from `parent_chain` at position 1, then deletes the jump/clears/
/// deletes every other chain in `table` whose name matches
/// `<prefix>\d+` and isn't the chain just created.
pub fn swap_chain(
    filter: &dyn FilterClient,
    table: &str,
    parent_chain: &str,
    prefix: &str,
    rules: &[IpTablesRule],
) -> Result<()> {
    let new_chain = new_chain_name(prefix);
    filter.new_chain(table, &new_chain)?;
    for rule in rules {
        filter.append_unique(table, &new_chain, rule)?;
    }

    let jump = IpTablesRule::new(vec!["--jump".to_string(), new_chain.clone()]);
    filter.insert(table, parent_chain, 1, &jump)?;

    let pattern = Regex::new(&format!("^{}[0-9]+$", regex::escape(prefix)))?;
    let parent_rules = filter.list(table, parent_chain)?;

    for line in parent_rules {
        let Some(target) = jump_target(&line) else {
            continue;
        };
        if target == new_chain || !pattern.is_match(target) {
            continue;
        }

        let target = target.to_string();
        let stale_jump = IpTablesRule::new(vec!["--jump".to_string(), target.clone()]);
        let _ = filter.delete(table, parent_chain, &stale_jump);
        let _ = filter.clear_chain(table, &target);
        let _ = filter.delete_chain(table, &target);
    }

    Ok(())
}
