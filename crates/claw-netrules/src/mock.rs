//! An in-memory [`FilterClient`] for tests that don't require root or a
//! real netfilter stack.

use std::collections::HashMap;

use parking_lot::Mutex;

use crate::error::{FilterError, Result};
use crate::filter::FilterClient;
use crate::rules::IpTablesRule;

#[derive(Default)]
struct Table {
    chains: HashMap<String, Vec<IpTablesRule>>,
}

/// Records chains and rules in memory, keyed by `(table, chain)`.
#[derive(Default)]
pub struct MockFilterClient {
    tables: Mutex<HashMap<String, Table>>,
}

impl MockFilterClient {
    /// Creates an empty mock filter.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn no_such_chain(chain: &str) -> FilterError {
        FilterError::CommandFailed {
            stderr: format!("iptables: No chain/target/match by that name ({chain})"),
        }
    }
}

impl FilterClient for MockFilterClient {
    fn exists(&self, table: &str, chain: &str, rule: &IpTablesRule) -> Result<bool> {
        let tables = self.tables.lock();
        Ok(tables
            .get(table)
            .and_then(|t| t.chains.get(chain))
            .is_some_and(|rules| rules.contains(rule)))
    }

    fn insert(&self, table: &str, chain: &str, position: u32, rule: &IpTablesRule) -> Result<()> {
        let mut tables = self.tables.lock();
        let rules = tables
            .entry(table.to_string())
            .or_default()
            .chains
            .get_mut(chain)
            .ok_or_else(|| Self::no_such_chain(chain))?;
        let index = (position.saturating_sub(1) as usize).min(rules.len());
        rules.insert(index, rule.clone());
        Ok(())
    }

    fn append_unique(&self, table: &str, chain: &str, rule: &IpTablesRule) -> Result<()> {
        let mut tables = self.tables.lock();
        let rules = tables
            .entry(table.to_string())
            .or_default()
            .chains
            .get_mut(chain)
            .ok_or_else(|| Self::no_such_chain(chain))?;
        if !rules.contains(rule) {
            rules.push(rule.clone());
        }
        Ok(())
    }

    fn delete(&self, table: &str, chain: &str, rule: &IpTablesRule) -> Result<()> {
        let mut tables = self.tables.lock();
        let rules = tables
            .entry(table.to_string())
            .or_default()
            .chains
            .get_mut(chain)
            .ok_or_else(|| Self::no_such_chain(chain))?;
        let before = rules.len();
        rules.retain(|r| r != rule);
        if rules.len() == before {
            return Err(FilterError::CommandFailed {
                stderr: "iptables: Bad rule (does a matching rule exist in that chain?)"
                    .to_string(),
            });
        }
        Ok(())
    }

    fn list(&self, table: &str, chain: &str) -> Result<Vec<String>> {
        let tables = self.tables.lock();
        let rules = tables
            .get(table)
            .and_then(|t| t.chains.get(chain))
            .ok_or_else(|| Self::no_such_chain(chain))?;
        Ok(rules
            .iter()
            .map(|r| format!("-A {chain} {r}"))
            .collect())
    }

    fn new_chain(&self, table: &str, chain: &str) -> Result<()> {
        let mut tables = self.tables.lock();
        let entry = tables.entry(table.to_string()).or_default();
        if entry.chains.contains_key(chain) {
            return Err(FilterError::CommandFailed {
                stderr: format!("iptables: Chain already exists ({chain})"),
            });
        }
        entry.chains.insert(chain.to_string(), Vec::new());
        Ok(())
    }

    fn clear_chain(&self, table: &str, chain: &str) -> Result<()> {
        let mut tables = self.tables.lock();
        let rules = tables
            .entry(table.to_string())
            .or_default()
            .chains
            .get_mut(chain)
            .ok_or_else(|| Self::no_such_chain(chain))?;
        rules.clear();
        Ok(())
    }

    fn delete_chain(&self, table: &str, chain: &str) -> Result<()> {
        let mut tables = self.tables.lock();
        let entry = tables.entry(table.to_string()).or_default();
        if entry.chains.remove(chain).is_none() {
            return Err(Self::no_such_chain(chain));
        }
        Ok(())
    }
}
