//! Table names and their redb definitions.
//!
//! Both tables use `&str` keys (`{operation}-{request_id}`) and `&[u8]`
//! values holding the JSON row.

use std::fmt;

use redb::TableDefinition;

/// Placement requests written by the API, read by the engine.
pub const REQUESTS: TableDefinition<&str, &[u8]> = TableDefinition::new("requests");

/// Placement results written by the engine, polled by the API.
pub const RESULTS: TableDefinition<&str, &[u8]> = TableDefinition::new("results");

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Table {
    Requests,
    Results,
}

impl Table {
    pub fn as_str(&self) -> &'static str {
        match self {
            Table::Requests => "requests",
            Table::Results => "results",
        }
    }

    pub(crate) fn definition(&self) -> TableDefinition<'static, &'static str, &'static [u8]> {
        match self {
            Table::Requests => REQUESTS,
            Table::Results => RESULTS,
        }
    }
}

impl fmt::Display for Table {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
