// Copyright (C) 2026 Parity Technologies (UK) Ltd.
// SPDX-License-Identifier: GPL-3.0-or-later

//! Registry of named SQL templates for the monthly statistics queries.
//!
//! Initialized once at startup, read-only thereafter. Templates carry
//! `{blocks}`, `{a2b}`, `{year}` and `{month}` placeholders rendered per
//! `(relay, chain, year, month)` before execution.

use super::ddl;
use std::collections::BTreeMap;
use std::sync::LazyLock;

static NAMED_QUERIES: LazyLock<BTreeMap<&'static str, &'static str>> = LazyLock::new(|| {
    BTreeMap::from([
        (
            "stats_per_month",
            "SELECT count(*) AS blocks, \
             min(block_id) AS min_block, \
             max(block_id) AS max_block, \
             count(*) FILTER (WHERE finalized) AS finalized_blocks \
             FROM {blocks} \
             WHERE date_part('year', created_at) = {year} \
             AND date_part('month', created_at) = {month}",
        ),
        (
            "addresses_per_month",
            "SELECT count(DISTINCT a.address) AS addresses, count(*) AS edges \
             FROM {a2b} a \
             JOIN {blocks} b ON a.block_id = b.block_id \
             WHERE date_part('year', b.created_at) = {year} \
             AND date_part('month', b.created_at) = {month}",
        ),
    ])
});

/// Render a registered template for one `(relay, chain, year, month)`.
/// `None` when the query name is not registered.
pub fn render(name: &str, relay: &str, chain: &str, year: i32, month: u32) -> Option<String> {
    let template = NAMED_QUERIES.get(name)?;
    Some(
        template
            .replace("{blocks}", &ddl::blocks_table(relay, chain))
            .replace("{a2b}", &ddl::address_table(relay, chain))
            .replace("{year}", &year.to_string())
            .replace("{month}", &month.to_string()),
    )
}

/// Names of all registered queries.
pub fn names() -> impl Iterator<Item = &'static str> {
    NAMED_QUERIES.keys().copied()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_substitutes_tables_and_date() {
        let sql = render("stats_per_month", "polkadot", "polkadot", 2023, 7).unwrap();
        assert!(sql.contains("FROM chain.blocks_polkadot_polkadot"));
        assert!(sql.contains("date_part('year', created_at) = 2023"));
        assert!(sql.contains("date_part('month', created_at) = 7"));
        assert!(!sql.contains('{'));
    }

    #[test]
    fn test_render_unknown_query() {
        assert!(render("nope", "polkadot", "polkadot", 2023, 7).is_none());
    }

    #[test]
    fn test_registry_names() {
        let names: Vec<_> = names().collect();
        assert!(names.contains(&"stats_per_month"));
        assert!(names.contains(&"addresses_per_month"));
    }
}
