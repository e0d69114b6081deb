//! Best-effort hierarchy level-depth table (`spec.md` §4.3 "Hierarchy
//! collapse": "Depth ordering is inferred from the order of appearance
//! combined with a best-effort level table; when unknown, the
//! last-listed wins").
//!
//! A process-wide immutable table built once, in the shape the design
//! notes call out as the one acceptable form of global state
//! (`spec.md` §9 "Global mutable state": "grammar tables are the only
//! acceptable process-wide immutable state").

use std::collections::HashMap;

use once_cell::sync::Lazy;

static LEVEL_DEPTH: Lazy<HashMap<&'static str, u32>> = Lazy::new(|| {
    let mut m = HashMap::new();
    // Geography
    for (i, name) in ["Country", "State", "State-Province", "City", "PostalCode", "Postal Code"]
        .iter()
        .enumerate()
    {
        m.insert(*name, i as u32);
    }
    // Calendar / time
    for (i, name) in [
        "Year", "Calendar Year", "Semester", "Quarter", "Calendar Quarter", "Month", "Calendar Month", "Week",
        "Date", "Day",
    ]
    .iter()
    .enumerate()
    {
        m.entry(*name).or_insert(i as u32);
    }
    // Product
    for (i, name) in ["Category", "Subcategory", "Product"].iter().enumerate() {
        m.entry(*name).or_insert(i as u32);
    }
    // Org
    for (i, name) in ["Region", "District", "Territory", "Employee"].iter().enumerate() {
        m.entry(*name).or_insert(i as u32);
    }
    m
});

/// Returns a known relative depth for `level_name`, or `None` when the
/// name is not in the table (caller falls back to appearance order).
pub fn known_depth(level_name: &str) -> Option<u32> {
    LEVEL_DEPTH.get(level_name).copied()
}
