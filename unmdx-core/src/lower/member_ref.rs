//! Maps a parsed [`MemberPath`] to IR hierarchy/level/member identity and
//! to a [`MemberSelection`] (`spec.md` §4.3 "Member selection
//! classification").
//!
//! MDX nests `[Dimension].[Hierarchy].[Level].[Member]` with a variable
//! number of segments depending on source tooling; this crate adopts the
//! simplification that the first segment names both the table and the
//! hierarchy and the second (when present) names the level — the shape
//! every seed scenario in `spec.md` §8 uses (`[Product].[Category].
//! [Bikes]`, `[Geography].[Country].Members`). Recorded as an Open
//! Question resolution in `DESIGN.md`.

use crate::ir::{DescendantsFlag, HierarchyReference, LevelReference, MemberSelection};
use crate::parser::ast::{MemberPath, MemberSuffix};

pub struct MemberIdentity {
    pub hierarchy: HierarchyReference,
    pub level: LevelReference,
}

pub fn identity(path: &MemberPath) -> MemberIdentity {
    let table = path.segments.first().cloned().unwrap_or_default();
    let level_name = if path.segments.len() >= 2 {
        path.segments[1].clone()
    } else {
        table.clone()
    };
    MemberIdentity {
        hierarchy: HierarchyReference::new(table.clone(), table),
        level: LevelReference::new(level_name),
    }
}

/// The concrete member name this path denotes, preferring the `.&[key]`
/// form when present (`spec.md` §4.3: "the leaf member's key ... or
/// caption").
pub fn member_value(path: &MemberPath) -> String {
    path.key.clone().unwrap_or_else(|| path.leaf().to_string())
}

/// Classifies a member path's trailing suffix into a [`MemberSelection`]
/// (`spec.md` §4.3). `explicit_names`, when non-empty, means the caller
/// already collected a flat list of specific sibling names (e.g. from a
/// brace-enumerated set) and this path is just one of them.
pub fn classify(path: &MemberPath) -> MemberSelection {
    match path.suffix {
        Some(MemberSuffix::Members) => MemberSelection::All,
        Some(MemberSuffix::Children) => MemberSelection::Children {
            parent_name: member_value(path),
        },
        Some(MemberSuffix::Parent)
        | Some(MemberSuffix::FirstChild)
        | Some(MemberSuffix::LastChild)
        | Some(MemberSuffix::Lead(_))
        | Some(MemberSuffix::Lag(_)) => MemberSelection::Specific {
            names: vec![member_value(path)],
        },
        None => MemberSelection::Specific {
            names: vec![member_value(path)],
        },
    }
}

pub fn descendants_flag_from_keyword(word: &str) -> DescendantsFlag {
    match word {
        "AFTER" | "SELF_AND_AFTER" => DescendantsFlag::SelfAndAfter,
        "BEFORE" | "SELF_AND_BEFORE" | "SELF_BEFORE_AFTER" => DescendantsFlag::SelfAndBefore,
        "LEAVES" => DescendantsFlag::Leaves,
        _ => DescendantsFlag::SelfAndAfter,
    }
}
