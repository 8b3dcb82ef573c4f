//! Helpers over the flat parent-pointer table.
//!
//! Entries form a tree only through `parent_id`; nothing here builds a linked
//! structure. Every walk tracks visited ids so a corrupted chain terminates.

use std::collections::HashSet;

use uuid::Uuid;

use super::entry::AncestorLink;

/// Why a parent cannot receive an entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParentProblem {
    Missing,
    NotFolder,
    Trashed,
    Cycle,
}

impl ParentProblem {
    pub fn message(self) -> &'static str {
        match self {
            ParentProblem::Missing => "parent folder does not exist",
            ParentProblem::NotFolder => "parent is not a folder",
            ParentProblem::Trashed => "parent folder is in the trash",
            ParentProblem::Cycle => "a folder cannot be moved into itself or its descendants",
        }
    }
}

/// Checks that `chain` (root first, ending at the prospective parent) can
/// receive `moving` as a child. `moving` is None for newly created entries.
pub fn check_parent_chain(
    chain: &[AncestorLink],
    parent_id: Uuid,
    moving: Option<Uuid>,
) -> Result<(), ParentProblem> {
    let Some(parent) = chain.last().filter(|p| p.id == parent_id) else {
        return Err(ParentProblem::Missing);
    };
    if !parent.is_folder {
        return Err(ParentProblem::NotFolder);
    }
    if parent.is_trash {
        return Err(ParentProblem::Trashed);
    }
    if let Some(id) = moving {
        if chain.iter().any(|link| link.id == id) {
            return Err(ParentProblem::Cycle);
        }
    }
    Ok(())
}

/// Display path for an entry given its ancestor chain (root first, entry last).
pub fn display_path(chain: &[AncestorLink]) -> String {
    let mut out = String::new();
    for link in chain {
        out.push('/');
        out.push_str(&link.name);
    }
    if out.is_empty() {
        out.push('/');
    }
    out
}

/// Path of a child under an already computed parent path.
pub fn child_path(parent_path: Option<&str>, name: &str) -> String {
    match parent_path {
        Some(p) if p != "/" => format!("{}/{}", p.trim_end_matches('/'), name),
        _ => format!("/{}", name),
    }
}

/// Walks up from `start` through `parent_of`, returning the chain root first.
/// Stops on a missing link or on a revisited id.
pub fn ancestor_chain<F>(start: Uuid, mut lookup: F) -> Vec<AncestorLink>
where
    F: FnMut(Uuid) -> Option<AncestorLink>,
{
    let mut chain = Vec::new();
    let mut seen = HashSet::new();
    let mut cursor = Some(start);
    while let Some(id) = cursor {
        if !seen.insert(id) {
            break;
        }
        let Some(link) = lookup(id) else { break };
        cursor = link.parent_id;
        chain.push(link);
    }
    chain.reverse();
    chain
}
