//! Tree derivation over a flat node collection
//!
//! The remote store returns a user's nodes as a flat list. The hierarchy is
//! implied only by directory `contents`; nothing on a child names its
//! parent. Everything here is a pure function of its inputs.

use std::borrow::Borrow;
use std::cmp::Ordering;
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::node::Node;

/// Ids listed in the `contents` of any directory
fn contained_ids<T: Borrow<Node>>(all: &[T]) -> HashSet<&str> {
    all.iter()
        .map(Borrow::borrow)
        .filter(|node| node.is_directory())
        .flat_map(|dir| dir.contents.iter().map(String::as_str))
        .collect()
}

/// Every node not referenced by any directory, in input order.
///
/// A node contained by a non-root directory is still excluded.
pub fn root_nodes<T: Borrow<Node>>(all: &[T]) -> Vec<&Node> {
    let contained = contained_ids(all);
    all.iter()
        .map(Borrow::borrow)
        .filter(|node| !contained.contains(node.id.as_str()))
        .collect()
}

/// The children of `directory`, in `contents` order.
///
/// Ids with no matching node are skipped. An id listed twice is returned once.
pub fn children_of<'a, T: Borrow<Node>>(directory: &Node, all: &'a [T]) -> Vec<&'a Node> {
    let mut seen = HashSet::new();
    directory
        .contents
        .iter()
        .filter(|id| seen.insert(id.as_str()))
        .filter_map(|id| find(all, id))
        .collect()
}

/// Look up a node by id
pub fn find<'a, T: Borrow<Node>>(all: &'a [T], id: &str) -> Option<&'a Node> {
    all.iter().map(Borrow::borrow).find(|node| node.id == id)
}

/// Directories whose `contents` list `id`
pub fn containers_of<'a, T: Borrow<Node>>(id: &str, all: &'a [T]) -> Vec<&'a Node> {
    all.iter()
        .map(Borrow::borrow)
        .filter(|node| node.is_directory() && node.contents.iter().any(|c| c == id))
        .collect()
}

/// Ids reachable from `root` through directory containment, excluding
/// `root` itself. Terminates on cyclic data.
pub fn descendants<T: Borrow<Node>>(root: &Node, all: &[T]) -> HashSet<String> {
    let mut visited = HashSet::new();
    let mut stack: Vec<&Node> = vec![root];
    while let Some(dir) = stack.pop() {
        if !dir.is_directory() {
            continue;
        }
        for id in &dir.contents {
            if id == &root.id || !visited.insert(id.clone()) {
                continue;
            }
            if let Some(child) = find(all, id) {
                stack.push(child);
            }
        }
    }
    visited
}

/// One navigable segment of a `/`-delimited path
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Crumb {
    pub name: String,
    /// The path up to and including this segment
    pub path: String,
}

/// Split a path into successive prefixes, one per non-empty component.
///
/// `"a//b/"` yields `a` → `"a"` and `b` → `"a/b"`.
pub fn breadcrumb(path: &str) -> Vec<Crumb> {
    let mut prefix = String::new();
    path.split('/')
        .filter(|part| !part.is_empty())
        .map(|part| {
            if !prefix.is_empty() {
                prefix.push('/');
            }
            prefix.push_str(part);
            Crumb {
                name: part.to_string(),
                path: prefix.clone(),
            }
        })
        .collect()
}

/// Whether a symlink fails to resolve in one hop.
///
/// Broken when it points nowhere, at itself, at an id missing from `all`,
/// or at a node owned by someone other than `owner`. A target that is
/// itself a symlink is not followed.
pub fn is_broken<T: Borrow<Node>>(symlink: &Node, all: &[T], owner: &str) -> bool {
    resolve_symlink(symlink, all, owner).is_none()
}

/// The single-hop target of a well-formed symlink
pub fn resolve_symlink<'a, T: Borrow<Node>>(
    symlink: &Node,
    all: &'a [T],
    owner: &str,
) -> Option<&'a Node> {
    let target = symlink.symlink_target()?;
    if target == symlink.id {
        return None;
    }
    find(all, target).filter(|node| node.owner == owner)
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SortKey {
    #[default]
    Name,
    CreatedAt,
    ModifiedAt,
    Size,
}

impl fmt::Display for SortKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SortKey::Name => write!(f, "name"),
            SortKey::CreatedAt => write!(f, "createdAt"),
            SortKey::ModifiedAt => write!(f, "modifiedAt"),
            SortKey::Size => write!(f, "size"),
        }
    }
}

impl FromStr for SortKey {
    type Err = std::convert::Infallible;

    /// Unknown keys fall back to `Name`
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "createdAt" => SortKey::CreatedAt,
            "modifiedAt" => SortKey::ModifiedAt,
            "size" => SortKey::Size,
            _ => SortKey::Name,
        })
    }
}

fn compare(a: &Node, b: &Node, key: SortKey) -> Ordering {
    match key {
        SortKey::Name => a
            .name
            .to_lowercase()
            .cmp(&b.name.to_lowercase())
            .then_with(|| a.name.cmp(&b.name)),
        SortKey::CreatedAt => b.created_at.cmp(&a.created_at),
        SortKey::ModifiedAt => b.last_modified().cmp(&a.last_modified()),
        SortKey::Size => b.size.unwrap_or(0).cmp(&a.size.unwrap_or(0)),
    }
}

/// Stable sort: names ascending, timestamps and sizes newest/largest first
pub fn sort_nodes<T: Borrow<Node>>(nodes: &mut [T], key: SortKey) {
    nodes.sort_by(|a, b| compare(a.borrow(), b.borrow(), key));
}
