//! Explorer listings
//!
//! A listing is either the root view (every node no directory contains) or
//! the children of one directory. The sorted, annotated set is what gets
//! cached as a [`ListingSnapshot`]; pagination runs on every request.

use std::borrow::Borrow;

use serde::{Deserialize, Serialize};

use crate::node::Node;
use crate::tree::{self, Crumb, SortKey};

pub const DEFAULT_PAGE_SIZE: usize = 20;
pub const MAX_PAGE_SIZE: usize = 100;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListingRequest {
    /// Directory id to list; empty for the root view
    #[serde(default)]
    pub path: String,
    #[serde(default)]
    pub sort: SortKey,
    #[serde(default)]
    pub page: Option<usize>,
    #[serde(default)]
    pub limit: Option<usize>,
}

impl ListingRequest {
    pub fn root() -> Self {
        Self::default()
    }

    pub fn directory(id: &str) -> Self {
        Self {
            path: id.to_string(),
            ..Default::default()
        }
    }

    /// Page number (at least 1) and page size (1..=100, default 20)
    pub fn page_params(&self) -> (usize, usize) {
        let page = self.page.unwrap_or(1).max(1);
        let limit = self
            .limit
            .filter(|l| *l > 0)
            .unwrap_or(DEFAULT_PAGE_SIZE)
            .min(MAX_PAGE_SIZE);
        (page, limit)
    }

    /// The part of the request that determines the cached snapshot
    pub(crate) fn snapshot_key(&self) -> SnapshotKey<'_> {
        SnapshotKey {
            kind: "listing",
            path: &self.path,
            sort: self.sort,
        }
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct SnapshotKey<'a> {
    kind: &'static str,
    path: &'a str,
    sort: SortKey,
}

/// A node as shown in the explorer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListedNode {
    #[serde(flatten)]
    pub node: Node,
    pub formatted_size: String,
    pub is_broken: bool,
}

impl ListedNode {
    pub fn new<T: Borrow<Node>>(node: &Node, all: &[T], owner: &str) -> Self {
        let formatted_size = match node.size {
            Some(size) if size > 0 => format_file_size(size),
            _ => "-".to_string(),
        };
        Self {
            node: node.clone(),
            formatted_size,
            is_broken: node.is_symlink() && tree::is_broken(node, all, owner),
        }
    }
}

/// The sorted, annotated, unpaginated content of one listing
#[derive(Debug, Clone, PartialEq)]
pub struct ListingSnapshot {
    pub nodes: Vec<ListedNode>,
    pub current_dir: Option<Node>,
}

impl ListingSnapshot {
    /// Build the view of `current_dir` (or the root when `None`) over all
    /// of `owner`'s nodes
    pub fn build(all: &[Node], current_dir: Option<Node>, sort: SortKey, owner: &str) -> Self {
        let mut visible = match &current_dir {
            Some(dir) => tree::children_of(dir, all),
            None => tree::root_nodes(all),
        };
        tree::sort_nodes(&mut visible, sort);
        let nodes = visible
            .into_iter()
            .map(|node| ListedNode::new(node, all, owner))
            .collect();
        Self { nodes, current_dir }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    pub current_page: usize,
    pub total_pages: usize,
    pub total_items: usize,
    pub items_per_page: usize,
    pub has_next: bool,
    pub has_prev: bool,
    pub next_page: Option<usize>,
    pub prev_page: Option<usize>,
    /// 1-based index of the first item on this page, 0 when empty
    pub start_item: usize,
    pub end_item: usize,
}

impl Pagination {
    /// Metadata for `page` of `total_items`. Any page number is accepted;
    /// one past the end is simply empty.
    pub fn new(total_items: usize, page: usize, limit: usize) -> Self {
        let (page, limit) = (page.max(1), limit.max(1));
        let total_pages = total_items.div_ceil(limit);
        let has_next = page < total_pages;
        let has_prev = page > 1;
        Self {
            current_page: page,
            total_pages,
            total_items,
            items_per_page: limit,
            has_next,
            has_prev,
            next_page: has_next.then(|| page + 1),
            prev_page: has_prev.then(|| page - 1),
            start_item: if total_items > 0 {
                (page - 1).saturating_mul(limit).saturating_add(1)
            } else {
                0
            },
            end_item: page.saturating_mul(limit).min(total_items),
        }
    }
}

/// Slice out one page of `items`
pub fn paginate<T: Clone>(items: &[T], page: usize, limit: usize) -> (Vec<T>, Pagination) {
    let start = page.saturating_sub(1).saturating_mul(limit).min(items.len());
    let end = start.saturating_add(limit).min(items.len());
    (items[start..end].to_vec(), Pagination::new(items.len(), page, limit))
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Listing {
    pub nodes: Vec<ListedNode>,
    pub current_dir: Option<Node>,
    pub breadcrumb: Vec<Crumb>,
    pub pagination: Pagination,
    pub sort: SortKey,
    pub path: String,
}

/// Human-readable size: `0 B`, `512 B`, `1.5 KB`, `2 MB`
pub fn format_file_size(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["B", "KB", "MB", "GB"];
    if bytes == 0 {
        return "0 B".to_string();
    }
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    let rounded = format!("{value:.2}");
    let trimmed = rounded.trim_end_matches('0').trim_end_matches('.');
    format!("{trimmed} {}", UNITS[unit])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_file_size() {
        assert_eq!(format_file_size(0), "0 B");
        assert_eq!(format_file_size(512), "512 B");
        assert_eq!(format_file_size(1536), "1.5 KB");
        assert_eq!(format_file_size(10 * 1024), "10 KB");
        assert_eq!(format_file_size(3 * 1024 * 1024), "3 MB");
        assert_eq!(format_file_size(5 * 1024 * 1024 * 1024 * 1024), "5120 GB");
    }

    #[test]
    fn test_page_params_are_clamped() {
        let mut req = ListingRequest::root();
        assert_eq!(req.page_params(), (1, 20));
        req.page = Some(0);
        req.limit = Some(1000);
        assert_eq!(req.page_params(), (1, 100));
        req.limit = Some(0);
        assert_eq!(req.page_params(), (1, 20));
    }

    #[test]
    fn test_paginate() {
        let items: Vec<u32> = (1..=45).collect();

        let (page, meta) = paginate(&items, 3, 20);
        assert_eq!(page, (41..=45).collect::<Vec<_>>());
        assert_eq!(meta.total_pages, 3);
        assert_eq!((meta.start_item, meta.end_item), (41, 45));
        assert!(!meta.has_next && meta.has_prev);
        assert_eq!(meta.prev_page, Some(2));

        let (page, meta) = paginate(&items, 9, 20);
        assert!(page.is_empty());
        assert!(!meta.has_next);

        let (page, meta) = paginate::<u32>(&[], 1, 20);
        assert!(page.is_empty());
        assert_eq!((meta.total_pages, meta.start_item, meta.end_item), (0, 0, 0));
    }

    #[test]
    fn test_huge_page_number_is_an_empty_page() {
        let (page, meta) = paginate(&[1, 2, 3], usize::MAX, 20);
        assert!(page.is_empty());
        assert_eq!(meta.current_page, usize::MAX);
        assert_eq!(meta.next_page, None);
        assert_eq!(meta.prev_page, Some(usize::MAX - 1));
        assert_eq!(meta.start_item, usize::MAX);
        assert_eq!(meta.end_item, 3);

        let mut req = ListingRequest::root();
        req.page = Some(usize::MAX);
        let (page, limit) = req.page_params();
        assert_eq!(paginate(&[1, 2, 3], page, limit).0, Vec::<i32>::new());
    }
}
