//! Explorer search
//!
//! Filters a user's nodes by free text, type, tags and creation date. All
//! filters combine with AND; a request with none of them set searches
//! nothing.

use std::cmp::Ordering;

use chrono::{DateTime, Duration, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};

use crate::listing::ListedNode;
use crate::node::{Node, NodeType};
use crate::tree::SortKey;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TypeFilter {
    #[default]
    All,
    File,
    Directory,
    Symlink,
}

impl TypeFilter {
    fn admits(self, node_type: NodeType) -> bool {
        match self {
            TypeFilter::All => true,
            TypeFilter::File => node_type == NodeType::File,
            TypeFilter::Directory => node_type == NodeType::Directory,
            TypeFilter::Symlink => node_type == NodeType::Symlink,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchRequest {
    /// Case-insensitive substring of the name, a file's text or any tag
    #[serde(default)]
    pub q: Option<String>,
    #[serde(rename = "type", default)]
    pub node_type: Option<TypeFilter>,
    /// Comma-separated tag fragments; a node matches if any fragment is
    ///  part of any of its tags
    #[serde(default)]
    pub tags: Option<String>,
    /// Created on or after this day (UTC)
    #[serde(default)]
    pub date_from: Option<NaiveDate>,
    /// Created on or before the end of this day (UTC)
    #[serde(default)]
    pub date_to: Option<NaiveDate>,
    /// Defaults to newest modification first
    #[serde(rename = "sortBy", default)]
    pub sort: Option<SortKey>,
}

impl SearchRequest {
    pub fn text(q: &str) -> Self {
        Self {
            q: Some(q.to_string()),
            ..Default::default()
        }
    }

    /// Whether any filter is set. Blank text and tag filters do not count;
    /// a type filter does, even `all`.
    pub fn is_active(&self) -> bool {
        self.query().is_some()
            || self.node_type.is_some()
            || !self.tag_fragments().is_empty()
            || self.date_from.is_some()
            || self.date_to.is_some()
    }

    pub fn sort_key(&self) -> SortKey {
        self.sort.unwrap_or(SortKey::ModifiedAt)
    }

    fn query(&self) -> Option<String> {
        self.q
            .as_deref()
            .map(|q| q.trim().to_lowercase())
            .filter(|q| !q.is_empty())
    }

    fn tag_fragments(&self) -> Vec<String> {
        self.tags
            .as_deref()
            .unwrap_or_default()
            .split(',')
            .map(|t| t.trim().to_lowercase())
            .filter(|t| !t.is_empty())
            .collect()
    }

    /// The part of the request that determines the cached result set
    pub(crate) fn snapshot_key(&self) -> SearchKey<'_> {
        SearchKey {
            kind: "search",
            request: self,
        }
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct SearchKey<'a> {
    kind: &'static str,
    request: &'a SearchRequest,
}

/// Normalised form of a [`SearchRequest`], built once per search
struct Filter {
    query: Option<String>,
    node_type: TypeFilter,
    tags: Vec<String>,
    from: Option<DateTime<Utc>>,
    to: Option<DateTime<Utc>>,
}

impl Filter {
    fn new(request: &SearchRequest) -> Self {
        let midnight = |day: NaiveDate| day.and_time(NaiveTime::MIN).and_utc();
        Self {
            query: request.query(),
            node_type: request.node_type.unwrap_or_default(),
            tags: request.tag_fragments(),
            from: request.date_from.map(midnight),
            to: request.date_to.map(|day| midnight(day) + Duration::hours(24)),
        }
    }

    fn admits(&self, node: &Node) -> bool {
        if let Some(q) = &self.query {
            let in_name = node.name.to_lowercase().contains(q);
            let in_text = node
                .text
                .as_deref()
                .is_some_and(|text| text.to_lowercase().contains(q));
            let in_tags = node.tags.iter().any(|tag| tag.to_lowercase().contains(q));
            if !(in_name || in_text || in_tags) {
                return false;
            }
        }
        if !self.node_type.admits(node.node_type) {
            return false;
        }
        if !self.tags.is_empty() {
            let tagged = node.tags.iter().any(|tag| {
                let tag = tag.to_lowercase();
                self.tags.iter().any(|fragment| tag.contains(fragment.as_str()))
            });
            if !tagged {
                return false;
            }
        }
        self.from.map_or(true, |from| node.created_at >= from)
            && self.to.map_or(true, |to| node.created_at <= to)
    }
}

// only files carry a meaningful modification time in search results
fn search_time(node: &Node) -> DateTime<Utc> {
    if node.is_file() {
        node.last_modified()
    } else {
        node.created_at
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
        SortKey::ModifiedAt => search_time(b).cmp(&search_time(a)),
        SortKey::Size => b.size.unwrap_or(0).cmp(&a.size.unwrap_or(0)),
    }
}

/// Nodes in `all` that pass every filter of `request`, sorted
pub fn search<'a>(all: &'a [Node], request: &SearchRequest) -> Vec<&'a Node> {
    if !request.is_active() {
        return Vec::new();
    }
    let filter = Filter::new(request);
    let mut found: Vec<&Node> = all.iter().filter(|node| filter.admits(node)).collect();
    let key = request.sort_key();
    found.sort_by(|a, b| compare(a, b, key));
    found
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchResults {
    pub nodes: Vec<ListedNode>,
    pub result_count: usize,
    /// False when the request carried no filter and nothing was searched
    pub searched: bool,
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    fn node(name: &str, node_type: NodeType, created_secs: i64) -> Node {
        Node {
            id: name.to_string(),
            node_type,
            owner: "alice".to_string(),
            name: name.to_string(),
            tags: Vec::new(),
            text: None,
            contents: Vec::new(),
            size: None,
            created_at: Utc.timestamp_opt(created_secs, 0).unwrap(),
            modified_at: None,
            lock: None,
        }
    }

    fn names(found: &[&Node]) -> Vec<String> {
        found.iter().map(|n| n.name.clone()).collect()
    }

    #[test]
    fn test_blank_request_searches_nothing() {
        let all = vec![node("a", NodeType::File, 0)];
        let blank = SearchRequest {
            q: Some("   ".into()),
            tags: Some(" , ".into()),
            ..Default::default()
        };
        assert!(!blank.is_active());
        assert!(search(&all, &blank).is_empty());

        let typed = SearchRequest {
            node_type: Some(TypeFilter::All),
            ..Default::default()
        };
        assert_eq!(names(&search(&all, &typed)), ["a"]);
    }

    #[test]
    fn test_text_matches_name_text_or_tag() {
        let mut by_text = node("plain", NodeType::File, 0);
        by_text.text = Some("Quarterly REPORT".into());
        let mut by_tag = node("other", NodeType::File, 0);
        by_tag.tags = vec!["reporting".into()];
        let all = vec![
            node("Report.txt", NodeType::File, 0),
            by_text,
            by_tag,
            node("unrelated", NodeType::Directory, 0),
        ];

        let mut found = names(&search(&all, &SearchRequest::text("  report ")));
        found.sort();
        assert_eq!(found, ["Report.txt", "other", "plain"]);
    }

    #[test]
    fn test_tag_fragments_match_any_tag() {
        let mut work = node("work", NodeType::File, 0);
        work.tags = vec!["Work-2024".into()];
        let mut home = node("home", NodeType::File, 0);
        home.tags = vec!["home".into()];
        let all = vec![work, home, node("untagged", NodeType::File, 0)];

        let request = SearchRequest {
            tags: Some("work, ,garden".into()),
            ..Default::default()
        };
        assert_eq!(names(&search(&all, &request)), ["work"]);
    }

    #[test]
    fn test_type_filter() {
        let all = vec![
            node("f", NodeType::File, 0),
            node("d", NodeType::Directory, 0),
            node("s", NodeType::Symlink, 0),
        ];
        let request = SearchRequest {
            node_type: Some(TypeFilter::Directory),
            ..Default::default()
        };
        assert_eq!(names(&search(&all, &request)), ["d"]);
    }

    #[test]
    fn test_date_range_includes_whole_end_day() {
        let day = |y, m, d| NaiveDate::from_ymd_opt(y, m, d).unwrap();
        let at = |date: NaiveDate, h| date.and_hms_opt(h, 0, 0).unwrap().and_utc().timestamp();
        let all = vec![
            node("before", NodeType::File, at(day(2024, 2, 29), 23)),
            node("first", NodeType::File, at(day(2024, 3, 1), 0)),
            node("last", NodeType::File, at(day(2024, 3, 2), 23)),
            node("after", NodeType::File, at(day(2024, 3, 3), 1)),
        ];
        let request = SearchRequest {
            date_from: Some(day(2024, 3, 1)),
            date_to: Some(day(2024, 3, 2)),
            sort: Some(SortKey::CreatedAt),
            ..Default::default()
        };
        assert_eq!(names(&search(&all, &request)), ["last", "first"]);
    }

    #[test]
    fn test_default_sort_uses_file_modification_time() {
        let mut edited = node("edited", NodeType::File, 10);
        edited.modified_at = Some(Utc.timestamp_opt(500, 0).unwrap());
        let mut dir = node("dir", NodeType::Directory, 100);
        // ignored for directories
        dir.modified_at = Some(Utc.timestamp_opt(900, 0).unwrap());
        let all = vec![node("old", NodeType::File, 1), dir, edited];

        let request = SearchRequest {
            node_type: Some(TypeFilter::All),
            ..Default::default()
        };
        assert_eq!(names(&search(&all, &request)), ["edited", "dir", "old"]);
    }

    #[test]
    fn test_request_wire_names() {
        let request: SearchRequest = serde_json::from_str(
            r#"{"q":"x","type":"symlink","tags":"a,b","dateFrom":"2024-03-01","sortBy":"size"}"#,
        )
        .unwrap();
        assert_eq!(request.node_type, Some(TypeFilter::Symlink));
        assert_eq!(request.date_from, NaiveDate::from_ymd_opt(2024, 3, 1));
        assert_eq!(request.sort_key(), SortKey::Size);
    }
}
