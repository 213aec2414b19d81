use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::Serialize;

use super::CacheError;

pub const USER_PREFIX: &str = "user";
pub const NODE_PREFIX: &str = "node";
pub const SEARCH_PREFIX: &str = "search";

/// Key for a user-scoped resource, e.g. `user:alice:profile:`
pub fn user_key(username: &str, resource: &str, params: &str) -> String {
    format!("{USER_PREFIX}:{username}:{resource}:{params}")
}

/// Key for a single node, e.g. `node:alice:n1`
pub fn node_key(username: &str, node_id: &str) -> String {
    format!("{NODE_PREFIX}:{username}:{node_id}")
}

/// Key for a search or listing query.
///
/// The whole query is folded into the key via its JSON encoding, so two
/// different filters never share an entry. Queries should serialise
/// deterministically (structs and `BTreeMap`s, not `HashMap`s).
pub fn search_key<Q: Serialize + ?Sized>(username: &str, query: &Q) -> Result<String, CacheError> {
    let json = serde_json::to_vec(query).map_err(|e| CacheError::Key(e.to_string()))?;
    Ok(format!("{SEARCH_PREFIX}:{username}:{}", STANDARD.encode(json)))
}

/// Every key prefix owned by `username`
pub fn namespace_prefixes(username: &str) -> [String; 3] {
    [
        format!("{USER_PREFIX}:{username}:"),
        format!("{NODE_PREFIX}:{username}:"),
        format!("{SEARCH_PREFIX}:{username}:"),
    ]
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;

    #[test]
    fn test_kinds_never_collide() {
        let user = user_key("alice", "n1", "");
        let node = node_key("alice", "n1");
        let search = search_key("alice", "n1").unwrap();

        assert_ne!(user, node);
        assert_ne!(node, search);
        assert_ne!(user, search);
        assert_eq!(node, "node:alice:n1");
    }

    #[test]
    fn test_search_key_folds_query() {
        let mut a = BTreeMap::new();
        a.insert("name", "report");
        let mut b = BTreeMap::new();
        b.insert("name", "reports");

        let key_a = search_key("alice", &a).unwrap();
        assert_ne!(key_a, search_key("alice", &b).unwrap());
        assert_eq!(key_a, search_key("alice", &a.clone()).unwrap());
        assert_ne!(key_a, search_key("bob", &a).unwrap());
    }

    #[test]
    fn test_namespace_prefixes_cover_all_kinds() {
        let prefixes = namespace_prefixes("alice");
        let keys = [
            user_key("alice", "profile", ""),
            node_key("alice", "n1"),
            search_key("alice", &()).unwrap(),
        ];
        for key in keys {
            assert!(prefixes.iter().any(|p| key.starts_with(p.as_str())));
        }
        // a user whose name extends another's is not in their namespace
        assert!(!node_key("alicia", "n1").starts_with(prefixes[1].as_str()));
    }
}
