use log::debug;
use serde::Deserialize;

/// A pull request reviewer, identified by username.
///
/// Bitbucket Server returns reviewers as user objects; only the `name` field is
/// kept.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Reviewer {
    #[serde(rename = "name")]
    pub username: String,
}

impl Reviewer {
    pub fn new(username: &str) -> Self {
        Self {
            username: username.to_string(),
        }
    }
}

/// Merge server-mandated reviewers with the ones the caller asked for.
///
/// Required reviewers come first, in server order. Requested usernames follow
/// in caller order, skipping any already present. The result never holds two
/// reviewers with the same username.
pub fn merge_reviewers(requested: &[String], required: Vec<Reviewer>) -> Vec<Reviewer> {
    let mut merged: Vec<Reviewer> = Vec::with_capacity(required.len() + requested.len());

    for reviewer in required {
        if !contains(&merged, &reviewer.username) {
            merged.push(reviewer);
        }
    }

    for username in requested {
        let username = username.trim();
        if username.is_empty() {
            continue;
        }
        if contains(&merged, username) {
            debug!("Reviewer {} is already required, skipping", username);
            continue;
        }
        merged.push(Reviewer::new(username));
    }

    merged
}

fn contains(reviewers: &[Reviewer], username: &str) -> bool {
    reviewers.iter().any(|r| r.username == username)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(reviewers: &[Reviewer]) -> Vec<&str> {
        reviewers.iter().map(|r| r.username.as_str()).collect()
    }

    fn requested(names: &[&str]) -> Vec<String> {
        names.iter().map(|n| n.to_string()).collect()
    }

    #[test]
    fn test_required_first_without_duplicates() {
        let merged = merge_reviewers(
            &requested(&["bob", "carol"]),
            vec![Reviewer::new("alice"), Reviewer::new("bob")],
        );
        assert_eq!(names(&merged), vec!["alice", "bob", "carol"]);
    }

    #[test]
    fn test_no_required_reviewers() {
        let merged = merge_reviewers(&requested(&["carol", "dave"]), vec![]);
        assert_eq!(names(&merged), vec!["carol", "dave"]);
    }

    #[test]
    fn test_no_requested_reviewers() {
        let merged = merge_reviewers(&[], vec![Reviewer::new("alice")]);
        assert_eq!(names(&merged), vec!["alice"]);
    }

    #[test]
    fn test_requested_duplicates_collapse() {
        let merged = merge_reviewers(&requested(&["carol", "carol", " ", "alice"]), vec![
            Reviewer::new("alice"),
        ]);
        assert_eq!(names(&merged), vec!["alice", "carol"]);
    }

    #[test]
    fn test_duplicate_required_reviewers_collapse() {
        let merged = merge_reviewers(&[], vec![
            Reviewer::new("alice"),
            Reviewer::new("bob"),
            Reviewer::new("alice"),
        ]);
        assert_eq!(names(&merged), vec!["alice", "bob"]);
    }

    #[test]
    fn test_deserialize_from_user_object() {
        let reviewers: Vec<Reviewer> = serde_json::from_str(
            r#"[{"name": "alice", "emailAddress": "alice@example.com", "id": 1, "displayName": "Alice"}]"#,
        )
        .unwrap();
        assert_eq!(reviewers, vec![Reviewer::new("alice")]);
    }
}
