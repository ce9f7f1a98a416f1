//! Assembles a flat, ordered list of comment rows into the two-level
//! tree the API returns.

use std::collections::HashMap;

use crate::models::comment::{CommentDetail, CommentNode};

/// Build the comment tree for one post.
///
/// The input must be ordered roots-first, then by creation time
/// ascending within each group; output order mirrors input order.
/// A reply is attached to the root comment its `parent_id` names.
/// Replies whose parent is absent from the input, or whose parent is
/// itself a reply, are dropped: threads are two levels deep by policy,
/// and an unresolvable parent degrades to omission rather than an
/// error.
///
/// Runs in O(n) for n input comments and touches no storage.
pub fn assemble(comments: Vec<CommentDetail>) -> Vec<CommentNode> {
    let mut roots: Vec<CommentNode> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();

    for comment in comments {
        match comment.parent_id.clone() {
            None => {
                index.insert(comment.id.clone(), roots.len());
                roots.push(CommentNode {
                    comment,
                    replies: Vec::new(),
                });
            }
            Some(parent_id) => match index.get(&parent_id) {
                Some(&slot) => roots[slot].replies.push(comment),
                None => {
                    tracing::debug!(
                        comment_id = %comment.id,
                        parent_id = %parent_id,
                        "dropping reply with unresolvable parent"
                    );
                }
            },
        }
    }

    roots
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn detail(id: &str, parent_id: Option<&str>, minute: u32) -> CommentDetail {
        CommentDetail {
            id: id.to_string(),
            user_id: "usr_author".to_string(),
            username: "author".to_string(),
            avatar_url: None,
            post_id: "post_1".to_string(),
            parent_id: parent_id.map(str::to_string),
            content: format!("comment {id}"),
            likes: 0,
            dislikes: 0,
            created_at: Utc.with_ymd_and_hms(2025, 6, 1, 12, minute, 0).unwrap(),
        }
    }

    fn flatten(nodes: &[CommentNode]) -> Vec<CommentDetail> {
        let mut flat: Vec<CommentDetail> =
            nodes.iter().map(|n| n.comment.clone()).collect();
        for node in nodes {
            flat.extend(node.replies.iter().cloned());
        }
        flat
    }

    #[test]
    fn test_roots_and_replies_keep_order() {
        let input = vec![
            detail("cmt_1", None, 0),
            detail("cmt_3", None, 1),
            detail("cmt_2", Some("cmt_1"), 2),
            detail("cmt_4", Some("cmt_1"), 3),
        ];

        let tree = assemble(input);

        assert_eq!(tree.len(), 2);
        assert_eq!(tree[0].comment.id, "cmt_1");
        assert_eq!(tree[1].comment.id, "cmt_3");
        let reply_ids: Vec<&str> =
            tree[0].replies.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(reply_ids, vec!["cmt_2", "cmt_4"]);
        assert!(tree[1].replies.is_empty());
    }

    #[test]
    fn test_orphan_reply_is_dropped() {
        let input = vec![
            detail("cmt_1", None, 0),
            detail("cmt_5", Some("cmt_999"), 1),
        ];

        let tree = assemble(input);

        assert_eq!(tree.len(), 1);
        assert!(tree[0].replies.is_empty());
    }

    #[test]
    fn test_reply_to_reply_is_dropped() {
        let input = vec![
            detail("cmt_1", None, 0),
            detail("cmt_2", Some("cmt_1"), 1),
            detail("cmt_3", Some("cmt_2"), 2),
        ];

        let tree = assemble(input);

        assert_eq!(tree.len(), 1);
        assert_eq!(tree[0].replies.len(), 1);
        assert_eq!(tree[0].replies[0].id, "cmt_2");
    }

    #[test]
    fn test_empty_input() {
        assert!(assemble(Vec::new()).is_empty());
    }

    #[test]
    fn test_reassembling_flattened_output_reproduces_tree() {
        let input = vec![
            detail("cmt_1", None, 0),
            detail("cmt_3", None, 1),
            detail("cmt_2", Some("cmt_1"), 2),
            detail("cmt_4", Some("cmt_3"), 3),
        ];

        let first = assemble(input);
        let second = assemble(flatten(&first));

        assert_eq!(
            serde_json::to_value(&first).unwrap(),
            serde_json::to_value(&second).unwrap()
        );
    }
}
