//! Domain Services
//!
//! Pure functions over comments: thread assembly and subtree walks.

use crate::domain::entities::{Comment, CommentLink, CommentNode};
use kernel::id::CommentId;
use std::collections::HashMap;

/// Assemble a flat comment list into threads.
///
/// Only comments without a parent become roots. Comments whose parent is not
/// in the input are dropped along with their replies. Siblings keep the order
/// they had in the input.
pub fn build_comment_tree(comments: Vec<Comment>) -> Vec<CommentNode> {
    let mut replies: HashMap<CommentId, Vec<Comment>> = HashMap::new();
    let mut roots = Vec::new();

    for comment in comments {
        match comment.parent_id {
            None => roots.push(comment),
            Some(parent) => replies.entry(parent).or_default().push(comment),
        }
    }

    roots
        .into_iter()
        .map(|root| attach_replies(root, &mut replies))
        .collect()
}

// Each reply list is taken out of the map once, so a malformed cycle cannot recurse forever.
fn attach_replies(comment: Comment, replies: &mut HashMap<CommentId, Vec<Comment>>) -> CommentNode {
    let children = replies
        .remove(&comment.id)
        .unwrap_or_default()
        .into_iter()
        .map(|reply| attach_replies(reply, replies))
        .collect();

    CommentNode { comment, children }
}

/// Ids of `root` and all its descendants, descendants before ancestors.
pub fn collect_subtree_post_order(root: CommentId, links: &[CommentLink]) -> Vec<CommentId> {
    let mut children: HashMap<CommentId, Vec<CommentId>> = HashMap::new();
    for link in links {
        if let Some(parent) = link.parent_id {
            children.entry(parent).or_default().push(link.id);
        }
    }

    let mut ordered = Vec::new();
    visit_post_order(root, &mut children, &mut ordered);
    ordered
}

fn visit_post_order(
    id: CommentId,
    children: &mut HashMap<CommentId, Vec<CommentId>>,
    ordered: &mut Vec<CommentId>,
) {
    for child in children.remove(&id).unwrap_or_default() {
        visit_post_order(child, children, ordered);
    }
    ordered.push(id);
}
