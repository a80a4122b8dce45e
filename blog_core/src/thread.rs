//! Turns the flat comment list of one post into an ordered reply forest.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{
    entity::prelude::CommentModel,
    ids::{CommentId, PostId, UserId},
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommentNode {
    pub id: CommentId,
    pub post_id: PostId,
    pub parent_id: Option<CommentId>,
    pub user_id: Option<UserId>,
    pub author: String,
    pub body: String,
    pub is_visible: bool,
    pub is_reported: bool,
    pub created_at: DateTime<Utc>,
    /// Set when `parent_id` points at nothing in this thread.
    pub orphaned: bool,
    pub replies: Vec<CommentNode>,
}

impl CommentNode {
    fn from_model(comment: CommentModel, orphaned: bool, replies: Vec<CommentNode>) -> Self {
        Self {
            id: comment.id,
            post_id: comment.post_id,
            parent_id: comment.parent_id,
            user_id: comment.user_id,
            author: comment.author,
            body: comment.body,
            is_visible: comment.is_visible,
            is_reported: comment.is_reported,
            created_at: comment.created_at,
            orphaned,
            replies,
        }
    }
}

/// Builds the forest for one post's comments.
///
/// Every level is ordered by `created_at` ascending, ties by id. Comments whose
/// parent is missing from `comments`, or is the comment itself, are placed at
/// the root with `orphaned` set. Parent cycles cannot be written through the
/// service, but if the store holds one, its earliest member becomes an
/// orphaned root so nothing is dropped.
pub fn build_comment_forest(mut comments: Vec<CommentModel>) -> Vec<CommentNode> {
    comments.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));

    let index: HashMap<CommentId, usize> = comments
        .iter()
        .enumerate()
        .map(|(i, comment)| (comment.id, i))
        .collect();

    let mut children: Vec<Vec<usize>> = vec![Vec::new(); comments.len()];
    let mut orphaned = vec![false; comments.len()];
    let mut roots = Vec::new();

    for (i, comment) in comments.iter().enumerate() {
        match comment.parent_id {
            None => roots.push(i),
            Some(parent) if parent == comment.id => {
                orphaned[i] = true;
                roots.push(i);
            }
            Some(parent) => match index.get(&parent) {
                Some(&p) => children[p].push(i),
                None => {
                    orphaned[i] = true;
                    roots.push(i);
                }
            },
        }
    }

    let mut slots: Vec<Option<CommentModel>> = comments.into_iter().map(Some).collect();
    let mut forest: Vec<(usize, CommentNode)> = roots
        .iter()
        .filter_map(|&i| materialize(i, &mut slots, &children, &orphaned).map(|node| (i, node)))
        .collect();

    // Whatever is left sits on a parent cycle.
    for i in 0..slots.len() {
        if slots[i].is_some() {
            orphaned[i] = true;
            if let Some(node) = materialize(i, &mut slots, &children, &orphaned) {
                forest.push((i, node));
            }
        }
    }

    forest.sort_by_key(|(i, _)| *i);
    forest.into_iter().map(|(_, node)| node).collect()
}

fn materialize(
    i: usize,
    slots: &mut [Option<CommentModel>],
    children: &[Vec<usize>],
    orphaned: &[bool],
) -> Option<CommentNode> {
    let comment = slots[i].take()?;
    let replies = children[i]
        .iter()
        .filter_map(|&child| materialize(child, slots, children, orphaned))
        .collect();
    Some(CommentNode::from_model(comment, orphaned[i], replies))
}

/// Total number of nodes in a forest.
pub fn count_nodes(forest: &[CommentNode]) -> usize {
    forest
        .iter()
        .map(|node| 1 + count_nodes(&node.replies))
        .sum()
}
