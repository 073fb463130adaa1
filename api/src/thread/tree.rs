//! Turns the flat parent-pointer rows of a thread into an ordered sequence.
//!
//! Replies are kept in an arena and addressed by their index, each node
//! knowing the indices of its direct children. Children are ordered most
//! recent first (ties broken by the larger id) and the whole subtree of a
//! child is emitted before its next sibling.

use std::{cmp::Ordering, collections::HashMap};

use chrono::NaiveDateTime;

use super::models::{Reply, ReplyRow, ReplyView};

/// Anything that can be placed into a [`ReplyTree`].
pub trait ThreadNode {
    fn id(&self) -> i32;
    fn parent_id(&self) -> Option<i32>;
    fn created_at(&self) -> NaiveDateTime;
}

impl ThreadNode for Reply {
    fn id(&self) -> i32 {
        self.id
    }

    fn parent_id(&self) -> Option<i32> {
        self.parent_reply_id
    }

    fn created_at(&self) -> NaiveDateTime {
        self.created_at
    }
}

impl ThreadNode for ReplyRow {
    fn id(&self) -> i32 {
        self.reply.id
    }

    fn parent_id(&self) -> Option<i32> {
        self.reply.parent_reply_id
    }

    fn created_at(&self) -> NaiveDateTime {
        self.reply.created_at
    }
}

#[derive(thiserror::Error, Debug, PartialEq, Eq)]
pub enum TreeError {
    #[error("Reply `{id}` appears more than once in the thread")]
    DuplicateReply { id: i32 },

    #[error("Reply `{id}` points to parent `{parent_id}` which is not part of the thread")]
    DanglingParent { id: i32, parent_id: i32 },

    #[error("{count} replies are not reachable from the post (cyclic parent links)")]
    Unreachable { count: usize },
}

pub struct ReplyTree<T> {
    nodes: Vec<T>,
    index: HashMap<i32, usize>,
    children: Vec<Vec<usize>>,
    /// Pre-order of `(node, nesting level)`, computed once at build time
    order: Vec<(usize, usize)>,
}

impl<T: ThreadNode> ReplyTree<T> {
    pub fn from_rows(rows: Vec<T>) -> Result<Self, TreeError> {
        let mut index = HashMap::<i32, usize>::with_capacity(rows.len());
        for (i, row) in rows.iter().enumerate() {
            if index.insert(row.id(), i).is_some() {
                return Err(TreeError::DuplicateReply { id: row.id() });
            }
        }

        let mut roots = Vec::new();
        let mut children = vec![Vec::new(); rows.len()];
        for (i, row) in rows.iter().enumerate() {
            match row.parent_id() {
                None => roots.push(i),
                Some(parent_id) => {
                    let parent = index.get(&parent_id).ok_or(TreeError::DanglingParent {
                        id: row.id(),
                        parent_id,
                    })?;
                    children[*parent].push(i);
                }
            }
        }

        let most_recent_first = |a: &usize, b: &usize| -> Ordering {
            let (a, b) = (&rows[*a], &rows[*b]);
            b.created_at()
                .cmp(&a.created_at())
                .then_with(|| b.id().cmp(&a.id()))
        };

        roots.sort_unstable_by(most_recent_first);
        for siblings in children.iter_mut() {
            siblings.sort_unstable_by(most_recent_first);
        }

        let order = pre_order(&roots, &children);
        if order.len() != rows.len() {
            return Err(TreeError::Unreachable {
                count: rows.len() - order.len(),
            });
        }

        Ok(ReplyTree {
            nodes: rows,
            index,
            children,
            order,
        })
    }

    pub fn immediate_child_count(&self, id: i32) -> Option<usize> {
        self.index.get(&id).map(|i| self.children[*i].len())
    }

    /// The reply itself followed by all of its transitive descendants, in
    /// traversal order. `None` if the reply is not part of this tree.
    pub fn descendants_of(&self, id: i32) -> Option<Vec<i32>> {
        let start = *self.index.get(&id)?;

        Some(
            pre_order(&[start], &self.children)
                .into_iter()
                .map(|(i, _)| self.nodes[i].id())
                .collect(),
        )
    }

    /// Ids in traversal order
    pub fn ordered_ids(&self) -> Vec<i32> {
        self.order.iter().map(|(i, _)| self.nodes[*i].id()).collect()
    }
}

impl ReplyTree<ReplyRow> {
    pub fn into_views(self) -> Vec<ReplyView> {
        let ReplyTree {
            nodes,
            children,
            order,
            ..
        } = self;

        let mut slots: Vec<Option<ReplyRow>> = nodes.into_iter().map(Some).collect();

        order
            .into_iter()
            .filter_map(|(i, depth)| {
                slots[i]
                    .take()
                    .map(|row| ReplyView::from_row(row, depth, children[i].len()))
            })
            .collect()
    }
}

/// Builds the tree and linearizes it in one go.
pub fn linearize(rows: Vec<ReplyRow>) -> Result<Vec<ReplyView>, TreeError> {
    Ok(ReplyTree::from_rows(rows)?.into_views())
}

// Depth-first walk over already sorted children. An explicit stack keeps
// arbitrarily deep chains off the call stack.
fn pre_order(starts: &[usize], children: &[Vec<usize>]) -> Vec<(usize, usize)> {
    let mut result = Vec::with_capacity(children.len());
    let mut stack: Vec<(usize, usize)> = starts.iter().rev().map(|i| (*i, 0)).collect();

    while let Some((node, depth)) = stack.pop() {
        result.push((node, depth));
        stack.extend(children[node].iter().rev().map(|child| (*child, depth + 1)));
    }

    result
}
