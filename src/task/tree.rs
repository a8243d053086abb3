// src/task/tree.rs

//! Breadth-first linearisation of a continuation tree.
//!
//! The resulting order is the execution order inside one worker: a task
//! always runs before any of its direct continuations, and siblings run in
//! registration order before any of their own children.

use super::Task;

/// One entry of a flattened tree.
#[derive(Clone)]
pub(crate) struct TreeEntry {
    pub task: Task,
    /// Index of the antecedent within the same flattened tree.
    pub parent: Option<usize>,
}

/// Flatten without touching the tasks.
pub(crate) fn flatten(root: &Task) -> Vec<TreeEntry> {
    walk(root, |task| task.lock_state().chained_continuations())
}

/// Flatten and seal every task, so continuations registered from now on are
/// submitted as their own trees instead of being silently missed.
pub(crate) fn seal(root: &Task) -> Vec<TreeEntry> {
    walk(root, |task| task.lock_state().seal())
}

fn walk(root: &Task, mut expand: impl FnMut(&Task) -> Vec<Task>) -> Vec<TreeEntry> {
    let mut entries = vec![TreeEntry {
        task: root.clone(),
        parent: None,
    }];

    let mut start = 0;
    loop {
        let end = entries.len();
        for index in start..end {
            let children = expand(&entries[index].task);
            entries.extend(children.into_iter().map(|task| TreeEntry {
                task,
                parent: Some(index),
            }));
        }
        if entries.len() == end {
            break;
        }
        start = end;
    }

    entries
}
