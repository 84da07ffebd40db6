// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use crate::schema::IterationVector;

/// Split an iteration path across a processor's inputs.
///
/// `deltas[i]` is the number of nesting levels input `i` added by implicit
/// iteration (`resolved - declared`). Each input takes exactly that many
/// leading components of what is left of `path`, in input order. When `path`
/// is shorter than the sum of deltas no projection is possible and every
/// input gets the empty path, meaning "all bindings".
///
/// # Examples
/// ```
/// use dagwood_lineage::lineage::project_path;
/// use dagwood_lineage::schema::IterationVector;
///
/// let path = IterationVector::new(vec![4, 2]);
/// let projected = project_path(&path, &[1, 0, 1]);
///
/// assert_eq!(projected[0], IterationVector::new(vec![4]));
/// assert!(projected[1].is_empty());
/// assert_eq!(projected[2], IterationVector::new(vec![2]));
/// ```
pub fn project_path(path: &IterationVector, deltas: &[u32]) -> Vec<IterationVector> {
    let required: usize = deltas.iter().map(|d| *d as usize).sum();
    if path.len() < required {
        return vec![IterationVector::root(); deltas.len()];
    }

    let mut remaining = path.clone();
    deltas
        .iter()
        .map(|delta| {
            let (head, tail) = remaining.split_at(*delta as usize);
            remaining = tail;
            head
        })
        .collect()
}
