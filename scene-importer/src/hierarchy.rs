//! Node tree reconstruction from flat parent references
//!
//! Several formats list their nodes as `(id, parent id)` records in any
//! order. [`resolve`] turns such a list into a tree, dropping attachments
//! that would give a node two parents or close a cycle. The whole pass is
//! iterative, so arbitrarily long parent chains are fine.

use std::{collections::HashMap, fmt::Debug, hash::Hash};

use crate::error::{Error, Result};

/// A tree over the positions of the input records.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Hierarchy {
    /// Records without a parent, in declaration order
    pub roots: Vec<usize>,
    /// Children of each record, in declaration order
    pub children: Vec<Vec<usize>>,
    /// Parent of each record
    pub parents: Vec<Option<usize>>,
    /// Records whose declared parent link was dropped
    pub dropped: Vec<usize>,
    /// Problems found while resolving, already logged
    pub issues: Vec<String>,
}

impl Hierarchy {
    /// Records in depth-first pre-order, each root followed by its subtree
    pub fn preorder(&self) -> Vec<usize> {
        let mut order = Vec::with_capacity(self.parents.len());
        let mut stack: Vec<usize> = self.roots.iter().rev().copied().collect();
        while let Some(i) = stack.pop() {
            order.push(i);
            stack.extend(self.children[i].iter().rev().copied());
        }
        order
    }
}

/// Build a tree from `(id, parent)` records.
///
/// Each record is claimed by the first record, in declaration order, whose id
/// equals its declared parent. Later claims are dropped with an error. A
/// record naming itself or an unknown id as parent becomes a root. Every
/// cycle loses the link that was attached last.
///
/// Fails with [`Error::NoRootNode`] if `entries` is empty.
pub fn resolve<K>(entries: &[(K, Option<K>)], format: &'static str) -> Result<Hierarchy>
where
    K: Copy + Eq + Hash + Debug,
{
    let count = entries.len();
    if count == 0 {
        return Err(Error::NoRootNode { format });
    }

    let mut claims: HashMap<K, Vec<usize>> = HashMap::new();
    for (i, (id, parent)) in entries.iter().enumerate() {
        match parent {
            Some(p) if p == id => {}
            Some(p) => claims.entry(*p).or_default().push(i),
            None => {}
        }
    }

    let mut result = Hierarchy {
        children: vec![Vec::new(); count],
        parents: vec![None; count],
        ..Hierarchy::default()
    };
    // attach order, used to pick the edge that breaks a cycle
    let mut attach_seq = vec![0usize; count];
    let mut next_seq = 1;

    for (p, (id, _)) in entries.iter().enumerate() {
        let Some(claimed) = claims.get(id) else {
            continue;
        };
        for &c in claimed {
            if result.parents[c].is_some() {
                let msg = format!(
                    "{format}: node {:?} is claimed by more than one parent, dropping the claim of {:?}",
                    entries[c].0, id
                );
                log::error!("{msg}");
                result.issues.push(msg);
                continue;
            }
            result.parents[c] = Some(p);
            result.children[p].push(c);
            attach_seq[c] = next_seq;
            next_seq += 1;
        }
    }

    for (i, (id, parent)) in entries.iter().enumerate() {
        match parent {
            Some(p) if p == id => {
                let msg = format!("{format}: node {id:?} is its own parent");
                log::warn!("{msg}");
                result.issues.push(msg);
            }
            Some(p) if result.parents[i].is_none() => {
                let msg = format!("{format}: parent {p:?} of node {id:?} does not exist");
                log::warn!("{msg}");
                result.issues.push(msg);
            }
            _ => {}
        }
    }

    break_cycles(entries, &mut result, &attach_seq, format);

    result.roots = (0..count).filter(|&i| result.parents[i].is_none()).collect();
    if result.roots.is_empty() {
        return Err(Error::NoRootNode { format });
    }
    Ok(result)
}

/// Detach one edge of every cycle so that all records hang off a root.
fn break_cycles<K: Debug>(
    entries: &[(K, Option<K>)],
    tree: &mut Hierarchy,
    attach_seq: &[usize],
    format: &'static str,
) {
    let count = tree.parents.len();
    let mut reachable = vec![false; count];
    for root in (0..count).filter(|&i| tree.parents[i].is_none()) {
        mark_subtree(tree, root, &mut reachable);
    }

    // walk stamp per record, 0 = never walked
    let mut stamp = vec![0usize; count];
    for start in 0..count {
        if reachable[start] {
            continue;
        }
        let walk = start + 1;
        let mut current = start;
        // every unreachable record has a parent, so this ends on a cycle
        while stamp[current] != walk {
            stamp[current] = walk;
            match tree.parents[current] {
                Some(p) => current = p,
                None => break,
            }
        }
        if tree.parents[current].is_none() {
            continue;
        }

        let mut cycle = vec![current];
        let mut next = tree.parents[current];
        while let Some(n) = next {
            if n == current {
                break;
            }
            cycle.push(n);
            next = tree.parents[n];
        }
        let Some(&victim) = cycle.iter().max_by_key(|&&i| attach_seq[i]) else {
            continue;
        };
        if let Some(parent) = tree.parents[victim].take() {
            tree.children[parent].retain(|&c| c != victim);
            let msg = format!(
                "{format}: parent links of node {:?} form a cycle, detaching it from {:?}",
                entries[victim].0, entries[parent].0
            );
            log::error!("{msg}");
            tree.issues.push(msg);
        }
        tree.dropped.push(victim);
        mark_subtree(tree, victim, &mut reachable);
    }
}

fn mark_subtree(tree: &Hierarchy, root: usize, reachable: &mut [bool]) {
    let mut stack = vec![root];
    while let Some(i) = stack.pop() {
        if !std::mem::replace(&mut reachable[i], true) {
            stack.extend(tree.children[i].iter().copied());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_order_independent_tree() {
        // children declared before their parents
        let entries = [(3, Some(1)), (2, Some(1)), (1, None), (4, Some(3))];
        let tree = resolve(&entries, "TEST").expect("resolves");
        assert_eq!(tree.roots, vec![2]);
        assert_eq!(tree.children[2], vec![0, 1]);
        assert_eq!(tree.children[0], vec![3]);
        assert_eq!(tree.preorder(), vec![2, 0, 3, 1]);
        assert!(tree.issues.is_empty());
    }

    #[test]
    fn test_every_node_appears_once() {
        let entries: Vec<(u32, Option<u32>)> = (0..200)
            .map(|i| (i, if i == 0 { None } else { Some((i - 1) / 3) }))
            .collect();
        let tree = resolve(&entries, "TEST").expect("resolves");
        let mut order = tree.preorder();
        assert_eq!(order.len(), 200);
        order.sort_unstable();
        order.dedup();
        assert_eq!(order.len(), 200);
    }

    #[test]
    fn test_root_parented_to_descendant_breaks_cycle() {
        // 0 -> 1 -> 2, and 0 claims 2 as its parent
        let entries = [(0, Some(2)), (1, Some(0)), (2, Some(1)), (9, None)];
        let tree = resolve(&entries, "TEST").expect("resolves");
        assert_eq!(tree.dropped.len(), 1);
        assert_eq!(tree.roots.len(), 2);
        assert_eq!(tree.preorder().len(), 4);
        assert!(tree.issues.iter().any(|m| m.contains("cycle")));
    }

    #[test]
    fn test_self_parent_and_unknown_parent_become_roots() {
        let entries = [(1, Some(1)), (2, Some(7)), (3, Some(2))];
        let tree = resolve(&entries, "TEST").expect("resolves");
        assert_eq!(tree.roots, vec![0, 1]);
        assert_eq!(tree.children[1], vec![2]);
        assert_eq!(tree.issues.len(), 2);
    }

    #[test]
    fn test_duplicate_claim_is_dropped() {
        // two records share id 5; the first one keeps the child
        let entries = [(5, None), (5, None), (6, Some(5))];
        let tree = resolve(&entries, "TEST").expect("resolves");
        assert_eq!(tree.children[0], vec![2]);
        assert!(tree.children[1].is_empty());
        assert!(tree.issues.iter().any(|m| m.contains("more than one parent")));
    }

    #[test]
    fn test_empty_input_has_no_root() {
        let entries: [(u32, Option<u32>); 0] = [];
        assert!(matches!(
            resolve(&entries, "TEST"),
            Err(Error::NoRootNode { format: "TEST" })
        ));
    }

    #[test]
    fn test_long_chain_does_not_recurse() {
        let entries: Vec<(u32, Option<u32>)> = (0..100_000u32)
            .map(|i| (i, i.checked_sub(1)))
            .collect();
        let tree = resolve(&entries, "TEST").expect("resolves");
        assert_eq!(tree.roots, vec![0]);
        assert_eq!(tree.preorder().len(), 100_000);
    }
}
