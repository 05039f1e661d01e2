//! Ancestry tree over lineage barcodes.

use crate::cell::Lineage;
use std::collections::{BTreeMap, BTreeSet};

/// Dendrogram of a set of extant lineages: every prefix of every barcode is a
/// node, and each non-root node hangs off the barcode one bit shorter.
#[derive(Debug, Clone, PartialEq)]
pub struct Phylogeny {
    /// Children of every node, in ascending barcode order.
    children: BTreeMap<Lineage, Vec<Lineage>>,
    leaves: BTreeSet<Lineage>,
}

impl Phylogeny {
    /// Builds the tree. Prefixes shared by sibling lineages are visited once:
    /// walking up from a barcode stops at the first ancestor already present.
    pub fn build<'a, I>(lineages: I) -> Self
    where
        I: IntoIterator<Item = &'a Lineage>,
    {
        let mut children: BTreeMap<Lineage, Vec<Lineage>> = BTreeMap::new();
        children.insert(Lineage::root(), Vec::new());
        let mut leaves = BTreeSet::new();

        for lineage in lineages {
            leaves.insert(lineage.clone());
            let mut path = Vec::new();
            let mut node = lineage.clone();
            while !children.contains_key(&node) {
                let Some(parent) = node.parent() else { break };
                path.push(node);
                node = parent;
            }
            // Attach the new nodes top-down so each parent already exists
            for node in path.into_iter().rev() {
                children.insert(node.clone(), Vec::new());
                if let Some(parent) = node.parent() {
                    children.entry(parent).or_default().push(node);
                }
            }
        }

        for kids in children.values_mut() {
            kids.sort_unstable();
        }
        // A barcode that is also an ancestor of another is an internal node
        leaves.retain(|l| children.get(l).map_or(true, |kids| kids.is_empty()));

        Phylogeny { children, leaves }
    }

    pub fn root(&self) -> Lineage {
        Lineage::root()
    }

    pub fn num_nodes(&self) -> usize {
        self.children.len()
    }

    /// All nodes in depth-first (lexicographic) order, root first.
    pub fn nodes(&self) -> impl Iterator<Item = &Lineage> {
        self.children.keys()
    }

    pub fn contains(&self, lineage: &Lineage) -> bool {
        self.children.contains_key(lineage)
    }

    /// Deduplicated `(parent, child)` edge list.
    pub fn edges(&self) -> Vec<(Lineage, Lineage)> {
        self.children
            .iter()
            .flat_map(|(parent, kids)| kids.iter().map(move |kid| (parent.clone(), kid.clone())))
            .collect()
    }

    pub fn parent(&self, lineage: &Lineage) -> Option<Lineage> {
        if self.contains(lineage) {
            lineage.parent()
        } else {
            None
        }
    }

    pub fn children(&self, lineage: &Lineage) -> &[Lineage] {
        self.children.get(lineage).map_or(&[], |kids| kids.as_slice())
    }

    pub fn leaves(&self) -> impl Iterator<Item = &Lineage> {
        self.leaves.iter()
    }

    /// Length of the longest root-to-leaf path.
    pub fn depth(&self) -> usize {
        self.leaves.iter().map(Lineage::len).max().unwrap_or(0)
    }

    /// Leaves in depth-first order, branch 0 before branch 1.
    pub fn leaf_order(&self) -> Vec<Lineage> {
        self.leaves.iter().cloned().collect()
    }

    /// Newick rendering with barcodes as leaf labels; the root is labelled `root`.
    pub fn to_newick(&self) -> String {
        let mut out = String::new();
        let mut stack: Vec<(Lineage, bool)> = vec![(self.root(), false)];

        while let Some((node, expanded)) = stack.pop() {
            let kids = self.children(&node);
            if expanded || kids.is_empty() {
                if !kids.is_empty() {
                    out.push(')');
                }
                if node.is_empty() {
                    out.push_str("root");
                } else {
                    out.push_str(&node.to_string());
                }
                // Separate from a following sibling
                if let Some((next, false)) = stack.last() {
                    if next.parent() == node.parent() {
                        out.push(',');
                    }
                }
                continue;
            }
            out.push('(');
            stack.push((node, true));
            for kid in kids.iter().rev() {
                stack.push((kid.clone(), false));
            }
        }
        out.push(';');
        out
    }
}
