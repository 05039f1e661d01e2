//! Clonal patches: connected groups of adjacent cells sharing a genotype.

use crate::cell::Genotype;
use crate::layout::AdjacencyGraph;
use std::collections::VecDeque;

/// Connected components of the contact graph restricted to one genotype.
#[derive(Debug, Clone, PartialEq)]
pub struct CloneSet {
    pub genotype: Genotype,
    /// Number of clones.
    pub number: usize,
    /// Size of each clone, in the same order as `members`.
    pub sizes: Vec<usize>,
    /// Cell indices of each clone, ascending.
    pub members: Vec<Vec<usize>>,
}

/// Partitions the cells carrying `genotype` into clones.
///
/// Components are discovered in order of their lowest cell index.
pub fn analyze(genotypes: &[Genotype], graph: &AdjacencyGraph, genotype: Genotype) -> CloneSet {
    debug_assert_eq!(genotypes.len(), graph.num_nodes());
    let mut visited = vec![false; genotypes.len()];
    let mut members = Vec::new();
    let mut queue = VecDeque::new();

    for start in 0..genotypes.len() {
        if visited[start] || genotypes[start] != genotype {
            continue;
        }
        visited[start] = true;
        queue.push_back(start);
        let mut component = Vec::new();
        while let Some(node) = queue.pop_front() {
            component.push(node);
            for &next in graph.neighbors(node) {
                if !visited[next] && genotypes[next] == genotype {
                    visited[next] = true;
                    queue.push_back(next);
                }
            }
        }
        component.sort_unstable();
        members.push(component);
    }

    CloneSet {
        genotype,
        number: members.len(),
        sizes: members.iter().map(Vec::len).collect(),
        members,
    }
}

/// Fraction of contacts joining cells of different genotype; 0 without contacts.
pub fn heterogeneity(genotypes: &[Genotype], graph: &AdjacencyGraph) -> f64 {
    if graph.num_edges() == 0 {
        return 0.0;
    }
    let crossing = graph
        .edges()
        .iter()
        .filter(|&&(a, b)| genotypes[a] != genotypes[b])
        .count();
    crossing as f64 / graph.num_edges() as f64
}

/// Fraction of cells that are still heterozygous; 0 for an empty population.
pub fn percent_heterozygous(genotypes: &[Genotype]) -> f64 {
    if genotypes.is_empty() {
        return 0.0;
    }
    let count = genotypes.iter().filter(|g| **g == Genotype::Heterozygous).count();
    count as f64 / genotypes.len() as f64
}

/// Clones of all three genotypes.
#[derive(Debug, Clone, PartialEq)]
pub struct Clones {
    sets: [CloneSet; 3],
}

impl Clones {
    pub fn new(genotypes: &[Genotype], graph: &AdjacencyGraph) -> Self {
        Clones {
            sets: Genotype::ALL.map(|g| analyze(genotypes, graph, g)),
        }
    }

    pub fn get(&self, genotype: Genotype) -> &CloneSet {
        &self.sets[genotype.index()]
    }

    pub fn iter(&self) -> impl Iterator<Item = &CloneSet> {
        self.sets.iter()
    }

    /// Total number of clones across genotypes.
    pub fn num_clones(&self) -> usize {
        self.sets.iter().map(|s| s.number).sum()
    }

    /// Sizes of every clone, all genotypes pooled.
    pub fn sizes(&self) -> Vec<usize> {
        self.sets.iter().flat_map(|s| s.sizes.iter().copied()).collect()
    }

    pub fn mean_size(&self) -> f64 {
        let sizes = self.sizes();
        if sizes.is_empty() {
            return 0.0;
        }
        sizes.iter().sum::<usize>() as f64 / sizes.len() as f64
    }

    /// Coefficient of variation (population std / mean) of clone sizes.
    pub fn size_variation(&self) -> f64 {
        let sizes = self.sizes();
        let mean = self.mean_size();
        if sizes.is_empty() || mean <= 0.0 {
            return 0.0;
        }
        let var = sizes
            .iter()
            .map(|s| {
                let d = *s as f64 - mean;
                d * d
            })
            .sum::<f64>()
            / sizes.len() as f64;
        var.sqrt() / mean
    }
}
