use clonal_growth::layout::build_adjacency;
use clonal_growth::{Cell, Culture, Genotype, GrowthSimulation, Lineage};
use growth_common::GrowthConfig;
use std::collections::{BTreeSet, HashMap};

fn lineage_strings(culture: &Culture) -> BTreeSet<String> {
    culture.lineages().iter().map(Lineage::to_string).collect()
}

#[test]
fn certain_division_doubles_the_founder_twice() {
    let mut culture = Culture::from_founder(3);
    assert_eq!(culture.cells()[0].generation(), 0);
    assert!(culture.cells()[0].lineage().is_empty());

    let steps = culture.grow(4, None, 1.0, 0.0).unwrap();
    assert_eq!(steps, 2);
    assert_eq!(culture.size(), 4);
    assert!(culture.genotypes().iter().all(|g| *g == Genotype::Heterozygous));
    let expected: BTreeSet<String> = ["00", "01", "10", "11"].iter().map(|s| s.to_string()).collect();
    assert_eq!(lineage_strings(&culture), expected);
}

#[test]
fn certain_recombination_makes_every_child_homozygous() {
    let mut culture = Culture::from_founder(8);
    assert_eq!(culture.percent_heterozygous(), 1.0);
    culture.update(1.0, 1.0).unwrap();
    assert_eq!(culture.size(), 2);
    assert!(culture.genotypes().iter().all(|g| g.is_homozygous()));
    assert_eq!(culture.percent_heterozygous(), 0.0);
}

#[test]
fn zero_division_with_a_cap_returns() {
    let mut culture = Culture::inoculate(2, 0);
    let steps = culture.grow(100, Some(5), 0.0, 0.5).unwrap();
    assert_eq!(steps, 5);
    assert_eq!(culture.size(), 4);
    assert_eq!(culture.generation(), 5);
}

#[test]
fn every_step_preserves_genotype_rules() {
    let mut culture = Culture::inoculate(2, 2024);
    culture.grow(256, Some(60), 0.5, 0.3).unwrap();

    let history = culture.history();
    for t in 1..history.len() {
        let parents: HashMap<&Lineage, Genotype> =
            history[t - 1].iter().map(|c| (c.lineage(), c.genotype())).collect();
        let mut divided = 0;
        for cell in &history[t] {
            assert_eq!(cell.lineage().len() as u32, cell.generation());
            if let Some(g) = parents.get(cell.lineage()) {
                // Carried forward unchanged
                assert_eq!(*g, cell.genotype());
                continue;
            }
            let parent = cell.lineage().parent().expect("child of a parent");
            let g = parents[&parent];
            if g.is_homozygous() {
                assert_eq!(g, cell.genotype());
            }
            if cell.lineage().bits().last() == Some(&false) {
                divided += 1;
            }
        }
        assert_eq!(history[t].len(), 2 * divided + (history[t - 1].len() - divided));
    }
}

#[test]
fn adjacency_respects_the_cutoff() {
    let mut culture = Culture::inoculate(3, 11);
    culture.grow(200, Some(40), 0.6, 0.2).unwrap();
    let cutoff = culture.layout().max_edge_length;
    let positions = culture.positions();
    let graph = build_adjacency(&positions, cutoff);
    for &(a, b) in graph.edges() {
        assert!(a < b);
        assert!(graph.neighbors(b).contains(&a));
        assert!(positions[a].distance(positions[b]) <= cutoff + 1e-12);
    }
    assert!((0.0..=1.0).contains(&culture.heterogeneity()));
}

#[test]
fn phylogeny_is_a_tree() {
    let mut culture = Culture::inoculate(2, 99);
    culture.grow(64, Some(40), 0.5, 0.0).unwrap();
    let tree = culture.phylogeny();

    let mut incoming: HashMap<Lineage, usize> = HashMap::new();
    for (parent, child) in tree.edges() {
        assert_eq!(child.parent(), Some(parent));
        *incoming.entry(child).or_default() += 1;
    }
    for node in tree.nodes() {
        if node.is_empty() {
            assert!(!incoming.contains_key(node));
        } else {
            assert_eq!(incoming[node], 1);
        }
    }
    assert_eq!(tree.edges().len(), tree.num_nodes() - 1);
    let leaves: BTreeSet<Lineage> = tree.leaves().cloned().collect();
    let cells: BTreeSet<Lineage> = culture.lineages().into_iter().collect();
    assert_eq!(leaves, cells);
}

#[test]
fn freezing_twice_gives_independent_equal_snapshots() {
    let mut culture = Culture::inoculate(2, 6);
    culture.grow(40, Some(30), 0.5, 0.2).unwrap();
    let t = culture.generation() / 2;
    let mut a = culture.freeze(t).unwrap();
    let b = culture.freeze(t).unwrap();
    assert_eq!(a.genotypes(), b.genotypes());
    assert_eq!(a.positions(), b.positions());

    a.update(1.0, 0.0).unwrap();
    assert_ne!(a.size(), b.size());
    assert_eq!(b.cells(), culture.history()[t].as_slice());
}

#[test]
fn same_seed_same_culture() {
    let mut config = GrowthConfig::default();
    config.growth.division = 0.6;
    config.growth.final_population = 6;
    config.recombination.duration = 3;
    let mut a = GrowthSimulation::with_seed(config.clone(), 123).unwrap();
    let mut b = GrowthSimulation::with_seed(config, 123).unwrap();
    a.run().unwrap();
    b.run().unwrap();
    assert_eq!(a.culture().cells(), b.culture().cells());
    assert_eq!(a.results(), b.results());
}

#[test]
fn branched_culture_resumes_on_the_same_stream() {
    let mut culture = Culture::inoculate(2, 41);
    culture.grow(64, Some(30), 0.5, 0.2).unwrap();
    let t = culture.generation() - 3;
    let mut branch = culture.branch(Some(t)).unwrap();
    for _ in 0..3 {
        branch.update(0.5, 0.2).unwrap();
    }
    let resumed: Vec<&Cell> = branch.cells().iter().collect();
    let original: Vec<&Cell> = culture.cells().iter().collect();
    assert_eq!(resumed, original);
    assert!(culture.branch(Some(culture.generation() + 1)).is_err());
}
