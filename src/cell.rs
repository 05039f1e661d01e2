use growth_common::{RecombinationPolicy, Vec2};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Chromosomal state of a cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum Genotype {
    HomozygousA = 0,
    Heterozygous = 1,
    HomozygousB = 2,
}

impl Genotype {
    pub const ALL: [Genotype; 3] = [Genotype::HomozygousA, Genotype::Heterozygous, Genotype::HomozygousB];

    pub fn as_u8(self) -> u8 {
        self as u8
    }

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn is_homozygous(self) -> bool {
        self != Genotype::Heterozygous
    }
}

impl TryFrom<u8> for Genotype {
    type Error = anyhow::Error;

    fn try_from(value: u8) -> anyhow::Result<Self> {
        match value {
            0 => Ok(Genotype::HomozygousA),
            1 => Ok(Genotype::Heterozygous),
            2 => Ok(Genotype::HomozygousB),
            other => anyhow::bail!("Invalid genotype {}; expected 0, 1 or 2.", other),
        }
    }
}

impl From<Genotype> for u8 {
    fn from(genotype: Genotype) -> u8 {
        genotype.as_u8()
    }
}

/// Sequence of division choices from the founder (`false` = first child).
///
/// Ordering is lexicographic with prefixes first, so sorting lineages walks
/// the phylogeny depth-first.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub struct Lineage(Vec<bool>);

impl Lineage {
    /// The founder's empty barcode.
    pub fn root() -> Self {
        Lineage(Vec::new())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn bits(&self) -> &[bool] {
        &self.0
    }

    /// Barcode of the child taking branch `bit`.
    pub fn child(&self, bit: bool) -> Self {
        let mut bits = Vec::with_capacity(self.0.len() + 1);
        bits.extend_from_slice(&self.0);
        bits.push(bit);
        Lineage(bits)
    }

    /// Barcode one division closer to the founder; `None` for the root.
    pub fn parent(&self) -> Option<Self> {
        if self.0.is_empty() {
            None
        } else {
            Some(Lineage(self.0[..self.0.len() - 1].to_vec()))
        }
    }

    pub fn is_prefix_of(&self, other: &Lineage) -> bool {
        other.0.starts_with(&self.0)
    }

    /// Parses a string of '0' and '1' characters.
    pub fn parse(s: &str) -> anyhow::Result<Self> {
        s.chars()
            .map(|c| match c {
                '0' => Ok(false),
                '1' => Ok(true),
                other => Err(anyhow::anyhow!("Invalid lineage character '{}' in '{}'.", other, s)),
            })
            .collect::<anyhow::Result<Vec<bool>>>()
            .map(Lineage)
    }
}

impl From<Vec<bool>> for Lineage {
    fn from(bits: Vec<bool>) -> Self {
        Lineage(bits)
    }
}

impl fmt::Display for Lineage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for bit in &self.0 {
            f.write_str(if *bit { "1" } else { "0" })?;
        }
        Ok(())
    }
}

/// A single cell. Its generation is the length of its lineage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cell {
    genotype: Genotype,
    lineage: Lineage,
    xy: Vec2,
}

impl Cell {
    pub fn new(genotype: Genotype, lineage: Lineage, xy: Vec2) -> Self {
        Cell { genotype, lineage, xy }
    }

    /// Heterozygous founder at the origin.
    pub fn founder() -> Self {
        Cell::new(Genotype::Heterozygous, Lineage::root(), Vec2::zero())
    }

    pub fn genotype(&self) -> Genotype {
        self.genotype
    }

    pub fn lineage(&self) -> &Lineage {
        &self.lineage
    }

    pub fn generation(&self) -> u32 {
        self.lineage.len() as u32
    }

    pub fn xy(&self) -> Vec2 {
        self.xy
    }

    pub fn set_xy(&mut self, xy: Vec2) {
        self.xy = xy;
    }

    /// Splits the cell into two children at the parent's position.
    ///
    /// A heterozygous parent recombines with probability `recombination`,
    /// after which `policy` decides the children's homozygous states.
    /// `recombination` must lie in [0, 1].
    pub fn divide<R: Rng + ?Sized>(
        &self,
        recombination: f64,
        policy: RecombinationPolicy,
        rng: &mut R,
    ) -> [Cell; 2] {
        let (first, second) = if self.genotype == Genotype::Heterozygous && rng.random::<f64>() < recombination {
            resolve_recombination(policy, rng)
        } else {
            (self.genotype, self.genotype)
        };

        [
            Cell::new(first, self.lineage.child(false), self.xy),
            Cell::new(second, self.lineage.child(true), self.xy),
        ]
    }

    /// Divides every cell of this subtree synchronously until `max_generation`
    /// doublings have occurred, returning the leaves in lineage order.
    pub fn grow<R: Rng + ?Sized>(
        &self,
        max_generation: u32,
        recombination: f64,
        policy: RecombinationPolicy,
        rng: &mut R,
    ) -> Vec<Cell> {
        let mut cells = vec![self.clone()];
        for _ in 0..max_generation {
            cells = cells
                .iter()
                .flat_map(|cell| cell.divide(recombination, policy, rng))
                .collect();
        }
        cells
    }
}

fn homozygous<R: Rng + ?Sized>(rng: &mut R) -> Genotype {
    if rng.random_bool(0.5) {
        Genotype::HomozygousB
    } else {
        Genotype::HomozygousA
    }
}

fn resolve_recombination<R: Rng + ?Sized>(policy: RecombinationPolicy, rng: &mut R) -> (Genotype, Genotype) {
    match policy {
        RecombinationPolicy::Independent => (homozygous(rng), homozygous(rng)),
        RecombinationPolicy::Shared => {
            let g = homozygous(rng);
            (g, g)
        }
        RecombinationPolicy::Reciprocal => {
            if rng.random_bool(0.5) {
                (Genotype::HomozygousA, Genotype::HomozygousB)
            } else {
                (Genotype::HomozygousB, Genotype::HomozygousA)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn children_extend_lineage_and_copy_position() {
        let mut rng = StdRng::seed_from_u64(7);
        let mut parent = Cell::founder();
        parent.set_xy(Vec2::new(0.25, -0.5));
        let [a, b] = parent.divide(0.0, RecombinationPolicy::Independent, &mut rng);
        assert_eq!(a.lineage().to_string(), "0");
        assert_eq!(b.lineage().to_string(), "1");
        assert_eq!(a.generation(), 1);
        assert_eq!(b.xy(), parent.xy());
        assert_eq!(a.genotype(), Genotype::Heterozygous);
    }

    #[test]
    fn certain_recombination_makes_both_children_homozygous() {
        let mut rng = StdRng::seed_from_u64(11);
        for policy in [RecombinationPolicy::Independent, RecombinationPolicy::Shared, RecombinationPolicy::Reciprocal] {
            for _ in 0..50 {
                let [a, b] = Cell::founder().divide(1.0, policy, &mut rng);
                assert!(a.genotype().is_homozygous());
                assert!(b.genotype().is_homozygous());
                match policy {
                    RecombinationPolicy::Shared => assert_eq!(a.genotype(), b.genotype()),
                    RecombinationPolicy::Reciprocal => assert_ne!(a.genotype(), b.genotype()),
                    RecombinationPolicy::Independent => {}
                }
            }
        }
    }

    #[test]
    fn homozygous_parents_never_change() {
        let mut rng = StdRng::seed_from_u64(3);
        for genotype in [Genotype::HomozygousA, Genotype::HomozygousB] {
            let parent = Cell::new(genotype, Lineage::root(), Vec2::zero());
            for _ in 0..20 {
                let [a, b] = parent.divide(1.0, RecombinationPolicy::Independent, &mut rng);
                assert_eq!(a.genotype(), genotype);
                assert_eq!(b.genotype(), genotype);
            }
        }
    }

    #[test]
    fn independent_policy_produces_both_outcomes() {
        let mut rng = StdRng::seed_from_u64(99);
        let mut seen = [false; 3];
        for _ in 0..200 {
            for child in Cell::founder().divide(1.0, RecombinationPolicy::Independent, &mut rng) {
                seen[child.genotype().index()] = true;
            }
        }
        assert_eq!(seen, [true, false, true]);
    }

    #[test]
    fn grow_doubles_synchronously() {
        let mut rng = StdRng::seed_from_u64(1);
        let cells = Cell::founder().grow(3, 0.0, RecombinationPolicy::Independent, &mut rng);
        assert_eq!(cells.len(), 8);
        assert!(cells.iter().all(|c| c.generation() == 3 && c.lineage().len() == 3));
        let barcodes: Vec<String> = cells.iter().map(|c| c.lineage().to_string()).collect();
        assert_eq!(barcodes[0], "000");
        assert_eq!(barcodes[7], "111");
    }

    #[test]
    fn lineage_parsing_and_prefixes() {
        let lineage = Lineage::parse("0110").unwrap();
        assert_eq!(lineage.len(), 4);
        assert_eq!(lineage.parent().unwrap().to_string(), "011");
        assert!(Lineage::parse("01").unwrap().is_prefix_of(&lineage));
        assert!(Lineage::root().is_prefix_of(&lineage));
        assert!(Lineage::root().parent().is_none());
        assert!(Lineage::parse("012").is_err());
        assert!(Genotype::try_from(3).is_err());
    }
}
