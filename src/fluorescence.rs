use crate::cell::Genotype;
use growth_common::FluorescenceConfig;
use rand::rngs::StdRng;
use rand::Rng;
use rand_distr::LogNormal;
use std::fmt::Debug;

/// Maps genotypes to a reporting phenotype. Never feeds back into growth.
pub trait PhenotypeModel: Debug + Send + Sync {
    fn phenotypes(&self, genotypes: &[Genotype], rng: &mut StdRng) -> anyhow::Result<Vec<f64>>;
}

/// Gene-dosage dependent fluorescence: each genotype draws its intensity from
/// its own log-normal distribution, located at `ln(mu[g])` with scale
/// `ambiguity`. Larger ambiguity widens the distributions until the three
/// dosages overlap.
#[derive(Debug, Clone)]
pub struct DosageFluorescence {
    config: FluorescenceConfig,
    loc: [f64; 3],
}

impl DosageFluorescence {
    pub fn new(config: FluorescenceConfig) -> anyhow::Result<Self> {
        if !(config.ambiguity >= 0.0) || !config.ambiguity.is_finite() {
            anyhow::bail!("Fluorescence ambiguity must be finite and non-negative, got {}.", config.ambiguity);
        }
        if let Some(mu) = config.mu.iter().find(|m| !(**m > 0.0) || !m.is_finite()) {
            anyhow::bail!("Fluorescence medians must be positive, got {}.", mu);
        }
        let loc = config.mu.map(f64::ln);
        Ok(DosageFluorescence { config, loc })
    }

    pub fn config(&self) -> &FluorescenceConfig {
        &self.config
    }

    /// Median intensity of the given genotype.
    pub fn median(&self, genotype: Genotype) -> f64 {
        self.config.mu[genotype.index()]
    }
}

impl Default for DosageFluorescence {
    fn default() -> Self {
        let config = FluorescenceConfig::default();
        let loc = config.mu.map(f64::ln);
        DosageFluorescence { config, loc }
    }
}

impl PhenotypeModel for DosageFluorescence {
    fn phenotypes(&self, genotypes: &[Genotype], rng: &mut StdRng) -> anyhow::Result<Vec<f64>> {
        let mut dists = Vec::with_capacity(self.loc.len());
        for loc in self.loc {
            let dist = LogNormal::new(loc, self.config.ambiguity)
                .map_err(|e| anyhow::anyhow!("Invalid fluorescence distribution: {}", e))?;
            dists.push(dist);
        }
        Ok(genotypes.iter().map(|g| rng.sample(&dists[g.index()])).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    #[test]
    fn intensities_follow_dosage() {
        let model = DosageFluorescence::default();
        let mut rng = StdRng::seed_from_u64(21);
        let genotypes: Vec<Genotype> = Genotype::ALL.iter().copied().cycle().take(3000).collect();
        let samples = model.phenotypes(&genotypes, &mut rng).unwrap();
        assert_eq!(samples.len(), genotypes.len());
        assert!(samples.iter().all(|s| *s > 0.0));

        let mut means = [0.0; 3];
        for (g, s) in genotypes.iter().zip(&samples) {
            means[g.index()] += s / 1000.0;
        }
        assert!(means[0] < means[1] && means[1] < means[2]);
        assert!((means[1] - 1.0).abs() < 0.05);
    }

    #[test]
    fn zero_ambiguity_is_deterministic() {
        let model = DosageFluorescence::new(FluorescenceConfig { ambiguity: 0.0, mu: [0.5, 1.0, 2.0] }).unwrap();
        let mut rng = StdRng::seed_from_u64(0);
        let samples = model.phenotypes(&[Genotype::HomozygousB, Genotype::HomozygousA], &mut rng).unwrap();
        assert!((samples[0] - model.median(Genotype::HomozygousB)).abs() < 1e-12);
        assert!((samples[1] - model.median(Genotype::HomozygousA)).abs() < 1e-12);
    }

    #[test]
    fn rejects_negative_ambiguity() {
        assert!(DosageFluorescence::new(FluorescenceConfig { ambiguity: -1.0, mu: [0.5, 1.0, 2.0] }).is_err());
    }
}
