use crate::config::GenomeConfig;
use crate::engines::generation::node::{Action, GenomeTree};
use crate::engines::generation::operators::{self, roll};
use crate::error::Result;
use crate::types::ServoState;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::hash_map::DefaultHasher;
use std::fmt;
use std::hash::{Hash, Hasher};

/// Structural fingerprint of a genome.
///
/// Two chromosomes with identical trees share an id, which is how the
/// population detects duplicates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct GenomeId(pub u64);

impl fmt::Display for GenomeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016x}", self.0)
    }
}

/// One candidate control program.
///
/// Immutable once built: `mutate` and `crossover` always hand back new
/// chromosomes and leave their receivers untouched.
#[derive(Debug, Clone)]
pub struct Chromosome {
    genome: GenomeTree,
    id: GenomeId,
}

impl Chromosome {
    pub fn new(genome: GenomeTree) -> Self {
        let mut hasher = DefaultHasher::new();
        genome.hash(&mut hasher);
        Self {
            id: GenomeId(hasher.finish()),
            genome,
        }
    }

    pub fn random<R: Rng>(config: &GenomeConfig, rng: &mut R) -> Self {
        Self::new(operators::random_genome(config, rng))
    }

    pub fn id(&self) -> GenomeId {
        self.id
    }

    pub fn genome(&self) -> &GenomeTree {
        &self.genome
    }

    pub fn node_count(&self) -> usize {
        self.genome.len()
    }

    /// Phenotype: the Actions this program executes for `state`
    pub fn actions(&self, state: &ServoState) -> Result<Vec<&Action>> {
        self.genome.phenotype(state)
    }

    /// Canonical text of one run: every executed Action as `joint:angle`
    /// pairs, all joined by `;`
    pub fn serialize(&self, state: &ServoState) -> Result<String> {
        let parts: Vec<String> = self.actions(state)?.iter().map(|a| a.serialize()).collect();
        Ok(parts.join(";"))
    }

    /// Clone the genome and mutate it.
    ///
    /// Every node present before mutation starts is visited once (in
    /// unconditional pre-order) and, with probability `percent_chance / 100`,
    /// may gain a random child, lose a random child subtree and have its
    /// payload re-rolled. The node count never drops below
    /// `mutate_min_size`, never grows past `mutate_max_size`, and a genome
    /// already above the cap sheds a child at every visited node.
    pub fn mutate<R: Rng>(&self, percent_chance: u32, config: &GenomeConfig, rng: &mut R) -> Chromosome {
        let mut genome = self.genome.clone();
        let visit = genome.preorder();

        for id in visit {
            // Lost together with an ancestor earlier in this pass
            if !genome.contains(id) {
                continue;
            }
            if !roll(percent_chance, rng) {
                continue;
            }

            if roll(config.mutate_chance_add, rng) && genome.len() < config.mutate_max_size {
                let gene = operators::create_node(config, rng);
                genome.attach(id, gene);
            }

            let lose = roll(config.mutate_chance_lose, rng);
            let over_cap = genome.len() > config.mutate_max_size;
            if over_cap || (lose && genome.len() > config.mutate_min_size) {
                let candidates: Vec<_> = genome
                    .held(id)
                    .into_iter()
                    .filter(|child| genome.len() - genome.subtree_size(*child) >= config.mutate_min_size)
                    .collect();
                if !candidates.is_empty() {
                    let victim = candidates[rng.gen_range(0..candidates.len())];
                    genome.remove_child(id, victim);
                }
            }

            if roll(config.mutate_chance_mutate, rng) {
                operators::mutate_gene(genome.gene_mut(id), config, rng);
            }
        }

        Chromosome::new(genome)
    }

    /// Exchange one random non-root subtree between copies of `self` and
    /// `partner`. Genomes with a single node cannot donate anything, so
    /// the copies come back unchanged.
    pub fn crossover<R: Rng>(&self, partner: &Chromosome, rng: &mut R) -> (Chromosome, Chromosome) {
        let mut left = self.genome.clone();
        let mut right = partner.genome.clone();

        if left.len() > 1 && right.len() > 1 {
            // Pre-order puts the root first; everything after it has a parent
            let left_nodes = left.preorder();
            let right_nodes = right.preorder();
            let a = left_nodes[rng.gen_range(1..left_nodes.len())];
            let b = right_nodes[rng.gen_range(1..right_nodes.len())];

            let from_left = left.extract(a);
            let from_right = right.extract(b);
            left.replace_subtree(a, &from_right, from_right.root());
            right.replace_subtree(b, &from_left, from_left.root());
        }

        (Chromosome::new(left), Chromosome::new(right))
    }
}

impl PartialEq for Chromosome {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id && self.genome == other.genome
    }
}

impl Eq for Chromosome {}

impl From<GenomeTree> for Chromosome {
    fn from(genome: GenomeTree) -> Self {
        Chromosome::new(genome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engines::generation::node::{Edge, Gene, Predicate};
    use crate::types::Comparator;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn state(pairs: &[(usize, u32)]) -> ServoState {
        pairs.iter().copied().collect()
    }

    #[test]
    fn test_single_action_serializes_as_itself() {
        let action = Action::from([(0, 512), (1, 256)]);
        let chromosome = Chromosome::new(GenomeTree::from(action.clone()));
        for s in [state(&[]), state(&[(0, 1), (1, 2)])] {
            assert_eq!(chromosome.actions(&s).unwrap(), vec![&action]);
            assert_eq!(chromosome.serialize(&s).unwrap(), "0:512;1:256");
        }
    }

    #[test]
    fn test_serialize_follows_decision() {
        let mut tree = GenomeTree::new(Gene::Conditional(Predicate::new(0, Comparator::AtLeast, 512)));
        let root = tree.root();
        tree.set_branch(root, Edge::Success, Gene::Action(Action::from([(0, 1)])));
        let failure = tree.set_branch(root, Edge::Failure, Gene::Action(Action::from([(1, 2)]))).unwrap();
        tree.add_child(failure, Gene::Action(Action::from([(2, 3), (3, 4)])));
        let chromosome = Chromosome::new(tree);

        assert_eq!(chromosome.serialize(&state(&[(0, 600)])).unwrap(), "0:1");
        assert_eq!(chromosome.serialize(&state(&[(0, 100)])).unwrap(), "1:2;2:3;3:4");
        assert!(chromosome.serialize(&state(&[(1, 100)])).is_err());
    }

    #[test]
    fn test_identical_genomes_share_identity() {
        let a = Chromosome::new(GenomeTree::from(Action::from([(0, 1)])));
        let b = Chromosome::new(GenomeTree::from(Action::from([(0, 1)])));
        let c = Chromosome::new(GenomeTree::from(Action::from([(0, 2)])));
        assert_eq!(a.id(), b.id());
        assert_ne!(a.id(), c.id());
        assert_eq!(a, b);
    }

    #[test]
    fn test_mutate_zero_is_identity() {
        let config = GenomeConfig::default();
        let mut rng = StdRng::seed_from_u64(11);
        for _ in 0..50 {
            let original = Chromosome::random(&config, &mut rng);
            let mutated = original.mutate(0, &config, &mut rng);
            assert_eq!(mutated, original);
        }
    }

    #[test]
    fn test_mutate_leaves_receiver_untouched() {
        let config = GenomeConfig::default();
        let mut rng = StdRng::seed_from_u64(12);
        let original = Chromosome::random(&config, &mut rng);
        let snapshot = original.genome().clone();
        for _ in 0..20 {
            let _ = original.mutate(100, &config, &mut rng);
        }
        assert_eq!(original.genome(), &snapshot);
    }

    #[test]
    fn test_single_node_crossover_returns_clones() {
        let mut rng = StdRng::seed_from_u64(13);
        let a = Chromosome::new(GenomeTree::from(Action::from([(0, 1)])));
        let b = Chromosome::new(GenomeTree::from(Action::from([(1, 2)])));
        let (x, y) = a.crossover(&b, &mut rng);
        assert_eq!(x, a);
        assert_eq!(y, b);
    }

    #[test]
    fn test_crossover_swaps_leaves_below_roots() {
        let mut rng = StdRng::seed_from_u64(14);
        let mut left = GenomeTree::from(Action::from([(0, 0)]));
        let root = left.root();
        left.add_child(root, Gene::Action(Action::from([(0, 1)])));
        let mut right = GenomeTree::from(Action::from([(1, 0)]));
        let root = right.root();
        right.add_child(root, Gene::Action(Action::from([(1, 1)])));

        let (x, y) = Chromosome::new(left).crossover(&Chromosome::new(right), &mut rng);
        assert_eq!(x.genome().to_formula(), "{0:0}+({1:1})");
        assert_eq!(y.genome().to_formula(), "{1:0}+({0:1})");
    }
}
