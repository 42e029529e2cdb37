use crate::config::GenomeConfig;
use crate::engines::generation::node::{Action, Gene, GenomeTree, Predicate};
use crate::types::{Comparator, ServoState};
use rand::seq::SliceRandom;
use rand::Rng;

/// True with probability `percent / 100`
pub fn roll<R: Rng>(percent: u32, rng: &mut R) -> bool {
    rng.gen_range(0..100) < percent
}

/// Random Action or Conditional, weighted by `new_action_chance`
pub fn create_node<R: Rng>(config: &GenomeConfig, rng: &mut R) -> Gene {
    if roll(config.new_action_chance, rng) {
        Gene::Action(random_action(config, rng))
    } else {
        Gene::Conditional(random_predicate(config, rng))
    }
}

/// Action with 0..=`new_action_max_servos` distinct joints at random angles
pub fn random_action<R: Rng>(config: &GenomeConfig, rng: &mut R) -> Action {
    let count = rng.gen_range(0..=config.new_action_max_servos);
    let mut joints: Vec<usize> = (0..config.num_servos).collect();
    joints.shuffle(rng);

    let angles: ServoState = joints
        .into_iter()
        .take(count)
        .map(|joint| (joint, rng.gen_range(0..config.servo_max)))
        .collect();
    Action::new(angles)
}

pub fn random_predicate<R: Rng>(config: &GenomeConfig, rng: &mut R) -> Predicate {
    let slot = rng.gen_range(0..config.state_size);
    let threshold = rng.gen_range(0..config.servo_max);
    let comparator = if rng.gen_bool(0.5) {
        Comparator::AtLeast
    } else {
        Comparator::AtMost
    };
    Predicate::new(slot, comparator, threshold)
}

/// Random seed program of `mutate_min_size..=seed_max_size` nodes
pub fn random_genome<R: Rng>(config: &GenomeConfig, rng: &mut R) -> GenomeTree {
    let size = rng.gen_range(config.mutate_min_size..=config.seed_max_size.max(config.mutate_min_size));
    let mut tree = GenomeTree::new(create_node(config, rng));
    while tree.len() < size {
        let nodes = tree.preorder();
        let parent = nodes[rng.gen_range(0..nodes.len())];
        let gene = create_node(config, rng);
        tree.attach(parent, gene);
    }
    tree
}

/// Payload mutation, dispatched on the gene variant
pub fn mutate_gene<R: Rng>(gene: &mut Gene, config: &GenomeConfig, rng: &mut R) {
    match gene {
        Gene::Action(action) => mutate_action(action, config, rng),
        // Branch references live on the tree slot, so they survive the swap
        Gene::Conditional(predicate) => *predicate = random_predicate(config, rng),
    }
}

fn mutate_action<R: Rng>(action: &mut Action, config: &GenomeConfig, rng: &mut R) {
    for angle in action.angles.values_mut() {
        if roll(config.mutate_action_angle, rng) {
            *angle = rng.gen_range(0..config.servo_max);
        }
    }

    if roll(config.mutate_action_add_angle, rng) && action.angles.len() < config.num_servos {
        let free: Vec<usize> = (0..config.num_servos)
            .filter(|joint| !action.angles.contains_key(joint))
            .collect();
        if let Some(joint) = free.choose(rng) {
            action.angles.insert(*joint, rng.gen_range(0..config.servo_max));
        }
    }

    if roll(config.mutate_action_rem_angle, rng) && action.angles.len() > 1 {
        let joints: Vec<usize> = action.angles.keys().copied().collect();
        if let Some(joint) = joints.choose(rng) {
            action.angles.remove(joint);
        }
    }
}

/// Uniform partner from a pool of `pool_len`, never `own_rank` itself.
/// Requires `pool_len >= 2`.
pub fn uniform_partner<R: Rng>(own_rank: usize, pool_len: usize, rng: &mut R) -> usize {
    let idx = rng.gen_range(0..pool_len - 1);
    if idx >= own_rank {
        idx + 1
    } else {
        idx
    }
}

/// Rank-weighted partner: a candidate at rank `r` is accepted with
/// probability `(100 - r * (100 / pool_len)) / 100`.
///
/// The step is integer division, so pools larger than 100 get a step of 0
/// and every candidate is accepted (selection degenerates to uniform).
/// After `4 * pool_len` rejections the last candidate drawn is taken.
/// Requires `pool_len >= 2`.
pub fn rank_weighted_partner<R: Rng>(own_rank: usize, pool_len: usize, rng: &mut R) -> usize {
    let step = 100 / pool_len;
    let mut candidate = uniform_partner(own_rank, pool_len, rng);
    for _ in 0..pool_len * 4 {
        let acceptance = 100usize.saturating_sub(candidate * step);
        if rng.gen_range(0..100) < acceptance {
            return candidate;
        }
        candidate = uniform_partner(own_rank, pool_len, rng);
    }
    candidate
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_random_action_respects_bounds() {
        let config = GenomeConfig::default();
        let mut rng = StdRng::seed_from_u64(1);
        for _ in 0..200 {
            let action = random_action(&config, &mut rng);
            assert!(action.angles.len() <= config.new_action_max_servos);
            for (joint, angle) in &action.angles {
                assert!(*joint < config.num_servos);
                assert!(*angle < config.servo_max);
            }
        }
    }

    #[test]
    fn test_create_node_honours_action_chance() {
        let mut config = GenomeConfig::default();
        let mut rng = StdRng::seed_from_u64(2);

        config.new_action_chance = 100;
        assert!((0..50).all(|_| matches!(create_node(&config, &mut rng), Gene::Action(_))));

        config.new_action_chance = 0;
        for _ in 0..50 {
            match create_node(&config, &mut rng) {
                Gene::Conditional(p) => {
                    assert!(p.slot < config.state_size);
                    assert!(p.threshold < config.servo_max);
                }
                Gene::Action(_) => panic!("expected a conditional"),
            }
        }
    }

    #[test]
    fn test_random_genome_size_range() {
        let config = GenomeConfig { mutate_min_size: 3, seed_max_size: 7, ..GenomeConfig::default() };
        let mut rng = StdRng::seed_from_u64(3);
        for _ in 0..100 {
            let tree = random_genome(&config, &mut rng);
            assert!((3..=7).contains(&tree.len()));
            assert_eq!(tree.preorder().len(), tree.len());
        }
    }

    #[test]
    fn test_mutate_action_keeps_at_least_one_angle() {
        let config = GenomeConfig {
            mutate_action_angle: 100,
            mutate_action_add_angle: 0,
            mutate_action_rem_angle: 100,
            ..GenomeConfig::default()
        };
        let mut rng = StdRng::seed_from_u64(4);
        let mut gene = Gene::Action(Action::from([(0, 10), (1, 20), (2, 30)]));
        for _ in 0..10 {
            mutate_gene(&mut gene, &config, &mut rng);
        }
        match gene {
            Gene::Action(action) => assert_eq!(action.angles.len(), 1),
            Gene::Conditional(_) => panic!("variant must not change"),
        }
    }

    #[test]
    fn test_mutate_action_adds_only_free_joints() {
        let config = GenomeConfig {
            mutate_action_angle: 0,
            mutate_action_add_angle: 100,
            mutate_action_rem_angle: 0,
            ..GenomeConfig::default()
        };
        let mut rng = StdRng::seed_from_u64(5);
        let mut gene = Gene::Action(Action::from([(2, 99)]));
        for _ in 0..10 {
            mutate_gene(&mut gene, &config, &mut rng);
        }
        match gene {
            Gene::Action(action) => {
                assert_eq!(action.angles.len(), config.num_servos);
                assert_eq!(action.angles[&2], 99);
            }
            Gene::Conditional(_) => panic!("variant must not change"),
        }
    }

    #[test]
    fn test_partner_is_never_self() {
        let mut rng = StdRng::seed_from_u64(6);
        for pool_len in 2..12 {
            for own in 0..pool_len {
                for _ in 0..20 {
                    let u = uniform_partner(own, pool_len, &mut rng);
                    let w = rank_weighted_partner(own, pool_len, &mut rng);
                    assert!(u < pool_len && u != own);
                    assert!(w < pool_len && w != own);
                }
            }
        }
    }

    #[test]
    fn test_rank_weighting_favours_top_ranks() {
        let mut rng = StdRng::seed_from_u64(7);
        let pool_len = 10;
        let mut hits = vec![0usize; pool_len];
        for _ in 0..5000 {
            hits[rank_weighted_partner(pool_len - 1, pool_len, &mut rng)] += 1;
        }
        // acceptance 100% at rank 0 vs 20% at rank 8
        assert!(hits[0] > hits[8] * 2, "hits: {:?}", hits);
    }
}
