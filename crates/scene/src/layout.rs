use crate::pet::Pet;
use petyard_common::Contributor;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use std::f32::consts::TAU;

/// Most pets ever placed in one scene.
pub const MAX_PETS: usize = 12;

const ANGLE_JITTER: f32 = 0.5;
const BASE_RADIUS: f32 = 3.0;
const BAND_STEP: f32 = 3.0;
const BAND_COUNT: usize = 3;
const RADIUS_JITTER: f32 = 2.0;

/// Initial ground position of one pet plus the seed for its own RNG.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Placement {
    pub x: f32,
    pub z: f32,
    pub seed: u64,
}

/// Largest contribution count in the batch, floored at 1.
pub fn max_contributions(contributors: &[Contributor]) -> u64 {
    contributors
        .iter()
        .map(|c| c.contributions)
        .max()
        .unwrap_or(0)
        .max(1)
}

/// Spread `count` pets around the origin: even angular steps plus jitter,
/// radius cycling through three bands plus jitter.
pub fn spiral_placements(count: usize, rng: &mut impl Rng) -> Vec<Placement> {
    (0..count)
        .map(|i| {
            let angle = i as f32 / count as f32 * TAU + rng.random::<f32>() * ANGLE_JITTER;
            let band = (i % BAND_COUNT) as f32;
            let radius = BASE_RADIUS + band * BAND_STEP + rng.random::<f32>() * RADIUS_JITTER;
            Placement {
                x: angle.cos() * radius,
                z: angle.sin() * radius,
                seed: rng.random(),
            }
        })
        .collect()
}

/// Build one pet per contributor, in order, capped at `max_pets`.
///
/// Scale is normalised against the whole batch, including contributors past the cap.
pub fn spawn_pets(contributors: &[Contributor], max_pets: usize, seed: u64) -> Vec<Pet> {
    let count = contributors.len().min(max_pets);
    let max = max_contributions(contributors);
    let mut rng = ChaCha8Rng::seed_from_u64(seed);

    let pets: Vec<Pet> = contributors
        .iter()
        .zip(spiral_placements(count, &mut rng))
        .map(|(c, p)| Pet::new(c, p.x, p.z, max, p.seed))
        .collect();

    tracing::debug!(
        available = contributors.len(),
        spawned = pets.len(),
        max_contributions = max,
        "pets spawned"
    );
    pets
}

#[cfg(test)]
mod tests {
    use super::*;

    fn batch(n: usize) -> Vec<Contributor> {
        (0..n)
            .map(|i| {
                Contributor::new(
                    format!("user{i}"),
                    i as u64,
                    format!("https://example.invalid/{i}.png"),
                    (n - i) as u64 * 10,
                )
            })
            .collect()
    }

    #[test]
    fn caps_at_twelve() {
        assert_eq!(spawn_pets(&batch(12), MAX_PETS, 0).len(), 12);
        assert_eq!(spawn_pets(&batch(30), MAX_PETS, 0).len(), 12);
    }

    #[test]
    fn fewer_than_cap_spawns_all() {
        for n in 0..MAX_PETS {
            assert_eq!(spawn_pets(&batch(n), MAX_PETS, 0).len(), n);
        }
    }

    #[test]
    fn keeps_contributor_order() {
        let pets = spawn_pets(&batch(5), MAX_PETS, 0);
        let logins: Vec<&str> = pets.iter().map(|p| p.login()).collect();
        assert_eq!(logins, vec!["user0", "user1", "user2", "user3", "user4"]);
    }

    #[test]
    fn demo_batch_scales() {
        let demo = vec![
            Contributor::new("octocat", 1, "https://github.com/octocat.png", 100),
            Contributor::new("github", 2, "https://github.com/github.png", 50),
            Contributor::new("torvalds", 3, "https://github.com/torvalds.png", 25),
        ];
        let pets = spawn_pets(&demo, MAX_PETS, 42);
        let scales: Vec<f32> = pets.iter().map(|p| p.scale()).collect();
        assert_eq!(pets.len(), 3);
        assert!((scales[0] - 2.0).abs() < 1e-6);
        assert!((scales[1] - 1.4).abs() < 1e-6);
        assert!((scales[2] - 1.1).abs() < 1e-6);
    }

    #[test]
    fn scale_uses_whole_batch_maximum() {
        let mut contributors = batch(3);
        contributors.push(Contributor::new("whale", 99, "https://example.invalid/w.png", 1_000));
        let pets = spawn_pets(&contributors, 3, 0);
        assert!(pets.iter().all(|p| p.scale() < 1.2));
    }

    #[test]
    fn placements_stay_in_radius_bands() {
        let mut rng = ChaCha8Rng::seed_from_u64(5);
        let placements = spiral_placements(MAX_PETS, &mut rng);
        for (i, p) in placements.iter().enumerate() {
            let r = (p.x * p.x + p.z * p.z).sqrt();
            let band_min = BASE_RADIUS + (i % BAND_COUNT) as f32 * BAND_STEP;
            assert!(r >= band_min - 1e-4 && r <= band_min + RADIUS_JITTER + 1e-4, "i={i} r={r}");
        }
    }

    #[test]
    fn same_seed_same_layout() {
        let a = spawn_pets(&batch(6), MAX_PETS, 9);
        let b = spawn_pets(&batch(6), MAX_PETS, 9);
        for (pa, pb) in a.iter().zip(&b) {
            assert_eq!(pa.position(), pb.position());
        }
    }

    #[test]
    fn max_contributions_floor() {
        assert_eq!(max_contributions(&[]), 1);
        assert_eq!(max_contributions(&batch(3)), 30);
    }
}
