//! Weighted sampling without replacement over the restaurant list.
//!
//! A cumulative-weight array is built once; each round picks a uniform point
//! in `[0, total)`, binary-searches its bucket, emits that entry and
//! subtracts its weight from every cumulative entry at or after it. Entries
//! already drawn (and zero-weight entries) have zero bucket width and cannot
//! be hit while any positive weight remains; once the remaining total is
//! zero the draw degenerates to uniform sampling over what is left, so
//! zero-weight entries are still drawable, just last.

use rand::Rng;

use crate::record::Restaurant;

/// Draws `min(n, list.len())` distinct entries, in weighted random order,
/// using the thread-local RNG.
pub fn draw(list: &[Restaurant], n: usize) -> Vec<Restaurant> {
    draw_with(&mut rand::thread_rng(), list, n)
}

/// [`draw`] with an injected RNG; tests use a seeded `StdRng`.
pub fn draw_with<R: Rng + ?Sized>(rng: &mut R, list: &[Restaurant], n: usize) -> Vec<Restaurant> {
    let count = n.min(list.len());
    let mut cumulative: Vec<u64> = Vec::with_capacity(list.len());
    let mut total: u64 = 0;
    for entry in list {
        total += entry.effective_weight();
        cumulative.push(total);
    }

    let mut taken = vec![false; list.len()];
    let mut drawn = Vec::with_capacity(count);
    for _ in 0..count {
        let index = if total > 0 {
            let pivot = rng.gen_range(0..total);
            cumulative.partition_point(|&c| c <= pivot)
        } else {
            let remaining: Vec<usize> = (0..list.len()).filter(|&i| !taken[i]).collect();
            remaining[rng.gen_range(0..remaining.len())]
        };
        debug_assert!(!taken[index]);
        taken[index] = true;

        let weight = list[index].effective_weight();
        for c in cumulative.iter_mut().skip(index) {
            *c -= weight;
        }
        total -= weight;
        drawn.push(list[index].clone());
    }
    drawn
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use rand::SeedableRng;
    use rand::rngs::StdRng;

    use super::*;

    fn weighted(name: &str, weight: i64) -> Restaurant {
        Restaurant::new(name, weight)
    }

    #[test]
    fn empty_list_draws_nothing() {
        let mut rng = StdRng::seed_from_u64(1);
        assert!(draw_with(&mut rng, &[], 3).is_empty());
    }

    #[test]
    fn draw_never_duplicates() {
        let list: Vec<Restaurant> = (0..10)
            .map(|i| weighted(&format!("r{i}"), i % 4))
            .collect();
        let mut rng = StdRng::seed_from_u64(2);
        for _ in 0..200 {
            let drawn = draw_with(&mut rng, &list, 6);
            assert_eq!(drawn.len(), 6);
            let ids: HashSet<&str> = drawn.iter().map(|r| r.id.as_str()).collect();
            assert_eq!(ids.len(), 6);
        }
    }

    #[test]
    fn oversized_n_returns_full_permutation() {
        let list = vec![weighted("a", 5), weighted("b", 0), weighted("c", -3)];
        let mut rng = StdRng::seed_from_u64(3);
        let drawn = draw_with(&mut rng, &list, 99);
        assert_eq!(drawn.len(), 3);
        let ids: HashSet<&str> = drawn.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids.len(), 3);
    }

    #[test]
    fn absurd_weights_draw_without_overflow() {
        // Effective weights are capped, so even several maximal raw weights
        // cannot overflow the cumulative sum.
        let list = vec![
            weighted("a", i64::MAX),
            weighted("b", i64::MAX),
            weighted("c", i64::MAX),
        ];
        let mut rng = StdRng::seed_from_u64(9);
        let drawn = draw_with(&mut rng, &list, 3);
        assert_eq!(drawn.len(), 3);
        let ids: HashSet<&str> = drawn.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids.len(), 3);
    }

    #[test]
    fn heavier_entry_wins_in_expected_proportion() {
        let list = vec![weighted("heavy", 10), weighted("light", 1)];
        let mut rng = StdRng::seed_from_u64(4);
        let trials = 20_000;
        let mut heavy_first = 0;
        for _ in 0..trials {
            if draw_with(&mut rng, &list, 1)[0].name == "heavy" {
                heavy_first += 1;
            }
        }
        // Expected 10/11 ≈ 0.909; allow a generous band for a seeded run.
        let observed = heavy_first as f64 / trials as f64;
        assert!(
            (0.88..0.94).contains(&observed),
            "observed heavy frequency {observed}"
        );
    }

    #[test]
    fn all_zero_weights_degenerate_to_uniform() {
        let list = vec![weighted("a", 0), weighted("b", 0), weighted("c", 0)];
        let mut rng = StdRng::seed_from_u64(5);
        let trials = 9_000;
        let mut first_counts = [0usize; 3];
        for _ in 0..trials {
            let drawn = draw_with(&mut rng, &list, 3);
            assert_eq!(drawn.len(), 3);
            let first = list.iter().position(|r| r.id == drawn[0].id).unwrap();
            first_counts[first] += 1;
        }
        for count in first_counts {
            let share = count as f64 / trials as f64;
            assert!(
                (0.28..0.39).contains(&share),
                "uniform share out of band: {share}"
            );
        }
    }

    #[test]
    fn zero_weight_entry_trails_weighted_entries() {
        // Weights [10, 1, 0]: the zero-weight entry can only appear once all
        // positive weight is exhausted, i.e. never before position 2 here.
        let list = vec![weighted("a", 10), weighted("b", 1), weighted("c", 0)];
        let mut rng = StdRng::seed_from_u64(6);
        let trials = 1_000;
        let mut a_in_top2 = 0;
        let mut c_in_top2 = 0;
        for _ in 0..trials {
            let drawn = draw_with(&mut rng, &list, 2);
            if drawn.iter().any(|r| r.name == "a") {
                a_in_top2 += 1;
            }
            if drawn.iter().any(|r| r.name == "c") {
                c_in_top2 += 1;
            }
        }
        assert_eq!(c_in_top2, 0);
        assert!(a_in_top2 > trials * 9 / 10, "a appeared {a_in_top2} times");
    }
}
