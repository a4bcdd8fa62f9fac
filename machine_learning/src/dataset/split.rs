use rand::{Rng, seq::SliceRandom};

use crate::{MlErr, Result};

/// Randomly partitions the indices `0..len` into consecutive parts of `floor(fraction * len)`
/// indices each.
///
/// # Arguments
/// * `len` - The amount of samples to split.
/// * `fractions` - The share of every part, they must add up to at most one.
/// * `rng` - The random number generator used to shuffle the indices.
///
/// # Returns
/// One vec of indices per fraction, pairwise disjoint, or an error if the fractions are invalid.
pub fn random_split<R: Rng + ?Sized>(
    len: usize,
    fractions: &[f64],
    rng: &mut R,
) -> Result<Vec<Vec<usize>>> {
    if let Some(f) = fractions.iter().find(|f| !(0.0..=1.0).contains(*f)) {
        return Err(MlErr::InvalidConfig(format!(
            "split fraction {f} is not within [0, 1]"
        )));
    }

    let total: f64 = fractions.iter().sum();
    if total > 1. + 1e-6 {
        return Err(MlErr::InvalidConfig(format!(
            "split fractions add up to {total}"
        )));
    }

    let mut indices: Vec<usize> = (0..len).collect();
    indices.shuffle(rng);

    let mut rest = indices.as_slice();
    let parts = fractions
        .iter()
        .map(|f| {
            let n = ((f * len as f64) as usize).min(rest.len());
            let (part, tail) = rest.split_at(n);
            rest = tail;
            part.to_vec()
        })
        .collect();

    Ok(parts)
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use rand::{SeedableRng, rngs::StdRng};

    use super::*;

    #[test]
    fn ninety_ten() {
        let mut rng = StdRng::seed_from_u64(3);
        let parts = random_split(50_000, &[0.9, 0.1], &mut rng).unwrap();

        assert_eq!(parts[0].len(), 45_000);
        assert_eq!(parts[1].len(), 5_000);

        let train: HashSet<_> = parts[0].iter().collect();
        assert!(parts[1].iter().all(|i| !train.contains(i)));
        assert!(parts.iter().flatten().all(|&i| i < 50_000));
    }

    #[test]
    fn floors_every_part() {
        let mut rng = StdRng::seed_from_u64(3);
        let parts = random_split(11, &[0.5, 0.5], &mut rng).unwrap();

        assert_eq!(parts[0].len(), 5);
        assert_eq!(parts[1].len(), 5);
    }

    #[test]
    fn rejects_bad_fractions() {
        let mut rng = StdRng::seed_from_u64(3);

        assert!(random_split(10, &[0.9, 0.2], &mut rng).is_err());
        assert!(random_split(10, &[-0.1], &mut rng).is_err());
    }
}
