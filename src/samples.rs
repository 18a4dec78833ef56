use std::ops::Range;

use rand::Rng;

/// Uniformly distributed samples in `range`.
pub fn random_samples(len: usize, range: Range<f32>) -> Vec<f32> {
    let mut rng = rand::rng();
    (0..len).map(|_| rng.random_range(range.clone())).collect()
}

/// Smallest and largest non-NaN sample, or `None` if there is none.
pub fn min_and_max(samples: &[f32]) -> Option<(f32, f32)> {
    samples
        .iter()
        .copied()
        .filter(|x| !x.is_nan())
        .fold(None, |acc, x| match acc {
            None => Some((x, x)),
            Some((lo, hi)) => Some((lo.min(x), hi.max(x))),
        })
}

pub fn mean_squared_error(a: &[f32], b: &[f32]) -> f32 {
    assert_eq!(a.len(), b.len(), "Number of values must be equal");
    let n = a.len() as f32;
    a.iter()
        .zip(b.iter())
        .map(|(&x, &y)| (x - y).powi(2))
        .sum::<f32>()
        / n
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn random_samples_stay_in_range() {
        let samples = random_samples(1000, -2.0..3.0);
        assert_eq!(samples.len(), 1000);
        assert!(samples.iter().all(|&x| (-2.0..3.0).contains(&x)));
    }

    #[test]
    fn min_and_max_skips_nan() {
        assert_eq!(min_and_max(&[]), None);
        assert_eq!(min_and_max(&[f32::NAN]), None);
        assert_eq!(
            min_and_max(&[3.0, f32::NAN, -1.5, 7.25, 0.0]),
            Some((-1.5, 7.25))
        );
    }

    #[test]
    fn mse_of_known_values() {
        assert_eq!(mean_squared_error(&[1.0, 2.0], &[1.0, 4.0]), 2.0);
    }
}
