/// Floor applied to linear magnitudes before taking the logarithm, so a
/// silent bin maps to -200 dB instead of -infinity.
pub const MAGNITUDE_FLOOR: f64 = 1e-10;

/// Convert a linear magnitude to dB: 20 * log10(max(mag, floor)).
pub fn amplitude_to_db(magnitude: f64) -> f64 {
    20.0 * magnitude.max(MAGNITUDE_FLOOR).log10()
}

/// Inverse of `amplitude_to_db` (without the floor): 10^(dB / 20).
pub fn db_to_amplitude(db: f64) -> f64 {
    10.0_f64.powf(db / 20.0)
}

/// Arithmetic mean. Returns 0.0 for an empty slice.
pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Population variance (divides by N, like numpy's default).
/// Returns 0.0 for an empty slice.
pub fn variance(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let m = mean(values);
    values.iter().map(|&v| (v - m).powi(2)).sum::<f64>() / values.len() as f64
}

/// Index of the first maximum. NaN values never win.
pub fn argmax(values: &[f64]) -> Option<usize> {
    let mut best: Option<(usize, f64)> = None;
    for (i, &v) in values.iter().enumerate() {
        match best {
            Some((_, b)) if !(v > b) => {}
            _ if v.is_nan() => {}
            _ => best = Some((i, v)),
        }
    }
    best.map(|(i, _)| i)
}

/// Index of the first minimum. NaN values never win.
pub fn argmin(values: &[f64]) -> Option<usize> {
    let mut best: Option<(usize, f64)> = None;
    for (i, &v) in values.iter().enumerate() {
        match best {
            Some((_, b)) if !(v < b) => {}
            _ if v.is_nan() => {}
            _ => best = Some((i, v)),
        }
    }
    best.map(|(i, _)| i)
}

/// Number of elements strictly less than `value` in an ascending slice
/// (numpy's `searchsorted(..., side="left")`).
pub fn search_sorted(sorted: &[f64], value: f64) -> usize {
    sorted.partition_point(|&x| x < value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn amplitude_to_db_unity() {
        assert!((amplitude_to_db(1.0) - 0.0).abs() < 1e-12);
    }

    #[test]
    fn amplitude_to_db_half_scale() {
        // 20*log10(0.5) ≈ -6.02 dB
        assert!((amplitude_to_db(0.5) - (-6.0206)).abs() < 1e-3);
    }

    #[test]
    fn amplitude_to_db_silence_is_floored() {
        assert!((amplitude_to_db(0.0) - (-200.0)).abs() < 1e-9);
        assert!(amplitude_to_db(0.0).is_finite());
    }

    #[test]
    fn db_roundtrip_near_unity() {
        let db = amplitude_to_db(0.25);
        assert!((db_to_amplitude(db) - 0.25).abs() < 1e-12);
    }

    #[test]
    fn variance_matches_population_formula() {
        let v = [2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0];
        assert!((variance(&v) - 4.0).abs() < 1e-12);
        assert_eq!(variance(&[]), 0.0);
    }

    #[test]
    fn argmax_keeps_first_of_equal_values() {
        assert_eq!(argmax(&[1.0, 3.0, 3.0, 2.0]), Some(1));
        assert_eq!(argmax(&[]), None);
    }

    #[test]
    fn argmin_skips_nan() {
        assert_eq!(argmin(&[f64::NAN, 2.0, 1.0, 1.0]), Some(2));
    }

    #[test]
    fn search_sorted_left_side() {
        let axis = [0.0, 10.0, 20.0, 30.0];
        assert_eq!(search_sorted(&axis, 10.0), 1);
        assert_eq!(search_sorted(&axis, 15.0), 2);
        assert_eq!(search_sorted(&axis, -1.0), 0);
        assert_eq!(search_sorted(&axis, 99.0), 4);
    }
}
