use super::polyfit;

/// Savitzky-Golay smoothing.
///
/// Each interior sample is replaced by the value at the window centre of
/// the least-squares polynomial of degree `polyorder` fitted to the
/// `window` samples around it. The first and last `window / 2` samples are
/// taken from the polynomial fitted to the first and last full window
/// respectively, so the output keeps the input's length.
///
/// `window` must be odd, larger than `polyorder`, and no longer than the
/// input. Returns None otherwise.
pub fn savitzky_golay(values: &[f64], window: usize, polyorder: usize) -> Option<Vec<f64>> {
    let n = values.len();
    if window % 2 == 0 || window <= polyorder || window > n {
        return None;
    }

    let half = window / 2;
    let offsets: Vec<f64> = (0..window).map(|i| i as f64 - half as f64).collect();
    let mut out = vec![0.0; n];

    for centre in half..n - half {
        let poly = polyfit::fit(&offsets, &values[centre - half..=centre + half], polyorder)?;
        out[centre] = poly.eval(0.0);
    }

    let head = polyfit::fit(&offsets, &values[..window], polyorder)?;
    for (i, slot) in out.iter_mut().take(half).enumerate() {
        *slot = head.eval(offsets[i]);
    }

    let tail = polyfit::fit(&offsets, &values[n - window..], polyorder)?;
    for i in 0..half {
        out[n - half + i] = tail.eval(offsets[half + 1 + i]);
    }

    Some(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn preserves_polynomials_up_to_order() {
        let values: Vec<f64> = (0..15).map(|i| 2.0 + 0.5 * i as f64 - 0.1 * (i * i) as f64).collect();
        let out = savitzky_golay(&values, 7, 2).unwrap();
        for (a, b) in out.iter().zip(&values) {
            assert!((a - b).abs() < 1e-9, "{a} vs {b}");
        }
    }

    #[test]
    fn known_coefficients_window_five() {
        // Quadratic window-5 kernel: (-3, 12, 17, 12, -3) / 35
        let values = [0.0, 0.0, 35.0, 0.0, 0.0, 0.0, 0.0];
        let out = savitzky_golay(&values, 5, 2).unwrap();
        assert!((out[2] - 17.0).abs() < 1e-9);
        assert!((out[3] - 12.0).abs() < 1e-9);
        assert!((out[4] + 3.0).abs() < 1e-9);
    }

    #[test]
    fn damps_alternating_noise() {
        let values: Vec<f64> = (0..20).map(|i| if i % 2 == 0 { 101.0 } else { 99.0 }).collect();
        let out = savitzky_golay(&values, 7, 2).unwrap();
        for v in &out[3..17] {
            assert!((v - 100.0).abs() < 1.0);
        }
    }

    #[test]
    fn rejects_bad_windows() {
        let values = [1.0; 10];
        assert!(savitzky_golay(&values, 6, 2).is_none());
        assert!(savitzky_golay(&values, 1, 2).is_none());
        assert!(savitzky_golay(&values, 11, 2).is_none());
        let out = savitzky_golay(&values, 3, 2).unwrap();
        assert!(out.iter().all(|v| (v - 1.0).abs() < 1e-12));
    }
}
