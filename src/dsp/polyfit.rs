/// A polynomial in ascending-power form: c0 + c1*x + c2*x^2 + ...
#[derive(Debug, Clone, PartialEq)]
pub struct Polynomial {
    coeffs: Vec<f64>,
}

impl Polynomial {
    pub fn coeffs(&self) -> &[f64] {
        &self.coeffs
    }

    pub fn degree(&self) -> usize {
        self.coeffs.len().saturating_sub(1)
    }

    /// Evaluate with Horner's scheme.
    pub fn eval(&self, x: f64) -> f64 {
        self.coeffs.iter().rev().fold(0.0, |acc, &c| acc * x + c)
    }
}

/// Relative pivot size below which the system is treated as singular.
const SINGULAR_PIVOT: f64 = 1e-12;

/// Least-squares polynomial fit of `ys` against `xs`.
///
/// The Vandermonde columns are scaled to unit norm before forming the
/// normal equations, which keeps the system well conditioned for the low
/// orders used here. Returns None when the fit is singular (too few
/// distinct x values for the requested order) or produces non-finite
/// coefficients.
pub fn fit(xs: &[f64], ys: &[f64], order: usize) -> Option<Polynomial> {
    let n = xs.len();
    let m = order + 1;
    if n != ys.len() || n < m {
        return None;
    }

    // Column norms of the Vandermonde matrix
    let mut scale = vec![0.0; m];
    for &x in xs {
        let mut p = 1.0;
        for s in scale.iter_mut() {
            *s += p * p;
            p *= x;
        }
    }
    for s in scale.iter_mut() {
        *s = s.sqrt();
        if *s == 0.0 || !s.is_finite() {
            return None;
        }
    }

    // Normal equations on the scaled columns: [N | b]
    let mut aug = vec![vec![0.0; m + 1]; m];
    for (&x, &y) in xs.iter().zip(ys) {
        let row: Vec<f64> = (0..m).map(|j| x.powi(j as i32) / scale[j]).collect();
        for i in 0..m {
            for j in 0..m {
                aug[i][j] += row[i] * row[j];
            }
            aug[i][m] += row[i] * y;
        }
    }

    let z = solve(aug)?;
    let coeffs: Vec<f64> = z.iter().zip(&scale).map(|(c, s)| c / s).collect();

    coeffs
        .iter()
        .all(|c| c.is_finite())
        .then_some(Polynomial { coeffs })
}

/// Gaussian elimination with partial pivoting on an augmented matrix.
fn solve(mut aug: Vec<Vec<f64>>) -> Option<Vec<f64>> {
    let m = aug.len();

    for col in 0..m {
        let pivot_row = (col..m).max_by(|&a, &b| aug[a][col].abs().total_cmp(&aug[b][col].abs()))?;
        if !(aug[pivot_row][col].abs() > SINGULAR_PIVOT) {
            return None;
        }
        aug.swap(col, pivot_row);

        for row in col + 1..m {
            let factor = aug[row][col] / aug[col][col];
            if factor == 0.0 {
                continue;
            }
            for k in col..=m {
                aug[row][k] -= factor * aug[col][k];
            }
        }
    }

    let mut x = vec![0.0; m];
    for row in (0..m).rev() {
        let tail: f64 = (row + 1..m).map(|k| aug[row][k] * x[k]).sum();
        x[row] = (aug[row][m] - tail) / aug[row][row];
    }

    Some(x)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recovers_exact_quadratic() {
        let xs: Vec<f64> = (-5..=5).map(|i| i as f64 * 0.1).collect();
        let ys: Vec<f64> = xs.iter().map(|&x| 3.0 - 2.0 * x + 0.5 * x * x).collect();
        let poly = fit(&xs, &ys, 2).unwrap();
        let c = poly.coeffs();
        assert!((c[0] - 3.0).abs() < 1e-9);
        assert!((c[1] + 2.0).abs() < 1e-9);
        assert!((c[2] - 0.5).abs() < 1e-9);
    }

    #[test]
    fn linear_fit_of_noisy_line_is_least_squares() {
        let xs = [0.0, 1.0, 2.0, 3.0];
        let ys = [1.0, 3.0, 2.0, 4.0];
        let poly = fit(&xs, &ys, 1).unwrap();
        // Closed form: slope = 0.8, intercept = 1.3
        assert!((poly.coeffs()[1] - 0.8).abs() < 1e-10);
        assert!((poly.coeffs()[0] - 1.3).abs() < 1e-10);
    }

    #[test]
    fn repeated_x_is_singular() {
        let xs = [1.0, 1.0, 1.0, 1.0];
        let ys = [1.0, 2.0, 3.0, 4.0];
        assert!(fit(&xs, &ys, 1).is_none());
    }

    #[test]
    fn too_few_points_for_order() {
        assert!(fit(&[0.0, 1.0], &[0.0, 1.0], 2).is_none());
    }

    #[test]
    fn horner_evaluation() {
        let poly = Polynomial { coeffs: vec![1.0, 0.0, 2.0] };
        assert_eq!(poly.eval(3.0), 19.0);
        assert_eq!(poly.degree(), 2);
    }
}
