use super::polyfit;

/// Bisection steps on log(lambda). Each step halves the bracket in log
/// space, so 200 steps is far beyond f64 resolution.
const MAX_BISECTIONS: usize = 200;

/// Decades λ may move away from its starting guess while bracketing.
const MAX_BRACKET_STEPS: usize = 40;

/// Relative tolerance on the residual sum of squares.
const RSS_TOLERANCE: f64 = 1e-9;

/// Cubic smoothing spline with a residual budget.
///
/// Returns the values at `xs` of the smoothest natural cubic spline g
/// (minimal ∫g''²) whose residual sum of squares Σ(y - g(x))² does not
/// exceed `s`:
///   - `s <= 0` gives the interpolating spline (the input itself)
///   - a budget at least as large as the least-squares cubic's residual
///     gives that cubic (a straight line for 3 points)
///   - anything in between is solved for the penalty weight λ in
///     (R + λ QᵀQ) γ = Qᵀy, g = y - λ Q γ (Reinsch's algorithm), with λ
///     found by bisection so that the residual matches `s`.
///
/// `xs` must be strictly increasing. Returns None for fewer than 3 points,
/// non-finite input, repeated x values or a numerically failed solve.
pub fn smoothing_spline(xs: &[f64], ys: &[f64], s: f64) -> Option<Vec<f64>> {
    let n = xs.len();
    if n < 3 || ys.len() != n {
        return None;
    }
    if xs.iter().chain(ys).any(|v| !v.is_finite()) || !s.is_finite() {
        return None;
    }

    let h: Vec<f64> = xs.windows(2).map(|w| w[1] - w[0]).collect();
    if h.iter().any(|&step| step <= 0.0) {
        return None;
    }

    if s <= 0.0 {
        return Some(ys.to_vec());
    }

    // Polynomial without interior knots, kept whenever it meets the budget
    let degree = if n >= 4 { 3 } else { 1 };
    let poly = polyfit::fit(xs, ys, degree).or_else(|| polyfit::fit(xs, ys, 1))?;
    let baseline: Vec<f64> = xs.iter().map(|&x| poly.eval(x)).collect();
    if residual(ys, &baseline) <= s {
        return Some(baseline);
    }

    let system = Reinsch::new(&h, ys);

    // Bracket the root, starting from a λ on the natural scale of the
    // problem (R ~ h, QᵀQ ~ 1/h²).
    let mean_h = h.iter().sum::<f64>() / h.len() as f64;
    let mut lo = mean_h.powi(3);
    let mut hi = lo;

    let (mut fitted, mut rss) = system.fit(hi)?;
    let mut expansions = 0;
    while rss < s {
        if expansions > MAX_BRACKET_STEPS {
            return Some(baseline);
        }
        lo = hi;
        hi *= 10.0;
        (fitted, rss) = system.fit(hi)?;
        expansions += 1;
    }
    if lo == hi {
        let mut contractions = 0;
        loop {
            lo /= 10.0;
            let (_, low_rss) = system.fit(lo)?;
            if low_rss <= s {
                break;
            }
            contractions += 1;
            if contractions > MAX_BRACKET_STEPS {
                return Some(ys.to_vec());
            }
        }
    }

    for _ in 0..MAX_BISECTIONS {
        if (rss - s).abs() <= RSS_TOLERANCE * s {
            break;
        }
        let mid = (lo * hi).sqrt();
        let (mid_fit, mid_rss) = system.fit(mid)?;
        if mid_rss > s {
            hi = mid;
        } else {
            lo = mid;
        }
        fitted = mid_fit;
        rss = mid_rss;
        if hi / lo - 1.0 < f64::EPSILON {
            break;
        }
    }

    Some(fitted)
}

fn residual(ys: &[f64], fitted: &[f64]) -> f64 {
    ys.iter().zip(fitted).map(|(y, g)| (y - g).powi(2)).sum()
}

/// The banded pieces of the Reinsch system that do not depend on λ.
struct Reinsch<'a> {
    h: &'a [f64],
    /// 1/h
    inv_h: Vec<f64>,
    /// Qᵀy
    rhs: Vec<f64>,
    ys: &'a [f64],
}

impl<'a> Reinsch<'a> {
    fn new(h: &'a [f64], ys: &'a [f64]) -> Self {
        let inv_h: Vec<f64> = h.iter().map(|&step| 1.0 / step).collect();
        let m = ys.len() - 2;
        let rhs = (0..m)
            .map(|i| inv_h[i] * ys[i] - (inv_h[i] + inv_h[i + 1]) * ys[i + 1] + inv_h[i + 1] * ys[i + 2])
            .collect();
        Self { h, inv_h, rhs, ys }
    }

    /// Fitted values and residual sum of squares for penalty weight λ.
    fn fit(&self, lambda: f64) -> Option<(Vec<f64>, f64)> {
        let m = self.rhs.len();
        let (h, a) = (self.h, &self.inv_h);

        // Symmetric pentadiagonal R + λ QᵀQ: main, first and second diagonals
        let mut d = vec![0.0; m];
        let mut e = vec![0.0; m];
        let mut f = vec![0.0; m];
        for i in 0..m {
            d[i] = (h[i] + h[i + 1]) / 3.0
                + lambda * (a[i] * a[i] + (a[i] + a[i + 1]).powi(2) + a[i + 1] * a[i + 1]);
            if i + 1 < m {
                e[i] = h[i + 1] / 6.0
                    - lambda * a[i + 1] * ((a[i] + a[i + 1]) + (a[i + 1] + a[i + 2]));
            }
            if i + 2 < m {
                f[i] = lambda * a[i + 1] * a[i + 2];
            }
        }

        let gamma = solve_pentadiagonal(&d, &e, &f, &self.rhs)?;

        // Q γ, scattered column by column
        let n = self.ys.len();
        let mut q_gamma = vec![0.0; n];
        for (i, &g) in gamma.iter().enumerate() {
            q_gamma[i] += a[i] * g;
            q_gamma[i + 1] -= (a[i] + a[i + 1]) * g;
            q_gamma[i + 2] += a[i + 1] * g;
        }

        let fitted: Vec<f64> = self
            .ys
            .iter()
            .zip(&q_gamma)
            .map(|(&y, &qg)| y - lambda * qg)
            .collect();
        let rss = residual(self.ys, &fitted);

        (rss.is_finite() && fitted.iter().all(|v| v.is_finite())).then_some((fitted, rss))
    }
}

/// Solve a symmetric positive-definite pentadiagonal system by LDLᵀ.
///
/// `d` is the main diagonal, `e[i]` the entry (i, i+1) and `f[i]` the
/// entry (i, i+2).
fn solve_pentadiagonal(d: &[f64], e: &[f64], f: &[f64], b: &[f64]) -> Option<Vec<f64>> {
    let m = d.len();
    let mut diag = vec![0.0; m];
    // l1[i] = L(i+1, i), l2[i] = L(i+2, i)
    let mut l1 = vec![0.0; m];
    let mut l2 = vec![0.0; m];

    for i in 0..m {
        let mut di = d[i];
        if i >= 1 {
            di -= l1[i - 1] * l1[i - 1] * diag[i - 1];
        }
        if i >= 2 {
            di -= l2[i - 2] * l2[i - 2] * diag[i - 2];
        }
        if !(di > 0.0) || !di.is_finite() {
            return None;
        }
        diag[i] = di;

        if i + 1 < m {
            let mut ei = e[i];
            if i >= 1 {
                ei -= l2[i - 1] * l1[i - 1] * diag[i - 1];
            }
            l1[i] = ei / di;
        }
        if i + 2 < m {
            l2[i] = f[i] / di;
        }
    }

    // L z = b
    let mut z = vec![0.0; m];
    for i in 0..m {
        let mut zi = b[i];
        if i >= 1 {
            zi -= l1[i - 1] * z[i - 1];
        }
        if i >= 2 {
            zi -= l2[i - 2] * z[i - 2];
        }
        z[i] = zi;
    }

    // D Lᵀ x = z
    let mut x = vec![0.0; m];
    for i in (0..m).rev() {
        let mut xi = z[i] / diag[i];
        if i + 1 < m {
            xi -= l1[i] * x[i + 1];
        }
        if i + 2 < m {
            xi -= l2[i] * x[i + 2];
        }
        x[i] = xi;
    }

    Some(x)
}
