/// Local-maximum detection with scipy-style `prominence` and `distance`
/// criteria.
///
/// Same semantics as `scipy.signal.find_peaks`:
///
///   1. A peak is a sample strictly greater than its left neighbour and
///      strictly greater than the first differing sample to its right.
///      Flat tops (plateaus) report their middle sample (rounded down).
///      The first and last samples are never peaks.
///   2. `min_distance` removes lower peaks that sit closer than the given
///      number of samples to a higher one (higher peaks are processed
///      first; equal heights keep the rightmost).
///   3. `min_prominence` removes peaks whose prominence is below it.
///
/// Returns peak indices in ascending order.
pub fn find_peaks(signal: &[f64], min_prominence: Option<f64>, min_distance: usize) -> Vec<usize> {
    let mut peaks = local_maxima(signal);

    if min_distance > 1 && peaks.len() > 1 {
        peaks = select_by_distance(signal, &peaks, min_distance);
    }

    if let Some(threshold) = min_prominence {
        peaks.retain(|&p| prominence(signal, p) >= threshold);
    }

    peaks
}

/// Indices of all local maxima, including the midpoint of flat plateaus.
fn local_maxima(x: &[f64]) -> Vec<usize> {
    let mut peaks = Vec::new();
    if x.len() < 3 {
        return peaks;
    }

    let last = x.len() - 1;
    let mut i = 1;
    while i < last {
        if x[i - 1] < x[i] {
            // Walk across a possible plateau
            let mut ahead = i + 1;
            while ahead < last && x[ahead] == x[i] {
                ahead += 1;
            }
            if x[ahead] < x[i] {
                let left_edge = i;
                let right_edge = ahead - 1;
                peaks.push((left_edge + right_edge) / 2);
                i = ahead;
            }
        }
        i += 1;
    }

    peaks
}

/// Drop peaks closer than `distance` samples to a higher peak.
fn select_by_distance(x: &[f64], peaks: &[usize], distance: usize) -> Vec<usize> {
    let n = peaks.len();
    let mut keep = vec![true; n];

    // Stable sort by height ascending, then walk from the highest down.
    let mut order: Vec<usize> = (0..n).collect();
    order.sort_by(|&a, &b| x[peaks[a]].total_cmp(&x[peaks[b]]));

    for &j in order.iter().rev() {
        if !keep[j] {
            continue;
        }

        let mut k = j;
        while k > 0 && peaks[j] - peaks[k - 1] < distance {
            keep[k - 1] = false;
            k -= 1;
        }

        let mut k = j + 1;
        while k < n && peaks[k] - peaks[j] < distance {
            keep[k] = false;
            k += 1;
        }
    }

    peaks
        .iter()
        .zip(&keep)
        .filter_map(|(&p, &k)| k.then_some(p))
        .collect()
}

/// Topographic prominence of the peak at `peak`.
///
/// On each side we scan outward until a sample higher than the peak (or
/// the signal edge) is reached, tracking the minimum on the way. The higher
/// of the two minima is the reference base.
pub fn prominence(x: &[f64], peak: usize) -> f64 {
    let height = x[peak];

    let mut left_min = height;
    let mut i = peak;
    loop {
        if x[i] > height {
            break;
        }
        left_min = left_min.min(x[i]);
        if i == 0 {
            break;
        }
        i -= 1;
    }

    let mut right_min = height;
    for &v in &x[peak..] {
        if v > height {
            break;
        }
        right_min = right_min.min(v);
    }

    height - left_min.max(right_min)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finds_simple_peaks() {
        let signal = [0.0, 1.0, 0.0, 2.0, 0.0];
        assert_eq!(find_peaks(&signal, None, 1), vec![1, 3]);
    }

    #[test]
    fn edges_are_never_peaks() {
        let signal = [5.0, 1.0, 0.0, 1.0, 5.0];
        assert!(find_peaks(&signal, None, 1).is_empty());
    }

    #[test]
    fn plateau_reports_middle_sample() {
        let signal = [0.0, 1.0, 1.0, 1.0, 1.0, 0.0];
        // Plateau spans 1..=4, middle rounded down is 2
        assert_eq!(find_peaks(&signal, None, 1), vec![2]);
    }

    #[test]
    fn plateau_running_into_edge_is_not_a_peak() {
        let signal = [0.0, 1.0, 1.0, 1.0];
        assert!(find_peaks(&signal, None, 1).is_empty());
    }

    #[test]
    fn prominence_uses_higher_base() {
        // Peak at 3 (height 5). Left side runs to the edge (min 0), right
        // side stops at the higher sample 6 (min 3). Base = max(0, 3) = 3.
        let signal = [0.0, 1.0, 2.0, 5.0, 3.0, 6.0, 0.0];
        assert!((prominence(&signal, 3) - 2.0).abs() < 1e-12);
        // Highest peak: both sides run to the edges, base = max(0, 0)
        assert!((prominence(&signal, 5) - 6.0).abs() < 1e-12);
    }

    #[test]
    fn prominence_filter_drops_ripples() {
        let signal = [0.0, 10.0, 9.5, 9.8, 0.0];
        let peaks = find_peaks(&signal, Some(1.0), 1);
        assert_eq!(peaks, vec![1]);
    }

    #[test]
    fn distance_keeps_higher_peak() {
        let signal = [0.0, 3.0, 0.0, 5.0, 0.0, 0.0, 0.0, 4.0, 0.0];
        // Peaks at 1, 3, 7. With distance 3, peak 1 is within 2 of peak 3.
        assert_eq!(find_peaks(&signal, None, 3), vec![3, 7]);
    }

    #[test]
    fn distance_runs_before_prominence() {
        // The high neighbour suppresses the small peak even though the
        // small one would pass the prominence test.
        let signal = [0.0, 8.0, 2.0, 10.0, 0.0];
        assert_eq!(find_peaks(&signal, Some(1.0), 3), vec![3]);
    }

    #[test]
    fn too_short_signal_has_no_peaks() {
        assert!(find_peaks(&[1.0, 2.0], None, 1).is_empty());
        assert!(find_peaks(&[], Some(1.0), 5).is_empty());
    }
}
