//! Peak picking on 1-D feature sequences.
//!
//! Follows the usual signal-processing contract:
//! 1. local maxima, with flat plateaus resolved to their midpoint
//! 2. distance filter: higher peaks win, lower peaks within `distance`
//!    samples of a kept peak are dropped
//! 3. prominence filter: keep peaks whose topographic prominence is at
//!    least `min_prominence`

/// Find peak indices in `x`, ascending.
///
/// `distance` is the minimum horizontal gap in samples between kept peaks;
/// values below 1 disable the distance filter.
pub fn find_peaks(x: &[f64], min_prominence: f64, distance: usize) -> Vec<usize> {
    let maxima = local_maxima(x);
    if maxima.is_empty() {
        return maxima;
    }

    let spaced = if distance > 1 {
        select_by_distance(x, &maxima, distance)
    } else {
        maxima
    };

    spaced
        .into_iter()
        .filter(|&peak| prominence(x, peak) >= min_prominence)
        .collect()
}

/// Local maxima. Plateaus count once, at their (rounded-down) midpoint.
/// The first and last samples can never be peaks.
fn local_maxima(x: &[f64]) -> Vec<usize> {
    let mut peaks = Vec::new();
    if x.len() < 3 {
        return peaks;
    }

    let i_max = x.len() - 1;
    let mut i = 1;
    while i < i_max {
        if x[i - 1] < x[i] {
            let mut ahead = i + 1;
            while ahead < i_max && x[ahead] == x[i] {
                ahead += 1;
            }
            if x[ahead] < x[i] {
                let left = i;
                let right = ahead - 1;
                peaks.push((left + right) / 2);
                i = ahead;
            }
        }
        i += 1;
    }

    peaks
}

/// Drop peaks closer than `distance` to a higher peak.
fn select_by_distance(x: &[f64], peaks: &[usize], distance: usize) -> Vec<usize> {
    let mut keep = vec![true; peaks.len()];

    // Stable ascending sort by height; walk it from the top so the highest
    // peak claims its neighbourhood first.
    let mut by_height: Vec<usize> = (0..peaks.len()).collect();
    by_height.sort_by(|&a, &b| x[peaks[a]].total_cmp(&x[peaks[b]]));

    for &j in by_height.iter().rev() {
        if !keep[j] {
            continue;
        }

        let mut k = j;
        while k > 0 && peaks[j] - peaks[k - 1] < distance {
            keep[k - 1] = false;
            k -= 1;
        }

        let mut k = j + 1;
        while k < peaks.len() && peaks[k] - peaks[j] < distance {
            keep[k] = false;
            k += 1;
        }
    }

    peaks
        .iter()
        .zip(keep)
        .filter_map(|(&p, kept)| kept.then_some(p))
        .collect()
}

/// Topographic prominence: peak height above the higher of the two lowest
/// points reached before climbing above the peak on either side.
fn prominence(x: &[f64], peak: usize) -> f64 {
    let height = x[peak];

    let mut left_min = height;
    for &v in x[..=peak].iter().rev() {
        if v > height {
            break;
        }
        left_min = left_min.min(v);
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
    fn simple_maxima() {
        let x = [0.0, 1.0, 0.0, 2.0, 0.0];
        assert_eq!(find_peaks(&x, 0.0, 1), vec![1, 3]);
    }

    #[test]
    fn edges_are_not_peaks() {
        let x = [3.0, 1.0, 2.0, 1.0, 3.0];
        assert_eq!(find_peaks(&x, 0.0, 1), vec![2]);
        assert!(find_peaks(&[1.0, 2.0], 0.0, 1).is_empty());
    }

    #[test]
    fn plateau_resolves_to_midpoint() {
        let x = [0.0, 1.0, 1.0, 1.0, 1.0, 0.0];
        assert_eq!(find_peaks(&x, 0.0, 1), vec![2]);

        // A shelf that keeps rising is not a peak
        let x = [0.0, 1.0, 1.0, 2.0, 0.0];
        assert_eq!(find_peaks(&x, 0.0, 1), vec![3]);
    }

    #[test]
    fn distance_keeps_higher_peak() {
        let x = [0.0, 1.0, 0.0, 3.0, 0.0, 2.0, 0.0];
        assert_eq!(find_peaks(&x, 0.0, 3), vec![3]);
        assert_eq!(find_peaks(&x, 0.0, 2), vec![1, 3, 5]);
    }

    #[test]
    fn prominence_filters_small_bumps() {
        // Peak at 2 rises 1.0 above its surroundings; bump at 5 only 0.1
        let x = [0.0, 0.5, 1.0, 0.5, 0.4, 0.5, 0.4, 0.0];
        assert_eq!(find_peaks(&x, 0.3, 1), vec![2]);
        assert_eq!(find_peaks(&x, 0.05, 1), vec![2, 5]);
    }

    #[test]
    fn prominence_uses_higher_base() {
        // Left base 0.0, right base 0.6 -> prominence 0.4
        let x = [0.0, 1.0, 0.6, 2.0, 0.0];
        assert!((prominence(&x, 1) - 0.4).abs() < 1e-12);
        assert_eq!(find_peaks(&x, 0.5, 1), vec![3]);
    }
}
