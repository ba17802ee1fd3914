//! Drop scanning and clipped local-extrema search.
//!
//! Shared by the artifact corrector and the drink event detector. All window
//! bounds are positional indices into the day window and are clipped to the
//! available range, so a search near either end of the series never fails.

/// Flag every position whose one- or two-step difference falls below `threshold`.
///
/// Positions without a defined difference (the first samples, or any `NaN`
/// operand) are never flagged.
pub fn significant_drops(values: &[f64], threshold: f64) -> Vec<bool> {
    (0..values.len())
        .map(|i| {
            let d1 = i.checked_sub(1).map(|j| values[i] - values[j]);
            let d2 = i.checked_sub(2).map(|j| values[i] - values[j]);
            d1.is_some_and(|d| d < threshold) || d2.is_some_and(|d| d < threshold)
        })
        .collect()
}

/// Positions where a cascading fall ends.
///
/// A flagged drop is an onset only when none of the next `follow` positions is
/// flagged as well, which keeps the last step of a multi-sample fall.
pub fn event_onsets(values: &[f64], threshold: f64, follow: usize) -> Vec<usize> {
    let flags = significant_drops(values, threshold);
    flags
        .iter()
        .enumerate()
        .filter(|&(i, &flagged)| {
            flagged && !flags.iter().skip(i + 1).take(follow).any(|&next| next)
        })
        .map(|(i, _)| i)
        .collect()
}

/// Inclusive window `[center - before, center + after]` clipped to `0..len`.
///
/// Returns `None` when `len` is zero.
pub fn clipped_window(
    center: usize,
    before: usize,
    after: usize,
    len: usize,
) -> Option<(usize, usize)> {
    if len == 0 {
        return None;
    }
    let lo = center.saturating_sub(before).min(len - 1);
    let hi = center.saturating_add(after).min(len - 1);
    Some((lo, hi))
}

/// Position of the smallest defined value in the inclusive range `lo..=hi`.
///
/// Ties resolve to the earliest position; `NaN` values are skipped. Returns
/// `None` when the range holds no defined value.
pub fn argmin_in(values: &[f64], lo: usize, hi: usize) -> Option<usize> {
    extremum_in(values, lo, hi, |candidate, best| candidate < best)
}

/// Position of the largest defined value in the inclusive range `lo..=hi`.
///
/// Ties resolve to the earliest position; `NaN` values are skipped.
pub fn argmax_in(values: &[f64], lo: usize, hi: usize) -> Option<usize> {
    extremum_in(values, lo, hi, |candidate, best| candidate > best)
}

fn extremum_in(
    values: &[f64],
    lo: usize,
    hi: usize,
    better: impl Fn(f64, f64) -> bool,
) -> Option<usize> {
    if values.is_empty() || lo > hi {
        return None;
    }
    let hi = hi.min(values.len() - 1);
    let mut best: Option<usize> = None;
    for i in lo..=hi {
        let v = values[i];
        if v.is_nan() {
            continue;
        }
        match best {
            Some(b) if !better(v, values[b]) => {}
            _ => best = Some(i),
        }
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_significant_drops_one_and_two_step() {
        // 39 -> 38.8 -> 38.6: neither step below -0.5 alone, but the two-step
        // difference is -0.4, still not a drop; -> 38.2 makes Δ2 = -0.6.
        let values = [39.0, 38.8, 38.6, 38.2, 39.0];
        let flags = significant_drops(&values, -0.5);
        assert_eq!(flags, vec![false, false, false, true, false]);

        let flags = significant_drops(&[39.0, 37.0], -1.0);
        assert_eq!(flags, vec![false, true]);
    }

    #[test]
    fn test_nan_differences_never_flag() {
        let values = [39.0, f64::NAN, 30.0, 29.0];
        let flags = significant_drops(&values, -0.5);
        // Δ1 at 3 is -1.0; Δ2 at 2 is -9.0.
        assert_eq!(flags, vec![false, false, true, true]);

        let values = [f64::NAN, f64::NAN];
        assert_eq!(significant_drops(&values, -0.5), vec![false, false]);
    }

    #[test]
    fn test_onsets_keep_last_drop_of_cascade() {
        let values = [39.0, 39.0, 37.0, 35.0, 33.0, 36.0, 39.0];
        let onsets = event_onsets(&values, -1.0, 2);
        assert_eq!(onsets, vec![4]);
    }

    #[test]
    fn test_onsets_separate_events() {
        let mut values = vec![39.0; 20];
        values[3] = 36.0;
        values[14] = 36.0;
        let onsets = event_onsets(&values, -1.0, 2);
        assert_eq!(onsets, vec![3, 14]);
    }

    #[test]
    fn test_onset_suppressed_by_drop_two_ahead() {
        // Drops at 2 and 4 (gap of one), so 2 is followed within 2 positions.
        let values = [39.0, 39.0, 37.5, 38.9, 37.0, 39.0, 39.0];
        let flags = significant_drops(&values, -1.0);
        assert!(flags[2] && flags[4]);
        assert_eq!(event_onsets(&values, -1.0, 2), vec![4]);
    }

    #[test]
    fn test_flat_series_has_no_onsets() {
        assert!(event_onsets(&[39.0; 50], -0.5, 2).is_empty());
        assert!(event_onsets(&[], -0.5, 2).is_empty());
    }

    #[test]
    fn test_clipped_window() {
        assert_eq!(clipped_window(2, 10, 20, 100), Some((0, 22)));
        assert_eq!(clipped_window(95, 10, 20, 100), Some((85, 99)));
        assert_eq!(clipped_window(0, 0, 0, 1), Some((0, 0)));
        assert_eq!(clipped_window(0, 3, 3, 0), None);
    }

    #[test]
    fn test_extrema_first_occurrence_and_nan() {
        let values = [39.0, 36.0, f64::NAN, 36.0, 39.0];
        assert_eq!(argmin_in(&values, 0, 4), Some(1));
        assert_eq!(argmax_in(&values, 0, 4), Some(0));
        assert_eq!(argmax_in(&values, 1, 3), Some(1));
        assert_eq!(argmin_in(&values, 2, 2), None);
        assert_eq!(argmin_in(&values, 3, 10), Some(3));
        assert_eq!(argmin_in(&values, 4, 3), None);
    }
}
