//! Equal-width binned histograms.
//!
//! Bin edges span the data's own min..max. A bin holds values in
//! `[edge_i, edge_i+1)`, except the last bin, which is closed on both ends.
//! When every value is identical the range is widened by 0.5 on each side.

/// Counts `values` into `bins` equal-width bins over the data range.
///
/// Non-finite values are ignored. Returns all zeros when nothing is left to
/// bin.
pub fn histogram_counts(values: &[f64], bins: usize) -> Vec<usize> {
    let mut counts = vec![0usize; bins];
    let finite: Vec<f64> = values.iter().copied().filter(|v| v.is_finite()).collect();
    if bins == 0 || finite.is_empty() {
        return counts;
    }

    let (mut first, mut last) = finite
        .iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| {
            (lo.min(v), hi.max(v))
        });
    if first == last {
        first -= 0.5;
        last += 0.5;
    }

    let edges = linspace(first, last, bins + 1);
    let span = last - first;
    let last_bin = bins - 1;

    for value in finite {
        // First guess from the scaled offset, then nudge against the actual
        // edges so float error never moves a value into a neighbouring bin.
        let scaled = (value - first) / span * bins as f64;
        let mut index = (scaled as usize).min(last_bin);
        if index > 0 && value < edges[index] {
            index -= 1;
        }
        if index != last_bin && value >= edges[index + 1] {
            index += 1;
        }
        counts[index] += 1;
    }

    counts
}

/// Bins `values` and rescales each count to an integer percentage of the
/// fullest bin (truncated). An empty input yields `bins` zeros.
pub fn histogram_percentages(values: &[f64], bins: usize) -> Vec<u32> {
    let counts = histogram_counts(values, bins);
    let max = counts.iter().copied().max().unwrap_or(0).max(1);
    counts
        .into_iter()
        .map(|count| (count as f64 / max as f64 * 100.0) as u32)
        .collect()
}

/// Like [`histogram_percentages`], but values outside `[lo, hi]` are dropped
/// before binning. The bin range still comes from the remaining data.
pub fn histogram_percentages_within(values: &[f64], bins: usize, range: (f64, f64)) -> Vec<u32> {
    let (lo, hi) = range;
    let kept: Vec<f64> = values
        .iter()
        .copied()
        .filter(|&v| v >= lo && v <= hi)
        .collect();
    histogram_percentages(&kept, bins)
}

/// `num` evenly spaced points from `start` to `stop`, both included.
fn linspace(start: f64, stop: f64, num: usize) -> Vec<f64> {
    let div = num.saturating_sub(1).max(1) as f64;
    let step = (stop - start) / div;
    let mut points: Vec<f64> = (0..num).map(|i| i as f64 * step + start).collect();
    if let Some(last) = points.last_mut() {
        *last = stop;
    }
    points
}
