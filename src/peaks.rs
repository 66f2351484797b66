use ndarray::Array2;

use crate::config::PeakConfig;
use crate::error::{Error, Result};

/// A local magnitude maximum in a (frequency bin, time frame) spectrogram.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Landmark {
    pub freq_bin: u16,
    pub time_frame: u32,
}

impl Landmark {
    pub fn new(freq_bin: u16, time_frame: u32) -> Self {
        Self { freq_bin, time_frame }
    }
}

/// Picks the landmarks of a magnitude spectrogram shaped `(freq_bins, frames)`.
///
/// A cell is a landmark when it equals the maximum of its neighborhood (all
/// cells within L1 distance `neighborhood_radius`) and is strictly greater
/// than the `magnitude_percentile` of the whole spectrogram. Equal maxima
/// inside one neighborhood are all accepted. Landmarks come out in row-major
/// order; the hasher imposes its own ordering.
pub fn extract_peaks(spectrogram: &Array2<f32>, config: &PeakConfig) -> Result<Vec<Landmark>> {
    let (freq_bins, frames) = spectrogram.dim();
    if freq_bins == 0 || frames == 0 {
        return Ok(Vec::new());
    }
    if freq_bins > usize::from(u16::MAX) + 1 {
        return Err(Error::SpectrogramTooTall(freq_bins));
    }

    let local_max = maximum_filter(spectrogram, config.neighborhood_radius);
    let threshold = percentile(spectrogram.iter().copied(), config.magnitude_percentile);

    let mut peaks = Vec::new();
    for ((f, t), &value) in spectrogram.indexed_iter() {
        if value == local_max[[f, t]] && value > threshold {
            peaks.push(Landmark::new(f as u16, t as u32));
        }
    }
    Ok(peaks)
}

/// Grey dilation with a diamond footprint of the given radius.
///
/// Reflect padding never brings a cell further than its mirror image, so the
/// padded maximum equals the maximum over in-domain cells. Dilating `radius`
/// times by the 4-connected cross reaches exactly the in-domain diamond.
fn maximum_filter(input: &Array2<f32>, radius: usize) -> Array2<f32> {
    let (rows, cols) = input.dim();
    let mut current = input.clone();
    let mut next = Array2::<f32>::zeros((rows, cols));

    for _ in 0..radius {
        for f in 0..rows {
            for t in 0..cols {
                let mut max = current[[f, t]];
                if f > 0 {
                    max = max.max(current[[f - 1, t]]);
                }
                if f + 1 < rows {
                    max = max.max(current[[f + 1, t]]);
                }
                if t > 0 {
                    max = max.max(current[[f, t - 1]]);
                }
                if t + 1 < cols {
                    max = max.max(current[[f, t + 1]]);
                }
                next[[f, t]] = max;
            }
        }
        std::mem::swap(&mut current, &mut next);
    }
    current
}

/// Linearly interpolated percentile (the usual `numpy.percentile` definition).
/// Returns `NEG_INFINITY` for an empty input.
pub fn percentile(values: impl IntoIterator<Item = f32>, pct: f64) -> f32 {
    let mut values: Vec<f32> = values.into_iter().collect();
    if values.is_empty() {
        return f32::NEG_INFINITY;
    }

    let rank = pct.clamp(0.0, 100.0) / 100.0 * (values.len() - 1) as f64;
    let lo = rank.floor() as usize;
    let frac = rank - lo as f64;

    let (_, &mut lo_value, upper) = values.select_nth_unstable_by(lo, f32::total_cmp);
    if frac == 0.0 || upper.is_empty() {
        return lo_value;
    }
    let hi_value = upper.iter().copied().fold(f32::INFINITY, f32::min);
    (lo_value as f64 + (hi_value as f64 - lo_value as f64) * frac) as f32
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array2;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn config(radius: usize, pct: f64) -> PeakConfig {
        PeakConfig {
            neighborhood_radius: radius,
            magnitude_percentile: pct,
        }
    }

    /// Deterministic pseudo-random spectrogram.
    fn noise(rows: usize, cols: usize, seed: u64) -> Array2<f32> {
        let mut rng = StdRng::seed_from_u64(seed);
        Array2::from_shape_fn((rows, cols), |_| rng.random_range(0..10_000u32) as f32 / 100.0)
    }

    fn brute_force_max(s: &Array2<f32>, f: usize, t: usize, radius: usize) -> f32 {
        let (rows, cols) = s.dim();
        let mut max = f32::NEG_INFINITY;
        for ff in 0..rows {
            for tt in 0..cols {
                if ff.abs_diff(f) + tt.abs_diff(t) <= radius {
                    max = max.max(s[[ff, tt]]);
                }
            }
        }
        max
    }

    #[test]
    fn percentile_interpolates_linearly() {
        let values = [1.0, 2.0, 3.0, 4.0, 5.0];
        assert_eq!(percentile(values, 0.0), 1.0);
        assert_eq!(percentile(values, 50.0), 3.0);
        assert_eq!(percentile(values, 100.0), 5.0);
        assert!((percentile(values, 80.0) - 4.2).abs() < 1e-6);
        assert!((percentile([4.0, 1.0, 3.0, 2.0], 50.0) - 2.5).abs() < 1e-6);
        assert_eq!(percentile(Vec::<f32>::new(), 80.0), f32::NEG_INFINITY);
    }

    #[test]
    fn every_landmark_is_a_neighborhood_maximum_above_threshold() {
        let s = noise(40, 60, 0x9E37_79B9_7F4A_7C15);
        let radius = 3;
        let threshold = percentile(s.iter().copied(), 80.0);
        let peaks = extract_peaks(&s, &config(radius, 80.0)).unwrap();

        assert!(!peaks.is_empty());
        for peak in &peaks {
            let (f, t) = (peak.freq_bin as usize, peak.time_frame as usize);
            assert_eq!(s[[f, t]], brute_force_max(&s, f, t, radius));
            assert!(s[[f, t]] > threshold);
        }

        // and nothing qualifying is missed
        let expected = s
            .indexed_iter()
            .filter(|&((f, t), &v)| v > threshold && v == brute_force_max(&s, f, t, radius))
            .count();
        assert_eq!(peaks.len(), expected);
    }

    #[test]
    fn neighborhood_is_a_diamond() {
        let mut s = Array2::<f32>::zeros((9, 9));
        s[[4, 4]] = 5.0;
        // corner of the bounding square, outside the L1 ball of radius 2
        s[[6, 6]] = 4.0;
        let peaks = extract_peaks(&s, &config(2, 50.0)).unwrap();
        assert_eq!(peaks, vec![Landmark::new(4, 4), Landmark::new(6, 6)]);

        // inside the ball the smaller value is suppressed
        let peaks = extract_peaks(&s, &config(4, 50.0)).unwrap();
        assert_eq!(peaks, vec![Landmark::new(4, 4)]);
    }

    #[test]
    fn spectrogram_narrower_than_neighborhood() {
        let s = Array2::from_shape_vec((5, 3), (0..15).map(|v| v as f32).collect()).unwrap();
        let peaks = extract_peaks(&s, &config(15, 80.0)).unwrap();
        assert_eq!(peaks, vec![Landmark::new(4, 2)]);
    }

    #[test]
    fn equal_maxima_are_all_kept() {
        let mut s = Array2::<f32>::zeros((8, 8));
        s[[3, 2]] = 1.0;
        s[[3, 3]] = 1.0;
        let peaks = extract_peaks(&s, &config(2, 80.0)).unwrap();
        assert_eq!(peaks, vec![Landmark::new(3, 2), Landmark::new(3, 3)]);
    }

    #[test]
    fn flat_or_empty_spectrograms_have_no_landmarks() {
        let silent = Array2::<f32>::zeros((16, 16));
        assert!(extract_peaks(&silent, &config(3, 80.0)).unwrap().is_empty());

        let constant = Array2::<f32>::from_elem((16, 16), -80.0);
        assert!(extract_peaks(&constant, &config(3, 80.0)).unwrap().is_empty());

        let empty = Array2::<f32>::zeros((0, 10));
        assert!(extract_peaks(&empty, &config(3, 80.0)).unwrap().is_empty());
    }

    #[test]
    fn too_many_frequency_bins_is_rejected() {
        let s = Array2::<f32>::zeros((70_000, 1));
        assert!(matches!(
            extract_peaks(&s, &config(1, 80.0)),
            Err(Error::SpectrogramTooTall(70_000))
        ));
    }
}
