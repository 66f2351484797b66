use std::io::Cursor;

use hound::{SampleFormat, WavReader};
use ndarray::Array2;
use rustfft::{num_complex::Complex, FftPlanner};

use crate::config::AnalysisConfig;
use crate::error::{Error, Result};

const AMIN: f32 = 1e-5;
const TOP_DB: f32 = 80.0;

/// Mono PCM in the range [-1, 1].
#[derive(Debug, Clone)]
pub struct DecodedAudio {
    pub samples: Vec<f32>,
    pub sample_rate: u32,
}

pub fn decode_audio(audio_data: &[u8]) -> Result<DecodedAudio> {
    let mut reader = WavReader::new(Cursor::new(audio_data))?;
    let spec = reader.spec();
    let channels = usize::from(spec.channels.max(1));

    let interleaved: Vec<f32> = match spec.sample_format {
        SampleFormat::Float => reader.samples::<f32>().collect::<std::result::Result<_, _>>()?,
        SampleFormat::Int => {
            let max_value = (1i64 << (spec.bits_per_sample - 1)) as f32;
            reader
                .samples::<i32>()
                .map(|s| s.map(|s| s as f32 / max_value))
                .collect::<std::result::Result<_, _>>()?
        }
    };

    Ok(DecodedAudio {
        samples: to_mono(&interleaved, channels),
        sample_rate: spec.sample_rate,
    })
}

pub fn to_mono(interleaved: &[f32], channels: usize) -> Vec<f32> {
    if channels <= 1 {
        return interleaved.to_vec();
    }
    interleaved
        .chunks(channels)
        .map(|frame| frame.iter().sum::<f32>() / frame.len() as f32)
        .collect()
}

/// Linear-interpolation resampler.
pub fn resample(samples: &[f32], original_rate: u32, target_rate: u32) -> Vec<f32> {
    if original_rate == target_rate || samples.is_empty() || original_rate == 0 {
        return samples.to_vec();
    }

    let ratio = f64::from(original_rate) / f64::from(target_rate);
    let new_len = (samples.len() as f64 / ratio).round() as usize;
    let last = samples.len() - 1;

    (0..new_len)
        .map(|i| {
            let position = i as f64 * ratio;
            let index = position.floor() as usize;
            if index >= last {
                return samples[last];
            }
            let frac = (position - index as f64) as f32;
            samples[index] + (samples[index + 1] - samples[index]) * frac
        })
        .collect()
}

/// Centered short-time Fourier magnitude, shaped `(n_fft / 2 + 1, frames)`.
///
/// The signal is zero-padded by `n_fft / 2` on both sides so frame `t` is
/// centred on sample `t * hop_length`.
pub fn compute_spectrogram(samples: &[f32], n_fft: usize, hop_length: usize) -> Array2<f32> {
    let pad = n_fft / 2;
    let mut padded = vec![0.0f32; (samples.len() + 2 * pad).max(n_fft)];
    padded[pad..pad + samples.len()].copy_from_slice(samples);

    let freq_bins = n_fft / 2 + 1;
    let num_frames = 1 + (padded.len() - n_fft) / hop_length;
    let mut spectrogram = Array2::zeros((freq_bins, num_frames));

    let mut planner = FftPlanner::<f32>::new();
    let fft = planner.plan_fft_forward(n_fft);
    let window = hann_window(n_fft);
    let mut buffer = vec![Complex::new(0.0f32, 0.0); n_fft];

    for frame_idx in 0..num_frames {
        let start = frame_idx * hop_length;
        for ((slot, &sample), &w) in buffer
            .iter_mut()
            .zip(&padded[start..start + n_fft])
            .zip(&window)
        {
            *slot = Complex::new(sample * w, 0.0);
        }
        fft.process(&mut buffer);

        for (freq_idx, value) in buffer.iter().take(freq_bins).enumerate() {
            spectrogram[[freq_idx, frame_idx]] = value.norm();
        }
    }

    spectrogram
}

/// Periodic Hann window, as used for spectral analysis.
fn hann_window(size: usize) -> Vec<f32> {
    (0..size)
        .map(|i| 0.5 * (1.0 - (2.0 * std::f32::consts::PI * i as f32 / size as f32).cos()))
        .collect()
}

/// Converts magnitudes to decibels in place, clamped to `TOP_DB` below the peak.
pub fn amplitude_to_db(spectrogram: &mut Array2<f32>) {
    spectrogram.mapv_inplace(|m| 20.0 * m.max(AMIN).log10());
    let peak = spectrogram.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    let floor = peak - TOP_DB;
    spectrogram.mapv_inplace(|db| db.max(floor));
}

/// Resamples to the analysis rate and computes the spectrogram the peak
/// extractor works on.
pub fn analyze(audio: &DecodedAudio, config: &AnalysisConfig) -> Result<Array2<f32>> {
    if config.n_fft < 2 || config.hop_length == 0 {
        return Err(Error::InvalidConfig(format!(
            "cannot analyze with n_fft={} hop_length={}",
            config.n_fft, config.hop_length
        )));
    }
    let samples = resample(&audio.samples, audio.sample_rate, config.sample_rate);
    let mut spectrogram = compute_spectrogram(&samples, config.n_fft, config.hop_length);
    if config.decibels {
        amplitude_to_db(&mut spectrogram);
    }
    Ok(spectrogram)
}
