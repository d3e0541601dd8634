// pcm.rs — Sample conversion and WAV packaging for recorded speech.
//
// The transcription endpoint wants a self-contained audio file, so captured
// samples are down-mixed to mono, resampled to 16 kHz, quantised to PCM16
// and wrapped in a minimal RIFF/WAVE container.

/// Sample rate of clips sent for transcription.
pub const SPEECH_SAMPLE_RATE: u32 = 16_000;

/// Average interleaved frames down to a single channel.
pub fn downmix_to_mono(interleaved: &[f32], channels: usize) -> Vec<f32> {
    if channels <= 1 {
        return interleaved.to_vec();
    }
    interleaved
        .chunks(channels)
        .map(|frame| frame.iter().sum::<f32>() / frame.len() as f32)
        .collect()
}

/// Linear-interpolation resampler. Adequate for speech.
pub fn resample(input: &[f32], from_rate: u32, to_rate: u32) -> Vec<f32> {
    if from_rate == to_rate || input.is_empty() {
        return input.to_vec();
    }
    let step = from_rate as f64 / to_rate as f64;
    let len = (input.len() as f64 / step).ceil() as usize;
    (0..len)
        .map(|i| {
            let pos = i as f64 * step;
            let idx = pos as usize;
            let frac = pos - idx as f64;
            match (input.get(idx), input.get(idx + 1)) {
                (Some(&a), Some(&b)) => (a as f64 * (1.0 - frac) + b as f64 * frac) as f32,
                (Some(&a), None) => a,
                _ => 0.0,
            }
        })
        .collect()
}

/// Clamp and quantise float samples to signed 16-bit.
pub fn to_pcm16(samples: &[f32]) -> Vec<i16> {
    samples
        .iter()
        .map(|&s| (s.clamp(-1.0, 1.0) * i16::MAX as f32) as i16)
        .collect()
}

/// Recordings whose RMS level stays below this are treated as silence.
pub const SILENCE_RMS: f32 = 0.005;

/// RMS level normalised to 0.0–1.0.
pub fn compute_rms(samples: &[i16]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }
    let sum: f64 = samples.iter().map(|&s| (s as f64).powi(2)).sum();
    (sum / samples.len() as f64).sqrt() as f32 / i16::MAX as f32
}

pub fn is_silent(samples: &[i16]) -> bool {
    compute_rms(samples) < SILENCE_RMS
}

/// Wrap mono PCM16 samples in a 44-byte-header WAV container.
pub fn encode_wav(samples: &[i16], sample_rate: u32) -> Vec<u8> {
    const CHANNELS: u16 = 1;
    const BITS: u16 = 16;
    let block_align = CHANNELS * BITS / 8;
    let byte_rate = sample_rate * block_align as u32;
    let data_len = (samples.len() * 2) as u32;

    let mut out = Vec::with_capacity(44 + data_len as usize);
    out.extend_from_slice(b"RIFF");
    out.extend_from_slice(&(36 + data_len).to_le_bytes());
    out.extend_from_slice(b"WAVE");
    out.extend_from_slice(b"fmt ");
    out.extend_from_slice(&16u32.to_le_bytes());
    out.extend_from_slice(&1u16.to_le_bytes()); // PCM
    out.extend_from_slice(&CHANNELS.to_le_bytes());
    out.extend_from_slice(&sample_rate.to_le_bytes());
    out.extend_from_slice(&byte_rate.to_le_bytes());
    out.extend_from_slice(&block_align.to_le_bytes());
    out.extend_from_slice(&BITS.to_le_bytes());
    out.extend_from_slice(b"data");
    out.extend_from_slice(&data_len.to_le_bytes());
    for s in samples {
        out.extend_from_slice(&s.to_le_bytes());
    }
    out
}
