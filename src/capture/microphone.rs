// microphone.rs — Records a fixed-length clip from the default input device.
//
// cpal streams are !Send on some backends, so the whole recording runs on
// the calling thread; async callers go through `spawn_blocking`.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};

use super::pcm::{
    compute_rms, downmix_to_mono, encode_wav, is_silent, resample, to_pcm16, SPEECH_SAMPLE_RATE,
};
use super::CaptureError;

/// Record `seconds` of audio and return it as a 16 kHz mono WAV clip.
pub fn record_wav(seconds: u32) -> Result<Vec<u8>, CaptureError> {
    let host = cpal::default_host();
    let device = host
        .default_input_device()
        .ok_or(CaptureError::NoDevice)?;
    log::info!(
        "Microphone: recording {}s from {:?}",
        seconds,
        device.name().unwrap_or_default()
    );

    let config = device
        .default_input_config()
        .map_err(|e| CaptureError::Device(e.to_string()))?;
    let device_rate = config.sample_rate().0;
    let channels = config.channels() as usize;
    let sample_format = config.sample_format();
    let stream_config: cpal::StreamConfig = config.into();

    let buffer: Arc<Mutex<Vec<f32>>> = Arc::new(Mutex::new(Vec::new()));
    let on_error = |err: cpal::StreamError| log::error!("Microphone stream error: {err}");

    let stream = match sample_format {
        cpal::SampleFormat::F32 => {
            let buf = Arc::clone(&buffer);
            device.build_input_stream(
                &stream_config,
                move |data: &[f32], _: &cpal::InputCallbackInfo| {
                    if let Ok(mut b) = buf.lock() {
                        b.extend_from_slice(data);
                    }
                },
                on_error,
                None,
            )
        }
        cpal::SampleFormat::I16 => {
            let buf = Arc::clone(&buffer);
            device.build_input_stream(
                &stream_config,
                move |data: &[i16], _: &cpal::InputCallbackInfo| {
                    if let Ok(mut b) = buf.lock() {
                        b.extend(data.iter().map(|&s| s as f32 / i16::MAX as f32));
                    }
                },
                on_error,
                None,
            )
        }
        cpal::SampleFormat::U16 => {
            let buf = Arc::clone(&buffer);
            device.build_input_stream(
                &stream_config,
                move |data: &[u16], _: &cpal::InputCallbackInfo| {
                    if let Ok(mut b) = buf.lock() {
                        b.extend(data.iter().map(|&s| (s as f32 / u16::MAX as f32) * 2.0 - 1.0));
                    }
                },
                on_error,
                None,
            )
        }
        other => return Err(CaptureError::UnsupportedFormat(format!("{other:?}"))),
    }
    .map_err(|e| CaptureError::Device(e.to_string()))?;

    stream
        .play()
        .map_err(|e| CaptureError::Device(e.to_string()))?;
    std::thread::sleep(Duration::from_secs(seconds as u64));
    drop(stream);

    let raw = match buffer.lock() {
        Ok(mut b) => std::mem::take(&mut *b),
        Err(_) => return Err(CaptureError::Device("sample buffer poisoned".into())),
    };
    let mono = downmix_to_mono(&raw, channels);
    let pcm = to_pcm16(&resample(&mono, device_rate, SPEECH_SAMPLE_RATE));
    log::info!(
        "Microphone: captured {} samples, RMS={:.4}",
        pcm.len(),
        compute_rms(&pcm)
    );
    if is_silent(&pcm) {
        return Err(CaptureError::Silent);
    }
    Ok(encode_wav(&pcm, SPEECH_SAMPLE_RATE))
}
