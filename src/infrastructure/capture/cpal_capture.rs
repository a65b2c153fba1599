//! Cross-platform audio capture using cpal
//!
//! Delivers mono PCM16 frames at 16kHz into the worker's frame queue.
//! The device callback only converts and enqueues; heavier work such as
//! resampling runs on the capture thread, never in the callback.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{SampleFormat, SampleRate, StreamConfig};
use rubato::{FftFixedIn, Resampler};
use tokio::time::Duration as TokioDuration;

use crate::application::ports::{AudioCapture, CaptureError, CaptureHandle, FrameSender};
use crate::domain::transcription::SAMPLE_RATE;

/// Audio capture adapter using cpal.
///
/// The stream lives on its own thread because `cpal::Stream` is not Send.
pub struct CpalCapture;

impl CpalCapture {
    /// Create a new cpal-based capture source
    pub fn new() -> Self {
        Self
    }

    /// Get the default input device
    fn get_input_device() -> Result<cpal::Device, CaptureError> {
        let host = cpal::default_host();
        host.default_input_device().ok_or(CaptureError::NoDevice)
    }

    /// Get a suitable input configuration, preferring mono at 16kHz
    fn get_input_config(
        device: &cpal::Device,
    ) -> Result<(StreamConfig, SampleFormat), CaptureError> {
        let supported_configs = device
            .supported_input_configs()
            .map_err(|e| CaptureError::StartFailed(format!("Failed to get configs: {}", e)))?;

        let mut best_config: Option<cpal::SupportedStreamConfigRange> = None;

        for config in supported_configs {
            if config.sample_format() != SampleFormat::I16
                && config.sample_format() != SampleFormat::F32
            {
                continue;
            }

            let includes_target = config.min_sample_rate().0 <= SAMPLE_RATE
                && config.max_sample_rate().0 >= SAMPLE_RATE;

            let is_better = match &best_config {
                None => true,
                Some(current) => {
                    let fewer_channels = config.channels() < current.channels();
                    let better_rate =
                        includes_target && current.min_sample_rate().0 > SAMPLE_RATE;
                    fewer_channels || better_rate
                }
            };
            if is_better {
                best_config = Some(config);
            }
        }

        let config_range = best_config
            .ok_or_else(|| CaptureError::StartFailed("No suitable config found".into()))?;

        let sample_rate = if config_range.min_sample_rate().0 <= SAMPLE_RATE
            && config_range.max_sample_rate().0 >= SAMPLE_RATE
        {
            SampleRate(SAMPLE_RATE)
        } else {
            config_range.min_sample_rate()
        };

        let sample_format = config_range.sample_format();
        let config = StreamConfig {
            channels: config_range.channels(),
            sample_rate,
            buffer_size: cpal::BufferSize::Default,
        };

        Ok((config, sample_format))
    }

    /// Mix interleaved multi-channel samples down to mono
    fn mix_to_mono(samples: &[i16], channels: u16) -> Vec<i16> {
        if channels == 1 {
            return samples.to_vec();
        }

        samples
            .chunks(channels as usize)
            .map(|chunk| {
                let sum: i32 = chunk.iter().map(|&s| s as i32).sum();
                (sum / channels as i32) as i16
            })
            .collect()
    }

    /// Resample a chunk from the device rate to 16kHz
    fn resample_chunk(
        resampler: &mut FftFixedIn<f32>,
        pending: &mut Vec<f32>,
        samples: &[i16],
    ) -> Vec<i16> {
        pending.extend(samples.iter().map(|&s| s as f32 / 32768.0));

        let mut output = Vec::new();
        loop {
            let needed = resampler.input_frames_next();
            if pending.len() < needed {
                break;
            }

            let chunk: Vec<f32> = pending.drain(..needed).collect();
            match resampler.process(&[chunk], None) {
                Ok(resampled) => {
                    output.extend(resampled[0].iter().map(|&s| (s * 32767.0) as i16));
                }
                Err(e) => {
                    eprintln!("voxd: resampling failed: {}", e);
                    break;
                }
            }
        }

        output
    }
}

impl Default for CpalCapture {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AudioCapture for CpalCapture {
    async fn start(&self, sink: FrameSender) -> Result<CaptureHandle, CaptureError> {
        let stop = Arc::new(AtomicBool::new(false));
        let started = Arc::new(AtomicBool::new(false));
        let failed = Arc::new(AtomicBool::new(false));

        let stop_thread = Arc::clone(&stop);
        let started_thread = Arc::clone(&started);
        let failed_thread = Arc::clone(&failed);

        std::thread::spawn(move || {
            let device = match CpalCapture::get_input_device() {
                Ok(d) => d,
                Err(_) => {
                    failed_thread.store(true, Ordering::SeqCst);
                    return;
                }
            };

            let (config, sample_format) = match CpalCapture::get_input_config(&device) {
                Ok(c) => c,
                Err(_) => {
                    failed_thread.store(true, Ordering::SeqCst);
                    return;
                }
            };

            let device_rate = config.sample_rate.0;
            let channels = config.channels;

            // The callback hands raw device chunks to this thread over a
            // second queue so mixdown/resampling stay off the driver thread.
            let (raw_tx, raw_rx) = std::sync::mpsc::channel::<Vec<i16>>();

            let stream_result = match sample_format {
                SampleFormat::I16 => {
                    let raw_tx = raw_tx.clone();
                    device.build_input_stream(
                        &config,
                        move |data: &[i16], _: &cpal::InputCallbackInfo| {
                            let _ = raw_tx.send(data.to_vec());
                        },
                        |err| eprintln!("voxd: audio stream error: {}", err),
                        None,
                    )
                }
                SampleFormat::F32 => {
                    let raw_tx = raw_tx.clone();
                    device.build_input_stream(
                        &config,
                        move |data: &[f32], _: &cpal::InputCallbackInfo| {
                            let converted: Vec<i16> = data
                                .iter()
                                .map(|&s| (s.clamp(-1.0, 1.0) * 32767.0) as i16)
                                .collect();
                            let _ = raw_tx.send(converted);
                        },
                        |err| eprintln!("voxd: audio stream error: {}", err),
                        None,
                    )
                }
                _ => {
                    failed_thread.store(true, Ordering::SeqCst);
                    return;
                }
            };

            let stream = match stream_result {
                Ok(s) => s,
                Err(_) => {
                    failed_thread.store(true, Ordering::SeqCst);
                    return;
                }
            };

            if stream.play().is_err() {
                failed_thread.store(true, Ordering::SeqCst);
                return;
            }

            started_thread.store(true, Ordering::SeqCst);

            let mut resampler = if device_rate != SAMPLE_RATE {
                FftFixedIn::<f32>::new(device_rate as usize, SAMPLE_RATE as usize, 1024, 2, 1)
                    .ok()
            } else {
                None
            };
            let mut pending: Vec<f32> = Vec::new();

            while !stop_thread.load(Ordering::SeqCst) {
                match raw_rx.recv_timeout(std::time::Duration::from_millis(100)) {
                    Ok(raw) => {
                        let mono = CpalCapture::mix_to_mono(&raw, channels);
                        let frame = match resampler.as_mut() {
                            Some(resampler) => {
                                CpalCapture::resample_chunk(resampler, &mut pending, &mono)
                            }
                            None => mono,
                        };
                        if !frame.is_empty() {
                            sink.push(frame);
                        }
                    }
                    Err(std::sync::mpsc::RecvTimeoutError::Timeout) => continue,
                    Err(std::sync::mpsc::RecvTimeoutError::Disconnected) => break,
                }
            }

            drop(stream);
            sink.close();
        });

        // Give the thread a moment to acquire the device
        for _ in 0..40 {
            if started.load(Ordering::SeqCst) {
                return Ok(CaptureHandle::new(stop));
            }
            if failed.load(Ordering::SeqCst) {
                return Err(CaptureError::StartFailed(
                    "Failed to open audio input".into(),
                ));
            }
            tokio::time::sleep(TokioDuration::from_millis(25)).await;
        }

        stop.store(true, Ordering::SeqCst);
        Err(CaptureError::StartFailed(
            "Timed out waiting for the audio device".into(),
        ))
    }
}
