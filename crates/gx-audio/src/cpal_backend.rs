//! CPAL-based audio output backend.

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Device, FromSample, Sample, SampleFormat, SizedSample, Stream, StreamConfig};
use gx_engine::Frame;
use ringbuf::traits::{Consumer, Producer, Split};
use ringbuf::{HeapCons, HeapProd, HeapRb};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::traits::{AudioError, AudioOutput};

/// CPAL-based audio output.
pub struct CpalOutput {
    device: Device,
    config: StreamConfig,
    format: SampleFormat,
    stream: Option<Stream>,
    producer: HeapProd<Frame>,
    running: Arc<AtomicBool>,
}

impl CpalOutput {
    /// Open the default output device.
    ///
    /// Fails with `FormatMismatch` when the device is not at least stereo or
    /// does not take 16-bit integer or float samples.
    pub fn new() -> Result<(Self, HeapCons<Frame>), AudioError> {
        let host = cpal::default_host();
        let device = host.default_output_device().ok_or(AudioError::NoDevice)?;

        let supported = device
            .default_output_config()
            .map_err(|e| AudioError::DeviceInit(e.to_string()))?;

        let format = supported.sample_format();
        if !matches!(format, SampleFormat::I16 | SampleFormat::F32) {
            return Err(AudioError::FormatMismatch(format!(
                "sample format {format:?}"
            )));
        }
        if supported.channels() < 2 {
            return Err(AudioError::FormatMismatch(format!(
                "{} output channel(s)",
                supported.channels()
            )));
        }

        let config: StreamConfig = supported.into();
        tracing::info!(
            device = %device.name().unwrap_or_default(),
            rate = config.sample_rate.0,
            channels = config.channels,
            ?format,
            "audio device opened"
        );

        // About 100ms of buffering
        let buffer_size = (config.sample_rate.0 as usize / 10) * 2;
        let rb = HeapRb::<Frame>::new(buffer_size);
        let (producer, consumer) = rb.split();

        let output = Self {
            device,
            config,
            format,
            stream: None,
            producer,
            running: Arc::new(AtomicBool::new(false)),
        };

        Ok((output, consumer))
    }

    /// Build and start the audio stream.
    pub fn build_stream(&mut self, consumer: HeapCons<Frame>) -> Result<(), AudioError> {
        let stream = match self.format {
            SampleFormat::I16 => self.build::<i16>(consumer)?,
            _ => self.build::<f32>(consumer)?,
        };
        stream
            .play()
            .map_err(|e| AudioError::Playback(e.to_string()))?;
        self.stream = Some(stream);
        Ok(())
    }

    fn build<T>(&self, mut consumer: HeapCons<Frame>) -> Result<Stream, AudioError>
    where
        T: SizedSample + FromSample<i16>,
    {
        let running = self.running.clone();
        let channels = self.config.channels as usize;

        self.device
            .build_output_stream(
                &self.config,
                move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
                    let live = running.load(Ordering::Relaxed);
                    for chunk in data.chunks_mut(channels) {
                        let frame = if live {
                            consumer.try_pop().unwrap_or_default()
                        } else {
                            Frame::silence()
                        };
                        // Stereo pair first; any extra channels stay silent
                        for (i, sample) in chunk.iter_mut().enumerate() {
                            let value = match i {
                                0 => frame.left,
                                1 => frame.right,
                                _ => 0,
                            };
                            *sample = T::from_sample(value);
                        }
                    }
                },
                |err| tracing::error!("audio stream error: {err}"),
                None,
            )
            .map_err(|e| AudioError::StreamCreate(e.to_string()))
    }
}

impl AudioOutput for CpalOutput {
    fn sample_rate(&self) -> u32 {
        self.config.sample_rate.0
    }

    fn write(&mut self, mut frames: &[Frame]) {
        while !frames.is_empty() {
            let pushed = self.producer.push_slice(frames);
            frames = &frames[pushed..];
            if pushed == 0 {
                std::hint::spin_loop();
            }
        }
    }

    fn start(&mut self) -> Result<(), AudioError> {
        self.running.store(true, Ordering::Relaxed);
        if let Some(ref stream) = self.stream {
            stream
                .play()
                .map_err(|e| AudioError::Playback(e.to_string()))?;
        }
        Ok(())
    }

    fn stop(&mut self) -> Result<(), AudioError> {
        self.running.store(false, Ordering::Relaxed);
        if let Some(ref stream) = self.stream {
            stream
                .pause()
                .map_err(|e| AudioError::Playback(e.to_string()))?;
        }
        Ok(())
    }
}
