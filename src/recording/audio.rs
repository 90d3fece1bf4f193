//! Microphone capture with cpal.
//!
//! The input callback downmixes to mono i16 and fans each buffer out to two
//! independent consumers: the encoder link and the analysis feed. Either can be
//! disconnected without touching the other.

use anyhow::anyhow;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{FromSample, Sample, SizedSample};
use std::path::PathBuf;
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex, PoisonError};

use super::encoder::{FfmpegEncoder, WavEncoder};
use super::encoding::ffmpeg_profile;
use super::ffmpeg;
use super::runtime::{AmplitudeTap, Encoder, MediaRuntime, MicrophoneStream};
use super::visualizations::{AnalysisFeed, SpectrumTap};
use crate::errors::{SessionError, SessionResult};

#[cfg(target_os = "linux")]
use std::fs::OpenOptions;
#[cfg(target_os = "linux")]
use std::os::unix::io::AsRawFd;

/// Connection from the capture callback to an encoder worker.
///
/// Disconnecting drops the sender, which is how the worker learns to flush.
#[derive(Debug, Clone, Default)]
pub struct PcmLink {
    sender: Arc<Mutex<Option<Sender<Vec<i16>>>>>,
}

impl PcmLink {
    /// Replaces any previous connection and returns the receiving end.
    pub fn connect(&self) -> Receiver<Vec<i16>> {
        let (tx, rx) = mpsc::channel();
        *self.sender.lock().unwrap_or_else(PoisonError::into_inner) = Some(tx);
        rx
    }

    pub fn disconnect(&self) {
        self.sender
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
    }

    #[cfg(test)]
    fn is_connected(&self) -> bool {
        self.sender
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    pub fn send(&self, pcm: Vec<i16>) {
        let mut sender = self.sender.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(tx) = sender.as_ref() {
            if tx.send(pcm).is_err() {
                sender.take();
            }
        }
    }
}

/// Live cpal input stream owned by one session.
pub struct CpalStream {
    stream: Option<cpal::Stream>,
    device_name: String,
    sample_rate: u32,
    encoder_link: PcmLink,
    analysis: AnalysisFeed,
}

impl CpalStream {
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn encoder_link(&self) -> PcmLink {
        self.encoder_link.clone()
    }
}

impl MicrophoneStream for CpalStream {
    fn label(&self) -> String {
        format!("{} @ {}Hz", self.device_name, self.sample_rate)
    }

    fn open_analysis(&mut self, fft_size: usize) -> SessionResult<Box<dyn AmplitudeTap>> {
        self.analysis.open(fft_size);
        Ok(Box::new(SpectrumTap::new(self.analysis.clone(), fft_size)))
    }

    fn close_analysis(&mut self) {
        self.analysis.close();
    }

    fn stop_tracks(&mut self) {
        if let Some(stream) = self.stream.take() {
            if let Err(e) = stream.pause() {
                tracing::debug!("Failed to pause input stream: {e}");
            }
            drop(stream);
            tracing::debug!("Input stream released: {}", self.device_name);
        }
        self.encoder_link.disconnect();
    }
}

impl Drop for CpalStream {
    fn drop(&mut self) {
        self.stop_tracks();
    }
}

/// Media runtime backed by cpal for capture and ffmpeg for encoding.
///
/// Without ffmpeg the only encoding is the in-process WAV default.
pub struct CpalRuntime {
    device: String,
    ffmpeg: Option<ffmpeg::FfmpegCapabilities>,
}

impl CpalRuntime {
    /// Creates a runtime for `device` ("default", an index, or a device name)
    /// and probes ffmpeg once.
    pub fn new(device: String) -> Self {
        Self {
            device,
            ffmpeg: ffmpeg::probe(),
        }
    }

    pub fn ffmpeg_path(&self) -> Option<PathBuf> {
        self.ffmpeg.as_ref().map(|caps| caps.path.clone())
    }

    fn open_stream(&self) -> anyhow::Result<CpalStream> {
        let device = suppress_alsa_warnings(|| {
            let host = cpal::default_host();
            if self.device == "default" {
                host.default_input_device()
                    .ok_or_else(|| anyhow!("No audio input device available"))
            } else {
                find_device_by_name(&host, &self.device)
            }
        })?;

        let device_name = device
            .name()
            .unwrap_or_else(|_| "Unknown device".to_string());
        let supported = device.default_input_config()?;
        let sample_rate = supported.sample_rate().0;
        let channels = supported.channels() as usize;
        tracing::debug!(
            "Device configuration: {}Hz, {} channels, {:?}",
            sample_rate,
            channels,
            supported.sample_format()
        );

        let encoder_link = PcmLink::default();
        let analysis = AnalysisFeed::new();
        let config: cpal::StreamConfig = supported.config();

        let stream = match supported.sample_format() {
            cpal::SampleFormat::F32 => {
                build_capture::<f32>(&device, &config, channels, &encoder_link, &analysis)?
            }
            cpal::SampleFormat::I16 => {
                build_capture::<i16>(&device, &config, channels, &encoder_link, &analysis)?
            }
            cpal::SampleFormat::U16 => {
                build_capture::<u16>(&device, &config, channels, &encoder_link, &analysis)?
            }
            cpal::SampleFormat::I32 => {
                build_capture::<i32>(&device, &config, channels, &encoder_link, &analysis)?
            }
            other => return Err(anyhow!("Unsupported sample format: {other:?}")),
        };
        stream.play()?;

        Ok(CpalStream {
            stream: Some(stream),
            device_name,
            sample_rate,
            encoder_link,
            analysis,
        })
    }
}

impl MediaRuntime for CpalRuntime {
    type Stream = CpalStream;

    async fn acquire_microphone(&self) -> SessionResult<CpalStream> {
        self.open_stream()
            .map_err(|e| SessionError::DeviceAccess(e.to_string()))
    }

    fn supported_encodings(&self) -> Vec<String> {
        self.ffmpeg
            .as_ref()
            .map(|caps| caps.media_types.clone())
            .unwrap_or_default()
    }

    fn create_encoder(
        &self,
        stream: &mut CpalStream,
        encoding: Option<&str>,
    ) -> SessionResult<Box<dyn Encoder>> {
        let profile = encoding.and_then(ffmpeg_profile);
        match (profile, &self.ffmpeg) {
            (Some(profile), Some(caps)) => Ok(Box::new(FfmpegEncoder::new(
                caps.path.clone(),
                profile,
                stream.sample_rate(),
                stream.encoder_link(),
            ))),
            _ => {
                if let Some(requested) = encoding {
                    tracing::warn!("No ffmpeg profile for {requested}; recording WAV instead");
                }
                Ok(Box::new(WavEncoder::new(
                    stream.sample_rate(),
                    stream.encoder_link(),
                )))
            }
        }
    }
}

fn build_capture<T>(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    channels: usize,
    encoder_link: &PcmLink,
    analysis: &AnalysisFeed,
) -> anyhow::Result<cpal::Stream>
where
    T: SizedSample + Send + 'static,
    i16: FromSample<T>,
{
    let encoder_link = encoder_link.clone();
    let analysis = analysis.clone();

    let stream = device.build_input_stream(
        config,
        move |data: &[T], _: &cpal::InputCallbackInfo| {
            let mono = downmix(data, channels);
            analysis.push(&mono);
            encoder_link.send(mono);
        },
        |err| {
            tracing::error!("Audio stream error: {}", err);
        },
        None,
    )?;
    Ok(stream)
}

/// Averages interleaved frames down to one mono i16 sample each.
fn downmix<T>(data: &[T], channels: usize) -> Vec<i16>
where
    T: Sample,
    i16: FromSample<T>,
{
    match channels {
        0 | 1 => data.iter().map(|&s| i16::from_sample(s)).collect(),
        n => data
            .chunks_exact(n)
            .map(|frame| {
                let sum: i32 = frame.iter().map(|&s| i16::from_sample(s) as i32).sum();
                (sum / n as i32) as i16
            })
            .collect(),
    }
}

/// Finds an input device by numeric index or exact name.
fn find_device_by_name(host: &cpal::Host, device_spec: &str) -> anyhow::Result<cpal::Device> {
    let mut devices = host
        .input_devices()
        .map_err(|e| anyhow!("Failed to enumerate devices: {e}"))?;

    if let Ok(index) = device_spec.parse::<usize>() {
        return devices
            .nth(index)
            .ok_or_else(|| anyhow!("Device index {index} is out of range"));
    }

    devices
        .find(|d| d.name().map(|n| n == device_spec).unwrap_or(false))
        .ok_or_else(|| {
            anyhow!(
                "Audio input device '{device_spec}' not found. Use 'micnote list-devices' to see available devices."
            )
        })
}

/// Temporarily redirects stderr to /dev/null to keep ALSA's probing noise off the TUI.
#[cfg(target_os = "linux")]
pub(crate) fn suppress_alsa_warnings<F, T>(f: F) -> anyhow::Result<T>
where
    F: FnOnce() -> anyhow::Result<T>,
{
    let dev_null = OpenOptions::new()
        .write(true)
        .open("/dev/null")
        .map_err(|e| anyhow!("Failed to open /dev/null: {e}"))?;

    let old_stderr = unsafe { libc::dup(libc::STDERR_FILENO) };
    if old_stderr == -1 {
        return Err(anyhow!("Failed to duplicate stderr"));
    }

    if unsafe { libc::dup2(dev_null.as_raw_fd(), libc::STDERR_FILENO) } == -1 {
        unsafe { libc::close(old_stderr) };
        return Err(anyhow!("Failed to redirect stderr"));
    }

    let result = f();

    unsafe {
        libc::dup2(old_stderr, libc::STDERR_FILENO);
        libc::close(old_stderr);
    }

    result
}

#[cfg(not(target_os = "linux"))]
pub(crate) fn suppress_alsa_warnings<F, T>(f: F) -> anyhow::Result<T>
where
    F: FnOnce() -> anyhow::Result<T>,
{
    f()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn downmix_averages_channels() {
        assert_eq!(downmix(&[100i16, 300, -50, 50], 2), vec![200, 0]);
        assert_eq!(downmix(&[1i16, 2, 3], 1), vec![1, 2, 3]);
        assert_eq!(downmix(&[0.5f32, 0.5, 0.5], 3), vec![16384]);
    }

    #[test]
    fn link_delivers_until_disconnected() {
        let link = PcmLink::default();
        link.send(vec![1]);
        assert!(!link.is_connected());

        let rx = link.connect();
        link.send(vec![1, 2]);
        link.send(vec![3]);
        link.disconnect();
        link.send(vec![4]);

        let received: Vec<Vec<i16>> = rx.iter().collect();
        assert_eq!(received, vec![vec![1, 2], vec![3]]);
    }

    #[test]
    fn link_drops_sender_when_worker_is_gone() {
        let link = PcmLink::default();
        let rx = link.connect();
        drop(rx);
        link.send(vec![1]);
        assert!(!link.is_connected());
    }
}
