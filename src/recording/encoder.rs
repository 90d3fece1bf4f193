//! Encoders fed from the capture callback through a [`PcmLink`].
//!
//! Each encoder does its work on dedicated threads. Stopping only disconnects the
//! link; the worker drains what it already received, flushes, and then emits the
//! terminal event. Teardown of the stream therefore never cuts a flush short.

use hound::{SampleFormat, WavSpec, WavWriter};
use std::io::{Cursor, Read, Write};
use std::path::PathBuf;
use std::process::{Command, Stdio};
use std::thread;
use tokio::sync::mpsc::UnboundedSender;

use super::audio::PcmLink;
use super::encoding::FfmpegProfile;
use super::runtime::{Encoder, EncoderEvent, EncoderState};
use crate::errors::{SessionError, SessionResult};

/// Media type of the in-process default encoder.
pub const WAV_MEDIA_TYPE: &str = "audio/wav";

const READ_CHUNK: usize = 4096;

/// Bytes of ffmpeg's stderr kept for fault messages.
const STDERR_TAIL: usize = 2048;

/// Pipes PCM through an `ffmpeg` child and streams the container bytes back.
pub struct FfmpegEncoder {
    ffmpeg: PathBuf,
    profile: FfmpegProfile,
    sample_rate: u32,
    link: PcmLink,
    state: EncoderState,
}

impl FfmpegEncoder {
    pub fn new(ffmpeg: PathBuf, profile: FfmpegProfile, sample_rate: u32, link: PcmLink) -> Self {
        Self {
            ffmpeg,
            profile,
            sample_rate,
            link,
            state: EncoderState::Idle,
        }
    }

    fn command(&self) -> Command {
        let mut cmd = Command::new(&self.ffmpeg);
        cmd.args(["-hide_banner", "-loglevel", "error", "-f", "s16le", "-ar"])
            .arg(self.sample_rate.to_string())
            .args(["-ac", "1", "-i", "pipe:0", "-c:a", self.profile.codec])
            .args(["-f", self.profile.container, "pipe:1"])
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        cmd
    }
}

impl Encoder for FfmpegEncoder {
    fn state(&self) -> EncoderState {
        self.state
    }

    fn start(&mut self, events: UnboundedSender<EncoderEvent>) -> SessionResult<()> {
        if self.state != EncoderState::Idle {
            return Err(SessionError::Encoder(format!(
                "cannot start encoder in state {}",
                self.state
            )));
        }

        let mut child = self
            .command()
            .spawn()
            .map_err(|e| SessionError::Encoder(format!("failed to launch ffmpeg: {e}")))?;
        let (Some(mut stdin), Some(mut stdout), Some(stderr)) =
            (child.stdin.take(), child.stdout.take(), child.stderr.take())
        else {
            let _ = child.kill();
            return Err(SessionError::Encoder("ffmpeg pipes unavailable".to_string()));
        };

        // ffmpeg blocks once the stderr pipe fills, so it is drained from the start.
        let diagnostics = thread::spawn(move || drain_tail(stderr, STDERR_TAIL));

        let pcm = self.link.connect();
        thread::spawn(move || {
            for buffer in pcm {
                let bytes: Vec<u8> = buffer.iter().flat_map(|s| s.to_le_bytes()).collect();
                if let Err(e) = stdin.write_all(&bytes) {
                    tracing::warn!("ffmpeg stdin closed early: {e}");
                    break;
                }
            }
            // Dropping stdin signals end of input; ffmpeg then flushes.
        });

        let produces = self.profile.produces.to_string();
        thread::spawn(move || {
            let mut buf = vec![0u8; READ_CHUNK];
            loop {
                match stdout.read(&mut buf) {
                    Ok(0) => break,
                    Ok(n) => {
                        let _ = events.send(EncoderEvent::Data(buf[..n].to_vec()));
                    }
                    Err(e) => {
                        let _ = events.send(EncoderEvent::Fault(format!("reading ffmpeg output: {e}")));
                        let _ = child.kill();
                        return;
                    }
                }
            }

            let status = child.wait();
            let stderr_tail = diagnostics.join().unwrap_or_default();
            let terminal = match status {
                Ok(status) if status.success() => EncoderEvent::Stopped {
                    media_type: Some(produces),
                },
                Ok(status) => EncoderEvent::Fault(format!(
                    "ffmpeg exited with {status}: {}",
                    String::from_utf8_lossy(&stderr_tail).trim()
                )),
                Err(e) => EncoderEvent::Fault(format!("waiting for ffmpeg: {e}")),
            };
            let _ = events.send(terminal);
        });

        self.state = EncoderState::Recording;
        tracing::debug!(
            "ffmpeg encoder started: {} via {}/{}",
            self.profile.media_type,
            self.profile.codec,
            self.profile.container
        );
        Ok(())
    }

    fn stop(&mut self) {
        if self.state == EncoderState::Stopped {
            return;
        }
        self.link.disconnect();
        self.state = EncoderState::Stopped;
        tracing::debug!("ffmpeg encoder stopping; flush continues in background");
    }
}

/// In-process 16-bit mono WAV encoder, used when nothing preferred is available.
///
/// WAV headers carry the total length, so the whole file is emitted as a single
/// chunk once input ends.
pub struct WavEncoder {
    sample_rate: u32,
    link: PcmLink,
    state: EncoderState,
}

impl WavEncoder {
    pub fn new(sample_rate: u32, link: PcmLink) -> Self {
        Self {
            sample_rate,
            link,
            state: EncoderState::Idle,
        }
    }
}

impl Encoder for WavEncoder {
    fn state(&self) -> EncoderState {
        self.state
    }

    fn start(&mut self, events: UnboundedSender<EncoderEvent>) -> SessionResult<()> {
        if self.state != EncoderState::Idle {
            return Err(SessionError::Encoder(format!(
                "cannot start encoder in state {}",
                self.state
            )));
        }

        let spec = WavSpec {
            channels: 1,
            sample_rate: self.sample_rate,
            bits_per_sample: 16,
            sample_format: SampleFormat::Int,
        };
        let pcm = self.link.connect();

        thread::spawn(move || {
            let terminal = match encode_wav(pcm, spec) {
                Ok(bytes) => {
                    let _ = events.send(EncoderEvent::Data(bytes));
                    EncoderEvent::Stopped {
                        media_type: Some(WAV_MEDIA_TYPE.to_string()),
                    }
                }
                Err(e) => EncoderEvent::Fault(format!("WAV encoding failed: {e}")),
            };
            let _ = events.send(terminal);
        });

        self.state = EncoderState::Recording;
        tracing::debug!("WAV encoder started at {}Hz", self.sample_rate);
        Ok(())
    }

    fn stop(&mut self) {
        if self.state == EncoderState::Stopped {
            return;
        }
        self.link.disconnect();
        self.state = EncoderState::Stopped;
    }
}

/// Reads `source` to the end, keeping only its last `limit` bytes.
fn drain_tail(mut source: impl Read, limit: usize) -> Vec<u8> {
    let mut tail = Vec::with_capacity(limit);
    let mut buf = [0u8; READ_CHUNK];
    loop {
        match source.read(&mut buf) {
            Ok(0) | Err(_) => break,
            Ok(n) => {
                tail.extend_from_slice(&buf[..n]);
                let excess = tail.len().saturating_sub(limit);
                tail.drain(..excess);
            }
        }
    }
    tail
}

fn encode_wav(pcm: std::sync::mpsc::Receiver<Vec<i16>>, spec: WavSpec) -> hound::Result<Vec<u8>> {
    let mut cursor = Cursor::new(Vec::new());
    {
        let mut writer = WavWriter::new(&mut cursor, spec)?;
        for buffer in pcm {
            for sample in buffer {
                writer.write_sample(sample)?;
            }
        }
        writer.finalize()?;
    }
    Ok(cursor.into_inner())
}
