use anyhow::{Context, Result};
use rodio::{Decoder, OutputStream, OutputStreamHandle, Sink, Source};
use std::{
    fs::File,
    io::BufReader,
    path::{Path, PathBuf},
    time::Duration,
};

use crate::state::TransportCommand;

/// Position within this distance of the known length counts as finished.
pub const END_TOLERANCE: Duration = Duration::from_millis(10);

pub trait Transport {
    /// Begins playback from position zero.
    fn start(&mut self) -> Result<()>;
    fn pause(&mut self);
    fn resume(&mut self);
    fn stop(&mut self);
    /// Stops and starts again from position zero.
    fn restart(&mut self) -> Result<()>;
    fn position(&self) -> Duration;
    fn length(&self) -> Option<Duration>;
    /// Nothing is queued: never started, stopped, or played to the end.
    fn is_empty(&self) -> bool;
}

/// A drained sink always counts, since the decoder's length can overshoot.
pub fn track_finished(position: Duration, length: Option<Duration>, drained: bool) -> bool {
    match length {
        Some(length) if !length.is_zero() => position + END_TOLERANCE >= length || drained,
        _ => drained,
    }
}

/// Runs reducer commands against the transport. Returns the last failure,
/// if any, as display text.
pub fn apply_commands<T: Transport + ?Sized>(
    transport: &mut T,
    commands: &[TransportCommand],
) -> Option<String> {
    let mut failure = None;
    for command in commands {
        tracing::debug!(?command, "transport command");
        let result = match command {
            TransportCommand::Start => transport.start(),
            TransportCommand::Restart => transport.restart(),
            TransportCommand::Pause => {
                transport.pause();
                Ok(())
            }
            TransportCommand::Resume => {
                transport.resume();
                Ok(())
            }
            TransportCommand::Stop => {
                transport.stop();
                Ok(())
            }
        };
        if let Err(err) = result {
            tracing::warn!(?command, error = %err, "transport command failed");
            failure = Some(format!("{err:#}"));
        }
    }
    failure
}

/// Streams one local audio file through the default output device.
pub struct RodioTransport {
    _stream: OutputStream,
    handle: OutputStreamHandle,
    sink: Option<Sink>,
    path: PathBuf,
    length: Option<Duration>,
}

impl RodioTransport {
    /// Opens the default device and decodes the file once so a bad file is
    /// reported before the first play request.
    pub fn open(path: &Path) -> Result<Self> {
        let length = decode(path)?.total_duration();
        let (stream, handle) =
            OutputStream::try_default().context("No audio output device available")?;
        tracing::info!(path = %path.display(), ?length, "audio loaded");

        Ok(Self {
            _stream: stream,
            handle,
            sink: None,
            path: path.to_path_buf(),
            length,
        })
    }

    fn fresh_sink(&mut self) -> Result<()> {
        self.stop();
        let sink = Sink::try_new(&self.handle).context("Failed to create audio sink")?;
        sink.append(decode(&self.path)?);
        sink.play();
        self.sink = Some(sink);
        Ok(())
    }
}

fn decode(path: &Path) -> Result<Decoder<BufReader<File>>> {
    let file = File::open(path)
        .with_context(|| format!("Failed to open audio file: {}", path.display()))?;
    Decoder::new(BufReader::new(file))
        .with_context(|| format!("Failed to decode audio file: {}", path.display()))
}

impl Transport for RodioTransport {
    fn start(&mut self) -> Result<()> {
        self.fresh_sink()
    }

    fn pause(&mut self) {
        if let Some(sink) = &self.sink {
            sink.pause();
        }
    }

    fn resume(&mut self) {
        if let Some(sink) = &self.sink {
            sink.play();
        }
    }

    fn stop(&mut self) {
        if let Some(sink) = self.sink.take() {
            sink.stop();
        }
    }

    fn restart(&mut self) -> Result<()> {
        self.fresh_sink()
    }

    fn position(&self) -> Duration {
        self.sink
            .as_ref()
            .map(|sink| sink.get_pos())
            .unwrap_or(Duration::ZERO)
    }

    fn length(&self) -> Option<Duration> {
        self.length
    }

    fn is_empty(&self) -> bool {
        self.sink.as_ref().map(|sink| sink.empty()).unwrap_or(true)
    }
}

impl Drop for RodioTransport {
    fn drop(&mut self) {
        self.stop();
    }
}
