//! Built-in pipelines: synthetic Opus silence and looping file playback.
//!
//! Descriptors:
//! - `silence`: Opus silence frames every 20 ms
//! - `ogg:<path>`: Ogg/Opus file, paced by granule position
//! - `ivf:<path>`: VP8/VP9 IVF file, paced by frame timestamps
//! - `h264:<path>`: Annex-B H264 file, one NAL unit per frame interval

use crate::error::PipelineError;
use crate::media::{MediaPipeline, PipelineFactory};
use crate::peer::connection::SampleSink;
use crate::peer::types::Codec;
use bytes::Bytes;
use log::{debug, error, trace};
use std::fmt;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio::time::{interval, sleep_until, Instant};
use webrtc::media::io::h264_reader::H264Reader;
use webrtc::media::io::ivf_reader::IVFReader;
use webrtc::media::io::ogg_reader::OggReader;
use webrtc::media::Sample;

const OGG_PAGE_DURATION: Duration = Duration::from_millis(20);
const OPUS_SILENCE_FRAME: [u8; 3] = [0xf8, 0xff, 0xfe];
const H264_READER_CAPACITY: usize = 1_048_576;
const DEFAULT_FRAME_INTERVAL: Duration = Duration::from_millis(33);
const MIN_FRAME_INTERVAL: Duration = Duration::from_millis(1);
const MAX_FRAME_INTERVAL: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceDescriptor {
    Silence,
    Ogg(PathBuf),
    Ivf(PathBuf),
    H264(PathBuf),
}

impl SourceDescriptor {
    pub fn produces(&self, codec: Codec) -> bool {
        match self {
            SourceDescriptor::Silence | SourceDescriptor::Ogg(_) => codec == Codec::Opus,
            SourceDescriptor::Ivf(_) => matches!(codec, Codec::Vp8 | Codec::Vp9),
            SourceDescriptor::H264(_) => codec == Codec::H264,
        }
    }

    /// Opens the source once to surface unreadable or mismatched input
    /// before any task is spawned.
    fn preflight(&self, codec: Codec) -> Result<(), PipelineError> {
        match self {
            SourceDescriptor::Silence => Ok(()),
            SourceDescriptor::Ogg(path) => {
                OggReader::new(open(path)?, true).map_err(source_err)?;
                Ok(())
            }
            SourceDescriptor::Ivf(path) => {
                let (_, header) = IVFReader::new(open(path)?).map_err(source_err)?;
                let file_codec = match &header.four_cc {
                    b"VP80" => Some(Codec::Vp8),
                    b"VP90" => Some(Codec::Vp9),
                    _ => None,
                };
                if file_codec != Some(codec) {
                    return Err(PipelineError::CodecMismatch {
                        source_desc: self.to_string(),
                        codec: codec.to_string(),
                    });
                }
                Ok(())
            }
            SourceDescriptor::H264(path) => {
                open(path)?;
                Ok(())
            }
        }
    }
}

impl FromStr for SourceDescriptor {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s == "silence" {
            return Ok(SourceDescriptor::Silence);
        }
        match s.split_once(':') {
            Some(("ogg", path)) if !path.is_empty() => Ok(SourceDescriptor::Ogg(path.into())),
            Some(("ivf", path)) if !path.is_empty() => Ok(SourceDescriptor::Ivf(path.into())),
            Some(("h264", path)) if !path.is_empty() => Ok(SourceDescriptor::H264(path.into())),
            _ => Err(PipelineError::UnknownSource(s.to_owned())),
        }
    }
}

impl fmt::Display for SourceDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceDescriptor::Silence => write!(f, "silence"),
            SourceDescriptor::Ogg(path) => write!(f, "ogg:{}", path.display()),
            SourceDescriptor::Ivf(path) => write!(f, "ivf:{}", path.display()),
            SourceDescriptor::H264(path) => write!(f, "h264:{}", path.display()),
        }
    }
}

/// Factory for the built-in sources
#[derive(Debug, Clone)]
pub struct SourcePipelineFactory {
    frame_interval: Duration,
}

impl SourcePipelineFactory {
    /// `h264_fps` paces H264 playback; 0 falls back to ~30 fps and rates
    /// above 1000 fps are capped.
    pub fn new(h264_fps: u32) -> Self {
        let frame_interval = match Duration::from_secs(1).checked_div(h264_fps) {
            Some(interval) => interval.max(MIN_FRAME_INTERVAL),
            None => DEFAULT_FRAME_INTERVAL,
        };
        Self { frame_interval }
    }
}

impl Default for SourcePipelineFactory {
    fn default() -> Self {
        Self::new(30)
    }
}

impl PipelineFactory for SourcePipelineFactory {
    fn create(
        &self,
        codec: Codec,
        sinks: Vec<Arc<dyn SampleSink>>,
        source: &str,
    ) -> Result<Box<dyn MediaPipeline>, PipelineError> {
        let descriptor: SourceDescriptor = source.parse()?;
        if !descriptor.produces(codec) {
            return Err(PipelineError::CodecMismatch {
                source_desc: descriptor.to_string(),
                codec: codec.to_string(),
            });
        }
        if sinks.is_empty() {
            return Err(PipelineError::NoTracks);
        }

        Ok(Box::new(SourcePipeline {
            descriptor,
            codec,
            sinks,
            frame_interval: self.frame_interval,
            task: None,
        }))
    }
}

struct SourcePipeline {
    descriptor: SourceDescriptor,
    codec: Codec,
    sinks: Vec<Arc<dyn SampleSink>>,
    frame_interval: Duration,
    task: Option<JoinHandle<()>>,
}

impl MediaPipeline for SourcePipeline {
    fn start(&mut self) -> Result<(), PipelineError> {
        if self.task.is_some() {
            return Err(PipelineError::AlreadyRunning);
        }
        let runtime = Handle::try_current().map_err(|_| PipelineError::NoRuntime)?;
        self.descriptor.preflight(self.codec)?;

        debug!("starting {} pipeline from '{}'", self.codec, self.descriptor);
        self.task = Some(runtime.spawn(play(
            self.descriptor.clone(),
            self.sinks.clone(),
            self.frame_interval,
        )));
        Ok(())
    }

    fn stop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

impl Drop for SourcePipeline {
    fn drop(&mut self) {
        self.stop();
    }
}

async fn play(descriptor: SourceDescriptor, sinks: Vec<Arc<dyn SampleSink>>, frame_interval: Duration) {
    loop {
        let pass = match &descriptor {
            SourceDescriptor::Silence => {
                play_silence(&sinks).await;
                return;
            }
            SourceDescriptor::Ogg(path) => play_ogg(path, &sinks).await,
            SourceDescriptor::Ivf(path) => play_ivf(path, &sinks).await,
            SourceDescriptor::H264(path) => play_h264(path, &sinks, frame_interval).await,
        };

        match pass {
            Ok(0) => {
                error!("source '{descriptor}' produced no samples, stopping");
                return;
            }
            Ok(samples) => debug!("source '{descriptor}' looped after {samples} samples"),
            Err(err) => {
                error!("source '{descriptor}' failed: {err}");
                return;
            }
        }
    }
}

async fn play_silence(sinks: &[Arc<dyn SampleSink>]) {
    let mut ticker = interval(OGG_PAGE_DURATION);
    let sample = Sample {
        data: Bytes::from_static(&OPUS_SILENCE_FRAME),
        duration: OGG_PAGE_DURATION,
        ..Default::default()
    };
    loop {
        ticker.tick().await;
        deliver(sinks, &sample).await;
    }
}

async fn play_ogg(path: &Path, sinks: &[Arc<dyn SampleSink>]) -> Result<usize, PipelineError> {
    let (mut ogg, _) = OggReader::new(open(path)?, true).map_err(source_err)?;
    let mut ticker = interval(OGG_PAGE_DURATION);
    let mut last_granule: u64 = 0;
    let mut delivered = 0;

    while let Ok((page_data, page_header)) = ogg.parse_next_page() {
        // Granule position is the running sample count at 48 kHz.
        let sample_count = page_header.granule_position.saturating_sub(last_granule);
        last_granule = page_header.granule_position;
        let sample = Sample {
            data: page_data.freeze(),
            duration: Duration::from_millis(sample_count * 1000 / 48000),
            ..Default::default()
        };
        deliver(sinks, &sample).await;
        delivered += 1;
        ticker.tick().await;
    }
    Ok(delivered)
}

async fn play_ivf(path: &Path, sinks: &[Arc<dyn SampleSink>]) -> Result<usize, PipelineError> {
    let (mut ivf, header) = IVFReader::new(open(path)?).map_err(source_err)?;
    let (numerator, denominator) = (header.timebase_numerator, header.timebase_denominator);
    // A timebase of at least a millisecond per tick is a frame rate; finer
    // ones (1/90000) only scale timestamps.
    let fallback = frame_duration(1, numerator, denominator)
        .filter(|tick| *tick >= MIN_FRAME_INTERVAL)
        .unwrap_or(DEFAULT_FRAME_INTERVAL);

    let mut deadline = Instant::now();
    let mut previous: Option<u64> = None;
    let mut delivered = 0;

    while let Ok((frame, frame_header)) = ivf.parse_next_frame() {
        let duration = previous
            .and_then(|prev| {
                frame_duration(frame_header.timestamp.saturating_sub(prev), numerator, denominator)
            })
            .unwrap_or(fallback);
        previous = Some(frame_header.timestamp);

        let sample = Sample {
            data: frame.freeze(),
            duration,
            ..Default::default()
        };
        deliver(sinks, &sample).await;
        delivered += 1;
        deadline += duration;
        sleep_until(deadline).await;
    }
    Ok(delivered)
}

/// Wall-clock length of `ticks` timebase units, capped at one second.
/// `None` when the timebase or the tick count is zero.
fn frame_duration(ticks: u64, numerator: u32, denominator: u32) -> Option<Duration> {
    if ticks == 0 || numerator == 0 || denominator == 0 {
        return None;
    }
    let secs = ticks as f64 * f64::from(numerator) / f64::from(denominator);
    Some(Duration::from_secs_f64(secs.min(MAX_FRAME_INTERVAL.as_secs_f64())))
}

async fn play_h264(
    path: &Path,
    sinks: &[Arc<dyn SampleSink>],
    frame_interval: Duration,
) -> Result<usize, PipelineError> {
    let mut h264 = H264Reader::new(open(path)?, H264_READER_CAPACITY);
    let mut ticker = interval(frame_interval);
    let mut delivered = 0;

    while let Ok(nal) = h264.next_nal() {
        let sample = Sample {
            data: nal.data.freeze(),
            duration: frame_interval,
            ..Default::default()
        };
        deliver(sinks, &sample).await;
        delivered += 1;
        ticker.tick().await;
    }
    Ok(delivered)
}

async fn deliver(sinks: &[Arc<dyn SampleSink>], sample: &Sample) {
    for sink in sinks {
        if let Err(err) = sink.write_sample(sample).await {
            trace!("sample dropped: {err}");
        }
    }
}

fn open(path: &Path) -> Result<BufReader<File>, PipelineError> {
    Ok(BufReader::new(File::open(path)?))
}

fn source_err(err: impl fmt::Display) -> PipelineError {
    PipelineError::Source(err.to_string())
}
