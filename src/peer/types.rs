use crate::peer::connection::SampleSink;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use webrtc::api::media_engine::{MIME_TYPE_H264, MIME_TYPE_OPUS, MIME_TYPE_VP8, MIME_TYPE_VP9};
use webrtc::rtp_transceiver::rtp_codec::RTCRtpCodecCapability;

/// Media kind of an outbound track
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrackKind {
    Audio,
    Video,
}

impl fmt::Display for TrackKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TrackKind::Audio => write!(f, "audio"),
            TrackKind::Video => write!(f, "video"),
        }
    }
}

/// Payload format carried by a track
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Codec {
    Opus,
    Vp8,
    Vp9,
    H264,
}

impl Codec {
    pub fn kind(self) -> TrackKind {
        match self {
            Codec::Opus => TrackKind::Audio,
            Codec::Vp8 | Codec::Vp9 | Codec::H264 => TrackKind::Video,
        }
    }

    pub fn mime_type(self) -> &'static str {
        match self {
            Codec::Opus => MIME_TYPE_OPUS,
            Codec::Vp8 => MIME_TYPE_VP8,
            Codec::Vp9 => MIME_TYPE_VP9,
            Codec::H264 => MIME_TYPE_H264,
        }
    }

    /// Encoding name as it appears in an `a=rtpmap` line.
    pub fn encoding_name(self) -> &'static str {
        match self {
            Codec::Opus => "opus",
            Codec::Vp8 => "VP8",
            Codec::Vp9 => "VP9",
            Codec::H264 => "H264",
        }
    }

    pub fn clock_rate(self) -> u32 {
        match self {
            Codec::Opus => 48000,
            _ => 90000,
        }
    }

    pub fn channels(self) -> u16 {
        match self {
            Codec::Opus => 2,
            _ => 0,
        }
    }

    pub fn sdp_fmtp_line(self) -> &'static str {
        match self {
            Codec::Opus => "minptime=10;useinbandfec=1",
            Codec::Vp8 => "",
            Codec::Vp9 => "profile-id=0",
            Codec::H264 => "level-asymmetry-allowed=1;packetization-mode=1;profile-level-id=42e01f",
        }
    }

    /// Payload type the default media engine registers for this codec.
    pub fn default_payload_type(self) -> u8 {
        match self {
            Codec::Opus => 111,
            Codec::Vp8 => 96,
            Codec::Vp9 => 98,
            Codec::H264 => 102,
        }
    }

    pub fn capability(self) -> RTCRtpCodecCapability {
        RTCRtpCodecCapability {
            mime_type: self.mime_type().to_owned(),
            clock_rate: self.clock_rate(),
            channels: self.channels(),
            sdp_fmtp_line: self.sdp_fmtp_line().to_owned(),
            rtcp_feedback: vec![],
        }
    }
}

impl fmt::Display for Codec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.encoding_name())
    }
}

impl FromStr for Codec {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "opus" => Ok(Codec::Opus),
            "vp8" => Ok(Codec::Vp8),
            "vp9" => Ok(Codec::Vp9),
            "h264" => Ok(Codec::H264),
            other => Err(format!("unsupported codec '{other}'")),
        }
    }
}

/// Identity of a track, fixed before any description is generated
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackSpec {
    pub id: String,
    pub kind: TrackKind,
    pub codec: Codec,
    /// Stream grouping identifier; tracks sharing it render together.
    pub label: String,
}

/// A registered outbound track. `ssrc` is the sync-source id the connection
/// assigned at registration and advertises in its descriptions. The sink is
/// the single write path into the connectivity layer and is handed to
/// exactly one pipeline.
#[derive(Clone)]
pub struct Track {
    spec: TrackSpec,
    ssrc: u32,
    sink: Arc<dyn SampleSink>,
}

impl Track {
    pub(crate) fn new(spec: TrackSpec, ssrc: u32, sink: Arc<dyn SampleSink>) -> Self {
        Self { spec, ssrc, sink }
    }

    pub fn spec(&self) -> &TrackSpec {
        &self.spec
    }

    pub fn id(&self) -> &str {
        &self.spec.id
    }

    pub fn kind(&self) -> TrackKind {
        self.spec.kind
    }

    pub fn codec(&self) -> Codec {
        self.spec.codec
    }

    pub fn ssrc(&self) -> u32 {
        self.ssrc
    }

    pub fn label(&self) -> &str {
        &self.spec.label
    }

    pub(crate) fn sink(&self) -> Arc<dyn SampleSink> {
        Arc::clone(&self.sink)
    }
}

impl fmt::Debug for Track {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Track")
            .field("spec", &self.spec)
            .field("ssrc", &self.ssrc)
            .finish_non_exhaustive()
    }
}

/// One requested track of a session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackRequest {
    pub kind: TrackKind,
    pub codec: Codec,
    pub label: String,
}

impl TrackRequest {
    pub fn new(codec: Codec, label: impl Into<String>) -> Self {
        Self {
            kind: codec.kind(),
            codec,
            label: label.into(),
        }
    }
}

/// Ordered set of tracks every session provisions
#[derive(Debug, Clone, Default)]
pub struct MediaPlan {
    pub tracks: Vec<TrackRequest>,
}

impl MediaPlan {
    /// One Opus track plus one video track, each in its own stream.
    pub fn audio_video(video_codec: Codec) -> Self {
        Self::default()
            .with_track(TrackRequest::new(Codec::Opus, "mediagate-audio"))
            .with_track(TrackRequest::new(video_codec, "mediagate-video"))
    }

    pub fn with_track(mut self, request: TrackRequest) -> Self {
        self.tracks.push(request);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codec_parsing_is_case_insensitive() {
        assert_eq!("H264".parse::<Codec>(), Ok(Codec::H264));
        assert_eq!("opus".parse::<Codec>(), Ok(Codec::Opus));
        assert!("theora".parse::<Codec>().is_err());
    }

    #[test]
    fn default_plan_is_one_audio_one_video() {
        let plan = MediaPlan::audio_video(Codec::Vp8);
        let kinds: Vec<_> = plan.tracks.iter().map(|t| t.kind).collect();
        assert_eq!(kinds, vec![TrackKind::Audio, TrackKind::Video]);
        assert_eq!(plan.tracks[1].codec, Codec::Vp8);
    }
}
