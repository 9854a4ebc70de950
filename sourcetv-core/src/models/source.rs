use serde::{Deserialize, Serialize};

/// Delivery format of a stream
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StreamType {
    Hls,
    Dash,
    Mp4,
    Mkv,
    Webm,
    Embed,
}

/// Declared video quality
///
/// Variants are declared best-first; [`Quality::rank`] is used for merge ordering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Quality {
    #[serde(rename = "2160p")]
    P2160,
    #[serde(rename = "1440p")]
    P1440,
    #[serde(rename = "1080p")]
    P1080,
    #[serde(rename = "720p")]
    P720,
    #[serde(rename = "480p")]
    P480,
    #[serde(rename = "360p")]
    P360,
    #[default]
    #[serde(rename = "unknown")]
    Unknown,
}

impl Quality {
    /// Higher is better; `Unknown` ranks below every known quality
    #[must_use]
    pub const fn rank(self) -> u8 {
        match self {
            Self::P2160 => 6,
            Self::P1440 => 5,
            Self::P1080 => 4,
            Self::P720 => 3,
            Self::P480 => 2,
            Self::P360 => 1,
            Self::Unknown => 0,
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::P2160 => "2160p",
            Self::P1440 => "1440p",
            Self::P1080 => "1080p",
            Self::P720 => "720p",
            Self::P480 => "480p",
            Self::P360 => "360p",
            Self::Unknown => "unknown",
        }
    }
}

impl std::fmt::Display for Quality {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AudioTrack {
    pub language: String,
    pub label: String,
}

/// Which provider produced a source or subtitle
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderRef {
    pub id: String,
    pub name: String,
}

/// A playable stream
///
/// `url` is always a proxy URL by the time it leaves the resolution service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Source {
    pub url: String,
    #[serde(rename = "type")]
    pub stream_type: StreamType,
    pub quality: Quality,
    #[serde(default)]
    pub audio_tracks: Vec<AudioTrack>,
    pub provider: ProviderRef,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subtitle {
    pub language: String,
    /// srt, vtt, ass
    pub format: String,
    pub url: String,
    pub provider: ProviderRef,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quality_rank_order() {
        let ordered = [
            Quality::P2160,
            Quality::P1440,
            Quality::P1080,
            Quality::P720,
            Quality::P480,
            Quality::P360,
            Quality::Unknown,
        ];
        for pair in ordered.windows(2) {
            assert!(pair[0].rank() > pair[1].rank(), "{} vs {}", pair[0], pair[1]);
        }
    }

    #[test]
    fn test_source_serialization() {
        let source = Source {
            url: "http://localhost/proxy/abc".to_string(),
            stream_type: StreamType::Hls,
            quality: Quality::P1080,
            audio_tracks: vec![],
            provider: ProviderRef {
                id: "alpha".to_string(),
                name: "Alpha".to_string(),
            },
        };
        let json = serde_json::to_value(&source).unwrap();
        assert_eq!(json["type"], "hls");
        assert_eq!(json["quality"], "1080p");
        assert_eq!(json["audioTracks"], serde_json::json!([]));
    }
}
