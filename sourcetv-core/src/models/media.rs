use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::str::FromStr;

use crate::{Error, Result};

/// Kind of content a request asks sources for
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentType {
    Movie,
    Tv,
}

impl ContentType {
    /// Both content types, in declaration order
    pub const ALL: [Self; 2] = [Self::Movie, Self::Tv];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Movie => "movie",
            Self::Tv => "tv",
        }
    }
}

impl FromStr for ContentType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "movie" => Ok(Self::Movie),
            "tv" | "show" | "series" => Ok(Self::Tv),
            _ => Err(Error::InvalidInput(format!("Unknown content type: {s}"))),
        }
    }
}

impl std::fmt::Display for ContentType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Inbound media request
///
/// Immutable for the lifetime of a resolution. Title and year are hints only
/// and never take part in the cache fingerprint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaRequest {
    pub content_type: ContentType,
    /// External identifier (e.g. a TMDB id)
    pub external_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub season: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub episode: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title_hint: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub year_hint: Option<u32>,
}

impl MediaRequest {
    #[must_use]
    pub fn movie(external_id: impl Into<String>) -> Self {
        Self {
            content_type: ContentType::Movie,
            external_id: external_id.into(),
            season: None,
            episode: None,
            title_hint: None,
            year_hint: None,
        }
    }

    #[must_use]
    pub fn tv(external_id: impl Into<String>, season: u32, episode: u32) -> Self {
        Self {
            content_type: ContentType::Tv,
            external_id: external_id.into(),
            season: Some(season),
            episode: Some(episode),
            title_hint: None,
            year_hint: None,
        }
    }

    #[must_use]
    pub fn with_title_hint(mut self, title: impl Into<String>) -> Self {
        self.title_hint = Some(title.into());
        self
    }

    #[must_use]
    pub const fn with_year_hint(mut self, year: u32) -> Self {
        self.year_hint = Some(year);
        self
    }

    /// Check that the request identifies exactly one piece of content
    pub fn validate(&self) -> Result<()> {
        if self.external_id.trim().is_empty() {
            return Err(Error::InvalidInput("externalId must not be empty".to_string()));
        }

        if self.content_type == ContentType::Tv {
            match (self.season, self.episode) {
                (Some(s), Some(e)) if s >= 1 && e >= 1 => {}
                (Some(_), Some(_)) => {
                    return Err(Error::InvalidInput(
                        "season and episode must be at least 1".to_string(),
                    ));
                }
                _ => {
                    return Err(Error::InvalidInput(
                        "tv requests require both season and episode".to_string(),
                    ));
                }
            }
        }

        Ok(())
    }

    /// Canonical identity string: `movie:550` or `tv:1399:1:2`
    #[must_use]
    pub fn identity(&self) -> String {
        match self.content_type {
            ContentType::Movie => format!("movie:{}", self.external_id.trim()),
            ContentType::Tv => format!(
                "tv:{}:{}:{}",
                self.external_id.trim(),
                self.season.unwrap_or_default(),
                self.episode.unwrap_or_default()
            ),
        }
    }

    /// Deterministic cache fingerprint (hex SHA-256 of [`Self::identity`])
    #[must_use]
    pub fn fingerprint(&self) -> String {
        hex::encode(Sha256::digest(self.identity().as_bytes()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_content_type_parse() {
        assert_eq!("movie".parse::<ContentType>().unwrap(), ContentType::Movie);
        assert_eq!("TV".parse::<ContentType>().unwrap(), ContentType::Tv);
        assert!("book".parse::<ContentType>().is_err());
    }

    #[test]
    fn test_validate() {
        assert!(MediaRequest::movie("550").validate().is_ok());
        assert!(MediaRequest::movie("  ").validate().is_err());
        assert!(MediaRequest::tv("1399", 1, 2).validate().is_ok());
        assert!(MediaRequest::tv("1399", 0, 2).validate().is_err());

        let mut missing_episode = MediaRequest::tv("1399", 1, 1);
        missing_episode.episode = None;
        assert!(missing_episode.validate().is_err());
    }

    #[test]
    fn test_fingerprint_ignores_hints() {
        let plain = MediaRequest::movie("550");
        let hinted = MediaRequest::movie("550")
            .with_title_hint("Fight Club")
            .with_year_hint(1999);
        assert_eq!(plain.fingerprint(), hinted.fingerprint());
        assert_eq!(plain.fingerprint().len(), 64);
    }

    #[test]
    fn test_fingerprint_distinguishes_episodes() {
        let e1 = MediaRequest::tv("1399", 1, 1);
        let e2 = MediaRequest::tv("1399", 1, 2);
        assert_ne!(e1.fingerprint(), e2.fingerprint());
        assert_eq!(e1.identity(), "tv:1399:1:1");
    }

    #[test]
    fn test_movie_ignores_season() {
        let mut movie = MediaRequest::movie("550");
        movie.season = Some(3);
        assert_eq!(movie.fingerprint(), MediaRequest::movie("550").fingerprint());
    }

    #[test]
    fn test_request_json_shape() {
        let req: MediaRequest = serde_json::from_str(
            r#"{"contentType":"tv","externalId":"1399","season":1,"episode":2}"#,
        )
        .unwrap();
        assert_eq!(req, MediaRequest::tv("1399", 1, 2));
    }
}
