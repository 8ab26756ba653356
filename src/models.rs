use crate::cookies::Cookie;
use serde::{Deserialize, Serialize};

/// The three supported publishers. Serde tags match the mode strings the
/// shell sends.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Source {
    #[serde(rename = "comicDays")]
    ComicDays,
    #[serde(rename = "ourfeel")]
    Ourfeel,
    #[serde(rename = "PocketShonenmagazine")]
    PocketMagazine,
}

/// On-disk page format; fixed per source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageFormat {
    Png,
    Jpeg,
}

impl Source {
    pub fn parse(mode: &str) -> Option<Source> {
        match mode {
            "comicDays" => Some(Source::ComicDays),
            "ourfeel" => Some(Source::Ourfeel),
            "PocketShonenmagazine" => Some(Source::PocketMagazine),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Source::ComicDays => "comicDays",
            Source::Ourfeel => "ourfeel",
            Source::PocketMagazine => "PocketShonenmagazine",
        }
    }

    pub fn page_format(&self) -> PageFormat {
        match self {
            Source::ComicDays | Source::Ourfeel => PageFormat::Png,
            Source::PocketMagazine => PageFormat::Jpeg,
        }
    }
}

impl std::str::FromStr for Source {
    type Err = crate::error::DownloadError;

    fn from_str(mode: &str) -> Result<Self, Self::Err> {
        Source::parse(mode).ok_or_else(|| crate::error::DownloadError::Unsupported(mode.to_string()))
    }
}

impl PageFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            PageFormat::Png => "png",
            PageFormat::Jpeg => "jpg",
        }
    }

    pub fn mime(&self) -> &'static str {
        match self {
            PageFormat::Png => "image/png",
            PageFormat::Jpeg => "image/jpeg",
        }
    }
}

/// A single page of an episode.
///
/// ComicDays and Ourfeel embed per-page records (with dimensions) in the
/// episode document; the descramble seed is derived from `src` when the page
/// is processed. PocketMagazine only lists image URLs and carries one
/// episode-level seed on the manifest.
#[derive(Debug, Clone)]
pub enum PageRef {
    Manifest { src: String, width: u32, height: u32 },
    Listed { src: String },
}

impl PageRef {
    pub fn src(&self) -> &str {
        match self {
            PageRef::Manifest { src, .. } => src,
            PageRef::Listed { src } => src,
        }
    }
}

/// Everything a download needs, captured at search time. At most one
/// manifest is held per source.
#[derive(Debug, Clone)]
pub struct ComicManifest {
    pub title: String,
    pub source: Source,
    pub pages: Vec<PageRef>,
    /// Episode-level descramble seed (PocketMagazine). `None` for sources
    /// whose seed is per-page, and for unscrambled episodes.
    pub scramble_seed: Option<u32>,
    pub cookies: Vec<Cookie>,
}

/// Search result handed to the shell; `thumbnail` is a data URL.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ComicInfo {
    pub mode: Source,
    pub title: String,
    pub thumbnail: String,
    pub page_url: String,
}

#[derive(Debug, Serialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ProgressStatus {
    Started,
    Downloading,
    Completed,
}

/// Payload of the `download-progress` event.
#[derive(Debug, Serialize, Clone, PartialEq)]
pub struct DownloadProgress {
    pub current: usize,
    pub total: usize,
    pub title: String,
    pub status: ProgressStatus,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mode_strings_round_trip() {
        for source in [Source::ComicDays, Source::Ourfeel, Source::PocketMagazine] {
            assert_eq!(Source::parse(source.as_str()), Some(source));
        }
        assert_eq!(Source::parse("unknown"), None);
    }

    #[test]
    fn progress_serializes_with_wire_field_names() {
        let progress = DownloadProgress {
            current: 3,
            total: 10,
            title: "t".into(),
            status: ProgressStatus::Downloading,
        };
        let json = serde_json::to_value(&progress).unwrap();
        assert_eq!(json["current"], 3);
        assert_eq!(json["status"], "downloading");
    }
}
