//! 下载相关的数据模型定义。
//!
//! 包含平台、媒体类型、下载任务、播放列表请求、进度事件与批次结果。

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::range::IndexSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Facebook,
    Instagram,
    TikTok,
    YouTube,
}

impl Platform {
    pub const ALL: [Platform; 4] = [
        Platform::Facebook,
        Platform::Instagram,
        Platform::TikTok,
        Platform::YouTube,
    ];

    /// 单个视频页可选的平台。
    pub const SOCIAL: [Platform; 3] = [Platform::Facebook, Platform::Instagram, Platform::TikTok];

    pub fn tag(self) -> &'static str {
        match self {
            Platform::Facebook => "facebook",
            Platform::Instagram => "instagram",
            Platform::TikTok => "tiktok",
            Platform::YouTube => "youtube",
        }
    }

    pub fn title(self) -> &'static str {
        match self {
            Platform::Facebook => "Facebook",
            Platform::Instagram => "Instagram",
            Platform::TikTok => "TikTok",
            Platform::YouTube => "YouTube",
        }
    }

    /// 单个视频下载的最高分辨率。
    pub fn default_max_height(self) -> u32 {
        match self {
            Platform::TikTok => 1080,
            _ => 720,
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.title())
    }
}

impl FromStr for Platform {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let key = s.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|p| p.tag() == key)
            .ok_or_else(|| format!("unknown platform '{}'", s.trim()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Video,
    Audio,
}

impl MediaKind {
    pub fn tag(self) -> &'static str {
        match self {
            MediaKind::Video => "video",
            MediaKind::Audio => "audio",
        }
    }

    pub fn toggle(self) -> Self {
        match self {
            MediaKind::Video => MediaKind::Audio,
            MediaKind::Audio => MediaKind::Video,
        }
    }
}

impl fmt::Display for MediaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

impl FromStr for MediaKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "video" | "v" => Ok(MediaKind::Video),
            "audio" | "a" => Ok(MediaKind::Audio),
            other => Err(format!("unknown media kind '{other}'")),
        }
    }
}

/// 播放列表可选的画质上限。
pub const QUALITY_CHOICES: [u32; 4] = [1080, 720, 480, 360];

/// Audio extraction settings (codec and bitrate in kbit/s).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioSettings {
    pub format: String,
    pub bitrate_kbps: u32,
}

impl Default for AudioSettings {
    fn default() -> Self {
        Self {
            format: "mp3".to_string(),
            bitrate_kbps: 192,
        }
    }
}

/// One item to fetch; immutable once handed to the worker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadJob {
    pub url: String,
    pub dest_dir: PathBuf,
    pub kind: MediaKind,
    /// Height ceiling for video; ignored for audio.
    pub max_height: u32,
}

#[derive(Debug, Clone)]
pub struct PlaylistRequest {
    pub url: String,
    pub dest_dir: PathBuf,
    pub indices: IndexSet,
    pub kind: MediaKind,
    pub max_height: u32,
}

/// 交给后台线程的任务。
#[derive(Debug, Clone)]
pub enum JobRequest {
    Single { platform: Platform, job: DownloadJob },
    Playlist(PlaylistRequest),
}

/// 当前传输的快照；新事件覆盖旧事件。
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProgressEvent {
    pub percent: f32,
    pub speed: Option<String>,
    pub eta: Option<String>,
    pub filename: Option<String>,
    /// 1-based position of the current item within the batch.
    pub item: usize,
    pub item_total: usize,
}

/// Entry returned by the metadata-only playlist query.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct PlaylistEntry {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub webpage_url: Option<String>,
}

impl PlaylistEntry {
    pub fn resolved_url(&self) -> Option<&str> {
        self.url
            .as_deref()
            .filter(|u| !u.trim().is_empty())
            .or_else(|| self.webpage_url.as_deref().filter(|u| !u.trim().is_empty()))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PlaylistInfo {
    pub title: Option<String>,
    /// `None` marks an entry the extractor reported as unavailable.
    pub entries: Vec<Option<PlaylistEntry>>,
}

/// 解析后仍然可以下载的播放列表位置。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedItem {
    pub position: usize,
    pub url: String,
    pub title: Option<String>,
}

/// 所有条目都尝试过之后汇总的结果。
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchSummary {
    pub output_dir: PathBuf,
    pub succeeded: u32,
    pub failed: u32,
    pub skipped: u32,
}

impl BatchSummary {
    pub fn attempted(&self) -> u32 {
        self.succeeded + self.failed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn platform_tags_round_trip_through_from_str() {
        for p in Platform::ALL {
            assert_eq!(p.tag().parse::<Platform>().unwrap(), p);
        }
        assert_eq!(" TikTok ".parse::<Platform>().unwrap(), Platform::TikTok);
        assert!("myspace".parse::<Platform>().is_err());
    }

    #[test]
    fn tiktok_gets_higher_ceiling() {
        assert_eq!(Platform::TikTok.default_max_height(), 1080);
        assert_eq!(Platform::Instagram.default_max_height(), 720);
    }

    #[test]
    fn entry_prefers_url_over_webpage_url() {
        let entry = PlaylistEntry {
            url: Some("https://a".into()),
            webpage_url: Some("https://b".into()),
            ..Default::default()
        };
        assert_eq!(entry.resolved_url(), Some("https://a"));

        let entry = PlaylistEntry {
            url: Some("  ".into()),
            webpage_url: Some("https://b".into()),
            ..Default::default()
        };
        assert_eq!(entry.resolved_url(), Some("https://b"));
        assert_eq!(PlaylistEntry::default().resolved_url(), None);
    }
}
