//! 全局配置结构（Config）与默认值。
//!
//! 该模块同时提供生成 `config.yml` 的字段元信息。

use std::path::{Component, Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::warn;

use super::config::{ConfigError, ConfigSpec, FieldMeta};
use crate::download::models::{AudioSettings, MediaKind, Platform, QUALITY_CHOICES};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    // 程序配置
    #[serde(default = "default_false")]
    pub old_cli: bool,
    #[serde(default = "default_true")]
    pub archive_logs_on_exit: bool,

    // 路径配置
    #[serde(default)]
    pub save_path: String,
    #[serde(default = "default_single_folder")]
    pub single_folder: String,

    // 表单默认值
    #[serde(default = "default_platform")]
    pub default_platform: String,
    #[serde(default = "default_media_kind")]
    pub default_media_kind: String,
    #[serde(default = "default_playlist_quality")]
    pub playlist_quality: u32,

    // 音频配置
    #[serde(default = "default_audio_format")]
    pub audio_format: String,
    #[serde(default = "default_audio_quality")]
    pub audio_quality: u32,

    // 外部工具
    #[serde(default)]
    pub ytdlp_path: String,
    #[serde(default)]
    pub ffmpeg_path: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            old_cli: default_false(),
            archive_logs_on_exit: default_true(),
            save_path: String::new(),
            single_folder: default_single_folder(),
            default_platform: default_platform(),
            default_media_kind: default_media_kind(),
            playlist_quality: default_playlist_quality(),
            audio_format: default_audio_format(),
            audio_quality: default_audio_quality(),
            ytdlp_path: String::new(),
            ffmpeg_path: String::new(),
        }
    }
}

impl ConfigSpec for Config {
    const FILE_NAME: &'static str = "config.yml";

    fn fields() -> &'static [FieldMeta] {
        static FIELDS: [FieldMeta; 11] = [
            FieldMeta {
                name: "old_cli",
                description: "是否使用老版本命令行界面",
            },
            FieldMeta {
                name: "archive_logs_on_exit",
                description: "退出时将 latest.log 打包归档",
            },
            FieldMeta {
                name: "save_path",
                description: "下载保存根目录（留空为当前目录）",
            },
            FieldMeta {
                name: "single_folder",
                description: "单个视频下载的子文件夹",
            },
            FieldMeta {
                name: "default_platform",
                description: "默认平台：facebook / instagram / tiktok",
            },
            FieldMeta {
                name: "default_media_kind",
                description: "默认下载类型：video / audio",
            },
            FieldMeta {
                name: "playlist_quality",
                description: "播放列表默认最高画质：1080 / 720 / 480 / 360",
            },
            FieldMeta {
                name: "audio_format",
                description: "音频提取格式（需要 ffmpeg）",
            },
            FieldMeta {
                name: "audio_quality",
                description: "音频码率（kbit/s）",
            },
            FieldMeta {
                name: "ytdlp_path",
                description: "yt-dlp 可执行文件路径（留空则从 PATH 查找）",
            },
            FieldMeta {
                name: "ffmpeg_path",
                description: "ffmpeg 可执行文件路径（留空则从 PATH 查找）",
            },
        ];
        &FIELDS
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if !QUALITY_CHOICES.contains(&self.playlist_quality) {
            return Err(ConfigError::Validation(format!(
                "playlist_quality 必须是 1080 / 720 / 480 / 360 之一，当前为 {}",
                self.playlist_quality
            )));
        }
        if self.audio_quality == 0 {
            return Err(ConfigError::Validation("audio_quality 必须大于 0".to_string()));
        }
        if self.audio_format.trim().is_empty() {
            return Err(ConfigError::Validation("audio_format 不能为空".to_string()));
        }
        Ok(())
    }
}

impl Config {
    pub fn default_save_dir(&self) -> PathBuf {
        if self.save_path.trim().is_empty() {
            std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."))
        } else {
            PathBuf::from(self.save_path.trim())
        }
    }

    /// 单个视频的保存目录。
    pub fn single_dir(&self) -> PathBuf {
        let folder = self.single_folder.trim();
        if folder.is_empty() {
            self.default_save_dir().join(default_single_folder())
        } else {
            self.resolve_folder(folder)
        }
    }

    /// 把用户输入的文件夹名解析到 `save_path` 下。
    ///
    /// 绝对路径原样使用；相对路径的每一段都会做文件名安全处理。
    pub fn resolve_folder(&self, folder: &str) -> PathBuf {
        let raw = Path::new(folder.trim());
        if raw.is_absolute() {
            return raw.to_path_buf();
        }
        let mut out = self.default_save_dir();
        for comp in raw.components() {
            match comp {
                Component::Normal(part) => {
                    out.push(safe_fs_name(&part.to_string_lossy(), "_", 120));
                }
                Component::ParentDir => out.push(".."),
                _ => {}
            }
        }
        out
    }

    pub fn preferred_platform(&self) -> Platform {
        match self.default_platform.parse::<Platform>() {
            Ok(p) if Platform::SOCIAL.contains(&p) => p,
            _ => {
                warn!(target: "startup", value = %self.default_platform, "default_platform 无效，使用 facebook");
                Platform::Facebook
            }
        }
    }

    pub fn preferred_media_kind(&self) -> MediaKind {
        self.default_media_kind.parse::<MediaKind>().unwrap_or_else(|_| {
            warn!(target: "startup", value = %self.default_media_kind, "default_media_kind 无效，使用 video");
            MediaKind::Video
        })
    }

    pub fn audio_settings(&self) -> AudioSettings {
        AudioSettings {
            format: self.audio_format.trim().to_string(),
            bitrate_kbps: self.audio_quality,
        }
    }

    pub fn ytdlp_override(&self) -> Option<PathBuf> {
        non_empty_path(&self.ytdlp_path)
    }

    pub fn ffmpeg_override(&self) -> Option<PathBuf> {
        non_empty_path(&self.ffmpeg_path)
    }
}

fn non_empty_path(raw: &str) -> Option<PathBuf> {
    let trimmed = raw.trim();
    (!trimmed.is_empty()).then(|| PathBuf::from(trimmed))
}

/// 将 `name` 处理为各桌面系统都可用的单段文件名。
pub fn safe_fs_name(name: &str, replacement: &str, max_len: usize) -> String {
    let repl = replacement.chars().next().unwrap_or('_');
    let mut cleaned: String = name
        .chars()
        .map(|ch| match ch {
            ':' | '"' | '<' | '>' | '/' | '\\' | '|' | '?' | '*' => repl,
            c if (c as u32) < 32 => repl,
            _ => ch,
        })
        .collect();

    while cleaned.ends_with(' ') || cleaned.ends_with('.') {
        cleaned.pop();
    }

    if cleaned.is_empty() {
        cleaned.push_str("unnamed");
    }

    const RESERVED: [&str; 22] = [
        "CON", "PRN", "AUX", "NUL", "COM1", "COM2", "COM3", "COM4", "COM5", "COM6", "COM7", "COM8",
        "COM9", "LPT1", "LPT2", "LPT3", "LPT4", "LPT5", "LPT6", "LPT7", "LPT8", "LPT9",
    ];
    if RESERVED.contains(&cleaned.to_uppercase().as_str()) {
        cleaned = format!("_{}", cleaned);
    }

    if cleaned.len() > max_len {
        // 不能在多字节字符中间截断
        let mut end = max_len;
        while !cleaned.is_char_boundary(end) && end > 0 {
            end -= 1;
        }
        cleaned.truncate(end);
        while cleaned.ends_with(' ') || cleaned.ends_with('.') {
            cleaned.pop();
        }
        if cleaned.is_empty() {
            cleaned.push_str("unnamed");
        }
    }

    cleaned
}

fn default_false() -> bool {
    false
}

fn default_true() -> bool {
    true
}

fn default_single_folder() -> String {
    "downloaded_items".to_string()
}

fn default_platform() -> String {
    Platform::Facebook.tag().to_string()
}

fn default_media_kind() -> String {
    MediaKind::Video.tag().to_string()
}

fn default_playlist_quality() -> u32 {
    720
}

fn default_audio_format() -> String {
    "mp3".to_string()
}

fn default_audio_quality() -> u32 {
    192
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::base_system::config::load_or_create_with_base;
    use std::fs;

    #[test]
    fn defaults_round_trip_through_file() {
        let dir = tempfile::tempdir().unwrap();
        let cfg: Config = load_or_create_with_base(None, Some(dir.path())).unwrap();
        assert_eq!(cfg.single_folder, "downloaded_items");
        assert_eq!(cfg.playlist_quality, 720);
        assert_eq!(cfg.audio_settings(), AudioSettings::default());

        let again: Config = load_or_create_with_base(None, Some(dir.path())).unwrap();
        assert_eq!(again.audio_format, "mp3");
    }

    #[test]
    fn rejects_unsupported_quality() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("config.yml"), "playlist_quality: 1440\n").unwrap();
        let err = load_or_create_with_base::<Config>(None, Some(dir.path())).unwrap_err();
        assert!(matches!(err, ConfigError::Validation(_)));
    }

    #[test]
    fn unknown_defaults_fall_back() {
        let cfg = Config {
            default_platform: "myspace".into(),
            default_media_kind: "gif".into(),
            ..Config::default()
        };
        assert_eq!(cfg.preferred_platform(), Platform::Facebook);
        assert_eq!(cfg.preferred_media_kind(), MediaKind::Video);

        let cfg = Config {
            default_platform: "TikTok".into(),
            default_media_kind: "audio".into(),
            ..Config::default()
        };
        assert_eq!(cfg.preferred_platform(), Platform::TikTok);
        assert_eq!(cfg.preferred_media_kind(), MediaKind::Audio);
    }

    #[test]
    fn folders_resolve_under_save_path() {
        let cfg = Config {
            save_path: "/data/media".into(),
            ..Config::default()
        };
        assert_eq!(cfg.single_dir(), PathBuf::from("/data/media/downloaded_items"));
        assert_eq!(
            cfg.resolve_folder("My: list?"),
            PathBuf::from("/data/media/My_ list_")
        );
        assert_eq!(cfg.resolve_folder("/abs/dir"), PathBuf::from("/abs/dir"));
    }

    #[test]
    fn safe_fs_name_cleans_reserved_and_trailing() {
        assert_eq!(safe_fs_name("a/b\\c", "_", 50), "a_b_c");
        assert_eq!(safe_fs_name("con", "_", 50), "_con");
        assert_eq!(safe_fs_name("name. ", "_", 50), "name");
        assert_eq!(safe_fs_name("", "_", 50), "unnamed");
        assert_eq!(safe_fs_name("中文标题", "_", 4), "中");
    }
}
