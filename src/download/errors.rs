//! 下载流程的错误类型。
//!
//! 按来源分为三类：输入校验（`InputError`/`RangeError`）、批次级失败与意外错误
//! （`DownloadError`）。单个条目的失败不会以错误形式冒泡，只记录日志并计入统计。

use std::io;
use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RangeError {
    #[error("range is empty")]
    Empty,
    #[error("empty entry in range (check for doubled commas)")]
    EmptyToken,
    #[error("'{0}' is not a whole number")]
    NotANumber(String),
    #[error("'{0}' is not a valid start-end pair")]
    MalformedPair(String),
    #[error("positions start at 1, got {0}")]
    NotPositive(String),
    #[error("range {start}-{end} runs backwards")]
    Descending { start: usize, end: usize },
    #[error("position {value} is beyond the playlist limit of {max}")]
    TooLarge { value: usize, max: usize },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InputError {
    #[error("please fill in the {0}")]
    MissingField(&'static str),
    #[error("please enter a valid {platform} URL")]
    WrongPlatform { platform: &'static str },
    #[error("invalid video range: {0}")]
    Range(#[from] RangeError),
    #[error("unsupported quality {0}p (choose 1080, 720, 480 or 360)")]
    Quality(u32),
}

#[derive(Debug, Error)]
pub enum DownloadError {
    #[error(transparent)]
    Input(#[from] InputError),
    #[error("{0} not found, install it or set its path in config.yml")]
    ToolMissing(String),
    #[error("failed to start {tool}: {source}")]
    Spawn {
        tool: String,
        #[source]
        source: io::Error,
    },
    #[error("failed to create folder {path}: {source}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("error processing playlist: {0}")]
    PlaylistMetadata(String),
    #[error("no valid videos to download")]
    NoResolvableItems,
    #[error("download failed, check the log for details")]
    ItemFailed,
    #[error("download canceled")]
    Canceled,
    #[error("another download is already running")]
    Busy,
    #[error("an error occurred: {0}")]
    Unexpected(String),
}

impl DownloadError {
    pub fn is_canceled(&self) -> bool {
        matches!(self, Self::Canceled)
    }
}
