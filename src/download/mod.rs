//! 下载流程模块入口。
//!
//! 子模块：
//! - `models`      — 数据模型（Platform / DownloadJob / PlaylistRequest / ProgressEvent 等）
//! - `range`       — 播放列表范围表达式解析
//! - `platform`    — 链接与平台匹配校验
//! - `invocation`  — yt-dlp 参数构造
//! - `progress`    — 输出行解析与进度上报
//! - `extractor`   — 外部下载器抽象与 yt-dlp 实现
//! - `downloader`  — 下载主流程编排
//! - `worker`      — 单任务闸门与后台线程

pub mod downloader;
pub mod errors;
pub mod extractor;
pub mod invocation;
pub mod models;
pub mod platform;
pub mod progress;
pub mod range;
pub mod worker;
