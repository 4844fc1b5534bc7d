//! 下载主流程编排：单个视频与播放列表。
//!
//! 条目严格顺序执行；单个条目失败只记录并计数，批次继续。
//! 播放列表元数据失败或没有可下载条目时整个批次以错误结束。

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tracing::{debug, error, info, warn};

use super::errors::DownloadError;
use super::extractor::MediaTool;
use super::invocation::download_args;
use super::models::{
    AudioSettings, BatchSummary, DownloadJob, JobRequest, Platform, PlaylistInfo,
    PlaylistRequest, ResolvedItem,
};
use super::progress::{ProgressLine, ProgressReporter, parse_progress_line};
use super::range::IndexSet;

pub struct Downloader<'a> {
    tool: &'a dyn MediaTool,
    transcoder: Option<PathBuf>,
    audio: AudioSettings,
    cancel: Option<Arc<AtomicBool>>,
}

impl<'a> Downloader<'a> {
    pub fn new(tool: &'a dyn MediaTool, transcoder: Option<PathBuf>, audio: AudioSettings) -> Self {
        Self {
            tool,
            transcoder,
            audio,
            cancel: None,
        }
    }

    pub fn with_cancel(mut self, cancel: Arc<AtomicBool>) -> Self {
        self.cancel = Some(cancel);
        self
    }

    fn canceled(&self) -> bool {
        self.cancel
            .as_ref()
            .map(|c| c.load(Ordering::SeqCst))
            .unwrap_or(false)
    }

    pub(crate) fn run(
        &self,
        request: &JobRequest,
        reporter: &mut ProgressReporter,
    ) -> Result<BatchSummary, DownloadError> {
        match request {
            JobRequest::Single { platform, job } => self.download_single(*platform, job, reporter),
            JobRequest::Playlist(req) => self.download_playlist(req, reporter),
        }
    }

    pub(crate) fn download_single(
        &self,
        platform: Platform,
        job: &DownloadJob,
        reporter: &mut ProgressReporter,
    ) -> Result<BatchSummary, DownloadError> {
        let output_dir = ensure_dir(&job.dest_dir)?;
        info!(target: "download", platform = platform.tag(), kind = job.kind.tag(), "开始下载 {} {}", platform, job.kind);
        info!(target: "download", "链接：{}", job.url);
        info!(target: "download", "保存位置：{}", output_dir.display());
        if self.transcoder.is_none() {
            warn!(target: "download", "未找到 ffmpeg，使用无需后处理的格式");
        }

        let ok = self.run_item(job, 1, 1, None, reporter)?;
        if !ok {
            return Err(DownloadError::ItemFailed);
        }

        info!(target: "download", "下载完成，文件位于 {}", output_dir.display());
        Ok(BatchSummary {
            output_dir,
            succeeded: 1,
            failed: 0,
            skipped: 0,
        })
    }

    pub(crate) fn download_playlist(
        &self,
        req: &PlaylistRequest,
        reporter: &mut ProgressReporter,
    ) -> Result<BatchSummary, DownloadError> {
        let output_dir = ensure_dir(&req.dest_dir)?;
        info!(target: "download", "获取播放列表信息…");
        let info = self.tool.fetch_playlist(&req.url).map_err(|e| match e {
            DownloadError::PlaylistMetadata(_) | DownloadError::ToolMissing(_) => e,
            other => DownloadError::PlaylistMetadata(other.to_string()),
        })?;

        info!(
            target: "download",
            "播放列表：{}",
            info.title.as_deref().unwrap_or("Untitled Playlist")
        );
        info!(target: "download", total = info.entries.len(), "共 {} 个视频", info.entries.len());
        debug!(target: "download", "选择位置：{}", req.indices);
        if self.transcoder.is_none() {
            warn!(target: "download", "未找到 ffmpeg，使用无需后处理的格式");
        }

        let (items, skipped) = resolve_items(&info, &req.indices);
        if items.is_empty() {
            return Err(DownloadError::NoResolvableItems);
        }

        let total = items.len();
        let mut summary = BatchSummary {
            output_dir: output_dir.clone(),
            skipped,
            ..Default::default()
        };

        for (n, item) in items.iter().enumerate() {
            if self.canceled() {
                info!(target: "download", "收到停止信号，结束任务");
                return Err(DownloadError::Canceled);
            }
            let label = item.title.as_deref().unwrap_or(&item.url);
            info!(target: "download", "下载第 {}/{} 个（位置 {}）：{}", n + 1, total, item.position + 1, label);

            let job = DownloadJob {
                url: item.url.clone(),
                dest_dir: output_dir.clone(),
                kind: req.kind,
                max_height: req.max_height,
            };
            match self.run_item(&job, n + 1, total, item.title.as_deref(), reporter) {
                Ok(true) => summary.succeeded += 1,
                Ok(false) => {
                    warn!(target: "download", "位置 {} 下载失败，继续下一个", item.position + 1);
                    summary.failed += 1;
                }
                Err(DownloadError::Canceled) => return Err(DownloadError::Canceled),
                Err(e @ DownloadError::ToolMissing(_)) => return Err(e),
                Err(e) => {
                    error!(target: "download", "位置 {} 出错：{}", item.position + 1, e);
                    summary.failed += 1;
                }
            }
        }

        info!(
            target: "download",
            succeeded = summary.succeeded,
            failed = summary.failed,
            skipped = summary.skipped,
            "播放列表完成：成功 {}，失败 {}，跳过 {}；文件位于 {}",
            summary.succeeded,
            summary.failed,
            summary.skipped,
            output_dir.display()
        );
        Ok(summary)
    }

    /// 下载单个条目。`Ok(false)` 表示该条目失败，但批次可以继续。
    fn run_item(
        &self,
        job: &DownloadJob,
        item: usize,
        total: usize,
        label: Option<&str>,
        reporter: &mut ProgressReporter,
    ) -> Result<bool, DownloadError> {
        let args = download_args(job, &self.audio, self.transcoder.as_deref());
        debug!(target: "download", tool = self.tool.name(), ?args, "调用下载器");
        reporter.start_item(item, total, label);

        let mut saw_error = false;
        let exited_ok = self.tool.run_download(
            &args,
            self.cancel.as_deref(),
            &mut |raw: &str| {
                debug!(target: "yt-dlp", "{}", raw);
                match parse_progress_line(raw) {
                    Some(ProgressLine::Error(msg)) => {
                        saw_error = true;
                        error!(target: "download", "{}", msg);
                    }
                    Some(ProgressLine::AlreadyDownloaded(name)) => {
                        info!(
                            target: "download",
                            "已存在，跳过下载：{}",
                            name.as_deref().unwrap_or(&job.url)
                        );
                        reporter.apply(&ProgressLine::AlreadyDownloaded(name));
                    }
                    Some(line) => reporter.apply(&line),
                    None => {}
                }
            },
        )?;

        let ok = exited_ok && !saw_error;
        if ok {
            reporter.finish_item();
        }
        Ok(ok)
    }
}

/// 把位置集合映射到播放列表条目。
///
/// 返回按位置排序的可下载条目，以及被跳过的数量（超出范围、不可用或缺少链接）。
pub fn resolve_items(info: &PlaylistInfo, indices: &IndexSet) -> (Vec<ResolvedItem>, u32) {
    let mut items = Vec::with_capacity(indices.len());
    let mut skipped = 0u32;
    for pos in indices.iter() {
        match info.entries.get(pos) {
            None => {
                warn!(target: "download", "跳过位置 {}：超出播放列表范围（共 {} 个）", pos + 1, info.entries.len());
                skipped += 1;
            }
            Some(None) => {
                warn!(target: "download", "跳过位置 {}：视频不可用", pos + 1);
                skipped += 1;
            }
            Some(Some(entry)) => match entry.resolved_url() {
                Some(url) => items.push(ResolvedItem {
                    position: pos,
                    url: url.to_string(),
                    title: entry.title.clone(),
                }),
                None => {
                    warn!(target: "download", "跳过位置 {}：缺少视频链接", pos + 1);
                    skipped += 1;
                }
            },
        }
    }
    (items, skipped)
}

/// 按需创建目录并返回绝对路径。
fn ensure_dir(dir: &Path) -> Result<PathBuf, DownloadError> {
    fs::create_dir_all(dir).map_err(|source| DownloadError::CreateDir {
        path: dir.to_path_buf(),
        source,
    })?;
    Ok(fs::canonicalize(dir).unwrap_or_else(|_| dir.to_path_buf()))
}
