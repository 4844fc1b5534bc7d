//! 后台下载线程调度。
//!
//! 同一时间只允许一个任务运行（[`JobGate`]）；工作线程通过单写单读的
//! channel 把进度事件与最终结果交回界面线程。

use std::panic::{self, AssertUnwindSafe};
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::Sender;
use std::thread;

use tracing::{error, info, warn};

use super::downloader::Downloader;
use super::errors::DownloadError;
use super::extractor::MediaTool;
use super::models::{AudioSettings, BatchSummary, JobRequest, ProgressEvent};
use super::progress::ProgressReporter;

#[derive(Debug)]
pub enum WorkerMsg {
    Progress(ProgressEvent),
    /// 每个任务恰好发送一次，且在释放任务锁之后。
    Done(Result<BatchSummary, DownloadError>),
}

/// 界面与后台线程共享的单任务锁。
#[derive(Debug, Clone, Default)]
pub struct JobGate {
    busy: Arc<AtomicBool>,
}

impl JobGate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::SeqCst)
    }

    pub fn try_acquire(&self) -> Option<JobPermit> {
        self.busy
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .ok()
            .map(|_| JobPermit {
                busy: self.busy.clone(),
            })
    }
}

/// 持有即表示有任务在运行；drop 时释放任务锁。
#[derive(Debug)]
pub struct JobPermit {
    busy: Arc<AtomicBool>,
}

impl Drop for JobPermit {
    fn drop(&mut self) {
        self.busy.store(false, Ordering::SeqCst);
    }
}

/// Settings the worker needs besides the request itself.
#[derive(Debug, Clone, Default)]
pub struct WorkerContext {
    pub transcoder: Option<PathBuf>,
    pub audio: AudioSettings,
}

/// Handle to a running job.
#[derive(Debug, Clone)]
pub struct JobHandle {
    cancel: Arc<AtomicBool>,
}

impl JobHandle {
    pub fn cancel(&self) {
        self.cancel.store(true, Ordering::SeqCst);
    }

    pub fn is_cancel_requested(&self) -> bool {
        self.cancel.load(Ordering::SeqCst)
    }
}

/// 在后台线程上启动任务。
///
/// 已有任务持有锁时返回 [`DownloadError::Busy`]。
pub fn spawn_job(
    gate: &JobGate,
    tool: Arc<dyn MediaTool>,
    ctx: WorkerContext,
    request: JobRequest,
    tx: Sender<WorkerMsg>,
) -> Result<JobHandle, DownloadError> {
    let permit = gate.try_acquire().ok_or(DownloadError::Busy)?;
    let cancel = Arc::new(AtomicBool::new(false));
    let handle = JobHandle {
        cancel: cancel.clone(),
    };

    let spawned = thread::Builder::new()
        .name("download-worker".to_string())
        .spawn(move || {
            let progress_tx = tx.clone();
            let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
                let mut reporter = ProgressReporter::new(Some(Box::new(move |ev: ProgressEvent| {
                    let _ = progress_tx.send(WorkerMsg::Progress(ev));
                })));
                Downloader::new(tool.as_ref(), ctx.transcoder, ctx.audio)
                    .with_cancel(cancel)
                    .run(&request, &mut reporter)
            }));

            let result = match outcome {
                Ok(result) => result,
                Err(payload) => Err(DownloadError::Unexpected(panic_message(payload.as_ref()))),
            };
            match &result {
                Ok(summary) => {
                    info!(target: "download", attempted = summary.attempted(), "任务结束")
                }
                Err(e) if e.is_canceled() => warn!(target: "download", "任务已取消"),
                Err(e) => error!(target: "download", "任务失败：{}", e),
            }

            drop(permit);
            let _ = tx.send(WorkerMsg::Done(result));
        });

    match spawned {
        Ok(_) => Ok(handle),
        // 启动失败时闭包连同其中的 permit 一起被丢弃，任务锁随之释放。
        Err(e) => Err(DownloadError::Unexpected(format!("failed to start worker thread: {e}"))),
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "worker panicked".to_string()
    }
}
