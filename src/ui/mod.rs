//! 交互层入口。
//!
//! 包含 TUI 与无 UI（旧 CLI）两套交互实现，二者共用 [`Session`] 与表单校验。

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::mpsc::Sender;

use crate::base_system::context::Config;
use crate::base_system::tools::{ToolStatus, YTDLP};
use crate::download::errors::DownloadError;
use crate::download::extractor::{MediaTool, YtDlp};
use crate::download::models::JobRequest;
use crate::download::worker::{JobGate, JobHandle, WorkerContext, WorkerMsg, spawn_job};

pub mod form;
pub mod noui;
pub mod tui;

/// 界面派发下载任务所需的全部上下文。
pub struct Session {
    pub config: Config,
    pub tools: ToolStatus,
    tool: Arc<dyn MediaTool>,
    gate: JobGate,
}

impl Session {
    pub fn new(config: Config, tools: ToolStatus) -> Self {
        // 未找到可执行文件时仍按程序名调用，出错信息里能看到工具名。
        let program = tools.ytdlp.clone().unwrap_or_else(|| PathBuf::from(YTDLP));
        Self::with_tool(config, tools, Arc::new(YtDlp::new(program)))
    }

    pub(crate) fn with_tool(config: Config, tools: ToolStatus, tool: Arc<dyn MediaTool>) -> Self {
        Self {
            config,
            tools,
            tool,
            gate: JobGate::new(),
        }
    }

    pub fn is_busy(&self) -> bool {
        self.gate.is_busy()
    }

    pub fn start(
        &self,
        request: JobRequest,
        tx: Sender<WorkerMsg>,
    ) -> Result<JobHandle, DownloadError> {
        let ctx = WorkerContext {
            transcoder: self.tools.ffmpeg.clone(),
            audio: self.config.audio_settings(),
        };
        spawn_job(&self.gate, self.tool.clone(), ctx, request, tx)
    }
}
