//! 外部工具（yt-dlp / ffmpeg）查找、版本探测与安装。

use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use thiserror::Error;
use tracing::{debug, info, warn};
use which::which;

use super::context::Config;

pub const YTDLP: &str = "yt-dlp";
pub const FFMPEG: &str = "ffmpeg";

#[derive(Debug, Error)]
pub enum ToolError {
    #[error("{0} not found in PATH")]
    NotFound(&'static str),
    #[error("configured {tool} path does not exist: {path}")]
    BadOverride { tool: &'static str, path: PathBuf },
    #[error("failed to run {program}: {source}")]
    Run {
        program: String,
        #[source]
        source: std::io::Error,
    },
    #[error("{program} exited with {status}")]
    Failed { program: String, status: String },
}

/// 启动时探测外部工具的结果。
#[derive(Debug, Clone, Default)]
pub struct ToolStatus {
    pub ytdlp: Option<PathBuf>,
    pub ytdlp_version: Option<String>,
    pub ffmpeg: Option<PathBuf>,
}

impl ToolStatus {
    pub fn ytdlp_ready(&self) -> bool {
        self.ytdlp.is_some() && self.ytdlp_version.is_some()
    }
}

/// 查找 `binary`，优先使用配置中给出的路径。
pub fn locate(binary: &'static str, configured: Option<&Path>) -> Result<PathBuf, ToolError> {
    if let Some(path) = configured {
        if path.is_file() {
            return Ok(path.to_path_buf());
        }
        // 配置里只写了程序名时，和默认一样在 PATH 中查找。
        if path.components().count() == 1 {
            return which(path).map_err(|_| ToolError::NotFound(binary));
        }
        return Err(ToolError::BadOverride {
            tool: binary,
            path: path.to_path_buf(),
        });
    }
    which(binary).map_err(|_| ToolError::NotFound(binary))
}

/// 执行 `program --version`，取 stdout 第一行非空内容。
pub fn probe_version(program: &Path) -> Result<String, ToolError> {
    let output = Command::new(program)
        .arg("--version")
        .stdin(Stdio::null())
        .output()
        .map_err(|source| ToolError::Run {
            program: program.display().to_string(),
            source,
        })?;
    if !output.status.success() {
        return Err(ToolError::Failed {
            program: program.display().to_string(),
            status: output.status.to_string(),
        });
    }
    let stdout = String::from_utf8_lossy(&output.stdout);
    Ok(stdout
        .lines()
        .map(str::trim)
        .find(|l| !l.is_empty())
        .unwrap_or_default()
        .to_string())
}

/// 启动时探测一次 yt-dlp 与 ffmpeg 并记录日志。
///
/// 不会返回错误：缺少 yt-dlp 时下载阶段会给出明确提示；缺少 ffmpeg 只影响格式选择。
pub fn check_dependencies(config: &Config) -> ToolStatus {
    let mut status = ToolStatus::default();

    match locate(YTDLP, config.ytdlp_override().as_deref()) {
        Ok(path) => {
            match probe_version(&path) {
                Ok(version) => {
                    info!(target: "tools", path = %path.display(), "yt-dlp 版本：{}", version);
                    status.ytdlp_version = Some(version);
                }
                Err(e) => warn!(target: "tools", "yt-dlp 无法运行：{}", e),
            }
            status.ytdlp = Some(path);
        }
        Err(e) => warn!(
            target: "tools",
            "{}；可使用 --install-ytdlp 安装或在 config.yml 中设置 ytdlp_path",
            e
        ),
    }

    match locate(FFMPEG, config.ffmpeg_override().as_deref()) {
        Ok(path) => {
            debug!(target: "tools", path = %path.display(), "找到 ffmpeg");
            status.ffmpeg = Some(path);
        }
        Err(e) => warn!(target: "tools", "{}；视频将使用单文件格式，音频不转码", e),
    }

    status
}

/// 通过 pip 安装或升级 yt-dlp 的命令。
///
/// 可用环境变量 `YTDLP_PYTHON` 指定解释器。
pub fn install_command() -> (String, Vec<String>) {
    let python = std::env::var("YTDLP_PYTHON")
        .ok()
        .filter(|p| !p.trim().is_empty())
        .unwrap_or_else(default_python);
    let args = ["-m", "pip", "install", "-U", YTDLP]
        .iter()
        .map(|s| s.to_string())
        .collect();
    (python, args)
}

fn default_python() -> String {
    if cfg!(windows) {
        "python".to_string()
    } else {
        "python3".to_string()
    }
}

pub fn install_ytdlp() -> Result<(), ToolError> {
    let (python, args) = install_command();
    info!(target: "tools", "正在安装 yt-dlp：{} {}", python, args.join(" "));
    let status = Command::new(&python)
        .args(&args)
        .status()
        .map_err(|source| ToolError::Run {
            program: python.clone(),
            source,
        })?;
    if status.success() {
        info!(target: "tools", "yt-dlp 安装完成");
        Ok(())
    } else {
        Err(ToolError::Failed {
            program: python,
            status: status.to_string(),
        })
    }
}
