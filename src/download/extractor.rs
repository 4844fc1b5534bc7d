//! 外部下载器抽象与 yt-dlp 子进程实现。

use std::io::{BufRead, BufReader, Read};
use std::path::PathBuf;
use std::process::{Command, Stdio};
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

use crossbeam_channel::RecvTimeoutError;
use serde_json::Value;
use tracing::{debug, warn};

use super::errors::DownloadError;
use super::invocation::playlist_query_args;
use super::models::{PlaylistEntry, PlaylistInfo};

const CANCEL_POLL: Duration = Duration::from_millis(200);

/// 调度器眼中的外部解析/下载工具。
pub trait MediaTool: Send + Sync {
    fn name(&self) -> &str;

    /// 只取元数据的播放列表（或单个视频）查询。
    fn fetch_playlist(&self, url: &str) -> Result<PlaylistInfo, DownloadError>;

    /// 执行一次下载，每行输出都交给 `on_line`。
    ///
    /// 返回工具是否正常退出。`cancel` 被置位时终止子进程并返回
    /// [`DownloadError::Canceled`]。
    fn run_download(
        &self,
        args: &[String],
        cancel: Option<&AtomicBool>,
        on_line: &mut dyn FnMut(&str),
    ) -> Result<bool, DownloadError>;
}

pub struct YtDlp {
    program: PathBuf,
}

impl YtDlp {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }

    fn spawn_error(&self, source: std::io::Error) -> DownloadError {
        if source.kind() == std::io::ErrorKind::NotFound {
            DownloadError::ToolMissing(self.program.display().to_string())
        } else {
            DownloadError::Spawn {
                tool: self.program.display().to_string(),
                source,
            }
        }
    }
}

impl MediaTool for YtDlp {
    fn name(&self) -> &str {
        "yt-dlp"
    }

    fn fetch_playlist(&self, url: &str) -> Result<PlaylistInfo, DownloadError> {
        let args = playlist_query_args(url);
        debug!(target: "download", program = %self.program.display(), ?args, "查询播放列表");
        let output = Command::new(&self.program)
            .args(&args)
            .stdin(Stdio::null())
            .output()
            .map_err(|e| self.spawn_error(e))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let reason = stderr
                .lines()
                .rev()
                .find(|l| !l.trim().is_empty())
                .map(|l| l.trim().trim_start_matches("ERROR:").trim().to_string())
                .unwrap_or_else(|| format!("yt-dlp exited with {}", output.status));
            return Err(DownloadError::PlaylistMetadata(reason));
        }

        parse_playlist_json(&String::from_utf8_lossy(&output.stdout))
    }

    fn run_download(
        &self,
        args: &[String],
        cancel: Option<&AtomicBool>,
        on_line: &mut dyn FnMut(&str),
    ) -> Result<bool, DownloadError> {
        let mut child = Command::new(&self.program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| self.spawn_error(e))?;

        // stdout 与 stderr 合并为同一行流。
        let (tx, rx) = crossbeam_channel::unbounded::<String>();
        let mut readers = Vec::new();
        if let Some(out) = child.stdout.take() {
            readers.push(spawn_line_reader(out, tx.clone()));
        }
        if let Some(err) = child.stderr.take() {
            readers.push(spawn_line_reader(err, tx.clone()));
        }
        drop(tx);

        let is_canceled = || cancel.is_some_and(|c| c.load(Ordering::SeqCst));
        loop {
            if is_canceled() {
                warn!(target: "download", "收到取消请求，终止 yt-dlp");
                let _ = child.kill();
                let _ = child.wait();
                return Err(DownloadError::Canceled);
            }
            match rx.recv_timeout(CANCEL_POLL) {
                Ok(line) => on_line(&line),
                Err(RecvTimeoutError::Timeout) => continue,
                Err(RecvTimeoutError::Disconnected) => break,
            }
        }

        for handle in readers {
            let _ = handle.join();
        }
        let status = child.wait().map_err(|e| self.spawn_error(e))?;
        debug!(target: "download", %status, "yt-dlp 退出");
        Ok(status.success())
    }
}

fn spawn_line_reader<R: Read + Send + 'static>(
    source: R,
    tx: crossbeam_channel::Sender<String>,
) -> thread::JoinHandle<()> {
    thread::spawn(move || {
        let mut reader = BufReader::new(source);
        let mut buf = Vec::new();
        loop {
            buf.clear();
            match reader.read_until(b'\n', &mut buf) {
                Ok(0) | Err(_) => break,
                Ok(_) => {
                    let line = String::from_utf8_lossy(&buf);
                    let line = line.trim_end_matches(['\r', '\n']);
                    if tx.send(line.to_string()).is_err() {
                        break;
                    }
                }
            }
        }
    })
}

/// 解析 flat playlist 查询的 `--dump-single-json` 输出。
///
/// 没有 `entries` 的结果是单个视频，转为只含一项的列表。
pub fn parse_playlist_json(raw: &str) -> Result<PlaylistInfo, DownloadError> {
    let value: Value = serde_json::from_str(raw.trim()).map_err(|e| {
        DownloadError::PlaylistMetadata(format!("invalid metadata from yt-dlp: {e}"))
    })?;

    if !value.is_object() {
        return Err(DownloadError::PlaylistMetadata(
            "Could not extract playlist information".to_string(),
        ));
    }

    let title = value
        .get("title")
        .and_then(Value::as_str)
        .map(str::to_string);

    let entries = match value.get("entries") {
        Some(Value::Array(items)) => items
            .iter()
            .map(|item| {
                if item.is_null() {
                    None
                } else {
                    serde_json::from_value::<PlaylistEntry>(item.clone()).ok()
                }
            })
            .collect(),
        _ => {
            let single = PlaylistEntry {
                id: value.get("id").and_then(Value::as_str).map(str::to_string),
                title: title.clone(),
                url: value
                    .get("webpage_url")
                    .or_else(|| value.get("original_url"))
                    .and_then(Value::as_str)
                    .map(str::to_string),
                webpage_url: None,
            };
            vec![Some(single)]
        }
    };

    if entries.is_empty() {
        return Err(DownloadError::PlaylistMetadata(
            "No videos found in the playlist".to_string(),
        ));
    }

    Ok(PlaylistInfo { title, entries })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_flat_playlist() {
        let raw = r#"{
            "title": "Mix",
            "entries": [
                {"id": "a", "title": "First", "url": "https://www.youtube.com/watch?v=a"},
                null,
                {"id": "c", "title": "Third"}
            ]
        }"#;
        let info = parse_playlist_json(raw).unwrap();
        assert_eq!(info.title.as_deref(), Some("Mix"));
        assert_eq!(info.entries.len(), 3);
        assert_eq!(
            info.entries[0].as_ref().and_then(|e| e.resolved_url()),
            Some("https://www.youtube.com/watch?v=a")
        );
        assert!(info.entries[1].is_none());
        assert_eq!(info.entries[2].as_ref().and_then(|e| e.resolved_url()), None);
    }

    #[test]
    fn single_video_becomes_one_entry() {
        let raw = r#"{"id": "x", "title": "Solo", "webpage_url": "https://youtu.be/x"}"#;
        let info = parse_playlist_json(raw).unwrap();
        assert_eq!(info.entries.len(), 1);
        let entry = info.entries[0].as_ref().unwrap();
        assert_eq!(entry.resolved_url(), Some("https://youtu.be/x"));
        assert_eq!(entry.title.as_deref(), Some("Solo"));
    }

    #[test]
    fn empty_playlist_is_an_error() {
        let err = parse_playlist_json(r#"{"title": "Empty", "entries": []}"#).unwrap_err();
        assert!(matches!(err, DownloadError::PlaylistMetadata(_)));
        assert!(parse_playlist_json("null").is_err());
        assert!(parse_playlist_json("not json").is_err());
    }

    #[test]
    fn missing_binary_is_reported_as_tool_missing() {
        let tool = YtDlp::new("/definitely/not/here/yt-dlp");
        let err = tool
            .run_download(&["--version".to_string()], None, &mut |_| {})
            .unwrap_err();
        assert!(matches!(err, DownloadError::ToolMissing(_)));
    }
}
