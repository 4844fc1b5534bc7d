//! yt-dlp 命令行参数构造。

use std::path::Path;

use super::models::{AudioSettings, DownloadJob, MediaKind};

/// Marker prepended to the structured progress lines we ask yt-dlp for.
pub const PROGRESS_PREFIX: &str = "[progress]";

pub const OUTPUT_TEMPLATE: &str = "%(title)s.%(ext)s";

pub fn progress_template() -> String {
    format!(
        "download:{PROGRESS_PREFIX}%(progress._percent_str)s|%(progress._speed_str)s|%(progress._eta_str)s|%(progress.filename)s"
    )
}

/// 下载任务的格式选择串。
///
/// 没有 ffmpeg 时 yt-dlp 无法合并音视频流，只请求已封装好的格式。
pub fn format_selector(kind: MediaKind, max_height: u32, has_transcoder: bool) -> String {
    match kind {
        MediaKind::Audio => "bestaudio/best".to_string(),
        MediaKind::Video if has_transcoder => format!(
            "bestvideo[height<={h}][ext=mp4]+bestaudio[ext=m4a]/bestvideo[height<={h}]+bestaudio/best[height<={h}]",
            h = max_height
        ),
        MediaKind::Video => format!("best[height<={h}][ext=mp4]/best[height<={h}]/best", h = max_height),
    }
}

pub fn output_template(dest_dir: &Path) -> String {
    dest_dir.join(OUTPUT_TEMPLATE).to_string_lossy().to_string()
}

/// 下载单个条目的完整参数列表。
pub fn download_args(
    job: &DownloadJob,
    audio: &AudioSettings,
    transcoder: Option<&Path>,
) -> Vec<String> {
    let mut args = vec![
        "--newline".to_string(),
        "--no-warnings".to_string(),
        "--no-playlist".to_string(),
        "--progress-template".to_string(),
        progress_template(),
        "-o".to_string(),
        output_template(&job.dest_dir),
        "-f".to_string(),
        format_selector(job.kind, job.max_height, transcoder.is_some()),
    ];

    if let Some(ffmpeg) = transcoder {
        args.push("--ffmpeg-location".to_string());
        args.push(ffmpeg.to_string_lossy().to_string());

        if job.kind == MediaKind::Audio {
            args.extend([
                "--extract-audio".to_string(),
                "--audio-format".to_string(),
                audio.format.clone(),
                "--audio-quality".to_string(),
                format!("{}K", audio.bitrate_kbps),
            ]);
        }
    }

    args.push(job.url.clone());
    args
}

/// Metadata-only listing of a playlist (no media is fetched).
pub fn playlist_query_args(url: &str) -> Vec<String> {
    vec![
        "--flat-playlist".to_string(),
        "--dump-single-json".to_string(),
        "--no-warnings".to_string(),
        url.to_string(),
    ]
}
