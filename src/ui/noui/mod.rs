//! 无 UI（旧 CLI）交互入口。
//!
//! 使用标准输入输出进行交互，并在进入前尽量恢复终端模式。

use std::io::{self, BufRead, Write};

use anyhow::Result;

use crossterm::event::DisableMouseCapture;
use crossterm::execute;
use crossterm::terminal::{LeaveAlternateScreen, disable_raw_mode};

use crate::download::models::{MediaKind, Platform, QUALITY_CHOICES};
use crate::ui::Session;
use crate::ui::form::{PlaylistForm, SingleForm};

mod download;

pub(crate) use download::summary_text;

pub fn run(session: &Session) -> Result<()> {
    // 之前的 TUI 可能留下 raw mode，逐行输入前先关闭。
    let _ = disable_raw_mode();
    let mut out = io::stdout();
    let _ = execute!(out, DisableMouseCapture, LeaveAlternateScreen);

    println!(
        "Social Media Downloader v{}\n\
支持 Facebook / Instagram / TikTok 单个视频与 YouTube 播放列表下载。\n\
视频保存到 {}",
        env!("CARGO_PKG_VERSION"),
        session.config.single_dir().display()
    );
    if !session.tools.ytdlp_ready() {
        println!("警告：未检测到可用的 yt-dlp，可运行 --install-ytdlp 安装。");
    }

    loop {
        let input = read_line("\n选择模式（1 单个视频 / 2 播放列表 / q 退出）：")?;
        match input.trim() {
            "" => continue,
            "q" | "Q" => {
                println!("已退出。");
                break;
            }
            "1" => single_flow(session)?,
            "2" => playlist_flow(session)?,
            other => println!("无效选择：{}", other),
        }
    }

    Ok(())
}

fn single_flow(session: &Session) -> Result<()> {
    let mut form = SingleForm::from_config(&session.config);

    let choices = Platform::SOCIAL
        .iter()
        .enumerate()
        .map(|(i, p)| format!("{} {}", i + 1, p))
        .collect::<Vec<_>>()
        .join(" / ");
    let picked = read_line(&format!("平台（{}，默认 {}）：", choices, form.platform))?;
    if let Some(platform) = pick_platform(picked.trim()) {
        form.platform = platform;
    } else if !picked.trim().is_empty() {
        println!("无效平台，使用 {}", form.platform);
    }

    form.url = read_line(&format!("{} 链接：", form.platform))?;
    form.kind = prompt_kind(form.kind)?;

    match form.build(&session.config) {
        Ok(request) => download::run_job(session, request),
        Err(e) => {
            println!("输入错误：{}", e);
            Ok(())
        }
    }
}

fn playlist_flow(session: &Session) -> Result<()> {
    let mut form = PlaylistForm::from_config(&session.config);
    form.url = read_line("播放列表链接：")?;
    form.folder = read_line("保存文件夹名：")?;
    form.range = read_line("视频范围（如 1-3,5,7-9）：")?;
    form.kind = prompt_kind(form.kind)?;
    if form.kind == MediaKind::Video {
        let choices = QUALITY_CHOICES
            .iter()
            .map(|q| format!("{q}p"))
            .collect::<Vec<_>>()
            .join(" / ");
        let q = read_line(&format!("画质（{}，默认 {}p）：", choices, form.quality))?;
        let q = q.trim().trim_end_matches(['p', 'P']);
        if !q.is_empty() {
            match q.parse::<u32>() {
                Ok(v) => form.quality = v,
                Err(_) => println!("无效画质，使用 {}p", form.quality),
            }
        }
    }

    match form.build(&session.config) {
        Ok(request) => download::run_job(session, request),
        Err(e) => {
            println!("输入错误：{}", e);
            Ok(())
        }
    }
}

fn pick_platform(input: &str) -> Option<Platform> {
    if input.is_empty() {
        return None;
    }
    if let Ok(n) = input.parse::<usize>() {
        return n.checked_sub(1).and_then(|i| Platform::SOCIAL.get(i)).copied();
    }
    input
        .parse::<Platform>()
        .ok()
        .filter(|p| Platform::SOCIAL.contains(p))
}

fn prompt_kind(default: MediaKind) -> Result<MediaKind> {
    let raw = read_line(&format!("类型（v 视频 / a 音频，默认 {}）：", default))?;
    if raw.trim().is_empty() {
        return Ok(default);
    }
    Ok(raw.parse::<MediaKind>().unwrap_or_else(|_| {
        println!("无效类型，使用 {}", default);
        default
    }))
}

fn read_line(prompt: &str) -> Result<String> {
    print!("{}", prompt);
    io::stdout().flush().ok();
    let stdin = io::stdin();
    let mut line = String::new();
    if stdin.lock().read_line(&mut line)? == 0 {
        anyhow::bail!("stdin closed");
    }
    Ok(line.trim_end_matches(['\r', '\n']).to_string())
}
