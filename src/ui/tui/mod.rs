use std::sync::mpsc::{self, Receiver, Sender};
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use crossterm::execute;
use crossterm::terminal::{
    EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode,
};
use ratatui::Terminal;
use ratatui::backend::CrosstermBackend;
use ratatui::layout::{Alignment, Constraint, Direction, Layout};
use ratatui::prelude::Rect;
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Gauge, Paragraph, Wrap};
use tracing::{info, warn};

mod clipboard;
mod playlist;
mod single;

use crate::base_system::logging::take_broadcast_rx;
use crate::download::models::{JobRequest, ProgressEvent};
use crate::download::worker::{JobHandle, WorkerMsg};
use crate::ui::Session;
use crate::ui::form::{PlaylistForm, SingleForm};
use crate::ui::noui::summary_text;

const SHUTDOWN_WAIT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum View {
    Single,
    Playlist,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TuiExit {
    Quit,
    SwitchToOldCli,
}

const SPINNER_FRAMES: &[char] = &['|', '/', '-', '\\'];
const LOG_HEIGHT: u16 = 9;
const MAX_LOGS: usize = 300;

pub(super) struct App<'s> {
    session: &'s Session,
    view: View,
    status: String,
    messages: Vec<String>,
    logs: Vec<String>,
    exit: Option<TuiExit>,

    // 表单
    single: SingleForm,
    single_focus: single::Field,
    playlist: PlaylistForm,
    playlist_focus: playlist::Field,

    // 后台任务
    worker_tx: Sender<WorkerMsg>,
    worker_rx: Receiver<WorkerMsg>,
    job: Option<JobHandle>,
    progress: Option<ProgressEvent>,

    // 动画
    spinner_active: bool,
    spinner_text: String,
    spinner_idx: usize,
    spinner_last: Instant,

    // 日志
    log_rx: Option<crossbeam_channel::Receiver<String>>,
}

impl<'s> App<'s> {
    fn new(session: &'s Session) -> Self {
        let (worker_tx, worker_rx) = mpsc::channel();
        Self {
            session,
            view: View::Single,
            status: "输入链接后按 Enter 下载，Tab 切换输入项，F2 播放列表，Ctrl+C 退出".to_string(),
            messages: Vec::new(),
            logs: Vec::new(),
            exit: None,
            single: SingleForm::from_config(&session.config),
            single_focus: single::Field::Url,
            playlist: PlaylistForm::from_config(&session.config),
            playlist_focus: playlist::Field::Url,
            worker_tx,
            worker_rx,
            job: None,
            progress: None,
            spinner_active: false,
            spinner_text: String::new(),
            spinner_idx: 0,
            spinner_last: Instant::now(),
            log_rx: take_broadcast_rx(),
        }
    }

    fn push_message(&mut self, msg: impl Into<String>) {
        self.messages.push(msg.into());
        if self.messages.len() > 8 {
            let overflow = self.messages.len() - 8;
            self.messages.drain(0..overflow);
        }
    }

    fn push_log(&mut self, msg: impl Into<String>) {
        let msg = msg.into();
        let trimmed = msg.trim_end_matches(['\r', '\n']);
        self.logs.push(trimmed.to_string());
        if self.logs.len() > MAX_LOGS {
            let overflow = self.logs.len() - MAX_LOGS;
            self.logs.drain(0..overflow);
        }
    }

    /// 没有任务在运行时才允许点击下载。
    fn trigger_enabled(&self) -> bool {
        self.job.is_none() && !self.session.is_busy()
    }
}

pub fn run(session: &Session) -> Result<TuiExit> {
    enable_raw_mode().context("enable raw mode")?;
    let mut stdout = std::io::stdout();
    execute!(stdout, EnterAlternateScreen).context("enter alternate screen")?;

    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend).context("init terminal")?;

    let result = run_loop(&mut terminal, session);

    disable_raw_mode().ok();
    execute!(terminal.backend_mut(), LeaveAlternateScreen).ok();
    terminal.show_cursor().ok();

    result
}

fn run_loop(
    terminal: &mut Terminal<CrosstermBackend<std::io::Stdout>>,
    session: &Session,
) -> Result<TuiExit> {
    let mut app = App::new(session);

    loop {
        tick_spinner(&mut app);
        poll_worker(&mut app);
        drain_log_channel(&mut app);

        terminal.draw(|f| draw_ui(f, &mut app))?;

        if !handle_event(&mut app)? {
            break;
        }
    }

    shutdown_job(&mut app, SHUTDOWN_WAIT);
    Ok(app.exit.unwrap_or(TuiExit::Quit))
}

/// 退出界面前取消正在运行的任务，并等待工作线程回报结束。
///
/// 工作线程收到取消后会终止 yt-dlp 子进程再发送 `Done`，所以等到 `Done`
/// 即可确认子进程不会比程序活得更久。超时返回 `false`。
fn shutdown_job(app: &mut App, timeout: Duration) -> bool {
    let Some(job) = app.job.take() else {
        return true;
    };
    job.cancel();
    stop_spinner(app);
    info!(target: "ui", "退出前取消下载任务，等待 yt-dlp 结束");

    let deadline = Instant::now() + timeout;
    loop {
        let left = deadline.saturating_duration_since(Instant::now());
        match app.worker_rx.recv_timeout(left) {
            Ok(WorkerMsg::Done(_)) => return true,
            Ok(WorkerMsg::Progress(_)) => {}
            Err(_) => {
                warn!(target: "ui", "等待下载任务结束超时（{:?}）", timeout);
                return false;
            }
        }
    }
}

fn draw_ui(frame: &mut ratatui::Frame, app: &mut App) {
    let (main, log_area) = split_with_log(frame.size());
    let layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Min(6),
            Constraint::Length(3),
            Constraint::Length(3),
        ])
        .split(main);

    render_header(frame, layout[0], app);
    match app.view {
        View::Single => single::draw_single(frame, layout[1], app),
        View::Playlist => playlist::draw_playlist(frame, layout[1], app),
    }
    render_progress(frame, layout[2], app);

    let status = Paragraph::new(app.status.as_str())
        .wrap(Wrap { trim: true })
        .block(Block::default().borders(Borders::ALL).title("状态"));
    frame.render_widget(status, layout[3]);

    render_log_box(frame, log_area, app);
}

fn render_header(frame: &mut ratatui::Frame, area: Rect, app: &App) {
    let tab = |label: &'static str, active: bool| {
        if active {
            Span::styled(
                label,
                Style::default()
                    .fg(Color::Yellow)
                    .add_modifier(Modifier::BOLD | Modifier::UNDERLINED),
            )
        } else {
            Span::styled(label, Style::default().fg(Color::DarkGray))
        }
    };
    let ffmpeg = if app.session.tools.ffmpeg.is_some() {
        Span::styled("ffmpeg ✓", Style::default().fg(Color::Green))
    } else {
        Span::styled("ffmpeg ✗", Style::default().fg(Color::Red))
    };
    let line = Line::from(vec![
        tab("F1 单个视频", app.view == View::Single),
        Span::raw("  "),
        tab("F2 播放列表", app.view == View::Playlist),
        Span::raw("  |  "),
        ffmpeg,
        Span::raw("  |  Ctrl+L 清空日志  Ctrl+O 旧版 CLI  Ctrl+C 退出"),
    ]);
    let header = Paragraph::new(line).block(
        Block::default()
            .borders(Borders::ALL)
            .title(format!("Social Media Downloader v{}", env!("CARGO_PKG_VERSION"))),
    );
    frame.render_widget(header, area);
}

fn render_progress(frame: &mut ratatui::Frame, area: Rect, app: &App) {
    let block = Block::default().borders(Borders::ALL).title("进度");
    let Some(ev) = app.progress.as_ref() else {
        let idle = if app.job.is_some() {
            "准备中…"
        } else {
            "空闲"
        };
        frame.render_widget(Paragraph::new(idle).block(block), area);
        return;
    };

    let mut label = String::new();
    if ev.item_total > 1 {
        label.push_str(&format!("[{}/{}] ", ev.item, ev.item_total));
    }
    label.push_str(&format!("{:.1}%", ev.percent));
    if let Some(name) = ev.filename.as_deref() {
        label.push_str(&format!("  {}", truncate(name, 48)));
    }
    if let Some(speed) = ev.speed.as_deref() {
        label.push_str(&format!("  {}", speed));
    }
    if let Some(eta) = ev.eta.as_deref() {
        label.push_str(&format!("  ETA {}", eta));
    }

    let gauge = Gauge::default()
        .block(block)
        .gauge_style(Style::default().fg(Color::Cyan))
        .ratio((ev.percent as f64 / 100.0).clamp(0.0, 1.0))
        .label(label);
    frame.render_widget(gauge, area);
}

/// 两个页面共用的开始按钮；任务运行时置灰。
fn render_trigger(frame: &mut ratatui::Frame, area: Rect, app: &App, focused: bool) {
    let (text, style) = if app.trigger_enabled() {
        let mut style = Style::default().fg(Color::Green).add_modifier(Modifier::BOLD);
        if focused {
            style = style.add_modifier(Modifier::REVERSED);
        }
        ("[ 开始下载 ] (Enter)", style)
    } else {
        (
            "[ 下载中… ] (Esc/s 停止)",
            Style::default().fg(Color::DarkGray),
        )
    };
    let para = Paragraph::new(text)
        .alignment(Alignment::Center)
        .style(style)
        .block(Block::default().borders(Borders::ALL));
    frame.render_widget(para, area);
}

fn text_box<'a>(value: &'a str, title: &'a str, focused: bool) -> Paragraph<'a> {
    let style = if focused {
        Style::default().fg(Color::Yellow)
    } else {
        Style::default()
    };
    let cursor = if focused { "_" } else { "" };
    Paragraph::new(format!("> {}{}", value, cursor))
        .style(style)
        .block(Block::default().borders(Borders::ALL).title(title))
}

fn selector_span(label: &str, value: String, focused: bool) -> Vec<Span<'static>> {
    let style = if focused {
        Style::default()
            .fg(Color::Yellow)
            .add_modifier(Modifier::BOLD)
    } else {
        Style::default()
    };
    vec![
        Span::raw(format!("{label}: ")),
        Span::styled(format!("< {value} >"), style),
        Span::raw("   "),
    ]
}

fn handle_event(app: &mut App) -> Result<bool> {
    if !event::poll(Duration::from_millis(200)).context("poll event")? {
        return Ok(true);
    }

    let evt = event::read().context("read event")?;
    match evt {
        Event::Paste(s) => paste_into_focus(app, &s),
        Event::Key(key) if key.kind == KeyEventKind::Press => {
            if !handle_global_key(app, key) {
                match app.view {
                    View::Single => single::handle_key(app, key),
                    View::Playlist => playlist::handle_key(app, key),
                }
            }
        }
        _ => {}
    }

    Ok(app.exit.is_none())
}

/// 所有页面通用的按键，已处理时返回 true。
fn handle_global_key(app: &mut App, key: KeyEvent) -> bool {
    let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
    match key.code {
        KeyCode::Char('c') if ctrl => {
            app.exit = Some(TuiExit::Quit);
            true
        }
        KeyCode::Char('o') if ctrl => {
            if app.job.is_some() {
                app.status = "下载进行中，无法切换界面".to_string();
            } else {
                app.exit = Some(TuiExit::SwitchToOldCli);
            }
            true
        }
        KeyCode::Char('l') if ctrl => {
            app.logs.clear();
            app.messages.clear();
            app.status = "日志已清空".to_string();
            true
        }
        KeyCode::Char('v') if ctrl => {
            paste_from_clipboard(app);
            true
        }
        KeyCode::F(1) => {
            app.view = View::Single;
            true
        }
        KeyCode::F(2) => {
            app.view = View::Playlist;
            true
        }
        KeyCode::Esc | KeyCode::Char('s') | KeyCode::Char('S') if app.job.is_some() => {
            request_cancel_download(app);
            true
        }
        // 任务运行期间锁定表单输入。
        _ => app.job.is_some(),
    }
}

fn paste_from_clipboard(app: &mut App) {
    #[cfg(feature = "clipboard")]
    {
        match clipboard::get_text() {
            Ok(Some(text)) => paste_into_focus(app, &text),
            Ok(None) => {
                app.status = "剪贴板为空或当前构建未包含剪贴板后端（启用 clipboard-arboard）".to_string();
            }
            Err(e) => {
                app.status = format!("读取剪贴板失败：{e}");
            }
        }
    }

    #[cfg(not(feature = "clipboard"))]
    {
        app.status = "当前构建未启用剪贴板支持".to_string();
    }
}

fn paste_into_focus(app: &mut App, text: &str) {
    if app.job.is_some() {
        return;
    }
    let text = clipboard::single_line(text);
    let target = match app.view {
        View::Single => single::focused_text(app),
        View::Playlist => playlist::focused_text(app),
    };
    match target {
        Some(buf) => buf.push_str(&text),
        None => app.status = "当前输入项不接受文本".to_string(),
    }
}

/// 把校验通过的请求交给后台线程；输入错误只在界面提示。
fn start_download(app: &mut App, request: JobRequest) {
    if !app.trigger_enabled() {
        app.status = "已有下载任务在进行".to_string();
        return;
    }
    match app.session.start(request, app.worker_tx.clone()) {
        Ok(handle) => {
            app.job = Some(handle);
            app.progress = None;
            start_spinner(app, "下载中");
        }
        Err(e) => {
            warn!(target: "ui", "无法开始下载：{}", e);
            app.status = format!("无法开始下载：{e}");
        }
    }
}

fn request_cancel_download(app: &mut App) {
    if let Some(job) = app.job.as_ref() {
        if job.is_cancel_requested() {
            return;
        }
        job.cancel();
        info!(target: "ui", "已请求停止下载");
        app.spinner_text = "正在停止".to_string();
    }
}

fn poll_worker(app: &mut App) {
    while let Ok(msg) = app.worker_rx.try_recv() {
        match msg {
            WorkerMsg::Progress(ev) => app.progress = Some(ev),
            WorkerMsg::Done(result) => {
                stop_spinner(app);
                app.job = None;
                match result {
                    Ok(summary) => {
                        let text = summary_text(&summary);
                        app.status = text.replace('\n', "；");
                        app.push_message(text);
                    }
                    Err(e) if e.is_canceled() => {
                        app.status = "下载已取消".to_string();
                        app.push_message("下载已取消");
                    }
                    Err(e) => {
                        app.status = format!("下载失败：{e}");
                        app.push_message(format!("下载失败：{e}"));
                    }
                }
            }
        }
    }
}

fn start_spinner(app: &mut App, text: impl Into<String>) {
    app.spinner_active = true;
    app.spinner_text = text.into();
    app.spinner_idx = 0;
    app.spinner_last = Instant::now();
    app.status = format!("{} {}", app.spinner_text, SPINNER_FRAMES[app.spinner_idx]);
}

fn stop_spinner(app: &mut App) {
    app.spinner_active = false;
    app.spinner_text.clear();
}

fn tick_spinner(app: &mut App) {
    if !app.spinner_active {
        return;
    }
    if app.spinner_last.elapsed() < Duration::from_millis(140) {
        return;
    }
    app.spinner_idx = (app.spinner_idx + 1) % SPINNER_FRAMES.len();
    app.spinner_last = Instant::now();
    app.status = format!("{} {}", app.spinner_text, SPINNER_FRAMES[app.spinner_idx]);
}

fn split_with_log(area: Rect) -> (Rect, Rect) {
    let layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Min(LOG_HEIGHT.max(4)),
            Constraint::Length(LOG_HEIGHT),
        ])
        .split(area);
    let main = layout.first().copied().unwrap_or(area);
    let log = layout.get(1).copied().unwrap_or(Rect {
        x: area.x,
        y: area
            .y
            .saturating_add(area.height.saturating_sub(LOG_HEIGHT)),
        width: area.width,
        height: LOG_HEIGHT,
    });
    (main, log)
}

fn render_log_box(frame: &mut ratatui::Frame, area: Rect, app: &App) {
    let mut lines = Vec::new();
    if app.logs.is_empty() {
        lines.push(Line::from("日志: 暂无"));
    } else {
        // 只显示边框内放得下的最新几行。
        let visible = area.height.saturating_sub(2).max(1) as usize;
        lines.extend(
            app.logs
                .iter()
                .rev()
                .take(visible)
                .rev()
                .map(|m| style_log_line(m)),
        );
    }

    let log = Paragraph::new(lines)
        .wrap(Wrap { trim: true })
        .block(Block::default().borders(Borders::ALL).title("日志"));
    frame.render_widget(log, area);
}

/// 广播日志格式为 `LEVEL message`（无时间与 target）。
fn style_log_line(line: &str) -> Line<'static> {
    let trimmed = line.trim_start();
    let (level_raw, message) = trimmed.split_once(' ').unwrap_or((trimmed, ""));
    let level = level_raw.to_ascii_uppercase();
    let color = match level.as_str() {
        "ERROR" => Color::Red,
        "WARN" => Color::Yellow,
        "INFO" => Color::Cyan,
        "DEBUG" | "TRACE" => Color::Gray,
        _ => return Line::from(trimmed.to_string()),
    };

    Line::from(vec![
        Span::styled(
            level,
            Style::default().fg(color).add_modifier(Modifier::BOLD),
        ),
        Span::raw(" "),
        Span::raw(message.trim_start().to_string()),
    ])
}

fn drain_log_channel(app: &mut App) {
    if let Some(rx) = app.log_rx.as_ref() {
        let rx = rx.clone();
        for line in rx.try_iter() {
            app.push_log(line);
        }
    }
}

pub(super) fn truncate(text: &str, limit: usize) -> String {
    if text.chars().count() <= limit {
        return text.to_string();
    }
    let mut out: String = text.chars().take(limit.saturating_sub(1)).collect();
    out.push('…');
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::base_system::context::Config;
    use crate::base_system::tools::ToolStatus;
    use crate::download::downloader::tests::FakeTool;
    use crate::download::models::Platform;
    use std::sync::Arc;
    use std::sync::atomic::Ordering;

    fn session(dir: &std::path::Path) -> Session {
        let config = Config {
            save_path: dir.display().to_string(),
            ..Config::default()
        };
        Session::with_tool(config, ToolStatus::default(), Arc::new(FakeTool::new()))
    }

    fn wait_idle(app: &mut App) {
        let deadline = Instant::now() + Duration::from_secs(5);
        while app.job.is_some() && Instant::now() < deadline {
            poll_worker(app);
            std::thread::sleep(Duration::from_millis(10));
        }
    }

    #[test]
    fn trigger_is_disabled_during_job_and_restored_once() {
        let tmp = tempfile::tempdir().unwrap();
        let session = session(tmp.path());
        let mut app = App::new(&session);
        app.single.platform = Platform::TikTok;
        app.single.url = "https://www.tiktok.com/@x/video/123".to_string();

        single::submit(&mut app);
        assert!(!app.trigger_enabled());

        // A second trigger while busy is refused.
        single::submit(&mut app);
        assert_eq!(app.status, "已有下载任务在进行");

        wait_idle(&mut app);
        assert!(app.trigger_enabled());
        let finished = app
            .messages
            .iter()
            .filter(|m| m.starts_with("下载完成"))
            .count();
        assert_eq!(finished, 1);
        assert_eq!(app.progress.as_ref().map(|p| p.percent), Some(100.0));
    }

    #[test]
    fn invalid_input_never_dispatches() {
        let tmp = tempfile::tempdir().unwrap();
        let session = session(tmp.path());
        let mut app = App::new(&session);
        app.single.platform = Platform::Facebook;
        app.single.url = "https://www.tiktok.com/@x/video/123".to_string();

        single::submit(&mut app);
        assert!(app.job.is_none());
        assert!(app.status.contains("Facebook"));
        assert!(app.trigger_enabled());
    }

    #[test]
    fn quitting_mid_download_waits_for_the_worker_to_stop() {
        let tmp = tempfile::tempdir().unwrap();
        let tool = Arc::new(FakeTool::new().blocking());
        let config = Config {
            save_path: tmp.path().display().to_string(),
            ..Config::default()
        };
        let session = Session::with_tool(config, ToolStatus::default(), tool.clone());
        let mut app = App::new(&session);
        app.single.platform = Platform::TikTok;
        app.single.url = "https://www.tiktok.com/@x/video/123".to_string();

        single::submit(&mut app);
        let deadline = Instant::now() + Duration::from_secs(5);
        while !tool.running.load(Ordering::SeqCst) && Instant::now() < deadline {
            std::thread::sleep(Duration::from_millis(5));
        }
        assert!(tool.running.load(Ordering::SeqCst));

        assert!(shutdown_job(&mut app, Duration::from_secs(5)));
        assert!(!tool.running.load(Ordering::SeqCst));
        assert!(app.job.is_none());
        assert!(!session.is_busy());
    }

    #[test]
    fn shutdown_without_job_returns_immediately() {
        let tmp = tempfile::tempdir().unwrap();
        let session = session(tmp.path());
        let mut app = App::new(&session);
        assert!(shutdown_job(&mut app, Duration::from_millis(1)));
    }

    #[test]
    fn log_lines_are_styled_by_level() {
        let line = style_log_line(" WARN 跳过位置 4");
        assert_eq!(line.spans.len(), 3);
        assert_eq!(line.spans[0].content, "WARN");
        assert_eq!(line.spans[2].content, "跳过位置 4");

        let plain = style_log_line("no level here");
        assert_eq!(plain.spans.len(), 1);
    }

    #[test]
    fn truncate_keeps_short_text() {
        assert_eq!(truncate("abc", 5), "abc");
        assert_eq!(truncate("abcdef", 4), "abc…");
    }
}
