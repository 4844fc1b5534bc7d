//! 播放列表下载页。

use super::*;

use crate::download::models::MediaKind;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum Field {
    Url,
    Folder,
    Range,
    Kind,
    Quality,
    Start,
}

const ORDER: [Field; 6] = [
    Field::Url,
    Field::Folder,
    Field::Range,
    Field::Kind,
    Field::Quality,
    Field::Start,
];

pub(super) fn draw_playlist(frame: &mut ratatui::Frame, area: Rect, app: &mut App) {
    let layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Length(3),
            Constraint::Length(3),
            Constraint::Length(3),
            Constraint::Length(3),
            Constraint::Min(0),
        ])
        .split(area);

    let focus = app.playlist_focus;
    frame.render_widget(
        text_box(&app.playlist.url, "播放列表链接", focus == Field::Url),
        layout[0],
    );
    frame.render_widget(
        text_box(
            &app.playlist.folder,
            "保存文件夹名",
            focus == Field::Folder,
        ),
        layout[1],
    );
    frame.render_widget(
        text_box(
            &app.playlist.range,
            "视频范围 (如 1-3,5,7-9)",
            focus == Field::Range,
        ),
        layout[2],
    );

    let mut spans = selector_span(
        "类型",
        app.playlist.kind.tag().to_string(),
        focus == Field::Kind,
    );
    if app.playlist.kind == MediaKind::Video {
        spans.extend(selector_span(
            "画质",
            format!("{}p", app.playlist.quality),
            focus == Field::Quality,
        ));
    }
    let options = Paragraph::new(Line::from(spans)).block(
        Block::default()
            .borders(Borders::ALL)
            .title("选项 (←/→ 切换)"),
    );
    frame.render_widget(options, layout[3]);

    render_trigger(frame, layout[4], app, focus == Field::Start);

    if !app.messages.is_empty() {
        let lines: Vec<Line> = app.messages.iter().map(|m| Line::from(m.as_str())).collect();
        let history = Paragraph::new(lines)
            .wrap(Wrap { trim: true })
            .block(Block::default().borders(Borders::ALL).title("结果"));
        frame.render_widget(history, layout[5]);
    }
}

pub(super) fn handle_key(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Tab | KeyCode::Down => app.playlist_focus = step(app, 1),
        KeyCode::BackTab | KeyCode::Up => app.playlist_focus = step(app, -1),
        KeyCode::Enter => submit(app),
        KeyCode::Left | KeyCode::Right | KeyCode::Char(' ') if !is_text(app.playlist_focus) => {
            match app.playlist_focus {
                Field::Kind => app.playlist.kind = app.playlist.kind.toggle(),
                Field::Quality => app.playlist.cycle_quality(),
                _ => {}
            }
        }
        KeyCode::Backspace => {
            if let Some(buf) = focused_text(app) {
                buf.pop();
            }
        }
        KeyCode::Char(c)
            if !key.modifiers.contains(KeyModifiers::CONTROL)
                && !key.modifiers.contains(KeyModifiers::ALT) =>
        {
            if let Some(buf) = focused_text(app) {
                buf.push(c);
            }
        }
        _ => {}
    }
}

pub(super) fn focused_text<'a>(app: &'a mut App) -> Option<&'a mut String> {
    match app.playlist_focus {
        Field::Url => Some(&mut app.playlist.url),
        Field::Folder => Some(&mut app.playlist.folder),
        Field::Range => Some(&mut app.playlist.range),
        _ => None,
    }
}

pub(super) fn submit(app: &mut App) {
    if !app.trigger_enabled() {
        app.status = "已有下载任务在进行".to_string();
        return;
    }
    match app.playlist.build(&app.session.config) {
        Ok(request) => {
            info!(target: "ui", range = %app.playlist.range.trim(), "提交播放列表任务");
            start_download(app, request);
        }
        Err(e) => app.status = format!("输入错误：{e}"),
    }
}

fn is_text(field: Field) -> bool {
    matches!(field, Field::Url | Field::Folder | Field::Range)
}

/// 下一个可聚焦字段；音频模式下跳过画质。
fn step(app: &App, delta: isize) -> Field {
    let len = ORDER.len() as isize;
    let mut idx = ORDER
        .iter()
        .position(|f| *f == app.playlist_focus)
        .unwrap_or(0) as isize;
    loop {
        idx = (idx + delta).rem_euclid(len);
        let field = ORDER[idx as usize];
        if field == Field::Quality && app.playlist.kind == MediaKind::Audio {
            continue;
        }
        return field;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::base_system::context::Config;
    use crate::base_system::tools::ToolStatus;
    use crate::download::downloader::tests::FakeTool;
    use crate::download::models::{PlaylistEntry, PlaylistInfo};
    use std::sync::Arc;

    #[test]
    fn quality_is_skipped_for_audio() {
        let session = Session::with_tool(
            Config::default(),
            ToolStatus::default(),
            Arc::new(FakeTool::new()),
        );
        let mut app = App::new(&session);
        app.playlist.kind = MediaKind::Audio;
        app.playlist_focus = Field::Kind;
        assert_eq!(step(&app, 1), Field::Start);
        app.playlist.kind = MediaKind::Video;
        assert_eq!(step(&app, 1), Field::Quality);
    }

    #[test]
    fn malformed_range_is_reported_without_dispatch() {
        let session = Session::with_tool(
            Config::default(),
            ToolStatus::default(),
            Arc::new(FakeTool::new()),
        );
        let mut app = App::new(&session);
        app.playlist.url = "https://www.youtube.com/playlist?list=PL1".into();
        app.playlist.folder = "list".into();
        app.playlist.range = "1-x".into();
        submit(&mut app);
        assert!(app.job.is_none());
        assert!(app.status.starts_with("输入错误"));
    }

    #[test]
    fn playlist_job_reports_skips_in_summary() {
        let tmp = tempfile::tempdir().unwrap();
        let info = PlaylistInfo {
            title: Some("Mix".into()),
            entries: vec![Some(PlaylistEntry {
                url: Some("https://www.youtube.com/watch?v=a".into()),
                ..Default::default()
            })],
        };
        let session = Session::with_tool(
            Config {
                save_path: tmp.path().display().to_string(),
                ..Config::default()
            },
            ToolStatus::default(),
            Arc::new(FakeTool::new().with_playlist(info)),
        );
        let mut app = App::new(&session);
        app.playlist.url = "https://www.youtube.com/playlist?list=PL1".into();
        app.playlist.folder = "Mix".into();
        app.playlist.range = "1,100".into();
        submit(&mut app);
        assert!(app.job.is_some());

        let deadline = Instant::now() + Duration::from_secs(5);
        while app.job.is_some() && Instant::now() < deadline {
            poll_worker(&mut app);
            std::thread::sleep(Duration::from_millis(10));
        }
        assert!(app.trigger_enabled());
        assert!(app.status.contains("跳过 1 个"));
    }
}
