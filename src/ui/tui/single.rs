//! 单个视频下载页。

use super::*;

use crate::download::models::Platform;
use crate::download::platform::detect_platform;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum Field {
    Url,
    Platform,
    Kind,
    Start,
}

const ORDER: [Field; 4] = [Field::Url, Field::Platform, Field::Kind, Field::Start];

pub(super) fn draw_single(frame: &mut ratatui::Frame, area: Rect, app: &mut App) {
    let layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Length(3),
            Constraint::Length(3),
            Constraint::Min(0),
        ])
        .split(area);

    let focus = app.single_focus;
    let title = format!("{} 链接 (Ctrl+V 粘贴)", app.single.platform);
    frame.render_widget(
        text_box(&app.single.url, &title, focus == Field::Url),
        layout[0],
    );

    let mut spans = selector_span(
        "平台",
        app.single.platform.title().to_string(),
        focus == Field::Platform,
    );
    spans.extend(selector_span(
        "类型",
        app.single.kind.tag().to_string(),
        focus == Field::Kind,
    ));
    spans.push(Span::styled(
        format!("保存到 {}", app.session.config.single_dir().display()),
        Style::default().fg(Color::Green),
    ));
    let options = Paragraph::new(Line::from(spans)).block(
        Block::default()
            .borders(Borders::ALL)
            .title("选项 (←/→ 切换)"),
    );
    frame.render_widget(options, layout[1]);

    render_trigger(frame, layout[2], app, focus == Field::Start);

    if !app.messages.is_empty() {
        let lines: Vec<Line> = app.messages.iter().map(|m| Line::from(m.as_str())).collect();
        let history = Paragraph::new(lines)
            .wrap(Wrap { trim: true })
            .block(Block::default().borders(Borders::ALL).title("结果"));
        frame.render_widget(history, layout[3]);
    }
}

pub(super) fn handle_key(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Tab | KeyCode::Down => app.single_focus = step(app.single_focus, 1),
        KeyCode::BackTab | KeyCode::Up => app.single_focus = step(app.single_focus, -1),
        KeyCode::Enter => submit(app),
        KeyCode::Left | KeyCode::Right | KeyCode::Char(' ')
            if app.single_focus != Field::Url =>
        {
            let back = key.code == KeyCode::Left;
            match app.single_focus {
                Field::Platform => app.single.platform = cycle_platform(app.single.platform, back),
                Field::Kind => app.single.kind = app.single.kind.toggle(),
                _ => {}
            }
        }
        KeyCode::Backspace if app.single_focus == Field::Url => {
            app.single.url.pop();
        }
        KeyCode::Char(c)
            if app.single_focus == Field::Url
                && !key.modifiers.contains(KeyModifiers::CONTROL)
                && !key.modifiers.contains(KeyModifiers::ALT) =>
        {
            app.single.url.push(c);
            preselect_platform(app);
        }
        _ => {}
    }
}

pub(super) fn focused_text<'a>(app: &'a mut App) -> Option<&'a mut String> {
    match app.single_focus {
        Field::Url => Some(&mut app.single.url),
        _ => None,
    }
}

pub(super) fn submit(app: &mut App) {
    if !app.trigger_enabled() {
        app.status = "已有下载任务在进行".to_string();
        return;
    }
    match app.single.build(&app.session.config) {
        Ok(request) => start_download(app, request),
        Err(e) => app.status = format!("输入错误：{e}"),
    }
}

/// 链接主机明确属于其他已支持平台时，自动切换平台。
fn preselect_platform(app: &mut App) {
    if let Some(p) = detect_platform(&app.single.url)
        && Platform::SOCIAL.contains(&p)
    {
        app.single.platform = p;
    }
}

fn cycle_platform(current: Platform, back: bool) -> Platform {
    let all = Platform::SOCIAL;
    let idx = all.iter().position(|p| *p == current).unwrap_or(0);
    let next = if back {
        (idx + all.len() - 1) % all.len()
    } else {
        (idx + 1) % all.len()
    };
    all[next]
}

fn step(current: Field, delta: isize) -> Field {
    let idx = ORDER.iter().position(|f| *f == current).unwrap_or(0) as isize;
    let len = ORDER.len() as isize;
    ORDER[((idx + delta).rem_euclid(len)) as usize]
}
