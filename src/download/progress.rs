//! yt-dlp 输出行解析与进度上报。
//!
//! 所有对下载器文本输出的解析都集中在 [`parse_progress_line`]；
//! 结构化进度（`--progress-template`）优先，其余行按经典格式兜底。

use std::sync::OnceLock;

use regex::Regex;

use super::invocation::PROGRESS_PREFIX;
use super::models::ProgressEvent;

/// One meaningful line of downloader output.
#[derive(Debug, Clone, PartialEq)]
pub enum ProgressLine {
    Progress {
        percent: f32,
        speed: Option<String>,
        eta: Option<String>,
        filename: Option<String>,
    },
    Destination(String),
    AlreadyDownloaded(Option<String>),
    Error(String),
}

static RE_ANSI: OnceLock<Regex> = OnceLock::new();
static RE_PERCENT: OnceLock<Regex> = OnceLock::new();
static RE_SPEED: OnceLock<Regex> = OnceLock::new();
static RE_ETA: OnceLock<Regex> = OnceLock::new();
static RE_ALREADY: OnceLock<Regex> = OnceLock::new();

fn re_ansi() -> &'static Regex {
    RE_ANSI.get_or_init(|| Regex::new(r"\x1b\[[0-9;]*[A-Za-z]").expect("compile RE_ANSI"))
}

fn re_percent() -> &'static Regex {
    RE_PERCENT.get_or_init(|| Regex::new(r"(\d+(?:\.\d+)?)%").expect("compile RE_PERCENT"))
}

fn re_speed() -> &'static Regex {
    RE_SPEED.get_or_init(|| {
        Regex::new(r"(\d+(?:\.\d+)?\s*(?:K|M|G)?i?B/s)").expect("compile RE_SPEED")
    })
}

fn re_eta() -> &'static Regex {
    RE_ETA.get_or_init(|| Regex::new(r"ETA\s+(\S+)").expect("compile RE_ETA"))
}

fn re_already() -> &'static Regex {
    RE_ALREADY.get_or_init(|| {
        Regex::new(r"^\[download\]\s+(.+?)\s+has already been downloaded")
            .expect("compile RE_ALREADY")
    })
}

/// 识别一行 yt-dlp 输出；无关内容返回 `None`。
pub fn parse_progress_line(raw: &str) -> Option<ProgressLine> {
    let cleaned = re_ansi().replace_all(raw, "");
    let line = cleaned.trim();
    if line.is_empty() {
        return None;
    }

    if let Some(rest) = line.strip_prefix(PROGRESS_PREFIX) {
        return parse_structured(rest);
    }

    if line.contains("has already been downloaded") {
        let name = re_already()
            .captures(line)
            .and_then(|c| c.get(1))
            .map(|m| display_name(m.as_str()));
        return Some(ProgressLine::AlreadyDownloaded(name));
    }

    if line.starts_with("[download]") {
        if let Some((_, dest)) = line.split_once("Destination:") {
            let dest = dest.trim();
            if !dest.is_empty() {
                return Some(ProgressLine::Destination(display_name(dest)));
            }
            return None;
        }
        if line.contains('%') && line.contains("ETA") {
            let percent = re_percent()
                .captures(line)
                .and_then(|c| c.get(1))
                .and_then(|m| m.as_str().parse::<f32>().ok())?;
            let speed = re_speed()
                .captures(line)
                .and_then(|c| c.get(1))
                .map(|m| m.as_str().replace(' ', ""));
            let eta = re_eta()
                .captures(line)
                .and_then(|c| c.get(1))
                .map(|m| m.as_str().to_string())
                .filter(|s| !is_unknown(s));
            return Some(ProgressLine::Progress {
                percent: percent.clamp(0.0, 100.0),
                speed,
                eta,
                filename: None,
            });
        }
        return None;
    }

    if line.contains("ERROR") {
        let msg = line
            .split_once("ERROR:")
            .map(|(_, rest)| rest.trim())
            .filter(|rest| !rest.is_empty())
            .unwrap_or(line);
        return Some(ProgressLine::Error(msg.to_string()));
    }

    None
}

/// `percent|speed|eta|filename` as emitted by our progress template.
fn parse_structured(rest: &str) -> Option<ProgressLine> {
    let mut fields = rest.trim().splitn(4, '|').map(str::trim);
    let percent_raw = fields.next()?;
    let percent = percent_raw
        .trim_end_matches('%')
        .trim()
        .parse::<f32>()
        .ok()?;
    let speed = fields.next().filter(|s| !is_unknown(s)).map(str::to_string);
    let eta = fields.next().filter(|s| !is_unknown(s)).map(str::to_string);
    let filename = fields.next().filter(|s| !is_unknown(s)).map(display_name);
    Some(ProgressLine::Progress {
        percent: percent.clamp(0.0, 100.0),
        speed,
        eta,
        filename,
    })
}

fn is_unknown(value: &str) -> bool {
    let v = value.trim();
    v.is_empty() || v.eq_ignore_ascii_case("n/a") || v.eq_ignore_ascii_case("unknown") || v == "NA"
}

/// Last path component, the way the log panel shows it.
pub fn display_name(path: &str) -> String {
    let trimmed = path.trim().trim_matches('"');
    // yt-dlp 输出本机路径，两种分隔符都要处理。
    trimmed
        .rsplit(['/', '\\'])
        .find(|part| !part.is_empty())
        .unwrap_or(trimmed)
        .to_string()
}

/// Folds parsed lines into [`ProgressEvent`]s and forwards them to the UI.
pub(crate) struct ProgressReporter {
    snapshot: ProgressEvent,
    // 工具报告文件已存在后置位，之后的百分比一律忽略。
    completed: bool,
    cb: Option<Box<dyn FnMut(ProgressEvent) + Send>>,
}

impl ProgressReporter {
    pub(crate) fn new(cb: Option<Box<dyn FnMut(ProgressEvent) + Send>>) -> Self {
        Self {
            snapshot: ProgressEvent::default(),
            completed: false,
            cb,
        }
    }

    #[cfg(test)]
    pub(crate) fn snapshot(&self) -> &ProgressEvent {
        &self.snapshot
    }

    fn emit(&mut self) {
        if let Some(cb) = self.cb.as_mut() {
            cb(self.snapshot.clone());
        }
    }

    pub(crate) fn start_item(&mut self, item: usize, total: usize, label: Option<&str>) {
        self.completed = false;
        self.snapshot = ProgressEvent {
            percent: 0.0,
            speed: None,
            eta: None,
            filename: label.map(str::to_string),
            item,
            item_total: total,
        };
        self.emit();
    }

    pub(crate) fn apply(&mut self, line: &ProgressLine) {
        match line {
            ProgressLine::Progress {
                percent,
                speed,
                eta,
                filename,
            } => {
                if self.completed {
                    return;
                }
                self.snapshot.percent = *percent;
                self.snapshot.speed = speed.clone();
                self.snapshot.eta = eta.clone();
                if let Some(name) = filename {
                    self.snapshot.filename = Some(name.clone());
                }
            }
            ProgressLine::Destination(name) => {
                self.snapshot.filename = Some(name.clone());
            }
            ProgressLine::AlreadyDownloaded(name) => {
                self.completed = true;
                self.snapshot.percent = 100.0;
                self.snapshot.eta = None;
                if let Some(name) = name {
                    self.snapshot.filename = Some(name.clone());
                }
            }
            ProgressLine::Error(_) => return,
        }
        self.emit();
    }

    pub(crate) fn finish_item(&mut self) {
        if self.snapshot.percent < 100.0 {
            self.snapshot.percent = 100.0;
            self.snapshot.eta = None;
            self.emit();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    #[test]
    fn structured_progress_line() {
        let line = "[progress]  42.5%|1.20MiB/s|00:13|/tmp/out/My Clip.mp4";
        assert_eq!(
            parse_progress_line(line),
            Some(ProgressLine::Progress {
                percent: 42.5,
                speed: Some("1.20MiB/s".into()),
                eta: Some("00:13".into()),
                filename: Some("My Clip.mp4".into()),
            })
        );
    }

    #[test]
    fn structured_unknown_fields() {
        let line = "[progress]100.0%|N/A|NA|";
        assert_eq!(
            parse_progress_line(line),
            Some(ProgressLine::Progress {
                percent: 100.0,
                speed: None,
                eta: None,
                filename: None,
            })
        );
    }

    #[test]
    fn classic_progress_line() {
        let line = "[download]  12.5% of ~ 310.04MiB at  374.36KiB/s ETA 11:59 (frag 56/454)";
        match parse_progress_line(line) {
            Some(ProgressLine::Progress {
                percent, speed, eta, ..
            }) => {
                assert_eq!(percent, 12.5);
                assert_eq!(speed.as_deref(), Some("374.36KiB/s"));
                assert_eq!(eta.as_deref(), Some("11:59"));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn destination_line() {
        let line = "[download] Destination: downloaded_items/Funny cat.mp4";
        assert_eq!(
            parse_progress_line(line),
            Some(ProgressLine::Destination("Funny cat.mp4".into()))
        );
    }

    #[test]
    fn already_downloaded_line() {
        let line = "[download] downloaded_items/Funny cat.mp4 has already been downloaded";
        assert_eq!(
            parse_progress_line(line),
            Some(ProgressLine::AlreadyDownloaded(Some("Funny cat.mp4".into())))
        );
    }

    #[test]
    fn error_line() {
        let line = "ERROR: [TikTok] 123: Unable to extract webpage video data";
        assert_eq!(
            parse_progress_line(line),
            Some(ProgressLine::Error(
                "[TikTok] 123: Unable to extract webpage video data".into()
            ))
        );
    }

    #[test]
    fn noise_is_ignored() {
        assert_eq!(parse_progress_line(""), None);
        assert_eq!(parse_progress_line("[youtube] abc: Downloading webpage"), None);
        assert_eq!(parse_progress_line("[Merger] Merging formats into \"x.mp4\""), None);
    }

    #[test]
    fn ansi_codes_are_stripped() {
        let line = "[progress]\x1b[0;94m  7.0%\x1b[0m|\x1b[0;32m2.00MiB/s\x1b[0m|00:05|a.webm";
        match parse_progress_line(line) {
            Some(ProgressLine::Progress { percent, speed, .. }) => {
                assert_eq!(percent, 7.0);
                assert_eq!(speed.as_deref(), Some("2.00MiB/s"));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn already_downloaded_pins_progress_to_100() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let mut reporter = ProgressReporter::new(Some(Box::new(move |ev: ProgressEvent| {
            sink.lock().unwrap().push(ev.percent);
        })));
        reporter.start_item(1, 1, None);

        for raw in [
            "[download] out/a.mp4 has already been downloaded",
            "[progress] 30.0%|1MiB/s|00:10|a.mp4",
        ] {
            if let Some(line) = parse_progress_line(raw) {
                reporter.apply(&line);
            }
        }

        assert_eq!(reporter.snapshot().percent, 100.0);
        assert_eq!(reporter.snapshot().filename.as_deref(), Some("a.mp4"));
        let seen = seen.lock().unwrap();
        assert_eq!(seen.as_slice(), &[0.0, 100.0]);
    }

    #[test]
    fn new_item_resets_state() {
        let mut reporter = ProgressReporter::new(None);
        reporter.start_item(1, 2, Some("first"));
        reporter.apply(&ProgressLine::AlreadyDownloaded(None));
        reporter.start_item(2, 2, Some("second"));
        reporter.apply(&ProgressLine::Progress {
            percent: 50.0,
            speed: None,
            eta: None,
            filename: None,
        });
        let snap = reporter.snapshot();
        assert_eq!(snap.percent, 50.0);
        assert_eq!(snap.item, 2);
        assert_eq!(snap.filename.as_deref(), Some("second"));
    }
}
