use std::sync::mpsc::{self, RecvTimeoutError};
use std::time::Duration;

use anyhow::Result;
use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};

use crate::base_system::logging::take_broadcast_rx;
use crate::download::models::{BatchSummary, JobRequest, ProgressEvent};
use crate::download::worker::WorkerMsg;
use crate::ui::Session;

/// 派发任务并阻塞当前线程直到结束。
pub(super) fn run_job(session: &Session, request: JobRequest) -> Result<()> {
    let (tx, rx) = mpsc::channel();
    if let Err(e) = session.start(request, tx) {
        println!("无法开始下载：{}", e);
        return Ok(());
    }

    let log_rx = take_broadcast_rx();
    let bar = ProgressBar::with_draw_target(Some(100), ProgressDrawTarget::stderr());
    bar.set_style(
        ProgressStyle::with_template("{prefix} [{elapsed_precise}] {wide_bar} {pos:>3}% {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("##-"),
    );

    let outcome = loop {
        if let Some(logs) = log_rx.as_ref() {
            while let Ok(line) = logs.try_recv() {
                bar.println(line.trim_end());
            }
        }
        match rx.recv_timeout(Duration::from_millis(100)) {
            Ok(WorkerMsg::Progress(ev)) => render(&bar, &ev),
            Ok(WorkerMsg::Done(result)) => break result,
            Err(RecvTimeoutError::Timeout) => continue,
            Err(RecvTimeoutError::Disconnected) => {
                bar.abandon();
                println!("下载线程意外结束");
                return Ok(());
            }
        }
    };

    // Lines logged right before Done.
    if let Some(logs) = log_rx.as_ref() {
        while let Ok(line) = logs.try_recv() {
            bar.println(line.trim_end());
        }
    }
    bar.finish_and_clear();

    match outcome {
        Ok(summary) => println!("{}", summary_text(&summary)),
        Err(e) => println!("下载失败：{}", e),
    }
    Ok(())
}

fn render(bar: &ProgressBar, ev: &ProgressEvent) {
    bar.set_prefix(format!("[{}/{}]", ev.item, ev.item_total));
    bar.set_position(ev.percent.round() as u64);
    let mut msg = ev.filename.clone().unwrap_or_default();
    if let Some(speed) = &ev.speed {
        msg.push_str(&format!("  {}", speed));
    }
    if let Some(eta) = &ev.eta {
        msg.push_str(&format!("  ETA {}", eta));
    }
    bar.set_message(msg);
}

pub(crate) fn summary_text(summary: &BatchSummary) -> String {
    let mut text = format!("下载完成！文件保存在：{}", summary.output_dir.display());
    if summary.failed > 0 || summary.skipped > 0 {
        text.push_str(&format!(
            "\n成功 {} 个，失败 {} 个，跳过 {} 个",
            summary.succeeded, summary.failed, summary.skipped
        ));
    }
    text
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn summary_mentions_failures_only_when_present() {
        let clean = BatchSummary {
            output_dir: PathBuf::from("/tmp/out"),
            succeeded: 3,
            ..Default::default()
        };
        assert!(!summary_text(&clean).contains("失败"));
        assert!(summary_text(&clean).contains("/tmp/out"));

        let mixed = BatchSummary {
            failed: 1,
            skipped: 2,
            ..clean
        };
        assert!(summary_text(&mixed).contains("失败 1 个，跳过 2 个"));
    }
}
