//! 剪贴板读取（TUI 粘贴链接用）。
//!
//! - Desktop：通过 `clipboard-arboard` 使用 arboard。
//! - Android：使用 Termux `termux-clipboard-get`。

use anyhow::Result;

#[cfg(any(
    all(feature = "clipboard", target_os = "android"),
    all(
        feature = "clipboard",
        feature = "clipboard-arboard",
        not(target_os = "android")
    )
))]
use anyhow::Context;

#[cfg(all(feature = "clipboard", target_os = "android"))]
pub(super) fn get_text() -> Result<Option<String>> {
    use std::process::Command;

    let output = match Command::new("termux-clipboard-get").output() {
        Ok(o) => o,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e).context("run termux-clipboard-get"),
    };
    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        anyhow::bail!("termux-clipboard-get failed: {}", stderr.trim());
    }
    Ok(non_blank(String::from_utf8_lossy(&output.stdout).into_owned()))
}

#[cfg(all(
    feature = "clipboard",
    feature = "clipboard-arboard",
    not(target_os = "android")
))]
pub(super) fn get_text() -> Result<Option<String>> {
    let mut clip = arboard::Clipboard::new().context("init clipboard")?;
    let text = clip.get_text().context("get clipboard text")?;
    Ok(non_blank(text))
}

#[cfg(all(
    feature = "clipboard",
    not(target_os = "android"),
    not(feature = "clipboard-arboard")
))]
pub(super) fn get_text() -> Result<Option<String>> {
    Ok(None)
}

#[cfg(feature = "clipboard")]
fn non_blank(text: String) -> Option<String> {
    (!text.trim().is_empty()).then_some(text)
}

/// 输入框只有一行：粘贴内容中的换行折叠为空格并去掉首尾空白。
pub(super) fn single_line(text: &str) -> String {
    text.split(['\r', '\n'])
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}
