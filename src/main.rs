//! Social Media Downloader：Facebook / Instagram / TikTok 单个视频与 YouTube 播放列表下载前端。
//!
//! 媒体解析、格式选择与合并全部交给外部 `yt-dlp`（以及可选的 `ffmpeg`）。
//!
//! 代码结构（读代码入口）：
//! - `base_system`：配置/日志/外部工具查找等基础设施
//! - `download`：范围解析、平台校验、yt-dlp 调用与进度解析、后台任务调度
//! - `ui`：TUI 与无 UI（old cli）两套交互

use std::path::Path;

use anyhow::{Result, anyhow};
use clap::Parser;

mod base_system;
mod download;
mod ui;

use base_system::config::load_or_create_with_base;
use base_system::context::Config;
use base_system::logging::{LogOptions, LogSystem};
use base_system::tools;
use tracing::{error, info};

const VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Debug, Parser)]
#[command(name = "social-media-downloader")]
#[command(about = "Download social media videos and YouTube playlists via yt-dlp")]
struct Cli {
    /// 启用调试日志输出（界面日志中显示 yt-dlp 原始输出）
    #[arg(long, default_value_t = false)]
    debug: bool,

    /// 显示版本信息后退出
    #[arg(long, default_value_t = false)]
    version: bool,

    /// 使用 pip 安装或升级 yt-dlp 后退出
    #[arg(long, default_value_t = false)]
    install_ytdlp: bool,

    /// 使用旧版命令行界面（覆盖 config.yml 中的 old_cli）
    #[arg(long, default_value_t = false)]
    old_cli: bool,

    /// 数据目录路径（用于存放 config.yml 和 logs）
    #[arg(long)]
    data_dir: Option<String>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    if cli.version {
        println!("Social Media Downloader v{}", VERSION);
        return Ok(());
    }

    let data_dir = cli.data_dir.as_deref().map(Path::new);
    let log = init_logging(cli.debug, data_dir)?;
    info!(target: "startup", "Social Media Downloader v{}", VERSION);

    let mut config = load_config(data_dir)?;
    log.set_archive_on_exit(config.archive_logs_on_exit);
    if cli.old_cli {
        config.old_cli = true;
    }

    if cli.install_ytdlp {
        return match tools::install_ytdlp() {
            Ok(()) => {
                println!("yt-dlp 安装完成");
                Ok(())
            }
            Err(e) => {
                error!(target: "tools", "{}", e);
                Err(anyhow!(e))
            }
        };
    }

    let status = tools::check_dependencies(&config);

    loop {
        let session = ui::Session::new(config, status.clone());
        if session.config.old_cli {
            return ui::noui::run(&session);
        }

        match ui::tui::run(&session)? {
            ui::tui::TuiExit::Quit => return Ok(()),
            ui::tui::TuiExit::SwitchToOldCli => {
                // 模拟“重启”：重新从磁盘加载配置，然后进入 noui
                config = load_config(data_dir)?;
                config.old_cli = true;
            }
        }
    }
}

fn load_config(data_dir: Option<&Path>) -> Result<Config> {
    load_or_create_with_base::<Config>(None, data_dir).map_err(|e| anyhow!(e.to_string()))
}

fn init_logging(debug: bool, base_dir: Option<&Path>) -> Result<LogSystem> {
    let opts = LogOptions {
        debug,
        use_color: true,
        archive_on_exit: true,
        console: false,
        broadcast_to_ui: true,
    };
    LogSystem::init_with_base(opts, base_dir).map_err(|e| anyhow!(e))
}
