//! CSM Colored Downloader（电锯人全彩卷下载器）。
//!
//! 从 archive.org 的归档列表页解析图片链接，按卷并发下载到本地，
//! 再把每卷图片装订为 PDF 与 EPUB。
//!
//! 代码结构（读代码入口）：
//! - `base_system`：配置/日志/路径等基础设施
//! - `page_parser`：归档页抓取与链接分类
//! - `download`：并发下载调度（跳过/重试/原子落盘）
//! - `book_builder`：图片收集排序与 PDF/EPUB 生成

use std::path::PathBuf;
use std::time::Instant;

use anyhow::{Context, Result, anyhow};
use clap::Parser;
use tracing::info;

mod base_system;
mod book_builder;
mod download;
mod page_parser;

use base_system::config::load_or_create;
use base_system::context::Config;
use base_system::logging::LogSystem;

const VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Debug, Parser)]
#[command(name = "csm-colored-downloader")]
#[command(about = "Chainsaw Man (Digitally Colored) 下载与装订工具")]
struct Cli {
    /// 配置文件路径（默认为当前目录 config.yml）
    #[arg(long)]
    config: Option<PathBuf>,

    /// 起始卷号（覆盖配置文件）
    #[arg(long)]
    first_volume: Option<u32>,

    /// 结束卷号（覆盖配置文件）
    #[arg(long)]
    last_volume: Option<u32>,

    /// 输出根目录（覆盖配置文件）
    #[arg(long)]
    output: Option<String>,

    /// 并发下载线程数（覆盖配置文件）
    #[arg(long)]
    workers: Option<usize>,

    /// 跳过抓取/下载/PDF，只用本地已有图片生成 EPUB
    #[arg(long, default_value_t = false, conflicts_with = "skip_epub")]
    epub_only: bool,

    /// 抓取/下载并生成 PDF，不生成 EPUB
    #[arg(long, default_value_t = false)]
    skip_epub: bool,

    /// 重新生成已存在的 PDF / EPUB
    #[arg(long, default_value_t = false)]
    force: bool,

    /// 启用调试日志输出
    #[arg(long, default_value_t = false)]
    debug: bool,

    /// 显示版本信息后退出
    #[arg(long, default_value_t = false)]
    version: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    if cli.version {
        println!("CSM Colored Downloader v{VERSION}");
        return Ok(());
    }

    let _log = LogSystem::init(cli.debug).map_err(|e| anyhow!(e))?;
    info!("当前版本: v{VERSION}");

    let mut config =
        load_or_create::<Config>(cli.config.as_deref()).map_err(|e| anyhow!(e.to_string()))?;
    apply_overrides(&mut config, &cli);
    config.validate().map_err(|e| anyhow!(e.to_string()))?;

    let started = Instant::now();
    run_pipeline(&config, &cli)?;
    info!("全部完成，用时 {:.1} 秒", started.elapsed().as_secs_f32());
    Ok(())
}

fn apply_overrides(config: &mut Config, cli: &Cli) {
    if let Some(vol) = cli.first_volume {
        config.first_volume = vol;
    }
    if let Some(vol) = cli.last_volume {
        config.last_volume = vol;
    }
    if let Some(dir) = &cli.output {
        config.output_root = dir.clone();
    }
    if let Some(workers) = cli.workers {
        config.max_workers = workers;
    }
}

fn run_pipeline(config: &Config, cli: &Cli) -> Result<()> {
    if !cli.epub_only {
        let client = page_parser::network::build_client(config)?;
        let html = page_parser::network::fetch_page_html(&client, &config.archive_url)
            .context("获取归档页面失败")?;
        let links = page_parser::links::extract_links(&html, config)?;
        download::downloader::download_links(config, &client, &links);

        for vol in config.volume_tags() {
            book_builder::pdf_generator::build_pdf_for_volume(config, &vol, cli.force)
                .with_context(|| format!("生成 PDF 失败: 卷 {vol}"))?;
        }
    }

    if !cli.skip_epub {
        for vol in config.volume_tags() {
            book_builder::epub_generator::build_epub_for_volume(config, &vol, cli.force)
                .with_context(|| format!("生成 EPUB 失败: 卷 {vol}"))?;
        }
    }

    Ok(())
}
