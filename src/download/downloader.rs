//! 下载调度：单张抓取（跳过/重试/原子落盘）与批量并发。

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::{Context, Result};
use reqwest::blocking::Client;
use tracing::{error, info, warn};

use super::image_pool::ImagePool;
use super::models::{DownloadOutcome, DownloadReport, DownloadStatus, LinkRecord, backoff_delay};
use super::progress::make_download_bar;
use crate::base_system::book_paths;
use crate::base_system::context::Config;

/// 下载单张图片。目标文件已存在时直接跳过，不发起任何网络请求。
pub(crate) fn download_one(
    config: &Config,
    client: &Client,
    record: &LinkRecord,
) -> DownloadStatus {
    let target = book_paths::image_target_path(config, &record.inner_path);

    if target.exists() {
        return DownloadStatus::Skipped;
    }

    if let Some(parent) = target.parent() {
        if let Err(err) = fs::create_dir_all(parent) {
            return DownloadStatus::Failed(format!("创建目录失败: {err}"));
        }
    }

    let retries = config.max_retries.max(1);
    let mut last_err = String::new();
    for attempt in 1..=retries {
        match fetch_to_file(client, &record.url, &target) {
            Ok(()) => return DownloadStatus::Downloaded,
            Err(err) => {
                last_err = format!("{err:#}");
                if attempt < retries {
                    let delay = backoff_delay(config.retry_backoff_secs, attempt);
                    warn!(
                        "第 {}/{} 次失败 {}，{:.1} 秒后重试（{}）",
                        attempt,
                        retries,
                        record.url,
                        delay.as_secs_f64(),
                        last_err
                    );
                    std::thread::sleep(delay);
                }
            }
        }
    }

    DownloadStatus::Failed(last_err)
}

/// 流式落盘：先写 `.xxxpart` 临时文件，完整后原子改名。
/// 任何失败都会清掉临时文件，目标位置不会出现半截文件。
fn fetch_to_file(client: &Client, url: &str, target: &Path) -> Result<()> {
    let part = part_path(target);

    if let Err(err) = stream_to_part(client, url, &part) {
        let _ = fs::remove_file(&part);
        return Err(err);
    }

    let _ = fs::remove_file(target);
    fs::rename(&part, target).with_context(|| format!("改名失败: {}", target.display()))?;
    Ok(())
}

fn stream_to_part(client: &Client, url: &str, part: &Path) -> Result<()> {
    let mut response = client
        .get(url)
        .send()
        .with_context(|| format!("请求失败: {url}"))?
        .error_for_status()
        .with_context(|| format!("错误状态: {url}"))?;

    let mut file = fs::File::create(part)
        .with_context(|| format!("创建临时文件失败: {}", part.display()))?;
    io::copy(&mut response, &mut file)
        .with_context(|| format!("写入失败: {}", part.display()))?;
    Ok(())
}

fn part_path(target: &Path) -> PathBuf {
    let ext = target.extension().and_then(|s| s.to_str()).unwrap_or("");
    target.with_extension(format!("{ext}part"))
}

/// 并发下载全部链接，逐条结果化为日志与进度条步进。
pub fn download_links(config: &Config, client: &Client, links: &[LinkRecord]) -> DownloadReport {
    if links.is_empty() {
        warn!("没有可下载的图片");
        return DownloadReport::default();
    }

    info!(
        "开始并发下载（{} 线程，共 {} 张）...",
        config.max_workers.max(1),
        links.len()
    );
    let started = Instant::now();
    let bar = make_download_bar(links.len() as u64);

    let mut pool = ImagePool::new(config, client);
    for record in links {
        pool.submit(record.clone());
    }

    let mut report = DownloadReport::default();
    while (report.total() as usize) < links.len() {
        let Some(outcome) = pool.recv_outcome() else {
            break;
        };
        report.absorb(&outcome.status);
        bar.inc(1);
        log_outcome(&outcome);
    }
    pool.shutdown();
    bar.finish_and_clear();

    info!(
        "下载完成: 成功 {} / 跳过 {} / 失败 {}，用时 {:.1} 秒",
        report.downloaded,
        report.skipped,
        report.failed,
        started.elapsed().as_secs_f32()
    );
    report
}

fn log_outcome(outcome: &DownloadOutcome) {
    match &outcome.status {
        DownloadStatus::Downloaded => {
            info!("已下载 v{}: {}", outcome.record.volume, outcome.record.inner_path);
        }
        DownloadStatus::Skipped => {
            info!("跳过（已存在）: {}", outcome.record.inner_path);
        }
        DownloadStatus::Failed(err) => {
            error!("下载失败 {}: {}", outcome.record.url, err);
        }
    }
}
