//! 下载相关的数据模型定义。
//!
//! 包含下载任务、单项结果与批量统计等核心数据结构。

use std::time::Duration;

/// 链接提取器产出的单个下载任务，贯穿下载全流程。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkRecord {
    /// 两位零填充卷号（如 "05"）
    pub volume: String,
    /// 归档内相对路径（已解码），兼作本地落盘相对路径
    pub inner_path: String,
    /// 完整下载地址（http/https，保持原始转义）
    pub url: String,
}

/// 单个下载任务的最终状态。
#[derive(Debug, Clone)]
pub enum DownloadStatus {
    /// 本次运行实际下载
    Downloaded,
    /// 目标文件已存在，未发起网络请求
    Skipped,
    /// 重试耗尽后仍失败
    Failed(String),
}

/// 工作线程经事件通道送回主线程的任务结果。
#[derive(Debug, Clone)]
pub struct DownloadOutcome {
    pub record: LinkRecord,
    pub status: DownloadStatus,
}

#[derive(Debug, Default, Clone, Copy)]
pub struct DownloadReport {
    pub downloaded: u32,
    pub skipped: u32,
    pub failed: u32,
}

impl DownloadReport {
    pub fn absorb(&mut self, status: &DownloadStatus) {
        match status {
            DownloadStatus::Downloaded => self.downloaded += 1,
            DownloadStatus::Skipped => self.skipped += 1,
            DownloadStatus::Failed(_) => self.failed += 1,
        }
    }

    pub fn total(&self) -> u32 {
        self.downloaded + self.skipped + self.failed
    }
}

/// 线性退避：第 `attempt` 次失败后的等待时长（base * attempt 秒）。
pub fn backoff_delay(base_secs: f64, attempt: u32) -> Duration {
    Duration::from_secs_f64((base_secs * attempt as f64).max(0.0))
}
