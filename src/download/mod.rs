//! 下载流程模块入口。
//!
//! 子模块：
//! - `models`     — 数据模型（LinkRecord / DownloadStatus / DownloadReport）
//! - `progress`   — CLI 进度条
//! - `image_pool` — 图片并发下载工作池
//! - `downloader` — 单张抓取与批量调度

pub mod downloader;
pub mod models;
pub(crate) mod image_pool;
pub(crate) mod progress;
