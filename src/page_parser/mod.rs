//! 归档页面抓取与图片链接解析。
//!
//! 子模块：
//! - `network` — 共享 HTTP 客户端与归档页抓取
//! - `links` — href 扫描、分类与下载任务生成

pub mod links;
pub mod network;
