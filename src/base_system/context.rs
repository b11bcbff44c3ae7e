//! 全局配置结构（Config）与默认值。
//!
//! 该模块同时提供生成 `config.yml` 的字段元信息与取值校验。

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use super::config::{ConfigError, ConfigSpec, FieldMeta};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    // 卷配置
    #[serde(default = "default_first_volume")]
    pub first_volume: u32,
    #[serde(default = "default_last_volume")]
    pub last_volume: u32,

    // 路径配置
    #[serde(default = "default_output_root")]
    pub output_root: String,

    // 网络配置
    #[serde(default = "default_archive_url")]
    pub archive_url: String,
    #[serde(default = "default_max_workers")]
    pub max_workers: usize,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_retry_backoff_secs")]
    pub retry_backoff_secs: f64,
    #[serde(default = "default_request_timeout")]
    pub request_timeout: u64,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    // 生成配置
    #[serde(default = "default_pdf_jpeg_quality")]
    pub pdf_jpeg_quality: u8,
}

fn default_first_volume() -> u32 {
    1
}

fn default_last_volume() -> u32 {
    11
}

fn default_output_root() -> String {
    "chainsaw_man_colored".to_string()
}

fn default_archive_url() -> String {
    "https://ia800203.us.archive.org/view_archive.php?archive=/27/items/chainsaw-man-digitally-colored/Chainsaw%20Man%20%28Digitally%20Colored%29.rar".to_string()
}

fn default_max_workers() -> usize {
    3
}

fn default_max_retries() -> u32 {
    3
}

fn default_retry_backoff_secs() -> f64 {
    1.0
}

fn default_request_timeout() -> u64 {
    20
}

fn default_user_agent() -> String {
    "Mozilla/5.0 (csm-colored-downloader)".to_string()
}

fn default_pdf_jpeg_quality() -> u8 {
    90
}

impl Default for Config {
    fn default() -> Self {
        Self {
            first_volume: default_first_volume(),
            last_volume: default_last_volume(),
            output_root: default_output_root(),
            archive_url: default_archive_url(),
            max_workers: default_max_workers(),
            max_retries: default_max_retries(),
            retry_backoff_secs: default_retry_backoff_secs(),
            request_timeout: default_request_timeout(),
            user_agent: default_user_agent(),
            pdf_jpeg_quality: default_pdf_jpeg_quality(),
        }
    }
}

impl ConfigSpec for Config {
    const FILE_NAME: &'static str = "config.yml";

    fn fields() -> &'static [FieldMeta] {
        &[
            FieldMeta {
                name: "first_volume",
                description: "起始卷号（含）",
            },
            FieldMeta {
                name: "last_volume",
                description: "结束卷号（含），卷号固定两位，最大 99",
            },
            FieldMeta {
                name: "output_root",
                description: "图片与成品的输出根目录",
            },
            FieldMeta {
                name: "archive_url",
                description: "archive.org 归档列表页地址",
            },
            FieldMeta {
                name: "max_workers",
                description: "并发下载线程数",
            },
            FieldMeta {
                name: "max_retries",
                description: "单张图片的最大尝试次数",
            },
            FieldMeta {
                name: "retry_backoff_secs",
                description: "重试退避基数（秒），第 n 次失败后等待 n 倍",
            },
            FieldMeta {
                name: "request_timeout",
                description: "HTTP 请求超时时间（秒）",
            },
            FieldMeta {
                name: "user_agent",
                description: "HTTP 请求使用的 User-Agent",
            },
            FieldMeta {
                name: "pdf_jpeg_quality",
                description: "PDF 页面的 JPEG 压缩质量（1-100）",
            },
        ]
    }
}

impl Config {
    /// 检查取值范围，配置加载后调用一次。
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.first_volume < 1 || self.first_volume > self.last_volume {
            return Err(ConfigError::Validation(format!(
                "卷范围无效: first_volume={} last_volume={}",
                self.first_volume, self.last_volume
            )));
        }
        if self.last_volume > 99 {
            return Err(ConfigError::Validation(
                "last_volume 不能超过 99（卷号固定两位）".to_string(),
            ));
        }
        if self.max_workers == 0 {
            return Err(ConfigError::Validation(
                "max_workers 必须至少为 1".to_string(),
            ));
        }
        if self.pdf_jpeg_quality == 0 || self.pdf_jpeg_quality > 100 {
            return Err(ConfigError::Validation(
                "pdf_jpeg_quality 取值范围为 1-100".to_string(),
            ));
        }
        if !self.retry_backoff_secs.is_finite() || self.retry_backoff_secs < 0.0 {
            return Err(ConfigError::Validation(
                "retry_backoff_secs 必须为非负数".to_string(),
            ));
        }
        Ok(())
    }

    /// 目标卷号列表，两位零填充（"01" .. "11"）。
    pub fn volume_tags(&self) -> Vec<String> {
        (self.first_volume..=self.last_volume)
            .map(|n| format!("{n:02}"))
            .collect()
    }

    pub fn output_root_path(&self) -> PathBuf {
        PathBuf::from(&self.output_root)
    }
}
