//! 共享 HTTP 客户端与归档页抓取。

use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::blocking::Client;
use reqwest::header::{ACCEPT, ACCEPT_ENCODING, CONNECTION, HeaderMap, HeaderValue, USER_AGENT};
use tracing::info;

use crate::base_system::context::Config;

/// 构建全流程共享的阻塞客户端。
///
/// reqwest 未启用默认 features（无 gzip 解码器），这里显式要求
/// identity 编码，保证响应字节可直接落盘。
pub fn build_client(config: &Config) -> Result<Client> {
    let mut headers = HeaderMap::new();
    headers.insert(ACCEPT, HeaderValue::from_static("*/*"));
    headers.insert(ACCEPT_ENCODING, HeaderValue::from_static("identity"));
    headers.insert(CONNECTION, HeaderValue::from_static("keep-alive"));
    headers.insert(
        USER_AGENT,
        HeaderValue::from_str(&config.user_agent)
            .unwrap_or(HeaderValue::from_static("Mozilla/5.0")),
    );

    Client::builder()
        .default_headers(headers)
        .timeout(Duration::from_secs(config.request_timeout))
        .build()
        .context("构建 HTTP 客户端失败")
}

/// 抓取归档列表页 HTML。这是全流程中唯一的致命网络错误。
pub fn fetch_page_html(client: &Client, url: &str) -> Result<String> {
    info!("正在获取归档页面 HTML...");
    let response = client
        .get(url)
        .send()
        .with_context(|| format!("请求归档页面失败: {url}"))?
        .error_for_status()
        .with_context(|| format!("归档页面返回错误状态: {url}"))?;
    let html = response.text().context("读取归档页面正文失败")?;
    info!("已获取 HTML，共 {} 字节", html.len());
    Ok(html)
}
