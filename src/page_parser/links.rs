//! 图片链接扫描与分类。
//!
//! 从归档页 HTML 中扫描 href 属性，按卷号标记过滤并生成下载任务。
//! 未保留的链接带排除原因，便于统计与测试。

use anyhow::{Context, Result};
use percent_encoding::percent_decode_str;
use regex::Regex;
use tracing::{debug, info};

use crate::base_system::context::Config;
use crate::download::models::LinkRecord;

/// 卷号标记：从解码后的路径中提取两位卷号。
const VOLUME_MARKER: &str = r"Digital Colored Comics v(\d{2})";
/// 归档内根目录标记，inner_path 从这里开始（含标记本身）。
const ROOT_MARKER: &str = "Chainsaw Man (Digitally Colored)/";

/// 单个 href 的分类结果。
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkParse {
    Kept(LinkRecord),
    /// 既不是 http(s) 也不是协议相对地址
    NoScheme,
    /// 解码后的路径中没有卷号标记
    NoVolumeMarker,
    /// 卷号在配置范围之外
    VolumeOutOfRange(String),
}

/// 扫描 HTML 中全部图片 href 并逐个分类。
pub fn classify_hrefs(html: &str, config: &Config) -> Result<Vec<LinkParse>> {
    let href_re = Regex::new(r#"(?i)href="([^"]+\.(?:jpg|jpeg|png))""#)
        .context("编译 href 正则失败")?;
    let volume_re = Regex::new(VOLUME_MARKER).context("编译卷号正则失败")?;
    let targets = config.volume_tags();

    Ok(href_re
        .captures_iter(html)
        .map(|caps| classify_one(&caps[1], &volume_re, &targets))
        .collect())
}

fn classify_one(href: &str, volume_re: &Regex, targets: &[String]) -> LinkParse {
    let url = if let Some(rest) = href.strip_prefix("//") {
        format!("https://{rest}")
    } else if href.starts_with("http://") || href.starts_with("https://") {
        href.to_string()
    } else {
        return LinkParse::NoScheme;
    };

    // 卷号与路径标记都在解码后的文本上匹配
    let decoded = percent_decode_str(href).decode_utf8_lossy().into_owned();

    let Some(caps) = volume_re.captures(&decoded) else {
        return LinkParse::NoVolumeMarker;
    };
    let volume = caps[1].to_string();
    if !targets.contains(&volume) {
        return LinkParse::VolumeOutOfRange(volume);
    }

    // 标记缺失时退化为裸文件名，文件会落在输出根目录下
    let inner_path = match decoded.find(ROOT_MARKER) {
        Some(idx) => decoded[idx..].to_string(),
        None => decoded
            .rsplit('/')
            .next()
            .unwrap_or(decoded.as_str())
            .to_string(),
    };

    LinkParse::Kept(LinkRecord {
        volume,
        inner_path,
        url,
    })
}

/// 扫描 HTML 并返回保留的链接，按（卷号, inner_path）排序。
pub fn extract_links(html: &str, config: &Config) -> Result<Vec<LinkRecord>> {
    let parsed = classify_hrefs(html, config)?;
    info!("共匹配到 {} 个图片 href", parsed.len());

    let mut records = Vec::new();
    let (mut no_scheme, mut no_marker, mut out_of_range) = (0usize, 0usize, 0usize);
    for item in parsed {
        match item {
            LinkParse::Kept(record) => records.push(record),
            LinkParse::NoScheme => no_scheme += 1,
            LinkParse::NoVolumeMarker => no_marker += 1,
            LinkParse::VolumeOutOfRange(vol) => {
                debug!("卷号超出范围: v{vol}");
                out_of_range += 1;
            }
        }
    }

    records.sort_by(|a, b| (&a.volume, &a.inner_path).cmp(&(&b.volume, &b.inner_path)));

    info!(
        "保留 {} 张图片（卷 {:02} - {:02}），排除: 无协议 {} / 无卷标 {} / 超出范围 {}",
        records.len(),
        config.first_volume,
        config.last_volume,
        no_scheme,
        no_marker,
        out_of_range
    );
    for record in records.iter().take(5) {
        debug!("示例: {}", record.inner_path);
    }

    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page(hrefs: &[&str]) -> String {
        hrefs
            .iter()
            .map(|h| format!(r#"<a href="{h}">link</a>"#))
            .collect::<Vec<_>>()
            .join("\n")
    }

    #[test]
    fn keeps_protocol_relative_link_with_marker() {
        let html = page(&[
            "//cdn/x/Digital Colored Comics v05/Chainsaw Man (Digitally Colored)/Chapter 2 - Foo/03.jpg",
        ]);
        let links = extract_links(&html, &Config::default()).unwrap();

        assert_eq!(links.len(), 1);
        assert_eq!(links[0].volume, "05");
        assert!(links[0].url.starts_with("https://cdn/x/"));
        assert_eq!(
            links[0].inner_path,
            "Chainsaw Man (Digitally Colored)/Chapter 2 - Foo/03.jpg"
        );
    }

    #[test]
    fn decodes_percent_escapes_before_matching() {
        let html = page(&[
            "https://host/Digital%20Colored%20Comics%20v03/Chainsaw%20Man%20%28Digitally%20Colored%29/Chapter%201/01.png",
        ]);
        let links = extract_links(&html, &Config::default()).unwrap();

        assert_eq!(links.len(), 1);
        assert_eq!(links[0].volume, "03");
        assert_eq!(
            links[0].inner_path,
            "Chainsaw Man (Digitally Colored)/Chapter 1/01.png"
        );
        // 下载地址保持原始转义形式
        assert!(links[0].url.contains("%20"));
    }

    #[test]
    fn rejects_links_without_scheme() {
        let html = page(&[
            "/relative/Digital Colored Comics v05/x.jpg",
            "ftp://host/Digital Colored Comics v05/x.jpg",
        ]);
        let parsed = classify_hrefs(&html, &Config::default()).unwrap();
        assert_eq!(parsed, vec![LinkParse::NoScheme, LinkParse::NoScheme]);
    }

    #[test]
    fn rejects_links_without_volume_marker() {
        let html = page(&["https://host/some/other/file.jpg"]);
        let parsed = classify_hrefs(&html, &Config::default()).unwrap();
        assert_eq!(parsed, vec![LinkParse::NoVolumeMarker]);
    }

    #[test]
    fn rejects_volumes_outside_configured_range() {
        let html = page(&["https://host/Digital Colored Comics v99/a.jpg"]);
        let parsed = classify_hrefs(&html, &Config::default()).unwrap();
        assert_eq!(parsed, vec![LinkParse::VolumeOutOfRange("99".to_string())]);

        let narrow = Config {
            first_volume: 2,
            last_volume: 3,
            ..Config::default()
        };
        let html = page(&["https://host/Digital Colored Comics v05/a.jpg"]);
        let parsed = classify_hrefs(&html, &narrow).unwrap();
        assert_eq!(parsed, vec![LinkParse::VolumeOutOfRange("05".to_string())]);
    }

    #[test]
    fn extension_match_is_case_insensitive() {
        let html = page(&["https://host/Digital Colored Comics v05/COVER.JPG"]);
        let links = extract_links(&html, &Config::default()).unwrap();
        assert_eq!(links.len(), 1);
    }

    #[test]
    fn non_image_hrefs_are_ignored() {
        let html = page(&[
            "https://host/Digital Colored Comics v05/readme.txt",
            "https://host/Digital Colored Comics v05/page.html",
        ]);
        let parsed = classify_hrefs(&html, &Config::default()).unwrap();
        assert!(parsed.is_empty());
    }

    #[test]
    fn falls_back_to_bare_filename_without_root_marker() {
        let html = page(&["https://host/Digital Colored Comics v05/loose.png"]);
        let links = extract_links(&html, &Config::default()).unwrap();
        assert_eq!(links[0].inner_path, "loose.png");
    }

    #[test]
    fn links_sort_by_volume_then_inner_path() {
        let html = page(&[
            "https://host/Digital Colored Comics v10/Chainsaw Man (Digitally Colored)/a.jpg",
            "https://host/Digital Colored Comics v02/Chainsaw Man (Digitally Colored)/b.jpg",
            "https://host/Digital Colored Comics v02/Chainsaw Man (Digitally Colored)/a.jpg",
        ]);
        let links = extract_links(&html, &Config::default()).unwrap();

        let order: Vec<&str> = links.iter().map(|l| l.volume.as_str()).collect();
        assert_eq!(order, vec!["02", "02", "10"]);
        assert!(links[0].inner_path < links[1].inner_path);
    }
}
