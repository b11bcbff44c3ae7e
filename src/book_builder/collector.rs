//! 卷图片收集与排序。
//!
//! 遍历输出根目录，筛出目录路径带卷标记的图片文件，
//! 按（章节号, 页码, 相对路径）排序；EPUB 侧再按章节标签分组。

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use regex::Regex;
use tracing::warn;

use crate::base_system::context::Config;

/// 输出树中的一张图片。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageEntry {
    /// 相对输出根目录的路径，排序与章节分组都以它为依据
    pub rel_path: String,
    pub abs_path: PathBuf,
}

/// 同一章节标签下的连续页。
#[derive(Debug, Clone)]
pub struct ChapterGroup {
    pub label: String,
    pub pages: Vec<ImageEntry>,
}

/// 章节号或页码解析失败时的排序哨兵，未解析条目排在已解析之后。
const ORDER_SENTINEL: u32 = 9999;

const IMAGE_EXTENSIONS: [&str; 3] = ["jpg", "jpeg", "png"];

/// 收集某一卷的全部图片并排序。
///
/// 卷的归属看图片所在目录的路径是否含卷标记，文件名本身不参与判断。
pub fn collect_images_for_volume(config: &Config, vol: &str) -> Result<Vec<ImageEntry>> {
    let root = config.output_root_path();
    let tag = format!("Digital Colored Comics v{vol}");

    let mut entries = Vec::new();
    if root.is_dir() {
        walk_dir(&root, &root, &tag, &mut entries);
    }

    let chapter_re = Regex::new(r"Chapter\s+(\d+)").context("编译章节号正则失败")?;
    entries.sort_by_cached_key(|entry| sort_key(&entry.rel_path, &chapter_re));
    Ok(entries)
}

fn walk_dir(root: &Path, dir: &Path, tag: &str, entries: &mut Vec<ImageEntry>) {
    let reader = match fs::read_dir(dir) {
        Ok(reader) => reader,
        Err(err) => {
            warn!("读取目录失败 {}: {err}", dir.display());
            return;
        }
    };

    let dir_matches = dir.to_string_lossy().contains(tag);
    for entry in reader.flatten() {
        let path = entry.path();
        if path.is_dir() {
            walk_dir(root, &path, tag, entries);
        } else if dir_matches && is_image_file(&path) {
            let rel = path.strip_prefix(root).unwrap_or(&path);
            entries.push(ImageEntry {
                rel_path: rel.to_string_lossy().into_owned(),
                abs_path: path,
            });
        }
    }
}

fn is_image_file(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| IMAGE_EXTENSIONS.iter().any(|ok| ext.eq_ignore_ascii_case(ok)))
        .unwrap_or(false)
}

/// 排序键：章节号数值升序，其次文件名末尾页码数值升序，最后整条路径兜底。
/// 数值比较保证 "Chapter 10" 排在 "Chapter 2" 之后。
fn sort_key(rel_path: &str, chapter_re: &Regex) -> (u32, u32, String) {
    let chapter = chapter_re
        .captures(rel_path)
        .and_then(|caps| caps[1].parse().ok())
        .unwrap_or(ORDER_SENTINEL);

    let file_name = Path::new(rel_path)
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| rel_path.to_string());
    let page = page_number(&file_name).unwrap_or(ORDER_SENTINEL);

    (chapter, page, rel_path.to_string())
}

/// 文件名中紧贴扩展名的结尾数字，如 "p03.jpg" -> 3。
fn page_number(file_name: &str) -> Option<u32> {
    let (stem, _ext) = file_name.rsplit_once('.')?;
    let digits: Vec<char> = stem
        .chars()
        .rev()
        .take_while(|c| c.is_ascii_digit())
        .collect();
    if digits.is_empty() {
        return None;
    }
    digits.iter().rev().collect::<String>().parse().ok()
}

/// 按章节标签分组，保持标签首次出现的顺序。
/// 标签解析不出时归入 "Pages"。
pub fn group_by_chapter(entries: &[ImageEntry]) -> Result<Vec<ChapterGroup>> {
    let label_re = Regex::new(r"(Chapter\s+\d+[^/]*)").context("编译章节标签正则失败")?;

    let mut groups: Vec<ChapterGroup> = Vec::new();
    for entry in entries {
        let label = label_re
            .captures(&entry.rel_path)
            .map(|caps| caps[1].to_string())
            .unwrap_or_else(|| "Pages".to_string());

        match groups.iter_mut().find(|group| group.label == label) {
            Some(group) => group.pages.push(entry.clone()),
            None => groups.push(ChapterGroup {
                label,
                pages: vec![entry.clone()],
            }),
        }
    }
    Ok(groups)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn touch(path: &Path) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, b"x").unwrap();
    }

    fn volume_dir(root: &Path, vol: &str) -> PathBuf {
        root.join(format!("Digital Colored Comics v{vol}"))
            .join("Chainsaw Man (Digitally Colored)")
    }

    #[test]
    fn collects_only_tagged_directories() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        let v05 = volume_dir(root, "05");

        touch(&v05.join("Chapter 1/01.jpg"));
        touch(&v05.join("Chapter 1/notes.txt"));
        touch(&root.join("other/stray.jpg"));
        touch(&volume_dir(root, "06").join("Chapter 40/01.jpg"));

        let config = Config {
            output_root: root.to_string_lossy().into_owned(),
            ..Config::default()
        };
        let entries = collect_images_for_volume(&config, "05").unwrap();

        assert_eq!(entries.len(), 1);
        assert!(entries[0].rel_path.ends_with("01.jpg"));
    }

    #[test]
    fn sorts_chapters_numerically_not_lexically() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        let v05 = volume_dir(root, "05");

        touch(&v05.join("Chapter 10 - Baz/01.jpg"));
        touch(&v05.join("Chapter 2 - Bar/03.jpg"));
        touch(&v05.join("Chapter 2 - Bar/01.jpg"));

        let config = Config {
            output_root: root.to_string_lossy().into_owned(),
            ..Config::default()
        };
        let entries = collect_images_for_volume(&config, "05").unwrap();

        let order: Vec<&str> = entries.iter().map(|e| e.rel_path.as_str()).collect();
        assert!(order[0].contains("Chapter 2") && order[0].ends_with("01.jpg"));
        assert!(order[1].contains("Chapter 2") && order[1].ends_with("03.jpg"));
        assert!(order[2].contains("Chapter 10"));
    }

    #[test]
    fn unparsed_entries_sort_last() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        let v05 = volume_dir(root, "05");

        touch(&v05.join("cover.jpg"));
        touch(&v05.join("Chapter 3/scan.png"));
        touch(&v05.join("Chapter 3/07.png"));

        let config = Config {
            output_root: root.to_string_lossy().into_owned(),
            ..Config::default()
        };
        let entries = collect_images_for_volume(&config, "05").unwrap();

        // 页码可解析的在前，无页码的殿后，无章节的最后
        assert!(entries[0].rel_path.ends_with("07.png"));
        assert!(entries[1].rel_path.ends_with("scan.png"));
        assert!(entries[2].rel_path.ends_with("cover.jpg"));
    }

    #[test]
    fn sort_key_parses_chapter_and_page() {
        let re = Regex::new(r"Chapter\s+(\d+)").unwrap();
        let (chapter, page, _) = sort_key("x/Chapter 3 - Foo/05.jpg", &re);
        assert_eq!((chapter, page), (3, 5));

        let (chapter, page, _) = sort_key("x/cover.jpg", &re);
        assert_eq!((chapter, page), (ORDER_SENTINEL, ORDER_SENTINEL));
    }

    #[test]
    fn page_number_requires_trailing_digits() {
        assert_eq!(page_number("03.jpg"), Some(3));
        assert_eq!(page_number("page12.png"), Some(12));
        assert_eq!(page_number("12a.jpg"), None);
        assert_eq!(page_number("scan.jpg"), None);
        assert_eq!(page_number("noext"), None);
    }

    #[test]
    fn groups_preserve_first_seen_label_order() {
        let entries = vec![
            ImageEntry {
                rel_path: "v/Chapter 2 - Bar/01.jpg".to_string(),
                abs_path: PathBuf::from("a"),
            },
            ImageEntry {
                rel_path: "v/Chapter 2 - Bar/02.jpg".to_string(),
                abs_path: PathBuf::from("b"),
            },
            ImageEntry {
                rel_path: "v/Chapter 10 - Baz/01.jpg".to_string(),
                abs_path: PathBuf::from("c"),
            },
            ImageEntry {
                rel_path: "v/cover.jpg".to_string(),
                abs_path: PathBuf::from("d"),
            },
        ];

        let groups = group_by_chapter(&entries).unwrap();
        let labels: Vec<&str> = groups.iter().map(|g| g.label.as_str()).collect();
        assert_eq!(labels, vec!["Chapter 2 - Bar", "Chapter 10 - Baz", "Pages"]);
        assert_eq!(groups[0].pages.len(), 2);
    }
}
