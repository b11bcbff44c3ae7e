//! EPUB 生成器。
//!
//! 每页一个 XHTML 文档内嵌整幅图片，目录停留在章节级别：
//! 只有章节首页进入 TOC，阅读顺序（spine）仍按页排列。

use std::collections::HashMap;
use std::fs;
use std::io::{Cursor, Read, Write};
use std::path::Path;

use anyhow::{Context, Result, anyhow};
use epub_builder::{EpubBuilder, EpubContent, EpubVersion, ReferenceType, ZipLibrary};
use tracing::info;
use zip::write::FileOptions;

use super::RenderOutcome;
use super::collector::{ChapterGroup, ImageEntry, collect_images_for_volume, group_by_chapter};
use crate::base_system::book_paths;
use crate::base_system::context::Config;

/// 用于从卷标识确定性派生 UUID v5 的命名空间。
/// 同一卷多次生成得到相同的 dc:identifier。
const EPUB_UUID_NAMESPACE: uuid::Uuid = uuid::Uuid::from_bytes([
    0x6b, 0xa7, 0xb8, 0x10, 0x9d, 0xad, 0x11, 0xd1, 0x80, 0xb4, 0x00, 0xc0, 0x4f, 0xd4, 0x30,
    0xc8,
]);

const BOOK_AUTHOR: &str = "Tatsuki Fujimoto";

/// 一页在书内的位置：章节序号与章节内页号都从 1 开始。
struct PagePlan<'a> {
    entry: &'a ImageEntry,
    label: &'a str,
    chapter_index: usize,
    page_index: usize,
    first_of_chapter: bool,
}

/// 生成单卷 EPUB。没有图片的卷跳过，已存在时除非 force 否则不重建。
pub fn build_epub_for_volume(config: &Config, vol: &str, force: bool) -> Result<RenderOutcome> {
    let entries = collect_images_for_volume(config, vol)?;
    if entries.is_empty() {
        info!("卷 {vol} 没有图片，跳过 EPUB");
        return Ok(RenderOutcome::NoImages);
    }

    let epub_path = book_paths::volume_epub_path(config, vol);
    if epub_path.exists() && !force {
        info!("EPUB 已存在，跳过卷 {vol}");
        return Ok(RenderOutcome::AlreadyExists);
    }

    info!("开始生成 EPUB v{vol}（共 {} 页）...", entries.len());
    let chapters = group_by_chapter(&entries)?;

    let identifier = format!("chainsaw-man-colored-v{vol}");
    let title = format!("Chainsaw Man (Digitally Colored) v{vol}");
    let description = format!("Chainsaw Man, Digitally Colored, Volume {vol}");

    let mut book = new_builder(&identifier, &title, &description)?;
    let plans = plan_pages(&entries, &chapters);
    for plan in &plans {
        add_page(&mut book, vol, plan)?;
    }

    let mut raw = Vec::new();
    book.generate(&mut raw)
        .map_err(|e| anyhow!(e.to_string()))?;
    let fixed = fixup_identifier(raw, &identifier)?;

    if let Some(parent) = epub_path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("创建目录失败: {}", parent.display()))?;
    }
    fs::write(&epub_path, fixed)
        .with_context(|| format!("写入 EPUB 失败: {}", epub_path.display()))?;

    info!("已保存 {}（{} 页）", epub_path.display(), plans.len());
    Ok(RenderOutcome::Rendered(plans.len()))
}

fn new_builder(
    identifier: &str,
    title: &str,
    description: &str,
) -> Result<EpubBuilder<ZipLibrary>> {
    let zip = ZipLibrary::new().map_err(|e| anyhow!(e.to_string()))?;
    let mut book = EpubBuilder::new(zip).map_err(|e| anyhow!(e.to_string()))?;

    book.epub_version(EpubVersion::V30);
    let stable_uuid = uuid::Uuid::new_v5(&EPUB_UUID_NAMESPACE, identifier.as_bytes());
    book.set_uuid(stable_uuid);

    book.metadata("title", title).ok();
    book.metadata("lang", "en").ok();
    book.metadata("toc_name", title).ok();
    book.metadata("author", BOOK_AUTHOR).ok();
    book.metadata("description", description).ok();
    book.metadata("generator", "csm-colored-downloader").ok();

    Ok(book)
}

/// 把排序后的页面与章节分组拼成加入顺序。
///
/// 页面严格按收集顺序进书（决定 spine），章节序号与页号
/// 来自分组结果，章节首页额外带目录标题。
fn plan_pages<'a>(entries: &'a [ImageEntry], chapters: &'a [ChapterGroup]) -> Vec<PagePlan<'a>> {
    let mut slots = HashMap::new();
    for (chapter_idx, chapter) in chapters.iter().enumerate() {
        for (page_idx, page) in chapter.pages.iter().enumerate() {
            slots.insert(
                page.rel_path.as_str(),
                (chapter.label.as_str(), chapter_idx + 1, page_idx + 1, page_idx == 0),
            );
        }
    }

    entries
        .iter()
        .filter_map(|entry| {
            slots
                .get(entry.rel_path.as_str())
                .map(|&(label, chapter_index, page_index, first_of_chapter)| PagePlan {
                    entry,
                    label,
                    chapter_index,
                    page_index,
                    first_of_chapter,
                })
        })
        .collect()
}

fn add_page(book: &mut EpubBuilder<ZipLibrary>, vol: &str, plan: &PagePlan) -> Result<()> {
    let ext = extension_of(&plan.entry.rel_path);
    let img_id = format!("img_v{vol}_{}_{}", plan.chapter_index, plan.page_index);
    let img_file = format!("images/v{vol}/{img_id}{ext}");

    let bytes = fs::read(&plan.entry.abs_path)
        .with_context(|| format!("读取图片失败: {}", plan.entry.abs_path.display()))?;
    book.add_resource(&img_file, Cursor::new(bytes), guess_mime(&plan.entry.rel_path))
        .map_err(|e| anyhow!(e.to_string()))?;

    let page_file = format!("text/v{vol}_{}_{}.xhtml", plan.chapter_index, plan.page_index);
    let html = page_html(plan.label, plan.page_index, &format!("../{img_file}"));

    let mut content = EpubContent::new(&page_file, Cursor::new(html)).reftype(ReferenceType::Text);
    if plan.first_of_chapter {
        // 只有章节首页带标题，目录因此停留在章节级别
        content = content.title(plan.label);
    }
    book.add_content(content).map_err(|e| anyhow!(e.to_string()))?;
    Ok(())
}

fn page_html(label: &str, page_index: usize, img_href: &str) -> String {
    let escaped = html_escape(label);
    format!(
        "<?xml version='1.0' encoding='utf-8'?>\n\
         <!DOCTYPE html>\n\
         <html xmlns=\"http://www.w3.org/1999/xhtml\" lang=\"en\" xml:lang=\"en\">\n\
         <head>\n\
         <title>{escaped} - {page_index}</title>\n\
         <style>\n\
         body {{ margin: 0; padding: 0; text-align: center; background: #000; }}\n\
         img {{ max-width: 100%; height: auto; }}\n\
         </style>\n\
         </head>\n\
         <body>\n\
         <img src=\"{img_href}\" alt=\"{escaped} page {page_index}\" />\n\
         </body>\n\
         </html>\n"
    )
}

fn html_escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

/// 按扩展名推断图片 MIME，.png 之外一律按 JPEG 处理。
fn guess_mime(path: &str) -> &'static str {
    if path.to_ascii_lowercase().ends_with(".png") {
        "image/png"
    } else {
        "image/jpeg"
    }
}

/// 原始扩展名（带点），如 ".jpg"；没有扩展名时为空。
fn extension_of(rel_path: &str) -> String {
    Path::new(rel_path)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| format!(".{ext}"))
        .unwrap_or_default()
}

/// 后处理生成的 EPUB：把 content.opf / toc.ncx 里的 `urn:uuid:...`
/// 替换为纯文本 identifier，并在 toc.ncx 头部补上 dtb:uid。
/// 逐条目重写 zip，各条目的压缩方式与顺序保持不变。
fn fixup_identifier(epub_bytes: Vec<u8>, identifier: &str) -> Result<Vec<u8>> {
    let stable_uuid = uuid::Uuid::new_v5(&EPUB_UUID_NAMESPACE, identifier.as_bytes());
    let urn = format!("urn:uuid:{stable_uuid}");
    let dtb_uid = format!("<meta name=\"dtb:uid\" content=\"{identifier}\" />");

    let mut archive = zip::ZipArchive::new(Cursor::new(epub_bytes))
        .map_err(|e| anyhow!("读取生成的 EPUB 失败: {e}"))?;

    let mut out = Cursor::new(Vec::new());
    {
        let mut writer = zip::ZipWriter::new(&mut out);
        for index in 0..archive.len() {
            let mut entry = archive
                .by_index(index)
                .map_err(|e| anyhow!("读取 zip 条目失败: {e}"))?;
            let name = entry.name().to_string();
            let options = FileOptions::default().compression_method(entry.compression());
            let mut data = Vec::new();
            entry
                .read_to_end(&mut data)
                .with_context(|| format!("读取 zip 条目失败: {name}"))?;
            drop(entry);

            writer
                .start_file(&name, options)
                .map_err(|e| anyhow!("写入 zip 条目失败: {e}"))?;
            if name.ends_with("content.opf") || name.ends_with("toc.ncx") {
                let text = String::from_utf8(data)
                    .with_context(|| format!("zip 条目不是 UTF-8 文本: {name}"))?;
                let mut fixed = text.replace(&urn, identifier);
                if name.ends_with("toc.ncx") && !fixed.contains("dtb:uid") {
                    fixed = fixed.replace(
                        "<meta name=\"dtb:depth\"",
                        &format!("{dtb_uid}\n    <meta name=\"dtb:depth\""),
                    );
                }
                writer.write_all(fixed.as_bytes())?;
            } else {
                writer.write_all(&data)?;
            }
        }
        writer.finish().map_err(|e| anyhow!("收尾 zip 失败: {e}"))?;
    }

    Ok(out.into_inner())
}
