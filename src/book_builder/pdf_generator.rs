//! PDF 生成器。
//!
//! 逐页解码图片并统一重编码为 RGB JPEG，组装为单个多页 PDF。
//! 页面尺寸等于图片像素尺寸（1 像素 = 1 pt，即 72 dpi）。

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use image::codecs::jpeg::JpegEncoder;
use lopdf::content::{Content, Operation};
use lopdf::{Document, Object, Stream, dictionary};
use tracing::{info, warn};

use super::RenderOutcome;
use super::collector::{ImageEntry, collect_images_for_volume};
use crate::base_system::book_paths;
use crate::base_system::context::Config;

/// 一个 PDF 页面的素材：JPEG 字节与像素尺寸。
struct PageImage {
    jpeg: Vec<u8>,
    width: u32,
    height: u32,
}

/// 生成单卷 PDF。
///
/// 没有图片的卷直接跳过；单张解码失败只丢弃该页；
/// 全部解码失败时不产出文件。
pub fn build_pdf_for_volume(config: &Config, vol: &str, force: bool) -> Result<RenderOutcome> {
    let entries = collect_images_for_volume(config, vol)?;
    if entries.is_empty() {
        info!("卷 {vol} 没有图片，跳过 PDF");
        return Ok(RenderOutcome::NoImages);
    }

    let pdf_path = book_paths::volume_pdf_path(config, vol);
    if pdf_path.exists() && !force {
        info!("PDF 已存在，跳过卷 {vol}");
        return Ok(RenderOutcome::AlreadyExists);
    }

    info!("开始生成 PDF v{vol}（共 {} 张图片）...", entries.len());
    let pages = encode_pages(config, &entries);
    if pages.is_empty() {
        warn!("卷 {vol} 没有可用图片，未生成 PDF");
        return Ok(RenderOutcome::NoImages);
    }

    let page_count = pages.len();
    let mut document = assemble_document(pages)?;

    if let Some(parent) = pdf_path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("创建目录失败: {}", parent.display()))?;
    }
    document
        .save(&pdf_path)
        .with_context(|| format!("写入 PDF 失败: {}", pdf_path.display()))?;

    info!("已保存 {}（{page_count} 页）", pdf_path.display());
    Ok(RenderOutcome::Rendered(page_count))
}

/// 逐张解码并统一转为 RGB JPEG，失败的单张仅告警跳过。
fn encode_pages(config: &Config, entries: &[ImageEntry]) -> Vec<PageImage> {
    let mut pages = Vec::with_capacity(entries.len());
    for entry in entries {
        match encode_one(config, entry) {
            Ok(page) => pages.push(page),
            Err(err) => warn!("图片读取失败 {}: {err:#}", entry.abs_path.display()),
        }
    }
    pages
}

fn encode_one(config: &Config, entry: &ImageEntry) -> Result<PageImage> {
    let decoded = image::open(&entry.abs_path).context("解码失败")?;
    let rgb = decoded.to_rgb8();
    let (width, height) = (rgb.width(), rgb.height());

    let mut jpeg = Vec::new();
    let quality = config.pdf_jpeg_quality.clamp(1, 100);
    JpegEncoder::new_with_quality(&mut jpeg, quality)
        .encode(&rgb, width, height, image::ExtendedColorType::Rgb8)
        .context("JPEG 编码失败")?;

    Ok(PageImage { jpeg, width, height })
}

/// 把页面素材装订为 PDF 文档。
///
/// 每页一个 DCTDecode 图片 XObject，内容流只做单位矩形到整页的
/// 缩放再绘制，MediaBox 直接取像素尺寸。
fn assemble_document(pages: Vec<PageImage>) -> Result<Document> {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();

    let mut kids: Vec<Object> = Vec::with_capacity(pages.len());
    for page in pages {
        let width = page.width as i64;
        let height = page.height as i64;

        let image_id = doc.add_object(Stream::new(
            dictionary! {
                "Type" => "XObject",
                "Subtype" => "Image",
                "Width" => width,
                "Height" => height,
                "ColorSpace" => "DeviceRGB",
                "BitsPerComponent" => 8,
                "Filter" => "DCTDecode",
            },
            page.jpeg,
        ));

        let content = Content {
            operations: vec![
                Operation::new("q", vec![]),
                Operation::new(
                    "cm",
                    vec![
                        width.into(),
                        0.into(),
                        0.into(),
                        height.into(),
                        0.into(),
                        0.into(),
                    ],
                ),
                Operation::new("Do", vec!["Im0".into()]),
                Operation::new("Q", vec![]),
            ],
        };
        let content_id = doc.add_object(Stream::new(
            dictionary! {},
            content.encode().context("编码页面内容流失败")?,
        ));

        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "MediaBox" => vec![0.into(), 0.into(), width.into(), height.into()],
            "Contents" => content_id,
            "Resources" => dictionary! {
                "XObject" => dictionary! { "Im0" => image_id },
            },
        });
        kids.push(page_id.into());
    }

    let count = kids.len() as i64;
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => count,
        }),
    );

    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);
    // 只压缩尚无 Filter 的流，图片保持 DCTDecode 原样
    doc.compress();

    Ok(doc)
}
