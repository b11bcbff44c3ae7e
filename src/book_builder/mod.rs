//! 成书流程：图片收集排序与 PDF / EPUB 生成。
//!
//! 子模块：
//! - `collector` — 遍历输出树，按卷收集图片并排序/分组
//! - `pdf_generator` — 每卷一个多页 PDF
//! - `epub_generator` — 每卷一个章节目录的 EPUB

pub mod collector;
pub mod epub_generator;
pub mod pdf_generator;

/// 单卷成品的生成结果。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderOutcome {
    /// 输出文件已存在，跳过
    AlreadyExists,
    /// 该卷没有可用图片
    NoImages,
    /// 成功生成（页数）
    Rendered(usize),
}
