//! CLI 进度条管理。

use indicatif::{ProgressBar, ProgressStyle};

/// 下载总进度条，绘制到 stderr，日志仍走 stdout。
pub(crate) fn make_download_bar(total: u64) -> ProgressBar {
    let style = ProgressStyle::with_template(
        "{prefix} [{elapsed_precise}] {wide_bar} {pos}/{len} ({eta})",
    )
    .unwrap_or_else(|_| ProgressStyle::default_bar())
    .progress_chars("##-");

    let bar = ProgressBar::new(total);
    bar.set_style(style);
    bar.set_prefix("图片下载");
    bar
}
