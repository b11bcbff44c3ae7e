//! 输出树内各类文件的落盘路径。

use std::path::PathBuf;

use crate::base_system::context::Config;

/// 成品文件名中使用的系列名。
pub const SERIES_SLUG: &str = "Chainsaw_Man_Digitally_Colored";

/// 下载图片的本地路径：输出根目录 + 归档内相对路径。
pub fn image_target_path(config: &Config, inner_path: &str) -> PathBuf {
    config.output_root_path().join(inner_path)
}

pub fn volume_pdf_path(config: &Config, vol: &str) -> PathBuf {
    config
        .output_root_path()
        .join("pdfs")
        .join(format!("{SERIES_SLUG}_v{vol}.pdf"))
}

pub fn volume_epub_path(config: &Config, vol: &str) -> PathBuf {
    config
        .output_root_path()
        .join("epubs")
        .join(format!("{SERIES_SLUG}_v{vol}.epub"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> Config {
        Config {
            output_root: "out".to_string(),
            ..Config::default()
        }
    }

    #[test]
    fn pdf_path_uses_series_slug_and_volume() {
        let path = volume_pdf_path(&test_config(), "05");
        assert_eq!(
            path,
            PathBuf::from("out/pdfs/Chainsaw_Man_Digitally_Colored_v05.pdf")
        );
    }

    #[test]
    fn epub_path_uses_series_slug_and_volume() {
        let path = volume_epub_path(&test_config(), "11");
        assert_eq!(
            path,
            PathBuf::from("out/epubs/Chainsaw_Man_Digitally_Colored_v11.epub")
        );
    }

    #[test]
    fn image_target_preserves_inner_path() {
        let path = image_target_path(
            &test_config(),
            "Chainsaw Man (Digitally Colored)/Chapter 2 - Foo/03.jpg",
        );
        assert_eq!(
            path,
            PathBuf::from("out/Chainsaw Man (Digitally Colored)/Chapter 2 - Foo/03.jpg")
        );
    }
}
