//! 基础设施：配置、日志与路径。

pub mod book_paths;
pub mod config;
pub mod context;
pub mod logging;
