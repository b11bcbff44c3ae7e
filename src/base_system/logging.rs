//! 日志系统：控制台 + 文件双路输出，退出时归档。
//!
//! 控制台层走 stdout（进度条在 stderr，互不干扰），文件层始终
//! DEBUG 级写入 `logs/latest.log`。写满 10MB 或进程退出时压缩为
//! 带时间戳的 zip。Ctrl-C 与 panic 都会先冲刷日志再退出。

use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::{panic, thread, time::Duration};

use time::OffsetDateTime;
use time::macros::format_description;
use tracing::{error, info};
use tracing_appender::non_blocking::{self, WorkerGuard};
use tracing_appender::rolling;
use tracing_subscriber::Layer;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::fmt;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use zip::CompressionMethod;
use zip::write::FileOptions;

/// latest.log 超过该大小时先归档再继续写
const MAX_LOG_BYTES: u64 = 10 * 1024 * 1024;
/// 归档前等待非阻塞写线程落盘（Windows 上还需等句柄释放）
const FLUSH_WAIT_MS: u64 = 1000;

#[derive(Debug, thiserror::Error)]
pub enum LogError {
    #[error("logging already initialized")]
    AlreadyInitialized,
    #[error("subscriber init failed: {0}")]
    SubscriberInit(#[from] tracing_subscriber::util::TryInitError),
    #[error("io error: {0}")]
    Io(#[from] io::Error),
    #[error("zip error: {0}")]
    Zip(#[from] zip::result::ZipError),
    #[error("time formatting failed: {0}")]
    Time(#[from] time::error::Format),
}

/// 日志系统句柄，存活期间保持文件写入；Drop 即冲刷并归档。
pub struct LogSystem {
    state: Arc<ExitState>,
}

impl LogSystem {
    /// 初始化全局日志。`debug` 只影响控制台层，文件层恒为 DEBUG。
    pub fn init(debug: bool) -> Result<Self, LogError> {
        let logs_dir = PathBuf::from("logs");
        fs::create_dir_all(&logs_dir)?;
        let latest_log = logs_dir.join("latest.log");

        // 上次运行遗留的大文件先归档，避免 latest.log 无限增长
        if fs::metadata(&latest_log).is_ok_and(|meta| meta.len() >= MAX_LOG_BYTES) {
            archive_log_file(&latest_log, &logs_dir)?;
        }

        let file_appender = rolling::never(&logs_dir, "latest.log");
        let (file_writer, guard) = non_blocking::NonBlockingBuilder::default()
            .lossy(false)
            .finish(file_appender);

        let console_level = if debug {
            LevelFilter::DEBUG
        } else {
            LevelFilter::INFO
        };
        let console_layer = fmt::layer()
            .with_target(false)
            .with_level(true)
            .with_thread_names(true)
            .with_writer(io::stdout)
            .with_filter(console_level);
        let file_layer = fmt::layer()
            .with_target(false)
            .with_level(true)
            .with_thread_names(true)
            .with_ansi(false)
            .with_writer(file_writer)
            .with_filter(LevelFilter::DEBUG);

        tracing_subscriber::registry()
            .with(console_layer)
            .with(file_layer)
            .try_init()
            .map_err(|e| {
                if e.to_string().contains("already") {
                    LogError::AlreadyInitialized
                } else {
                    LogError::SubscriberInit(e)
                }
            })?;

        let state = Arc::new(ExitState {
            logs_dir,
            latest_log,
            guard: Mutex::new(Some(guard)),
            flushed: AtomicBool::new(false),
        });
        install_exit_hooks(&state);

        Ok(Self { state })
    }
}

impl Drop for LogSystem {
    fn drop(&mut self) {
        self.state.flush_and_archive();
    }
}

/// 退出路径共享的状态。flush_and_archive 幂等，
/// Drop / Ctrl-C / panic 三条路径谁先到谁执行。
struct ExitState {
    logs_dir: PathBuf,
    latest_log: PathBuf,
    guard: Mutex<Option<WorkerGuard>>,
    flushed: AtomicBool,
}

impl ExitState {
    fn flush_and_archive(&self) {
        if self.flushed.swap(true, Ordering::SeqCst) {
            return;
        }

        // 丢弃 guard 让非阻塞写线程冲刷队列并退出
        if let Ok(mut guard) = self.guard.lock() {
            guard.take();
        }
        thread::sleep(Duration::from_millis(FLUSH_WAIT_MS));

        if let Err(err) = archive_log_file(&self.latest_log, &self.logs_dir) {
            eprintln!("日志归档失败: {err}");
        }
    }
}

fn install_exit_hooks(state: &Arc<ExitState>) {
    let on_signal = Arc::clone(state);
    let _ = ctrlc::set_handler(move || {
        on_signal.flush_and_archive();
        std::process::exit(0);
    });

    let on_panic = Arc::clone(state);
    let previous = panic::take_hook();
    panic::set_hook(Box::new(move |info| {
        if let Some(location) = info.location() {
            error!("panic at {}:{}: {}", location.file(), location.line(), info);
        } else {
            error!("panic: {info}");
        }
        on_panic.flush_and_archive();
        previous(info);
    }));
}

/// 把 latest.log 压缩为 `logs/log_<时间戳>.zip` 后删除原文件。
/// 文件缺失或为空都不算错误。
fn archive_log_file(latest_log: &Path, logs_dir: &Path) -> Result<Option<PathBuf>, LogError> {
    let bytes = match fs::read(latest_log) {
        Ok(bytes) => bytes,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(err) => return Err(err.into()),
    };
    if bytes.is_empty() {
        let _ = fs::remove_file(latest_log);
        return Ok(None);
    }

    let timestamp = OffsetDateTime::now_utc().format(format_description!(
        "[year][month][day]_[hour][minute][second]"
    ))?;
    let archive_path = logs_dir.join(format!("log_{timestamp}.zip"));

    let mut zip = zip::ZipWriter::new(File::create(&archive_path)?);
    let options = FileOptions::default().compression_method(CompressionMethod::Deflated);
    zip.start_file(format!("{timestamp}.log"), options)?;
    zip.write_all(&bytes)?;
    zip.finish()?;

    let _ = fs::remove_file(latest_log);
    info!("日志已归档: {}", archive_path.display());
    Ok(Some(archive_path))
}
