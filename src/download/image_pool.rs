//! 图片并发下载工作池。
//!
//! 固定数量的工作线程从任务通道取图，完成后把结果经事件通道
//! 送回主线程。统计由主线程单点完成，线程间不共享可变计数。

use std::thread;
use std::time::Duration;

use crossbeam_channel as channel;
use reqwest::blocking::Client;

use super::downloader::download_one;
use super::models::{DownloadOutcome, LinkRecord};
use crate::base_system::context::Config;

pub(crate) struct ImagePool {
    tx: Option<channel::Sender<LinkRecord>>,
    rx_events: channel::Receiver<DownloadOutcome>,
    handles: Vec<thread::JoinHandle<()>>,
}

impl ImagePool {
    pub(crate) fn new(config: &Config, client: &Client) -> Self {
        let workers = config.max_workers.max(1);
        let (tx, rx) = channel::unbounded::<LinkRecord>();
        let (tx_events, rx_events) = channel::unbounded::<DownloadOutcome>();

        let mut handles = Vec::with_capacity(workers);
        for _ in 0..workers {
            let rx = rx.clone();
            let tx_events = tx_events.clone();
            let client = client.clone();
            let config = config.clone();

            handles.push(thread::spawn(move || {
                loop {
                    let record = match rx.recv_timeout(Duration::from_millis(200)) {
                        Ok(record) => record,
                        Err(channel::RecvTimeoutError::Timeout) => continue,
                        Err(channel::RecvTimeoutError::Disconnected) => return,
                    };
                    let status = download_one(&config, &client, &record);
                    let _ = tx_events.send(DownloadOutcome { record, status });
                }
            }));
        }

        Self {
            tx: Some(tx),
            rx_events,
            handles,
        }
    }

    pub(crate) fn submit(&self, record: LinkRecord) {
        if let Some(tx) = &self.tx {
            let _ = tx.send(record);
        }
    }

    /// 阻塞等待下一个完成事件；全部工作线程退出后返回 `None`。
    pub(crate) fn recv_outcome(&self) -> Option<DownloadOutcome> {
        self.rx_events.recv().ok()
    }

    /// 关闭任务通道并等待全部线程退出。
    pub(crate) fn shutdown(&mut self) {
        self.tx.take();
        for handle in self.handles.drain(..) {
            let _ = handle.join();
        }
    }
}
