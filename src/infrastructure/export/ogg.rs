//! Compression Service - 压缩导出的调用侧
//!
//! 单个长驻 [`EncodeWorker`](crate::infrastructure::worker::EncodeWorker)
//! 上复用多个并发导出请求，仅凭关联 ID 配对响应。
//! worker 或路由任一侧退出时，所有未决请求立即以
//! `CompressionUnavailable` 拒绝，绝不悬挂。

use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::{mpsc, oneshot};
use uuid::Uuid;

use crate::application::ports::{CompressedExporterPort, ExportError};
use crate::infrastructure::worker::{EncodeRequest, EncodeResponse, EncodeWorker};

type PendingMap = Arc<DashMap<Uuid, oneshot::Sender<Result<Vec<u8>, ExportError>>>>;

/// 压缩导出服务（worker 的客户端句柄）
pub struct CompressionService {
    /// 关闭后置 None，后续请求直接拒绝
    request_tx: Mutex<Option<mpsc::Sender<EncodeRequest>>>,
    pending: PendingMap,
}

impl CompressionService {
    /// 启动 worker 与响应路由，返回客户端句柄
    pub fn spawn() -> Self {
        let (request_tx, request_rx) = mpsc::channel::<EncodeRequest>(16);
        let (response_tx, response_rx) = mpsc::channel::<EncodeResponse>(16);
        let pending: PendingMap = Arc::new(DashMap::new());

        tokio::spawn(EncodeWorker::new(request_rx, response_tx).run());
        tokio::spawn(route_responses(response_rx, pending.clone()));

        Self {
            request_tx: Mutex::new(Some(request_tx)),
            pending,
        }
    }

    /// 显式关停：关闭请求通道，worker 排空后退出，
    /// 路由随之拒绝所有未决请求
    pub fn shutdown(&self) {
        self.request_tx.lock().unwrap().take();
    }

    fn sender(&self) -> Option<mpsc::Sender<EncodeRequest>> {
        self.request_tx.lock().unwrap().clone()
    }
}

#[async_trait]
impl CompressedExporterPort for CompressionService {
    async fn export(
        &self,
        samples: Vec<i16>,
        sample_rate: u32,
        channels: u8,
        bitrate: u32,
    ) -> Result<Vec<u8>, ExportError> {
        let sender = self.sender().ok_or(ExportError::CompressionUnavailable)?;

        let id = Uuid::new_v4();
        let (tx, rx) = oneshot::channel();
        self.pending.insert(id, tx);

        let request = EncodeRequest {
            id,
            samples,
            sample_rate,
            channels,
            bitrate,
        };
        if sender.send(request).await.is_err() {
            self.pending.remove(&id);
            return Err(ExportError::CompressionUnavailable);
        }

        // 路由退出时会先拒绝所有未决项；这里的 RecvError 只剩
        // 插入与路由退出间的窄竞态，同样视为服务不可用
        match rx.await {
            Ok(result) => result,
            Err(_) => Err(ExportError::CompressionUnavailable),
        }
    }
}

/// 响应路由：按关联 ID 完成未决请求
///
/// 响应通道关闭（worker 退出）后，拒绝所有仍在等待的请求。
async fn route_responses(mut response_rx: mpsc::Receiver<EncodeResponse>, pending: PendingMap) {
    while let Some(response) = response_rx.recv().await {
        match pending.remove(&response.id) {
            Some((_, tx)) => {
                let result = response.result.map_err(ExportError::Encoding);
                let _ = tx.send(result);
            }
            None => {
                tracing::warn!(id = %response.id, "response for unknown correlation id");
            }
        }
    }

    let stranded: Vec<Uuid> = pending.iter().map(|entry| *entry.key()).collect();
    if !stranded.is_empty() {
        tracing::warn!(
            count = stranded.len(),
            "encode worker exited, rejecting outstanding export requests"
        );
    }
    for id in stranded {
        if let Some((_, tx)) = pending.remove(&id) {
            let _ = tx.send(Err(ExportError::CompressionUnavailable));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tone_samples(len: usize) -> Vec<i16> {
        (0..len)
            .map(|i| ((i as f32 * 0.1).sin() * 10000.0) as i16)
            .collect()
    }

    #[tokio::test]
    async fn test_export_returns_ogg_blob() {
        let service = CompressionService::spawn();
        let data = service
            .export(tone_samples(24000), 24000, 1, 32000)
            .await
            .unwrap();
        assert_eq!(&data[0..4], b"OggS");
    }

    #[tokio::test]
    async fn test_concurrent_exports_multiplex_by_id() {
        let service = Arc::new(CompressionService::spawn());

        let short = {
            let service = service.clone();
            tokio::spawn(async move { service.export(tone_samples(2400), 24000, 1, 32000).await })
        };
        let long = {
            let service = service.clone();
            tokio::spawn(async move { service.export(tone_samples(48000), 24000, 1, 32000).await })
        };

        let short = short.await.unwrap().unwrap();
        let long = long.await.unwrap().unwrap();
        // 两个响应都正确配对：更长的输入产出更长的流
        assert!(long.len() > short.len());
    }

    #[tokio::test]
    async fn test_export_after_shutdown_fails_closed() {
        let service = CompressionService::spawn();
        service.shutdown();

        let err = service
            .export(tone_samples(2400), 24000, 1, 32000)
            .await
            .unwrap_err();
        assert!(matches!(err, ExportError::CompressionUnavailable));
    }

    #[tokio::test]
    async fn test_encoding_failure_maps_to_domain_error() {
        let service = CompressionService::spawn();
        // 44.1kHz 不在 Opus 支持档位内
        let err = service
            .export(tone_samples(100), 44100, 1, 32000)
            .await
            .unwrap_err();
        assert!(matches!(err, ExportError::Encoding(_)));
    }
}
