// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::{AcquireError, OwnedSemaphorePermit, Semaphore};

/// 每主机并发信号量管理器
///
/// 为每个目标主机提供一个独立的并发信号量，与限流器相互独立：
/// 限流器控制请求间隔，这里控制同时在途的请求数。
#[derive(Clone, Debug)]
pub struct HostSemaphore {
    /// 存储每个主机的信号量
    semaphores: Arc<DashMap<String, Arc<Semaphore>>>,
    /// 每个主机的并发许可数
    permits_per_host: usize,
}

impl HostSemaphore {
    /// 创建一个新的HostSemaphore实例
    ///
    /// # 参数
    ///
    /// * `permits_per_host` - 每个主机的并发许可数，至少为 1
    pub fn new(permits_per_host: usize) -> Self {
        Self {
            semaphores: Arc::new(DashMap::new()),
            permits_per_host: permits_per_host.max(1),
        }
    }

    /// 获取指定主机的信号量许可
    ///
    /// 如果该主机的信号量不存在，则会创建一个新的。许可在被丢弃时归还。
    pub async fn acquire(&self, host: &str) -> Result<OwnedSemaphorePermit, AcquireError> {
        self.get_or_create(host).acquire_owned().await
    }

    /// 主机当前剩余的许可数
    pub fn available(&self, host: &str) -> usize {
        self.semaphores
            .get(host)
            .map_or(self.permits_per_host, |s| s.available_permits())
    }

    fn get_or_create(&self, host: &str) -> Arc<Semaphore> {
        if let Some(semaphore) = self.semaphores.get(host) {
            return semaphore.clone();
        }
        self.semaphores
            .entry(host.to_string())
            .or_insert_with(|| Arc::new(Semaphore::new(self.permits_per_host)))
            .clone()
    }
}
