// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::domain::models::scrape_result::ScrapeResult;
use crate::domain::models::task::RequestTask;
use crate::engines::scrape_engine::ScrapeEngine;
use crate::utils::errors::ErrorKind;
use crate::utils::url_utils::host_key;
use crate::workers::host_semaphore::HostSemaphore;
use futures::stream::{self, StreamExt};
use std::sync::Arc;
use tracing::{error, info};

/// 批量抓取工作池
///
/// 全局最多 `max_concurrency` 个任务同时执行，同一主机最多
/// `per_host_concurrency` 个。结果顺序与提交顺序一致，
/// 单个任务失败不会影响其它任务。
pub struct ScrapePool {
    engine: Arc<ScrapeEngine>,
    hosts: HostSemaphore,
    max_concurrency: usize,
}

impl ScrapePool {
    pub fn new(engine: Arc<ScrapeEngine>, max_concurrency: usize, per_host_concurrency: usize) -> Self {
        Self {
            engine,
            hosts: HostSemaphore::new(per_host_concurrency),
            max_concurrency: max_concurrency.max(1),
        }
    }

    pub fn engine(&self) -> &Arc<ScrapeEngine> {
        &self.engine
    }

    /// 执行一批任务
    ///
    /// # 返回值
    ///
    /// 与 `tasks` 一一对应的结果；作业取消后尚未开始的任务返回 `Cancelled`
    pub async fn run_batch(&self, tasks: Vec<RequestTask>) -> Vec<ScrapeResult> {
        let total = tasks.len();
        info!(total, max_concurrency = self.max_concurrency, "Starting scrape batch");

        let results: Vec<ScrapeResult> = stream::iter(tasks)
            .map(|task| self.spawn(task))
            .buffered(self.max_concurrency)
            .collect()
            .await;

        let succeeded = results.iter().filter(|r| r.success).count();
        info!(total, succeeded, failed = total - succeeded, "Scrape batch finished");
        results
    }

    /// 执行单个任务，同样受每主机并发限制
    pub async fn run(&self, task: RequestTask) -> ScrapeResult {
        self.spawn(task).await
    }

    async fn spawn(&self, task: RequestTask) -> ScrapeResult {
        let task_id = task.id;
        let url = task.url.clone();
        let engine = self.engine.clone();
        let hosts = self.hosts.clone();

        let handle = tokio::spawn(async move { run_one(engine, hosts, task).await });
        match handle.await {
            Ok(result) => result,
            Err(e) => {
                error!(task_id = %task_id, "Scrape task aborted: {}", e);
                ScrapeResult::failed(
                    task_id,
                    &url,
                    ErrorKind::ParseError,
                    format!("Task aborted: {}", e),
                )
            }
        }
    }
}

async fn run_one(engine: Arc<ScrapeEngine>, hosts: HostSemaphore, task: RequestTask) -> ScrapeResult {
    let cancel = engine.cancellation_token();
    if cancel.is_cancelled() {
        return ScrapeResult::failed(task.id, &task.url, ErrorKind::Cancelled, "Job cancelled");
    }

    // Malformed urls go straight to the engine, which reports them
    let Ok(host) = host_key(&task.url) else {
        return engine.fetch(&task).await;
    };

    let permit = tokio::select! {
        biased;
        _ = cancel.cancelled() => None,
        permit = hosts.acquire(&host) => permit.ok(),
    };
    let Some(_permit) = permit else {
        return ScrapeResult::failed(task.id, &task.url, ErrorKind::Cancelled, "Job cancelled");
    };

    engine.fetch(&task).await
}

#[cfg(test)]
#[path = "scrape_pool_test.rs"]
mod tests;
