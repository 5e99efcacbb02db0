// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::config::settings::Settings;
use crate::domain::models::prospect::ProspectRecord;
use crate::domain::models::proxy::ProxyPoolStats;
use crate::domain::models::scrape_result::ScrapeResult;
use crate::domain::models::task::RequestTask;
use crate::domain::models::validation::ValidationReport;
use crate::domain::services::validation_service::ValidationService;
use crate::engines::scrape_engine::ScrapeEngine;
use crate::infrastructure::cache::response_cache::CacheStats;
use crate::utils::errors::InitError;
use crate::workers::scrape_pool::ScrapePool;
use std::sync::Arc;

/// 抓取门面
///
/// 调用方只需要这一个入口：单个或批量抓取、数据集校验、取消作业和查看运行状态。
pub struct Scraper {
    pool: ScrapePool,
    validator: Arc<ValidationService>,
}

impl Scraper {
    pub fn new(pool: ScrapePool, validator: Arc<ValidationService>) -> Self {
        Self { pool, validator }
    }

    /// 按配置组装
    ///
    /// # 返回值
    ///
    /// * `Err(InitError::Proxy)` - 代理地址无效
    /// * `Err(InitError::Validator)` - 拒绝规则的正则无效
    pub fn from_settings(settings: &Settings) -> Result<Self, InitError> {
        let engine = ScrapeEngine::from_settings(settings)?;
        let validator = ValidationService::new(&settings.validator)?;
        let pool = ScrapePool::new(
            Arc::new(engine),
            settings.max_concurrency,
            settings.per_host_concurrency,
        );
        Ok(Self::new(pool, Arc::new(validator)))
    }

    pub async fn scrape(&self, task: RequestTask) -> ScrapeResult {
        self.pool.run(task).await
    }

    /// 批量抓取，结果顺序与提交顺序一致
    pub async fn scrape_batch(&self, tasks: Vec<RequestTask>) -> Vec<ScrapeResult> {
        self.pool.run_batch(tasks).await
    }

    pub fn validate_dataset(&self, records: &[ProspectRecord]) -> ValidationReport {
        self.validator.validate_dataset(records)
    }

    pub fn validator(&self) -> &Arc<ValidationService> {
        &self.validator
    }

    pub fn engine(&self) -> &Arc<ScrapeEngine> {
        self.pool.engine()
    }

    /// 取消当前作业；之后提交的任务直接返回 `Cancelled`
    pub fn cancel(&self) {
        self.pool.engine().cancel();
    }

    pub fn proxy_stats(&self) -> ProxyPoolStats {
        self.pool.engine().proxies().stats()
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.pool.engine().cache().stats()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::errors::ProxyError;

    #[test]
    fn test_from_settings_registers_proxies() {
        let settings = Settings {
            proxies: vec![
                "http://10.0.0.1:8080".to_string(),
                "socks5://user:pw@10.0.0.2:1080".to_string(),
            ],
            ..Settings::default()
        };

        let scraper = Scraper::from_settings(&settings).unwrap();

        let stats = scraper.proxy_stats();
        assert_eq!(stats.total, 2);
        assert_eq!(stats.active, 2);
        assert_eq!(scraper.cache_stats().capacity, settings.cache_max_entries);
    }

    #[test]
    fn test_invalid_proxy_fails_construction() {
        let settings = Settings {
            proxies: vec!["ftp://10.0.0.1:21".to_string()],
            ..Settings::default()
        };

        let err = Scraper::from_settings(&settings).err().unwrap();
        assert!(matches!(err, InitError::Proxy(ProxyError::InvalidUri(_))));
    }

    #[test]
    fn test_invalid_reject_pattern_fails_construction() {
        let mut settings = Settings::default();
        settings.validator.reject_patterns[0].pattern = "(unclosed".to_string();

        let err = Scraper::from_settings(&settings).err().unwrap();
        assert!(matches!(err, InitError::Validator(_)));
    }

    #[tokio::test]
    async fn test_cancelled_scraper_returns_cancelled_results() {
        let scraper = Scraper::from_settings(&Settings::default()).unwrap();
        scraper.cancel();

        let results = scraper
            .scrape_batch(vec![
                RequestTask::new("https://example.org/a"),
                RequestTask::new("https://example.org/b"),
            ])
            .await;

        assert_eq!(results.len(), 2);
        assert!(results
            .iter()
            .all(|r| r.error_kind == Some(crate::utils::errors::ErrorKind::Cancelled)));
    }
}
