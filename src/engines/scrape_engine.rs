// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::config::settings::Settings;
use crate::domain::models::proxy::{ProxyRecord, RotationStrategy};
use crate::domain::models::scrape_result::ScrapeResult;
use crate::domain::models::task::{RenderMode, RequestTask};
use crate::domain::services::extraction_service::ExtractionService;
use crate::engines::chromium_renderer::ChromiumRenderer;
use crate::engines::detector;
use crate::engines::headers::{browser_headers, UserAgentManager};
use crate::engines::reqwest_engine::ReqwestEngine;
use crate::engines::traits::{FetchRequest, Fetcher, Renderer, WaitCondition};
use crate::infrastructure::cache::response_cache::{cache_key, CachedResponse, ResponseCache};
use crate::infrastructure::proxy::proxy_manager::ProxyManager;
use crate::infrastructure::rate_limit::token_bucket::{BucketConfig, RateLimiter};
use crate::utils::errors::{ErrorKind, ProxyError};
use crate::utils::retry_policy::RetryPolicy;
use crate::utils::url_utils::host_key;
use chrono::Utc;
use metrics::counter;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

/// 任务超时上限，更大的值按此截断
const MAX_TASK_TIMEOUT: Duration = Duration::from_secs(365 * 24 * 3600);

/// 引擎运行参数
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub rotation_strategy: RotationStrategy,
    pub retry: RetryPolicy,
    /// 默认任务超时（含全部重试）
    pub fetch_timeout: Duration,
    pub cache_key_includes_selectors: bool,
    /// 可见文本少于该长度时视为 JavaScript 页面
    pub min_text_length: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self::from(&Settings::default())
    }
}

impl From<&Settings> for EngineConfig {
    fn from(settings: &Settings) -> Self {
        Self {
            rotation_strategy: settings.rotation_strategy,
            retry: RetryPolicy::from(&settings.retry),
            fetch_timeout: Duration::from_millis(settings.fetch_timeout_ms),
            cache_key_includes_selectors: settings.cache_key_includes_selectors,
            min_text_length: settings.renderer.min_text_length,
        }
    }
}

/// 成功取得的文档
struct Document {
    body: String,
    headers: HashMap<String, String>,
    status_code: u16,
    rendered: bool,
}

/// 一次尝试的失败
struct Failure {
    kind: ErrorKind,
    message: String,
    status_code: Option<u16>,
}

impl Failure {
    fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            status_code: None,
        }
    }
}

/// 抓取引擎
///
/// 每个任务依次经过：缓存 → 限流 → 选代理 → 抓取（必要时交给渲染器）
/// → 分类 → 退避重试 → 写缓存 → 字段提取，并且总是产生一个结果。
/// 引擎本身不持有可变状态，可被多个任务并发调用。
pub struct ScrapeEngine {
    fetcher: Arc<dyn Fetcher>,
    renderer: Option<Arc<dyn Renderer>>,
    proxies: Arc<ProxyManager>,
    rate_limiter: Arc<RateLimiter>,
    cache: Arc<ResponseCache>,
    user_agents: UserAgentManager,
    config: EngineConfig,
    cancel: CancellationToken,
}

impl ScrapeEngine {
    pub fn new(
        fetcher: Arc<dyn Fetcher>,
        proxies: Arc<ProxyManager>,
        rate_limiter: Arc<RateLimiter>,
        cache: Arc<ResponseCache>,
        config: EngineConfig,
    ) -> Self {
        Self {
            fetcher,
            renderer: None,
            proxies,
            rate_limiter,
            cache,
            user_agents: UserAgentManager::default(),
            config,
            cancel: CancellationToken::new(),
        }
    }

    /// 按配置组装全部组件
    ///
    /// # 返回值
    ///
    /// * `Err(ProxyError::InvalidUri)` - 配置中的代理地址无效
    pub fn from_settings(settings: &Settings) -> Result<Self, ProxyError> {
        let proxies = ProxyManager::from_uris(&settings.proxies, settings.proxy_health.clone())?;
        let cache = ResponseCache::new(
            settings.cache_max_entries,
            Duration::from_secs(settings.cache_ttl_seconds),
        );
        let rate_limiter = RateLimiter::new(BucketConfig::from(&settings.rate_limit_per_host));

        let mut engine = Self::new(
            Arc::new(ReqwestEngine::new()),
            Arc::new(proxies),
            Arc::new(rate_limiter),
            Arc::new(cache),
            EngineConfig::from(settings),
        )
        .with_user_agents(UserAgentManager::new(settings.user_agents.rotation));

        if settings.renderer.enabled {
            engine = engine.with_renderer(Arc::new(ChromiumRenderer::new(&settings.renderer)));
        }

        info!(
            proxies = settings.proxies.len(),
            strategy = ?settings.rotation_strategy,
            renderer = settings.renderer.enabled,
            "Scrape engine initialized"
        );
        Ok(engine)
    }

    pub fn with_renderer(mut self, renderer: Arc<dyn Renderer>) -> Self {
        self.renderer = Some(renderer);
        self
    }

    pub fn with_user_agents(mut self, user_agents: UserAgentManager) -> Self {
        self.user_agents = user_agents;
        self
    }

    /// 使用外部的作业级取消信号
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn proxies(&self) -> &Arc<ProxyManager> {
        &self.proxies
    }

    pub fn cache(&self) -> &Arc<ResponseCache> {
        &self.cache
    }

    pub fn rate_limiter(&self) -> &Arc<RateLimiter> {
        &self.rate_limiter
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// 取消作业：不再开始新任务，进行中的网络操作立即中止
    pub fn cancel(&self) {
        info!("Scrape job cancelled");
        self.cancel.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// 执行一个抓取任务
    ///
    /// 从不返回错误：所有失败都体现在 `ScrapeResult` 的 `error_kind` 中。
    #[instrument(skip_all, fields(task_id = %task.id, url = %task.url))]
    pub async fn fetch(&self, task: &RequestTask) -> ScrapeResult {
        let start = Instant::now();

        let mut result = if self.cancel.is_cancelled() {
            cancelled(task)
        } else {
            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => cancelled(task),
                result = self.run(task, start) => result,
            }
        };

        result.latency_ms = start.elapsed().as_millis() as u64;
        let outcome = match result.error_kind {
            None if result.from_cache => "cache_hit",
            None => "success",
            Some(kind) => kind.as_str(),
        };
        counter!("scrape_requests_total", "outcome" => outcome).increment(1);

        if result.success {
            debug!(
                attempts = result.attempts,
                from_cache = result.from_cache,
                matched = result.matched_fields(),
                "Task succeeded"
            );
        } else {
            warn!(
                attempts = result.attempts,
                error_kind = ?result.error_kind,
                error = result.error_message.as_deref().unwrap_or_default(),
                "Task failed"
            );
        }
        result
    }

    async fn run(&self, task: &RequestTask, start: Instant) -> ScrapeResult {
        let host = match host_key(&task.url) {
            Ok(host) => host,
            Err(e) => {
                return ScrapeResult::failed(
                    task.id,
                    &task.url,
                    ErrorKind::ParseError,
                    format!("Invalid url: {}", e),
                )
            }
        };

        let key = task
            .use_cache
            .then(|| cache_key(task, self.config.cache_key_includes_selectors));

        if let Some(key) = &key {
            if let Some(cached) = self.cache.get(key) {
                counter!("scrape_cache_hits_total").increment(1);
                let mut result = self.extract(task, &cached.body);
                result.from_cache = true;
                result.status_code = Some(cached.status_code);
                result.rendered = cached.rendered;
                return result;
            }
        }

        let timeout = task
            .timeout()
            .unwrap_or(self.config.fetch_timeout)
            .min(MAX_TASK_TIMEOUT);
        let deadline = start + timeout;
        let retry = RetryPolicy {
            max_attempts: task
                .max_attempts
                .unwrap_or(self.config.retry.max_attempts)
                .max(1),
            ..self.config.retry.clone()
        };

        let mut attempts = 0u32;
        let mut proxy_id = None;

        let failure = loop {
            let remaining = deadline.saturating_duration_since(Instant::now());

            // Each retry is a fresh pass through rate limiting and proxy selection
            if let Err(e) = self.rate_limiter.acquire(&host, remaining).await {
                break Failure::new(ErrorKind::RateLimited, e.to_string());
            }

            let outcome = if task.render == RenderMode::Always {
                attempts += 1;
                proxy_id = None;
                self.render(task, deadline).await
            } else {
                let proxy = match self.select_proxy() {
                    Ok(proxy) => proxy,
                    Err(e) => break Failure::new(ErrorKind::ProxyExhausted, e.to_string()),
                };
                attempts += 1;
                proxy_id = proxy.as_ref().map(|p| p.id.clone());
                self.attempt(task, proxy.as_ref(), attempts, deadline).await
            };

            let failure = match outcome {
                Ok(document) => {
                    if let Some(key) = key {
                        let ttl = task
                            .cache_ttl_seconds
                            .map(Duration::from_secs)
                            .unwrap_or_else(|| self.cache.default_ttl());
                        self.cache.set(
                            key,
                            CachedResponse {
                                body: document.body.clone(),
                                headers: document.headers.clone(),
                                status_code: document.status_code,
                                fetched_at: Utc::now(),
                                rendered: document.rendered,
                            },
                            ttl,
                        );
                    }

                    let mut result = self.extract(task, &document.body);
                    result.attempts = attempts;
                    result.proxy_id = proxy_id;
                    result.status_code = Some(document.status_code);
                    result.rendered = document.rendered;
                    return result;
                }
                Err(failure) => failure,
            };

            if !failure.kind.is_retryable() || !retry.should_retry(attempts) {
                break failure;
            }

            let backoff = retry.calculate_backoff(attempts);
            if Instant::now()
                .checked_add(backoff)
                .is_none_or(|resume| resume >= deadline)
            {
                debug!(attempts, "No time left for another attempt");
                break failure;
            }
            debug!(
                attempt = attempts,
                error_kind = %failure.kind,
                backoff_ms = backoff.as_millis() as u64,
                "Retrying after backoff"
            );
            tokio::time::sleep(backoff).await;
        };

        let mut result = ScrapeResult::failed(task.id, &task.url, failure.kind, failure.message);
        result.attempts = attempts;
        result.proxy_id = proxy_id;
        result.status_code = failure.status_code;
        result
    }

    /// 代理池为空时直连
    fn select_proxy(&self) -> Result<Option<ProxyRecord>, ProxyError> {
        if self.proxies.is_empty() {
            return Ok(None);
        }
        self.proxies.select(self.config.rotation_strategy).map(Some)
    }

    /// 一次静态抓取尝试，必要时交给渲染器
    #[instrument(skip_all, fields(attempt = attempt, proxy = proxy.map(|p| p.id.as_str()).unwrap_or("direct")))]
    async fn attempt(
        &self,
        task: &RequestTask,
        proxy: Option<&ProxyRecord>,
        attempt: u32,
        deadline: Instant,
    ) -> Result<Document, Failure> {
        let request = FetchRequest {
            url: task.url.clone(),
            method: task.method,
            headers: browser_headers(&task.url, self.user_agents.next_agent(), &task.headers),
            body: task.body.clone(),
            timeout: deadline.saturating_duration_since(Instant::now()),
            proxy: proxy.map(|p| p.endpoint.clone()),
        };

        let started = Instant::now();
        let outcome = match self.fetcher.fetch(&request).await {
            Ok(response) => {
                if let Some(kind) = detector::classify_status(response.status_code) {
                    Err(Failure {
                        kind,
                        message: format!("HTTP {}", response.status_code),
                        status_code: Some(response.status_code),
                    })
                } else if detector::is_challenge_page(&response.body) {
                    Err(Failure {
                        kind: ErrorKind::Blocked,
                        message: "Anti-bot challenge page".to_string(),
                        status_code: Some(response.status_code),
                    })
                } else if !detector::is_textual(&response.content_type) {
                    Err(Failure {
                        kind: ErrorKind::ParseError,
                        message: format!("Unsupported content type '{}'", response.content_type),
                        status_code: Some(response.status_code),
                    })
                } else {
                    Ok(response)
                }
            }
            Err(e) => Err(Failure::new(e.kind(), e.to_string())),
        };
        let latency = started.elapsed();

        if let Some(proxy) = proxy {
            // Only transport-level failures count against the proxy
            let proxy_ok = match &outcome {
                Ok(_) => true,
                Err(failure) => !failure.kind.is_retryable(),
            };
            if let Err(e) = self.proxies.record_outcome(&proxy.id, proxy_ok, latency) {
                warn!(proxy = %proxy.id, "Failed to record proxy outcome: {}", e);
            }
        }

        let response = outcome?;
        debug!(
            status_code = response.status_code,
            bytes = response.body.len(),
            latency_ms = latency.as_millis() as u64,
            "Static fetch succeeded"
        );

        if task.render == RenderMode::Auto
            && self.renderer.is_some()
            && detector::needs_javascript(&response.body, self.config.min_text_length)
        {
            info!("Page looks client-rendered, delegating to renderer");
            return self.render(task, deadline).await;
        }

        Ok(Document {
            body: response.body,
            headers: response.headers,
            status_code: response.status_code,
            rendered: false,
        })
    }

    async fn render(&self, task: &RequestTask, deadline: Instant) -> Result<Document, Failure> {
        let Some(renderer) = &self.renderer else {
            return Err(Failure::new(
                ErrorKind::RenderError,
                "No renderer configured",
            ));
        };

        let wait = match &task.wait_for {
            Some(selector) => WaitCondition::Selector(selector.clone()),
            None => WaitCondition::Load,
        };
        let timeout = deadline.saturating_duration_since(Instant::now());

        let body = renderer
            .render(&task.url, &wait, timeout)
            .await
            .map_err(|e| Failure::new(ErrorKind::RenderError, e.to_string()))?;

        debug!(renderer = renderer.name(), bytes = body.len(), "Rendered");
        Ok(Document {
            body,
            headers: HashMap::new(),
            status_code: 200,
            rendered: true,
        })
    }

    fn extract(&self, task: &RequestTask, body: &str) -> ScrapeResult {
        let fields = ExtractionService::extract(body, &task.selectors);
        let mut result = ScrapeResult::succeeded(task.id, &task.url, fields);
        result.bytes = body.len();
        result
    }
}

fn cancelled(task: &RequestTask) -> ScrapeResult {
    ScrapeResult::failed(task.id, &task.url, ErrorKind::Cancelled, "Job cancelled")
}

#[cfg(test)]
#[path = "scrape_engine_test.rs"]
mod tests;
