// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use async_trait::async_trait;
use scrapemaster::application::scraper::Scraper;
use scrapemaster::config::settings::{RateLimitSettings, RetrySettings, Settings};
use scrapemaster::domain::services::validation_service::ValidationService;
use scrapemaster::engines::reqwest_engine::ReqwestEngine;
use scrapemaster::engines::scrape_engine::{EngineConfig, ScrapeEngine};
use scrapemaster::engines::traits::{EngineError, Renderer, WaitCondition};
use scrapemaster::infrastructure::cache::response_cache::ResponseCache;
use scrapemaster::infrastructure::proxy::proxy_manager::ProxyManager;
use scrapemaster::infrastructure::rate_limit::token_bucket::{BucketConfig, RateLimiter};
use scrapemaster::workers::scrape_pool::ScrapePool;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// 重试快、限流宽松的测试配置
pub fn test_settings() -> Settings {
    Settings {
        rate_limit_per_host: RateLimitSettings {
            capacity: 100.0,
            refill_rate: 100.0,
            burst: None,
        },
        retry: RetrySettings {
            max_attempts: 3,
            backoff_base_ms: 10,
            backoff_jitter_ms: 5,
            backoff_max_ms: 50,
        },
        fetch_timeout_ms: 5_000,
        ..Settings::default()
    }
}

/// 服务端渲染的文章页面
pub fn article(title: &str, company: &str) -> String {
    format!(
        r#"<html><head><title>{title}</title></head><body>
<h1 class="title">{title}</h1>
<div class="company" data-website="https://{company_slug}.com">{company}</div>
<ul class="tags"><li>alpha</li><li>beta</li></ul>
<p>{filler}</p>
</body></html>"#,
        title = title,
        company = company,
        company_slug = company.to_lowercase().replace(' ', ""),
        filler = "Server rendered paragraph with enough visible text to count as content. ".repeat(3),
    )
}

/// 客户端渲染框架的空壳页面
pub fn spa_shell() -> String {
    r#"<html><head><title>App</title></head><body><div id="root"></div><script src="/static/app.js"></script></body></html>"#
        .to_string()
}

/// 返回固定 HTML 的渲染器
pub struct StaticRenderer {
    html: String,
    pub calls: AtomicUsize,
}

impl StaticRenderer {
    pub fn new(html: String) -> Arc<Self> {
        Arc::new(Self {
            html,
            calls: AtomicUsize::new(0),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Renderer for StaticRenderer {
    async fn render(
        &self,
        _url: &str,
        _wait: &WaitCondition,
        _timeout: Duration,
    ) -> Result<String, EngineError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.html.clone())
    }

    fn name(&self) -> &'static str {
        "static"
    }
}

/// 使用真实 reqwest 引擎和指定渲染器组装抓取门面
pub fn scraper_with_renderer(settings: &Settings, renderer: Arc<dyn Renderer>) -> Scraper {
    let proxies = ProxyManager::from_uris(&settings.proxies, settings.proxy_health.clone())
        .expect("valid proxies");
    let engine = ScrapeEngine::new(
        Arc::new(ReqwestEngine::new()),
        Arc::new(proxies),
        Arc::new(RateLimiter::new(BucketConfig::from(&settings.rate_limit_per_host))),
        Arc::new(ResponseCache::new(
            settings.cache_max_entries,
            Duration::from_secs(settings.cache_ttl_seconds),
        )),
        EngineConfig::from(settings),
    )
    .with_renderer(renderer);

    let pool = ScrapePool::new(
        Arc::new(engine),
        settings.max_concurrency,
        settings.per_host_concurrency,
    );
    let validator = ValidationService::new(&settings.validator).expect("valid validator settings");
    Scraper::new(pool, Arc::new(validator))
}
