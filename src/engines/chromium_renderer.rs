// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::config::settings::RendererSettings;
use crate::engines::traits::{EngineError, Renderer, WaitCondition};
use async_trait::async_trait;
use chromiumoxide::{Browser, BrowserConfig, Page};
use futures::StreamExt;
use std::time::Duration;
use tokio::sync::OnceCell;
use tracing::{debug, info, warn};

/// 等待元素出现时的轮询间隔
const SELECTOR_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Chromium 渲染器
///
/// 基于chromiumoxide实现。浏览器在第一次渲染时启动（或连接到
/// `remote_debugging_url` 指定的远程实例），之后所有渲染复用同一个浏览器，
/// 每次渲染使用独立的页面。
pub struct ChromiumRenderer {
    browser: OnceCell<Browser>,
    remote_debugging_url: Option<String>,
}

impl ChromiumRenderer {
    pub fn new(settings: &RendererSettings) -> Self {
        Self {
            browser: OnceCell::new(),
            remote_debugging_url: settings.remote_debugging_url.clone(),
        }
    }

    async fn browser(&self) -> Result<&Browser, EngineError> {
        self.browser
            .get_or_try_init(|| async {
                let (browser, mut handler) = if let Some(url) = &self.remote_debugging_url {
                    info!("Connecting to remote Chrome instance at: {}", url);
                    Browser::connect(url.as_str()).await.map_err(|e| {
                        EngineError::Render(format!("Failed to connect to remote Chrome: {}", e))
                    })?
                } else {
                    let config = BrowserConfig::builder()
                        .no_sandbox()
                        .request_timeout(Duration::from_secs(30))
                        .arg("--disable-gpu")
                        .arg("--disable-dev-shm-usage")
                        .build()
                        .map_err(EngineError::Render)?;

                    Browser::launch(config)
                        .await
                        .map_err(|e| EngineError::Render(format!("Failed to launch Chrome: {}", e)))?
                };

                // Drive browser events until the connection drops
                tokio::spawn(async move {
                    while let Some(event) = handler.next().await {
                        if event.is_err() {
                            break;
                        }
                    }
                });

                Ok(browser)
            })
            .await
    }

    async fn render_page(&self, page: &Page, url: &str, wait: &WaitCondition) -> Result<String, EngineError> {
        // goto resolves once the load event fires
        page.goto(url)
            .await
            .map_err(|e| EngineError::Render(format!("Navigation failed: {}", e)))?;

        match wait {
            WaitCondition::Load => {}
            WaitCondition::Delay(delay) => tokio::time::sleep(*delay).await,
            WaitCondition::Selector(selector) => loop {
                if page.find_element(selector.as_str()).await.is_ok() {
                    debug!(selector = %selector, "Wait selector appeared");
                    break;
                }
                tokio::time::sleep(SELECTOR_POLL_INTERVAL).await;
            },
        }

        page.content()
            .await
            .map_err(|e| EngineError::Render(format!("Failed to read content: {}", e)))
    }
}

#[async_trait]
impl Renderer for ChromiumRenderer {
    /// 渲染页面并返回 HTML
    ///
    /// 整个过程（含浏览器启动与等待条件）受 `timeout` 约束，超时视为渲染失败。
    async fn render(
        &self,
        url: &str,
        wait: &WaitCondition,
        timeout: Duration,
    ) -> Result<String, EngineError> {
        tokio::time::timeout(timeout, async {
            let browser = self.browser().await?;
            let page = browser
                .new_page("about:blank")
                .await
                .map_err(|e| EngineError::Render(e.to_string()))?;

            let result = self.render_page(&page, url, wait).await;
            if let Err(e) = page.close().await {
                warn!("Failed to close page: {}", e);
            }
            result
        })
        .await
        .map_err(|_| EngineError::Render(format!("Rendering timed out after {:?}", timeout)))?
    }

    fn name(&self) -> &'static str {
        "chromium"
    }
}
