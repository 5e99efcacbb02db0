// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::domain::models::task::HttpMethod;
use crate::engines::traits::{EngineError, FetchRequest, FetchResponse, Fetcher};
use async_trait::async_trait;
use dashmap::DashMap;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tracing::debug;

/// 直连客户端在缓存中的键
const DIRECT: &str = "";

/// 抓取引擎
///
/// 基于reqwest实现的基本HTTP抓取引擎。每个代理对应一个复用的客户端，
/// 客户端之间互不共享连接和 Cookie。
pub struct ReqwestEngine {
    clients: DashMap<String, reqwest::Client>,
    connect_timeout: Duration,
}

impl ReqwestEngine {
    pub fn new() -> Self {
        Self {
            clients: DashMap::new(),
            connect_timeout: Duration::from_secs(10),
        }
    }

    fn client(&self, proxy: Option<&str>) -> Result<reqwest::Client, EngineError> {
        let key = proxy.unwrap_or(DIRECT);
        if let Some(client) = self.clients.get(key) {
            return Ok(client.clone());
        }

        let mut builder = reqwest::Client::builder()
            .connect_timeout(self.connect_timeout)
            .cookie_store(true);

        // Handle proxy
        if let Some(proxy_url) = proxy {
            let proxy = reqwest::Proxy::all(proxy_url)
                .map_err(|e| EngineError::InvalidProxy(e.to_string()))?;
            builder = builder.proxy(proxy);
        } else {
            builder = builder.no_proxy();
        }

        let client = builder.build()?;
        self.clients.insert(key.to_string(), client.clone());
        Ok(client)
    }
}

impl Default for ReqwestEngine {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Fetcher for ReqwestEngine {
    /// 执行HTTP抓取
    ///
    /// # 参数
    ///
    /// * `request` - 抓取请求
    ///
    /// # 返回值
    ///
    /// * `Ok(FetchResponse)` - 抓取响应（任何状态码）
    /// * `Err(EngineError)` - 连接、超时或读取响应体失败
    async fn fetch(&self, request: &FetchRequest) -> Result<FetchResponse, EngineError> {
        let client = self.client(request.proxy.as_deref())?;

        // Build headers
        let mut headers = HeaderMap::new();
        for (k, v) in &request.headers {
            if let (Ok(k), Ok(v)) = (
                HeaderName::from_bytes(k.as_bytes()),
                HeaderValue::from_str(v),
            ) {
                headers.insert(k, v);
            }
        }

        let builder = match request.method {
            HttpMethod::Get => client.get(&request.url),
            HttpMethod::Post => client.post(&request.url),
            HttpMethod::Head => client.head(&request.url),
        };
        let mut builder = builder.headers(headers).timeout(request.timeout);
        if let Some(body) = &request.body {
            builder = builder.body(body.clone());
        }

        let start = Instant::now();
        let response = builder.send().await.map_err(|e| {
            if e.is_timeout() {
                EngineError::Timeout
            } else {
                EngineError::RequestFailed(e)
            }
        })?;

        let status_code = response.status().as_u16();
        let content_type = response
            .headers()
            .get("content-type")
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .unwrap_or("text/html")
            .to_string();

        let mut response_headers = HashMap::new();
        for (k, v) in response.headers() {
            if let Ok(v_str) = v.to_str() {
                response_headers.insert(k.as_str().to_string(), v_str.to_string());
            }
        }

        let body = response.text().await.map_err(|e| {
            if e.is_timeout() {
                EngineError::Timeout
            } else {
                EngineError::Decode(e.to_string())
            }
        })?;

        let response_time_ms = start.elapsed().as_millis() as u64;
        debug!(
            url = %request.url,
            status_code,
            bytes = body.len(),
            response_time_ms,
            "Fetched"
        );

        Ok(FetchResponse {
            status_code,
            body,
            headers: response_headers,
            content_type,
            response_time_ms,
        })
    }

    /// 获取引擎名称
    ///
    /// # 返回值
    ///
    /// 引擎名称
    fn name(&self) -> &'static str {
        "reqwest"
    }
}

#[cfg(test)]
#[path = "reqwest_engine_test.rs"]
mod tests;
