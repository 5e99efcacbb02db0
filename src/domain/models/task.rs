// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::domain::models::selector::{Selector, SelectorMap};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::time::Duration;
use uuid::Uuid;

/// HTTP 方法
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    #[default]
    Get,
    Post,
    Head,
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            HttpMethod::Get => write!(f, "GET"),
            HttpMethod::Post => write!(f, "POST"),
            HttpMethod::Head => write!(f, "HEAD"),
        }
    }
}

/// 渲染模式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RenderMode {
    /// 静态抓取，检测到 JavaScript 页面时交给渲染器
    #[default]
    Auto,
    /// 直接使用渲染器
    Always,
    /// 只做静态抓取
    Never,
}

/// 抓取任务
///
/// 提交后不再修改；引擎只读取它。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestTask {
    /// 任务唯一标识符
    #[serde(default = "Uuid::new_v4")]
    pub id: Uuid,
    /// 目标URL
    pub url: String,
    #[serde(default)]
    pub method: HttpMethod,
    /// 调用方请求头，覆盖默认浏览器请求头
    #[serde(default)]
    pub headers: HashMap<String, String>,
    /// 字段选择器
    #[serde(default)]
    pub selectors: SelectorMap,
    /// 任务总超时（含全部重试），为空时使用全局配置
    #[serde(default)]
    pub timeout_ms: Option<u64>,
    /// 最大尝试次数，为空时使用全局配置
    #[serde(default)]
    pub max_attempts: Option<u32>,
    #[serde(default)]
    pub render: RenderMode,
    /// 渲染时等待出现的 CSS 选择器
    #[serde(default)]
    pub wait_for: Option<String>,
    #[serde(default = "default_use_cache")]
    pub use_cache: bool,
    /// 覆盖全局缓存有效期（秒）
    #[serde(default)]
    pub cache_ttl_seconds: Option<u64>,
    /// POST 请求体
    #[serde(default)]
    pub body: Option<String>,
}

fn default_use_cache() -> bool {
    true
}

impl RequestTask {
    /// 创建一个 GET 任务
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            url: url.into(),
            method: HttpMethod::Get,
            headers: HashMap::new(),
            selectors: SelectorMap::new(),
            timeout_ms: None,
            max_attempts: None,
            render: RenderMode::Auto,
            wait_for: None,
            use_cache: true,
            cache_ttl_seconds: None,
            body: None,
        }
    }

    pub fn with_selector(mut self, field: impl Into<String>, selector: Selector) -> Self {
        self.selectors.insert(field.into(), selector);
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout_ms = Some(timeout.as_millis() as u64);
        self
    }

    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = Some(attempts);
        self
    }

    pub fn with_render(mut self, render: RenderMode) -> Self {
        self.render = render;
        self
    }

    pub fn with_cache(mut self, use_cache: bool) -> Self {
        self.use_cache = use_cache;
        self
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_ms.map(Duration::from_millis)
    }
}
