// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::domain::models::task::HttpMethod;
use crate::utils::errors::ErrorKind;
use async_trait::async_trait;
use std::collections::HashMap;
use std::time::Duration;
use thiserror::Error;

/// 引擎错误类型
#[derive(Error, Debug)]
pub enum EngineError {
    /// 请求失败
    #[error("Request failed: {0}")]
    RequestFailed(#[from] reqwest::Error),
    /// 超时
    #[error("Timeout")]
    Timeout,
    /// 代理地址不可用
    #[error("Invalid proxy: {0}")]
    InvalidProxy(String),
    /// 响应体无法解码
    #[error("Decode error: {0}")]
    Decode(String),
    /// 渲染器失败
    #[error("Render error: {0}")]
    Render(String),
    /// 其他错误
    #[error("Other error: {0}")]
    Other(String),
}

impl EngineError {
    /// 映射到对外暴露的失败分类
    pub fn kind(&self) -> ErrorKind {
        match self {
            EngineError::RequestFailed(e) if e.is_decode() || e.is_body() => {
                ErrorKind::ParseError
            }
            EngineError::RequestFailed(_) | EngineError::Timeout => ErrorKind::NetworkError,
            EngineError::InvalidProxy(_) => ErrorKind::NetworkError,
            EngineError::Decode(_) => ErrorKind::ParseError,
            EngineError::Render(_) => ErrorKind::RenderError,
            EngineError::Other(_) => ErrorKind::ParseError,
        }
    }

    /// 判断错误是否可重试
    ///
    /// # 返回值
    ///
    /// 如果错误是可重试的则返回true，否则返回false
    pub fn is_retryable(&self) -> bool {
        self.kind().is_retryable()
    }
}

/// 单次网络请求
#[derive(Debug, Clone)]
pub struct FetchRequest {
    /// 目标URL
    pub url: String,
    pub method: HttpMethod,
    /// 请求头（已合并默认浏览器请求头）
    pub headers: HashMap<String, String>,
    pub body: Option<String>,
    /// 本次尝试的超时时间
    pub timeout: Duration,
    /// 代理地址（含认证信息），为空表示直连
    pub proxy: Option<String>,
}

/// 网络响应
#[derive(Debug, Clone)]
pub struct FetchResponse {
    /// HTTP状态码
    pub status_code: u16,
    /// 响应内容
    pub body: String,
    /// 响应头
    pub headers: HashMap<String, String>,
    /// 内容类型
    pub content_type: String,
    /// 响应时间（毫秒）
    pub response_time_ms: u64,
}

/// 静态抓取引擎特质
#[async_trait]
pub trait Fetcher: Send + Sync {
    /// 发起一次请求；非 2xx 状态码不是错误，交给调用方分类
    async fn fetch(&self, request: &FetchRequest) -> Result<FetchResponse, EngineError>;

    /// 引擎名称
    fn name(&self) -> &'static str;
}

/// 渲染等待条件
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WaitCondition {
    /// 页面 load 事件
    Load,
    /// 等待匹配的元素出现
    Selector(String),
    /// 固定延时
    Delay(Duration),
}

/// 无头浏览器渲染器特质
///
/// 给定 URL 与等待条件，返回渲染后的 HTML
#[async_trait]
pub trait Renderer: Send + Sync {
    async fn render(
        &self,
        url: &str,
        wait: &WaitCondition,
        timeout: Duration,
    ) -> Result<String, EngineError>;

    /// 渲染器名称
    fn name(&self) -> &'static str;
}
