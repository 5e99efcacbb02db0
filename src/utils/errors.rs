// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// 抓取失败分类
///
/// 随 `ScrapeResult` 一起返回给调用方，是唯一对外暴露的失败原因
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// 连接失败或超时
    NetworkError,
    /// 反爬响应（403/429 或验证码页面）
    Blocked,
    /// 没有可用代理
    ProxyExhausted,
    /// 在超时时间内未获得令牌
    RateLimited,
    /// 渲染器失败
    RenderError,
    /// 文档不可读或不符合预期
    ParseError,
    /// 作业被取消
    Cancelled,
}

impl ErrorKind {
    /// 判断该类错误是否应在本地退避重试
    pub fn is_retryable(self) -> bool {
        matches!(self, ErrorKind::NetworkError | ErrorKind::Blocked)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ErrorKind::NetworkError => "network_error",
            ErrorKind::Blocked => "blocked",
            ErrorKind::ProxyExhausted => "proxy_exhausted",
            ErrorKind::RateLimited => "rate_limited",
            ErrorKind::RenderError => "render_error",
            ErrorKind::ParseError => "parse_error",
            ErrorKind::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 代理池错误类型
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProxyError {
    /// 没有处于活跃状态的代理
    #[error("No usable proxy available")]
    Exhausted,

    /// 代理地址无法解析或协议不受支持
    #[error("Invalid proxy uri: {0}")]
    InvalidUri(String),

    /// 代理不在池中
    #[error("Unknown proxy: {0}")]
    UnknownProxy(String),
}

/// 限流错误类型
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RateLimitError {
    /// 等待令牌超时
    #[error("Rate limited: no token for '{key}' within {waited_ms}ms")]
    RateLimited { key: String, waited_ms: u64 },
}

/// 校验器构建错误
#[derive(Error, Debug)]
pub enum ValidatorError {
    /// 拒绝规则中的正则表达式无效
    #[error("Invalid reject pattern '{category}' for field '{field}': {source}")]
    InvalidPattern {
        category: String,
        field: String,
        #[source]
        source: regex::Error,
    },
}

/// 导出错误类型
#[derive(Error, Debug)]
pub enum ExportError {
    /// 严格模式下存在无效记录
    #[error("Export blocked: {invalid} of {total} records failed validation")]
    Blocked { invalid: usize, total: usize },

    /// 导出器自身失败
    #[error("Exporter failed: {0}")]
    Exporter(String),
}

/// 组件装配错误
#[derive(Error, Debug)]
pub enum InitError {
    #[error(transparent)]
    Proxy(#[from] ProxyError),

    #[error(transparent)]
    Validator(#[from] ValidatorError),
}
