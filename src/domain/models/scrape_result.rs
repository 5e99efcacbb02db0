// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::utils::errors::ErrorKind;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

/// 提取到的字段值
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Text(String),
    List(Vec<String>),
}

impl FieldValue {
    /// 单值字段的文本；列表取第一个元素
    pub fn as_text(&self) -> Option<&str> {
        match self {
            FieldValue::Text(s) => Some(s),
            FieldValue::List(items) => items.first().map(String::as_str),
        }
    }
}

/// 字段名到提取结果的映射，未匹配的字段为 None
pub type FieldMap = BTreeMap<String, Option<FieldValue>>;

/// 抓取结果
///
/// 每个任务产生且仅产生一个结果。`success` 为 true 时，要么至少有一个
/// 非空字段，要么 `empty` 为 true（已抓取但没有选择器命中）。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScrapeResult {
    pub task_id: Uuid,
    pub url: String,
    pub success: bool,
    pub fields: FieldMap,
    /// 抓取成功但没有任何字段命中
    pub empty: bool,
    pub error_kind: Option<ErrorKind>,
    pub error_message: Option<String>,
    /// 使用的代理（脱敏 id），直连或命中缓存时为空
    pub proxy_id: Option<String>,
    /// 从开始到结束的总耗时（毫秒）
    pub latency_ms: u64,
    pub timestamp: DateTime<Utc>,
    pub from_cache: bool,
    /// 实际发起的网络尝试次数
    pub attempts: u32,
    pub status_code: Option<u16>,
    /// 响应体字节数
    pub bytes: usize,
    /// 内容是否来自渲染器
    pub rendered: bool,
}

impl ScrapeResult {
    /// 构建成功结果
    pub fn succeeded(task_id: Uuid, url: &str, fields: FieldMap) -> Self {
        let empty = !fields.values().any(Option::is_some);
        Self {
            task_id,
            url: url.to_string(),
            success: true,
            fields,
            empty,
            error_kind: None,
            error_message: None,
            proxy_id: None,
            latency_ms: 0,
            timestamp: Utc::now(),
            from_cache: false,
            attempts: 0,
            status_code: None,
            bytes: 0,
            rendered: false,
        }
    }

    /// 构建失败结果
    pub fn failed(task_id: Uuid, url: &str, kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            task_id,
            url: url.to_string(),
            success: false,
            fields: FieldMap::new(),
            empty: false,
            error_kind: Some(kind),
            error_message: Some(message.into()),
            proxy_id: None,
            latency_ms: 0,
            timestamp: Utc::now(),
            from_cache: false,
            attempts: 0,
            status_code: None,
            bytes: 0,
            rendered: false,
        }
    }

    /// 命中的字段数
    pub fn matched_fields(&self) -> usize {
        self.fields.values().filter(|v| v.is_some()).count()
    }

    pub fn field_text(&self, name: &str) -> Option<&str> {
        self.fields.get(name)?.as_ref()?.as_text()
    }
}
