// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::domain::models::scrape_result::{FieldValue, ScrapeResult};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// 潜在客户记录
///
/// 由提取或补全流程生成，交给校验器检查后导出或丢弃。
/// 业务字段（公司名、网站、邮箱等）平铺在 `fields` 中。
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProspectRecord {
    #[serde(flatten)]
    pub fields: BTreeMap<String, String>,
    #[serde(default)]
    pub data_source: Option<String>,
    /// ISO 8601 日期
    #[serde(default)]
    pub verified_date: Option<String>,
    #[serde(default)]
    pub verification_method: Option<String>,
    #[serde(default)]
    pub verified_website: bool,
    #[serde(default)]
    pub verified_phone: bool,
    #[serde(default)]
    pub verified_email: bool,
    /// 0-100
    #[serde(default)]
    pub verification_confidence: u8,
}

impl ProspectRecord {
    /// 按字段名读取值，同时覆盖来源字段与平铺字段
    pub fn get(&self, field: &str) -> Option<&str> {
        match field {
            "data_source" => self.data_source.as_deref(),
            "verified_date" => self.verified_date.as_deref(),
            "verification_method" => self.verification_method.as_deref(),
            _ => self.fields.get(field).map(String::as_str),
        }
    }

    /// 读取验证标记；未知标记从平铺字段中按 "true" 解析
    pub fn flag(&self, name: &str) -> bool {
        match name {
            "verified_website" => self.verified_website,
            "verified_phone" => self.verified_phone,
            "verified_email" => self.verified_email,
            other => self
                .fields
                .get(other)
                .is_some_and(|v| v.trim().eq_ignore_ascii_case("true")),
        }
    }

    pub fn set(&mut self, field: impl Into<String>, value: impl Into<String>) -> &mut Self {
        let field = field.into();
        let value = value.into();
        match field.as_str() {
            "data_source" => self.data_source = Some(value),
            "verified_date" => self.verified_date = Some(value),
            "verification_method" => self.verification_method = Some(value),
            _ => {
                self.fields.insert(field, value);
            }
        }
        self
    }

    /// 公司名，用于报告展示
    pub fn company_name(&self) -> &str {
        self.get("company_name").unwrap_or("Unknown")
    }

    /// 从抓取结果构建记录
    ///
    /// 只复制命中的字段；列表字段以 "; " 连接。来源信息由调用方补充。
    pub fn from_extracted(result: &ScrapeResult) -> Self {
        let mut record = ProspectRecord::default();
        for (name, value) in &result.fields {
            let Some(value) = value else { continue };
            let text = match value {
                FieldValue::Text(s) => s.clone(),
                FieldValue::List(items) => items.join("; "),
            };
            if !text.is_empty() {
                record.set(name.clone(), text);
            }
        }
        record
    }
}
