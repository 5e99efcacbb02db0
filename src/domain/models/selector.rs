// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::str::FromStr;
use thiserror::Error;

/// 字段选择器
///
/// 选择器种类是显式的判别值，提取器据此分派，不再猜测字符串语法。
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Selector {
    /// CSS 选择器，取匹配元素的文本
    Css {
        expression: String,
        #[serde(default)]
        multiple: bool,
    },
    /// CSS 选择器 + 属性名，取匹配元素的属性值
    Attribute {
        expression: String,
        attribute: String,
        #[serde(default)]
        multiple: bool,
    },
    /// XPath 子集，提取前转换为 CSS
    #[serde(rename = "xpath")]
    XPath {
        expression: String,
        #[serde(default)]
        multiple: bool,
    },
}

/// 字段名到选择器的映射，按字段名排序以得到稳定的签名
pub type SelectorMap = BTreeMap<String, Selector>;

impl Selector {
    pub fn css(expression: impl Into<String>) -> Self {
        Selector::Css {
            expression: expression.into(),
            multiple: false,
        }
    }

    pub fn attribute(expression: impl Into<String>, attribute: impl Into<String>) -> Self {
        Selector::Attribute {
            expression: expression.into(),
            attribute: attribute.into(),
            multiple: false,
        }
    }

    pub fn xpath(expression: impl Into<String>) -> Self {
        Selector::XPath {
            expression: expression.into(),
            multiple: false,
        }
    }

    /// 返回匹配全部元素的版本
    pub fn all(self) -> Self {
        match self {
            Selector::Css { expression, .. } => Selector::Css {
                expression,
                multiple: true,
            },
            Selector::Attribute {
                expression,
                attribute,
                ..
            } => Selector::Attribute {
                expression,
                attribute,
                multiple: true,
            },
            Selector::XPath { expression, .. } => Selector::XPath {
                expression,
                multiple: true,
            },
        }
    }

    pub fn expression(&self) -> &str {
        match self {
            Selector::Css { expression, .. }
            | Selector::Attribute { expression, .. }
            | Selector::XPath { expression, .. } => expression,
        }
    }

    pub fn is_multiple(&self) -> bool {
        match self {
            Selector::Css { multiple, .. }
            | Selector::Attribute { multiple, .. }
            | Selector::XPath { multiple, .. } => *multiple,
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Empty selector expression")]
pub struct EmptySelector;

/// 解析简写语法
///
/// - `h1::text` 或 `h1` → CSS 文本
/// - `a::attr(href)` → 属性
/// - 以 `/` 或 `(` 开头 → XPath
/// - 末尾的 `[multi]` → 匹配全部元素
impl FromStr for Selector {
    type Err = EmptySelector;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut raw = s.trim();
        let mut multiple = false;
        if let Some(stripped) = raw.strip_suffix("[multi]") {
            raw = stripped.trim_end();
            multiple = true;
        }
        if raw.is_empty() {
            return Err(EmptySelector);
        }

        let selector = if raw.starts_with('/') || raw.starts_with('(') {
            Selector::xpath(raw)
        } else if let Some((css, rest)) = raw.split_once("::attr(") {
            match rest.strip_suffix(')') {
                Some(attr) if !attr.trim().is_empty() => {
                    Selector::attribute(css.trim(), attr.trim())
                }
                _ => Selector::css(raw),
            }
        } else if let Some(css) = raw.strip_suffix("::text") {
            Selector::css(css.trim())
        } else {
            Selector::css(raw)
        };

        Ok(if multiple { selector.all() } else { selector })
    }
}
