// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::domain::models::scrape_result::{FieldMap, FieldValue};
use crate::domain::models::selector::{Selector, SelectorMap};
use scraper::{ElementRef, Html};
use tracing::debug;

/// 提取服务
///
/// 纯函数：(文档, 选择器映射) → 字段映射。单个字段的选择器无效或
/// 没有命中时该字段为 None，其它字段照常提取。
pub struct ExtractionService;

/// 转换后的 CSS 查询
#[derive(Debug, Clone, PartialEq, Eq)]
struct CssQuery {
    css: String,
    /// 为空时取元素文本
    attribute: Option<String>,
}

impl ExtractionService {
    /// 提取数据
    ///
    /// # 参数
    ///
    /// * `html_content` - HTML 文档
    /// * `selectors` - 字段名到选择器的映射
    ///
    /// # 返回值
    ///
    /// 每个字段都有一项，未命中为 None
    pub fn extract(html_content: &str, selectors: &SelectorMap) -> FieldMap {
        let document = Html::parse_document(html_content);
        Self::extract_document(&document, selectors)
    }

    /// 对已解析的文档提取数据
    pub fn extract_document(document: &Html, selectors: &SelectorMap) -> FieldMap {
        selectors
            .iter()
            .map(|(field, selector)| {
                (
                    field.clone(),
                    Self::extract_field(document, field, selector),
                )
            })
            .collect()
    }

    fn extract_field(document: &Html, field: &str, selector: &Selector) -> Option<FieldValue> {
        let Some(query) = to_query(selector) else {
            debug!(field, expression = selector.expression(), "Unsupported XPath expression");
            return None;
        };

        let parsed = match scraper::Selector::parse(&query.css) {
            Ok(parsed) => parsed,
            Err(e) => {
                debug!(field, css = %query.css, error = ?e, "Malformed selector");
                return None;
            }
        };

        let mut values = document
            .select(&parsed)
            .filter_map(|element| match &query.attribute {
                Some(attr) => element.value().attr(attr).map(normalize_whitespace),
                None => Some(element_text(element)),
            })
            .filter(|value| !value.is_empty());

        if selector.is_multiple() {
            let all: Vec<String> = values.collect();
            (!all.is_empty()).then_some(FieldValue::List(all))
        } else {
            values.next().map(FieldValue::Text)
        }
    }
}

fn to_query(selector: &Selector) -> Option<CssQuery> {
    match selector {
        Selector::Css { expression, .. } => Some(CssQuery {
            css: expression.trim().to_string(),
            attribute: None,
        }),
        Selector::Attribute {
            expression,
            attribute,
            ..
        } => Some(CssQuery {
            css: expression.trim().to_string(),
            attribute: Some(attribute.trim().to_string()),
        }),
        Selector::XPath { expression, .. } => xpath_to_css(expression),
    }
}

fn element_text(element: ElementRef<'_>) -> String {
    normalize_whitespace(&element.text().collect::<String>())
}

fn normalize_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// 将 XPath 子集转换为 CSS
///
/// 支持 `/`、`//`、标签名、`*`、`[@a]`、`[@a='v']`、`[contains(@a,'v')]`、
/// `[n]`、`[last()]`，以及结尾的 `/text()` 或 `/@attr`。
fn xpath_to_css(expression: &str) -> Option<CssQuery> {
    let mut expr = expression.trim();
    let mut attribute = None;

    if let Some(stripped) = expr.strip_suffix("/text()") {
        expr = stripped;
    } else if let Some(pos) = expr.rfind("/@") {
        let name = &expr[pos + 2..];
        if is_name(name) {
            attribute = Some(name.to_string());
            expr = &expr[..pos];
        }
    }

    let steps = split_steps(expr)?;
    if steps.is_empty() {
        return None;
    }

    let mut css = String::new();
    for (i, (descendant, step)) in steps.iter().enumerate() {
        let step_css = translate_step(step)?;
        if i > 0 {
            css.push_str(if *descendant { " " } else { " > " });
        }
        css.push_str(&step_css);
    }

    Some(CssQuery { css, attribute })
}

/// 按顶层 `/` 切分路径，返回 (是否后代轴, 步骤)
fn split_steps(expr: &str) -> Option<Vec<(bool, &str)>> {
    let bytes = expr.as_bytes();
    let mut steps = Vec::new();
    let mut i = 0;

    while i < bytes.len() {
        if bytes[i] != b'/' {
            return None;
        }
        let descendant = bytes.get(i + 1) == Some(&b'/');
        i += if descendant { 2 } else { 1 };

        let start = i;
        let mut depth = 0i32;
        let mut quote: Option<u8> = None;
        while i < bytes.len() {
            let b = bytes[i];
            match quote {
                Some(q) => {
                    if b == q {
                        quote = None;
                    }
                }
                None => match b {
                    b'\'' | b'"' => quote = Some(b),
                    b'[' => depth += 1,
                    b']' => depth -= 1,
                    b'/' if depth == 0 => break,
                    _ => {}
                },
            }
            i += 1;
        }

        if quote.is_some() || depth != 0 {
            return None;
        }
        let step = &expr[start..i];
        if step.is_empty() {
            return None;
        }
        steps.push((descendant, step));
    }

    Some(steps)
}

fn translate_step(step: &str) -> Option<String> {
    let (name, mut rest) = match step.find('[') {
        Some(pos) => (step[..pos].trim(), &step[pos..]),
        None => (step.trim(), ""),
    };
    let wildcard = name == "*";
    if !wildcard && !is_name(name) {
        return None;
    }

    let mut css = name.to_string();
    while !rest.is_empty() {
        let close = predicate_end(rest)?;
        css.push_str(&translate_predicate(rest[1..close].trim(), wildcard)?);
        rest = rest[close + 1..].trim_start();
    }
    Some(css)
}

fn predicate_end(s: &str) -> Option<usize> {
    if !s.starts_with('[') {
        return None;
    }
    let mut quote: Option<char> = None;
    for (i, c) in s.char_indices().skip(1) {
        match quote {
            Some(q) => {
                if c == q {
                    quote = None;
                }
            }
            None => match c {
                '\'' | '"' => quote = Some(c),
                ']' => return Some(i),
                _ => {}
            },
        }
    }
    None
}

fn translate_predicate(predicate: &str, wildcard: bool) -> Option<String> {
    if let Ok(n) = predicate.parse::<usize>() {
        if n == 0 {
            return None;
        }
        return Some(if wildcard {
            format!(":nth-child({})", n)
        } else {
            format!(":nth-of-type({})", n)
        });
    }

    if predicate == "last()" {
        return Some(if wildcard { ":last-child" } else { ":last-of-type" }.to_string());
    }

    if let Some(inner) = predicate
        .strip_prefix("contains(")
        .and_then(|s| s.strip_suffix(')'))
    {
        let (lhs, rhs) = inner.split_once(',')?;
        let attr = lhs.trim().strip_prefix('@')?;
        if !is_name(attr) {
            return None;
        }
        let value = unquote(rhs.trim())?;
        return Some(format!("[{}*=\"{}\"]", attr, escape_css_string(value)));
    }

    let attr_expr = predicate.strip_prefix('@')?;
    match attr_expr.split_once('=') {
        None => {
            let attr = attr_expr.trim();
            is_name(attr).then(|| format!("[{}]", attr))
        }
        Some((attr, value)) => {
            let attr = attr.trim();
            if !is_name(attr) {
                return None;
            }
            let value = unquote(value.trim())?;
            Some(format!("[{}=\"{}\"]", attr, escape_css_string(value)))
        }
    }
}

fn is_name(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

fn unquote(s: &str) -> Option<&str> {
    let first = s.chars().next()?;
    if (first == '\'' || first == '"') && s.len() >= 2 && s.ends_with(first) {
        Some(&s[1..s.len() - 1])
    } else {
        None
    }
}

fn escape_css_string(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"")
}

#[cfg(test)]
#[path = "extraction_service_test.rs"]
mod tests;
