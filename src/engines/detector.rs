// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::utils::errors::ErrorKind;
use scraper::{ElementRef, Html, Selector};
use once_cell::sync::Lazy;

/// 客户端渲染框架留下的标记
const FRAMEWORK_MARKERS: &[&str] = &[
    "__NEXT_DATA__",
    "__NUXT__",
    "ng-version",
    "ng-app",
    "data-reactroot",
    "data-vue-",
    "v-cloak",
];

/// 验证码与反爬挑战页面的标记（小写比较）
const CHALLENGE_MARKERS: &[&str] = &[
    "g-recaptcha",
    "www.google.com/recaptcha",
    "h-captcha",
    "hcaptcha.com",
    "cf-challenge",
    "challenge-platform",
    "cf_chl_",
    "attention required! | cloudflare",
    "just a moment...",
];

/// 不计入可见文本的元素
const INVISIBLE_TAGS: &[&str] = &["script", "style", "noscript", "template"];

static BODY_SELECTOR: Lazy<Option<Selector>> = Lazy::new(|| Selector::parse("body").ok());
static MOUNT_SELECTOR: Lazy<Option<Selector>> =
    Lazy::new(|| Selector::parse("#root, #app, #__next").ok());

/// 按状态码分类
///
/// # 返回值
///
/// * `None` - 2xx
/// * `Some(ErrorKind::Blocked)` - 403/429
/// * `Some(ErrorKind::NetworkError)` - 5xx
/// * `Some(ErrorKind::ParseError)` - 其他非 2xx
pub fn classify_status(status_code: u16) -> Option<ErrorKind> {
    match status_code {
        200..=299 => None,
        403 | 429 => Some(ErrorKind::Blocked),
        500..=599 => Some(ErrorKind::NetworkError),
        _ => Some(ErrorKind::ParseError),
    }
}

/// 响应体是否是验证码或反爬挑战页面
pub fn is_challenge_page(body: &str) -> bool {
    let lower = body.to_lowercase();
    CHALLENGE_MARKERS.iter().any(|marker| lower.contains(marker))
}

/// 内容类型是否是可解析的文本
pub fn is_textual(content_type: &str) -> bool {
    let ct = content_type.to_ascii_lowercase();
    ct.is_empty()
        || ct.starts_with("text/")
        || ct.contains("html")
        || ct.contains("xml")
        || ct.contains("json")
}

/// 静态抓取结果是否是需要 JavaScript 渲染的页面外壳
///
/// 满足任一条件即视为需要渲染：
/// - 出现客户端框架标记
/// - 存在空的挂载点（`#root`、`#app`、`#__next`）
/// - 可见文本少于 `min_text_length` 个字符
pub fn needs_javascript(body: &str, min_text_length: usize) -> bool {
    if FRAMEWORK_MARKERS.iter().any(|marker| body.contains(marker)) {
        return true;
    }

    let document = Html::parse_document(body);
    if has_empty_mount(&document) {
        return true;
    }

    visible_text_len(&document) < min_text_length
}

fn has_empty_mount(document: &Html) -> bool {
    let Some(selector) = MOUNT_SELECTOR.as_ref() else {
        return false;
    };
    document.select(selector).any(|mount| {
        mount.children().all(|child| match child.value().as_text() {
            Some(text) => text.trim().is_empty(),
            None => !child.value().is_element(),
        })
    })
}

/// 文档正文中可见文本的字符数（折叠空白，忽略脚本和样式）
pub fn visible_text_len(document: &Html) -> usize {
    let root = BODY_SELECTOR
        .as_ref()
        .and_then(|selector| document.select(selector).next())
        .unwrap_or_else(|| document.root_element());

    let mut len = 0;
    collect_visible(root, &mut len);
    len
}

fn collect_visible(element: ElementRef<'_>, len: &mut usize) {
    if INVISIBLE_TAGS.contains(&element.value().name()) {
        return;
    }
    for child in element.children() {
        if let Some(text) = child.value().as_text() {
            let words: Vec<&str> = text.split_whitespace().collect();
            if !words.is_empty() {
                *len += words.iter().map(|w| w.chars().count()).sum::<usize>() + words.len() - 1;
            }
        } else if let Some(child_element) = ElementRef::wrap(child) {
            collect_visible(child_element, len);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn article(words: usize) -> String {
        format!(
            "<html><body><main><p>{}</p></main></body></html>",
            "content ".repeat(words)
        )
    }

    #[test]
    fn test_classify_status() {
        assert_eq!(classify_status(200), None);
        assert_eq!(classify_status(204), None);
        assert_eq!(classify_status(403), Some(ErrorKind::Blocked));
        assert_eq!(classify_status(429), Some(ErrorKind::Blocked));
        assert_eq!(classify_status(503), Some(ErrorKind::NetworkError));
        assert_eq!(classify_status(404), Some(ErrorKind::ParseError));
    }

    #[test]
    fn test_challenge_markers() {
        assert!(is_challenge_page(
            r#"<div class="g-recaptcha" data-sitekey="x"></div>"#
        ));
        assert!(is_challenge_page(
            "<title>Attention Required! | Cloudflare</title>"
        ));
        assert!(!is_challenge_page(&article(50)));
    }

    #[test]
    fn test_framework_shell_needs_javascript() {
        let next = r#"<html><body><div id="__next"></div><script id="__NEXT_DATA__">{}</script></body></html>"#;
        assert!(needs_javascript(next, 100));

        let vue = format!(
            r#"<html><body><div id="app" v-cloak>{}</div></body></html>"#,
            "x ".repeat(200)
        );
        assert!(needs_javascript(&vue, 100));
    }

    #[test]
    fn test_empty_mount_point_needs_javascript() {
        let html = format!(
            r#"<html><body><div id="root">  </div><footer>{}</footer></body></html>"#,
            "footer text ".repeat(30)
        );
        assert!(needs_javascript(&html, 100));
    }

    #[test]
    fn test_short_visible_text_needs_javascript() {
        let html = format!(
            "<html><body><p>Loading</p><script>{}</script></body></html>",
            "var a = 1;".repeat(100)
        );
        assert!(needs_javascript(&html, 100));
        assert!(!needs_javascript(&article(30), 100));
    }

    #[test]
    fn test_visible_text_len_skips_scripts_and_collapses_whitespace() {
        let doc = Html::parse_document(
            "<html><head><title>T</title></head><body><p>  hello\n\n world </p><style>p{}</style><script>x()</script></body></html>",
        );
        assert_eq!(visible_text_len(&doc), "hello world".len());
    }

    #[test]
    fn test_is_textual() {
        assert!(is_textual("text/html; charset=utf-8"));
        assert!(is_textual("application/xhtml+xml"));
        assert!(is_textual("application/json"));
        assert!(!is_textual("image/png"));
        assert!(!is_textual("application/pdf"));
    }
}
