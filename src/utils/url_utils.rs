// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use url::{ParseError, Url};

/// 规范化URL，用于生成稳定的缓存键
///
/// 小写化 scheme 与 host（`url` 已处理），去掉片段，去掉默认端口，
/// 并按键值排序查询参数。
pub fn normalize_url(raw: &str) -> Result<String, ParseError> {
    let mut url = Url::parse(raw.trim())?;
    url.set_fragment(None);

    let mut pairs: Vec<(String, String)> = url
        .query_pairs()
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();

    if pairs.is_empty() {
        url.set_query(None);
    } else {
        pairs.sort();
        url.query_pairs_mut().clear().extend_pairs(pairs.iter());
    }

    Ok(url.to_string())
}

/// 提取URL的主机部分（包含非默认端口），作为限流和并发控制的键
pub fn host_key(raw: &str) -> Result<String, ParseError> {
    let url = Url::parse(raw.trim())?;
    let host = url.host_str().ok_or(ParseError::EmptyHost)?;
    Ok(match url.port() {
        Some(port) => format!("{}:{}", host, port),
        None => host.to_string(),
    })
}

/// 目标站点的来源（scheme://host[:port]/），用作 Referer
pub fn origin_of(raw: &str) -> Option<String> {
    let url = Url::parse(raw).ok()?;
    let host = url.host_str()?;
    Some(match url.port() {
        Some(port) => format!("{}://{}:{}/", url.scheme(), host, port),
        None => format!("{}://{}/", url.scheme(), host),
    })
}
