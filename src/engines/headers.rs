// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::config::settings::UserAgentRotation;
use crate::utils::url_utils::origin_of;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

const DESKTOP_USER_AGENTS: &[&str] = &[
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/119.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:121.0) Gecko/20100101 Firefox/121.0",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10.15; rv:121.0) Gecko/20100101 Firefox/121.0",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.1 Safari/605.1.15",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36 Edg/120.0.0.0",
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
];

/// User-Agent 轮换器
#[derive(Debug)]
pub struct UserAgentManager {
    agents: Vec<String>,
    rotation: UserAgentRotation,
    cursor: AtomicUsize,
}

impl UserAgentManager {
    pub fn new(rotation: UserAgentRotation) -> Self {
        Self::with_agents(
            DESKTOP_USER_AGENTS.iter().map(|s| s.to_string()).collect(),
            rotation,
        )
    }

    /// 使用自定义列表；列表为空时回退到内置列表
    pub fn with_agents(agents: Vec<String>, rotation: UserAgentRotation) -> Self {
        let agents = if agents.is_empty() {
            DESKTOP_USER_AGENTS.iter().map(|s| s.to_string()).collect()
        } else {
            agents
        };
        Self {
            agents,
            rotation,
            cursor: AtomicUsize::new(0),
        }
    }

    /// 取下一个 User-Agent
    pub fn next_agent(&self) -> &str {
        let idx = match self.rotation {
            UserAgentRotation::Random => rand::random_range(0..self.agents.len()),
            UserAgentRotation::RoundRobin => {
                self.cursor.fetch_add(1, Ordering::Relaxed) % self.agents.len()
            }
        };
        &self.agents[idx]
    }

    pub fn agents(&self) -> &[String] {
        &self.agents
    }
}

impl Default for UserAgentManager {
    fn default() -> Self {
        Self::new(UserAgentRotation::Random)
    }
}

/// 生成浏览器风格的请求头
///
/// 调用方请求头（名称不区分大小写）覆盖默认值；未指定 Referer 时
/// 使用目标站点的来源。
pub fn browser_headers(
    url: &str,
    user_agent: &str,
    overrides: &HashMap<String, String>,
) -> HashMap<String, String> {
    let mut headers: HashMap<String, String> = [
        ("User-Agent", user_agent),
        (
            "Accept",
            "text/html,application/xhtml+xml,application/xml;q=0.9,image/webp,*/*;q=0.8",
        ),
        ("Accept-Language", "en-US,en;q=0.9"),
        ("DNT", "1"),
        ("Upgrade-Insecure-Requests", "1"),
        ("Sec-Fetch-Dest", "document"),
        ("Sec-Fetch-Mode", "navigate"),
        ("Sec-Fetch-Site", "none"),
        ("Sec-Fetch-User", "?1"),
        ("Cache-Control", "max-age=0"),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v.to_string()))
    .collect();

    if let Some(origin) = origin_of(url) {
        headers.insert("Referer".to_string(), origin);
    }

    for (name, value) in overrides {
        headers.retain(|existing, _| !existing.eq_ignore_ascii_case(name));
        headers.insert(name.clone(), value.clone());
    }

    headers
}
