// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::domain::models::proxy::RotationStrategy;
use config::{Config, ConfigError, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};

/// 应用程序配置设置
///
/// 包含代理池、限流、缓存、重试、渲染和数据校验等所有配置项。
/// 每一节都带有默认值，配置文件与环境变量只需覆盖需要修改的部分。
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct Settings {
    /// 代理地址列表（可内嵌认证信息）
    pub proxies: Vec<String>,
    /// 代理轮换策略
    pub rotation_strategy: RotationStrategy,
    /// 缓存有效期（秒），0 表示永不过期
    pub cache_ttl_seconds: u64,
    /// 缓存最大条目数，0 表示禁用缓存
    pub cache_max_entries: usize,
    /// 缓存键是否包含选择器签名
    pub cache_key_includes_selectors: bool,
    /// 每个目标主机的令牌桶
    pub rate_limit_per_host: RateLimitSettings,
    /// 全局并发上限
    pub max_concurrency: usize,
    /// 单个主机并发上限
    pub per_host_concurrency: usize,
    /// 重试配置
    pub retry: RetrySettings,
    /// 单次请求超时（毫秒），同时作为任务默认的总超时
    pub fetch_timeout_ms: u64,
    /// 代理健康度配置
    pub proxy_health: ProxyHealthSettings,
    /// 渲染器配置
    pub renderer: RendererSettings,
    /// User-Agent 配置
    pub user_agents: UserAgentSettings,
    /// 数据校验配置
    pub validator: ValidatorSettings,
    /// 指标导出配置
    pub metrics: MetricsSettings,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            proxies: Vec::new(),
            rotation_strategy: RotationStrategy::HealthBased,
            cache_ttl_seconds: 3600,
            cache_max_entries: 1000,
            cache_key_includes_selectors: true,
            rate_limit_per_host: RateLimitSettings::default(),
            max_concurrency: 10,
            per_host_concurrency: 2,
            retry: RetrySettings::default(),
            fetch_timeout_ms: 30_000,
            proxy_health: ProxyHealthSettings::default(),
            renderer: RendererSettings::default(),
            user_agents: UserAgentSettings::default(),
            validator: ValidatorSettings::default(),
            metrics: MetricsSettings::default(),
        }
    }
}

/// 速率限制配置设置
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RateLimitSettings {
    /// 桶容量
    pub capacity: f64,
    /// 每秒补充的令牌数
    pub refill_rate: f64,
    /// 可选的突发上限，不超过容量
    pub burst: Option<f64>,
}

impl Default for RateLimitSettings {
    fn default() -> Self {
        Self {
            capacity: 5.0,
            refill_rate: 1.0,
            burst: None,
        }
    }
}

/// 重试配置设置
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RetrySettings {
    /// 最大尝试次数（含首次）
    pub max_attempts: u32,
    /// 初始退避时间（毫秒）
    pub backoff_base_ms: u64,
    /// 随机抖动上限（毫秒）
    pub backoff_jitter_ms: u64,
    /// 最大退避时间（毫秒）
    pub backoff_max_ms: u64,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff_base_ms: 1000,
            backoff_jitter_ms: 100,
            backoff_max_ms: 60_000,
        }
    }
}

/// 代理健康度配置设置
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ProxyHealthSettings {
    /// EWMA 平滑系数
    pub ewma_alpha: f64,
    /// 进入冷却前允许的连续失败次数
    pub failure_threshold: u32,
    /// 首次冷却时长（秒），之后每轮翻倍
    pub cooldown_base_secs: u64,
    /// 冷却时长上限（秒）
    pub cooldown_max_secs: u64,
    /// 冷却轮数上限，超过后代理被标记为 DEAD
    pub max_cooldown_cycles: u32,
    /// 延迟采样窗口大小
    pub latency_window: usize,
}

impl Default for ProxyHealthSettings {
    fn default() -> Self {
        Self {
            ewma_alpha: 0.2,
            failure_threshold: 3,
            cooldown_base_secs: 30,
            cooldown_max_secs: 600,
            max_cooldown_cycles: 3,
            latency_window: 20,
        }
    }
}

/// 渲染器配置设置
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RendererSettings {
    /// 是否启用无头浏览器渲染
    pub enabled: bool,
    /// 远程 Chrome 调试地址，为空时在本地启动浏览器
    pub remote_debugging_url: Option<String>,
    /// 可见文本少于该长度时视为需要 JavaScript 渲染
    pub min_text_length: usize,
}

impl Default for RendererSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            remote_debugging_url: None,
            min_text_length: 100,
        }
    }
}

/// User-Agent 轮换方式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum UserAgentRotation {
    Random,
    RoundRobin,
}

/// User-Agent 配置设置
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct UserAgentSettings {
    pub rotation: UserAgentRotation,
}

impl Default for UserAgentSettings {
    fn default() -> Self {
        Self {
            rotation: UserAgentRotation::Random,
        }
    }
}

/// 拒绝规则：某字段命中正则即视为伪造数据
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct RejectPatternSettings {
    /// 规则分类名，出现在违规描述中
    pub category: String,
    /// 被检查的字段
    pub field: String,
    /// 正则表达式（大小写不敏感）
    pub pattern: String,
}

impl RejectPatternSettings {
    fn new(category: &str, field: &str, pattern: &str) -> Self {
        Self {
            category: category.to_string(),
            field: field.to_string(),
            pattern: pattern.to_string(),
        }
    }
}

/// 数据校验配置设置
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ValidatorSettings {
    /// 严格模式：存在无效记录时调用方必须阻止导出
    pub strict_mode: bool,
    /// 必填字段
    pub required_fields: Vec<String>,
    /// 认可的数据来源（大小写敏感）
    pub approved_sources: Vec<String>,
    /// 拒绝规则
    pub reject_patterns: Vec<RejectPatternSettings>,
    /// 必须为 true 的验证标记
    pub required_verification_flags: Vec<String>,
    /// 数据来源中出现即视为伪造数据的标记
    pub prohibited_source_markers: Vec<String>,
    /// 低于该置信度时产生警告
    pub min_confidence: u8,
    /// 验证日期超过该天数时产生警告
    pub max_age_days: i64,
}

impl Default for ValidatorSettings {
    fn default() -> Self {
        let company = |p: &str| RejectPatternSettings::new("templated_company_name", "company_name", p);
        let email = |p: &str| RejectPatternSettings::new("placeholder_email", "email", p);
        let phone = |p: &str| RejectPatternSettings::new("sentinel_phone", "phone", p);
        let website = |p: &str| RejectPatternSettings::new("placeholder_website", "website", p);

        Self {
            strict_mode: true,
            required_fields: ["company_name", "website", "data_source", "verified_date"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            approved_sources: [
                "Apollo.io API",
                "ZoomInfo",
                "LinkedIn Sales Navigator",
                "LinkedIn Manual Research",
                "Manual Research",
                "Manual Website Research",
                "Google Places API",
                "Hunter.io",
                "Clearbit",
                "Yellow Pages Verified",
                "Yelp Verified",
                "BBB Directory",
                "Chamber of Commerce",
                "Industry Association Directory",
                "Secretary of State Registry",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            reject_patterns: vec![
                company(r"Solutions Inc\.?$"),
                company(r"Capital$"),
                company(r"Group$"),
                company(r"Partners$"),
                company(r"^Global "),
                company(r"^(Premier|Apex|Zenith|Summit|Vanguard|Pinnacle|Sterling|Quantum)\b"),
                company(r"^\w+\s+(Solutions|Consulting|Advisors|Technologies)$"),
                email(r"@(example|test|demo|sample|mock)\.com$"),
                phone(r"^\(555\)"),
                phone(r"^555-"),
                phone(r"^\+1-555-"),
                phone(r"^123-456-"),
                website(r"^https?://(www\.)?(example|test|demo|sample|mock)\."),
                website(r"\.example\.com/?$"),
            ],
            required_verification_flags: vec!["verified_website".to_string()],
            prohibited_source_markers: ["demo", "mock", "test", "sample", "generated", "simulated", "fake"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            min_confidence: 70,
            max_age_days: 180,
        }
    }
}

/// 指标导出配置设置
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct MetricsSettings {
    /// Prometheus 导出监听地址，为空时不安装导出器
    pub exporter_addr: Option<String>,
}

impl Settings {
    /// 创建新的配置实例
    ///
    /// 依次合并内置默认值、`config/default`、`config/{APP_ENVIRONMENT}`
    /// 以及 `SCRAPEMASTER__` 前缀的环境变量
    ///
    /// # Returns
    ///
    /// * `Ok(Settings)` - 成功加载的配置
    /// * `Err(ConfigError)` - 配置加载失败
    pub fn new() -> Result<Self, ConfigError> {
        let env = std::env::var("APP_ENVIRONMENT").unwrap_or_else(|_| "default".to_string());
        let builder = Config::builder()
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name(&format!("config/{}", env)).required(false))
            .add_source(
                Environment::with_prefix("SCRAPEMASTER")
                    .separator("__")
                    .try_parsing(true)
                    .list_separator(",")
                    .with_list_parse_key("proxies"),
            );

        builder.build()?.try_deserialize()
    }

    /// 从 TOML 文本加载配置，未出现的键取默认值
    pub fn from_toml_str(toml: &str) -> Result<Self, ConfigError> {
        Config::builder()
            .add_source(File::from_str(toml, FileFormat::Toml))
            .build()?
            .try_deserialize()
    }
}

#[cfg(test)]
#[path = "settings_test.rs"]
mod tests;
