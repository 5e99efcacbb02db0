// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::config::settings::ValidatorSettings;
use crate::domain::models::prospect::ProspectRecord;
use crate::domain::models::validation::{RecordValidation, ValidationReport, ValidationSummary};
use crate::utils::errors::ValidatorError;
use chrono::{DateTime, NaiveDate, Utc};
use regex::{Regex, RegexBuilder};
use std::collections::HashSet;
use tracing::{info, warn};

/// 每条警告扣除的置信度
const WARNING_PENALTY: u8 = 10;

/// 编译后的拒绝规则
#[derive(Debug, Clone)]
struct RejectRule {
    category: String,
    field: String,
    pattern: String,
    regex: Regex,
}

/// 数据校验服务
///
/// 只做报告，不做拦截：是否阻止导出由调用方根据 `strict_mode` 决定。
#[derive(Debug, Clone)]
pub struct ValidationService {
    required_fields: Vec<String>,
    rules: Vec<RejectRule>,
    required_flags: Vec<String>,
    approved_sources: HashSet<String>,
    prohibited_markers: Vec<String>,
    min_confidence: u8,
    max_age_days: i64,
    strict_mode: bool,
}

impl ValidationService {
    /// 创建校验服务
    ///
    /// # 参数
    ///
    /// * `settings` - 校验配置，拒绝规则在此编译（大小写不敏感）
    ///
    /// # 返回值
    ///
    /// * `Err(ValidatorError::InvalidPattern)` - 存在无法编译的正则
    pub fn new(settings: &ValidatorSettings) -> Result<Self, ValidatorError> {
        let rules = settings
            .reject_patterns
            .iter()
            .map(|p| {
                RegexBuilder::new(&p.pattern)
                    .case_insensitive(true)
                    .build()
                    .map(|regex| RejectRule {
                        category: p.category.clone(),
                        field: p.field.clone(),
                        pattern: p.pattern.clone(),
                        regex,
                    })
                    .map_err(|source| ValidatorError::InvalidPattern {
                        category: p.category.clone(),
                        field: p.field.clone(),
                        source,
                    })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            required_fields: settings.required_fields.clone(),
            rules,
            required_flags: settings.required_verification_flags.clone(),
            approved_sources: settings.approved_sources.iter().cloned().collect(),
            prohibited_markers: settings
                .prohibited_source_markers
                .iter()
                .map(|m| m.to_lowercase())
                .collect(),
            min_confidence: settings.min_confidence,
            max_age_days: settings.max_age_days,
            strict_mode: settings.strict_mode,
        })
    }

    pub fn strict_mode(&self) -> bool {
        self.strict_mode
    }

    /// 校验单条记录
    ///
    /// # 返回值
    ///
    /// (是否有效, 违规列表)
    pub fn validate(&self, record: &ProspectRecord) -> (bool, Vec<String>) {
        let result = self.validate_record(0, record, Utc::now().date_naive());
        (result.is_valid, result.violations)
    }

    /// 按指定日期校验单条记录，返回完整结果（含警告与置信度）
    pub fn validate_record(
        &self,
        index: usize,
        record: &ProspectRecord,
        today: NaiveDate,
    ) -> RecordValidation {
        let mut violations = Vec::new();

        // 1. Required fields
        for field in &self.required_fields {
            if record.get(field).is_none_or(|v| v.trim().is_empty()) {
                violations.push(format!("missing required field: {}", field));
            }
        }

        // 2. Reject patterns
        for rule in &self.rules {
            let Some(value) = record.get(&rule.field) else {
                continue;
            };
            if rule.regex.is_match(value.trim()) {
                violations.push(format!(
                    "{} matches rejected {} pattern '{}' (value: '{}')",
                    rule.field, rule.category, rule.pattern, value
                ));
            }
        }

        // 3. Verification flags
        for flag in &self.required_flags {
            if !record.flag(flag) {
                violations.push(format!("verification flag '{}' is not set", flag));
            }
        }

        // 4. Source allowlist
        if let Some(source) = record.data_source.as_deref().filter(|s| !s.trim().is_empty()) {
            if !self.approved_sources.contains(source) {
                match self.prohibited_marker(source) {
                    Some(marker) => violations.push(format!(
                        "prohibited data_source '{}' (contains '{}')",
                        source, marker
                    )),
                    None => violations.push(format!("unapproved data_source '{}'", source)),
                }
            }
        } else if !self.required_fields.iter().any(|f| f == "data_source") {
            violations.push("unspecified data_source".to_string());
        }

        let warnings = self.warnings(record, today);
        let is_valid = violations.is_empty();
        let confidence = if is_valid {
            record
                .verification_confidence
                .min(100)
                .saturating_sub(WARNING_PENALTY.saturating_mul(warnings.len() as u8))
        } else {
            0
        };

        RecordValidation {
            index,
            company: record.company_name().to_string(),
            is_valid,
            violations,
            warnings,
            confidence,
        }
    }

    fn prohibited_marker(&self, source: &str) -> Option<&str> {
        let lowered = source.to_lowercase();
        self.prohibited_markers
            .iter()
            .find(|m| lowered.contains(m.as_str()))
            .map(String::as_str)
    }

    fn warnings(&self, record: &ProspectRecord, today: NaiveDate) -> Vec<String> {
        let mut warnings = Vec::new();

        if let Some(raw) = record.verified_date.as_deref().filter(|s| !s.trim().is_empty()) {
            match parse_date(raw) {
                Some(date) => {
                    let age = (today - date).num_days();
                    if age > self.max_age_days {
                        warnings.push(format!(
                            "data is {} days old (verified {}), consider re-verifying",
                            age, raw
                        ));
                    }
                }
                None => warnings.push(format!("invalid verified_date format: '{}'", raw)),
            }
        }

        if record.verification_confidence < self.min_confidence {
            warnings.push(format!(
                "low verification confidence: {}/100",
                record.verification_confidence
            ));
        }

        let missing: Vec<&str> = ["contact_name", "contact_email", "contact_title"]
            .into_iter()
            .filter(|f| record.get(f).is_none_or(|v| v.trim().is_empty()))
            .collect();
        if !missing.is_empty() {
            warnings.push(format!(
                "incomplete contact information: missing {}",
                missing.join(", ")
            ));
        }

        warnings
    }

    /// 校验整个数据集
    ///
    /// 单条记录的问题只体现在报告中，从不返回错误。
    pub fn validate_dataset(&self, records: &[ProspectRecord]) -> ValidationReport {
        self.validate_dataset_at(records, Utc::now().date_naive())
    }

    pub fn validate_dataset_at(
        &self,
        records: &[ProspectRecord],
        today: NaiveDate,
    ) -> ValidationReport {
        let results: Vec<RecordValidation> = records
            .iter()
            .enumerate()
            .map(|(i, r)| self.validate_record(i, r, today))
            .collect();

        let total = results.len();
        let valid = results.iter().filter(|r| r.is_valid).count();
        let invalid = total - valid;
        let has_prohibited_data = results.iter().any(|r| {
            r.violations
                .iter()
                .any(|v| v.starts_with("prohibited") || v.contains("matches rejected"))
        });

        metrics::counter!("validator_records_total", "valid" => "true").increment(valid as u64);
        metrics::counter!("validator_records_total", "valid" => "false").increment(invalid as u64);

        if invalid > 0 {
            warn!(total, valid, invalid, strict_mode = self.strict_mode, "Dataset validation found invalid records");
        } else {
            info!(total, "Dataset validation passed");
        }

        let percent = |n: usize| {
            if total == 0 {
                0.0
            } else {
                n as f64 * 100.0 / total as f64
            }
        };

        ValidationReport {
            total,
            valid,
            invalid,
            summary: ValidationSummary {
                pass_rate: percent(valid),
                error_rate: percent(invalid),
                has_prohibited_data,
            },
            records: results,
            strict_mode: self.strict_mode,
        }
    }

    /// 只保留有效记录
    pub fn enforce_policy(&self, records: Vec<ProspectRecord>) -> Vec<ProspectRecord> {
        let today = Utc::now().date_naive();
        let before = records.len();
        let kept: Vec<ProspectRecord> = records
            .into_iter()
            .enumerate()
            .filter(|(i, r)| self.validate_record(*i, r, today).is_valid)
            .map(|(_, r)| r)
            .collect();

        if kept.len() < before {
            warn!(rejected = before - kept.len(), kept = kept.len(), "Dropped records that failed validation");
        }
        kept
    }
}

fn parse_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .or_else(|| DateTime::parse_from_rfc3339(raw).ok().map(|dt| dt.date_naive()))
}

#[cfg(test)]
#[path = "validation_service_test.rs"]
mod tests;
