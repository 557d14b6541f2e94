// ==========================================
// 混凝土配方治理引擎 - 治理报告模型
// ==========================================
// 只读诊断: 主配方 → 变体状态 → 材料校验问题 → 汇总
// ==========================================

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::domain::material::ValidationEntry;
use crate::domain::types::{IssueSeverity, IssueType, VariantStatus};

// ==========================================
// ValidationIssue - 材料校验问题
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationIssue {
    #[serde(rename = "type")]
    pub issue_type: IssueType,
    pub severity: IssueSeverity,
    pub message: String,
    pub detail: Option<String>,
}

impl ValidationIssue {
    pub fn is_error(&self) -> bool {
        self.severity == IssueSeverity::Error
    }
}

// ==========================================
// 版本快照（报告内使用）
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VersionSnapshot {
    pub version_id: String,
    pub version_number: i32,
    pub created_at: NaiveDateTime,
    pub is_current: bool,
}

// ==========================================
// VariantVersionStatus - 单个变体的治理状态
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VariantVersionStatus {
    pub variant_id: String,
    pub recipe_code: String,
    pub variant_suffix: Option<String>,
    pub latest_version: Option<VersionSnapshot>,
    pub current_flagged_count: usize,
    pub materials: Vec<ValidationEntry>,
    pub status: VariantStatus,
    pub is_quote_builder_variant: bool,
    pub validation_issues: Vec<ValidationIssue>,
}

// ==========================================
// 汇总
// ==========================================
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GovernanceSummary {
    pub total_variants: usize,
    pub up_to_date_count: usize,
    pub outdated_count: usize,
    pub no_version_count: usize,
    pub inconsistent_count: usize,
    pub validation_errors: usize,
    pub validation_warnings: usize,
}

impl GovernanceSummary {
    pub fn from_variants(variants: &[VariantVersionStatus]) -> Self {
        let count = |status: VariantStatus| variants.iter().filter(|v| v.status == status).count();
        let issues = variants.iter().flat_map(|v| v.validation_issues.iter());
        let (errors, warnings) = issues.fold((0, 0), |(e, w), issue| {
            if issue.is_error() {
                (e + 1, w)
            } else {
                (e, w + 1)
            }
        });

        Self {
            total_variants: variants.len(),
            up_to_date_count: count(VariantStatus::UpToDate),
            outdated_count: count(VariantStatus::Outdated),
            no_version_count: count(VariantStatus::NoVersion),
            inconsistent_count: count(VariantStatus::Inconsistent),
            validation_errors: errors,
            validation_warnings: warnings,
        }
    }
}

// ==========================================
// MasterGovernanceData - 单个主配方的治理数据
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MasterGovernanceData {
    pub master_id: String,
    pub master_code: String,
    pub strength_fc: f64,
    pub placement_type: String,
    pub slump: f64,
    pub max_aggregate_size: f64,
    pub quote_builder_variant_id: Option<String>,
    pub variants: Vec<VariantVersionStatus>,
    pub summary: GovernanceSummary,
}
