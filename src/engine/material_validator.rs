// ==========================================
// 混凝土配方治理引擎 - 材料组成校验
// ==========================================
// 规则（按序，互不短路）:
// 1. 空组成 → too_few_materials（仅此一条）
// 2. 材料数 ≤ 3 → too_few_materials（始终 warning）
// 3. 缺水泥 → missing_cement
// 4. 水泥用量 ≤ 0 或缺失 → invalid_quantities
// 5. 缺水 → missing_water
// 6. 水用量 ≤ 0 或缺失 → invalid_quantities
// 7. 任一用量 ≤ 0 → 汇总 invalid_quantities
// 等级: 报价所用变体为 error，其余为 warning（规则 2 除外）
// ==========================================

use crate::domain::governance::ValidationIssue;
use crate::domain::material::ValidationEntry;
use crate::domain::types::{IssueSeverity, IssueType, MaterialRole};
use crate::i18n::{t, t_with_args};

/// 少于等于该数量的组成视为材料过少
pub const MIN_TYPICAL_MATERIALS: usize = 3;

/// 用量缺失（NaN）按 0 处理
fn is_invalid_quantity(quantity: f64) -> bool {
    quantity.is_nan() || quantity <= 0.0
}

// ==========================================
// MaterialValidator - 材料组成校验器（无状态）
// ==========================================
pub struct MaterialValidator;

impl MaterialValidator {
    /// 校验一组材料
    ///
    /// # 参数
    /// - materials: 版本的材料条目（角色已解析）
    /// - is_active_for_quoting: 是否为报价系统实际选用的变体
    pub fn validate(materials: &[ValidationEntry], is_active_for_quoting: bool) -> Vec<ValidationIssue> {
        let severity = if is_active_for_quoting {
            IssueSeverity::Error
        } else {
            IssueSeverity::Warning
        };
        let detail = |text: String| -> Option<String> {
            if is_active_for_quoting {
                Some(format!("{} {}", text, t("validation.quote_builder_note")))
            } else {
                Some(text)
            }
        };

        let mut issues = Vec::new();

        if materials.is_empty() {
            issues.push(ValidationIssue {
                issue_type: IssueType::TooFewMaterials,
                severity,
                message: t("validation.no_materials"),
                detail: detail(t("validation.no_materials_detail")),
            });
            return issues;
        }

        if materials.len() <= MIN_TYPICAL_MATERIALS {
            issues.push(ValidationIssue {
                issue_type: IssueType::TooFewMaterials,
                severity: IssueSeverity::Warning,
                message: t_with_args(
                    "validation.too_few_materials",
                    &[("count", &materials.len().to_string())],
                ),
                detail: Some(t("validation.too_few_materials_detail")),
            });
        }

        match materials.iter().find(|m| m.role == MaterialRole::Cement) {
            None => issues.push(ValidationIssue {
                issue_type: IssueType::MissingCement,
                severity,
                message: t("validation.missing_cement"),
                detail: detail(t("validation.missing_cement_detail")),
            }),
            Some(cement) if is_invalid_quantity(cement.quantity) => issues.push(ValidationIssue {
                issue_type: IssueType::InvalidQuantities,
                severity,
                message: t_with_args(
                    "validation.invalid_cement",
                    &[("qty", &format!("{:.2}", cement.quantity)), ("unit", &cement.unit)],
                ),
                detail: detail(cement.name.clone()),
            }),
            Some(_) => {}
        }

        match materials.iter().find(|m| m.role == MaterialRole::Water) {
            None => issues.push(ValidationIssue {
                issue_type: IssueType::MissingWater,
                severity,
                message: t("validation.missing_water"),
                detail: detail(t("validation.missing_water_detail")),
            }),
            Some(water) if is_invalid_quantity(water.quantity) => issues.push(ValidationIssue {
                issue_type: IssueType::InvalidQuantities,
                severity,
                message: t_with_args(
                    "validation.invalid_water",
                    &[("qty", &format!("{:.2}", water.quantity)), ("unit", &water.unit)],
                ),
                detail: detail(water.name.clone()),
            }),
            Some(_) => {}
        }

        let offenders: Vec<&str> = materials
            .iter()
            .filter(|m| is_invalid_quantity(m.quantity))
            .map(|m| m.name.as_str())
            .collect();
        if !offenders.is_empty() {
            issues.push(ValidationIssue {
                issue_type: IssueType::InvalidQuantities,
                severity,
                message: t_with_args(
                    "validation.invalid_quantities",
                    &[("count", &offenders.len().to_string())],
                ),
                detail: detail(offenders.join(", ")),
            });
        }

        issues
    }
}
