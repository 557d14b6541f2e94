// ==========================================
// 混凝土配方治理引擎 - ARKIK 编码生成
// ==========================================
// 长码: {prefix}-{fc}-{agg}-B-{age}-{slump}-{placement}-2-{variant}
// 短码: {fc}{age}{agg}{slump}{placement}
// 红线: 纯函数；非有限/负数输入直接拒绝
// ==========================================

use serde::{Deserialize, Serialize};

use crate::domain::recipe::RecipeSpecification;
use crate::domain::types::RecipeType;
use crate::engine::error::{EngineError, EngineResult};

/// 骨料分档阈值 (mm)
pub const COARSE_AGGREGATE_THRESHOLD_MM: f64 = 40.0;

/// 变体位: 含 PCE 减水剂
pub const PCE_MARKER: &str = "PCE";

const TYPE_CODE: &str = "B";
const SEGMENT_CODE: &str = "2";
const DEFAULT_VARIANT_CODE: &str = "000";

/// 生成结果
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArkikCodes {
    pub long_code: String,
    pub short_code: String,
}

/// 配方组成提示（影响变体位）
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FormulationHints {
    pub has_pce: bool,
}

impl FormulationHints {
    /// 材料名称/编码中任一包含 PCE 即视为 PCE 配方
    pub fn from_material_names<'a>(names: impl IntoIterator<Item = &'a str>) -> Self {
        let has_pce = names
            .into_iter()
            .any(|n| n.to_uppercase().contains(PCE_MARKER));
        Self { has_pce }
    }
}

/// 骨料分档（唯一口径）
pub fn aggregate_factor(max_aggregate_size: f64) -> &'static str {
    if max_aggregate_size >= COARSE_AGGREGATE_THRESHOLD_MM {
        "4"
    } else {
        "2"
    }
}

fn padded(value: f64, width: usize) -> String {
    format!("{:0width$}", value.round() as i64, width = width)
}

/// 生成长码与短码
///
/// # 参数
/// - spec: 配方规格
/// - hints: 组成提示（是否含 PCE）
///
/// # 返回
/// - Err(InvalidSpecification): 存在非有限或负数的数值字段
pub fn generate(spec: &RecipeSpecification, hints: FormulationHints) -> EngineResult<ArkikCodes> {
    spec.check_numeric()
        .map_err(|field| EngineError::InvalidSpecification {
            field: field.to_string(),
            message: "必须为有限的非负数".to_string(),
        })?;

    let fc = padded(spec.strength_fc, 3);
    let age = format!("{:02}", spec.age_value);
    let slump = padded(spec.slump, 2);
    let agg = aggregate_factor(spec.max_aggregate_size);
    let placement = spec.placement_type.code();
    let prefix = match spec.recipe_type {
        RecipeType::MR => "PAV",
        RecipeType::FC => "5",
    };
    let variant = if hints.has_pce {
        PCE_MARKER
    } else {
        DEFAULT_VARIANT_CODE
    };

    Ok(ArkikCodes {
        long_code: format!(
            "{}-{}-{}-{}-{}-{}-{}-{}-{}",
            prefix, fc, agg, TYPE_CODE, age, slump, placement, SEGMENT_CODE, variant
        ),
        short_code: format!("{}{}{}{}{}", fc, age, agg, slump, placement),
    })
}

/// 拆分主配方编码与变体后缀
///
/// 主配方编码为长码去掉最后两段，后缀为最后两段。
/// 段数不足 3 时整体视为主配方编码，后缀为空。
///
/// ```
/// use recipe_governance::engine::code_generator::split_master_and_variant;
///
/// let (master, suffix) = split_master_and_variant("5-250-2-B-28-10-D-2-000");
/// assert_eq!(master, "5-250-2-B-28-10-D");
/// assert_eq!(suffix.as_deref(), Some("2-000"));
/// ```
pub fn split_master_and_variant(code: &str) -> (String, Option<String>) {
    let parts: Vec<&str> = code.split('-').collect();
    if parts.len() < 3 {
        return (code.to_string(), None);
    }
    let cut = parts.len() - 2;
    (parts[..cut].join("-"), Some(parts[cut..].join("-")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::types::{AgeUnit, PlacementType};

    fn spec() -> RecipeSpecification {
        RecipeSpecification {
            strength_fc: 250.0,
            age_value: 28,
            age_unit: AgeUnit::Days,
            placement_type: PlacementType::Direct,
            max_aggregate_size: 20.0,
            slump: 10.0,
            recipe_type: RecipeType::FC,
            application_type: "standard".to_string(),
            has_waterproofing: false,
            performance_grade: "standard".to_string(),
        }
    }

    #[test]
    fn test_standard_fc_codes() {
        let codes = generate(&spec(), FormulationHints::default()).unwrap();
        assert_eq!(codes.long_code, "5-250-2-B-28-10-D-2-000");
        assert_eq!(codes.short_code, "25028210D");
    }

    #[test]
    fn test_pce_variant() {
        let hints = FormulationHints::from_material_names(["CEMENTO CPC 40", "ADITIVO PCE"]);
        assert!(hints.has_pce);
        let codes = generate(&spec(), hints).unwrap();
        assert!(codes.long_code.ends_with("-PCE"));
    }

    #[test]
    fn test_mr_pumped_coarse() {
        let mut s = spec();
        s.recipe_type = RecipeType::MR;
        s.placement_type = PlacementType::Pumped;
        s.max_aggregate_size = 40.0;
        s.strength_fc = 45.4;
        s.age_value = 12;
        s.age_unit = AgeUnit::Hours;
        s.slump = 8.0;
        let codes = generate(&s, FormulationHints::default()).unwrap();
        assert_eq!(codes.long_code, "PAV-045-4-B-12-08-B-2-000");
        assert_eq!(codes.short_code, "04512408B");
    }

    #[test]
    fn test_generation_is_pure() {
        let a = generate(&spec(), FormulationHints { has_pce: true }).unwrap();
        let b = generate(&spec(), FormulationHints { has_pce: true }).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_rejects_non_finite_and_negative() {
        let mut s = spec();
        s.slump = f64::INFINITY;
        assert!(matches!(
            generate(&s, FormulationHints::default()),
            Err(EngineError::InvalidSpecification { ref field, .. }) if field == "slump"
        ));
        let mut s = spec();
        s.max_aggregate_size = -20.0;
        assert!(generate(&s, FormulationHints::default()).is_err());
    }

    #[test]
    fn test_split_short_code() {
        assert_eq!(split_master_and_variant("ABC"), ("ABC".to_string(), None));
        let (master, suffix) = split_master_and_variant("PAV-045-4-B-12-08-B-2-PCE");
        assert_eq!(master, "PAV-045-4-B-12-08-B");
        assert_eq!(suffix.as_deref(), Some("2-PCE"));
    }
}
