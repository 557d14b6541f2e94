// ==========================================
// 混凝土配方治理引擎 - 配方领域模型
// ==========================================
// 主配方 (master_recipe) → 变体 (recipe) → 版本 (recipe_version)
// 红线: 版本只追加不删除，材料行只插入不更新
// ==========================================

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::domain::types::{AgeUnit, PlacementType, RecipeType};

// ==========================================
// RecipeSpecification - 配方规格（值对象）
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecipeSpecification {
    pub strength_fc: f64,              // 设计强度 f'c
    pub age_value: i32,                // 龄期数值
    pub age_unit: AgeUnit,             // 龄期单位
    pub placement_type: PlacementType, // 浇筑方式
    pub max_aggregate_size: f64,       // 最大骨料粒径 (mm)
    pub slump: f64,                    // 坍落度 (cm)
    pub recipe_type: RecipeType,       // FC / MR
    pub application_type: String,      // 应用类型 (standard / pavimento ...)
    pub has_waterproofing: bool,       // 是否防水
    pub performance_grade: String,     // 性能等级
}

impl RecipeSpecification {
    /// 核心规格是否相同（冲突判定口径）
    ///
    /// 强度、浇筑方式、骨料粒径、坍落度精确相等，且龄期同单位同数值。
    pub fn same_core_spec(&self, other: &RecipeSpecification) -> bool {
        self.strength_fc == other.strength_fc
            && self.placement_type == other.placement_type
            && self.max_aggregate_size == other.max_aggregate_size
            && self.slump == other.slump
            && self.age_unit == other.age_unit
            && self.age_value == other.age_value
    }

    /// 数值字段合法性（有限且非负）
    ///
    /// # 返回
    /// - Ok(()): 合法
    /// - Err(field): 第一个不合法的字段名
    pub fn check_numeric(&self) -> Result<(), &'static str> {
        let fields: [(&'static str, f64); 3] = [
            ("strength_fc", self.strength_fc),
            ("max_aggregate_size", self.max_aggregate_size),
            ("slump", self.slump),
        ];
        for (name, value) in fields {
            if !value.is_finite() || value < 0.0 {
                return Err(name);
            }
        }
        if self.age_value < 0 {
            return Err("age_value");
        }
        Ok(())
    }
}

// ==========================================
// MasterRecipe - 主配方
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MasterRecipe {
    pub master_id: String,
    pub plant_id: String,
    pub master_code: String,
    pub strength_fc: f64,
    pub age_value: i32,
    pub age_unit: AgeUnit,
    pub placement_type: PlacementType,
    pub max_aggregate_size: f64,
    pub slump: f64,
    pub is_active: bool,
    pub created_at: NaiveDateTime,
}

// ==========================================
// RecipeVariant - 配方变体（recipe 表）
// ==========================================
// master_recipe_id 为空表示未纳入治理的旧配方
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecipeVariant {
    pub recipe_id: String,
    pub plant_id: String,
    pub recipe_code: String,
    pub master_recipe_id: Option<String>,
    pub variant_suffix: Option<String>,
    pub spec: RecipeSpecification,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

// ==========================================
// RecipeVersion - 配方版本
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecipeVersion {
    pub version_id: String,
    pub recipe_id: String,
    pub version_number: i32,
    pub is_current: bool,
    pub notes: Option<String>,
    pub created_at: NaiveDateTime,
}

impl RecipeVersion {
    /// 按时间比较"更新"：created_at 优先，同时刻取更大的版本号
    pub fn is_newer_than(&self, other: &RecipeVersion) -> bool {
        (self.created_at, self.version_number) > (other.created_at, other.version_number)
    }
}
