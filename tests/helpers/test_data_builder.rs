// ==========================================
// 测试数据构建器 - 用于集成测试
// ==========================================

#![allow(dead_code)]

use recipe_governance::domain::decision::{OperatorDecision, RecipeDraft, SaveBatch};
use recipe_governance::domain::material::{MaterialLine, MaterialSelection};
use recipe_governance::domain::recipe::RecipeSpecification;
use recipe_governance::domain::types::{AgeUnit, MaterialRole, PlacementType, RecipeType};

// ==========================================
// RecipeSpecification 构建器
// ==========================================

pub struct SpecBuilder {
    spec: RecipeSpecification,
}

impl SpecBuilder {
    /// 默认: f'c 250, 28 天, 直接浇筑, 20mm, 坍落度 10, FC
    pub fn new() -> Self {
        Self {
            spec: RecipeSpecification {
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
            },
        }
    }

    pub fn strength(mut self, fc: f64) -> Self {
        self.spec.strength_fc = fc;
        self
    }

    pub fn age(mut self, value: i32, unit: AgeUnit) -> Self {
        self.spec.age_value = value;
        self.spec.age_unit = unit;
        self
    }

    pub fn pumped(mut self) -> Self {
        self.spec.placement_type = PlacementType::Pumped;
        self
    }

    pub fn slump(mut self, slump: f64) -> Self {
        self.spec.slump = slump;
        self
    }

    pub fn build(self) -> RecipeSpecification {
        self.spec
    }
}

// ==========================================
// MaterialLine 构建
// ==========================================

pub fn line(role: MaterialRole, material_id: Option<&str>, dry: f64, sss: Option<f64>) -> MaterialLine {
    MaterialLine {
        label: format!("{:?}", role),
        material_id: material_id.map(|s| s.to_string()),
        role,
        dry_quantity: dry,
        sss_quantity: sss,
        unit: None,
    }
}

/// 标准组成: 水泥、水、砂、石（均按角色回退解析）
pub fn standard_lines() -> Vec<MaterialLine> {
    vec![
        line(MaterialRole::Cement, None, 320.0, Some(320.0)),
        line(MaterialRole::Water, None, 185.0, Some(190.0)),
        line(MaterialRole::FineAggregate, None, 780.0, Some(800.0)),
        line(MaterialRole::CoarseAggregate, None, 950.0, Some(960.0)),
    ]
}

// ==========================================
// RecipeDraft 构建器
// ==========================================

pub struct DraftBuilder {
    draft: RecipeDraft,
}

impl DraftBuilder {
    pub fn new(spec: RecipeSpecification) -> Self {
        Self {
            draft: RecipeDraft {
                spec,
                materials: standard_lines(),
                decision: None,
                code_override: None,
                notes: None,
            },
        }
    }

    pub fn materials(mut self, lines: Vec<MaterialLine>) -> Self {
        self.draft.materials = lines;
        self
    }

    pub fn with_line(mut self, line: MaterialLine) -> Self {
        self.draft.materials.push(line);
        self
    }

    pub fn decision(mut self, decision: OperatorDecision) -> Self {
        self.draft.decision = Some(decision);
        self
    }

    pub fn code(mut self, code: &str) -> Self {
        self.draft.code_override = Some(code.to_string());
        self
    }

    pub fn notes(mut self, notes: &str) -> Self {
        self.draft.notes = Some(notes.to_string());
        self
    }

    pub fn build(self) -> RecipeDraft {
        self.draft
    }
}

pub fn batch(plant_id: &str, drafts: Vec<RecipeDraft>) -> SaveBatch {
    SaveBatch {
        plant_id: plant_id.to_string(),
        drafts,
        selection: MaterialSelection::default(),
    }
}
