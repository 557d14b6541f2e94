// ==========================================
// 混凝土配方治理引擎 - 保存请求与变体决策模型
// ==========================================
// 流程: 草稿 → 冲突候选 → 人工决策 → 解析结果 → 持久化结果 / 修复目标
// ==========================================

use serde::{Deserialize, Serialize};

use crate::domain::material::{MaterialLine, MaterialSelection, NewMaterialRow};
use crate::domain::recipe::{RecipeSpecification, RecipeVariant};

// ==========================================
// OperatorDecision - 人工决策
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "camelCase")]
pub enum OperatorDecision {
    /// 新建主配方 + 首个变体（版本 1）
    NewMaster,
    /// 在已有主配方下新建变体（版本 1）
    CreateVariant { master_id: String },
    /// 将已有变体视为同一配方，追加新版本（可改码）
    UpdateVariant { variant_id: String },
}

// ==========================================
// RecipeDraft - 单个待保存配方
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecipeDraft {
    pub spec: RecipeSpecification,
    pub materials: Vec<MaterialLine>,
    pub decision: Option<OperatorDecision>,
    pub code_override: Option<String>, // 人工覆盖的最终编码
    pub notes: Option<String>,
}

// ==========================================
// SaveBatch - 批量保存请求
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SaveBatch {
    pub plant_id: String,
    pub drafts: Vec<RecipeDraft>,
    pub selection: MaterialSelection,
}

// ==========================================
// 冲突候选
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchKind {
    SameSpecification, // 核心规格相同
    CodeCollision,     // 编码文本相同
    Both,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollisionCandidate {
    pub variant: RecipeVariant,
    pub master_code: Option<String>,
    pub match_kind: MatchKind,
}

impl CollisionCandidate {
    pub fn is_code_collision(&self) -> bool {
        matches!(self.match_kind, MatchKind::CodeCollision | MatchKind::Both)
    }
}

// ==========================================
// 解析后的动作
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ResolvedAction {
    NewMaster { master_code: String },
    CreateVariant { master_id: String },
    UpdateVariant {
        variant_id: String,
        previous_code: String,
    },
}

impl ResolvedAction {
    pub fn label(&self) -> &'static str {
        match self {
            ResolvedAction::NewMaster { .. } => "newMaster",
            ResolvedAction::CreateVariant { .. } => "createVariant",
            ResolvedAction::UpdateVariant { .. } => "updateVariant",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResolvedRecipe {
    pub final_code: String,
    pub variant_suffix: Option<String>,
    pub action: ResolvedAction,
    pub spec: RecipeSpecification,
    pub materials: Vec<MaterialLine>,
    pub notes: Option<String>,
}

// ==========================================
// 持久化结果
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SavedRecipe {
    pub recipe_code: String,
    pub variant_id: String,
    pub master_id: Option<String>,
    pub version_id: String,
    pub version_number: i32,
    pub action: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PersistOutcome {
    pub saved: Vec<SavedRecipe>,
    pub masters_created: usize,
    pub dry_rows: usize,
    pub reference_rows: usize,
    /// 写后校验发现的零材料版本（仅告警）
    pub empty_versions: Vec<String>,
}

// ==========================================
// RetryTarget - 材料修复目标
// ==========================================
// 配方/版本已提交但材料写入失败时，携带重放所需的全部信息
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryTarget {
    pub version_id: String,
    pub variant_id: String,
    pub recipe_code: String,
    pub dry_rows: Vec<NewMaterialRow>,
    pub reference_rows: Vec<NewMaterialRow>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RepairOutcome {
    pub updated: Vec<String>, // 已修复的 version_id
    pub skipped: Vec<String>, // 版本不存在而跳过的 version_id
    pub dry_rows: usize,
    pub reference_rows: usize,
}

// ==========================================
// CommittedState - 未能恢复时已提交的部分
// ==========================================
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CommittedState {
    pub master_ids_by_code: Vec<(String, String)>,
    pub variant_ids: Vec<String>,
    pub version_ids: Vec<String>,
}

impl CommittedState {
    pub fn is_empty(&self) -> bool {
        self.master_ids_by_code.is_empty()
            && self.variant_ids.is_empty()
            && self.version_ids.is_empty()
    }
}
