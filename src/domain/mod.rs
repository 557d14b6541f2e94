// ==========================================
// 混凝土配方治理引擎 - 领域模型层
// ==========================================
// 职责: 定义领域实体、值对象、决策与报告类型
// 红线: 不含数据访问逻辑,不含引擎逻辑
// ==========================================

pub mod decision;
pub mod governance;
pub mod material;
pub mod recipe;
pub mod types;

// 重导出核心类型
pub use decision::{
    CollisionCandidate, CommittedState, MatchKind, OperatorDecision, PersistOutcome, RecipeDraft,
    RepairOutcome, ResolvedAction, ResolvedRecipe, RetryTarget, SaveBatch, SavedRecipe,
};
pub use governance::{
    GovernanceSummary, MasterGovernanceData, ValidationIssue, VariantVersionStatus,
    VersionSnapshot,
};
pub use material::{
    CatalogMaterial, MaterialCatalog, MaterialLine, MaterialQuantity, MaterialSelection,
    NewMaterialRow, ReferenceMaterial, ValidationEntry,
};
pub use recipe::{MasterRecipe, RecipeSpecification, RecipeVariant, RecipeVersion};
pub use types::{
    AgeUnit, IssueSeverity, IssueType, MaterialRole, PlacementType, RecipeType, VariantStatus,
};
