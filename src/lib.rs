// ==========================================
// 混凝土配方治理引擎 - 核心库
// ==========================================
// 技术栈: Rust + SQLite
// 系统定位: 配方编码、变体决策、版本持久化与治理诊断
// 分层: domain → repository → engine → api → app
// ==========================================

// 初始化国际化系统（操作员默认西班牙语）
rust_i18n::i18n!("locales", fallback = "es-MX");

// ==========================================
// 模块声明
// ==========================================

// 领域层 - 实体与类型
pub mod domain;

// 数据仓储层 - 数据访问
pub mod repository;

// 引擎层 - 业务规则
pub mod engine;

// 配置层 - 系统配置
pub mod config;

// 数据库基础设施（连接初始化/PRAGMA/schema）
pub mod db;

// 日志系统
pub mod logging;

// 性能观测（SQL 计数/慢 SQL）
pub mod perf;

// 国际化
pub mod i18n;

// API 层 - 业务接口
pub mod api;

// 应用层 - 组合根
pub mod app;

// ==========================================
// 重导出核心类型
// ==========================================

// 领域类型
pub use domain::types::{AgeUnit, MaterialRole, PlacementType, RecipeType, VariantStatus};

// 领域实体
pub use domain::{
    MasterGovernanceData, MasterRecipe, OperatorDecision, PersistOutcome, RecipeDraft,
    RecipeSpecification, RecipeVariant, RecipeVersion, RetryTarget, SaveBatch,
};

// 引擎
pub use engine::{
    DecisionResolver, GovernanceReporter, MaterialValidator, RecipePersistenceEngine,
    SpecificationMatcher,
};

// API
pub use api::{ApiError, RecipeApi};

// ==========================================
// 常量定义
// ==========================================

// 系统版本
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// 系统名称
pub const APP_NAME: &str = "混凝土配方治理引擎";

// 数据库版本
pub const DB_VERSION: &str = "v0.1";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }
}
