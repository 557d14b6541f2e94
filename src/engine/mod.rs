// ==========================================
// 混凝土配方治理引擎 - 引擎层
// ==========================================
// 职责: 编码生成、冲突匹配、决策解析、持久化、治理报告
// 红线: Engine 不拼 SQL，数据访问全部经由 Repository
// ==========================================

pub mod clock;
pub mod code_generator;
pub mod decision_resolver;
pub mod error;
pub mod governance;
pub mod material_validator;
pub mod persistence;
pub mod reference_cache;
pub mod repositories;
pub mod spec_matcher;

// 重导出核心引擎
pub use clock::{Clock, ManualClock, SystemClock};
pub use code_generator::{ArkikCodes, FormulationHints};
pub use decision_resolver::DecisionResolver;
pub use error::{EngineError, EngineResult};
pub use governance::GovernanceReporter;
pub use material_validator::MaterialValidator;
pub use persistence::RecipePersistenceEngine;
pub use reference_cache::ReferenceCache;
pub use repositories::RecipeRepositories;
pub use spec_matcher::{MatchReport, SpecificationMatcher};
