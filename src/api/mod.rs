// ==========================================
// 混凝土配方治理引擎 - API 层
// ==========================================
// 职责: 对外业务接口，供宿主应用调用
// ==========================================

pub mod error;
pub mod recipe_api;

// 重导出核心类型
pub use error::{ApiError, ApiResult};
pub use recipe_api::RecipeApi;
