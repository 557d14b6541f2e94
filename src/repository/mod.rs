// ==========================================
// 混凝土配方治理引擎 - 数据仓储层
// ==========================================
// 红线: Repository 不含业务逻辑
// ==========================================
// 职责: 提供数据访问接口,屏蔽数据库细节
// 约束: 所有查询使用参数化,防止 SQL 注入
// 约束: 每个批量写入自成一个事务（不跨阶段）
// ==========================================

pub mod error;
pub mod master_recipe_repo;
pub mod material_catalog_repo;
pub mod material_quantity_repo;
pub mod recipe_repo;
pub mod recipe_version_repo;

// 重导出核心仓储
pub use error::{RepositoryError, RepositoryResult};
pub use master_recipe_repo::MasterRecipeRepository;
pub use material_catalog_repo::MaterialCatalogRepository;
pub use material_quantity_repo::{MaterialQuantityRepository, VersionedRow};
pub use recipe_repo::{RecipeVariantRepository, VariantUpdate};
pub use recipe_version_repo::RecipeVersionRepository;
