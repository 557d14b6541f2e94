// ==========================================
// 混凝土配方治理引擎 - 引擎层仓储聚合
// ==========================================
// 职责: 聚合持久化引擎与治理报告所需的所有 Repository
// ==========================================

use std::sync::{Arc, Mutex};

use rusqlite::Connection;

use crate::repository::{
    MasterRecipeRepository, MaterialCatalogRepository, MaterialQuantityRepository,
    RecipeVariantRepository, RecipeVersionRepository,
};

/// 配方仓储集合
///
/// # 包含的仓储
/// - `master_repo`: 主配方
/// - `variant_repo`: 变体（recipe 表）
/// - `version_repo`: 版本
/// - `quantity_repo`: 干料 / SSS 用量
/// - `catalog_repo`: 工厂与材料目录
#[derive(Clone)]
pub struct RecipeRepositories {
    pub master_repo: Arc<MasterRecipeRepository>,
    pub variant_repo: Arc<RecipeVariantRepository>,
    pub version_repo: Arc<RecipeVersionRepository>,
    pub quantity_repo: Arc<MaterialQuantityRepository>,
    pub catalog_repo: Arc<MaterialCatalogRepository>,
}

impl RecipeRepositories {
    /// 基于同一共享连接创建全部仓储
    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> Self {
        Self {
            master_repo: Arc::new(MasterRecipeRepository::new(conn.clone())),
            variant_repo: Arc::new(RecipeVariantRepository::new(conn.clone())),
            version_repo: Arc::new(RecipeVersionRepository::new(conn.clone())),
            quantity_repo: Arc::new(MaterialQuantityRepository::new(conn.clone())),
            catalog_repo: Arc::new(MaterialCatalogRepository::new(conn)),
        }
    }
}
