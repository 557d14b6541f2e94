// ==========================================
// 混凝土配方治理引擎 - 应用状态（组合根）
// ==========================================
// 职责: 打开共享连接、初始化 schema、加载配置、装配仓储/引擎/API
// 参考数据缓存 (ReferenceCache) 与时钟由这里持有并注入
// ==========================================

use std::sync::{Arc, Mutex};

use rusqlite::Connection;

use crate::api::RecipeApi;
use crate::config::{ConfigManager, EngineSettings};
use crate::domain::material::MaterialCatalog;
use crate::engine::{
    Clock, DecisionResolver, GovernanceReporter, RecipePersistenceEngine, RecipeRepositories,
    ReferenceCache, SpecificationMatcher, SystemClock,
};

/// 应用状态
///
/// 包含 API 实例和共享资源
pub struct AppState {
    /// 数据库路径
    pub db_path: String,

    /// 配方 API
    pub recipe_api: Arc<RecipeApi>,

    /// 配置管理器
    pub config_manager: Arc<ConfigManager>,

    /// 启动时的引擎参数快照
    pub settings: EngineSettings,
}

impl AppState {
    /// 创建新的AppState实例
    ///
    /// # 说明
    /// 该方法会：
    /// 1. 打开共享连接并初始化 schema
    /// 2. 从 config_kv 加载引擎参数
    /// 3. 装配 Repository / Engine / API
    pub async fn new(db_path: String) -> Result<Self, String> {
        tracing::info!(db_path = %db_path, "初始化AppState");

        let conn = crate::db::open_shared_connection(&db_path)
            .map_err(|e| format!("无法打开数据库: {}", e))?;
        {
            let guard = conn.lock().map_err(|e| format!("数据库锁获取失败: {}", e))?;
            crate::db::init_schema(&guard).map_err(|e| format!("schema 初始化失败: {}", e))?;
        }

        let config_manager = Arc::new(
            ConfigManager::from_connection(conn.clone())
                .map_err(|e| format!("配置管理器初始化失败: {}", e))?,
        );
        let settings = EngineSettings::load(config_manager.as_ref())
            .await
            .map_err(|e| format!("引擎参数加载失败: {}", e))?;
        tracing::debug!(?settings, "引擎参数已加载");

        let state = Self::with_clock(db_path, conn, config_manager, settings, Arc::new(SystemClock));
        tracing::info!("AppState初始化完成");
        Ok(state)
    }

    /// 基于已有连接与时钟装配（测试可注入手动时钟）
    pub fn with_clock(
        db_path: String,
        conn: Arc<Mutex<Connection>>,
        config_manager: Arc<ConfigManager>,
        settings: EngineSettings,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let repos = RecipeRepositories::from_connection(conn);

        let matcher = Arc::new(SpecificationMatcher::new(
            repos.variant_repo.clone(),
            repos.master_repo.clone(),
        ));
        let resolver = Arc::new(DecisionResolver::new(
            matcher.clone(),
            repos.master_repo.clone(),
            repos.variant_repo.clone(),
        ));
        let persistence = Arc::new(RecipePersistenceEngine::new(
            repos.clone(),
            resolver,
            clock.clone(),
            settings.clone(),
        ));
        let reporter = Arc::new(GovernanceReporter::new(repos.clone(), settings.clone()));
        let catalog_cache: Arc<ReferenceCache<String, MaterialCatalog>> =
            Arc::new(ReferenceCache::new(settings.catalog_cache_ttl(), clock));

        let recipe_api = Arc::new(RecipeApi::new(
            persistence,
            reporter,
            matcher,
            repos.catalog_repo.clone(),
            catalog_cache,
        ));

        Self {
            db_path,
            recipe_api,
            config_manager,
            settings,
        }
    }
}

/// 默认数据库路径
///
/// 顺序: 环境变量 RECIPE_GOV_DB_PATH → 用户数据目录 → 当前目录
pub fn get_default_db_path() -> String {
    use std::path::PathBuf;

    if let Ok(path) = std::env::var("RECIPE_GOV_DB_PATH") {
        let trimmed = path.trim();
        if !trimmed.is_empty() {
            return trimmed.to_string();
        }
    }

    let mut path = PathBuf::from("./recipe_governance.db");

    if let Some(data_dir) = dirs::data_dir() {
        let dir = data_dir.join("recipe-governance");
        // 目录创建失败时回退到当前目录
        if std::fs::create_dir_all(&dir).is_ok() {
            path = dir.join("recipe_governance.db");
        }
    }

    path.to_string_lossy().to_string()
}
