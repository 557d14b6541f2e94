// ==========================================
// 混凝土配方治理引擎 - 治理配置读取 Trait
// ==========================================
// 职责: 定义引擎所需的配置读取接口（不包含实现）
// 红线: 不包含配置写入、不包含业务逻辑
// ==========================================

use async_trait::async_trait;
use std::error::Error;

/// 配置层 Result
pub type ConfigResult<T> = Result<T, Box<dyn Error + Send + Sync>>;

// ==========================================
// GovernanceConfigReader Trait
// ==========================================
// 实现者: ConfigManager（从 config_kv 表读取）
#[async_trait]
pub trait GovernanceConfigReader: Send + Sync {
    // ===== 分块大小 =====

    /// 治理报告按版本查询干料行的分块大小
    ///
    /// # 默认值
    /// - 200
    async fn get_material_quantity_chunk_size(&self) -> ConfigResult<usize>;

    /// 治理报告按材料ID查询目录的分块大小
    ///
    /// # 默认值
    /// - 100
    async fn get_material_detail_chunk_size(&self) -> ConfigResult<usize>;

    /// 版本号/版本列表查询的分块大小
    ///
    /// # 默认值
    /// - 200
    async fn get_version_lookup_chunk_size(&self) -> ConfigResult<usize>;

    // ===== 材料写入重试 =====

    /// 材料写入最大尝试次数（含首次）
    ///
    /// # 默认值
    /// - 3
    async fn get_materials_retry_max_attempts(&self) -> ConfigResult<u32>;

    /// 指数退避的初始间隔（毫秒）
    ///
    /// # 默认值
    /// - 500
    async fn get_materials_retry_base_delay_ms(&self) -> ConfigResult<u64>;

    // ===== 缓存 =====

    /// 材料目录缓存 TTL（秒）
    ///
    /// # 默认值
    /// - 300
    async fn get_catalog_cache_ttl_secs(&self) -> ConfigResult<u64>;
}
