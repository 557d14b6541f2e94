// ==========================================
// 混凝土配方治理引擎 - 引擎参数快照
// ==========================================
// 启动时从配置读取一次，按值传给各引擎
// ==========================================

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::config::governance_config_trait::{ConfigResult, GovernanceConfigReader};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineSettings {
    pub material_quantity_chunk_size: usize,
    pub material_detail_chunk_size: usize,
    pub version_lookup_chunk_size: usize,
    pub materials_retry_max_attempts: u32,
    pub materials_retry_base_delay_ms: u64,
    pub catalog_cache_ttl_secs: u64,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            material_quantity_chunk_size: 200,
            material_detail_chunk_size: 100,
            version_lookup_chunk_size: 200,
            materials_retry_max_attempts: 3,
            materials_retry_base_delay_ms: 500,
            catalog_cache_ttl_secs: 300,
        }
    }
}

impl EngineSettings {
    /// 从配置读取器加载
    pub async fn load<R: GovernanceConfigReader + ?Sized>(reader: &R) -> ConfigResult<Self> {
        Ok(Self {
            material_quantity_chunk_size: reader.get_material_quantity_chunk_size().await?,
            material_detail_chunk_size: reader.get_material_detail_chunk_size().await?,
            version_lookup_chunk_size: reader.get_version_lookup_chunk_size().await?,
            materials_retry_max_attempts: reader.get_materials_retry_max_attempts().await?,
            materials_retry_base_delay_ms: reader.get_materials_retry_base_delay_ms().await?,
            catalog_cache_ttl_secs: reader.get_catalog_cache_ttl_secs().await?,
        })
    }

    pub fn retry_base_delay(&self) -> Duration {
        Duration::from_millis(self.materials_retry_base_delay_ms)
    }

    pub fn catalog_cache_ttl(&self) -> Duration {
        Duration::from_secs(self.catalog_cache_ttl_secs)
    }
}
