// ==========================================
// 混凝土配方治理引擎 - 配置管理器
// ==========================================
// 职责: 配置加载、查询、覆写管理
// 存储: config_kv 表 (key-value + scope)
// ==========================================

use crate::config::governance_config_trait::{ConfigResult, GovernanceConfigReader};
use crate::db::open_sqlite_connection;
use async_trait::async_trait;
use rusqlite::{params, Connection};
use serde_json::json;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

const GLOBAL_SCOPE: &str = "global";

// ==========================================
// ConfigManager - 配置管理器
// ==========================================
pub struct ConfigManager {
    conn: Arc<Mutex<Connection>>,
}

impl ConfigManager {
    /// 创建新的 ConfigManager 实例
    ///
    /// # 参数
    /// - db_path: 数据库文件路径
    pub fn new(db_path: &str) -> ConfigResult<Self> {
        let conn = open_sqlite_connection(db_path)?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// 从已有连接创建 ConfigManager
    ///
    /// 说明：为保证连接行为一致，会对传入连接再次应用统一 PRAGMA（幂等）。
    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> ConfigResult<Self> {
        {
            let conn_guard = conn.lock().map_err(|e| format!("锁获取失败: {}", e))?;
            crate::db::configure_sqlite_connection(&conn_guard)?;
        }

        Ok(Self { conn })
    }

    /// 从 config_kv 表读取配置值（scope_id='global'）
    ///
    /// # 返回
    /// - Some(String): 配置值
    /// - None: 配置不存在
    fn get_config_value(&self, key: &str) -> ConfigResult<Option<String>> {
        let conn = self.conn.lock().map_err(|e| format!("锁获取失败: {}", e))?;

        let result = conn.query_row(
            "SELECT value FROM config_kv WHERE scope_id = ?1 AND key = ?2",
            params![GLOBAL_SCOPE, key],
            |row| row.get::<_, String>(0),
        );

        match result {
            Ok(value) => Ok(Some(value)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(Box::new(e)),
        }
    }

    /// 读取 global scope 的配置值（公开方法，供其他模块复用）
    pub fn get_global_config_value(&self, key: &str) -> ConfigResult<Option<String>> {
        self.get_config_value(key)
    }

    /// 写入 global scope 的配置值（存在则覆盖）
    pub fn set_global_config_value(&self, key: &str, value: &str) -> ConfigResult<()> {
        let conn = self.conn.lock().map_err(|e| format!("锁获取失败: {}", e))?;
        conn.execute(
            "INSERT INTO config_kv (scope_id, key, value) VALUES (?1, ?2, ?3)
             ON CONFLICT(scope_id, key) DO UPDATE SET value = ?3, updated_at = datetime('now')",
            params![GLOBAL_SCOPE, key, value],
        )?;
        Ok(())
    }

    /// 读取正整数配置；缺失或格式错误时使用默认值
    fn get_positive_or_default(&self, key: &str, default: u64) -> ConfigResult<u64> {
        let parsed = self
            .get_config_value(key)?
            .and_then(|raw| raw.trim().parse::<u64>().ok())
            .filter(|v| *v > 0);

        if parsed.is_none() {
            tracing::debug!(config_key = key, default, "使用默认配置值");
        }
        Ok(parsed.unwrap_or(default))
    }

    /// 获取所有配置的快照（JSON格式）
    ///
    /// # 用途
    /// - 记录保存批次执行时的参数口径，便于排查
    pub fn get_config_snapshot(&self) -> ConfigResult<String> {
        let conn = self.conn.lock().map_err(|e| format!("锁获取失败: {}", e))?;

        let mut stmt = conn.prepare("SELECT key, value FROM config_kv WHERE scope_id = ?1 ORDER BY key")?;

        let mut config_map: HashMap<String, String> = HashMap::new();
        let rows = stmt.query_map(params![GLOBAL_SCOPE], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?;

        for row in rows {
            let (key, value) = row?;
            config_map.insert(key, value);
        }

        let json_value = json!(config_map);
        Ok(serde_json::to_string(&json_value)?)
    }
}

#[async_trait]
impl GovernanceConfigReader for ConfigManager {
    // ===== 分块大小 =====

    async fn get_material_quantity_chunk_size(&self) -> ConfigResult<usize> {
        Ok(self.get_positive_or_default(config_keys::MATERIAL_QUANTITY_CHUNK_SIZE, 200)? as usize)
    }

    async fn get_material_detail_chunk_size(&self) -> ConfigResult<usize> {
        Ok(self.get_positive_or_default(config_keys::MATERIAL_DETAIL_CHUNK_SIZE, 100)? as usize)
    }

    async fn get_version_lookup_chunk_size(&self) -> ConfigResult<usize> {
        Ok(self.get_positive_or_default(config_keys::VERSION_LOOKUP_CHUNK_SIZE, 200)? as usize)
    }

    // ===== 材料写入重试 =====

    async fn get_materials_retry_max_attempts(&self) -> ConfigResult<u32> {
        Ok(self.get_positive_or_default(config_keys::MATERIALS_RETRY_MAX_ATTEMPTS, 3)? as u32)
    }

    async fn get_materials_retry_base_delay_ms(&self) -> ConfigResult<u64> {
        self.get_positive_or_default(config_keys::MATERIALS_RETRY_BASE_DELAY_MS, 500)
    }

    // ===== 缓存 =====

    async fn get_catalog_cache_ttl_secs(&self) -> ConfigResult<u64> {
        self.get_positive_or_default(config_keys::CATALOG_CACHE_TTL_SECS, 300)
    }
}

// ==========================================
// 配置键常量
// ==========================================
pub mod config_keys {
    // 批量查询分块（IN 子句上限）
    pub const MATERIAL_QUANTITY_CHUNK_SIZE: &str = "material_quantity_chunk_size";
    pub const MATERIAL_DETAIL_CHUNK_SIZE: &str = "material_detail_chunk_size";
    pub const VERSION_LOOKUP_CHUNK_SIZE: &str = "version_lookup_chunk_size";

    // 材料写入重试
    pub const MATERIALS_RETRY_MAX_ATTEMPTS: &str = "materials_retry_max_attempts";
    pub const MATERIALS_RETRY_BASE_DELAY_MS: &str = "materials_retry_base_delay_ms";

    // 材料目录缓存
    pub const CATALOG_CACHE_TTL_SECS: &str = "catalog_cache_ttl_secs";
}
