// ==========================================
// 混凝土配方治理引擎 - 配置层
// ==========================================
// 职责: 系统配置管理
// 存储: config_kv 表
// ==========================================

pub mod config_manager;
pub mod engine_settings;
pub mod governance_config_trait;

// 重导出核心配置管理器
pub use config_manager::{config_keys, ConfigManager};
pub use engine_settings::EngineSettings;
pub use governance_config_trait::{ConfigResult, GovernanceConfigReader};
