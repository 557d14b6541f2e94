// ==========================================
// 混凝土配方治理引擎 - 应用层
// ==========================================
// 职责: 组合根，装配共享连接、配置、缓存与 API
// ==========================================

pub mod state;

// 重导出
pub use state::{get_default_db_path, AppState};
