// ==========================================
// 混凝土配方治理引擎 - 引擎层错误类型
// ==========================================
// 工具: thiserror 派生宏
// 分类:
// - 写前校验错误（零写入）
// - 需要人工决策（控制流信号）
// - 材料阶段失败（可修复，携带 RetryTarget）
// - 配方/版本阶段失败（不可修复，携带已提交部分）
// ==========================================

use thiserror::Error;

use crate::domain::decision::{CollisionCandidate, CommittedState, RetryTarget};
use crate::repository::error::RepositoryError;

/// 引擎层错误类型
#[derive(Error, Debug)]
pub enum EngineError {
    // ===== 写前校验 =====
    #[error("配方规格无效 (field={field}): {message}")]
    InvalidSpecification { field: String, message: String },

    #[error("保存校验失败: {0}")]
    Validation(String),

    #[error("同一批次中最终编码重复: {code}")]
    DuplicateFinalCode { code: String },

    #[error("配方 {recipe_code} 没有可写入的干料行")]
    NoMaterials { recipe_code: String },

    // ===== 人工决策 =====
    #[error("编码 {code} 存在 {} 个冲突候选，需要人工决策", candidates.len())]
    CollisionRequiresDecision {
        code: String,
        candidates: Vec<CollisionCandidate>,
    },

    // ===== 持久化 =====
    /// 配方与版本已提交，材料写入失败；可调用修复接口只重写材料
    #[error("材料写入失败（已尝试 {attempts} 次）: {message}")]
    MaterialsPersistenceFailed {
        message: String,
        attempts: u32,
        retry_targets: Vec<RetryTarget>,
    },

    /// 主配方/变体/版本阶段失败；committed 为此前阶段已提交的部分
    #[error("配方持久化失败 (phase={phase}): {message}")]
    RecipePersistenceFailed {
        phase: u8,
        message: String,
        committed: CommittedState,
    },

    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

impl EngineError {
    /// 是否可通过"仅重试材料"恢复
    pub fn is_recoverable(&self) -> bool {
        matches!(self, EngineError::MaterialsPersistenceFailed { .. })
    }

    /// 修复目标（仅材料阶段失败时存在）
    pub fn retry_targets(&self) -> Option<&[RetryTarget]> {
        match self {
            EngineError::MaterialsPersistenceFailed { retry_targets, .. } => Some(retry_targets),
            _ => None,
        }
    }

    /// 写前校验类错误（保证零写入）
    pub fn is_pre_write(&self) -> bool {
        matches!(
            self,
            EngineError::InvalidSpecification { .. }
                | EngineError::Validation(_)
                | EngineError::DuplicateFinalCode { .. }
                | EngineError::NoMaterials { .. }
                | EngineError::CollisionRequiresDecision { .. }
        )
    }
}

/// Result 类型别名
pub type EngineResult<T> = Result<T, EngineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recoverable_carries_targets() {
        let err = EngineError::MaterialsPersistenceFailed {
            message: "timeout".to_string(),
            attempts: 3,
            retry_targets: vec![RetryTarget {
                version_id: "V1".to_string(),
                variant_id: "R1".to_string(),
                recipe_code: "5-250-2-B-28-10-D-2-000".to_string(),
                dry_rows: vec![],
                reference_rows: vec![],
            }],
        };
        assert!(err.is_recoverable());
        assert!(!err.is_pre_write());
        assert_eq!(err.retry_targets().map(|t| t.len()), Some(1));
    }

    #[test]
    fn test_validation_is_not_recoverable() {
        let err = EngineError::DuplicateFinalCode {
            code: "X".to_string(),
        };
        assert!(!err.is_recoverable());
        assert!(err.is_pre_write());
        assert!(err.retry_targets().is_none());
    }
}
