// ==========================================
// 混凝土配方治理引擎 - API层错误类型
// ==========================================
// 职责: 把 Repository / Engine 错误转换为面向调用方的错误
// 约定: 可修复的材料失败保留 retry_targets，需要决策时保留候选列表
// ==========================================

use thiserror::Error;

use crate::domain::decision::{CollisionCandidate, CommittedState, RetryTarget};
use crate::engine::error::EngineError;
use crate::i18n::t_with_args;
use crate::repository::error::RepositoryError;

/// API层错误类型
#[derive(Error, Debug)]
pub enum ApiError {
    // ==========================================
    // 写前校验（零写入）
    // ==========================================
    #[error("无效输入: {0}")]
    InvalidInput(String),

    #[error("数据验证失败: {0}")]
    ValidationError(String),

    #[error("资源未找到: {0}")]
    NotFound(String),

    #[error("业务规则违反: {0}")]
    BusinessRuleViolation(String),

    // ==========================================
    // 控制流: 需要人工决策
    // ==========================================
    #[error("{}", decision_prompt(.code))]
    DecisionRequired {
        code: String,
        candidates: Vec<CollisionCandidate>,
    },

    // ==========================================
    // 持久化
    // ==========================================
    /// 可修复: 调用方应提供"仅重试材料"操作
    #[error("材料写入失败，可仅重试材料: {message}")]
    MaterialsRetryable {
        message: String,
        retry_targets: Vec<RetryTarget>,
    },

    /// 不可修复: 需要重新提交（已提交部分见 committed）
    #[error("配方保存失败 (phase={phase}): {message}")]
    PersistenceFailed {
        phase: u8,
        message: String,
        committed: CommittedState,
    },

    // ==========================================
    // 数据访问错误
    // ==========================================
    #[error("数据库错误: {0}")]
    DatabaseError(String),

    #[error("数据库连接失败: {0}")]
    DatabaseConnectionError(String),

    #[error("数据库暂时不可用: {0}")]
    DatabaseBusy(String),

    // ==========================================
    // 通用错误
    // ==========================================
    #[error("内部错误: {0}")]
    InternalError(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// 需要人工决策时展示给操作员的提示
fn decision_prompt(code: &str) -> String {
    t_with_args("save.decision_required", &[("code", code)])
}

impl ApiError {
    /// 可修复错误的修复目标
    pub fn retry_targets(&self) -> Option<&[RetryTarget]> {
        match self {
            ApiError::MaterialsRetryable { retry_targets, .. } => Some(retry_targets),
            _ => None,
        }
    }
}

// ==========================================
// 从 RepositoryError 转换
// ==========================================
impl From<RepositoryError> for ApiError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::NotFound { entity, id } => {
                ApiError::NotFound(format!("{}(id={})不存在", entity, id))
            }
            RepositoryError::DatabaseConnectionError(msg) => ApiError::DatabaseConnectionError(msg),
            RepositoryError::LockError(msg) => {
                ApiError::DatabaseConnectionError(format!("数据库锁获取失败: {}", msg))
            }
            RepositoryError::DatabaseTransactionError(msg) | RepositoryError::DatabaseQueryError(msg) => {
                ApiError::DatabaseError(msg)
            }
            RepositoryError::UniqueConstraintViolation(msg) => {
                ApiError::BusinessRuleViolation(format!("唯一约束违反: {}", msg))
            }
            RepositoryError::ForeignKeyViolation(msg) => {
                ApiError::BusinessRuleViolation(format!("外键约束违反: {}", msg))
            }
            RepositoryError::Transient(msg) => ApiError::DatabaseBusy(msg),
            RepositoryError::ValidationError(msg) => ApiError::ValidationError(msg),
            RepositoryError::FieldValueError { field, message } => {
                ApiError::InvalidInput(format!("字段{}错误: {}", field, message))
            }
            RepositoryError::InternalError(msg) => ApiError::InternalError(msg),
            RepositoryError::Other(err) => ApiError::Other(err),
        }
    }
}

// ==========================================
// 从 EngineError 转换
// ==========================================
impl From<EngineError> for ApiError {
    fn from(err: EngineError) -> Self {
        match err {
            EngineError::InvalidSpecification { field, message } => {
                ApiError::InvalidInput(format!("字段{}错误: {}", field, message))
            }
            EngineError::Validation(msg) => ApiError::ValidationError(msg),
            EngineError::DuplicateFinalCode { code } => {
                ApiError::ValidationError(t_with_args("save.duplicate_code", &[("code", &code)]))
            }
            EngineError::NoMaterials { recipe_code } => {
                ApiError::ValidationError(t_with_args("save.no_dry_materials", &[("code", &recipe_code)]))
            }
            EngineError::CollisionRequiresDecision { code, candidates } => {
                ApiError::DecisionRequired { code, candidates }
            }
            EngineError::MaterialsPersistenceFailed {
                message,
                retry_targets,
                ..
            } => ApiError::MaterialsRetryable {
                message,
                retry_targets,
            },
            EngineError::RecipePersistenceFailed {
                phase,
                message,
                committed,
            } => ApiError::PersistenceFailed {
                phase,
                message,
                committed,
            },
            EngineError::Repository(e) => e.into(),
        }
    }
}

/// Result 类型别名
pub type ApiResult<T> = Result<T, ApiError>;
