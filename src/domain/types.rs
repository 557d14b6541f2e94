// ==========================================
// 混凝土配方治理引擎 - 领域类型定义
// ==========================================
// 职责: 龄期单位、浇筑方式、配方类型、材料角色、校验等级等枚举
// 约定: to_db_str / from_db_str 与数据库文本一致
// ==========================================

use serde::{Deserialize, Serialize};
use std::fmt;

// ==========================================
// 龄期单位 (Age Unit)
// ==========================================
// 红线: 天与小时永不相等（即使数值相同）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AgeUnit {
    Days,  // 天
    Hours, // 小时
}

impl AgeUnit {
    pub fn to_db_str(&self) -> &'static str {
        match self {
            AgeUnit::Days => "DAYS",
            AgeUnit::Hours => "HOURS",
        }
    }

    pub fn from_db_str(s: &str) -> Option<Self> {
        match s.trim().to_uppercase().as_str() {
            "DAYS" | "D" | "DIAS" => Some(AgeUnit::Days),
            "HOURS" | "H" | "HORAS" => Some(AgeUnit::Hours),
            _ => None,
        }
    }
}

impl fmt::Display for AgeUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_db_str())
    }
}

// ==========================================
// 浇筑方式 (Placement Type)
// ==========================================
// 编码: D = 直接浇筑, B = 泵送
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PlacementType {
    Direct, // 直接浇筑
    Pumped, // 泵送
}

impl PlacementType {
    /// ARKIK 编码中的浇筑位
    pub fn code(&self) -> &'static str {
        match self {
            PlacementType::Direct => "D",
            PlacementType::Pumped => "B",
        }
    }

    pub fn from_code(s: &str) -> Option<Self> {
        match s.trim().to_uppercase().as_str() {
            "D" | "DIRECT" | "DIRECTO" => Some(PlacementType::Direct),
            "B" | "PUMPED" | "BOMBEADO" => Some(PlacementType::Pumped),
            _ => None,
        }
    }
}

impl fmt::Display for PlacementType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PlacementType::Direct => write!(f, "DIRECT"),
            PlacementType::Pumped => write!(f, "PUMPED"),
        }
    }
}

// ==========================================
// 配方类型 (Recipe Type)
// ==========================================
// FC = 抗压强度配方, MR = 抗折（路面）配方
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RecipeType {
    FC,
    MR,
}

impl RecipeType {
    pub fn to_db_str(&self) -> &'static str {
        match self {
            RecipeType::FC => "FC",
            RecipeType::MR => "MR",
        }
    }

    pub fn from_db_str(s: &str) -> Self {
        match s.trim().to_uppercase().as_str() {
            "MR" => RecipeType::MR,
            _ => RecipeType::FC,
        }
    }
}

// ==========================================
// 材料角色 (Material Role)
// ==========================================
// 在目录入库时一次性解析，校验时不再做字符串匹配
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MaterialRole {
    Cement,
    Water,
    FineAggregate,
    CoarseAggregate,
    Admixture,
    Other,
}

impl MaterialRole {
    /// 由目录字段解析角色
    ///
    /// # 参数
    /// - category: 材料大类（cemento / agua / agregado / aditivo ...）
    /// - subcategory: 子类（agregado_fino / agregado_grueso）
    /// - code: 材料编码或旧数据的 material_type
    pub fn classify(category: &str, subcategory: Option<&str>, code: &str) -> Self {
        let category = category.trim().to_lowercase();
        let code = code.trim().to_lowercase();

        if matches!(category.as_str(), "cemento" | "cement" | "binder")
            || matches!(code.as_str(), "cemento" | "cement")
        {
            return MaterialRole::Cement;
        }
        if matches!(category.as_str(), "agua" | "water" | "liquid")
            || matches!(code.as_str(), "agua" | "water")
        {
            return MaterialRole::Water;
        }
        if matches!(category.as_str(), "aditivo" | "admixture" | "additive") {
            return MaterialRole::Admixture;
        }
        if matches!(category.as_str(), "agregado" | "aggregate") {
            let sub = subcategory.map(|s| s.trim().to_lowercase()).unwrap_or_default();
            return match sub.as_str() {
                "agregado_fino" | "fine" | "arena" => MaterialRole::FineAggregate,
                _ => MaterialRole::CoarseAggregate,
            };
        }
        if matches!(category.as_str(), "agregado_fino" | "arena" | "sand") {
            return MaterialRole::FineAggregate;
        }
        if matches!(category.as_str(), "agregado_grueso" | "grava" | "gravel") {
            return MaterialRole::CoarseAggregate;
        }
        MaterialRole::Other
    }

    /// 旧数据（无目录关联）仅有 material_type 文本
    pub fn from_legacy_type(material_type: &str) -> Self {
        Self::classify(material_type, None, material_type)
    }

    pub fn to_db_str(&self) -> &'static str {
        match self {
            MaterialRole::Cement => "cemento",
            MaterialRole::Water => "agua",
            MaterialRole::FineAggregate => "agregado_fino",
            MaterialRole::CoarseAggregate => "agregado_grueso",
            MaterialRole::Admixture => "aditivo",
            MaterialRole::Other => "otro",
        }
    }
}

// ==========================================
// 校验等级 (Issue Severity)
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IssueSeverity {
    Error,
    Warning,
}

// ==========================================
// 校验问题类型 (Issue Type)
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueType {
    TooFewMaterials,
    MissingCement,
    MissingWater,
    InvalidQuantities,
}

impl fmt::Display for IssueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IssueType::TooFewMaterials => write!(f, "too_few_materials"),
            IssueType::MissingCement => write!(f, "missing_cement"),
            IssueType::MissingWater => write!(f, "missing_water"),
            IssueType::InvalidQuantities => write!(f, "invalid_quantities"),
        }
    }
}

// ==========================================
// 变体版本状态 (Variant Version Status)
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum VariantStatus {
    UpToDate,     // 最新版本即当前标记版本
    Outdated,     // 最新版本未被标记为当前
    NoVersion,    // 无任何版本
    Inconsistent, // 多个版本同时被标记为当前
}

impl fmt::Display for VariantStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VariantStatus::UpToDate => write!(f, "up-to-date"),
            VariantStatus::Outdated => write!(f, "outdated"),
            VariantStatus::NoVersion => write!(f, "no-version"),
            VariantStatus::Inconsistent => write!(f, "inconsistent"),
        }
    }
}
