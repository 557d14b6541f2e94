// ==========================================
// 混凝土配方治理引擎 - 材料领域模型
// ==========================================
// 材料目录 (material) / 干料用量 (material_quantity) / SSS 参考用量
// 红线: 材料角色在目录入库时解析一次 (MaterialRole)
// ==========================================

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::domain::types::MaterialRole;

// ==========================================
// CatalogMaterial - 材料目录条目
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogMaterial {
    pub material_id: String,
    pub plant_id: String,
    pub material_name: String,
    pub material_code: String,
    pub category: String,
    pub subcategory: Option<String>,
    pub unit_of_measure: Option<String>,
    pub is_active: bool,
    pub role: MaterialRole, // 入库时解析
}

impl CatalogMaterial {
    /// 默认计量单位（目录未配置时按 kg/m³）
    pub fn unit(&self) -> &str {
        self.unit_of_measure.as_deref().unwrap_or("kg/m³")
    }

    /// 名称或编码是否包含给定片段（大小写不敏感）
    pub fn mentions(&self, needle: &str) -> bool {
        let needle = needle.to_uppercase();
        self.material_name.to_uppercase().contains(&needle)
            || self.material_code.to_uppercase().contains(&needle)
    }
}

// ==========================================
// MaterialCatalog - 工厂材料目录（只读快照）
// ==========================================
#[derive(Debug, Clone, Default)]
pub struct MaterialCatalog {
    materials: Vec<CatalogMaterial>,
    index: HashMap<String, usize>,
}

impl MaterialCatalog {
    pub fn new(materials: Vec<CatalogMaterial>) -> Self {
        let index = materials
            .iter()
            .enumerate()
            .map(|(i, m)| (m.material_id.clone(), i))
            .collect();
        Self { materials, index }
    }

    pub fn get(&self, material_id: &str) -> Option<&CatalogMaterial> {
        self.index.get(material_id).map(|&i| &self.materials[i])
    }

    /// 按角色取第一个启用的材料（目录已按名称排序）
    pub fn first_by_role(&self, role: MaterialRole) -> Option<&CatalogMaterial> {
        self.materials.iter().find(|m| m.is_active && m.role == role)
    }

    pub fn materials(&self) -> &[CatalogMaterial] {
        &self.materials
    }

    pub fn len(&self) -> usize {
        self.materials.len()
    }

    pub fn is_empty(&self) -> bool {
        self.materials.is_empty()
    }
}

// ==========================================
// MaterialQuantity - 干料用量（按版本）
// ==========================================
// material_id 为空的行来自旧数据，仅有 material_type 文本
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MaterialQuantity {
    pub quantity_id: String,
    pub recipe_version_id: String,
    pub material_id: Option<String>,
    pub material_type: String,
    pub quantity: f64,
    pub unit: String,
}

// ==========================================
// ReferenceMaterial - SSS（饱和面干）参考用量
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReferenceMaterial {
    pub reference_id: String,
    pub recipe_version_id: String,
    pub material_id: String,
    pub material_type: String,
    pub sss_value: f64,
    pub unit: String,
}

// ==========================================
// MaterialLine - 保存请求中的一行材料
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MaterialLine {
    pub label: String,               // 显示名 / 计算器中的键
    pub material_id: Option<String>, // 显式指定的目录材料
    pub role: MaterialRole,          // 角色（无显式 ID 时用于回退查找）
    pub dry_quantity: f64,           // 干料用量
    pub sss_quantity: Option<f64>,   // SSS 用量
    pub unit: Option<String>,        // 单位（空则取目录单位）
}

// ==========================================
// MaterialSelection - 材料选择提示
// ==========================================
// 计算器保存时给出的选型：每个角色选中了哪些目录材料
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MaterialSelection {
    pub cement_id: Option<String>,
    pub water_id: Option<String>,
    pub sand_ids: Vec<String>,
    pub gravel_ids: Vec<String>,
    pub additive_ids: Vec<String>,
}

impl MaterialSelection {
    /// 某角色的第 n 个选中材料（同角色多行时按出现顺序对应）
    pub fn pick(&self, role: MaterialRole, nth: usize) -> Option<&str> {
        fn pick_from(ids: &[String], nth: usize) -> Option<&str> {
            ids.get(nth).or_else(|| ids.first()).map(|s| s.as_str())
        }
        match role {
            MaterialRole::Cement => self.cement_id.as_deref(),
            MaterialRole::Water => self.water_id.as_deref(),
            MaterialRole::FineAggregate => pick_from(&self.sand_ids, nth),
            MaterialRole::CoarseAggregate => pick_from(&self.gravel_ids, nth),
            MaterialRole::Admixture => pick_from(&self.additive_ids, nth),
            MaterialRole::Other => None,
        }
    }
}

// ==========================================
// NewMaterialRow - 待写入的材料行（干料或 SSS）
// ==========================================
// 同时作为修复目标的载荷，故需可序列化
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewMaterialRow {
    pub material_id: String,
    pub material_type: String,
    pub quantity: f64,
    pub unit: String,
}

// ==========================================
// ValidationEntry - 校验器输入
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationEntry {
    pub name: String,
    pub role: MaterialRole,
    pub quantity: f64,
    pub unit: String,
}

impl ValidationEntry {
    /// 由存量用量行 + 目录构造校验条目
    pub fn from_quantity(row: &MaterialQuantity, catalog: &MaterialCatalog) -> Self {
        match row.material_id.as_deref().and_then(|id| catalog.get(id)) {
            Some(material) => Self {
                name: material.material_name.clone(),
                role: material.role,
                quantity: row.quantity,
                unit: row.unit.clone(),
            },
            None => Self {
                name: row.material_type.clone(),
                role: MaterialRole::from_legacy_type(&row.material_type),
                quantity: row.quantity,
                unit: row.unit.clone(),
            },
        }
    }
}
