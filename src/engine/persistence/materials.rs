// ==========================================
// 持久化引擎 - 材料行预解析
// ==========================================
// 在任何写入之前把每行材料解析为目录材料:
// 显式 material_id → 选择提示 → 同角色第一个目录材料
// 干料只保留用量 > 0 的行，SSS 只保留数值 > 0 的行
// ==========================================

use std::collections::HashMap;

use crate::domain::decision::ResolvedRecipe;
use crate::domain::material::{CatalogMaterial, MaterialCatalog, MaterialLine, MaterialSelection, NewMaterialRow};
use crate::domain::types::MaterialRole;
use crate::engine::error::{EngineError, EngineResult};

/// 已解析材料行的配方
#[derive(Debug, Clone)]
pub struct PreparedRecipe {
    pub resolved: ResolvedRecipe,
    pub dry_rows: Vec<NewMaterialRow>,
    pub reference_rows: Vec<NewMaterialRow>,
}

fn is_positive(value: f64) -> bool {
    value.is_finite() && value > 0.0
}

/// 单行材料解析到目录
pub fn resolve_line<'a>(
    line: &MaterialLine,
    nth_of_role: usize,
    catalog: &'a MaterialCatalog,
    selection: &MaterialSelection,
) -> Option<&'a CatalogMaterial> {
    line.material_id
        .as_deref()
        .and_then(|id| catalog.get(id))
        .or_else(|| {
            selection
                .pick(line.role, nth_of_role)
                .and_then(|id| catalog.get(id))
        })
        .or_else(|| catalog.first_by_role(line.role))
}

/// 计算一组材料行的干料行与 SSS 行
pub fn prepare_rows(
    lines: &[MaterialLine],
    catalog: &MaterialCatalog,
    selection: &MaterialSelection,
) -> (Vec<NewMaterialRow>, Vec<NewMaterialRow>) {
    let mut seen_per_role: HashMap<MaterialRole, usize> = HashMap::new();
    let mut dry_rows = Vec::new();
    let mut reference_rows = Vec::new();

    for line in lines {
        let nth = seen_per_role.entry(line.role).or_insert(0);
        let resolved = resolve_line(line, *nth, catalog, selection);
        *nth += 1;

        let Some(material) = resolved else {
            tracing::warn!(label = %line.label, role = ?line.role, "材料行无法解析到目录材料，已跳过");
            continue;
        };
        let unit = line.unit.clone().unwrap_or_else(|| material.unit().to_string());

        if is_positive(line.dry_quantity) {
            dry_rows.push(NewMaterialRow {
                material_id: material.material_id.clone(),
                material_type: material.role.to_db_str().to_string(),
                quantity: line.dry_quantity,
                unit: unit.clone(),
            });
        }
        if let Some(sss) = line.sss_quantity.filter(|v| is_positive(*v)) {
            reference_rows.push(NewMaterialRow {
                material_id: material.material_id.clone(),
                material_type: material.role.to_db_str().to_string(),
                quantity: sss,
                unit,
            });
        }
    }

    (dry_rows, reference_rows)
}

/// 批次预解析；任一配方零干料行则整批中止
pub fn prepare_batch(
    resolved: Vec<ResolvedRecipe>,
    catalog: &MaterialCatalog,
    selection: &MaterialSelection,
) -> EngineResult<Vec<PreparedRecipe>> {
    resolved
        .into_iter()
        .map(|recipe| {
            let (dry_rows, reference_rows) = prepare_rows(&recipe.materials, catalog, selection);
            if dry_rows.is_empty() {
                return Err(EngineError::NoMaterials {
                    recipe_code: recipe.final_code,
                });
            }
            Ok(PreparedRecipe {
                resolved: recipe,
                dry_rows,
                reference_rows,
            })
        })
        .collect()
}
