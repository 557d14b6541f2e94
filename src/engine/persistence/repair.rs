// ==========================================
// 持久化引擎 - 材料修复与单变体材料更新
// ==========================================
// repair_materials: 重放 MaterialsPersistenceFailed 携带的修复目标
// update_variant_materials: 为已有变体追加一个新版本并写入材料
// ==========================================

use uuid::Uuid;

use crate::domain::decision::{RepairOutcome, RetryTarget, SavedRecipe};
use crate::domain::material::{MaterialCatalog, MaterialLine, MaterialSelection};
use crate::domain::recipe::RecipeVersion;
use crate::engine::error::{EngineError, EngineResult};
use crate::i18n::t_with_args;
use crate::perf::PerfGuard;

use super::materials::prepare_rows;
use super::RecipePersistenceEngine;

impl RecipePersistenceEngine {
    /// 修复材料写入
    ///
    /// 每个目标版本的干料与 SSS 行在一个事务内先删后插，重复执行结果一致。
    /// 版本已不存在的目标跳过。
    pub async fn repair_materials(&self, targets: &[RetryTarget]) -> EngineResult<RepairOutcome> {
        let _perf = PerfGuard::new("repair_materials");
        if targets.is_empty() {
            return Ok(RepairOutcome::default());
        }

        let ids: Vec<String> = targets.iter().map(|t| t.version_id.clone()).collect();
        let existing = self.repos.version_repo.existing_ids(&ids)?;
        let (present, missing): (Vec<RetryTarget>, Vec<RetryTarget>) = targets
            .iter()
            .cloned()
            .partition(|t| existing.contains(&t.version_id));

        for t in &missing {
            tracing::warn!(version_id = %t.version_id, recipe_code = %t.recipe_code, "修复目标版本不存在，跳过");
        }

        let quantity_repo = self.repos.quantity_repo.clone();
        let (result, attempts) = self
            .with_retry("repair", || quantity_repo.replace_for_versions(&present))
            .await;
        let (dry_rows, reference_rows) = result.map_err(|e| {
            tracing::error!(attempts, error = %e, "材料修复失败");
            EngineError::MaterialsPersistenceFailed {
                message: e.to_string(),
                attempts,
                retry_targets: present.clone(),
            }
        })?;

        tracing::info!(
            repaired = present.len(),
            skipped = missing.len(),
            dry_rows,
            reference_rows,
            "材料修复完成"
        );

        Ok(RepairOutcome {
            updated: present.into_iter().map(|t| t.version_id).collect(),
            skipped: missing.into_iter().map(|t| t.version_id).collect(),
            dry_rows,
            reference_rows,
        })
    }

    /// 仅更新某变体的材料: 追加新的当前版本（编码与规格不变）
    pub async fn update_variant_materials(
        &self,
        plant_id: &str,
        variant_id: &str,
        lines: &[MaterialLine],
        selection: &MaterialSelection,
        notes: Option<String>,
        catalog: &MaterialCatalog,
    ) -> EngineResult<SavedRecipe> {
        let _perf = PerfGuard::new("update_variant_materials");

        let variant = self
            .repos
            .variant_repo
            .find_by_id(variant_id)?
            .filter(|v| v.plant_id == plant_id)
            .ok_or_else(|| {
                EngineError::Validation(t_with_args(
                    "save.unknown_variant",
                    &[("variant", variant_id), ("plant", plant_id)],
                ))
            })?;

        let (dry_rows, reference_rows) = prepare_rows(lines, catalog, selection);
        if dry_rows.is_empty() {
            return Err(EngineError::NoMaterials {
                recipe_code: variant.recipe_code,
            });
        }

        let now = self.clock.timestamp();
        let mut version = RecipeVersion {
            version_id: Uuid::new_v4().to_string(),
            recipe_id: variant.recipe_id.clone(),
            version_number: 0,
            is_current: true,
            notes,
            created_at: now,
        };
        self.repos.version_repo.append_current(&mut version)?;
        self.repos.variant_repo.touch(&variant.recipe_id, &now)?;

        let target = RetryTarget {
            version_id: version.version_id.clone(),
            variant_id: variant.recipe_id.clone(),
            recipe_code: variant.recipe_code.clone(),
            dry_rows,
            reference_rows,
        };
        self.write_materials(std::slice::from_ref(&target)).await?;

        let empty = self.post_write_check(std::slice::from_ref(&target));
        if !empty.is_empty() {
            tracing::warn!(version_id = %version.version_id, "材料更新后版本为空");
        }

        tracing::info!(
            recipe_code = %variant.recipe_code,
            version_number = version.version_number,
            "变体材料已更新"
        );

        Ok(SavedRecipe {
            recipe_code: variant.recipe_code,
            variant_id: variant.recipe_id,
            master_id: variant.master_recipe_id,
            version_id: version.version_id,
            version_number: version.version_number,
            action: "updateMaterials".to_string(),
        })
    }
}
