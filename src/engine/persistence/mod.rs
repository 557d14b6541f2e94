// ==========================================
// 混凝土配方治理引擎 - 版本/材料持久化引擎
// ==========================================
// 流程（saga，每阶段一个事务，不跨阶段回滚）:
// 0. 写前校验: 工厂、材料、决策解析、材料预解析（零写入）
// 1. 分组: 更新变体 / 已有主配方下新建 / 需新建主配方
// 2. 批量插入新主配方（按 master_code 去重）
// 3. 批量查询更新变体的最大版本号
// 4. 批量改码/改规格
// 5. 批量降级旧的当前版本
// 6. 批量插入新变体
// 7. 批量插入新版本（均为当前版本）
// 8-9. 批量写入干料与 SSS 行（暂时性失败指数退避重试）
// 10. 写后抽检: 零材料版本只告警
// ==========================================

pub mod materials;
pub mod repair;

use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use backon::{ExponentialBuilder, Retryable};
use uuid::Uuid;

use crate::config::EngineSettings;
use crate::domain::decision::{
    CommittedState, PersistOutcome, ResolvedAction, RetryTarget, SaveBatch, SavedRecipe,
};
use crate::domain::material::MaterialCatalog;
use crate::domain::recipe::{MasterRecipe, RecipeVariant, RecipeVersion};
use crate::engine::clock::Clock;
use crate::engine::decision_resolver::DecisionResolver;
use crate::engine::error::{EngineError, EngineResult};
use crate::engine::repositories::RecipeRepositories;
use crate::i18n::{t, t_with_args};
use crate::perf::PerfGuard;
use crate::repository::{RepositoryError, RepositoryResult, VariantUpdate, VersionedRow};

use self::materials::PreparedRecipe;

// ==========================================
// RecipePersistenceEngine
// ==========================================
pub struct RecipePersistenceEngine {
    repos: RecipeRepositories,
    resolver: Arc<DecisionResolver>,
    clock: Arc<dyn Clock>,
    settings: EngineSettings,
}

impl RecipePersistenceEngine {
    pub fn new(
        repos: RecipeRepositories,
        resolver: Arc<DecisionResolver>,
        clock: Arc<dyn Clock>,
        settings: EngineSettings,
    ) -> Self {
        Self {
            repos,
            resolver,
            clock,
            settings,
        }
    }

    /// 保存入口: 解析决策并持久化整个批次
    ///
    /// # 返回
    /// - Ok(PersistOutcome): 全部阶段成功（写后抽检问题只在 outcome 中体现）
    /// - Err(写前校验类): 零写入
    /// - Err(RecipePersistenceFailed): 阶段 2-7 失败，附已提交部分
    /// - Err(MaterialsPersistenceFailed): 配方/版本已提交，附修复目标
    pub async fn resolve_and_persist(
        &self,
        batch: &SaveBatch,
        catalog: &MaterialCatalog,
    ) -> EngineResult<PersistOutcome> {
        let _perf = PerfGuard::new("resolve_and_persist");

        self.validate_input(batch)?;
        if batch.drafts.is_empty() {
            return Ok(PersistOutcome::default());
        }

        let resolved = self.resolver.resolve_batch(batch, catalog)?;
        let prepared = materials::prepare_batch(resolved, catalog, &batch.selection)?;

        let (saved, targets, masters_created) = self.write_recipes(&batch.plant_id, &prepared)?;
        let (dry_rows, reference_rows) = self.write_materials(&targets).await?;
        let empty_versions = self.post_write_check(&targets);

        tracing::info!(
            plant_id = %batch.plant_id,
            recipes = saved.len(),
            masters_created,
            dry_rows,
            reference_rows,
            "批次保存完成"
        );

        Ok(PersistOutcome {
            saved,
            masters_created,
            dry_rows,
            reference_rows,
            empty_versions,
        })
    }

    // ==========================================
    // 阶段 0: 输入校验
    // ==========================================

    fn validate_input(&self, batch: &SaveBatch) -> EngineResult<()> {
        if batch.plant_id.trim().is_empty()
            || !self.repos.catalog_repo.plant_exists(&batch.plant_id)?
        {
            return Err(EngineError::Validation(t("save.missing_plant")));
        }
        for draft in &batch.drafts {
            if draft.materials.is_empty() {
                let code = draft.code_override.clone().unwrap_or_else(|| {
                    format!("f'c {} / {}", draft.spec.strength_fc, draft.spec.placement_type)
                });
                return Err(EngineError::Validation(t_with_args(
                    "save.missing_materials",
                    &[("code", &code)],
                )));
            }
        }
        Ok(())
    }

    // ==========================================
    // 阶段 1-7: 主配方 / 变体 / 版本
    // ==========================================

    fn write_recipes(
        &self,
        plant_id: &str,
        prepared: &[PreparedRecipe],
    ) -> EngineResult<(Vec<SavedRecipe>, Vec<RetryTarget>, usize)> {
        let now = self.clock.timestamp();
        let mut committed = CommittedState::default();
        let fail = |phase: u8, err: RepositoryError, committed: &CommittedState| {
            tracing::error!(phase, error = %err, "配方持久化阶段失败");
            EngineError::RecipePersistenceFailed {
                phase,
                message: err.to_string(),
                committed: committed.clone(),
            }
        };

        // ----- 阶段 1: 分组 -----
        let mut update_ids: Vec<String> = Vec::new();
        let mut new_master_codes: Vec<&str> = Vec::new();
        for p in prepared {
            match &p.resolved.action {
                ResolvedAction::UpdateVariant { variant_id, .. } => update_ids.push(variant_id.clone()),
                ResolvedAction::NewMaster { master_code } => {
                    if !new_master_codes.contains(&master_code.as_str()) {
                        new_master_codes.push(master_code.as_str());
                    }
                }
                ResolvedAction::CreateVariant { .. } => {}
            }
        }
        tracing::debug!(
            phase = 1,
            updates = update_ids.len(),
            new_masters = new_master_codes.len(),
            creates = prepared.len() - update_ids.len(),
            "批次分组"
        );

        // ----- 阶段 2: 新主配方 -----
        let new_masters: Vec<MasterRecipe> = new_master_codes
            .iter()
            .filter_map(|code| {
                prepared
                    .iter()
                    .find(|p| matches!(&p.resolved.action, ResolvedAction::NewMaster { master_code } if master_code.as_str() == *code))
                    .map(|p| {
                        let s = &p.resolved.spec;
                        MasterRecipe {
                            master_id: Uuid::new_v4().to_string(),
                            plant_id: plant_id.to_string(),
                            master_code: code.to_string(),
                            strength_fc: s.strength_fc,
                            age_value: s.age_value,
                            age_unit: s.age_unit,
                            placement_type: s.placement_type,
                            max_aggregate_size: s.max_aggregate_size,
                            slump: s.slump,
                            is_active: true,
                            created_at: now,
                        }
                    })
            })
            .collect();
        self.repos
            .master_repo
            .insert_batch(&new_masters)
            .map_err(|e| fail(2, e, &committed))?;
        let master_id_by_code: HashMap<String, String> = new_masters
            .iter()
            .map(|m| (m.master_code.clone(), m.master_id.clone()))
            .collect();
        committed.master_ids_by_code = new_masters
            .iter()
            .map(|m| (m.master_code.clone(), m.master_id.clone()))
            .collect();
        tracing::debug!(phase = 2, inserted = new_masters.len(), "主配方写入完成");

        // ----- 阶段 3: 最大版本号 -----
        let mut max_versions: HashMap<String, i32> = HashMap::new();
        for chunk in update_ids.chunks(self.settings.version_lookup_chunk_size.max(1)) {
            let found = self
                .repos
                .version_repo
                .max_version_numbers(chunk)
                .map_err(|e| fail(3, e, &committed))?;
            max_versions.extend(found);
        }

        // ----- 阶段 4: 改码/改规格 -----
        let updates: Vec<VariantUpdate> = prepared
            .iter()
            .filter_map(|p| match &p.resolved.action {
                ResolvedAction::UpdateVariant { variant_id, .. } => Some(VariantUpdate {
                    recipe_id: variant_id.clone(),
                    recipe_code: p.resolved.final_code.clone(),
                    variant_suffix: p.resolved.variant_suffix.clone(),
                    spec: p.resolved.spec.clone(),
                    updated_at: now,
                }),
                _ => None,
            })
            .collect();
        self.repos
            .variant_repo
            .update_batch(&updates)
            .map_err(|e| fail(4, e, &committed))?;
        tracing::debug!(phase = 4, updated = updates.len(), "变体改码完成");

        // ----- 阶段 5: 降级旧版本 -----
        let mut demoted = 0usize;
        for chunk in update_ids.chunks(self.settings.version_lookup_chunk_size.max(1)) {
            demoted += self
                .repos
                .version_repo
                .demote_current(chunk)
                .map_err(|e| fail(5, e, &committed))?;
        }
        tracing::debug!(phase = 5, demoted, "旧版本降级完成");

        // ----- 阶段 6: 新变体 -----
        let mut variant_ids: Vec<String> = Vec::with_capacity(prepared.len());
        let mut master_ids: Vec<Option<String>> = Vec::with_capacity(prepared.len());
        let mut new_variants: Vec<RecipeVariant> = Vec::new();
        for p in prepared {
            let r = &p.resolved;
            let master_id = match &r.action {
                ResolvedAction::UpdateVariant { variant_id, .. } => {
                    variant_ids.push(variant_id.clone());
                    master_ids.push(None);
                    continue;
                }
                ResolvedAction::NewMaster { master_code } => master_id_by_code.get(master_code).cloned(),
                ResolvedAction::CreateVariant { master_id } => Some(master_id.clone()),
            };
            let variant = RecipeVariant {
                recipe_id: Uuid::new_v4().to_string(),
                plant_id: plant_id.to_string(),
                recipe_code: r.final_code.clone(),
                master_recipe_id: master_id.clone(),
                variant_suffix: r.variant_suffix.clone(),
                spec: r.spec.clone(),
                created_at: now,
                updated_at: now,
            };
            variant_ids.push(variant.recipe_id.clone());
            master_ids.push(master_id);
            new_variants.push(variant);
        }
        self.repos
            .variant_repo
            .insert_batch(&new_variants)
            .map_err(|e| fail(6, e, &committed))?;
        committed.variant_ids = new_variants.iter().map(|v| v.recipe_id.clone()).collect();
        tracing::debug!(phase = 6, inserted = new_variants.len(), "变体写入完成");

        // ----- 阶段 7: 新版本 -----
        let versions: Vec<RecipeVersion> = prepared
            .iter()
            .zip(&variant_ids)
            .map(|(p, variant_id)| RecipeVersion {
                version_id: Uuid::new_v4().to_string(),
                recipe_id: variant_id.clone(),
                version_number: max_versions.get(variant_id).copied().unwrap_or(0) + 1,
                is_current: true,
                notes: p.resolved.notes.clone(),
                created_at: now,
            })
            .collect();
        self.repos
            .version_repo
            .insert_batch(&versions)
            .map_err(|e| fail(7, e, &committed))?;
        tracing::debug!(phase = 7, inserted = versions.len(), "版本写入完成");

        committed.version_ids = versions.iter().map(|v| v.version_id.clone()).collect();
        tracing::debug!(committed_versions = committed.version_ids.len(), "配方阶段全部提交");

        // 版本不含编码，按位置关联回配方（更新变体的 master_id 不回填）
        let mut saved = Vec::with_capacity(prepared.len());
        let mut targets = Vec::with_capacity(prepared.len());
        for ((p, version), master_id) in prepared.iter().zip(&versions).zip(master_ids) {
            saved.push(SavedRecipe {
                recipe_code: p.resolved.final_code.clone(),
                variant_id: version.recipe_id.clone(),
                master_id,
                version_id: version.version_id.clone(),
                version_number: version.version_number,
                action: p.resolved.action.label().to_string(),
            });
            targets.push(RetryTarget {
                version_id: version.version_id.clone(),
                variant_id: version.recipe_id.clone(),
                recipe_code: p.resolved.final_code.clone(),
                dry_rows: p.dry_rows.clone(),
                reference_rows: p.reference_rows.clone(),
            });
        }

        Ok((saved, targets, new_masters.len()))
    }

    // ==========================================
    // 阶段 8-9: 材料写入（可修复）
    // ==========================================

    /// 写入修复目标中的干料与 SSS 行
    ///
    /// 失败时返回 MaterialsPersistenceFailed，retry_targets 为全部目标。
    pub(crate) async fn write_materials(&self, targets: &[RetryTarget]) -> EngineResult<(usize, usize)> {
        let dry: Vec<VersionedRow> = targets
            .iter()
            .flat_map(|t| t.dry_rows.iter().map(move |r| (t.version_id.clone(), r.clone())))
            .collect();
        let reference: Vec<VersionedRow> = targets
            .iter()
            .flat_map(|t| t.reference_rows.iter().map(move |r| (t.version_id.clone(), r.clone())))
            .collect();

        let quantity_repo = self.repos.quantity_repo.clone();
        let to_failure = |err: RepositoryError, attempts: u32| {
            tracing::error!(attempts, error = %err, targets = targets.len(), "材料写入失败，需要修复");
            EngineError::MaterialsPersistenceFailed {
                message: err.to_string(),
                attempts,
                retry_targets: targets.to_vec(),
            }
        };

        let (dry_result, attempts) = self.with_retry("dry", || quantity_repo.insert_dry_rows(&dry)).await;
        let dry_count = dry_result.map_err(|e| to_failure(e, attempts))?;

        let (reference_result, attempts) = self
            .with_retry("sss", || quantity_repo.insert_reference_rows(&reference))
            .await;
        let reference_count = reference_result.map_err(|e| to_failure(e, attempts))?;

        tracing::debug!(phase = 9, dry_count, reference_count, "材料写入完成");
        Ok((dry_count, reference_count))
    }

    /// 暂时性失败按指数退避重试
    ///
    /// # 返回
    /// - (结果, 实际尝试次数)
    pub(crate) async fn with_retry<T>(
        &self,
        step: &'static str,
        op: impl Fn() -> RepositoryResult<T>,
    ) -> (RepositoryResult<T>, u32) {
        let attempts = AtomicU32::new(0);
        let max_retries = self.settings.materials_retry_max_attempts.saturating_sub(1) as usize;

        let counter = &attempts;
        let op = &op;
        let result = (|| async move {
            counter.fetch_add(1, Ordering::Relaxed);
            op()
        })
        .retry(
            ExponentialBuilder::default()
                .with_min_delay(self.settings.retry_base_delay())
                .with_max_times(max_retries),
        )
        .when(|e: &RepositoryError| e.is_transient())
        .notify(|e, dur| {
            tracing::warn!(
                step,
                delay_ms = dur.as_millis() as u64,
                error = %e,
                "材料写入暂时失败，准备重试"
            )
        })
        .await;

        (result, attempts.load(Ordering::Relaxed))
    }

    // ==========================================
    // 阶段 10: 写后抽检
    // ==========================================

    /// 重新统计每个版本的干料行数；零行版本记录告警并返回
    pub(crate) fn post_write_check(&self, targets: &[RetryTarget]) -> Vec<String> {
        let version_ids: Vec<String> = targets.iter().map(|t| t.version_id.clone()).collect();
        let mut empty = Vec::new();

        for chunk in version_ids.chunks(self.settings.material_quantity_chunk_size.max(1)) {
            match self.repos.quantity_repo.count_by_version_ids(chunk) {
                Ok(counts) => {
                    for version_id in chunk {
                        if counts.get(version_id).copied().unwrap_or(0) == 0 {
                            let code = targets
                                .iter()
                                .find(|t| &t.version_id == version_id)
                                .map(|t| t.recipe_code.as_str())
                                .unwrap_or("");
                            tracing::warn!(version_id = %version_id, recipe_code = code, "版本写入后没有任何材料");
                            empty.push(version_id.clone());
                        }
                    }
                }
                Err(e) => {
                    tracing::warn!(error = %e, "写后抽检读取失败，已忽略");
                }
            }
        }
        empty
    }
}
