// ==========================================
// 混凝土配方治理引擎 - 配方 API
// ==========================================
// 职责: 编码预览、冲突查询、批量保存、材料修复、治理报告、材料目录
// 约定: 材料目录经由 ReferenceCache 按工厂缓存，目录写入后失效
// ==========================================

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::api::error::{ApiError, ApiResult};
use crate::domain::decision::{PersistOutcome, RepairOutcome, RetryTarget, SaveBatch, SavedRecipe};
use crate::domain::governance::MasterGovernanceData;
use crate::domain::material::{CatalogMaterial, MaterialCatalog, MaterialLine, MaterialSelection};
use crate::domain::recipe::RecipeSpecification;
use crate::engine::code_generator::{self, ArkikCodes, FormulationHints};
use crate::engine::{
    GovernanceReporter, MatchReport, RecipePersistenceEngine, ReferenceCache, SpecificationMatcher,
};
use crate::i18n::{t, t_with_args};
use crate::repository::MaterialCatalogRepository;

/// 配方 API
///
/// 职责：
/// 1. 编码预览（纯计算）
/// 2. 冲突候选查询
/// 3. 批量保存与仅材料修复
/// 4. 治理报告（只读）
pub struct RecipeApi {
    persistence: Arc<RecipePersistenceEngine>,
    reporter: Arc<GovernanceReporter>,
    matcher: Arc<SpecificationMatcher>,
    catalog_repo: Arc<MaterialCatalogRepository>,
    catalog_cache: Arc<ReferenceCache<String, MaterialCatalog>>,
}

impl RecipeApi {
    pub fn new(
        persistence: Arc<RecipePersistenceEngine>,
        reporter: Arc<GovernanceReporter>,
        matcher: Arc<SpecificationMatcher>,
        catalog_repo: Arc<MaterialCatalogRepository>,
        catalog_cache: Arc<ReferenceCache<String, MaterialCatalog>>,
    ) -> Self {
        Self {
            persistence,
            reporter,
            matcher,
            catalog_repo,
            catalog_cache,
        }
    }

    // ==========================================
    // 编码与冲突
    // ==========================================

    /// 生成 ARKIK 长/短编码（UI 预览）
    pub fn generate_code(&self, spec: &RecipeSpecification, hints: FormulationHints) -> ApiResult<ArkikCodes> {
        Ok(code_generator::generate(spec, hints)?)
    }

    /// 查询冲突候选（决定是否需要提示操作员）
    pub fn find_collisions(
        &self,
        spec: &RecipeSpecification,
        candidate_code: &str,
        plant_id: &str,
    ) -> ApiResult<MatchReport> {
        if plant_id.trim().is_empty() {
            return Err(ApiError::InvalidInput(t("save.missing_plant_id")));
        }
        Ok(self.matcher.find_collisions(plant_id, spec, candidate_code)?)
    }

    // ==========================================
    // 保存与修复
    // ==========================================

    /// 批量保存入口
    ///
    /// # 返回
    /// - Ok(PersistOutcome): 保存成功
    /// - Err(ApiError::DecisionRequired): 需要人工决策，未写入
    /// - Err(ApiError::MaterialsRetryable): 可调用 repair_materials 仅重试材料
    pub async fn resolve_and_persist(&self, batch: SaveBatch) -> ApiResult<PersistOutcome> {
        debug!(plant_id = %batch.plant_id, drafts = batch.drafts.len(), "收到保存请求");
        let catalog = self.catalog_for(&batch.plant_id)?;

        match self.persistence.resolve_and_persist(&batch, &catalog).await {
            Ok(outcome) => {
                if !outcome.empty_versions.is_empty() {
                    warn!(count = outcome.empty_versions.len(), "保存成功但存在零材料版本");
                }
                info!(plant_id = %batch.plant_id, saved = outcome.saved.len(), "保存完成");
                Ok(outcome)
            }
            Err(e) => {
                if e.is_pre_write() {
                    debug!(plant_id = %batch.plant_id, error = %e, "写前校验未通过，未写入任何数据");
                } else if e.is_recoverable() {
                    warn!(plant_id = %batch.plant_id, error = %e, "保存需要仅材料修复");
                }
                Err(e.into())
            }
        }
    }

    /// 仅重试材料写入
    pub async fn repair_materials(&self, targets: Vec<RetryTarget>) -> ApiResult<RepairOutcome> {
        Ok(self.persistence.repair_materials(&targets).await?)
    }

    /// 为单个变体更新材料（追加新版本）
    pub async fn update_variant_materials(
        &self,
        plant_id: &str,
        variant_id: &str,
        lines: Vec<MaterialLine>,
        selection: MaterialSelection,
        notes: Option<String>,
    ) -> ApiResult<SavedRecipe> {
        if lines.is_empty() {
            return Err(ApiError::ValidationError(t_with_args(
                "save.missing_materials",
                &[("code", variant_id)],
            )));
        }
        let catalog = self.catalog_for(plant_id)?;
        Ok(self
            .persistence
            .update_variant_materials(plant_id, variant_id, &lines, &selection, notes, &catalog)
            .await?)
    }

    // ==========================================
    // 治理报告
    // ==========================================

    pub async fn get_governance_report(&self, plant_id: &str) -> ApiResult<Vec<MasterGovernanceData>> {
        if plant_id.trim().is_empty() {
            return Err(ApiError::InvalidInput(t("save.missing_plant_id")));
        }
        Ok(self.reporter.report(plant_id).await?)
    }

    // ==========================================
    // 材料目录
    // ==========================================

    /// 工厂可用材料（启用状态，按名称排序）
    pub fn list_available_materials(&self, plant_id: &str) -> ApiResult<Vec<CatalogMaterial>> {
        if plant_id.trim().is_empty() {
            return Err(ApiError::InvalidInput(t("save.missing_plant_id")));
        }
        Ok(self.catalog_for(plant_id)?.materials().to_vec())
    }

    pub fn register_plant(&self, plant_id: &str, plant_name: &str) -> ApiResult<()> {
        if plant_id.trim().is_empty() {
            return Err(ApiError::InvalidInput(t("save.missing_plant_id")));
        }
        self.catalog_repo.upsert_plant(plant_id, plant_name)?;
        self.catalog_cache.invalidate(&plant_id.to_string());
        Ok(())
    }

    /// 写入/更新目录材料，并使该工厂的目录缓存失效
    pub fn upsert_catalog_materials(&self, plant_id: &str, materials: Vec<CatalogMaterial>) -> ApiResult<usize> {
        if let Some(other) = materials.iter().find(|m| m.plant_id != plant_id) {
            return Err(ApiError::InvalidInput(t_with_args(
                "catalog.foreign_material",
                &[("material", &other.material_id), ("plant", plant_id)],
            )));
        }
        let count = self.catalog_repo.upsert_materials(&materials)?;
        self.catalog_cache.invalidate(&plant_id.to_string());
        debug!(plant_id, count, "目录材料已更新，缓存失效");
        Ok(count)
    }

    fn catalog_for(&self, plant_id: &str) -> ApiResult<MaterialCatalog> {
        let catalog = self.catalog_cache.get_or_try_load(&plant_id.to_string(), || {
            self.catalog_repo
                .list_active_by_plant(plant_id)
                .map(MaterialCatalog::new)
        })?;
        Ok(catalog)
    }
}
