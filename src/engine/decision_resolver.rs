// ==========================================
// 混凝土配方治理引擎 - 变体决策解析
// ==========================================
// 输入: 保存批次 + 操作员决策
// 输出: 每个草稿的最终编码与动作（newMaster / createVariant / updateVariant）
// 红线: 写入前完成全部校验；批次内最终编码两两不同
// ==========================================

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use crate::domain::decision::{OperatorDecision, RecipeDraft, ResolvedAction, ResolvedRecipe, SaveBatch};
use crate::domain::material::MaterialCatalog;
use crate::domain::recipe::RecipeSpecification;
use crate::engine::code_generator::{self, ArkikCodes, FormulationHints};
use crate::engine::error::{EngineError, EngineResult};
use crate::engine::spec_matcher::{MatchReport, SpecificationMatcher};
use crate::i18n::t_with_args;
use crate::repository::{MasterRecipeRepository, RecipeVariantRepository};

/// 由草稿材料推导组成提示（行标签 + 目录名称/编码）
pub fn formulation_hints(draft: &RecipeDraft, catalog: &MaterialCatalog) -> FormulationHints {
    let mut names: Vec<&str> = Vec::with_capacity(draft.materials.len() * 2);
    for line in &draft.materials {
        names.push(line.label.as_str());
        if let Some(material) = line.material_id.as_deref().and_then(|id| catalog.get(id)) {
            names.push(material.material_name.as_str());
            names.push(material.material_code.as_str());
        }
    }
    FormulationHints::from_material_names(names)
}

/// 草稿的计算编码
pub fn draft_codes(draft: &RecipeDraft, catalog: &MaterialCatalog) -> EngineResult<ArkikCodes> {
    code_generator::generate(&draft.spec, formulation_hints(draft, catalog))
}

/// 草稿的最终编码（人工覆盖优先）
pub fn final_code(draft: &RecipeDraft, codes: &ArkikCodes) -> String {
    match draft.code_override.as_deref().map(str::trim) {
        Some(code) if !code.is_empty() => code.to_string(),
        _ => codes.long_code.clone(),
    }
}

// ==========================================
// DecisionResolver
// ==========================================
pub struct DecisionResolver {
    matcher: Arc<SpecificationMatcher>,
    master_repo: Arc<MasterRecipeRepository>,
    variant_repo: Arc<RecipeVariantRepository>,
}

impl DecisionResolver {
    pub fn new(
        matcher: Arc<SpecificationMatcher>,
        master_repo: Arc<MasterRecipeRepository>,
        variant_repo: Arc<RecipeVariantRepository>,
    ) -> Self {
        Self {
            matcher,
            master_repo,
            variant_repo,
        }
    }

    /// 解析整个批次
    ///
    /// 先做纯计算校验（编码、批内重复），再逐条查询冲突并应用决策。
    pub fn resolve_batch(&self, batch: &SaveBatch, catalog: &MaterialCatalog) -> EngineResult<Vec<ResolvedRecipe>> {
        let mut codes = Vec::with_capacity(batch.drafts.len());
        let mut seen: HashSet<String> = HashSet::new();
        for draft in &batch.drafts {
            let code = final_code(draft, &draft_codes(draft, catalog)?);
            if !seen.insert(code.clone()) {
                return Err(EngineError::DuplicateFinalCode { code });
            }
            codes.push(code);
        }

        let mut update_targets: HashSet<String> = HashSet::new();
        let mut new_masters: HashMap<String, RecipeSpecification> = HashMap::new();
        let mut resolved = Vec::with_capacity(batch.drafts.len());
        for (draft, code) in batch.drafts.iter().zip(codes) {
            let recipe = self.resolve_one(&batch.plant_id, draft, code)?;
            match &recipe.action {
                ResolvedAction::UpdateVariant { variant_id, .. } => {
                    if !update_targets.insert(variant_id.clone()) {
                        return Err(EngineError::Validation(t_with_args(
                            "save.duplicate_update",
                            &[("variant", variant_id)],
                        )));
                    }
                }
                // 批内新主配方按编码合并，编码相同但核心规格不同时拒绝
                ResolvedAction::NewMaster { master_code } => match new_masters.get(master_code) {
                    Some(spec) if !spec.same_core_spec(&recipe.spec) => {
                        return Err(EngineError::Validation(t_with_args(
                            "save.master_spec_conflict",
                            &[("code", master_code)],
                        )));
                    }
                    Some(_) => {}
                    None => {
                        new_masters.insert(master_code.clone(), recipe.spec.clone());
                    }
                },
                ResolvedAction::CreateVariant { .. } => {}
            }
            resolved.push(recipe);
        }

        tracing::info!(
            plant_id = %batch.plant_id,
            recipes = resolved.len(),
            "批次决策解析完成"
        );
        Ok(resolved)
    }

    fn resolve_one(&self, plant_id: &str, draft: &RecipeDraft, code: String) -> EngineResult<ResolvedRecipe> {
        let report = self.matcher.find_collisions(plant_id, &draft.spec, &code)?;
        let (master_code, variant_suffix) = code_generator::split_master_and_variant(&code);

        let action = match &draft.decision {
            None if report.requires_decision() => {
                tracing::info!(code = %code, candidates = report.candidates.len(), "需要人工决策");
                return Err(EngineError::CollisionRequiresDecision {
                    code,
                    candidates: report.candidates,
                });
            }
            None | Some(OperatorDecision::NewMaster) => {
                Self::reject_code_collision(&report, &code, None)?;
                if self.master_repo.find_by_code(plant_id, &master_code)?.is_some() {
                    return Err(EngineError::Validation(t_with_args(
                        "save.master_taken",
                        &[("code", &master_code)],
                    )));
                }
                ResolvedAction::NewMaster { master_code }
            }
            Some(OperatorDecision::CreateVariant { master_id }) => {
                let master = self
                    .master_repo
                    .find_by_id(master_id)?
                    .filter(|m| m.plant_id == plant_id)
                    .ok_or_else(|| {
                        EngineError::Validation(t_with_args(
                            "save.unknown_master",
                            &[("master", master_id), ("plant", plant_id)],
                        ))
                    })?;
                Self::reject_code_collision(&report, &code, None)?;
                ResolvedAction::CreateVariant {
                    master_id: master.master_id,
                }
            }
            Some(OperatorDecision::UpdateVariant { variant_id }) => {
                let variant = self
                    .variant_repo
                    .find_by_id(variant_id)?
                    .filter(|v| v.plant_id == plant_id)
                    .ok_or_else(|| {
                        EngineError::Validation(t_with_args(
                            "save.unknown_variant",
                            &[("variant", variant_id), ("plant", plant_id)],
                        ))
                    })?;
                Self::reject_code_collision(&report, &code, Some(variant_id))?;
                ResolvedAction::UpdateVariant {
                    variant_id: variant.recipe_id,
                    previous_code: variant.recipe_code,
                }
            }
        };

        Ok(ResolvedRecipe {
            final_code: code,
            variant_suffix,
            action,
            spec: draft.spec.clone(),
            materials: draft.materials.clone(),
            notes: draft.notes.clone(),
        })
    }

    /// 编码已被（除自身外的）其他变体占用时拒绝
    fn reject_code_collision(report: &MatchReport, code: &str, own_variant: Option<&str>) -> EngineResult<()> {
        match report.code_collision() {
            Some(c) if Some(c.variant.recipe_id.as_str()) != own_variant => Err(EngineError::Validation(
                t_with_args("save.code_taken", &[("code", code)]),
            )),
            _ => Ok(()),
        }
    }
}
