// ==========================================
// 混凝土配方治理引擎 - 规格匹配器
// ==========================================
// 候选 = 核心规格相同的变体 ∪ 编码文本相同的变体（按 recipe_id 去重）
// 匹配口径: 数值精确相等，编码大小写敏感，龄期只在同单位下比较
// ==========================================

use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::domain::decision::{CollisionCandidate, MatchKind};
use crate::domain::recipe::{MasterRecipe, RecipeSpecification, RecipeVariant};
use crate::engine::error::EngineResult;
use crate::repository::{MasterRecipeRepository, RecipeVariantRepository};

/// 匹配结果
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MatchReport {
    pub candidates: Vec<CollisionCandidate>,
    /// 核心规格相同的启用主配方（createVariant 的可选目标）
    pub matching_masters: Vec<MasterRecipe>,
}

impl MatchReport {
    /// 是否需要操作员决策
    pub fn requires_decision(&self) -> bool {
        !self.candidates.is_empty() || !self.matching_masters.is_empty()
    }

    pub fn find(&self, variant_id: &str) -> Option<&CollisionCandidate> {
        self.candidates.iter().find(|c| c.variant.recipe_id == variant_id)
    }

    pub fn code_collision(&self) -> Option<&CollisionCandidate> {
        self.candidates.iter().find(|c| c.is_code_collision())
    }
}

// ==========================================
// SpecificationMatcher
// ==========================================
pub struct SpecificationMatcher {
    variant_repo: Arc<RecipeVariantRepository>,
    master_repo: Arc<MasterRecipeRepository>,
}

impl SpecificationMatcher {
    pub fn new(variant_repo: Arc<RecipeVariantRepository>, master_repo: Arc<MasterRecipeRepository>) -> Self {
        Self {
            variant_repo,
            master_repo,
        }
    }

    /// 查找冲突候选
    ///
    /// # 参数
    /// - plant_id: 工厂
    /// - spec: 目标规格
    /// - candidate_code: 新计算出的（或人工覆盖的）最终编码
    pub fn find_collisions(
        &self,
        plant_id: &str,
        spec: &RecipeSpecification,
        candidate_code: &str,
    ) -> EngineResult<MatchReport> {
        let same_spec = self.variant_repo.find_same_spec(plant_id, spec)?;
        let code_match = self.variant_repo.find_by_code(plant_id, candidate_code)?;

        let mut master_ids: Vec<String> = same_spec
            .iter()
            .chain(code_match.iter())
            .filter_map(|v| v.master_recipe_id.clone())
            .collect();
        master_ids.sort();
        master_ids.dedup();
        let masters = self.master_repo.find_by_ids(&master_ids)?;

        let candidates = merge_candidates(same_spec, code_match, &masters);
        let matching_masters = self.master_repo.find_by_spec(plant_id, spec)?;

        tracing::debug!(
            plant_id,
            candidate_code,
            candidates = candidates.len(),
            masters = matching_masters.len(),
            "规格匹配完成"
        );

        Ok(MatchReport {
            candidates,
            matching_masters,
        })
    }
}

/// 合并两类候选并按 recipe_id 去重
///
/// 同一变体同时命中两类时标记为 `Both`。规格命中在前，纯编码命中在后。
pub fn merge_candidates(
    same_spec: Vec<RecipeVariant>,
    code_match: Option<RecipeVariant>,
    masters: &[MasterRecipe],
) -> Vec<CollisionCandidate> {
    let master_codes: HashMap<&str, &str> = masters
        .iter()
        .map(|m| (m.master_id.as_str(), m.master_code.as_str()))
        .collect();
    let master_code_of = |v: &RecipeVariant| {
        v.master_recipe_id
            .as_deref()
            .and_then(|id| master_codes.get(id))
            .map(|code| code.to_string())
    };

    let code_match_id = code_match.as_ref().map(|v| v.recipe_id.clone());

    let mut candidates: Vec<CollisionCandidate> = same_spec
        .into_iter()
        .map(|variant| {
            let match_kind = if code_match_id.as_deref() == Some(variant.recipe_id.as_str()) {
                MatchKind::Both
            } else {
                MatchKind::SameSpecification
            };
            CollisionCandidate {
                master_code: master_code_of(&variant),
                variant,
                match_kind,
            }
        })
        .collect();

    if let Some(variant) = code_match {
        if !candidates.iter().any(|c| c.variant.recipe_id == variant.recipe_id) {
            candidates.push(CollisionCandidate {
                master_code: master_code_of(&variant),
                variant,
                match_kind: MatchKind::CodeCollision,
            });
        }
    }

    candidates
}
