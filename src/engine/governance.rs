// ==========================================
// 混凝土配方治理引擎 - 治理报告
// ==========================================
// 只读诊断，不修改任何数据:
// 主配方 → 变体 → 版本 → 最新版本的材料 → 校验问题 → 汇总
// 批量查询按配置分块，块之间并发执行
// ==========================================

use std::collections::{BTreeSet, HashMap};

use futures::future::try_join_all;

use crate::config::EngineSettings;
use crate::domain::governance::{
    GovernanceSummary, MasterGovernanceData, VariantVersionStatus, VersionSnapshot,
};
use crate::domain::material::{MaterialCatalog, MaterialQuantity, ValidationEntry};
use crate::domain::recipe::{RecipeVariant, RecipeVersion};
use crate::domain::types::VariantStatus;
use crate::engine::error::EngineResult;
use crate::engine::material_validator::MaterialValidator;
use crate::engine::repositories::RecipeRepositories;
use crate::perf::PerfGuard;
use crate::repository::{RepositoryError, RepositoryResult};

/// 单个变体的版本诊断
#[derive(Debug, Clone)]
pub struct VersionDiagnosis<'a> {
    pub latest: Option<&'a RecipeVersion>,
    pub current_flagged_count: usize,
    pub status: VariantStatus,
}

/// 诊断一个变体的全部版本
///
/// - 最新版本: created_at 最大，同时刻取版本号更大者
/// - 多个版本被标记为当前 → Inconsistent
/// - 最新版本被标记为当前 → UpToDate
/// - 有版本但最新版本未标记 → Outdated
/// - 无版本 → NoVersion
pub fn diagnose_versions<'a>(versions: &[&'a RecipeVersion]) -> VersionDiagnosis<'a> {
    let latest = versions
        .iter()
        .copied()
        .fold(None::<&RecipeVersion>, |best, v| match best {
            Some(b) if !v.is_newer_than(b) => Some(b),
            _ => Some(v),
        });
    let current_flagged_count = versions.iter().filter(|v| v.is_current).count();

    let status = match latest {
        None => VariantStatus::NoVersion,
        Some(_) if current_flagged_count > 1 => VariantStatus::Inconsistent,
        Some(v) if v.is_current => VariantStatus::UpToDate,
        Some(_) => VariantStatus::Outdated,
    };

    VersionDiagnosis {
        latest,
        current_flagged_count,
        status,
    }
}

/// 报价系统使用的变体: 最新版本最新的那个（无版本的变体不参与）
pub fn quote_builder_variant<'a>(latest_by_variant: &[(&'a str, Option<&RecipeVersion>)]) -> Option<&'a str> {
    latest_by_variant
        .iter()
        .filter_map(|(id, latest)| latest.map(|v| (*id, v)))
        .fold(None::<(&str, &RecipeVersion)>, |best, (id, v)| match best {
            Some((_, b)) if !v.is_newer_than(b) => best,
            _ => Some((id, v)),
        })
        .map(|(id, _)| id)
}

// ==========================================
// GovernanceReporter
// ==========================================
pub struct GovernanceReporter {
    repos: RecipeRepositories,
    settings: EngineSettings,
}

impl GovernanceReporter {
    pub fn new(repos: RecipeRepositories, settings: EngineSettings) -> Self {
        Self { repos, settings }
    }

    /// 生成某工厂全部启用主配方的治理报告
    pub async fn report(&self, plant_id: &str) -> EngineResult<Vec<MasterGovernanceData>> {
        let _perf = PerfGuard::new("governance_report");

        let masters = self.repos.master_repo.list_active_by_plant(plant_id)?;
        if masters.is_empty() {
            tracing::info!(plant_id, "工厂没有启用的主配方");
            return Ok(Vec::new());
        }

        // ----- 变体 -----
        let master_ids: Vec<String> = masters.iter().map(|m| m.master_id.clone()).collect();
        let variant_repo = self.repos.variant_repo.clone();
        let variants = fetch_chunked(master_ids, self.settings.version_lookup_chunk_size, move |ids| {
            variant_repo.find_by_master_ids(ids)
        })
        .await?;

        // ----- 版本 -----
        let variant_ids: Vec<String> = variants.iter().map(|v| v.recipe_id.clone()).collect();
        let version_repo = self.repos.version_repo.clone();
        let versions = fetch_chunked(variant_ids, self.settings.version_lookup_chunk_size, move |ids| {
            version_repo.find_by_recipe_ids(ids)
        })
        .await?;

        let mut versions_by_variant: HashMap<&str, Vec<&RecipeVersion>> = HashMap::new();
        for v in &versions {
            versions_by_variant.entry(v.recipe_id.as_str()).or_default().push(v);
        }
        let diagnoses: HashMap<&str, VersionDiagnosis> = variants
            .iter()
            .map(|variant| {
                let list = versions_by_variant
                    .get(variant.recipe_id.as_str())
                    .map(|l| l.as_slice())
                    .unwrap_or(&[]);
                (variant.recipe_id.as_str(), diagnose_versions(list))
            })
            .collect();

        // ----- 最新版本的材料 -----
        let latest_ids: Vec<String> = diagnoses
            .values()
            .filter_map(|d| d.latest.map(|v| v.version_id.clone()))
            .collect();
        let quantity_repo = self.repos.quantity_repo.clone();
        let quantities = fetch_chunked(latest_ids, self.settings.material_quantity_chunk_size, move |ids| {
            quantity_repo.find_by_version_ids(ids)
        })
        .await?;

        let material_ids: Vec<String> = quantities
            .iter()
            .filter_map(|q| q.material_id.clone())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        let catalog_repo = self.repos.catalog_repo.clone();
        let details = fetch_chunked(material_ids, self.settings.material_detail_chunk_size, move |ids| {
            catalog_repo.find_by_ids(ids)
        })
        .await?;
        let catalog = MaterialCatalog::new(details);

        let mut quantities_by_version: HashMap<&str, Vec<&MaterialQuantity>> = HashMap::new();
        for q in &quantities {
            quantities_by_version
                .entry(q.recipe_version_id.as_str())
                .or_default()
                .push(q);
        }

        // ----- 按主配方组装 -----
        let mut variants_by_master: HashMap<&str, Vec<&RecipeVariant>> = HashMap::new();
        for v in &variants {
            if let Some(master_id) = v.master_recipe_id.as_deref() {
                variants_by_master.entry(master_id).or_default().push(v);
            }
        }

        let report: Vec<MasterGovernanceData> = masters
            .iter()
            .map(|master| {
                let own = variants_by_master
                    .get(master.master_id.as_str())
                    .map(|l| l.as_slice())
                    .unwrap_or(&[]);
                let latest_pairs: Vec<(&str, Option<&RecipeVersion>)> = own
                    .iter()
                    .map(|v| {
                        let latest = diagnoses.get(v.recipe_id.as_str()).and_then(|d| d.latest);
                        (v.recipe_id.as_str(), latest)
                    })
                    .collect();
                let quote_builder_id = quote_builder_variant(&latest_pairs).map(|s| s.to_string());

                let statuses: Vec<VariantVersionStatus> = own
                    .iter()
                    .map(|variant| {
                        let diagnosis = diagnoses.get(variant.recipe_id.as_str());
                        let latest = diagnosis.and_then(|d| d.latest);
                        let is_quote_builder = quote_builder_id.as_deref() == Some(variant.recipe_id.as_str());

                        let materials: Vec<ValidationEntry> = latest
                            .and_then(|v| quantities_by_version.get(v.version_id.as_str()))
                            .map(|rows| {
                                rows.iter()
                                    .map(|q| ValidationEntry::from_quantity(q, &catalog))
                                    .collect()
                            })
                            .unwrap_or_default();
                        // 无版本的变体不做材料校验
                        let validation_issues = if latest.is_some() {
                            MaterialValidator::validate(&materials, is_quote_builder)
                        } else {
                            Vec::new()
                        };

                        VariantVersionStatus {
                            variant_id: variant.recipe_id.clone(),
                            recipe_code: variant.recipe_code.clone(),
                            variant_suffix: variant.variant_suffix.clone(),
                            latest_version: latest.map(|v| VersionSnapshot {
                                version_id: v.version_id.clone(),
                                version_number: v.version_number,
                                created_at: v.created_at,
                                is_current: v.is_current,
                            }),
                            current_flagged_count: diagnosis.map(|d| d.current_flagged_count).unwrap_or(0),
                            materials,
                            status: diagnosis.map(|d| d.status).unwrap_or(VariantStatus::NoVersion),
                            is_quote_builder_variant: is_quote_builder,
                            validation_issues,
                        }
                    })
                    .collect();

                MasterGovernanceData {
                    master_id: master.master_id.clone(),
                    master_code: master.master_code.clone(),
                    strength_fc: master.strength_fc,
                    placement_type: master.placement_type.code().to_string(),
                    slump: master.slump,
                    max_aggregate_size: master.max_aggregate_size,
                    quote_builder_variant_id: quote_builder_id,
                    summary: GovernanceSummary::from_variants(&statuses),
                    variants: statuses,
                }
            })
            .collect();

        let inconsistent: usize = report.iter().map(|m| m.summary.inconsistent_count).sum();
        if inconsistent > 0 {
            tracing::warn!(plant_id, inconsistent, "存在多个当前版本的变体");
        }
        tracing::info!(
            plant_id,
            masters = report.len(),
            variants = variants.len(),
            versions = versions.len(),
            "治理报告生成完成"
        );

        Ok(report)
    }
}

/// 按块并发执行只读查询并按块顺序拼接结果
async fn fetch_chunked<T, F>(ids: Vec<String>, chunk_size: usize, fetch: F) -> EngineResult<Vec<T>>
where
    T: Send + 'static,
    F: Fn(&[String]) -> RepositoryResult<Vec<T>> + Clone + Send + 'static,
{
    if ids.is_empty() {
        return Ok(Vec::new());
    }

    let tasks = ids.chunks(chunk_size.max(1)).map(|chunk| {
        let chunk = chunk.to_vec();
        let fetch = fetch.clone();
        async move {
            tokio::task::spawn_blocking(move || fetch(&chunk))
                .await
                .map_err(|e| RepositoryError::InternalError(format!("分块查询任务失败: {}", e)))?
        }
    });

    let parts = try_join_all(tasks).await?;
    Ok(parts.into_iter().flatten().collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn version(id: &str, number: i32, minute: u32, is_current: bool) -> RecipeVersion {
        RecipeVersion {
            version_id: id.to_string(),
            recipe_id: "R1".to_string(),
            version_number: number,
            is_current,
            notes: None,
            created_at: NaiveDate::from_ymd_opt(2025, 3, 1)
                .and_then(|d| d.and_hms_opt(8, minute, 0))
                .unwrap(),
        }
    }

    #[test]
    fn test_latest_flagged_is_up_to_date() {
        let v1 = version("V1", 1, 0, false);
        let v2 = version("V2", 2, 5, true);
        let d = diagnose_versions(&[&v1, &v2]);
        assert_eq!(d.status, VariantStatus::UpToDate);
        assert_eq!(d.latest.map(|v| v.version_id.as_str()), Some("V2"));
        assert_eq!(d.current_flagged_count, 1);
    }

    #[test]
    fn test_older_flag_is_outdated() {
        let v1 = version("V1", 1, 0, true);
        let v2 = version("V2", 2, 5, false);
        assert_eq!(diagnose_versions(&[&v1, &v2]).status, VariantStatus::Outdated);
    }

    #[test]
    fn test_two_flags_are_inconsistent() {
        let v1 = version("V1", 1, 0, true);
        let v2 = version("V2", 2, 5, true);
        let d = diagnose_versions(&[&v2, &v1]);
        assert_eq!(d.status, VariantStatus::Inconsistent);
        assert_eq!(d.current_flagged_count, 2);
    }

    #[test]
    fn test_no_versions_and_timestamp_ties() {
        assert_eq!(diagnose_versions(&[]).status, VariantStatus::NoVersion);

        // 同一时刻写入时按版本号取最新
        let v1 = version("V1", 1, 0, false);
        let v2 = version("V2", 2, 0, true);
        let d = diagnose_versions(&[&v2, &v1]);
        assert_eq!(d.latest.map(|v| v.version_number), Some(2));
        assert_eq!(d.status, VariantStatus::UpToDate);
    }

    #[test]
    fn test_quote_builder_picks_newest_latest_version() {
        let a = version("VA", 1, 0, true);
        let b = version("VB", 1, 10, true);
        let pairs = vec![("A", Some(&a)), ("B", Some(&b)), ("C", None)];
        assert_eq!(quote_builder_variant(&pairs), Some("B"));
        assert_eq!(quote_builder_variant(&[("C", None)]), None);
    }
}
