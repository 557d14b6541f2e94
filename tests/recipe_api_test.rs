// ==========================================
// RecipeApi 集成测试
// ==========================================
// 覆盖: 编码预览、冲突查询、错误映射、材料目录缓存
// ==========================================

#[path = "helpers/test_data_builder.rs"]
mod test_data_builder;

use std::time::Duration;

use recipe_governance::domain::decision::MatchKind;
use recipe_governance::domain::material::CatalogMaterial;
use recipe_governance::domain::types::{AgeUnit, MaterialRole, PlacementType, RecipeType};
use recipe_governance::engine::FormulationHints;
use recipe_governance::repository::MaterialCatalogRepository;
use recipe_governance::ApiError;

use test_data_builder::{batch, DraftBuilder, SpecBuilder};
use test_helpers::{TestEnv, PLANT_ID};

const FC_CODE: &str = "5-250-2-B-28-10-D-2-000";

// ==========================================
// 编码预览
// ==========================================

#[test]
fn test_generate_code_preview() {
    let env = TestEnv::new().unwrap();
    let api = &env.state.recipe_api;

    let codes = api
        .generate_code(&SpecBuilder::new().build(), FormulationHints::default())
        .unwrap();
    assert_eq!(codes.long_code, FC_CODE);
    assert_eq!(codes.short_code, "25028210D");

    let pce = api
        .generate_code(&SpecBuilder::new().build(), FormulationHints { has_pce: true })
        .unwrap();
    assert_eq!(pce.long_code, "5-250-2-B-28-10-D-2-PCE");

    let mut mr = SpecBuilder::new().strength(45.0).age(12, AgeUnit::Hours).slump(8.0).build();
    mr.recipe_type = RecipeType::MR;
    mr.placement_type = PlacementType::Pumped;
    mr.max_aggregate_size = 40.0;
    let codes = api.generate_code(&mr, FormulationHints::default()).unwrap();
    assert_eq!(codes.long_code, "PAV-045-4-B-12-08-B-2-000");
}

#[test]
fn test_generate_code_rejects_negative_strength() {
    let env = TestEnv::new().unwrap();
    let err = env
        .state
        .recipe_api
        .generate_code(&SpecBuilder::new().strength(-1.0).build(), FormulationHints::default())
        .unwrap_err();
    assert!(matches!(err, ApiError::InvalidInput(_)));
}

// ==========================================
// 冲突查询
// ==========================================

#[tokio::test]
async fn test_find_collisions_by_spec_and_code() {
    let env = TestEnv::new().unwrap();
    let api = &env.state.recipe_api;
    let spec = SpecBuilder::new().build();
    api.resolve_and_persist(batch(PLANT_ID, vec![DraftBuilder::new(spec.clone()).build()]))
        .await
        .unwrap();

    // 同规格、不同编码
    let report = api.find_collisions(&spec, "OTRO-CODIGO", PLANT_ID).unwrap();
    assert_eq!(report.candidates.len(), 1);
    assert_eq!(report.candidates[0].match_kind, MatchKind::SameSpecification);
    assert_eq!(report.candidates[0].master_code.as_deref(), Some("5-250-2-B-28-10-D"));
    assert_eq!(report.matching_masters.len(), 1);
    assert!(report.requires_decision());

    // 龄期单位不同不算同规格，只剩编码冲突
    let hours = SpecBuilder::new().age(28, AgeUnit::Hours).build();
    let report = api.find_collisions(&hours, FC_CODE, PLANT_ID).unwrap();
    assert_eq!(report.candidates.len(), 1);
    assert_eq!(report.candidates[0].match_kind, MatchKind::CodeCollision);
    assert!(report.matching_masters.is_empty());
    assert!(report.code_collision().is_some());

    // 编码大小写敏感
    let other = SpecBuilder::new().strength(300.0).build();
    let report = api
        .find_collisions(&other, &FC_CODE.to_lowercase(), PLANT_ID)
        .unwrap();
    assert!(!report.requires_decision());

    // 其他工厂看不到
    let report = api.find_collisions(&spec, FC_CODE, "P2").unwrap();
    assert!(report.candidates.is_empty());

    assert!(matches!(
        api.find_collisions(&spec, FC_CODE, ""),
        Err(ApiError::InvalidInput(_))
    ));
}

// ==========================================
// 错误映射
// ==========================================

#[tokio::test]
async fn test_resave_maps_to_decision_required() {
    let env = TestEnv::new().unwrap();
    let api = &env.state.recipe_api;
    let spec = SpecBuilder::new().build();
    api.resolve_and_persist(batch(PLANT_ID, vec![DraftBuilder::new(spec.clone()).build()]))
        .await
        .unwrap();

    let err = api
        .resolve_and_persist(batch(PLANT_ID, vec![DraftBuilder::new(spec).build()]))
        .await
        .unwrap_err();
    match err {
        ApiError::DecisionRequired { code, candidates } => {
            assert_eq!(code, FC_CODE);
            assert_eq!(candidates.len(), 1);
            assert_eq!(candidates[0].match_kind, MatchKind::Both);
        }
        other => panic!("expected DecisionRequired, got {:?}", other),
    }
    assert_eq!(env.count_rows("recipe_version").unwrap(), 1);
}

#[tokio::test]
async fn test_materials_failure_maps_to_retryable() {
    let env = TestEnv::new().unwrap();
    let api = &env.state.recipe_api;
    env.execute("DROP TABLE recipe_reference_material").unwrap();

    let err = api
        .resolve_and_persist(batch(PLANT_ID, vec![DraftBuilder::new(SpecBuilder::new().build()).build()]))
        .await
        .unwrap_err();
    let targets = err.retry_targets().map(|t| t.to_vec()).unwrap_or_default();
    assert!(matches!(err, ApiError::MaterialsRetryable { .. }));
    assert_eq!(targets.len(), 1);
    assert_eq!(targets[0].recipe_code, FC_CODE);

    env.reinit_schema().unwrap();
    let outcome = api.repair_materials(targets).await.unwrap();
    assert_eq!(outcome.updated.len(), 1);
    assert_eq!(outcome.reference_rows, 4);
}

// ==========================================
// 材料目录与缓存
// ==========================================

fn extra_material(id: &str, name: &str) -> CatalogMaterial {
    CatalogMaterial {
        material_id: id.to_string(),
        plant_id: PLANT_ID.to_string(),
        material_name: name.to_string(),
        material_code: id.to_string(),
        category: "aditivo".to_string(),
        subcategory: None,
        unit_of_measure: Some("kg/m³".to_string()),
        is_active: true,
        role: MaterialRole::Admixture,
    }
}

#[test]
fn test_list_available_materials_sorted_by_name() {
    let env = TestEnv::new().unwrap();
    let names: Vec<String> = env
        .state
        .recipe_api
        .list_available_materials(PLANT_ID)
        .unwrap()
        .into_iter()
        .map(|m| m.material_name)
        .collect();
    assert_eq!(
        names,
        vec![
            "ADITIVO PCE",
            "ADITIVO RETARDANTE",
            "AGUA",
            "ARENA",
            "CEMENTO CPC 40",
            "GRAVA 20MM"
        ]
    );
}

#[test]
fn test_catalog_cache_invalidation_and_ttl() {
    let env = TestEnv::new().unwrap();
    let api = &env.state.recipe_api;
    assert_eq!(api.list_available_materials(PLANT_ID).unwrap().len(), 6);

    // 经 API 写入 → 缓存失效
    let written = api
        .upsert_catalog_materials(PLANT_ID, vec![extra_material("MAT-FIBRA", "FIBRA")])
        .unwrap();
    assert_eq!(written, 1);
    assert_eq!(api.list_available_materials(PLANT_ID).unwrap().len(), 7);

    // 绕过 API 直接写库 → 缓存仍为旧值
    let repo = MaterialCatalogRepository::new(env.conn.clone());
    repo.upsert_materials(&[extra_material("MAT-HUMO", "HUMO DE SILICE")]).unwrap();
    assert_eq!(api.list_available_materials(PLANT_ID).unwrap().len(), 7);

    // TTL 到期后重新加载
    env.clock.advance(env.state.settings.catalog_cache_ttl() + Duration::from_secs(1));
    assert_eq!(api.list_available_materials(PLANT_ID).unwrap().len(), 8);

    // register_plant 同样使缓存失效
    repo.upsert_materials(&[extra_material("MAT-COLOR", "PIGMENTO")]).unwrap();
    api.register_plant(PLANT_ID, "Planta Norte II").unwrap();
    assert_eq!(api.list_available_materials(PLANT_ID).unwrap().len(), 9);
}

#[test]
fn test_upsert_rejects_foreign_plant_material() {
    let env = TestEnv::new().unwrap();
    let mut foreign = extra_material("MAT-X", "X");
    foreign.plant_id = "P2".to_string();
    let err = env
        .state
        .recipe_api
        .upsert_catalog_materials(PLANT_ID, vec![foreign])
        .unwrap_err();
    assert!(matches!(err, ApiError::InvalidInput(_)));
    assert!(env.state.recipe_api.register_plant(" ", "x").is_err());
}
