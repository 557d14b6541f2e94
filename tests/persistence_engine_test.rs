// ==========================================
// 持久化引擎集成测试
// ==========================================
// 覆盖: 新主配方、版本单调、批内重复编码零写入、零材料中止、
//       决策流程、材料失败与修复、单变体材料更新、
//       批内主配方规格冲突、锁等待重试、变体阶段失败
// ==========================================

#[path = "helpers/test_data_builder.rs"]
mod test_data_builder;

use std::sync::Arc;
use std::time::Duration;

use recipe_governance::domain::decision::{MatchKind, OperatorDecision};
use recipe_governance::domain::material::{MaterialCatalog, MaterialSelection};
use recipe_governance::domain::types::{AgeUnit, MaterialRole};
use recipe_governance::engine::{
    DecisionResolver, EngineError, RecipePersistenceEngine, SpecificationMatcher,
};
use recipe_governance::repository::RepositoryError;

use test_data_builder::{batch, line, DraftBuilder, SpecBuilder};
use test_helpers::{fast_settings, open_test_connection, TestEnv, PCE_ID, PLANT_ID};

fn engine(env: &TestEnv) -> RecipePersistenceEngine {
    let matcher = Arc::new(SpecificationMatcher::new(
        env.repos.variant_repo.clone(),
        env.repos.master_repo.clone(),
    ));
    let resolver = Arc::new(DecisionResolver::new(
        matcher,
        env.repos.master_repo.clone(),
        env.repos.variant_repo.clone(),
    ));
    RecipePersistenceEngine::new(env.repos.clone(), resolver, env.clock.clone(), fast_settings())
}

fn catalog(env: &TestEnv) -> MaterialCatalog {
    MaterialCatalog::new(env.repos.catalog_repo.list_active_by_plant(PLANT_ID).unwrap())
}

fn assert_no_recipe_writes(env: &TestEnv) {
    for table in ["master_recipe", "recipe", "recipe_version", "material_quantity", "recipe_reference_material"] {
        assert_eq!(env.count_rows(table).unwrap(), 0, "表 {} 不应有写入", table);
    }
}

#[tokio::test]
async fn test_first_save_creates_master_variant_and_version() {
    let env = TestEnv::new().unwrap();
    let engine = engine(&env);

    let draft = DraftBuilder::new(SpecBuilder::new().build()).notes("primera versión").build();
    let outcome = engine
        .resolve_and_persist(&batch(PLANT_ID, vec![draft]), &catalog(&env))
        .await
        .unwrap();

    assert_eq!(outcome.saved.len(), 1);
    assert_eq!(outcome.masters_created, 1);
    assert_eq!(outcome.dry_rows, 4);
    assert_eq!(outcome.reference_rows, 4);
    assert!(outcome.empty_versions.is_empty());

    let saved = &outcome.saved[0];
    assert_eq!(saved.recipe_code, "5-250-2-B-28-10-D-2-000");
    assert_eq!(saved.version_number, 1);
    assert_eq!(saved.action, "newMaster");

    let master = env
        .repos
        .master_repo
        .find_by_code(PLANT_ID, "5-250-2-B-28-10-D")
        .unwrap()
        .expect("master should exist");
    assert_eq!(saved.master_id.as_deref(), Some(master.master_id.as_str()));

    let variant = env.repos.variant_repo.find_by_id(&saved.variant_id).unwrap().unwrap();
    assert_eq!(variant.variant_suffix.as_deref(), Some("2-000"));
    assert_eq!(variant.master_recipe_id.as_deref(), Some(master.master_id.as_str()));

    let versions = env.repos.version_repo.find_by_recipe(&saved.variant_id).unwrap();
    assert_eq!(versions.len(), 1);
    assert!(versions[0].is_current);
    assert_eq!(versions[0].notes.as_deref(), Some("primera versión"));
}

#[tokio::test]
async fn test_resave_requires_decision_then_versions_are_monotonic() {
    let env = TestEnv::new().unwrap();
    let engine = engine(&env);
    let catalog = catalog(&env);
    let spec = SpecBuilder::new().build();

    let first = engine
        .resolve_and_persist(&batch(PLANT_ID, vec![DraftBuilder::new(spec.clone()).build()]), &catalog)
        .await
        .unwrap();
    let variant_id = first.saved[0].variant_id.clone();

    // 不带决策再次保存: 同规格 + 同编码
    let err = engine
        .resolve_and_persist(&batch(PLANT_ID, vec![DraftBuilder::new(spec.clone()).build()]), &catalog)
        .await
        .unwrap_err();
    match err {
        EngineError::CollisionRequiresDecision { candidates, .. } => {
            assert_eq!(candidates.len(), 1);
            assert_eq!(candidates[0].variant.recipe_id, variant_id);
            assert_eq!(candidates[0].match_kind, MatchKind::Both);
            assert_eq!(candidates[0].master_code.as_deref(), Some("5-250-2-B-28-10-D"));
        }
        other => panic!("Expected CollisionRequiresDecision, got {:?}", other),
    }
    assert_eq!(env.count_rows("recipe_version").unwrap(), 1);

    for expected in [2, 3] {
        let draft = DraftBuilder::new(spec.clone())
            .decision(OperatorDecision::UpdateVariant {
                variant_id: variant_id.clone(),
            })
            .build();
        let outcome = engine
            .resolve_and_persist(&batch(PLANT_ID, vec![draft]), &catalog)
            .await
            .unwrap();
        assert_eq!(outcome.saved[0].version_number, expected);
        assert_eq!(outcome.saved[0].action, "updateVariant");
        assert_eq!(outcome.masters_created, 0);
    }

    let versions = env.repos.version_repo.find_by_recipe(&variant_id).unwrap();
    let numbers: Vec<i32> = versions.iter().map(|v| v.version_number).collect();
    assert_eq!(numbers, vec![1, 2, 3]);
    let current: Vec<i32> = versions.iter().filter(|v| v.is_current).map(|v| v.version_number).collect();
    assert_eq!(current, vec![3]);
    assert_eq!(env.count_rows("recipe").unwrap(), 1);
    assert_eq!(env.count_rows("master_recipe").unwrap(), 1);
}

#[tokio::test]
async fn test_update_variant_can_rename_code() {
    let env = TestEnv::new().unwrap();
    let engine = engine(&env);
    let catalog = catalog(&env);
    let spec = SpecBuilder::new().build();

    let first = engine
        .resolve_and_persist(&batch(PLANT_ID, vec![DraftBuilder::new(spec.clone()).build()]), &catalog)
        .await
        .unwrap();
    let variant_id = first.saved[0].variant_id.clone();

    let renamed = DraftBuilder::new(spec)
        .code("5-250-2-B-28-10-D-2-R01")
        .decision(OperatorDecision::UpdateVariant {
            variant_id: variant_id.clone(),
        })
        .build();
    let outcome = engine
        .resolve_and_persist(&batch(PLANT_ID, vec![renamed]), &catalog)
        .await
        .unwrap();
    assert_eq!(outcome.saved[0].recipe_code, "5-250-2-B-28-10-D-2-R01");

    let variant = env.repos.variant_repo.find_by_id(&variant_id).unwrap().unwrap();
    assert_eq!(variant.recipe_code, "5-250-2-B-28-10-D-2-R01");
    assert_eq!(variant.variant_suffix.as_deref(), Some("2-R01"));
    assert!(env
        .repos
        .variant_repo
        .find_by_code(PLANT_ID, "5-250-2-B-28-10-D-2-000")
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn test_create_variant_under_existing_master() {
    let env = TestEnv::new().unwrap();
    let engine = engine(&env);
    let catalog = catalog(&env);
    let spec = SpecBuilder::new().build();

    let first = engine
        .resolve_and_persist(&batch(PLANT_ID, vec![DraftBuilder::new(spec.clone()).build()]), &catalog)
        .await
        .unwrap();
    let master_id = first.saved[0].master_id.clone().unwrap();

    let pce_draft = DraftBuilder::new(spec)
        .with_line(line(MaterialRole::Admixture, Some(PCE_ID), 2.5, Some(2.5)))
        .decision(OperatorDecision::CreateVariant {
            master_id: master_id.clone(),
        })
        .build();
    let outcome = engine
        .resolve_and_persist(&batch(PLANT_ID, vec![pce_draft]), &catalog)
        .await
        .unwrap();

    let saved = &outcome.saved[0];
    assert_eq!(saved.recipe_code, "5-250-2-B-28-10-D-2-PCE");
    assert_eq!(saved.version_number, 1);
    assert_eq!(saved.action, "createVariant");
    assert_eq!(saved.master_id.as_deref(), Some(master_id.as_str()));
    assert_eq!(outcome.dry_rows, 5);
    assert_eq!(env.count_rows("master_recipe").unwrap(), 1);
    assert_eq!(env.count_rows("recipe").unwrap(), 2);
}

#[tokio::test]
async fn test_duplicate_codes_in_batch_write_nothing() {
    let env = TestEnv::new().unwrap();
    let engine = engine(&env);

    let a = DraftBuilder::new(SpecBuilder::new().build()).build();
    let b = DraftBuilder::new(SpecBuilder::new().build()).build();
    let err = engine
        .resolve_and_persist(&batch(PLANT_ID, vec![a, b]), &catalog(&env))
        .await
        .unwrap_err();

    match err {
        EngineError::DuplicateFinalCode { code } => assert_eq!(code, "5-250-2-B-28-10-D-2-000"),
        other => panic!("Expected DuplicateFinalCode, got {:?}", other),
    }
    assert_no_recipe_writes(&env);
}

#[tokio::test]
async fn test_same_spec_drafts_share_one_new_master() {
    let env = TestEnv::new().unwrap();
    let engine = engine(&env);

    // 同规格、不同组成 → 同一主配方编码，两个变体
    let plain = DraftBuilder::new(SpecBuilder::new().build()).build();
    let pce = DraftBuilder::new(SpecBuilder::new().build())
        .with_line(line(MaterialRole::Admixture, Some(PCE_ID), 2.5, None))
        .build();
    let outcome = engine
        .resolve_and_persist(&batch(PLANT_ID, vec![plain, pce]), &catalog(&env))
        .await
        .unwrap();

    assert_eq!(outcome.masters_created, 1);
    assert_eq!(outcome.saved.len(), 2);
    assert_eq!(outcome.saved[0].master_id, outcome.saved[1].master_id);
    assert_eq!(env.count_rows("recipe").unwrap(), 2);
}

#[tokio::test]
async fn test_new_master_code_with_conflicting_specs_is_rejected() {
    let env = TestEnv::new().unwrap();
    let engine = engine(&env);

    // 12 天与 12 小时生成同一主配方编码，但核心规格不同
    let days = DraftBuilder::new(SpecBuilder::new().age(12, AgeUnit::Days).build()).build();
    let hours = DraftBuilder::new(SpecBuilder::new().age(12, AgeUnit::Hours).build())
        .with_line(line(MaterialRole::Admixture, Some(PCE_ID), 2.5, None))
        .build();

    let err = engine
        .resolve_and_persist(&batch(PLANT_ID, vec![days, hours]), &catalog(&env))
        .await
        .unwrap_err();
    assert!(err.is_pre_write());
    match &err {
        EngineError::Validation(msg) => assert!(msg.contains("5-250-2-B-12-10-D"), "{}", msg),
        other => panic!("Expected Validation, got {:?}", other),
    }
    assert_no_recipe_writes(&env);
}

#[tokio::test]
async fn test_zero_dry_materials_abort_whole_batch() {
    let env = TestEnv::new().unwrap();
    let engine = engine(&env);

    let good = DraftBuilder::new(SpecBuilder::new().build()).build();
    let empty = DraftBuilder::new(SpecBuilder::new().strength(300.0).build())
        .materials(vec![
            line(MaterialRole::Cement, None, 0.0, Some(320.0)),
            line(MaterialRole::Water, None, f64::NAN, None),
        ])
        .build();

    let err = engine
        .resolve_and_persist(&batch(PLANT_ID, vec![good, empty]), &catalog(&env))
        .await
        .unwrap_err();
    assert!(err.is_pre_write());
    match err {
        EngineError::NoMaterials { recipe_code } => assert_eq!(recipe_code, "5-300-2-B-28-10-D-2-000"),
        other => panic!("Expected NoMaterials, got {:?}", other),
    }
    assert_no_recipe_writes(&env);
}

#[tokio::test]
async fn test_missing_plant_or_materials_is_validation_error() {
    let env = TestEnv::new().unwrap();
    let engine = engine(&env);
    let catalog = catalog(&env);

    let draft = DraftBuilder::new(SpecBuilder::new().build()).build();
    for plant in ["", "PX"] {
        let err = engine
            .resolve_and_persist(&batch(plant, vec![draft.clone()]), &catalog)
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::Validation(_)), "plant={:?}", plant);
    }

    let no_lines = DraftBuilder::new(SpecBuilder::new().build()).materials(vec![]).build();
    let err = engine
        .resolve_and_persist(&batch(PLANT_ID, vec![no_lines]), &catalog)
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Validation(_)));
    assert_no_recipe_writes(&env);
}

#[tokio::test]
async fn test_materials_failure_then_repair() {
    let env = TestEnv::new().unwrap();
    let engine = engine(&env);

    // SSS 表缺失 → 干料写入成功，SSS 写入失败（非暂时性，不重试）
    env.execute("DROP TABLE recipe_reference_material;").unwrap();

    let draft = DraftBuilder::new(SpecBuilder::new().build()).build();
    let err = engine
        .resolve_and_persist(&batch(PLANT_ID, vec![draft]), &catalog(&env))
        .await
        .unwrap_err();

    assert!(err.is_recoverable());
    let targets = err.retry_targets().unwrap().to_vec();
    match &err {
        EngineError::MaterialsPersistenceFailed { attempts, .. } => assert_eq!(*attempts, 1),
        other => panic!("Expected MaterialsPersistenceFailed, got {:?}", other),
    }
    assert_eq!(targets.len(), 1);
    assert_eq!(targets[0].recipe_code, "5-250-2-B-28-10-D-2-000");
    assert_eq!(targets[0].dry_rows.len(), 4);
    assert_eq!(targets[0].reference_rows.len(), 4);

    // 配方与版本已提交
    assert_eq!(env.count_rows("recipe_version").unwrap(), 1);
    assert_eq!(env.count_rows("material_quantity").unwrap(), 4);

    env.reinit_schema().unwrap();
    let repaired = engine.repair_materials(&targets).await.unwrap();
    assert_eq!(repaired.updated, vec![targets[0].version_id.clone()]);
    assert!(repaired.skipped.is_empty());
    assert_eq!(repaired.dry_rows, 4);
    assert_eq!(repaired.reference_rows, 4);

    // 修复幂等: 先删后插，不会重复
    engine.repair_materials(&targets).await.unwrap();
    assert_eq!(env.count_rows("material_quantity").unwrap(), 4);
    assert_eq!(env.count_rows("recipe_reference_material").unwrap(), 4);
}

#[tokio::test]
async fn test_locked_database_is_retried_up_to_max_attempts() {
    let env = TestEnv::new().unwrap();
    let engine = engine(&env);

    env.execute("DROP TABLE recipe_reference_material;").unwrap();
    let draft = DraftBuilder::new(SpecBuilder::new().build()).build();
    let targets = engine
        .resolve_and_persist(&batch(PLANT_ID, vec![draft]), &catalog(&env))
        .await
        .unwrap_err()
        .retry_targets()
        .unwrap()
        .to_vec();
    env.reinit_schema().unwrap();

    // 另一连接持有写锁 → 共享连接写入返回 SQLITE_BUSY
    env.conn
        .lock()
        .unwrap()
        .busy_timeout(Duration::from_millis(10))
        .unwrap();
    let blocker = open_test_connection(&env.db_path).unwrap();
    blocker.execute_batch("BEGIN IMMEDIATE;").unwrap();

    let err = engine.repair_materials(&targets).await.unwrap_err();
    match &err {
        EngineError::MaterialsPersistenceFailed { attempts, retry_targets, .. } => {
            assert_eq!(*attempts, fast_settings().materials_retry_max_attempts);
            assert_eq!(retry_targets.len(), 1);
        }
        other => panic!("Expected MaterialsPersistenceFailed, got {:?}", other),
    }
    assert!(err.is_recoverable());

    // 锁释放后修复成功
    blocker.execute_batch("ROLLBACK;").unwrap();
    let repaired = engine.repair_materials(&targets).await.unwrap();
    assert_eq!(repaired.reference_rows, 4);
    assert_eq!(env.count_rows("recipe_reference_material").unwrap(), 4);
}

#[tokio::test]
async fn test_variant_phase_failure_reports_committed_master() {
    let env = TestEnv::new().unwrap();
    let engine = engine(&env);

    env.execute(
        "CREATE TRIGGER fail_variant_insert BEFORE INSERT ON recipe \
         BEGIN SELECT RAISE(ABORT, 'variant insert blocked'); END;",
    )
    .unwrap();

    let spec = SpecBuilder::new().build();
    let err = engine
        .resolve_and_persist(&batch(PLANT_ID, vec![DraftBuilder::new(spec.clone()).build()]), &catalog(&env))
        .await
        .unwrap_err();
    assert!(!err.is_pre_write());
    assert!(!err.is_recoverable());
    let master_id = match err {
        EngineError::RecipePersistenceFailed { phase, committed, .. } => {
            assert_eq!(phase, 6);
            assert!(committed.variant_ids.is_empty());
            assert!(committed.version_ids.is_empty());
            assert_eq!(committed.master_ids_by_code.len(), 1);
            let (code, id) = committed.master_ids_by_code[0].clone();
            assert_eq!(code, "5-250-2-B-28-10-D");
            id
        }
        other => panic!("Expected RecipePersistenceFailed, got {:?}", other),
    };
    assert_eq!(env.count_rows("master_recipe").unwrap(), 1);
    assert_eq!(env.count_rows("recipe").unwrap(), 0);

    // 挂到已提交的主配方下重新提交，不会产生第二个主配方
    env.execute("DROP TRIGGER fail_variant_insert;").unwrap();
    let retry = DraftBuilder::new(spec)
        .decision(OperatorDecision::CreateVariant { master_id: master_id.clone() })
        .build();
    let outcome = engine
        .resolve_and_persist(&batch(PLANT_ID, vec![retry]), &catalog(&env))
        .await
        .unwrap();
    assert_eq!(outcome.masters_created, 0);
    assert_eq!(outcome.saved.len(), 1);
    assert_eq!(outcome.saved[0].master_id.as_deref(), Some(master_id.as_str()));
    assert_eq!(env.count_rows("master_recipe").unwrap(), 1);
    assert_eq!(env.count_rows("recipe").unwrap(), 1);
}

#[tokio::test]
async fn test_repair_skips_unknown_versions() {
    let env = TestEnv::new().unwrap();
    let engine = engine(&env);

    let outcome = engine
        .resolve_and_persist(
            &batch(PLANT_ID, vec![DraftBuilder::new(SpecBuilder::new().build()).build()]),
            &catalog(&env),
        )
        .await
        .unwrap();

    let dry_rows = env
        .repos
        .quantity_repo
        .find_by_version_ids(&[outcome.saved[0].version_id.clone()])
        .unwrap();
    assert_eq!(dry_rows.len(), 4);

    let ghost = recipe_governance::domain::decision::RetryTarget {
        version_id: "no-such-version".to_string(),
        variant_id: "no-such-variant".to_string(),
        recipe_code: "X".to_string(),
        dry_rows: vec![],
        reference_rows: vec![],
    };
    let repaired = engine.repair_materials(&[ghost]).await.unwrap();
    assert!(repaired.updated.is_empty());
    assert_eq!(repaired.skipped, vec!["no-such-version".to_string()]);
}

#[tokio::test]
async fn test_update_variant_materials_appends_current_version() {
    let env = TestEnv::new().unwrap();
    let engine = engine(&env);
    let catalog = catalog(&env);

    let first = engine
        .resolve_and_persist(
            &batch(PLANT_ID, vec![DraftBuilder::new(SpecBuilder::new().build()).build()]),
            &catalog,
        )
        .await
        .unwrap();
    let variant_id = first.saved[0].variant_id.clone();

    let new_lines = vec![
        line(MaterialRole::Cement, None, 340.0, None),
        line(MaterialRole::Water, None, 180.0, None),
        line(MaterialRole::FineAggregate, None, 760.0, None),
    ];
    let saved = engine
        .update_variant_materials(
            PLANT_ID,
            &variant_id,
            &new_lines,
            &MaterialSelection::default(),
            Some("ajuste de cemento".to_string()),
            &catalog,
        )
        .await
        .unwrap();
    assert_eq!(saved.version_number, 2);
    assert_eq!(saved.action, "updateMaterials");
    assert_eq!(saved.recipe_code, first.saved[0].recipe_code);

    let versions = env.repos.version_repo.find_by_recipe(&variant_id).unwrap();
    assert_eq!(versions.iter().filter(|v| v.is_current).count(), 1);
    assert!(versions.iter().any(|v| v.version_number == 2 && v.is_current));

    let rows = env
        .repos
        .quantity_repo
        .find_by_version_ids(&[saved.version_id.clone()])
        .unwrap();
    assert_eq!(rows.len(), 3);

    // 无有效干料行
    let err = engine
        .update_variant_materials(
            PLANT_ID,
            &variant_id,
            &[line(MaterialRole::Cement, None, 0.0, None)],
            &MaterialSelection::default(),
            None,
            &catalog,
        )
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::NoMaterials { .. }));
    assert_eq!(env.repos.version_repo.find_by_recipe(&variant_id).unwrap().len(), 2);
}

#[tokio::test]
async fn test_storage_rejects_duplicate_code_in_plant() {
    let env = TestEnv::new().unwrap();
    let engine = engine(&env);

    let outcome = engine
        .resolve_and_persist(
            &batch(PLANT_ID, vec![DraftBuilder::new(SpecBuilder::new().build()).build()]),
            &catalog(&env),
        )
        .await
        .unwrap();

    // 绕过匹配器直接插入同编码变体（模拟并发保存）
    let mut duplicate = env
        .repos
        .variant_repo
        .find_by_id(&outcome.saved[0].variant_id)
        .unwrap()
        .unwrap();
    duplicate.recipe_id = "concurrent-variant".to_string();
    let err = env.repos.variant_repo.insert_batch(&[duplicate]).unwrap_err();
    assert!(matches!(err, RepositoryError::UniqueConstraintViolation(_)));
}
