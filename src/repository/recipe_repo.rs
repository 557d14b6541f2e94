// ==========================================
// 混凝土配方治理引擎 - 配方变体仓储 (recipe 表)
// ==========================================
// 红线: Repository 不含业务逻辑
// 约束: (plant_id, recipe_code) 唯一，并发重复写入在此处失败
// ==========================================

use crate::db::{build_in_clause, format_ts, parse_ts};
use crate::domain::recipe::{RecipeSpecification, RecipeVariant};
use crate::domain::types::{AgeUnit, PlacementType, RecipeType};
use crate::repository::error::{RepositoryError, RepositoryResult};
use chrono::NaiveDateTime;
use rusqlite::{params, params_from_iter, Connection};
use std::sync::{Arc, Mutex};

const SELECT_COLUMNS: &str = r#"SELECT recipe_id, plant_id, recipe_code, master_recipe_id, variant_suffix,
       strength_fc, age_value, age_unit, placement_type, max_aggregate_size, slump,
       recipe_type, application_type, has_waterproofing, performance_grade,
       created_at, updated_at
  FROM recipe"#;

/// 变体改码/改规格（updateVariant）
#[derive(Debug, Clone)]
pub struct VariantUpdate {
    pub recipe_id: String,
    pub recipe_code: String,
    pub variant_suffix: Option<String>,
    pub spec: RecipeSpecification,
    pub updated_at: NaiveDateTime,
}

// ==========================================
// RecipeVariantRepository - 配方变体仓储
// ==========================================
pub struct RecipeVariantRepository {
    conn: Arc<Mutex<Connection>>,
}

impl RecipeVariantRepository {
    /// 创建新的RecipeVariantRepository实例
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    /// 获取数据库连接
    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    // ==========================================
    // 写入
    // ==========================================

    /// 批量插入变体（单事务）
    pub fn insert_batch(&self, variants: &[RecipeVariant]) -> RepositoryResult<usize> {
        if variants.is_empty() {
            return Ok(0);
        }
        let mut conn = self.get_conn()?;
        let tx = conn.transaction()?;
        {
            let mut stmt = tx.prepare(
                r#"INSERT INTO recipe (
                    recipe_id, plant_id, recipe_code, master_recipe_id, variant_suffix,
                    strength_fc, age_value, age_unit, placement_type, max_aggregate_size, slump,
                    recipe_type, application_type, has_waterproofing, performance_grade,
                    created_at, updated_at
                ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"#,
            )?;
            for v in variants {
                let s = &v.spec;
                stmt.execute(params![
                    &v.recipe_id,
                    &v.plant_id,
                    &v.recipe_code,
                    &v.master_recipe_id,
                    &v.variant_suffix,
                    s.strength_fc,
                    s.age_value,
                    s.age_unit.to_db_str(),
                    s.placement_type.code(),
                    s.max_aggregate_size,
                    s.slump,
                    s.recipe_type.to_db_str(),
                    &s.application_type,
                    s.has_waterproofing,
                    &s.performance_grade,
                    format_ts(&v.created_at),
                    format_ts(&v.updated_at),
                ])?;
            }
        }
        tx.commit()?;
        Ok(variants.len())
    }

    /// 批量改码/改规格（单事务）
    ///
    /// # 返回
    /// - 实际更新的行数；任一目标不存在时整批回滚并返回 NotFound
    pub fn update_batch(&self, updates: &[VariantUpdate]) -> RepositoryResult<usize> {
        if updates.is_empty() {
            return Ok(0);
        }
        let mut conn = self.get_conn()?;
        let tx = conn.transaction()?;
        let mut updated = 0usize;
        {
            let mut stmt = tx.prepare(
                r#"UPDATE recipe SET
                    recipe_code = ?, variant_suffix = ?,
                    strength_fc = ?, age_value = ?, age_unit = ?, placement_type = ?,
                    max_aggregate_size = ?, slump = ?, recipe_type = ?, application_type = ?,
                    has_waterproofing = ?, performance_grade = ?, updated_at = ?
                 WHERE recipe_id = ?"#,
            )?;
            for u in updates {
                let s = &u.spec;
                let n = stmt.execute(params![
                    &u.recipe_code,
                    &u.variant_suffix,
                    s.strength_fc,
                    s.age_value,
                    s.age_unit.to_db_str(),
                    s.placement_type.code(),
                    s.max_aggregate_size,
                    s.slump,
                    s.recipe_type.to_db_str(),
                    &s.application_type,
                    s.has_waterproofing,
                    &s.performance_grade,
                    format_ts(&u.updated_at),
                    &u.recipe_id,
                ])?;
                if n == 0 {
                    return Err(RepositoryError::NotFound {
                        entity: "recipe".to_string(),
                        id: u.recipe_id.clone(),
                    });
                }
                updated += n;
            }
        }
        tx.commit()?;
        Ok(updated)
    }

    /// 仅刷新 updated_at（单变体追加版本时使用）
    pub fn touch(&self, recipe_id: &str, updated_at: &NaiveDateTime) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        conn.execute(
            "UPDATE recipe SET updated_at = ? WHERE recipe_id = ?",
            params![format_ts(updated_at), recipe_id],
        )?;
        Ok(())
    }

    // ==========================================
    // 查询
    // ==========================================

    pub fn find_by_id(&self, recipe_id: &str) -> RepositoryResult<Option<RecipeVariant>> {
        let conn = self.get_conn()?;
        let sql = format!("{} WHERE recipe_id = ?", SELECT_COLUMNS);
        match conn.query_row(&sql, params![recipe_id], Self::map_row) {
            Ok(v) => Ok(Some(v)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// 按编码精确查询（大小写敏感）
    pub fn find_by_code(&self, plant_id: &str, recipe_code: &str) -> RepositoryResult<Option<RecipeVariant>> {
        let conn = self.get_conn()?;
        let sql = format!("{} WHERE plant_id = ? AND recipe_code = ?", SELECT_COLUMNS);
        match conn.query_row(&sql, params![plant_id, recipe_code], Self::map_row) {
            Ok(v) => Ok(Some(v)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// 核心规格相同的变体（精确数值相等，龄期只在同单位下比较）
    pub fn find_same_spec(&self, plant_id: &str, spec: &RecipeSpecification) -> RepositoryResult<Vec<RecipeVariant>> {
        let conn = self.get_conn()?;
        let sql = format!(
            r#"{} WHERE plant_id = ?
                 AND strength_fc = ? AND placement_type = ?
                 AND max_aggregate_size = ? AND slump = ?
                 AND age_unit = ? AND age_value = ?
               ORDER BY recipe_code"#,
            SELECT_COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;
        let variants = stmt
            .query_map(
                params![
                    plant_id,
                    spec.strength_fc,
                    spec.placement_type.code(),
                    spec.max_aggregate_size,
                    spec.slump,
                    spec.age_unit.to_db_str(),
                    spec.age_value,
                ],
                Self::map_row,
            )?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(variants)
    }

    pub fn find_by_ids(&self, recipe_ids: &[String]) -> RepositoryResult<Vec<RecipeVariant>> {
        if recipe_ids.is_empty() {
            return Ok(Vec::new());
        }
        let conn = self.get_conn()?;
        let sql = format!("{} WHERE {}", SELECT_COLUMNS, build_in_clause("recipe_id", recipe_ids));
        let mut stmt = conn.prepare(&sql)?;
        let variants = stmt
            .query_map(params_from_iter(recipe_ids.iter()), Self::map_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(variants)
    }

    /// 一组主配方下的全部变体（按编码排序）
    pub fn find_by_master_ids(&self, master_ids: &[String]) -> RepositoryResult<Vec<RecipeVariant>> {
        if master_ids.is_empty() {
            return Ok(Vec::new());
        }
        let conn = self.get_conn()?;
        let sql = format!(
            "{} WHERE {} ORDER BY recipe_code",
            SELECT_COLUMNS,
            build_in_clause("master_recipe_id", master_ids)
        );
        let mut stmt = conn.prepare(&sql)?;
        let variants = stmt
            .query_map(params_from_iter(master_ids.iter()), Self::map_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(variants)
    }

    /// 工厂内变体数量
    pub fn count_by_plant(&self, plant_id: &str) -> RepositoryResult<usize> {
        let conn = self.get_conn()?;
        let n: i64 = conn.query_row(
            "SELECT COUNT(*) FROM recipe WHERE plant_id = ?",
            params![plant_id],
            |row| row.get(0),
        )?;
        Ok(n as usize)
    }

    /// 映射数据库行到RecipeVariant对象
    fn map_row(row: &rusqlite::Row) -> rusqlite::Result<RecipeVariant> {
        let age_unit_raw: String = row.get(7)?;
        let placement_raw: String = row.get(8)?;
        let recipe_type_raw: String = row.get(11)?;

        Ok(RecipeVariant {
            recipe_id: row.get(0)?,
            plant_id: row.get(1)?,
            recipe_code: row.get(2)?,
            master_recipe_id: row.get(3)?,
            variant_suffix: row.get(4)?,
            spec: RecipeSpecification {
                strength_fc: row.get(5)?,
                age_value: row.get(6)?,
                age_unit: AgeUnit::from_db_str(&age_unit_raw).unwrap_or(AgeUnit::Days),
                placement_type: PlacementType::from_code(&placement_raw).unwrap_or(PlacementType::Direct),
                max_aggregate_size: row.get(9)?,
                slump: row.get(10)?,
                recipe_type: RecipeType::from_db_str(&recipe_type_raw),
                application_type: row.get(12)?,
                has_waterproofing: row.get(13)?,
                performance_grade: row.get(14)?,
            },
            created_at: parse_ts(&row.get::<_, String>(15)?, 15)?,
            updated_at: parse_ts(&row.get::<_, String>(16)?, 16)?,
        })
    }
}
