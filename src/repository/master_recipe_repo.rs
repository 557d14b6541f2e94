// ==========================================
// 混凝土配方治理引擎 - 主配方数据仓储
// ==========================================
// 红线: Repository 不含业务逻辑
// 约束: (plant_id, master_code) 唯一；批量写入在单一事务内完成
// ==========================================

use crate::db::{build_in_clause, format_ts, parse_ts};
use crate::domain::recipe::{MasterRecipe, RecipeSpecification};
use crate::domain::types::{AgeUnit, PlacementType};
use crate::repository::error::{RepositoryError, RepositoryResult};
use rusqlite::{params, params_from_iter, Connection};
use std::sync::{Arc, Mutex};

const SELECT_COLUMNS: &str = r#"SELECT master_id, plant_id, master_code, strength_fc,
       age_value, age_unit, placement_type, max_aggregate_size, slump,
       is_active, created_at
  FROM master_recipe"#;

// ==========================================
// MasterRecipeRepository - 主配方仓储
// ==========================================
pub struct MasterRecipeRepository {
    conn: Arc<Mutex<Connection>>,
}

impl MasterRecipeRepository {
    /// 创建新的MasterRecipeRepository实例
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    /// 获取数据库连接
    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    /// 批量插入主配方（单事务）
    pub fn insert_batch(&self, masters: &[MasterRecipe]) -> RepositoryResult<usize> {
        if masters.is_empty() {
            return Ok(0);
        }
        let mut conn = self.get_conn()?;
        let tx = conn.transaction()?;
        {
            let mut stmt = tx.prepare(
                r#"INSERT INTO master_recipe (
                    master_id, plant_id, master_code, strength_fc,
                    age_value, age_unit, placement_type, max_aggregate_size, slump,
                    is_active, created_at
                ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"#,
            )?;
            for m in masters {
                stmt.execute(params![
                    &m.master_id,
                    &m.plant_id,
                    &m.master_code,
                    m.strength_fc,
                    m.age_value,
                    m.age_unit.to_db_str(),
                    m.placement_type.code(),
                    m.max_aggregate_size,
                    m.slump,
                    m.is_active,
                    format_ts(&m.created_at),
                ])?;
            }
        }
        tx.commit()?;
        Ok(masters.len())
    }

    /// 按master_id查询
    pub fn find_by_id(&self, master_id: &str) -> RepositoryResult<Option<MasterRecipe>> {
        let conn = self.get_conn()?;
        let sql = format!("{} WHERE master_id = ?", SELECT_COLUMNS);

        match conn.query_row(&sql, params![master_id], Self::map_row) {
            Ok(master) => Ok(Some(master)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// 按工厂 + 主配方编码查询
    pub fn find_by_code(&self, plant_id: &str, master_code: &str) -> RepositoryResult<Option<MasterRecipe>> {
        let conn = self.get_conn()?;
        let sql = format!("{} WHERE plant_id = ? AND master_code = ?", SELECT_COLUMNS);

        match conn.query_row(&sql, params![plant_id, master_code], Self::map_row) {
            Ok(master) => Ok(Some(master)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// 查询核心规格相同的启用主配方（龄期同单位）
    pub fn find_by_spec(&self, plant_id: &str, spec: &RecipeSpecification) -> RepositoryResult<Vec<MasterRecipe>> {
        let conn = self.get_conn()?;
        let sql = format!(
            r#"{} WHERE plant_id = ? AND is_active = 1
                 AND strength_fc = ? AND placement_type = ?
                 AND max_aggregate_size = ? AND slump = ?
                 AND age_unit = ? AND age_value = ?
               ORDER BY master_code"#,
            SELECT_COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;
        let masters = stmt
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
        Ok(masters)
    }

    /// 查询工厂所有启用的主配方（按编码排序）
    pub fn list_active_by_plant(&self, plant_id: &str) -> RepositoryResult<Vec<MasterRecipe>> {
        let conn = self.get_conn()?;
        let sql = format!("{} WHERE plant_id = ? AND is_active = 1 ORDER BY master_code", SELECT_COLUMNS);
        let mut stmt = conn.prepare(&sql)?;
        let masters = stmt
            .query_map(params![plant_id], Self::map_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(masters)
    }

    /// 按ID批量查询
    pub fn find_by_ids(&self, master_ids: &[String]) -> RepositoryResult<Vec<MasterRecipe>> {
        if master_ids.is_empty() {
            return Ok(Vec::new());
        }
        let conn = self.get_conn()?;
        let sql = format!("{} WHERE {}", SELECT_COLUMNS, build_in_clause("master_id", master_ids));
        let mut stmt = conn.prepare(&sql)?;
        let masters = stmt
            .query_map(params_from_iter(master_ids.iter()), Self::map_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(masters)
    }

    /// 工厂内主配方数量
    pub fn count_by_plant(&self, plant_id: &str) -> RepositoryResult<usize> {
        let conn = self.get_conn()?;
        let n: i64 = conn.query_row(
            "SELECT COUNT(*) FROM master_recipe WHERE plant_id = ?",
            params![plant_id],
            |row| row.get(0),
        )?;
        Ok(n as usize)
    }

    /// 映射数据库行到MasterRecipe对象
    fn map_row(row: &rusqlite::Row) -> rusqlite::Result<MasterRecipe> {
        let age_unit_raw: String = row.get(5)?;
        let placement_raw: String = row.get(6)?;
        Ok(MasterRecipe {
            master_id: row.get(0)?,
            plant_id: row.get(1)?,
            master_code: row.get(2)?,
            strength_fc: row.get(3)?,
            age_value: row.get(4)?,
            age_unit: AgeUnit::from_db_str(&age_unit_raw).unwrap_or(AgeUnit::Days),
            placement_type: PlacementType::from_code(&placement_raw).unwrap_or(PlacementType::Direct),
            max_aggregate_size: row.get(7)?,
            slump: row.get(8)?,
            is_active: row.get(9)?,
            created_at: parse_ts(&row.get::<_, String>(10)?, 10)?,
        })
    }
}
