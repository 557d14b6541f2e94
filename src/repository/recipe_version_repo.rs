// ==========================================
// 混凝土配方治理引擎 - 配方版本仓储
// ==========================================
// 红线: 版本只追加不删除
// 约束: (recipe_id, version_number) 唯一；is_current 由引擎维护
// ==========================================

use crate::db::{build_in_clause, format_ts, parse_ts};
use crate::domain::recipe::RecipeVersion;
use crate::repository::error::{RepositoryError, RepositoryResult};
use rusqlite::{params, params_from_iter, Connection};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

const SELECT_COLUMNS: &str = r#"SELECT version_id, recipe_id, version_number, is_current, notes, created_at
  FROM recipe_version"#;

// ==========================================
// RecipeVersionRepository - 配方版本仓储
// ==========================================
pub struct RecipeVersionRepository {
    conn: Arc<Mutex<Connection>>,
}

impl RecipeVersionRepository {
    /// 创建新的RecipeVersionRepository实例
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    /// 获取数据库连接
    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    /// 各变体当前最大版本号（一次查询）
    ///
    /// 无版本的变体不出现在结果中，调用方按 0 处理。
    pub fn max_version_numbers(&self, recipe_ids: &[String]) -> RepositoryResult<HashMap<String, i32>> {
        if recipe_ids.is_empty() {
            return Ok(HashMap::new());
        }
        let conn = self.get_conn()?;
        let sql = format!(
            "SELECT recipe_id, MAX(version_number) FROM recipe_version WHERE {} GROUP BY recipe_id",
            build_in_clause("recipe_id", recipe_ids)
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
            .query_map(params_from_iter(recipe_ids.iter()), |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, i32>(1)?))
            })?
            .collect::<Result<HashMap<_, _>, _>>()?;
        Ok(rows)
    }

    /// 将一组变体的全部版本标记为非当前（单语句）
    pub fn demote_current(&self, recipe_ids: &[String]) -> RepositoryResult<usize> {
        if recipe_ids.is_empty() {
            return Ok(0);
        }
        let conn = self.get_conn()?;
        let sql = format!(
            "UPDATE recipe_version SET is_current = 0 WHERE is_current = 1 AND {}",
            build_in_clause("recipe_id", recipe_ids)
        );
        let n = conn.execute(&sql, params_from_iter(recipe_ids.iter()))?;
        Ok(n)
    }

    /// 批量插入版本（单事务）
    pub fn insert_batch(&self, versions: &[RecipeVersion]) -> RepositoryResult<usize> {
        if versions.is_empty() {
            return Ok(0);
        }
        let mut conn = self.get_conn()?;
        let tx = conn.transaction()?;
        {
            let mut stmt = tx.prepare(
                r#"INSERT INTO recipe_version (
                    version_id, recipe_id, version_number, is_current, notes, created_at
                ) VALUES (?, ?, ?, ?, ?, ?)"#,
            )?;
            for v in versions {
                stmt.execute(params![
                    &v.version_id,
                    &v.recipe_id,
                    v.version_number,
                    v.is_current,
                    &v.notes,
                    format_ts(&v.created_at),
                ])?;
            }
        }
        tx.commit()?;
        Ok(versions.len())
    }

    /// 追加一个当前版本（自动分配 version_number）
    ///
    /// 同一事务内: 查询 MAX(version_number) → 降级旧版本 → 插入新版本。
    /// 该方法会覆盖传入的 `version.version_number` 与 `version.is_current`。
    pub fn append_current(&self, version: &mut RecipeVersion) -> RepositoryResult<String> {
        let mut conn = self.get_conn()?;
        let tx = conn.transaction()?;

        let max_version: Option<i32> = tx.query_row(
            "SELECT MAX(version_number) FROM recipe_version WHERE recipe_id = ?",
            params![&version.recipe_id],
            |row| row.get(0),
        )?;
        version.version_number = max_version.unwrap_or(0) + 1;
        version.is_current = true;

        tx.execute(
            "UPDATE recipe_version SET is_current = 0 WHERE recipe_id = ? AND is_current = 1",
            params![&version.recipe_id],
        )?;
        tx.execute(
            r#"INSERT INTO recipe_version (
                version_id, recipe_id, version_number, is_current, notes, created_at
            ) VALUES (?, ?, ?, ?, ?, ?)"#,
            params![
                &version.version_id,
                &version.recipe_id,
                version.version_number,
                version.is_current,
                &version.notes,
                format_ts(&version.created_at),
            ],
        )?;
        tx.commit()?;

        Ok(version.version_id.clone())
    }

    /// 一组变体的全部版本
    pub fn find_by_recipe_ids(&self, recipe_ids: &[String]) -> RepositoryResult<Vec<RecipeVersion>> {
        if recipe_ids.is_empty() {
            return Ok(Vec::new());
        }
        let conn = self.get_conn()?;
        let sql = format!(
            "{} WHERE {} ORDER BY recipe_id, version_number",
            SELECT_COLUMNS,
            build_in_clause("recipe_id", recipe_ids)
        );
        let mut stmt = conn.prepare(&sql)?;
        let versions = stmt
            .query_map(params_from_iter(recipe_ids.iter()), Self::map_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(versions)
    }

    /// 单变体版本（按版本号升序）
    pub fn find_by_recipe(&self, recipe_id: &str) -> RepositoryResult<Vec<RecipeVersion>> {
        self.find_by_recipe_ids(&[recipe_id.to_string()])
    }

    /// 给定 version_id 中实际存在的部分
    pub fn existing_ids(&self, version_ids: &[String]) -> RepositoryResult<HashSet<String>> {
        if version_ids.is_empty() {
            return Ok(HashSet::new());
        }
        let conn = self.get_conn()?;
        let sql = format!(
            "SELECT version_id FROM recipe_version WHERE {}",
            build_in_clause("version_id", version_ids)
        );
        let mut stmt = conn.prepare(&sql)?;
        let ids = stmt
            .query_map(params_from_iter(version_ids.iter()), |row| row.get::<_, String>(0))?
            .collect::<Result<HashSet<_>, _>>()?;
        Ok(ids)
    }

    /// 映射数据库行到RecipeVersion对象
    fn map_row(row: &rusqlite::Row) -> rusqlite::Result<RecipeVersion> {
        Ok(RecipeVersion {
            version_id: row.get(0)?,
            recipe_id: row.get(1)?,
            version_number: row.get(2)?,
            is_current: row.get(3)?,
            notes: row.get(4)?,
            created_at: parse_ts(&row.get::<_, String>(5)?, 5)?,
        })
    }
}
