// ==========================================
// 混凝土配方治理引擎 - 材料用量仓储
// ==========================================
// 干料: material_quantity / SSS 参考: recipe_reference_material
// 红线: 用量行只插入；修复时按版本整体删除后重插（幂等）
// ==========================================

use crate::db::build_in_clause;
use crate::domain::decision::RetryTarget;
use crate::domain::material::{MaterialQuantity, NewMaterialRow, ReferenceMaterial};
use crate::repository::error::{RepositoryError, RepositoryResult};
use rusqlite::{params, params_from_iter, Connection, Transaction};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use uuid::Uuid;

/// 带归属版本的一行材料
pub type VersionedRow = (String, NewMaterialRow);

const INSERT_DRY_SQL: &str = r#"INSERT INTO material_quantity (
    quantity_id, recipe_version_id, material_id, material_type, quantity, unit
) VALUES (?, ?, ?, ?, ?, ?)"#;

// 同一版本同一材料重复提交时以最后一次为准
const UPSERT_REFERENCE_SQL: &str = r#"INSERT INTO recipe_reference_material (
    reference_id, recipe_version_id, material_id, material_type, sss_value, unit
) VALUES (?, ?, ?, ?, ?, ?)
ON CONFLICT(recipe_version_id, material_id) DO UPDATE SET
    material_type = excluded.material_type,
    sss_value = excluded.sss_value,
    unit = excluded.unit"#;

// ==========================================
// MaterialQuantityRepository - 材料用量仓储
// ==========================================
pub struct MaterialQuantityRepository {
    conn: Arc<Mutex<Connection>>,
}

impl MaterialQuantityRepository {
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    // ==========================================
    // 写入
    // ==========================================

    /// 批量插入干料行（单事务，失败整批回滚，可安全重试）
    pub fn insert_dry_rows(&self, rows: &[VersionedRow]) -> RepositoryResult<usize> {
        if rows.is_empty() {
            return Ok(0);
        }
        let mut conn = self.get_conn()?;
        let tx = conn.transaction()?;
        let n = Self::insert_dry_in(&tx, rows.iter().map(|(v, r)| (v.as_str(), r)))?;
        tx.commit()?;
        Ok(n)
    }

    /// 批量写入 SSS 参考行（单事务）
    pub fn insert_reference_rows(&self, rows: &[VersionedRow]) -> RepositoryResult<usize> {
        if rows.is_empty() {
            return Ok(0);
        }
        let mut conn = self.get_conn()?;
        let tx = conn.transaction()?;
        let n = Self::upsert_reference_in(&tx, rows.iter().map(|(v, r)| (v.as_str(), r)))?;
        tx.commit()?;
        Ok(n)
    }

    /// 修复: 对目标版本先删除已有材料行，再重插（单事务，幂等）
    ///
    /// # 返回
    /// - (干料行数, SSS 行数)
    pub fn replace_for_versions(&self, targets: &[RetryTarget]) -> RepositoryResult<(usize, usize)> {
        if targets.is_empty() {
            return Ok((0, 0));
        }
        let version_ids: Vec<String> = targets.iter().map(|t| t.version_id.clone()).collect();

        let mut conn = self.get_conn()?;
        let tx = conn.transaction()?;

        let dry_clause = build_in_clause("recipe_version_id", &version_ids);
        tx.execute(
            &format!("DELETE FROM material_quantity WHERE {}", dry_clause),
            params_from_iter(version_ids.iter()),
        )?;
        tx.execute(
            &format!("DELETE FROM recipe_reference_material WHERE {}", dry_clause),
            params_from_iter(version_ids.iter()),
        )?;

        let dry = Self::insert_dry_in(
            &tx,
            targets
                .iter()
                .flat_map(|t| t.dry_rows.iter().map(move |r| (t.version_id.as_str(), r))),
        )?;
        let reference = Self::upsert_reference_in(
            &tx,
            targets
                .iter()
                .flat_map(|t| t.reference_rows.iter().map(move |r| (t.version_id.as_str(), r))),
        )?;

        tx.commit()?;
        Ok((dry, reference))
    }

    fn insert_dry_in<'a>(
        tx: &Transaction,
        rows: impl Iterator<Item = (&'a str, &'a NewMaterialRow)>,
    ) -> RepositoryResult<usize> {
        let mut stmt = tx.prepare(INSERT_DRY_SQL)?;
        let mut n = 0usize;
        for (version_id, row) in rows {
            stmt.execute(params![
                Uuid::new_v4().to_string(),
                version_id,
                &row.material_id,
                &row.material_type,
                row.quantity,
                &row.unit,
            ])?;
            n += 1;
        }
        Ok(n)
    }

    fn upsert_reference_in<'a>(
        tx: &Transaction,
        rows: impl Iterator<Item = (&'a str, &'a NewMaterialRow)>,
    ) -> RepositoryResult<usize> {
        let mut stmt = tx.prepare(UPSERT_REFERENCE_SQL)?;
        let mut n = 0usize;
        for (version_id, row) in rows {
            stmt.execute(params![
                Uuid::new_v4().to_string(),
                version_id,
                &row.material_id,
                &row.material_type,
                row.quantity,
                &row.unit,
            ])?;
            n += 1;
        }
        Ok(n)
    }

    // ==========================================
    // 查询
    // ==========================================

    /// 一组版本的干料行
    pub fn find_by_version_ids(&self, version_ids: &[String]) -> RepositoryResult<Vec<MaterialQuantity>> {
        if version_ids.is_empty() {
            return Ok(Vec::new());
        }
        let conn = self.get_conn()?;
        let sql = format!(
            r#"SELECT quantity_id, recipe_version_id, material_id, material_type, quantity, unit
                 FROM material_quantity WHERE {}
                ORDER BY recipe_version_id, rowid"#,
            build_in_clause("recipe_version_id", version_ids)
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
            .query_map(params_from_iter(version_ids.iter()), |row| {
                Ok(MaterialQuantity {
                    quantity_id: row.get(0)?,
                    recipe_version_id: row.get(1)?,
                    material_id: row.get(2)?,
                    material_type: row.get(3)?,
                    quantity: row.get(4)?,
                    unit: row.get(5)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// 一组版本的 SSS 参考行
    pub fn find_reference_by_version_ids(&self, version_ids: &[String]) -> RepositoryResult<Vec<ReferenceMaterial>> {
        if version_ids.is_empty() {
            return Ok(Vec::new());
        }
        let conn = self.get_conn()?;
        let sql = format!(
            r#"SELECT reference_id, recipe_version_id, material_id, material_type, sss_value, unit
                 FROM recipe_reference_material WHERE {}
                ORDER BY recipe_version_id, rowid"#,
            build_in_clause("recipe_version_id", version_ids)
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
            .query_map(params_from_iter(version_ids.iter()), |row| {
                Ok(ReferenceMaterial {
                    reference_id: row.get(0)?,
                    recipe_version_id: row.get(1)?,
                    material_id: row.get(2)?,
                    material_type: row.get(3)?,
                    sss_value: row.get(4)?,
                    unit: row.get(5)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// 每个版本的干料行数（无行的版本计 0）
    pub fn count_by_version_ids(&self, version_ids: &[String]) -> RepositoryResult<HashMap<String, usize>> {
        let mut counts: HashMap<String, usize> = version_ids.iter().map(|id| (id.clone(), 0)).collect();
        if version_ids.is_empty() {
            return Ok(counts);
        }
        let conn = self.get_conn()?;
        let sql = format!(
            "SELECT recipe_version_id, COUNT(*) FROM material_quantity WHERE {} GROUP BY recipe_version_id",
            build_in_clause("recipe_version_id", version_ids)
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(params_from_iter(version_ids.iter()), |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
        })?;
        for row in rows {
            let (version_id, n) = row?;
            counts.insert(version_id, n as usize);
        }
        Ok(counts)
    }
}
