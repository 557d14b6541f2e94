// ==========================================
// 混凝土配方治理引擎 - 工厂与材料目录仓储
// ==========================================
// 职责: plant / material 表读写
// 约定: 材料角色在此处（入库/加载时）解析一次
// ==========================================

use crate::db::build_in_clause;
use crate::domain::material::CatalogMaterial;
use crate::domain::types::MaterialRole;
use crate::repository::error::{RepositoryError, RepositoryResult};
use rusqlite::{params, params_from_iter, Connection, OptionalExtension};
use std::sync::{Arc, Mutex};

const SELECT_COLUMNS: &str = r#"SELECT material_id, plant_id, material_name, material_code,
       category, subcategory, unit_of_measure, is_active
  FROM material"#;

// ==========================================
// MaterialCatalogRepository - 材料目录仓储
// ==========================================
pub struct MaterialCatalogRepository {
    conn: Arc<Mutex<Connection>>,
}

impl MaterialCatalogRepository {
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    // ==========================================
    // 工厂
    // ==========================================

    /// 新增或更新工厂
    pub fn upsert_plant(&self, plant_id: &str, plant_name: &str) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        conn.execute(
            r#"INSERT INTO plant (plant_id, plant_name, is_active) VALUES (?, ?, 1)
               ON CONFLICT(plant_id) DO UPDATE SET plant_name = excluded.plant_name"#,
            params![plant_id, plant_name],
        )?;
        Ok(())
    }

    /// 工厂是否存在且启用
    pub fn plant_exists(&self, plant_id: &str) -> RepositoryResult<bool> {
        let conn = self.get_conn()?;
        let found: Option<i64> = conn
            .query_row(
                "SELECT 1 FROM plant WHERE plant_id = ? AND is_active = 1",
                params![plant_id],
                |row| row.get(0),
            )
            .optional()?;
        Ok(found.is_some())
    }

    // ==========================================
    // 材料
    // ==========================================

    /// 批量写入材料目录（存在则覆盖）
    pub fn upsert_materials(&self, materials: &[CatalogMaterial]) -> RepositoryResult<usize> {
        let mut conn = self.get_conn()?;
        let tx = conn.transaction()?;
        {
            let mut stmt = tx.prepare(
                r#"INSERT INTO material (
                    material_id, plant_id, material_name, material_code,
                    category, subcategory, unit_of_measure, is_active
                ) VALUES (?, ?, ?, ?, ?, ?, ?, ?)
                ON CONFLICT(material_id) DO UPDATE SET
                    material_name = excluded.material_name,
                    material_code = excluded.material_code,
                    category = excluded.category,
                    subcategory = excluded.subcategory,
                    unit_of_measure = excluded.unit_of_measure,
                    is_active = excluded.is_active"#,
            )?;
            for m in materials {
                stmt.execute(params![
                    &m.material_id,
                    &m.plant_id,
                    &m.material_name,
                    &m.material_code,
                    &m.category,
                    &m.subcategory,
                    &m.unit_of_measure,
                    m.is_active,
                ])?;
            }
        }
        tx.commit()?;
        Ok(materials.len())
    }

    /// 工厂启用材料（按名称排序）
    pub fn list_active_by_plant(&self, plant_id: &str) -> RepositoryResult<Vec<CatalogMaterial>> {
        let conn = self.get_conn()?;
        let sql = format!(
            "{} WHERE plant_id = ? AND is_active = 1 ORDER BY material_name, material_id",
            SELECT_COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;
        let materials = stmt
            .query_map(params![plant_id], Self::map_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(materials)
    }

    /// 按ID批量查询（含停用材料，供历史版本解析）
    pub fn find_by_ids(&self, material_ids: &[String]) -> RepositoryResult<Vec<CatalogMaterial>> {
        if material_ids.is_empty() {
            return Ok(Vec::new());
        }
        let conn = self.get_conn()?;
        let sql = format!("{} WHERE {}", SELECT_COLUMNS, build_in_clause("material_id", material_ids));
        let mut stmt = conn.prepare(&sql)?;
        let materials = stmt
            .query_map(params_from_iter(material_ids.iter()), Self::map_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(materials)
    }

    fn map_row(row: &rusqlite::Row) -> rusqlite::Result<CatalogMaterial> {
        let material_code: String = row.get(3)?;
        let category: String = row.get(4)?;
        let subcategory: Option<String> = row.get(5)?;
        let role = MaterialRole::classify(&category, subcategory.as_deref(), &material_code);

        Ok(CatalogMaterial {
            material_id: row.get(0)?,
            plant_id: row.get(1)?,
            material_name: row.get(2)?,
            material_code,
            category,
            subcategory,
            unit_of_measure: row.get(6)?,
            is_active: row.get(7)?,
            role,
        })
    }
}
