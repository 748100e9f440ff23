//! SQLite storage layer.
//!
//! Each public method opens its own connection, so a `Database` is just a
//! resolved path: cheap to clone, safe to share across threads, and never a
//! process-wide singleton.

use std::path::{Path, PathBuf};

use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSqlOutput, Type, ValueRef};
use rusqlite::{params, Connection, OptionalExtension, Row, ToSql};

use crate::config::{expand_tilde, EngineConfig};
use crate::errors::{EmissionsError, EmissionsResult};
use crate::models::{
    BuildingComponent, BuildingComponentLink, BuildingRecord, BuildingWithComponents,
    ComponentRecord, ComponentType, EmissionFactorRecord, EmissionFactorUpdate, FactorCategory,
    NewEmissionFactor, Parameters,
};
use crate::store::schema;
use crate::store::{BuildingStore, ComponentStore, EmissionFactorStore};

// ---------------------------------------------------------------------------
// Column codecs
// ---------------------------------------------------------------------------

impl ToSql for FactorCategory {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

impl FromSql for FactorCategory {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        value
            .as_str()?
            .parse()
            .map_err(|e: EmissionsError| FromSqlError::Other(Box::new(e)))
    }
}

const FACTOR_COLUMNS: &str =
    "id, name, category, emission_factor, unit, source, created_at, updated_at";

const COMPONENT_COLUMNS: &str = "id, name, component_type, metadata_json, created_at";

const BUILDING_COLUMNS: &str = "id, name, location, created_at";

fn factor_from_row(row: &Row<'_>) -> rusqlite::Result<EmissionFactorRecord> {
    Ok(EmissionFactorRecord {
        id: row.get(0)?,
        name: row.get(1)?,
        category: row.get(2)?,
        emission_factor: row.get(3)?,
        unit: row.get(4)?,
        source: row.get(5)?,
        created_at: row.get::<_, Option<String>>(6)?.unwrap_or_default(),
        updated_at: row.get::<_, Option<String>>(7)?.unwrap_or_default(),
    })
}

/// Reads the five component columns starting at `offset`.
fn component_from_row_at(row: &Row<'_>, offset: usize) -> rusqlite::Result<ComponentRecord> {
    let metadata_json: String = row.get(offset + 3)?;
    let metadata: Parameters = serde_json::from_str(&metadata_json).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(offset + 3, Type::Text, Box::new(e))
    })?;
    Ok(ComponentRecord {
        id: row.get(offset)?,
        name: row.get(offset + 1)?,
        component_type: row.get(offset + 2)?,
        metadata,
        created_at: row.get::<_, Option<String>>(offset + 4)?.unwrap_or_default(),
    })
}

fn component_from_row(row: &Row<'_>) -> rusqlite::Result<ComponentRecord> {
    component_from_row_at(row, 0)
}

fn building_from_row(row: &Row<'_>) -> rusqlite::Result<BuildingRecord> {
    Ok(BuildingRecord {
        id: row.get(0)?,
        name: row.get(1)?,
        location: row.get(2)?,
        created_at: row.get::<_, Option<String>>(3)?.unwrap_or_default(),
    })
}

fn upsert_link(
    conn: &Connection,
    building_id: i64,
    component_id: i64,
    quantity: f64,
) -> EmissionsResult<()> {
    conn.execute(
        "INSERT INTO components_by_building (building_id, component_id, quantity) \
         VALUES (?1, ?2, ?3) \
         ON CONFLICT(building_id, component_id) DO UPDATE SET quantity = excluded.quantity;",
        params![building_id, component_id, quantity],
    )?;
    Ok(())
}

// ---------------------------------------------------------------------------
// Database
// ---------------------------------------------------------------------------

/// SQLite store for emission factors, components, and buildings.
#[derive(Clone, Debug)]
pub struct Database {
    db_path: PathBuf,
}

impl Database {
    /// Create a new `Database`.  The path is expanded and made absolute, and
    /// parent directories are created if they do not already exist.
    pub fn new(db_path: impl AsRef<Path>) -> EmissionsResult<Self> {
        let expanded = expand_tilde(&db_path.as_ref().to_string_lossy());
        let resolved = if expanded.is_absolute() {
            expanded
        } else {
            std::env::current_dir()?.join(&expanded)
        };
        if let Some(parent) = resolved.parent() {
            std::fs::create_dir_all(parent)?;
        }
        Ok(Self { db_path: resolved })
    }

    pub fn from_config(config: &EngineConfig) -> EmissionsResult<Self> {
        Self::new(&config.db_path)
    }

    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    fn connect(&self) -> EmissionsResult<Connection> {
        let conn = Connection::open(&self.db_path)?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        Ok(conn)
    }

    /// Initialise the database schema: set WAL mode, create all tables and
    /// indexes, then run pending migrations.
    pub fn init_schema(&self) -> EmissionsResult<()> {
        let conn = self.connect()?;
        conn.execute_batch("PRAGMA journal_mode = WAL;")?;
        for stmt in schema::SCHEMA_STATEMENTS {
            conn.execute_batch(stmt)?;
        }
        schema::migrate_schema(&conn)?;
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Emission factors
    // -----------------------------------------------------------------------

    pub fn insert_emission_factor(
        &self,
        factor: &NewEmissionFactor,
    ) -> EmissionsResult<EmissionFactorRecord> {
        let conn = self.connect()?;
        conn.execute(
            "INSERT INTO emission_factors (name, category, emission_factor, unit, source) \
             VALUES (?1, ?2, ?3, ?4, ?5);",
            params![
                factor.name,
                factor.category,
                factor.emission_factor,
                factor.unit,
                factor.source,
            ],
        )?;
        let id = conn.last_insert_rowid();
        Self::factor_by_id(&conn, id)?
            .ok_or_else(|| EmissionsError::Database(format!("emission factor {id} vanished")))
    }

    fn factor_by_id(conn: &Connection, id: i64) -> EmissionsResult<Option<EmissionFactorRecord>> {
        let sql = format!("SELECT {FACTOR_COLUMNS} FROM emission_factors WHERE id = ?1;");
        Ok(conn
            .query_row(&sql, params![id], factor_from_row)
            .optional()?)
    }

    pub fn get_emission_factor(&self, id: i64) -> EmissionsResult<Option<EmissionFactorRecord>> {
        let conn = self.connect()?;
        Self::factor_by_id(&conn, id)
    }

    pub fn list_emission_factors(&self) -> EmissionsResult<Vec<EmissionFactorRecord>> {
        let conn = self.connect()?;
        let sql = format!("SELECT {FACTOR_COLUMNS} FROM emission_factors ORDER BY id;");
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map([], factor_from_row)?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    pub fn emission_factors_by_category(
        &self,
        category: FactorCategory,
    ) -> EmissionsResult<Vec<EmissionFactorRecord>> {
        let conn = self.connect()?;
        let sql =
            format!("SELECT {FACTOR_COLUMNS} FROM emission_factors WHERE category = ?1 ORDER BY id;");
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(params![category], factor_from_row)?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    pub fn emission_factors_by_name_and_category(
        &self,
        name: &str,
        category: FactorCategory,
    ) -> EmissionsResult<Vec<EmissionFactorRecord>> {
        let conn = self.connect()?;
        let sql = format!(
            "SELECT {FACTOR_COLUMNS} FROM emission_factors \
             WHERE name = ?1 AND category = ?2 ORDER BY id;"
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(params![name, category], factor_from_row)?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    /// Apply a partial update. Returns `None` when no row has this id.
    pub fn update_emission_factor(
        &self,
        id: i64,
        update: &EmissionFactorUpdate,
    ) -> EmissionsResult<Option<EmissionFactorRecord>> {
        let conn = self.connect()?;
        let changed = conn.execute(
            "UPDATE emission_factors SET \
                 name = COALESCE(?1, name), \
                 category = COALESCE(?2, category), \
                 emission_factor = COALESCE(?3, emission_factor), \
                 unit = COALESCE(?4, unit), \
                 source = COALESCE(?5, source), \
                 updated_at = CURRENT_TIMESTAMP \
             WHERE id = ?6;",
            params![
                update.name,
                update.category,
                update.emission_factor,
                update.unit,
                update.source,
                id,
            ],
        )?;
        if changed == 0 {
            return Ok(None);
        }
        Self::factor_by_id(&conn, id)
    }

    pub fn delete_emission_factor(&self, id: i64) -> EmissionsResult<bool> {
        let conn = self.connect()?;
        let changed = conn.execute("DELETE FROM emission_factors WHERE id = ?1;", params![id])?;
        Ok(changed > 0)
    }

    // -----------------------------------------------------------------------
    // Components
    // -----------------------------------------------------------------------

    pub fn insert_component(
        &self,
        name: &str,
        component_type: ComponentType,
        metadata: &Parameters,
    ) -> EmissionsResult<ComponentRecord> {
        let conn = self.connect()?;
        let metadata_json = serde_json::to_string(metadata)?;
        conn.execute(
            "INSERT INTO components (name, component_type, metadata_json) VALUES (?1, ?2, ?3);",
            params![name, component_type.as_str(), metadata_json],
        )?;
        let id = conn.last_insert_rowid();
        Self::component_by_id(&conn, id)?
            .ok_or_else(|| EmissionsError::Database(format!("component {id} vanished")))
    }

    fn component_by_id(conn: &Connection, id: i64) -> EmissionsResult<Option<ComponentRecord>> {
        let sql = format!("SELECT {COMPONENT_COLUMNS} FROM components WHERE id = ?1;");
        Ok(conn
            .query_row(&sql, params![id], component_from_row)
            .optional()?)
    }

    pub fn get_component(&self, id: i64) -> EmissionsResult<Option<ComponentRecord>> {
        let conn = self.connect()?;
        Self::component_by_id(&conn, id)
    }

    pub fn list_components(&self) -> EmissionsResult<Vec<ComponentRecord>> {
        let conn = self.connect()?;
        let sql = format!("SELECT {COMPONENT_COLUMNS} FROM components ORDER BY id;");
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map([], component_from_row)?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    pub fn components_by_type(
        &self,
        component_type: ComponentType,
    ) -> EmissionsResult<Vec<ComponentRecord>> {
        let conn = self.connect()?;
        let sql = format!(
            "SELECT {COMPONENT_COLUMNS} FROM components WHERE component_type = ?1 ORDER BY id;"
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(params![component_type.as_str()], component_from_row)?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    /// Replace the stored metadata (and optionally the name). Returns `None`
    /// when no row has this id.
    pub fn update_component(
        &self,
        id: i64,
        name: Option<&str>,
        metadata: &Parameters,
    ) -> EmissionsResult<Option<ComponentRecord>> {
        let conn = self.connect()?;
        let metadata_json = serde_json::to_string(metadata)?;
        let changed = conn.execute(
            "UPDATE components SET name = COALESCE(?1, name), metadata_json = ?2 WHERE id = ?3;",
            params![name, metadata_json, id],
        )?;
        if changed == 0 {
            return Ok(None);
        }
        Self::component_by_id(&conn, id)
    }

    /// Delete a component; its building links go with it.
    pub fn delete_component(&self, id: i64) -> EmissionsResult<bool> {
        let conn = self.connect()?;
        let changed = conn.execute("DELETE FROM components WHERE id = ?1;", params![id])?;
        Ok(changed > 0)
    }

    // -----------------------------------------------------------------------
    // Buildings
    // -----------------------------------------------------------------------

    /// Insert a building and its component links in one transaction.
    pub fn insert_building(
        &self,
        name: &str,
        location: Option<&str>,
        links: &[BuildingComponentLink],
    ) -> EmissionsResult<BuildingRecord> {
        let mut conn = self.connect()?;
        let tx = conn.transaction()?;
        tx.execute(
            "INSERT INTO buildings (name, location) VALUES (?1, ?2);",
            params![name, location],
        )?;
        let building_id = tx.last_insert_rowid();
        for link in links {
            upsert_link(&tx, building_id, link.component_id, link.quantity)?;
        }
        tx.commit()?;

        Self::building_by_id(&conn, building_id)?
            .ok_or_else(|| EmissionsError::Database(format!("building {building_id} vanished")))
    }

    fn building_by_id(conn: &Connection, id: i64) -> EmissionsResult<Option<BuildingRecord>> {
        let sql = format!("SELECT {BUILDING_COLUMNS} FROM buildings WHERE id = ?1;");
        Ok(conn
            .query_row(&sql, params![id], building_from_row)
            .optional()?)
    }

    pub fn get_building(&self, id: i64) -> EmissionsResult<Option<BuildingRecord>> {
        let conn = self.connect()?;
        Self::building_by_id(&conn, id)
    }

    pub fn list_buildings(&self) -> EmissionsResult<Vec<BuildingRecord>> {
        let conn = self.connect()?;
        let sql = format!("SELECT {BUILDING_COLUMNS} FROM buildings ORDER BY id;");
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map([], building_from_row)?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    pub fn buildings_by_name(&self, name: &str) -> EmissionsResult<Vec<BuildingRecord>> {
        let conn = self.connect()?;
        let sql = format!("SELECT {BUILDING_COLUMNS} FROM buildings WHERE name = ?1 ORDER BY id;");
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(params![name], building_from_row)?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    /// The building plus its joined components, in link insertion order.
    pub fn get_building_with_components(
        &self,
        id: i64,
    ) -> EmissionsResult<Option<BuildingWithComponents>> {
        let conn = self.connect()?;
        let Some(building) = Self::building_by_id(&conn, id)? else {
            return Ok(None);
        };

        let mut stmt = conn.prepare(
            "SELECT c.id, c.name, c.component_type, c.metadata_json, c.created_at, cxb.quantity \
             FROM components_by_building cxb \
             JOIN components c ON cxb.component_id = c.id \
             WHERE cxb.building_id = ?1 \
             ORDER BY cxb.id;",
        )?;
        let rows = stmt.query_map(params![id], |row| {
            Ok(BuildingComponent {
                component: component_from_row_at(row, 0)?,
                quantity: row.get(5)?,
            })
        })?;
        let components = rows.collect::<Result<Vec<_>, _>>()?;

        Ok(Some(BuildingWithComponents {
            building,
            components,
        }))
    }

    /// Attach a component, or overwrite the quantity if it is already
    /// attached.
    pub fn upsert_building_component(
        &self,
        building_id: i64,
        component_id: i64,
        quantity: f64,
    ) -> EmissionsResult<()> {
        let conn = self.connect()?;
        upsert_link(&conn, building_id, component_id, quantity)
    }

    pub fn get_building_component(
        &self,
        building_id: i64,
        component_id: i64,
    ) -> EmissionsResult<Option<BuildingComponent>> {
        let conn = self.connect()?;
        Ok(conn
            .query_row(
                "SELECT c.id, c.name, c.component_type, c.metadata_json, c.created_at, cxb.quantity \
                 FROM components_by_building cxb \
                 JOIN components c ON cxb.component_id = c.id \
                 WHERE cxb.building_id = ?1 AND cxb.component_id = ?2;",
                params![building_id, component_id],
                |row| {
                    Ok(BuildingComponent {
                        component: component_from_row_at(row, 0)?,
                        quantity: row.get(5)?,
                    })
                },
            )
            .optional()?)
    }

    /// Returns false when the component is not attached to the building.
    pub fn update_building_component_quantity(
        &self,
        building_id: i64,
        component_id: i64,
        quantity: f64,
    ) -> EmissionsResult<bool> {
        let conn = self.connect()?;
        let changed = conn.execute(
            "UPDATE components_by_building SET quantity = ?1 \
             WHERE building_id = ?2 AND component_id = ?3;",
            params![quantity, building_id, component_id],
        )?;
        Ok(changed > 0)
    }

    pub fn remove_building_component(
        &self,
        building_id: i64,
        component_id: i64,
    ) -> EmissionsResult<bool> {
        let conn = self.connect()?;
        let changed = conn.execute(
            "DELETE FROM components_by_building WHERE building_id = ?1 AND component_id = ?2;",
            params![building_id, component_id],
        )?;
        Ok(changed > 0)
    }
}

// ---------------------------------------------------------------------------
// Store seams
// ---------------------------------------------------------------------------

impl EmissionFactorStore for Database {
    fn lookup(
        &self,
        name: &str,
        category: FactorCategory,
    ) -> EmissionsResult<Vec<EmissionFactorRecord>> {
        self.emission_factors_by_name_and_category(name, category)
    }
}

impl ComponentStore for Database {
    fn get_by_id(&self, component_id: i64) -> EmissionsResult<Option<ComponentRecord>> {
        Database::get_component(self, component_id)
    }
}

impl BuildingStore for Database {
    fn get_with_components(
        &self,
        building_id: i64,
    ) -> EmissionsResult<Option<BuildingWithComponents>> {
        self.get_building_with_components(building_id)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use tempfile::TempDir;

    use super::*;

    fn open() -> (TempDir, Database) {
        let dir = tempfile::tempdir().unwrap();
        let db = Database::new(dir.path().join("nested/emissions.db")).unwrap();
        db.init_schema().unwrap();
        (dir, db)
    }

    fn new_factor(name: &str, category: FactorCategory, value: f64) -> NewEmissionFactor {
        NewEmissionFactor {
            name: name.to_string(),
            category,
            emission_factor: value,
            unit: "kg CO2e/kWh".to_string(),
            source: None,
        }
    }

    fn metadata(value: serde_json::Value) -> Parameters {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn init_creates_parent_dirs_and_is_repeatable() {
        let (dir, db) = open();
        assert!(dir.path().join("nested").is_dir());
        db.init_schema().unwrap();
    }

    #[test]
    fn factor_lookup_keeps_duplicates_visible() {
        let (_dir, db) = open();
        db.insert_emission_factor(&new_factor("electricity", FactorCategory::Energy, 0.5))
            .unwrap();
        db.insert_emission_factor(&new_factor("electricity", FactorCategory::Water, 0.9))
            .unwrap();
        assert_eq!(db.lookup("electricity", FactorCategory::Energy).unwrap().len(), 1);

        db.insert_emission_factor(&new_factor("electricity", FactorCategory::Energy, 0.6))
            .unwrap();
        assert_eq!(db.lookup("electricity", FactorCategory::Energy).unwrap().len(), 2);
        assert!(db.lookup("coal", FactorCategory::Energy).unwrap().is_empty());
    }

    #[test]
    fn factor_update_and_delete() {
        let (_dir, db) = open();
        let created = db
            .insert_emission_factor(&new_factor("steel", FactorCategory::Material, 1.85))
            .unwrap();
        assert_eq!(created.category, FactorCategory::Material);
        assert!(!created.created_at.is_empty());

        let updated = db
            .update_emission_factor(
                created.id,
                &EmissionFactorUpdate {
                    emission_factor: Some(1.9),
                    source: Some("EPD 2024".to_string()),
                    ..Default::default()
                },
            )
            .unwrap()
            .unwrap();
        assert_eq!(updated.emission_factor, 1.9);
        assert_eq!(updated.name, "steel");
        assert_eq!(updated.source.as_deref(), Some("EPD 2024"));

        assert!(db
            .update_emission_factor(9999, &EmissionFactorUpdate::default())
            .unwrap()
            .is_none());
        assert!(db.delete_emission_factor(created.id).unwrap());
        assert!(!db.delete_emission_factor(created.id).unwrap());
        assert!(db.list_emission_factors().unwrap().is_empty());
    }

    #[test]
    fn component_metadata_round_trips_verbatim() {
        let (_dir, db) = open();
        let meta = metadata(json!({"material_name": "concrete", "density_kg_m3": 2400, "volume_m3": 10.5}));
        let created = db
            .insert_component("slab", ComponentType::Material, &meta)
            .unwrap();
        let fetched = db.get_component(created.id).unwrap().unwrap();
        assert_eq!(fetched.metadata, meta);
        assert_eq!(fetched.component_type, "material");
        assert_eq!(db.components_by_type(ComponentType::Material).unwrap().len(), 1);
        assert!(db.components_by_type(ComponentType::Water).unwrap().is_empty());
    }

    #[test]
    fn building_join_preserves_link_order() {
        let (_dir, db) = open();
        let a = db
            .insert_component("a", ComponentType::Material, &metadata(json!({"material_name": "steel"})))
            .unwrap();
        let b = db
            .insert_component("b", ComponentType::Material, &metadata(json!({"material_name": "wood"})))
            .unwrap();
        let building = db
            .insert_building(
                "Office",
                Some("Oslo"),
                &[
                    BuildingComponentLink { component_id: b.id, quantity: 2.0 },
                    BuildingComponentLink { component_id: a.id, quantity: 5.0 },
                ],
            )
            .unwrap();

        let joined = db.get_with_components(building.id).unwrap().unwrap();
        assert_eq!(joined.building.location.as_deref(), Some("Oslo"));
        let names: Vec<&str> = joined.components.iter().map(|c| c.component.name.as_str()).collect();
        assert_eq!(names, vec!["b", "a"]);
        assert_eq!(joined.components[1].quantity, 5.0);

        assert!(db.get_with_components(building.id + 100).unwrap().is_none());
    }

    #[test]
    fn link_quantity_updates_and_removal() {
        let (_dir, db) = open();
        let c = db
            .insert_component("c", ComponentType::Material, &metadata(json!({"material_name": "steel"})))
            .unwrap();
        let building = db.insert_building("Depot", None, &[]).unwrap();

        assert!(!db.update_building_component_quantity(building.id, c.id, 3.0).unwrap());
        db.upsert_building_component(building.id, c.id, 1.0).unwrap();
        db.upsert_building_component(building.id, c.id, 4.0).unwrap();
        assert_eq!(
            db.get_building_component(building.id, c.id).unwrap().unwrap().quantity,
            4.0
        );
        assert!(db.update_building_component_quantity(building.id, c.id, 3.0).unwrap());
        assert_eq!(
            db.get_building_component(building.id, c.id).unwrap().unwrap().quantity,
            3.0
        );

        assert!(db.delete_component(c.id).unwrap());
        assert!(db.get_building_component(building.id, c.id).unwrap().is_none());
        assert!(!db.remove_building_component(building.id, c.id).unwrap());
    }

    #[test]
    fn buildings_by_name() {
        let (_dir, db) = open();
        db.insert_building("Tower", None, &[]).unwrap();
        db.insert_building("Tower", Some("Bergen"), &[]).unwrap();
        db.insert_building("Annex", None, &[]).unwrap();
        assert_eq!(db.buildings_by_name("Tower").unwrap().len(), 2);
        assert_eq!(db.list_buildings().unwrap().len(), 3);
    }
}
