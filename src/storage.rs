//! Local SQLite data source
//!
//! Every entity shares one `records` table: the resource name and the
//! record's display key identify a row, the body is the record's JSON.

use std::marker::PhantomData;

use async_trait::async_trait;
use serde_json::{Map, Value};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{QueryBuilder, Sqlite, SqlitePool};
use tracing::{debug, info};

use crate::crud::{DataSource, LoadParams, Page, SortDirection};
use crate::errors::{RegistryError, RegistryResult};
use crate::models::Record;

pub struct Storage {
    pool: SqlitePool,
}

impl Storage {
    pub async fn new(database_path: &str) -> RegistryResult<Self> {
        let options = SqliteConnectOptions::new()
            .filename(database_path)
            .create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(4)
            .connect_with(options)
            .await?;

        // Initialize schema
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS records (
                row_id INTEGER PRIMARY KEY AUTOINCREMENT,
                resource TEXT NOT NULL,
                record_key TEXT NOT NULL,
                body TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                UNIQUE (resource, record_key)
            )
            "#,
        )
        .execute(&pool)
        .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_records_resource ON records(resource)")
            .execute(&pool)
            .await?;

        info!("Opened registry database at {}", database_path);
        Ok(Storage { pool })
    }

    /// Data source for one entity type; `searchable` fields are matched by `search`
    pub fn source<R: Record>(&self, searchable: &[&str]) -> SqliteSource<R> {
        SqliteSource {
            pool: self.pool.clone(),
            searchable: searchable.iter().map(|f| f.to_string()).collect(),
            _record: PhantomData,
        }
    }

    pub async fn count(&self, resource: &str) -> RegistryResult<u64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM records WHERE resource = ?")
            .bind(resource)
            .fetch_one(&self.pool)
            .await?;
        Ok(count as u64)
    }
}

pub struct SqliteSource<R> {
    pool: SqlitePool,
    searchable: Vec<String>,
    _record: PhantomData<fn() -> R>,
}

fn json_path(field: &str) -> String {
    format!("$.{}", field)
}

fn escape_like(term: &str) -> String {
    let mut escaped = String::with_capacity(term.len());
    for c in term.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

fn into_object(payload: Value) -> RegistryResult<Map<String, Value>> {
    match payload {
        Value::Object(map) => Ok(map),
        other => Err(RegistryError::InvalidPayload(format!(
            "expected an object, got {}",
            other
        ))),
    }
}

fn decode<R: Record>(body: Value) -> RegistryResult<R> {
    serde_json::from_value(body).map_err(|e| RegistryError::InvalidPayload(e.to_string()))
}

impl<R: Record> SqliteSource<R> {
    fn push_filters<'a>(&self, query: &mut QueryBuilder<'a, Sqlite>, params: &LoadParams) {
        query.push(" WHERE resource = ");
        query.push_bind(R::RESOURCE);

        let term = match params.search {
            Some(ref term) if !self.searchable.is_empty() => term,
            _ => return,
        };
        let pattern = format!("%{}%", escape_like(term));

        query.push(" AND (");
        for (i, field) in self.searchable.iter().enumerate() {
            if i > 0 {
                query.push(" OR ");
            }
            query.push("CAST(json_extract(body, ");
            query.push_bind(json_path(field));
            query.push(") AS TEXT) LIKE ");
            query.push_bind(pattern.clone());
            query.push(" ESCAPE '\\'");
        }
        query.push(")");
    }

    async fn find_body(&self, key: &R::Key) -> RegistryResult<Value> {
        let body: Option<String> =
            sqlx::query_scalar("SELECT body FROM records WHERE resource = ? AND record_key = ?")
                .bind(R::RESOURCE)
                .bind(key.to_string())
                .fetch_optional(&self.pool)
                .await?;

        match body {
            Some(body) => Ok(serde_json::from_str(&body)?),
            None => Err(self.not_found(key)),
        }
    }

    fn not_found(&self, key: &R::Key) -> RegistryError {
        RegistryError::NotFound {
            resource: R::RESOURCE.to_string(),
            key: key.to_string(),
        }
    }

    fn conflict(err: sqlx::Error, key: &str) -> RegistryError {
        match err {
            sqlx::Error::Database(ref db) if db.is_unique_violation() => RegistryError::InvalidPayload(
                format!("{} '{}' already exists", R::RESOURCE, key),
            ),
            other => RegistryError::Database(other),
        }
    }
}

#[async_trait]
impl<R: Record> DataSource<R> for SqliteSource<R> {
    async fn load(&self, params: &LoadParams) -> RegistryResult<Page<R>> {
        params.validate()?;

        let mut count = QueryBuilder::<Sqlite>::new("SELECT COUNT(*) FROM records");
        self.push_filters(&mut count, params);
        let total: i64 = count.build_query_scalar().fetch_one(&self.pool).await?;

        let mut select = QueryBuilder::<Sqlite>::new("SELECT body FROM records");
        self.push_filters(&mut select, params);
        match params.sort_by {
            Some(ref field) => {
                select.push(" ORDER BY json_extract(body, ");
                select.push_bind(json_path(field));
                select.push(match params.sort_direction.unwrap_or(SortDirection::Asc) {
                    SortDirection::Asc => ") ASC, row_id ASC",
                    SortDirection::Desc => ") DESC, row_id ASC",
                });
            }
            None => {
                select.push(" ORDER BY row_id ASC");
            }
        }
        let offset = (params.page as i64 - 1) * params.page_size as i64;
        select.push(" LIMIT ");
        select.push_bind(params.page_size as i64);
        select.push(" OFFSET ");
        select.push_bind(offset);

        let bodies: Vec<String> = select.build_query_scalar().fetch_all(&self.pool).await?;
        let data = bodies
            .iter()
            .map(|body| serde_json::from_str::<R>(body))
            .collect::<Result<Vec<_>, _>>()?;

        debug!(
            resource = R::RESOURCE,
            page = params.page,
            rows = data.len(),
            total,
            "loaded page"
        );

        let total = total.max(0) as u64;
        Ok(Page {
            data,
            total,
            page: params.page,
            page_size: params.page_size,
            total_pages: crate::crud::state::total_pages(total, params.page_size),
        })
    }

    async fn load_one(&self, key: &R::Key) -> RegistryResult<R> {
        let body = self.find_body(key).await?;
        Ok(serde_json::from_value(body)?)
    }

    async fn create(&self, payload: Value) -> RegistryResult<R> {
        let mut body = into_object(payload)?;
        let mut tx = self.pool.begin().await?;

        // Generated ids follow the table's AUTOINCREMENT sequence so they are never reused.
        let next_row: i64 = sqlx::query_scalar(
            "SELECT COALESCE((SELECT seq FROM sqlite_sequence WHERE name = 'records'), 0) + 1",
        )
        .fetch_one(&mut *tx)
        .await?;
        let generated = !body.contains_key("id");
        if generated {
            body.insert("id".to_string(), Value::from(next_row));
        }

        let record: R = decode(Value::Object(body))?;
        let key = record.key().to_string();
        let stored = serde_json::to_string(&record)?;

        let mut insert = QueryBuilder::<Sqlite>::new(
            "INSERT INTO records (row_id, resource, record_key, body, updated_at) VALUES (",
        );
        {
            let mut values = insert.separated(", ");
            values.push_bind(if generated { Some(next_row) } else { None });
            values.push_bind(R::RESOURCE);
            values.push_bind(key.clone());
            values.push_bind(stored);
            values.push_bind(chrono::Local::now().to_rfc3339());
        }
        insert.push(")");
        insert
            .build()
            .execute(&mut *tx)
            .await
            .map_err(|e| Self::conflict(e, &key))?;
        tx.commit().await?;

        Ok(record)
    }

    async fn update(&self, key: &R::Key, payload: Value) -> RegistryResult<R> {
        let changes = into_object(payload)?;
        let mut body = into_object(self.find_body(key).await?)?;
        body.extend(changes);

        let record: R = decode(Value::Object(body))?;
        if &record.key() != key {
            return Err(RegistryError::InvalidPayload(format!(
                "key of {} '{}' cannot be changed",
                R::RESOURCE,
                key
            )));
        }

        sqlx::query(
            "UPDATE records SET body = ?, updated_at = ? WHERE resource = ? AND record_key = ?",
        )
        .bind(serde_json::to_string(&record)?)
        .bind(chrono::Local::now().to_rfc3339())
        .bind(R::RESOURCE)
        .bind(key.to_string())
        .execute(&self.pool)
        .await?;

        Ok(record)
    }

    async fn delete(&self, key: &R::Key) -> RegistryResult<()> {
        let result = sqlx::query("DELETE FROM records WHERE resource = ? AND record_key = ?")
            .bind(R::RESOURCE)
            .bind(key.to_string())
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(self.not_found(key));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{FamilyMember, MemberKey, Person, Unit};
    use serde_json::json;
    use tempfile::TempDir;

    async fn storage(dir: &TempDir) -> Storage {
        let path = dir.path().join("registry.db");
        Storage::new(path.to_str().unwrap()).await.unwrap()
    }

    async fn seed_units(source: &SqliteSource<Unit>, count: usize) {
        for i in 0..count {
            source
                .create(json!({
                    "code": format!("U{:02}", i),
                    "name": format!("Office {}", i),
                    "active": i % 2 == 0
                }))
                .await
                .unwrap();
        }
    }

    #[tokio::test]
    async fn test_create_assigns_ids_and_paginates() {
        let dir = TempDir::new().unwrap();
        let storage = storage(&dir).await;
        let units = storage.source::<Unit>(&["code", "name"]);
        seed_units(&units, 25).await;

        let page = units.load(&LoadParams::new(3, 10)).await.unwrap();
        assert_eq!(page.total, 25);
        assert_eq!(page.total_pages, 3);
        assert_eq!(page.data.len(), 5);
        assert_eq!(page.data[0].id, 21);
        assert_eq!(storage.count("units").await.unwrap(), 25);
    }

    #[tokio::test]
    async fn test_search_and_sort() {
        let dir = TempDir::new().unwrap();
        let storage = storage(&dir).await;
        let units = storage.source::<Unit>(&["code", "name"]);
        seed_units(&units, 12).await;

        let params = LoadParams::new(1, 10)
            .with_search("office 1")
            .with_sort("code", SortDirection::Desc);
        let page = units.load(&params).await.unwrap();
        let codes: Vec<_> = page.data.iter().map(|u| u.code.as_str()).collect();
        assert_eq!(codes, vec!["U11", "U10", "U01"]);
        assert_eq!(page.total, 3);
    }

    #[tokio::test]
    async fn test_search_escapes_wildcards() {
        let dir = TempDir::new().unwrap();
        let storage = storage(&dir).await;
        let units = storage.source::<Unit>(&["name"]);
        seed_units(&units, 3).await;

        let page = units.load(&LoadParams::new(1, 10).with_search("%")).await.unwrap();
        assert_eq!(page.total, 0);
    }

    #[tokio::test]
    async fn test_update_merges_payload() {
        let dir = TempDir::new().unwrap();
        let storage = storage(&dir).await;
        let persons = storage.source::<Person>(&["last_name"]);
        let created = persons
            .create(json!({
                "document_type": "national_id",
                "document_number": "12345678",
                "first_name": "Lucia",
                "last_name": "Fernandez",
                "birth_date": "1988-04-02"
            }))
            .await
            .unwrap();

        let updated = persons
            .update(&created.id, json!({"phone": "555-0199"}))
            .await
            .unwrap();
        assert_eq!(updated.phone.as_deref(), Some("555-0199"));
        assert_eq!(updated.first_name, "Lucia");

        let reloaded = persons.load_one(&created.id).await.unwrap();
        assert_eq!(reloaded, updated);

        let renumbered = persons.update(&created.id, json!({"id": 500})).await;
        assert!(matches!(renumbered, Err(RegistryError::InvalidPayload(_))));
    }

    #[tokio::test]
    async fn test_composite_keys_and_delete() {
        let dir = TempDir::new().unwrap();
        let storage = storage(&dir).await;
        let members = storage.source::<FamilyMember>(&["full_name"]);
        let member = json!({
            "household_id": 1,
            "person_id": 2,
            "full_name": "Mateo Fernandez",
            "relationship": "son",
            "dependent": true
        });
        members.create(member.clone()).await.unwrap();

        let duplicate = members.create(member).await;
        assert!(matches!(duplicate, Err(RegistryError::InvalidPayload(_))));

        let key = MemberKey { household_id: 1, person_id: 2 };
        assert!(members.load_one(&key).await.unwrap().dependent);
        members.delete(&key).await.unwrap();
        assert!(matches!(
            members.delete(&key).await,
            Err(RegistryError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_create_rejects_malformed_payload() {
        let dir = TempDir::new().unwrap();
        let storage = storage(&dir).await;
        let units = storage.source::<Unit>(&["name"]);
        assert!(matches!(
            units.create(json!({"name": "No code"})).await,
            Err(RegistryError::InvalidPayload(_))
        ));
        assert!(matches!(
            units.create(json!(["not", "an", "object"])).await,
            Err(RegistryError::InvalidPayload(_))
        ));
    }

    #[test]
    fn test_escape_like() {
        assert_eq!(escape_like("50%_off\\"), "50\\%\\_off\\\\");
    }
}
