use std::sync::Arc;

use chrono::Utc;
use dashmap::DashMap;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, DbErr, EntityTrait,
    PaginatorTrait, QueryFilter, QueryOrder, Set,
};
use tokio::sync::{Mutex, OwnedMutexGuard};

use super::{GenerationConfig, GenerationRecord, RecordFilter, RecordStatus, RecordSummary};
use crate::catalog::{ColumnDescriptor, TableDescriptor};
use crate::entity::code_gen_record;
use crate::error::{CodegenError, Result};
use crate::pagination::{Page, PageRequest};

/// Exclusive hold on one record. Store writes to the same id wait until it
/// is dropped.
pub struct RecordLock {
    id: i32,
    _guard: OwnedMutexGuard<()>,
}

impl RecordLock {
    pub fn id(&self) -> i32 {
        self.id
    }
}

/// Owns the lifecycle of generation records.
///
/// Writes to one record are serialized in-process by a per-id mutex and across
/// processes by the `version` column: an update only lands if the version it
/// read is still current.
pub struct RecordStore {
    db: DatabaseConnection,
    locks: DashMap<i32, Arc<Mutex<()>>>,
}

impl RecordStore {
    pub fn new(db: DatabaseConnection) -> Self {
        Self {
            db,
            locks: DashMap::new(),
        }
    }

    /// Holds off every other write to `id` for as long as the lock lives.
    pub async fn lock(&self, id: i32) -> RecordLock {
        let mutex: Arc<Mutex<()>> = self.locks.entry(id).or_default().clone();
        RecordLock {
            id,
            _guard: mutex.lock_owned().await,
        }
    }

    pub async fn create(&self, mut config: GenerationConfig, snapshot: &TableDescriptor) -> Result<i32> {
        config.prune_overrides(&snapshot.columns);
        let id = insert(&self.db, &config, snapshot).await?;
        tracing::info!(id, table = %config.table_name, "Created generation record");
        Ok(id)
    }

    /// Inserts several records atomically.
    pub async fn create_many(
        &self,
        items: Vec<(GenerationConfig, TableDescriptor)>,
    ) -> Result<Vec<i32>> {
        use sea_orm::TransactionTrait;

        let txn = self.db.begin().await?;
        let mut ids = Vec::with_capacity(items.len());
        for (mut config, snapshot) in items {
            config.prune_overrides(&snapshot.columns);
            ids.push(insert(&txn, &config, &snapshot).await?);
        }
        txn.commit().await?;
        Ok(ids)
    }

    pub async fn get(&self, id: i32) -> Result<GenerationRecord> {
        let model = self.find(id).await?;
        decode(model)
    }

    /// Replaces the config and the column snapshot. Returns the names of
    /// overrides dropped because `snapshot` no longer has those columns.
    pub async fn update(
        &self,
        id: i32,
        mut config: GenerationConfig,
        snapshot: &TableDescriptor,
    ) -> Result<Vec<String>> {
        let _held = self.lock(id).await;

        let current = self.find(id).await?;
        let dropped = config.prune_overrides(&snapshot.columns);

        let res = code_gen_record::Entity::update_many()
            .col_expr(
                code_gen_record::Column::TableName,
                Expr::value(config.table_name.clone()),
            )
            .col_expr(
                code_gen_record::Column::TableComment,
                Expr::value(snapshot.comment.clone()),
            )
            .col_expr(
                code_gen_record::Column::PackageName,
                Expr::value(config.package_name.clone()),
            )
            .col_expr(
                code_gen_record::Column::ModuleName,
                Expr::value(config.module_name.clone()),
            )
            .col_expr(code_gen_record::Column::Config, Expr::value(to_json(&config)?))
            .col_expr(
                code_gen_record::Column::Snapshot,
                Expr::value(to_json(&snapshot.columns)?),
            )
            .col_expr(
                code_gen_record::Column::Status,
                Expr::value(RecordStatus::Pending.as_str()),
            )
            .col_expr(
                code_gen_record::Column::Version,
                Expr::value(current.version + 1),
            )
            .col_expr(
                code_gen_record::Column::UpdatedAt,
                Expr::value(Utc::now().naive_utc()),
            )
            .filter(code_gen_record::Column::Id.eq(id))
            .filter(code_gen_record::Column::Version.eq(current.version))
            .exec(&self.db)
            .await?;

        if res.rows_affected == 0 {
            return Err(CodegenError::Conflict(format!(
                "generation record {id} was modified concurrently"
            )));
        }

        tracing::info!(id, version = current.version + 1, "Updated generation record");
        Ok(dropped)
    }

    /// Marks the locked record generated, provided it is still at `version`.
    pub async fn mark_generated(&self, held: &RecordLock, version: i32) -> Result<()> {
        let id = held.id();

        let res = code_gen_record::Entity::update_many()
            .col_expr(
                code_gen_record::Column::Status,
                Expr::value(RecordStatus::Generated.as_str()),
            )
            .col_expr(code_gen_record::Column::Version, Expr::value(version + 1))
            .col_expr(
                code_gen_record::Column::UpdatedAt,
                Expr::value(Utc::now().naive_utc()),
            )
            .filter(code_gen_record::Column::Id.eq(id))
            .filter(code_gen_record::Column::Version.eq(version))
            .exec(&self.db)
            .await?;

        if res.rows_affected == 0 {
            // distinguish a vanished record from a concurrent edit
            self.find(id).await?;
            return Err(CodegenError::Conflict(format!(
                "generation record {id} changed while generating"
            )));
        }
        Ok(())
    }

    pub async fn delete(&self, id: i32) -> Result<()> {
        let held = self.lock(id).await;

        let res = code_gen_record::Entity::delete_by_id(id)
            .exec(&self.db)
            .await?;

        drop(held);
        self.locks.remove(&id);

        if res.rows_affected == 0 {
            return Err(CodegenError::not_found(format!("generation record {id}")));
        }
        tracing::info!(id, "Deleted generation record");
        Ok(())
    }

    pub async fn list(&self, filter: &RecordFilter, page: PageRequest) -> Result<Page<RecordSummary>> {
        let mut query = code_gen_record::Entity::find();

        if let Some(ref name) = filter.table_name
            && !name.is_empty()
        {
            query = query.filter(code_gen_record::Column::TableName.contains(name.as_str()));
        }
        if let Some(ref comment) = filter.table_comment
            && !comment.is_empty()
        {
            query = query.filter(code_gen_record::Column::TableComment.contains(comment.as_str()));
        }
        if let Some((from, to)) = filter.created_range {
            query = query.filter(code_gen_record::Column::CreatedAt.between(from, to));
        }
        if let Some(status) = filter.status {
            query = query.filter(code_gen_record::Column::Status.eq(status.as_str()));
        }

        let query = query
            .order_by_desc(code_gen_record::Column::CreatedAt)
            .order_by_desc(code_gen_record::Column::Id);

        let page = match page.window() {
            None => Page::everything(query.all(&self.db).await?),
            Some((index, size)) => {
                let paginator = query.paginate(&self.db, size);
                let total = paginator.num_items().await?;
                let list = match PageRequest::offset_of(index, size) {
                    Some(offset) if offset < total => paginator.fetch_page(index).await?,
                    _ => Vec::new(),
                };
                Page {
                    list,
                    total,
                    current_page: index + 1,
                    page_size: size as i64,
                }
            }
        };

        let mut summaries = Vec::with_capacity(page.list.len());
        for m in &page.list {
            summaries.push(summary(m)?);
        }
        Ok(Page {
            list: summaries,
            total: page.total,
            current_page: page.current_page,
            page_size: page.page_size,
        })
    }

    async fn find(&self, id: i32) -> Result<code_gen_record::Model> {
        code_gen_record::Entity::find_by_id(id)
            .one(&self.db)
            .await?
            .ok_or_else(|| CodegenError::not_found(format!("generation record {id}")))
    }
}

async fn insert<C: ConnectionTrait>(
    db: &C,
    config: &GenerationConfig,
    snapshot: &TableDescriptor,
) -> Result<i32> {
    let now = Utc::now().naive_utc();
    let model = code_gen_record::ActiveModel {
        table_name: Set(config.table_name.clone()),
        table_comment: Set(snapshot.comment.clone()),
        package_name: Set(config.package_name.clone()),
        module_name: Set(config.module_name.clone()),
        config: Set(to_json(config)?),
        snapshot: Set(to_json(&snapshot.columns)?),
        status: Set(RecordStatus::Pending.as_str().to_string()),
        version: Set(1),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    }
    .insert(db)
    .await?;
    Ok(model.id)
}

fn to_json<T: serde::Serialize>(value: &T) -> Result<String> {
    serde_json::to_string(value).map_err(|e| CodegenError::Storage(DbErr::Json(e.to_string())))
}

fn status_of(m: &code_gen_record::Model) -> Result<RecordStatus> {
    m.status
        .parse()
        .map_err(|e: String| CodegenError::Storage(DbErr::Type(e)))
}

fn decode(m: code_gen_record::Model) -> Result<GenerationRecord> {
    let status = status_of(&m)?;
    let config: GenerationConfig = serde_json::from_str(&m.config)
        .map_err(|e| CodegenError::Storage(DbErr::Json(e.to_string())))?;
    let snapshot: Vec<ColumnDescriptor> = serde_json::from_str(&m.snapshot)
        .map_err(|e| CodegenError::Storage(DbErr::Json(e.to_string())))?;
    Ok(GenerationRecord {
        id: m.id,
        table_name: m.table_name,
        table_comment: m.table_comment,
        config,
        snapshot,
        status,
        version: m.version,
        created_at: m.created_at,
        updated_at: m.updated_at,
    })
}

fn summary(m: &code_gen_record::Model) -> Result<RecordSummary> {
    Ok(RecordSummary {
        id: m.id,
        table_name: m.table_name.clone(),
        table_comment: m.table_comment.clone(),
        package_name: m.package_name.clone(),
        module_name: m.module_name.clone(),
        status: status_of(m)?,
        version: m.version,
        created_at: m.created_at,
        updated_at: m.updated_at,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::fixtures::{column, orders};
    use crate::record::ColumnOverride;
    use crate::typemap::{FormMode, ValidationMode, WhereMode};
    use migration::MigratorTrait as _;
    use sea_orm::Database;

    async fn setup_db() -> DatabaseConnection {
        let db = Database::connect("sqlite::memory:").await.unwrap();
        migration::Migrator::up(&db, None).await.unwrap();
        db
    }

    fn override_for(column: &str) -> ColumnOverride {
        ColumnOverride {
            visible_in_list: false,
            ..ColumnOverride::new(
                column,
                FormMode::Textarea,
                ValidationMode::Required,
                WhereMode::Eq,
            )
        }
    }

    fn orders_config() -> GenerationConfig {
        let mut cfg = GenerationConfig::defaults_for(&orders(), "alice");
        cfg.remark = "first draft".to_string();
        cfg.options.tree = true;
        cfg.overrides.push(override_for("customer_name"));
        cfg
    }

    #[tokio::test]
    async fn create_then_get_round_trips() {
        let store = RecordStore::new(setup_db().await);
        let cfg = orders_config();
        let snapshot = orders();
        let id = store.create(cfg.clone(), &snapshot).await.unwrap();

        let rec = store.get(id).await.unwrap();
        assert_eq!(rec.config, cfg);
        assert_eq!(rec.snapshot, snapshot.columns);
        assert_eq!(rec.status, RecordStatus::Pending);
        assert_eq!(rec.version, 1);
        assert_eq!(rec.table_comment, "Customer orders");
    }

    #[tokio::test]
    async fn snapshot_is_frozen_against_later_schema_changes() {
        let store = RecordStore::new(setup_db().await);
        let mut live = orders();
        let id = store.create(orders_config(), &live).await.unwrap();

        live.columns.pop();
        live.columns.push(column("note", "text", 5));

        let rec = store.get(id).await.unwrap();
        assert_eq!(rec.snapshot, orders().columns);
    }

    #[tokio::test]
    async fn update_prunes_overrides_for_removed_columns() {
        let store = RecordStore::new(setup_db().await);
        let id = store.create(orders_config(), &orders()).await.unwrap();

        let mut altered = orders();
        altered.columns.retain(|c| c.name != "customer_name");
        let mut cfg = orders_config();
        cfg.overrides.push(override_for("total_amount"));

        let dropped = store.update(id, cfg, &altered).await.unwrap();
        assert_eq!(dropped, vec!["customer_name".to_string()]);

        let rec = store.get(id).await.unwrap();
        assert_eq!(rec.config.overrides, vec![override_for("total_amount")]);
        assert_eq!(rec.snapshot, altered.columns);
        assert_eq!(rec.version, 2);
    }

    #[tokio::test]
    async fn update_missing_record_is_not_found() {
        let store = RecordStore::new(setup_db().await);
        let err = store.update(42, orders_config(), &orders()).await.unwrap_err();
        assert!(matches!(err, CodegenError::NotFound(_)));
    }

    #[tokio::test]
    async fn second_delete_is_not_found() {
        let store = RecordStore::new(setup_db().await);
        let id = store.create(orders_config(), &orders()).await.unwrap();
        store.delete(id).await.unwrap();
        let err = store.delete(id).await.unwrap_err();
        assert!(matches!(err, CodegenError::NotFound(_)));
        assert!(matches!(store.get(id).await.unwrap_err(), CodegenError::NotFound(_)));
    }

    #[tokio::test]
    async fn concurrent_updates_are_serialized() {
        let store = Arc::new(RecordStore::new(setup_db().await));
        let id = store.create(orders_config(), &orders()).await.unwrap();

        let mut handles = Vec::new();
        for i in 0..8 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                let mut cfg = orders_config();
                cfg.remark = format!("edit {i}");
                store.update(id, cfg, &orders()).await
            }));
        }
        for h in handles {
            h.await.unwrap().unwrap();
        }
        assert_eq!(store.get(id).await.unwrap().version, 9);
    }

    #[tokio::test]
    async fn mark_generated_rejects_stale_version() {
        let store = RecordStore::new(setup_db().await);
        let id = store.create(orders_config(), &orders()).await.unwrap();
        store.update(id, orders_config(), &orders()).await.unwrap();

        let held = store.lock(id).await;
        let err = store.mark_generated(&held, 1).await.unwrap_err();
        assert!(matches!(err, CodegenError::Conflict(_)));

        store.mark_generated(&held, 2).await.unwrap();
        drop(held);
        assert_eq!(store.get(id).await.unwrap().status, RecordStatus::Generated);
    }

    #[tokio::test]
    async fn list_honors_sentinel_and_filters() {
        let store = RecordStore::new(setup_db().await);
        for _ in 0..12 {
            store.create(orders_config(), &orders()).await.unwrap();
        }
        let mut other = orders();
        other.name = "invoices".into();
        other.comment = "Billing".into();
        let mut cfg = orders_config();
        cfg.table_name = "invoices".into();
        store.create(cfg, &other).await.unwrap();

        let page = store
            .list(&RecordFilter::default(), PageRequest::new(1, 5))
            .await
            .unwrap();
        assert_eq!(page.total, 13);
        assert_eq!(page.list.len(), 5);

        let all = store
            .list(&RecordFilter::default(), PageRequest::all())
            .await
            .unwrap();
        assert_eq!(all.list.len(), 13);
        assert_eq!(all.total, 13);
        assert_eq!(all.page_size, -1);

        let filter = RecordFilter {
            table_comment: Some("Bill".into()),
            ..Default::default()
        };
        let page = store.list(&filter, PageRequest::all()).await.unwrap();
        assert_eq!(page.total, 1);
        assert_eq!(page.list[0].table_name, "invoices");
    }

    #[tokio::test]
    async fn create_many_is_all_or_nothing() {
        let db = setup_db().await;
        db.execute_unprepared(
            "CREATE TRIGGER reject_ghost BEFORE INSERT ON code_gen_record \
             WHEN NEW.table_name = 'ghost' BEGIN SELECT RAISE(ABORT, 'rejected'); END;",
        )
        .await
        .unwrap();
        let store = RecordStore::new(db);

        let ids = store
            .create_many(vec![
                (orders_config(), orders()),
                (orders_config(), orders()),
            ])
            .await
            .unwrap();
        assert_eq!(ids.len(), 2);
        assert_ne!(ids[0], ids[1]);

        let mut ghost = orders_config();
        ghost.table_name = "ghost".into();
        let err = store
            .create_many(vec![(orders_config(), orders()), (ghost, orders())])
            .await
            .unwrap_err();
        assert!(matches!(err, CodegenError::Storage(_)));

        let page = store
            .list(&RecordFilter::default(), PageRequest::all())
            .await
            .unwrap();
        assert_eq!(page.total, 2);
    }

    #[tokio::test]
    async fn lock_holds_off_updates() {
        let store = Arc::new(RecordStore::new(setup_db().await));
        let id = store.create(orders_config(), &orders()).await.unwrap();

        let held = store.lock(id).await;
        let updating = tokio::spawn({
            let store = store.clone();
            async move { store.update(id, orders_config(), &orders()).await }
        });
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        assert!(!updating.is_finished());

        store.mark_generated(&held, 1).await.unwrap();
        drop(held);
        updating.await.unwrap().unwrap();

        let rec = store.get(id).await.unwrap();
        assert_eq!(rec.version, 3);
        assert_eq!(rec.status, RecordStatus::Pending);
    }

    #[tokio::test]
    async fn page_past_the_end_is_empty() {
        let store = RecordStore::new(setup_db().await);
        store.create(orders_config(), &orders()).await.unwrap();

        let page = store
            .list(&RecordFilter::default(), PageRequest::new(u64::MAX, 10))
            .await
            .unwrap();
        assert!(page.list.is_empty());
        assert_eq!(page.total, 1);
    }
}
