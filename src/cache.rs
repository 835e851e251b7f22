//! Entity cache store
//!
//! The in-memory map is the source of truth for reads; the database trails
//! it through the write pool. Mutating calls touch the map synchronously and
//! enqueue the matching row operations, so callers observe their own writes
//! immediately but get no synchronous durability confirmation. Operations on
//! the same id are independent background units: the cache always reflects
//! the last synchronous mutation, the store is eventually consistent.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::alloc;
use crate::chest::{Chest, ChestId, Location};
use crate::connector::Connector;
use crate::item::ItemCodec;
use crate::migration::{self, MigrationRunner};
use crate::storage::rows;
use crate::tier::{Tier, TierCatalog};
use crate::worker::WritePool;
use crate::Result;

const WRITE_QUEUE_CAPACITY: usize = 256;

/// Cache-backed store for container entities.
pub struct ChestStore {
    chests: Arc<Mutex<HashMap<ChestId, Chest>>>,
    connector: Arc<dyn Connector>,
    tiers: Arc<dyn TierCatalog>,
    codec: Arc<dyn ItemCodec>,
    pool: WritePool,
    prefix: String,
    started: AtomicBool,
}

impl ChestStore {
    pub fn new(
        connector: Arc<dyn Connector>,
        tiers: Arc<dyn TierCatalog>,
        codec: Arc<dyn ItemCodec>,
        prefix: impl Into<String>,
        workers: usize,
    ) -> Self {
        Self {
            chests: Arc::new(Mutex::new(HashMap::new())),
            connector,
            tiers,
            codec,
            pool: WritePool::start(workers, WRITE_QUEUE_CAPACITY),
            prefix: prefix.into(),
            started: AtomicBool::new(false),
        }
    }

    /// Run pending migrations, then populate the cache in the background.
    ///
    /// Migration failure is fatal and surfaces here; the bulk load runs
    /// behind the pool, and reads return previously cached data (nothing,
    /// on a first start) until it lands. Calling `start` again is a no-op.
    pub fn start(&self) -> Result<()> {
        if self.started.swap(true, Ordering::SeqCst) {
            tracing::debug!("chest store already started");
            return Ok(());
        }

        let migrations = migration::all_migrations(&self.prefix);
        let runner = MigrationRunner::new(&self.prefix);
        self.connector
            .with_connection(&mut |conn| runner.run(&migrations, conn))?;

        let chests = Arc::clone(&self.chests);
        let connector = Arc::clone(&self.connector);
        let tiers = Arc::clone(&self.tiers);
        let codec = Arc::clone(&self.codec);
        let prefix = self.prefix.clone();
        self.pool.submit(move || {
            let mut loaded = Vec::new();
            connector.with_connection(&mut |conn| {
                loaded = rows::load_all(conn, &prefix, tiers.as_ref(), codec.as_ref())?;
                Ok(())
            })?;

            let count = loaded.len();
            let mut map = lock(&chests);
            for chest in loaded {
                // Mutations issued while the load ran win over stored rows.
                map.entry(chest.id).or_insert(chest);
            }
            tracing::info!(chests = count, "cache load complete");
            Ok(())
        });

        Ok(())
    }

    /// Drain pending writes, stop the workers, and close the connector.
    pub fn stop(&self) {
        self.pool.shutdown();
        self.connector.close();
        tracing::info!("chest store stopped");
    }

    /// Create a chest at `location`, visible to readers immediately.
    ///
    /// The row write happens behind; the returned entity carries the same
    /// id the row will use.
    pub fn create(&self, tier: Tier, location: Location) -> Chest {
        let chest = {
            let mut map = lock(&self.chests);
            let id = alloc::next_id(map.keys().copied());
            let chest = Chest::new(id, tier, location);
            map.insert(id, chest.clone());
            chest
        };

        let connector = Arc::clone(&self.connector);
        let prefix = self.prefix.clone();
        let row = chest.clone();
        self.pool.submit(move || {
            connector.with_connection(&mut |conn| rows::upsert_chest(conn, &prefix, &row))
        });

        chest
    }

    /// Find the chest at an exact location.
    ///
    /// Should the store ever hold two chests on one spot, the lowest id
    /// wins so repeated lookups agree.
    pub fn find_by_location(&self, location: &Location) -> Option<Chest> {
        let map = lock(&self.chests);
        map.values()
            .filter(|chest| chest.location == *location)
            .min_by_key(|chest| chest.id)
            .cloned()
    }

    /// Look up a chest by id
    pub fn get(&self, id: ChestId) -> Option<Chest> {
        lock(&self.chests).get(&id).cloned()
    }

    /// Number of cached chests
    pub fn len(&self) -> usize {
        lock(&self.chests).len()
    }

    pub fn is_empty(&self) -> bool {
        lock(&self.chests).is_empty()
    }

    /// Overwrite the cached entry and rewrite its rows behind.
    ///
    /// Item rows are deleted and re-inserted. A crash between the two can
    /// leave the store trailing the cache until the next save; the cache
    /// stays authoritative for the running process.
    pub fn save(&self, chest: Chest) {
        lock(&self.chests).insert(chest.id, chest.clone());

        let connector = Arc::clone(&self.connector);
        let codec = Arc::clone(&self.codec);
        let prefix = self.prefix.clone();
        self.pool.submit(move || {
            connector.with_connection(&mut |conn| {
                rows::delete_items(conn, &prefix, chest.id)?;
                rows::upsert_chest(conn, &prefix, &chest)?;
                rows::insert_items(conn, &prefix, chest.id, &chest.items, codec.as_ref())
            })
        });
    }

    /// Drop `id` from the cache and cascade the row deletes behind.
    ///
    /// Unknown ids are a no-op in the cache; the store cleanup still runs.
    pub fn delete(&self, id: ChestId) {
        lock(&self.chests).remove(&id);

        let connector = Arc::clone(&self.connector);
        let prefix = self.prefix.clone();
        self.pool.submit(move || {
            connector.with_connection(&mut |conn| {
                rows::delete_items(conn, &prefix, id)?;
                rows::delete_chest(conn, &prefix, id)
            })
        });
    }

    /// Block until every queued background write has completed.
    pub fn flush(&self) {
        self.pool.flush();
    }

    /// Background writes that have failed since startup
    pub fn failed_writes(&self) -> u64 {
        self.pool.failed_jobs()
    }
}

fn lock<'a, T>(mutex: &'a Mutex<T>) -> MutexGuard<'a, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connector::SqliteConnector;
    use crate::item::{Item, JsonItemCodec};
    use crate::storage::schema;
    use crate::tier::IdentityCatalog;

    const PREFIX: &str = "test_";

    fn test_store() -> (Arc<SqliteConnector>, ChestStore) {
        let connector = Arc::new(SqliteConnector::open_in_memory().unwrap());
        let store = ChestStore::new(
            Arc::clone(&connector) as Arc<dyn Connector>,
            Arc::new(IdentityCatalog),
            Arc::new(JsonItemCodec),
            PREFIX,
            2,
        );
        (connector, store)
    }

    fn loc(x: f64) -> Location {
        Location::new("overworld", x, 64.0, 0.0)
    }

    #[test]
    fn test_create_is_visible_before_the_write_lands() {
        let (_connector, store) = test_store();
        store.start().unwrap();

        let chest = store.create(Tier::new(1), loc(1.0));
        let found = store.find_by_location(&loc(1.0)).unwrap();
        assert_eq!(found.id, chest.id);
    }

    #[test]
    fn test_delete_is_absent_before_the_write_lands() {
        let (_connector, store) = test_store();
        store.start().unwrap();

        let chest = store.create(Tier::new(1), loc(1.0));
        store.delete(chest.id);
        assert!(store.get(chest.id).is_none());
        assert!(store.find_by_location(&loc(1.0)).is_none());

        // deleting again is a no-op
        store.delete(chest.id);
    }

    #[test]
    fn test_freed_ids_are_reused() {
        let (_connector, store) = test_store();
        store.start().unwrap();

        assert_eq!(store.create(Tier::new(1), loc(1.0)).id, 1);
        assert_eq!(store.create(Tier::new(2), loc(2.0)).id, 2);
        store.delete(1);
        assert_eq!(store.create(Tier::new(3), loc(3.0)).id, 1);
    }

    #[test]
    fn test_create_persists_the_cached_id() {
        let (connector, store) = test_store();
        store.start().unwrap();
        store.flush();

        let chest = store.create(Tier::new(4), loc(9.0));
        store.flush();

        let mut row: Option<(ChestId, i64)> = None;
        connector
            .with_connection(&mut |conn| {
                row = Some(conn.query_row(
                    &format!("SELECT chestID, tier FROM {PREFIX}chests"),
                    [],
                    |r| Ok((r.get(0)?, r.get(1)?)),
                )?);
                Ok(())
            })
            .unwrap();

        let (row_id, row_tier) = row.unwrap();
        assert_eq!(row_id, chest.id);
        assert_eq!(row_tier, 4);
        assert_eq!(store.failed_writes(), 0);
    }

    #[test]
    fn test_location_lookup_breaks_ties_to_the_lowest_id() {
        let (_connector, store) = test_store();
        store.start().unwrap();

        let first = store.create(Tier::new(1), loc(5.0));
        let _second = store.create(Tier::new(2), loc(5.0));

        let found = store.find_by_location(&loc(5.0)).unwrap();
        assert_eq!(found.id, first.id);
    }

    #[test]
    fn test_save_with_no_items_clears_stored_rows() {
        let (connector, store) = test_store();
        store.start().unwrap();
        store.flush();

        let chest = store.create(Tier::new(1), loc(1.0));
        store.save(chest.clone().with_items(vec![Item::new("stone", 64)]));
        store.flush();
        assert_eq!(item_rows(&connector), 1);

        store.save(chest.with_items(Vec::new()));
        store.flush();
        assert_eq!(item_rows(&connector), 0);
    }

    #[test]
    fn test_load_substitutes_placeholder_for_corrupt_item() {
        let connector = Arc::new(SqliteConnector::open_in_memory().unwrap());
        connector
            .with_connection(&mut |conn| {
                for stmt in schema::all_schema_statements(PREFIX) {
                    conn.execute(&stmt, [])?;
                }
                conn.execute(
                    &format!(
                        "INSERT INTO {PREFIX}chests (chestID, tier, x, y, z, world) VALUES (1, 2, 0, 64, 0, 'overworld')"
                    ),
                    [],
                )?;
                conn.execute(
                    &format!(
                        "INSERT INTO {PREFIX}items (chestID, item) VALUES (1, '{{\"material\":\"stone\",\"amount\":64}}')"
                    ),
                    [],
                )?;
                conn.execute(
                    &format!("INSERT INTO {PREFIX}items (chestID, item) VALUES (1, 'garbage')"),
                    [],
                )?;
                Ok(())
            })
            .unwrap();

        let store = ChestStore::new(
            Arc::clone(&connector) as Arc<dyn Connector>,
            Arc::new(IdentityCatalog),
            Arc::new(JsonItemCodec),
            PREFIX,
            2,
        );
        store.start().unwrap();
        store.flush();

        let chest = store.get(1).unwrap();
        assert_eq!(chest.tier, Tier::new(2));
        assert_eq!(chest.items.len(), 2);
        assert_eq!(chest.items[0], Item::new("stone", 64));
        assert!(chest.items[1].is_empty());
    }

    #[test]
    fn test_load_merges_with_cache_wins() {
        let connector = Arc::new(SqliteConnector::open_in_memory().unwrap());
        connector
            .with_connection(&mut |conn| {
                for stmt in schema::all_schema_statements(PREFIX) {
                    conn.execute(&stmt, [])?;
                }
                conn.execute(
                    &format!(
                        "INSERT INTO {PREFIX}chests (chestID, tier, x, y, z, world) VALUES (1, 9, 0, 64, 0, 'overworld')"
                    ),
                    [],
                )?;
                Ok(())
            })
            .unwrap();

        let store = ChestStore::new(
            Arc::clone(&connector) as Arc<dyn Connector>,
            Arc::new(IdentityCatalog),
            Arc::new(JsonItemCodec),
            PREFIX,
            2,
        );

        // mutation issued before the bulk load completes keeps its entry
        let created = store.create(Tier::new(5), loc(3.0));
        assert_eq!(created.id, 1);

        store.start().unwrap();
        store.flush();

        assert_eq!(store.get(1).unwrap().tier, Tier::new(5));
    }

    #[test]
    fn test_second_start_is_a_noop() {
        let (_connector, store) = test_store();
        store.start().unwrap();
        store.flush();
        store.create(Tier::new(1), loc(1.0));

        store.start().unwrap();
        store.flush();
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_stop_drains_writes_to_disk() {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("chests.db");

        {
            let connector = Arc::new(SqliteConnector::open(&db_path).unwrap());
            let store = ChestStore::new(
                connector as Arc<dyn Connector>,
                Arc::new(IdentityCatalog),
                Arc::new(JsonItemCodec),
                PREFIX,
                2,
            );
            store.start().unwrap();
            store.flush();

            let chest = store.create(Tier::new(3), loc(7.0));
            store.save(chest.with_items(vec![Item::new("gold_ingot", 12)]));
            store.stop();
        }

        let connector = Arc::new(SqliteConnector::open(&db_path).unwrap());
        let store = ChestStore::new(
            connector as Arc<dyn Connector>,
            Arc::new(IdentityCatalog),
            Arc::new(JsonItemCodec),
            PREFIX,
            2,
        );
        store.start().unwrap();
        store.flush();

        let chest = store.find_by_location(&loc(7.0)).unwrap();
        assert_eq!(chest.tier, Tier::new(3));
        assert_eq!(chest.items, vec![Item::new("gold_ingot", 12)]);
    }

    fn item_rows(connector: &SqliteConnector) -> i64 {
        let mut count = 0;
        connector
            .with_connection(&mut |conn| {
                count = conn.query_row(
                    &format!("SELECT COUNT(*) FROM {PREFIX}items"),
                    [],
                    |row| row.get(0),
                )?;
                Ok(())
            })
            .unwrap();
        count
    }
}
