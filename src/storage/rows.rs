//! Row-level operations on the chest tables
//!
//! These run on whatever connection the [`crate::connector::Connector`]
//! hands out; the cache layer decides when and on which thread they execute.

use crate::chest::{Chest, ChestId, Location};
use crate::item::{Item, ItemCodec};
use crate::tier::TierCatalog;
use crate::Result;
use rusqlite::{params, Connection};
use std::collections::HashMap;

/// Insert or replace a chest row. The row id is the cache key.
pub fn upsert_chest(conn: &Connection, prefix: &str, chest: &Chest) -> Result<()> {
    conn.execute(
        &format!(
            "REPLACE INTO {prefix}chests (chestID, tier, x, y, z, world) VALUES (?1, ?2, ?3, ?4, ?5, ?6)"
        ),
        params![
            chest.id,
            chest.tier.id,
            chest.location.x,
            chest.location.y,
            chest.location.z,
            chest.location.world,
        ],
    )?;
    Ok(())
}

/// Delete every item row belonging to `id`
pub fn delete_items(conn: &Connection, prefix: &str, id: ChestId) -> Result<()> {
    conn.execute(
        &format!("DELETE FROM {prefix}items WHERE chestID = ?1"),
        params![id],
    )?;
    Ok(())
}

/// Delete the chest row itself
pub fn delete_chest(conn: &Connection, prefix: &str, id: ChestId) -> Result<()> {
    conn.execute(
        &format!("DELETE FROM {prefix}chests WHERE chestID = ?1"),
        params![id],
    )?;
    Ok(())
}

/// Insert the current item sequence as fresh rows, one statement batch
/// inside a single transaction.
pub fn insert_items(
    conn: &mut Connection,
    prefix: &str,
    id: ChestId,
    items: &[Item],
    codec: &dyn ItemCodec,
) -> Result<()> {
    let tx = conn.transaction()?;
    {
        let mut stmt = tx.prepare(&format!(
            "INSERT INTO {prefix}items (chestID, item) VALUES (?1, ?2)"
        ))?;
        for item in items {
            stmt.execute(params![id, codec.encode(item)?])?;
        }
    }
    tx.commit()?;
    Ok(())
}

/// Load every chest with its items in two queries.
///
/// One scan of the chests table, one scan of the items table grouped by
/// chest id in memory. An item payload that fails to decode becomes
/// [`Item::empty`]; the chest and its sibling items survive.
pub fn load_all(
    conn: &Connection,
    prefix: &str,
    tiers: &dyn TierCatalog,
    codec: &dyn ItemCodec,
) -> Result<Vec<Chest>> {
    let mut chests = Vec::new();
    {
        let mut stmt = conn.prepare(&format!(
            "SELECT chestID, tier, x, y, z, world FROM {prefix}chests"
        ))?;
        let rows = stmt.query_map([], |row| {
            Ok((
                row.get::<_, ChestId>(0)?,
                row.get::<_, i64>(1)?,
                row.get::<_, f64>(2)?,
                row.get::<_, f64>(3)?,
                row.get::<_, f64>(4)?,
                row.get::<_, String>(5)?,
            ))
        })?;

        for row in rows {
            let (id, tier, x, y, z, world) = row?;
            chests.push(Chest::new(
                id,
                tiers.resolve(tier),
                Location::new(world, x, y, z),
            ));
        }
    }

    let mut items_by_chest: HashMap<ChestId, Vec<Item>> = HashMap::new();
    {
        let mut stmt = conn.prepare(&format!("SELECT chestID, item FROM {prefix}items"))?;
        let rows = stmt.query_map([], |row| {
            Ok((row.get::<_, ChestId>(0)?, row.get::<_, String>(1)?))
        })?;

        for row in rows {
            let (id, raw) = row?;
            let item = match codec.decode(&raw) {
                Ok(item) => item,
                Err(err) => {
                    tracing::warn!(chest = id, "undecodable item payload replaced: {err}");
                    Item::empty()
                }
            };
            items_by_chest.entry(id).or_default().push(item);
        }
    }

    for chest in &mut chests {
        if let Some(items) = items_by_chest.remove(&chest.id) {
            chest.items = items;
        }
    }

    Ok(chests)
}

/// Row counts for operator tooling
#[derive(Debug, Clone)]
pub struct StoreStats {
    pub chests: usize,
    pub items: usize,
}

impl std::fmt::Display for StoreStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Store statistics:")?;
        writeln!(f, "  Chests: {}", self.chests)?;
        write!(f, "  Items: {}", self.items)
    }
}

/// Count the persisted rows
pub fn stats(conn: &Connection, prefix: &str) -> Result<StoreStats> {
    let chests: i64 = conn.query_row(&format!("SELECT COUNT(*) FROM {prefix}chests"), [], |row| {
        row.get(0)
    })?;
    let items: i64 = conn.query_row(&format!("SELECT COUNT(*) FROM {prefix}items"), [], |row| {
        row.get(0)
    })?;
    Ok(StoreStats {
        chests: chests as usize,
        items: items as usize,
    })
}
