//! Database schema definitions
//!
//! Every statement guards against existing objects so migrations stay
//! idempotent.

/// SQL to create the chests table
pub fn create_chests_table(prefix: &str) -> String {
    format!(
        r#"
CREATE TABLE IF NOT EXISTS {prefix}chests (
    chestID INTEGER PRIMARY KEY,
    tier INTEGER,
    x DOUBLE,
    y DOUBLE,
    z DOUBLE,
    world TEXT
)
"#
    )
}

/// SQL to create the items table
pub fn create_items_table(prefix: &str) -> String {
    format!(
        r#"
CREATE TABLE IF NOT EXISTS {prefix}items (
    chestID INTEGER,
    item TEXT
)
"#
    )
}

/// SQL to create the migration bookkeeping table
pub fn create_migrations_table(prefix: &str) -> String {
    format!("CREATE TABLE IF NOT EXISTS {prefix}migrations (revision INTEGER PRIMARY KEY)")
}

/// All schema creation statements for the exposed tables
pub fn all_schema_statements(prefix: &str) -> Vec<String> {
    vec![create_chests_table(prefix), create_items_table(prefix)]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prefix_lands_in_every_statement() {
        for stmt in all_schema_statements("uc_") {
            assert!(stmt.contains("uc_"));
        }
        assert!(create_migrations_table("uc_").contains("uc_migrations"));
    }
}
