use abstutil::Timer;
use anyhow::Result;
use rusqlite::Connection;

/// One table in the import database. The import drives every loader through the same steps:
/// create the table, fill it, then index it.
///
/// Loaders for tables read from feed files get their rows inserted by the caller between
/// `create_table` and `post_import`. Derived tables do all of their work in `post_import`.
pub trait TableLoader {
    fn table(&self) -> &'static str;
    /// The column list, including the surrounding parentheses
    fn tabledef(&self) -> &'static str;

    fn create_table(&self, conn: &Connection) -> Result<()> {
        conn.execute_batch(&format!(
            "CREATE TABLE IF NOT EXISTS {} {}",
            self.table(),
            self.tabledef()
        ))?;
        Ok(())
    }

    /// Indices on the table go away with it.
    fn drop_table(&self, conn: &Connection) -> Result<()> {
        conn.execute_batch(&format!("DROP TABLE IF EXISTS {}", self.table()))?;
        Ok(())
    }

    /// Runs once every table this one depends on is populated.
    fn post_import(&self, _conn: &Connection) -> Result<()> {
        Ok(())
    }

    /// Must be idempotent.
    fn index(&self, _conn: &Connection) -> Result<()> {
        Ok(())
    }
}

/// Creates, derives, and indexes one table, in that order. Transactions are up to the caller.
pub fn run_loader(loader: &dyn TableLoader, conn: &Connection, timer: &mut Timer) -> Result<()> {
    let table = loader.table();
    timer.start(format!("load {table}"));

    debug!("Creating {table}");
    loader.create_table(conn)?;
    debug!("Post-import for {table}");
    loader.post_import(conn)?;
    debug!("Indexing {table}");
    loader.index(conn)?;

    let rows: i64 = conn.query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |row| {
        row.get(0)
    })?;
    info!("{table} has {rows} rows");

    timer.stop(format!("load {table}"));
    Ok(())
}

/// Derived tables are never patched in place; a re-import throws the old rows away.
pub fn rebuild(loader: &dyn TableLoader, conn: &Connection, timer: &mut Timer) -> Result<()> {
    loader.drop_table(conn)?;
    run_loader(loader, conn, timer)
}

/// Counts indices with this name. Mostly useful to check `index` is idempotent.
pub fn count_indices(conn: &Connection, name: &str) -> Result<usize> {
    let n: i64 = conn.query_row(
        "SELECT COUNT(*) FROM sqlite_master WHERE type = 'index' AND name = ?1",
        [name],
        |row| row.get(0),
    )?;
    Ok(usize::try_from(n)?)
}
