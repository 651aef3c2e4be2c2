#[macro_use]
extern crate anyhow;
#[macro_use]
extern crate log;

use abstutil::{prettyprint_usize, Timer};
use anyhow::Result;
use rusqlite::{Connection, OpenFlags};
use structopt::StructOpt;

use gtfs_db::{rebuild, route_patterns, RoutePatternLoader};

/// Maintains the route_patterns table of an imported GTFS database
#[derive(StructOpt)]
enum Command {
    /// Drop route_patterns and derive it again from routes and trips
    Rebuild {
        /// The path to a SQLite database with routes and trips already imported
        #[structopt(long)]
        db: String,
    },
    /// Fail if route_patterns is out of date with routes and trips
    Check {
        #[structopt(long)]
        db: String,
    },
    /// Print every route pattern as one line of JSON
    Dump {
        #[structopt(long)]
        db: String,
    },
}

fn main() -> Result<()> {
    abstutil::logger::setup();

    match Command::from_args() {
        Command::Rebuild { db } => {
            let mut timer = Timer::new(format!("rebuild route_patterns in {db}"));
            let mut conn = open(&db, OpenFlags::SQLITE_OPEN_READ_WRITE)?;
            require_tables(&conn)?;

            let tx = conn.transaction()?;
            rebuild(&RoutePatternLoader, &tx, &mut timer)?;
            tx.commit()?;
        }
        Command::Check { db } => {
            let conn = open(&db, OpenFlags::SQLITE_OPEN_READ_ONLY)?;
            require_tables(&conn)?;
            let n = route_patterns::check(&conn)?;
            info!("All {} route patterns are up to date", prettyprint_usize(n));
        }
        Command::Dump { db } => {
            let conn = open(&db, OpenFlags::SQLITE_OPEN_READ_ONLY)?;
            for pattern in route_patterns::read_all(&conn)?.into_values() {
                println!("{}", serde_json::to_string(&pattern)?);
            }
        }
    }
    Ok(())
}

// Without the CREATE flag, a typo in the path is an error instead of a new empty database
fn open(path: &str, flags: OpenFlags) -> Result<Connection> {
    Connection::open_with_flags(path, flags).map_err(|err| anyhow!("{path}: {err}"))
}

fn require_tables(conn: &Connection) -> Result<()> {
    for table in ["routes", "trips"] {
        let n: i64 = conn.query_row(
            "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?1",
            [table],
            |row| row.get(0),
        )?;
        if n == 0 {
            bail!("{table} hasn't been imported yet");
        }
    }
    Ok(())
}
