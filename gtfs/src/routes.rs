use std::collections::BTreeMap;

use anyhow::Result;
use rusqlite::Connection;
use serde::{Deserialize, Serialize};

use crate::{orig, RouteIndex, TableLoader};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Route {
    pub route_i: RouteIndex,
    pub route_id: orig::RouteID,
    pub name: Option<String>,
}

impl Route {
    pub fn describe(&self) -> String {
        match self.name {
            Some(ref name) => format!("{name} ({})", self.route_id),
            None => self.route_id.to_string(),
        }
    }
}

pub struct RouteLoader;

impl TableLoader for RouteLoader {
    fn table(&self) -> &'static str {
        "routes"
    }

    fn tabledef(&self) -> &'static str {
        "(route_I INTEGER PRIMARY KEY, route_id TEXT UNIQUE NOT NULL, name TEXT)"
    }

    fn index(&self, conn: &Connection) -> Result<()> {
        conn.execute_batch("CREATE INDEX IF NOT EXISTS idx_routes_id ON routes (route_id)")?;
        Ok(())
    }
}

/// Parsing routes.txt happens elsewhere; this just stores the result.
pub fn insert(conn: &Connection, routes: &[Route]) -> Result<()> {
    let mut stmt =
        conn.prepare("INSERT INTO routes (route_I, route_id, name) VALUES (?1, ?2, ?3)")?;
    for route in routes {
        stmt.execute((route.route_i, &route.route_id, &route.name))?;
    }
    Ok(())
}

pub fn read_all(conn: &Connection) -> Result<BTreeMap<RouteIndex, Route>> {
    let mut stmt = conn.prepare("SELECT route_I, route_id, name FROM routes")?;
    let mut routes = BTreeMap::new();
    for route in stmt.query_map([], |row| {
        Ok(Route {
            route_i: row.get(0)?,
            route_id: row.get(1)?,
            name: row.get(2)?,
        })
    })? {
        let route = route?;
        routes.insert(route.route_i, route);
    }
    Ok(routes)
}
