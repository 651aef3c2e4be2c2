use std::cmp::Reverse;
use std::collections::{BTreeMap, BTreeSet};

use anyhow::Result;
use rusqlite::Connection;
use serde::{Deserialize, Serialize};

use crate::{
    routes, trips, DirectionID, Route, RouteIndex, RoutePatternIndex, ShapeID, TableLoader, Trip,
};

pub const INDEX_NAME: &str = "idx_route_pattern_id";

/// All the trips of one route in one direction that follow the same shape.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RoutePattern {
    /// `{route_id}_{direction_id}_{sort_order}`
    pub route_pattern_id: String,
    pub route_i: RouteIndex,
    pub direction_id: DirectionID,
    /// Copied from the route
    pub name: Option<String>,
    /// 1 is the shape with the most trips for this route and direction
    pub sort_order: usize,
    pub n_trips: usize,
    pub shape_id: Option<ShapeID>,
}

/// Derived from routes and trips after both are imported. There's no file to read.
pub struct RoutePatternLoader;

impl TableLoader for RoutePatternLoader {
    fn table(&self) -> &'static str {
        "route_patterns"
    }

    fn tabledef(&self) -> &'static str {
        "(route_pattern_I INTEGER PRIMARY KEY, \
         route_pattern_id TEXT UNIQUE NOT NULL, \
         route_I INT, \
         direction_id TEXT, \
         name TEXT, \
         sort_order INT, \
         n_trips INT, \
         shape_id TEXT)"
    }

    fn post_import(&self, conn: &Connection) -> Result<()> {
        let n = conn.execute(DERIVE_SQL, [])?;
        info!("Derived {n} route patterns");
        Ok(())
    }

    fn index(&self, conn: &Connection) -> Result<()> {
        conn.execute_batch(&format!(
            "CREATE INDEX IF NOT EXISTS {INDEX_NAME} ON route_patterns (route_pattern_id)"
        ))?;
        Ok(())
    }
}

// Ties in trip count go to the smaller shape_id, so derive() can reproduce this exactly. A NULL
// direction_id makes a NULL route_pattern_id, which the NOT NULL constraint rejects.
const DERIVE_SQL: &str = r#"
INSERT INTO route_patterns
    (route_pattern_id, route_I, direction_id, name, sort_order, n_trips, shape_id)
SELECT route_id || '_' || direction_id || '_' || sort_order,
    route_I, direction_id, name, sort_order, n_trips, shape_id
FROM (
    SELECT routes.route_I, routes.route_id, routes.name, trips.direction_id, trips.shape_id,
        COUNT(trips.trip_I) AS n_trips,
        ROW_NUMBER() OVER (
            PARTITION BY routes.route_I, trips.direction_id
            ORDER BY COUNT(trips.trip_I) DESC, trips.shape_id ASC
        ) AS sort_order
    FROM routes
    JOIN trips ON routes.route_I = trips.route_I
    GROUP BY routes.route_I, trips.direction_id, trips.shape_id
)
"#;

/// Computes the same rows as the SQL in `RoutePatternLoader`, without a database. Output is
/// sorted by route, direction, then sort_order.
pub fn derive(routes: &BTreeMap<RouteIndex, Route>, trips: &[Trip]) -> Result<Vec<RoutePattern>> {
    type Key = (RouteIndex, Option<DirectionID>);

    let mut trips_per_shape: BTreeMap<Key, BTreeMap<Option<ShapeID>, usize>> = BTreeMap::new();
    let mut orphans = 0;
    for trip in trips {
        let route_i = match trip.route_i {
            Some(route_i) if routes.contains_key(&route_i) => route_i,
            _ => {
                orphans += 1;
                continue;
            }
        };
        *trips_per_shape
            .entry((route_i, trip.direction_id.clone()))
            .or_insert_with(BTreeMap::new)
            .entry(trip.shape_id.clone())
            .or_insert(0) += 1;
    }
    if orphans > 0 {
        warn!("{orphans} trips belong to unknown routes; they're not part of any pattern");
    }

    let mut patterns = Vec::new();
    let mut ids = BTreeSet::new();
    for ((route_i, direction_id), shapes) in trips_per_shape {
        let route = &routes[&route_i];
        let direction_id = match direction_id {
            Some(x) => x,
            None => bail!("{} has trips without a direction_id", route.describe()),
        };

        // shapes iterates by ascending shape_id and the sort is stable, so ties keep that order
        let mut shapes: Vec<(Option<ShapeID>, usize)> = shapes.into_iter().collect();
        shapes.sort_by_key(|(_, n_trips)| Reverse(*n_trips));

        for (idx, (shape_id, n_trips)) in shapes.into_iter().enumerate() {
            let sort_order = idx + 1;
            let route_pattern_id = format!("{}_{}_{}", route.route_id, direction_id, sort_order);
            if !ids.insert(route_pattern_id.clone()) {
                bail!("Duplicate route_pattern_id {route_pattern_id}");
            }
            patterns.push(RoutePattern {
                route_pattern_id,
                route_i,
                direction_id: direction_id.clone(),
                name: route.name.clone(),
                sort_order,
                n_trips,
                shape_id,
            });
        }
    }
    Ok(patterns)
}

/// For patterns from `derive`. The table must already exist.
pub fn insert(conn: &Connection, patterns: &[RoutePattern]) -> Result<()> {
    let mut stmt = conn.prepare(
        "INSERT INTO route_patterns \
         (route_pattern_id, route_I, direction_id, name, sort_order, n_trips, shape_id) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
    )?;
    for p in patterns {
        stmt.execute((
            &p.route_pattern_id,
            p.route_i,
            &p.direction_id,
            &p.name,
            i64::try_from(p.sort_order)?,
            i64::try_from(p.n_trips)?,
            &p.shape_id,
        ))?;
    }
    Ok(())
}

pub fn read_all(conn: &Connection) -> Result<BTreeMap<RoutePatternIndex, RoutePattern>> {
    let mut stmt = conn.prepare(
        "SELECT route_pattern_I, route_pattern_id, route_I, direction_id, name, sort_order, \
         n_trips, shape_id FROM route_patterns",
    )?;
    let mut rows = stmt.query([])?;
    let mut patterns = BTreeMap::new();
    while let Some(row) = rows.next()? {
        let sort_order: i64 = row.get(5)?;
        let n_trips: i64 = row.get(6)?;
        patterns.insert(
            row.get(0)?,
            RoutePattern {
                route_pattern_id: row.get(1)?,
                route_i: row.get(2)?,
                direction_id: row.get(3)?,
                name: row.get(4)?,
                sort_order: usize::try_from(sort_order)?,
                n_trips: usize::try_from(n_trips)?,
                shape_id: row.get(7)?,
            },
        );
    }
    Ok(patterns)
}

/// Recomputes the patterns from the stored routes and trips and compares against what's in the
/// table. Returns the number of patterns.
pub fn check(conn: &Connection) -> Result<usize> {
    let expected = derive(&routes::read_all(conn)?, &trips::read_all(conn)?)?;
    let expected: BTreeMap<String, RoutePattern> = expected
        .into_iter()
        .map(|p| (p.route_pattern_id.clone(), p))
        .collect();
    let actual: BTreeMap<String, RoutePattern> = read_all(conn)?
        .into_values()
        .map(|p| (p.route_pattern_id.clone(), p))
        .collect();

    let mut problems = Vec::new();
    for (id, p) in &expected {
        match actual.get(id) {
            Some(stored) if stored == p => {}
            Some(stored) => problems.push(format!("{id} is stored as {stored:?}, expected {p:?}")),
            None => problems.push(format!("{id} is missing")),
        }
    }
    for id in actual.keys() {
        if !expected.contains_key(id) {
            problems.push(format!("{id} shouldn't exist"));
        }
    }

    if !problems.is_empty() {
        for problem in problems.iter().take(10) {
            warn!("{problem}");
        }
        bail!(
            "route_patterns doesn't match routes and trips: {} problems",
            problems.len()
        );
    }
    Ok(expected.len())
}
