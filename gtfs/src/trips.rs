use anyhow::Result;
use rusqlite::Connection;
use serde::{Deserialize, Serialize};

use crate::{orig, DirectionID, RouteIndex, ShapeID, TableLoader, TripIndex};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Trip {
    pub trip_i: TripIndex,
    pub trip_id: orig::TripID,
    /// NULL when the feed names a route that wasn't imported
    pub route_i: Option<RouteIndex>,
    /// Optional in GTFS. Route patterns need it.
    pub direction_id: Option<DirectionID>,
    pub headsign: Option<String>,
    pub shape_id: Option<ShapeID>,
}

pub struct TripLoader;

impl TableLoader for TripLoader {
    fn table(&self) -> &'static str {
        "trips"
    }

    fn tabledef(&self) -> &'static str {
        "(trip_I INTEGER PRIMARY KEY, \
         trip_id TEXT UNIQUE NOT NULL, \
         route_I INT, \
         direction_id TEXT, \
         headsign TEXT, \
         shape_id TEXT)"
    }

    fn index(&self, conn: &Connection) -> Result<()> {
        conn.execute_batch("CREATE INDEX IF NOT EXISTS idx_trips_route_I ON trips (route_I)")?;
        Ok(())
    }
}

/// Parsing trips.txt happens elsewhere; this just stores the result.
pub fn insert(conn: &Connection, trips: &[Trip]) -> Result<()> {
    let mut stmt = conn.prepare(
        "INSERT INTO trips (trip_I, trip_id, route_I, direction_id, headsign, shape_id) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
    )?;
    for trip in trips {
        stmt.execute((
            trip.trip_i,
            &trip.trip_id,
            trip.route_i,
            &trip.direction_id,
            &trip.headsign,
            &trip.shape_id,
        ))?;
    }
    Ok(())
}

pub fn read_all(conn: &Connection) -> Result<Vec<Trip>> {
    let mut stmt = conn.prepare(
        "SELECT trip_I, trip_id, route_I, direction_id, headsign, shape_id FROM trips \
         ORDER BY trip_I",
    )?;
    let trips = stmt
        .query_map([], |row| {
            Ok(Trip {
                trip_i: row.get(0)?,
                trip_id: row.get(1)?,
                route_i: row.get(2)?,
                direction_id: row.get(3)?,
                headsign: row.get(4)?,
                shape_id: row.get(5)?,
            })
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(trips)
}
