use std::collections::{BTreeMap, BTreeSet};

use abstutil::Timer;
use anyhow::Result;
use rusqlite::Connection;
use serde::Deserialize;

use gtfs_db::{
    orig, rebuild, route_patterns, routes, run_loader, trips, DirectionID, Route, RouteIndex,
    RouteLoader, RoutePattern, RoutePatternLoader, ShapeID, TableLoader, Trip, TripIndex,
    TripLoader,
};

const ROUTES: &str = "\
route_id,route_short_name
10,Harbour
20,Airport
30,Night
";

// Route 30 has no trips. Route 20 shares shape s1 with route 10.
const TRIPS: &str = "\
trip_id,route_id,direction_id,trip_headsign,shape_id
t1,10,0,Harbour,s1
t2,10,0,Harbour,s1
t3,10,0,Harbour,s1
t4,10,0,Harbour via Depot,s2
t5,10,1,City,s3
t6,10,1,City,s3
t7,10,1,City,s4
t8,10,1,City,s4
t9,10,1,City,s4
t10,20,0,Airport,s1
t11,20,0,Airport,s5
t12,20,0,Airport,s5
t13,20,1,,s6
";

#[derive(Deserialize)]
struct RouteRecord {
    route_id: orig::RouteID,
    route_short_name: Option<String>,
}

#[derive(Deserialize)]
struct TripRecord {
    trip_id: orig::TripID,
    route_id: orig::RouteID,
    direction_id: Option<DirectionID>,
    trip_headsign: Option<String>,
    shape_id: Option<ShapeID>,
}

fn import_feed(routes_txt: &str, trips_txt: &str) -> Result<Connection> {
    let conn = Connection::open_in_memory()?;
    let mut timer = Timer::throwaway();
    RouteLoader.create_table(&conn)?;
    TripLoader.create_table(&conn)?;

    let mut route_list = Vec::new();
    let mut route_ids = BTreeMap::new();
    for rec in csv::Reader::from_reader(routes_txt.as_bytes()).deserialize() {
        let rec: RouteRecord = rec?;
        let route_i = RouteIndex(route_list.len() as i64 + 1);
        route_ids.insert(rec.route_id.clone(), route_i);
        route_list.push(Route {
            route_i,
            route_id: rec.route_id,
            name: rec.route_short_name,
        });
    }

    let mut trip_list = Vec::new();
    for rec in csv::Reader::from_reader(trips_txt.as_bytes()).deserialize() {
        let rec: TripRecord = rec?;
        trip_list.push(Trip {
            trip_i: TripIndex(trip_list.len() as i64 + 1),
            trip_id: rec.trip_id,
            route_i: route_ids.get(&rec.route_id).copied(),
            direction_id: rec.direction_id,
            headsign: rec.trip_headsign,
            shape_id: rec.shape_id,
        });
    }

    routes::insert(&conn, &route_list)?;
    trips::insert(&conn, &trip_list)?;
    run_loader(&RouteLoader, &conn, &mut timer)?;
    run_loader(&TripLoader, &conn, &mut timer)?;
    Ok(conn)
}

fn stored_patterns(conn: &Connection) -> Vec<RoutePattern> {
    let mut patterns: Vec<RoutePattern> = route_patterns::read_all(conn)
        .unwrap()
        .into_values()
        .collect();
    patterns.sort_by_key(|p| (p.route_i, p.direction_id.clone(), p.sort_order));
    patterns
}

#[test]
fn patterns_cover_every_shape() {
    let conn = import_feed(ROUTES, TRIPS).unwrap();
    run_loader(&RoutePatternLoader, &conn, &mut Timer::throwaway()).unwrap();
    let patterns = stored_patterns(&conn);
    let trip_list = trips::read_all(&conn).unwrap();

    let mut expected_shapes: BTreeMap<(RouteIndex, DirectionID), BTreeSet<ShapeID>> =
        BTreeMap::new();
    for trip in &trip_list {
        expected_shapes
            .entry((trip.route_i.unwrap(), trip.direction_id.clone().unwrap()))
            .or_insert_with(BTreeSet::new)
            .insert(trip.shape_id.clone().unwrap());
    }

    let mut found: BTreeMap<(RouteIndex, DirectionID), Vec<&RoutePattern>> = BTreeMap::new();
    for p in &patterns {
        found
            .entry((p.route_i, p.direction_id.clone()))
            .or_insert_with(Vec::new)
            .push(p);
    }
    assert_eq!(
        found.keys().collect::<Vec<_>>(),
        expected_shapes.keys().collect::<Vec<_>>()
    );

    for (key, group) in &found {
        // One pattern per distinct shape
        let shapes: BTreeSet<ShapeID> = group.iter().map(|p| p.shape_id.clone().unwrap()).collect();
        assert_eq!(shapes, expected_shapes[key]);
        assert_eq!(shapes.len(), group.len());

        // sort_order is 1..=k, ranked by n_trips descending
        let orders: Vec<usize> = group.iter().map(|p| p.sort_order).collect();
        assert_eq!(orders, (1..=group.len()).collect::<Vec<_>>());
        for pair in group.windows(2) {
            assert!(pair[0].n_trips >= pair[1].n_trips);
        }

        // n_trips is exact
        for p in group {
            let n = trip_list
                .iter()
                .filter(|t| {
                    t.route_i == Some(p.route_i)
                        && t.direction_id.as_ref() == Some(&p.direction_id)
                        && t.shape_id == p.shape_id
                })
                .count();
            assert_eq!(n, p.n_trips);
        }
    }

    let ids: BTreeSet<&str> = patterns
        .iter()
        .map(|p| p.route_pattern_id.as_str())
        .collect();
    assert_eq!(ids.len(), patterns.len());
    assert_eq!(
        ids.into_iter().collect::<Vec<_>>(),
        vec!["10_0_1", "10_0_2", "10_1_1", "10_1_2", "20_0_1", "20_0_2", "20_1_1"]
    );

    let harbour = &patterns[0];
    assert_eq!(harbour.route_pattern_id, "10_0_1");
    assert_eq!(harbour.n_trips, 3);
    assert_eq!(harbour.shape_id, Some(ShapeID("s1".to_string())));
    assert_eq!(harbour.name, Some("Harbour".to_string()));

    // The shared shape still shows up once for the airport route
    let airport_s1 = patterns
        .iter()
        .find(|p| p.route_i == RouteIndex(2) && p.shape_id == Some(ShapeID("s1".to_string())))
        .unwrap();
    assert_eq!(airport_s1.route_pattern_id, "20_0_2");
    assert_eq!(airport_s1.n_trips, 1);
}

#[test]
fn sql_and_memory_agree() {
    let conn = import_feed(ROUTES, TRIPS).unwrap();
    run_loader(&RoutePatternLoader, &conn, &mut Timer::throwaway()).unwrap();

    let from_memory = route_patterns::derive(
        &routes::read_all(&conn).unwrap(),
        &trips::read_all(&conn).unwrap(),
    )
    .unwrap();
    assert_eq!(from_memory, stored_patterns(&conn));
    assert_eq!(route_patterns::check(&conn).unwrap(), 7);
}

#[test]
fn rebuild_after_reimport() {
    let conn = import_feed(ROUTES, TRIPS).unwrap();
    let mut timer = Timer::throwaway();
    run_loader(&RoutePatternLoader, &conn, &mut timer).unwrap();
    let before = stored_patterns(&conn);

    // Running the derivation again on top of the old rows collides on route_pattern_id
    assert!(RoutePatternLoader.post_import(&conn).is_err());

    rebuild(&RoutePatternLoader, &conn, &mut timer).unwrap();
    assert_eq!(stored_patterns(&conn), before);

    // New trips change the ranking once the table is rebuilt
    conn.execute_batch(
        "INSERT INTO trips (trip_id, route_I, direction_id, shape_id) VALUES
            ('t14', 1, '0', 's2'), ('t15', 1, '0', 's2'), ('t16', 1, '0', 's2');",
    )
    .unwrap();
    assert!(route_patterns::check(&conn).is_err());
    rebuild(&RoutePatternLoader, &conn, &mut timer).unwrap();
    let after = stored_patterns(&conn);
    assert_eq!(after[0].route_pattern_id, "10_0_1");
    assert_eq!(after[0].shape_id, Some(ShapeID("s2".to_string())));
    assert_eq!(after[0].n_trips, 4);
    assert_eq!(route_patterns::check(&conn).unwrap(), 7);

    assert_eq!(
        gtfs_db::count_indices(&conn, route_patterns::INDEX_NAME).unwrap(),
        1
    );
}
