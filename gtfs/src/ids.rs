use rusqlite::types::{FromSql, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use serde::{Deserialize, Serialize};

macro_rules! sql_text_id {
    ($name:ident) => {
        impl rusqlite::types::ToSql for $name {
            fn to_sql(&self) -> rusqlite::Result<rusqlite::types::ToSqlOutput<'_>> {
                rusqlite::types::ToSql::to_sql(&self.0)
            }
        }

        impl rusqlite::types::FromSql for $name {
            fn column_result(
                value: rusqlite::types::ValueRef<'_>,
            ) -> rusqlite::types::FromSqlResult<Self> {
                <String as rusqlite::types::FromSql>::column_result(value).map(Self)
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}
pub(crate) use sql_text_id;

/// IDs exactly as they appear in the GTFS feed. The import keeps them as TEXT columns next to
/// the integer surrogate keys.
pub mod orig {
    use serde::{Deserialize, Serialize};

    #[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
    pub struct RouteID(pub String);

    #[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
    pub struct TripID(pub String);

    super::sql_text_id!(RouteID);
    super::sql_text_id!(TripID);
}

// Shapes and directions are never given a surrogate key, so there's no cheap version of them.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ShapeID(pub String);

/// 0 or 1 in GTFS, but stored as TEXT. Ordered like any other string.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct DirectionID(pub String);

/// `route_I`
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RouteIndex(pub i64);

/// `trip_I`
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TripIndex(pub i64);

/// `route_pattern_I`
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RoutePatternIndex(pub i64);

sql_text_id!(ShapeID);
sql_text_id!(DirectionID);

impl CheapID for RouteIndex {
    fn new(x: i64) -> Self {
        Self(x)
    }
    fn raw(self) -> i64 {
        self.0
    }
}
impl CheapID for TripIndex {
    fn new(x: i64) -> Self {
        Self(x)
    }
    fn raw(self) -> i64 {
        self.0
    }
}
impl CheapID for RoutePatternIndex {
    fn new(x: i64) -> Self {
        Self(x)
    }
    fn raw(self) -> i64 {
        self.0
    }
}

/// An `INTEGER PRIMARY KEY`, aka a SQLite rowid.
pub trait CheapID: Copy {
    fn new(x: i64) -> Self;
    fn raw(self) -> i64;
}

// Can't blanket impl ToSql/FromSql for all CheapIDs (orphan rules), so spell them out.
macro_rules! sql_cheap_id {
    ($name:ident) => {
        impl ToSql for $name {
            fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
                Ok(ToSqlOutput::from(self.raw()))
            }
        }

        impl FromSql for $name {
            fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
                i64::column_result(value).map(<$name as CheapID>::new)
            }
        }
    };
}

sql_cheap_id!(RouteIndex);
sql_cheap_id!(TripIndex);
sql_cheap_id!(RoutePatternIndex);
