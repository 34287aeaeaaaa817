//! Table shapes flowing between stages.
//!
//! Every stage after the wide-format loader is generic over a [`LocationKey`]:
//! [`Location`] for the province-level rows of the source files and
//! [`Country`] once provinces have been summed away.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::{cmp::Ordering, collections::BTreeMap, fmt};

/// Which cumulative count a wide file carries.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Metric {
    Confirmed,
    Deaths,
}

impl Metric {
    pub fn column_name(&self) -> &'static str {
        match self {
            Metric::Confirmed => "Confirmed",
            Metric::Deaths => "Deaths",
        }
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.column_name())
    }
}

pub const PROVINCE_COLUMN: &str = "Province/State";
pub const COUNTRY_COLUMN: &str = "Country/Region";
pub const LAT_COLUMN: &str = "Lat";
pub const LONG_COLUMN: &str = "Long";
pub const DATE_COLUMN: &str = "Date";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum KeyKind {
    Text,
    Float,
}

/// One identifier column of a location key, as written to CSV, Parquet and SQL.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct KeyColumn {
    pub name: &'static str,
    pub kind: KeyKind,
    pub nullable: bool,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum KeyValue<'a> {
    Text(Option<&'a str>),
    Float(Option<f64>),
}

/// Identity of a reporting unit.
pub trait LocationKey: Clone + Ord + fmt::Debug + fmt::Display {
    /// Identifier columns in output order.
    const COLUMNS: &'static [KeyColumn];

    /// Values matching [`Self::COLUMNS`] one to one.
    fn values(&self) -> Vec<KeyValue<'_>>;

    /// Rebuild a key from its textual fields (the inverse of writing it to CSV).
    fn from_fields(fields: &[&str]) -> Result<Self, String>;
}

/// Province-level reporting unit as it appears in the wide source files.
#[derive(Clone, Debug)]
pub struct Location {
    pub province: Option<String>,
    pub country: String,
    pub lat: Option<f64>,
    pub long: Option<f64>,
}

fn cmp_coord(a: Option<f64>, b: Option<f64>) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => a.total_cmp(&b),
        (a, b) => a.is_some().cmp(&b.is_some()),
    }
}

impl Ord for Location {
    fn cmp(&self, other: &Self) -> Ordering {
        self.country
            .cmp(&other.country)
            .then_with(|| self.province.cmp(&other.province))
            .then_with(|| cmp_coord(self.lat, other.lat))
            .then_with(|| cmp_coord(self.long, other.long))
    }
}

impl PartialOrd for Location {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for Location {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Location {}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.province {
            Some(p) => write!(f, "{}, {}", p, self.country),
            None => f.write_str(&self.country),
        }
    }
}

/// Parse an optional text cell: blank means missing.
pub(crate) fn non_empty(s: &str) -> Option<&str> {
    let s = s.trim();
    (!s.is_empty()).then_some(s)
}

pub(crate) fn parse_optional_f64(s: &str) -> Result<Option<f64>, String> {
    non_empty(s)
        .map(|v| v.parse::<f64>().map_err(|_| format!("{v:?} is not a number")))
        .transpose()
}

impl LocationKey for Location {
    const COLUMNS: &'static [KeyColumn] = &[
        KeyColumn {
            name: PROVINCE_COLUMN,
            kind: KeyKind::Text,
            nullable: true,
        },
        KeyColumn {
            name: COUNTRY_COLUMN,
            kind: KeyKind::Text,
            nullable: false,
        },
        KeyColumn {
            name: LAT_COLUMN,
            kind: KeyKind::Float,
            nullable: true,
        },
        KeyColumn {
            name: LONG_COLUMN,
            kind: KeyKind::Float,
            nullable: true,
        },
    ];

    fn values(&self) -> Vec<KeyValue<'_>> {
        vec![
            KeyValue::Text(self.province.as_deref()),
            KeyValue::Text(Some(&self.country)),
            KeyValue::Float(self.lat),
            KeyValue::Float(self.long),
        ]
    }

    fn from_fields(fields: &[&str]) -> Result<Self, String> {
        let [province, country, lat, long] = fields else {
            return Err(format!("expected 4 location fields, got {}", fields.len()));
        };
        let country = non_empty(country).ok_or("empty country")?;
        Ok(Location {
            province: non_empty(province).map(str::to_string),
            country: country.to_string(),
            lat: parse_optional_f64(lat)?,
            long: parse_optional_f64(long)?,
        })
    }
}

/// National reporting unit, produced by summing provinces.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Country(pub String);

impl fmt::Display for Country {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&Location> for Country {
    fn from(loc: &Location) -> Self {
        Country(loc.country.clone())
    }
}

impl LocationKey for Country {
    const COLUMNS: &'static [KeyColumn] = &[KeyColumn {
        name: COUNTRY_COLUMN,
        kind: KeyKind::Text,
        nullable: false,
    }];

    fn values(&self) -> Vec<KeyValue<'_>> {
        vec![KeyValue::Text(Some(&self.0))]
    }

    fn from_fields(fields: &[&str]) -> Result<Self, String> {
        match fields {
            [country] => non_empty(country)
                .map(|c| Country(c.to_string()))
                .ok_or_else(|| "empty country".to_string()),
            _ => Err(format!("expected 1 location field, got {}", fields.len())),
        }
    }
}

/// One metric in long form: a value per (location, date). The map key makes
/// duplicate (location, date) pairs unrepresentable.
#[derive(Clone, Debug, PartialEq)]
pub struct LongTable<K: LocationKey> {
    pub metric: Metric,
    pub values: BTreeMap<(K, NaiveDate), Option<f64>>,
}

impl<K: LocationKey> LongTable<K> {
    pub fn new(metric: Metric) -> Self {
        LongTable {
            metric,
            values: BTreeMap::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Both metrics for one (location, date); `None` until gap-filled.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct MetricPair {
    pub confirmed: Option<f64>,
    pub deaths: Option<f64>,
}

impl MetricPair {
    pub fn set(&mut self, metric: Metric, value: Option<f64>) {
        match metric {
            Metric::Confirmed => self.confirmed = value,
            Metric::Deaths => self.deaths = value,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct MergedTable<K: LocationKey> {
    pub rows: BTreeMap<(K, NaiveDate), MetricPair>,
}

impl<K: LocationKey> Default for MergedTable<K> {
    fn default() -> Self {
        MergedTable {
            rows: BTreeMap::new(),
        }
    }
}

impl<K: LocationKey> MergedTable<K> {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Smallest and largest date present, if any row exists.
    pub fn date_range(&self) -> Option<(NaiveDate, NaiveDate)> {
        let mut dates = self.rows.keys().map(|(_, d)| *d);
        let first = dates.next()?;
        Some(dates.fold((first, first), |(lo, hi), d| (lo.min(d), hi.max(d))))
    }
}

impl<K: LocationKey> From<&CompleteTable<K>> for MergedTable<K> {
    fn from(table: &CompleteTable<K>) -> Self {
        MergedTable {
            rows: table
                .rows
                .iter()
                .map(|r| {
                    let pair = MetricPair {
                        confirmed: Some(r.confirmed as f64),
                        deaths: Some(r.deaths as f64),
                    };
                    ((r.key.clone(), r.date), pair)
                })
                .collect(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CompleteRow<K> {
    pub key: K,
    pub date: NaiveDate,
    pub confirmed: u64,
    pub deaths: u64,
}

/// Gap-free table: rows sorted by (key, date), no missing counts.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CompleteTable<K> {
    pub rows: Vec<CompleteRow<K>>,
}

impl<K> CompleteTable<K> {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}
