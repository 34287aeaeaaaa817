use super::{key_columns, ColumnData};
use crate::config::Config;
use crate::error::{EtlError, Result};
use crate::table::{CompleteRow, CompleteTable, KeyKind, LocationKey, DATE_COLUMN};
use chrono::NaiveDate;
use tokio_postgres::{types::ToSql, Client, NoTls};
use tracing::{error, info, instrument};

/// Rows sent per `INSERT .. SELECT * FROM UNNEST(..)` statement.
pub const INSERT_BATCH_ROWS: usize = 10_000;

/// Typed connection settings; the password never goes through a URL string.
pub fn pg_config(config: &Config) -> tokio_postgres::Config {
    let mut pg = tokio_postgres::Config::new();
    pg.host(&config.db_host)
        .port(config.db_port)
        .user(&config.db_user)
        .password(&config.db_password)
        .dbname(&config.db_name)
        .application_name("covid_etl")
        .connect_timeout(config.db_connect_timeout());
    pg
}

fn target(config: &Config) -> String {
    format!(
        "postgres://{}@{}:{}/{}",
        config.db_user, config.db_host, config.db_port, config.db_name
    )
}

/// Open a connection and drive it on a background task.
#[instrument(level = "info", skip(config), fields(host = %config.db_host, db = %config.db_name))]
pub async fn connect(config: &Config) -> Result<Client> {
    let (client, connection) = pg_config(config)
        .connect(NoTls)
        .await
        .map_err(|e| EtlError::persist(target(config), e))?;
    tokio::spawn(async move {
        if let Err(e) = connection.await {
            error!("postgres connection error: {}", e);
        }
    });
    info!("connected");
    Ok(client)
}

pub fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

fn sql_columns<K: LocationKey>() -> Vec<(&'static str, &'static str, bool)> {
    K::COLUMNS
        .iter()
        .map(|c| {
            let ty = match c.kind {
                KeyKind::Text => "TEXT",
                KeyKind::Float => "DOUBLE PRECISION",
            };
            (c.name, ty, c.nullable)
        })
        .chain([
            (DATE_COLUMN, "DATE", false),
            ("Confirmed", "BIGINT", false),
            ("Deaths", "BIGINT", false),
        ])
        .collect()
}

pub fn create_table_sql<K: LocationKey>(table_name: &str) -> String {
    let cols: Vec<String> = sql_columns::<K>()
        .into_iter()
        .map(|(name, ty, nullable)| {
            let null = if nullable { "" } else { " NOT NULL" };
            format!("{} {}{}", quote_ident(name), ty, null)
        })
        .collect();
    format!(
        "CREATE TABLE {} ({})",
        quote_ident(table_name),
        cols.join(", ")
    )
}

/// Drop and recreate `table_name`; run inside the load transaction.
pub fn replace_sql<K: LocationKey>(table_name: &str) -> String {
    format!(
        "DROP TABLE IF EXISTS {}; {};",
        quote_ident(table_name),
        create_table_sql::<K>(table_name)
    )
}

/// Bulk insert: one array parameter per column, expanded by `UNNEST`.
pub fn insert_sql<K: LocationKey>(table_name: &str) -> String {
    let cols = sql_columns::<K>();
    let names: Vec<String> = cols.iter().map(|(n, _, _)| quote_ident(n)).collect();
    let arrays: Vec<String> = cols
        .iter()
        .enumerate()
        .map(|(i, (_, ty, _))| format!("${}::{}[]", i + 1, ty))
        .collect();
    format!(
        "INSERT INTO {} ({}) SELECT * FROM UNNEST({})",
        quote_ident(table_name),
        names.join(", "),
        arrays.join(", ")
    )
}

fn to_bigint<K: LocationKey>(row: &CompleteRow<K>, count: u64) -> Result<i64> {
    i64::try_from(count).map_err(|_| EtlError::InvalidCount {
        key: row.key.to_string(),
        date: row.date,
        value: count as f64,
    })
}

/// Replace `table_name` with the contents of `table` in one transaction:
/// drop, recreate, bulk insert. Returns the number of rows inserted.
#[instrument(level = "info", skip(client, table), fields(rows = table.len()))]
pub async fn replace_table<K: LocationKey>(
    client: &mut Client,
    table_name: &str,
    table: &CompleteTable<K>,
) -> Result<u64> {
    let err = |e: tokio_postgres::Error| EtlError::persist(table_name, e);

    let tx = client.transaction().await.map_err(err)?;
    tx.batch_execute(&replace_sql::<K>(table_name))
        .await
        .map_err(err)?;
    let insert = tx.prepare(&insert_sql::<K>(table_name)).await.map_err(err)?;

    let mut inserted = 0;
    for chunk in table.rows.chunks(INSERT_BATCH_ROWS) {
        let keys = key_columns(chunk)?;
        let dates: Vec<NaiveDate> = chunk.iter().map(|r| r.date).collect();
        let confirmed = chunk
            .iter()
            .map(|r| to_bigint(r, r.confirmed))
            .collect::<Result<Vec<i64>>>()?;
        let deaths = chunk
            .iter()
            .map(|r| to_bigint(r, r.deaths))
            .collect::<Result<Vec<i64>>>()?;

        let mut params: Vec<&(dyn ToSql + Sync)> = keys
            .iter()
            .map(|col| match col {
                ColumnData::Text(v) => v as &(dyn ToSql + Sync),
                ColumnData::Float(v) => v as &(dyn ToSql + Sync),
            })
            .collect();
        params.push(&dates);
        params.push(&confirmed);
        params.push(&deaths);

        inserted += tx.execute(&insert, &params).await.map_err(err)?;
    }
    tx.commit().await.map_err(err)?;

    info!(table = table_name, inserted, "replaced table");
    Ok(inserted)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::{Country, Location};
    use std::time::Duration;

    #[test]
    fn country_table_ddl() {
        assert_eq!(
            create_table_sql::<Country>("covid_stats"),
            "CREATE TABLE \"covid_stats\" (\"Country/Region\" TEXT NOT NULL, \
             \"Date\" DATE NOT NULL, \"Confirmed\" BIGINT NOT NULL, \"Deaths\" BIGINT NOT NULL)"
        );
    }

    #[test]
    fn location_insert_uses_typed_arrays() {
        let sql = insert_sql::<Location>("covid_stats");
        assert_eq!(
            sql,
            "INSERT INTO \"covid_stats\" (\"Province/State\", \"Country/Region\", \"Lat\", \
             \"Long\", \"Date\", \"Confirmed\", \"Deaths\") SELECT * FROM UNNEST($1::TEXT[], \
             $2::TEXT[], $3::DOUBLE PRECISION[], $4::DOUBLE PRECISION[], $5::DATE[], \
             $6::BIGINT[], $7::BIGINT[])"
        );
    }

    #[test]
    fn replace_drops_before_create() {
        assert_eq!(
            replace_sql::<Country>("covid_stats"),
            "DROP TABLE IF EXISTS \"covid_stats\"; CREATE TABLE \"covid_stats\" \
             (\"Country/Region\" TEXT NOT NULL, \"Date\" DATE NOT NULL, \
             \"Confirmed\" BIGINT NOT NULL, \"Deaths\" BIGINT NOT NULL);"
        );
    }

    #[test]
    fn province_column_is_nullable() {
        let ddl = create_table_sql::<Location>("t");
        assert!(ddl.contains("\"Province/State\" TEXT,"));
        assert!(ddl.contains("\"Lat\" DOUBLE PRECISION,"));
    }

    #[test]
    fn identifiers_are_quoted() {
        assert_eq!(quote_ident("we\"ird"), "\"we\"\"ird\"");
    }

    #[test]
    fn connection_settings_come_from_config() {
        let config = Config {
            db_host: "db.example".into(),
            db_port: 6543,
            db_user: "etl".into(),
            db_password: "pw".into(),
            db_name: "covid".into(),
            db_connect_timeout_secs: 3,
            ..Config::default()
        };
        let pg = pg_config(&config);
        assert_eq!(pg.get_user(), Some("etl"));
        assert_eq!(pg.get_dbname(), Some("covid"));
        assert_eq!(pg.get_ports(), &[6543]);
        assert_eq!(pg.get_password(), Some(&b"pw"[..]));
        assert_eq!(pg.get_connect_timeout(), Some(&Duration::from_secs(3)));
    }

    fn country_rows(countries: &[&str], days: u32) -> CompleteTable<Country> {
        let rows = countries
            .iter()
            .flat_map(|c| {
                (1..=days).map(move |day| CompleteRow {
                    key: Country(c.to_string()),
                    date: NaiveDate::from_ymd_opt(2020, 2, day).unwrap(),
                    confirmed: u64::from(day),
                    deaths: 0,
                })
            })
            .collect();
        CompleteTable { rows }
    }

    /// Needs a scratch database: `COVID_ETL_TEST_DB="host=localhost user=postgres ..."`.
    #[tokio::test]
    #[ignore]
    async fn second_load_replaces_first() {
        let Ok(conn_str) = std::env::var("COVID_ETL_TEST_DB") else {
            eprintln!("COVID_ETL_TEST_DB not set, skipping");
            return;
        };
        let pg: tokio_postgres::Config = conn_str.parse().unwrap();
        let (mut client, connection) = pg.connect(NoTls).await.unwrap();
        tokio::spawn(connection);

        let table_name = "covid_etl_replace_test";
        let first = country_rows(&["A", "B", "C"], 5);
        let second = country_rows(&["D"], 2);

        assert_eq!(replace_table(&mut client, table_name, &first).await.unwrap(), 15);
        assert_eq!(replace_table(&mut client, table_name, &second).await.unwrap(), 2);

        let count: i64 = client
            .query_one(&format!("SELECT count(*) FROM {}", quote_ident(table_name)), &[])
            .await
            .unwrap()
            .get(0);
        assert_eq!(count, second.len() as i64);

        client
            .batch_execute(&format!("DROP TABLE {}", quote_ident(table_name)))
            .await
            .unwrap();
    }
}
