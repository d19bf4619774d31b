use std::time::Duration;

use diesel::connection::SimpleConnection;
use diesel::r2d2::{self, ConnectionManager, CustomizeConnection};
use diesel::sqlite::SqliteConnection;
use diesel_migrations::{embed_migrations, EmbeddedMigrations, MigrationHarness};

use crate::config::Config;
use crate::query;

pub(crate) type DbPool = r2d2::Pool<ConnectionManager<SqliteConnection>>;

pub(crate) type BoxError = Box<dyn std::error::Error + Send + Sync>;

pub(crate) const MIGRATIONS: EmbeddedMigrations = embed_migrations!("migrations");

const IN_MEMORY: &str = ":memory:";

/// Applied to every connection the pool hands out.
#[derive(Debug, Clone, Copy)]
struct ConnectionOptions {
    busy_timeout: Duration,
}

impl ConnectionOptions {
    fn apply(&self, conn: &mut SqliteConnection) -> diesel::QueryResult<()> {
        //sqlite ships with foreign keys off, and the cascade on ingredient depends on them
        conn.batch_execute(&format!(
            "PRAGMA foreign_keys = ON; PRAGMA busy_timeout = {};",
            self.busy_timeout.as_millis()
        ))?;
        query::unicode_lower_utils::register_impl(conn, |x: String| x.to_lowercase())
    }
}

impl CustomizeConnection<SqliteConnection, r2d2::Error> for ConnectionOptions {
    fn on_acquire(&self, conn: &mut SqliteConnection) -> Result<(), r2d2::Error> {
        self.apply(conn).map_err(r2d2::Error::QueryError)
    }
}

pub(crate) fn build_pool(config: &Config) -> Result<DbPool, r2d2::PoolError> {
    let options = ConnectionOptions {
        busy_timeout: config.busy_timeout,
    };
    let manager = ConnectionManager::<SqliteConnection>::new(config.database_url.as_str());
    let builder = r2d2::Pool::builder().connection_customizer(Box::new(options));

    if config.database_url == IN_MEMORY {
        //every sqlite connection to :memory: opens its own database, so keep exactly one alive
        log::warn!("using an in-memory database, data is lost on shutdown");
        return builder
            .max_size(1)
            .max_lifetime(None)
            .idle_timeout(None)
            .build(manager);
    }

    builder.max_size(config.pool_max_size).build(manager)
}

pub(crate) fn run_migrations(conn: &mut SqliteConnection) -> Result<(), BoxError> {
    let applied = conn.run_pending_migrations(MIGRATIONS)?;
    for version in &applied {
        log::info!("applied migration {}", version);
    }
    Ok(())
}

#[cfg(test)]
pub(crate) mod test_support {
    use diesel::Connection;

    use super::*;

    pub(crate) fn test_config() -> Config {
        Config {
            database_url: IN_MEMORY.to_string(),
            ..Config::default()
        }
    }

    /// A fresh, migrated in-memory database.
    pub(crate) fn connection() -> SqliteConnection {
        let mut conn =
            SqliteConnection::establish(IN_MEMORY).expect("in-memory sqlite should open");
        ConnectionOptions {
            busy_timeout: Duration::from_millis(100),
        }
        .apply(&mut conn)
        .expect("pragmas should apply");
        run_migrations(&mut conn).expect("migrations should run");
        conn
    }

    /// A single-connection pool over a fresh, migrated in-memory database.
    pub(crate) fn pool() -> DbPool {
        let pool = build_pool(&test_config()).expect("pool should build");
        let mut conn = pool.get().expect("pool should hand out a connection");
        run_migrations(&mut conn).expect("migrations should run");
        pool
    }
}

#[cfg(test)]
mod tests {
    use diesel::prelude::*;
    use diesel::sql_types::Integer;

    use super::*;

    #[derive(QueryableByName)]
    struct Pragma {
        #[diesel(sql_type = Integer)]
        foreign_keys: i32,
    }

    #[test]
    fn pooled_connections_enforce_foreign_keys() {
        let pool = test_support::pool();
        let mut conn = pool.get().unwrap();
        let pragma: Pragma = diesel::sql_query("PRAGMA foreign_keys")
            .get_result(&mut conn)
            .unwrap();
        assert_eq!(pragma.foreign_keys, 1);
    }

    #[test]
    fn in_memory_pool_is_limited_to_one_connection() {
        let config = Config {
            pool_max_size: 8,
            ..test_support::test_config()
        };
        let pool = build_pool(&config).unwrap();
        assert_eq!(pool.max_size(), 1);
    }

    #[derive(QueryableByName)]
    struct Lowered {
        #[diesel(sql_type = diesel::sql_types::Text)]
        lowered: String,
    }

    #[test]
    fn pooled_connections_lowercase_unicode() {
        let pool = test_support::pool();
        let mut conn = pool.get().unwrap();
        let row: Lowered = diesel::sql_query("SELECT unicode_lower('ÜBER Ärger') AS lowered")
            .get_result(&mut conn)
            .unwrap();
        assert_eq!(row.lowered, "über ärger");
    }

    #[test]
    fn migrations_are_idempotent() {
        let mut conn = test_support::connection();
        run_migrations(&mut conn).unwrap();
        assert!(!conn.has_pending_migration(MIGRATIONS).unwrap());
    }
}
