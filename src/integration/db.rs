use std::env;
use std::time::Duration;

use diesel::PgConnection;
use diesel::connection::SimpleConnection;
use diesel::r2d2::ConnectionManager;
use log::info;

pub type Pool = r2d2::Pool<ConnectionManager<PgConnection>>;

const SCHEMA: &str = include_str!("../../migrations/2025-10-01-120000_create_threads/up.sql");

#[derive(Clone)]
pub struct Config {
    host: String,
    port: u16,
    user: String,
    password: String,
    db: String,
    pool_size: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: String::from("127.0.0.1"),
            port: 5432,
            user: String::from("postgres"),
            password: String::from("postgres"),
            db: String::from("messenger"),
            pool_size: 10,
        }
    }
}

impl Config {
    pub fn env() -> super::Result<Self> {
        let host = env::var("POSTGRES_HOST")?;
        let port = env::var("POSTGRES_PORT")?.parse()?;
        let user = env::var("POSTGRES_USER")?;
        let password = env::var("POSTGRES_PASSWORD")?;
        let db = env::var("POSTGRES_DB")?;
        let pool_size = env::var("POSTGRES_POOL_SIZE")
            .unwrap_or_else(|_| "10".to_string())
            .parse()?;

        Ok(Self {
            host,
            port,
            user,
            password,
            db,
            pool_size,
        })
    }

    fn url(&self) -> String {
        format!(
            "postgres://{}:{}@{}:{}/{}",
            self.user, self.password, self.host, self.port, self.db
        )
    }

    pub fn connect(&self) -> super::Result<Pool> {
        let manager = ConnectionManager::<PgConnection>::new(self.url());

        let pool = r2d2::Pool::builder()
            .max_size(self.pool_size)
            .connection_timeout(Duration::from_secs(5))
            .build(manager)?;

        Ok(pool)
    }
}

/// Applies the bundled schema. Safe to run against an up-to-date database.
pub fn migrate(pool: &Pool) -> super::Result<()> {
    let mut conn = pool.get()?;
    conn.batch_execute(SCHEMA)?;
    info!("database schema is up to date");
    Ok(())
}
