use std::env;
use std::fs::File;
use std::str::FromStr;

use dotenv::dotenv;
use log::LevelFilter;
use simplelog::{
    ColorChoice, CombinedLogger, SharedLogger, TermLogger, TerminalMode, WriteLogger,
};

pub mod db;
pub mod pubsub;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Clone)]
pub struct Config {
    pub db: db::Config,
    pub pubsub: Option<pubsub::Config>,
}

impl Default for Config {
    fn default() -> Self {
        dotenv().ok();

        init_logger();

        Self {
            db: db::Config::env().unwrap_or_default(),
            pubsub: pubsub::Config::env(),
        }
    }
}

fn init_logger() {
    let rust_log = env::var("RUST_LOG").unwrap_or("info".into());
    let level = LevelFilter::from_str(&rust_log).unwrap_or(LevelFilter::Info);
    let log_file = env::var("SERVICE_NAME")
        .map(|pkg| format!("{pkg}.log"))
        .unwrap_or("user_messages.log".into());

    let mut loggers: Vec<Box<dyn SharedLogger>> = vec![TermLogger::new(
        level,
        simplelog::Config::default(),
        TerminalMode::Mixed,
        ColorChoice::Auto,
    )];

    match File::create(&log_file) {
        Ok(file) => loggers.push(WriteLogger::new(
            level,
            simplelog::Config::default(),
            file,
        )),
        Err(e) => eprintln!("Failed to create log file {log_file}: {e}"),
    }

    if let Err(e) = CombinedLogger::init(loggers) {
        eprintln!("Logger is already initialized: {e}");
    }
}

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error(transparent)]
    _Env(#[from] env::VarError),
    #[error(transparent)]
    _ParseInt(#[from] std::num::ParseIntError),
    #[error(transparent)]
    _R2d2(#[from] r2d2::Error),
    #[error(transparent)]
    _Diesel(#[from] diesel::result::Error),
    #[error(transparent)]
    _NatsConnect(#[from] async_nats::ConnectError),
}
