use std::sync::Arc;

use repository::MessageRepository;

use crate::id::uuid_id;
use crate::thread;

pub mod model;
pub mod repository;

type Result<T> = std::result::Result<T, Error>;
pub type Repository = Arc<dyn MessageRepository + Send + Sync>;

uuid_id!(Id);

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("no messages in thread: {0:?}")]
    NotFound(thread::Id),
    #[error("message content is empty")]
    EmptyContent,

    #[error(transparent)]
    _R2d2(#[from] r2d2::Error),
    #[error(transparent)]
    _Diesel(#[from] diesel::result::Error),
}
