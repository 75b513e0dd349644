use std::sync::Arc;

use repository::GroupDirectory;

use crate::id::uuid_id;

pub mod repository;

type Result<T> = std::result::Result<T, Error>;
pub type Directory = Arc<dyn GroupDirectory + Send + Sync>;

uuid_id!(Id);

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error(transparent)]
    _R2d2(#[from] r2d2::Error),
    #[error(transparent)]
    _Diesel(#[from] diesel::result::Error),
}
