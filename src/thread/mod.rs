use std::sync::Arc;

use repository::ThreadRepository;
use service::ThreadService;

use crate::id::uuid_id;
use crate::{group, message};

pub mod model;
pub mod repository;
pub mod service;

type Result<T> = std::result::Result<T, Error>;
pub type Repository = Arc<dyn ThreadRepository + Send + Sync>;
pub type Service = Arc<dyn ThreadService + Send + Sync>;

pub const MAX_SUBJECT_LEN: usize = 150;

uuid_id!(Id);

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("thread not found: {0:?}")]
    NotFound(Id),
    #[error("must select at least one user or group")]
    NoRecipients,
    #[error("subject is empty")]
    EmptySubject,
    #[error("subject is too long: {0} characters")]
    SubjectTooLong(usize),

    #[error(transparent)]
    _Group(#[from] group::Error),
    #[error(transparent)]
    _Message(#[from] message::Error),
    #[error(transparent)]
    _R2d2(#[from] r2d2::Error),
    #[error(transparent)]
    _Diesel(#[from] diesel::result::Error),
}
