use std::sync::Arc;

use log::{info, warn};
use tokio::runtime::Handle;

use crate::event::service::{NatsSink, NoopSink};
use crate::group::repository::PgGroupDirectory;
use crate::integration::{self, db};
use crate::message::repository::PgMessageRepository;
use crate::thread::repository::PgThreadRepository;
use crate::thread::service::ThreadServiceImpl;
use crate::{event, thread};

#[derive(Clone)]
pub struct AppState {
    pub thread_service: thread::Service,
}

impl AppState {
    pub async fn init(config: &integration::Config) -> integration::Result<Self> {
        let pool = config.db.connect()?;
        db::migrate(&pool)?;

        let sink: event::Sink = match &config.pubsub {
            Some(pubsub) => {
                let client = pubsub.connect().await?;
                info!("publishing message events to NATS");
                Arc::new(NatsSink::new(client, Handle::current()))
            }
            None => {
                warn!("message events will not be published");
                Arc::new(NoopSink)
            }
        };

        let thread_service = ThreadServiceImpl::new(
            Arc::new(PgThreadRepository::new(pool.clone())),
            Arc::new(PgMessageRepository::new(pool.clone())),
            Arc::new(PgGroupDirectory::new(pool)),
            sink,
        );

        Ok(Self {
            thread_service: Arc::new(thread_service),
        })
    }
}
