use std::collections::HashMap;

use chrono::{DateTime, Utc};
use diesel::ExpressionMethods;
use diesel::QueryDsl;
use diesel::RunQueryDsl;
use diesel::SelectableHelper;
use diesel::dsl::max;
use diesel::result::OptionalExtension;

use crate::integration::db::Pool;
use crate::schema::messages;
use crate::thread;

use super::model::Message;

pub trait MessageRepository {
    fn find_by_thread(&self, thread_id: &thread::Id) -> super::Result<Vec<Message>>;

    fn find_first(&self, thread_id: &thread::Id) -> super::Result<Message>;

    fn find_latest(&self, thread_id: &thread::Id) -> super::Result<Message>;

    fn count_by_thread(&self, thread_id: &thread::Id) -> super::Result<i64>;

    /// Sent time of the most recent message of each given thread.
    fn find_latest_sent_at(
        &self,
        thread_ids: &[thread::Id],
    ) -> super::Result<HashMap<thread::Id, DateTime<Utc>>>;
}

pub struct PgMessageRepository {
    pool: Pool,
}

impl PgMessageRepository {
    pub fn new(pool: Pool) -> Self {
        Self { pool }
    }
}

impl MessageRepository for PgMessageRepository {
    fn find_by_thread(&self, thread_id: &thread::Id) -> super::Result<Vec<Message>> {
        let mut conn = self.pool.get()?;

        let messages = messages::table
            .filter(messages::thread_id.eq(thread_id))
            .order((messages::sent_at.asc(), messages::id.asc()))
            .select(Message::as_select())
            .load(&mut conn)?;

        Ok(messages)
    }

    fn find_first(&self, thread_id: &thread::Id) -> super::Result<Message> {
        let mut conn = self.pool.get()?;

        let message = messages::table
            .filter(messages::thread_id.eq(thread_id))
            .order((messages::sent_at.asc(), messages::id.asc()))
            .select(Message::as_select())
            .first(&mut conn)
            .optional()?;

        message.ok_or_else(|| super::Error::NotFound(thread_id.clone()))
    }

    fn find_latest(&self, thread_id: &thread::Id) -> super::Result<Message> {
        let mut conn = self.pool.get()?;

        let message = messages::table
            .filter(messages::thread_id.eq(thread_id))
            .order((messages::sent_at.desc(), messages::id.desc()))
            .select(Message::as_select())
            .first(&mut conn)
            .optional()?;

        message.ok_or_else(|| super::Error::NotFound(thread_id.clone()))
    }

    fn count_by_thread(&self, thread_id: &thread::Id) -> super::Result<i64> {
        let mut conn = self.pool.get()?;

        let count = messages::table
            .filter(messages::thread_id.eq(thread_id))
            .count()
            .get_result(&mut conn)?;

        Ok(count)
    }

    fn find_latest_sent_at(
        &self,
        thread_ids: &[thread::Id],
    ) -> super::Result<HashMap<thread::Id, DateTime<Utc>>> {
        if thread_ids.is_empty() {
            return Ok(HashMap::new());
        }

        let mut conn = self.pool.get()?;

        let rows = messages::table
            .filter(messages::thread_id.eq_any(thread_ids))
            .group_by(messages::thread_id)
            .select((messages::thread_id, max(messages::sent_at)))
            .load::<(thread::Id, Option<DateTime<Utc>>)>(&mut conn)?;

        let latest = rows
            .into_iter()
            .filter_map(|(id, sent_at)| sent_at.map(|s| (id, s)))
            .collect();

        Ok(latest)
    }
}
