use diesel::BoolExpressionMethods;
use diesel::Connection;
use diesel::ExpressionMethods;
use diesel::QueryDsl;
use diesel::RunQueryDsl;
use diesel::SelectableHelper;
use diesel::pg::Pg;
use diesel::query_dsl::CombineDsl;
use diesel::result::OptionalExtension;

use crate::integration::db::Pool;
use crate::message::model::{Message, NewMessage};
use crate::schema::{group_member_threads, messages, threads, user_threads};
use crate::{group, user};

use super::Id;
use super::model::{GroupMemberThread, NewThread, Participation, Thread, UserThread, into_rows};

pub trait ThreadRepository {
    /// Stores a thread together with its participations and first message.
    fn insert(
        &self,
        thread: &NewThread,
        participations: &[Participation],
        message: &NewMessage,
    ) -> super::Result<(Thread, Message)>;

    /// Appends a message, resurrecting every other participant and marking
    /// the sender's own rows read.
    fn insert_reply(&self, message: &NewMessage) -> super::Result<Message>;

    fn hide(&self, id: &Id, user: &user::Id) -> super::Result<()>;

    fn mark_as_read(&self, id: &Id, user: &user::Id) -> super::Result<()>;

    fn find_by_id(&self, id: &Id) -> super::Result<Thread>;

    fn find_active_by_id_and_user(&self, id: &Id, user: &user::Id) -> super::Result<Thread>;

    fn find_active_by_user(&self, user: &user::Id) -> super::Result<Vec<Thread>>;

    fn find_unread_by_user(&self, user: &user::Id) -> super::Result<Vec<Thread>>;

    fn find_participations(&self, id: &Id) -> super::Result<Vec<Participation>>;

    fn find_registered_users(&self, id: &Id) -> super::Result<Vec<user::Id>>;

    fn find_registered_groups(&self, id: &Id) -> super::Result<Vec<group::Id>>;
}

pub struct PgThreadRepository {
    pool: Pool,
}

impl PgThreadRepository {
    pub fn new(pool: Pool) -> Self {
        Self { pool }
    }
}

impl PgThreadRepository {
    /// Threads where the user holds a non-deleted row of either kind,
    /// optionally restricted to unread rows.
    fn visible_to(user: &user::Id, unread_only: bool) -> threads::BoxedQuery<'_, Pg> {
        let mut direct = user_threads::table
            .filter(user_threads::user_id.eq(user))
            .filter(user_threads::deleted.eq(false))
            .select(user_threads::thread_id)
            .into_boxed();

        let mut via_group = group_member_threads::table
            .filter(group_member_threads::user_id.eq(user))
            .filter(group_member_threads::deleted.eq(false))
            .select(group_member_threads::thread_id)
            .into_boxed();

        if unread_only {
            direct = direct.filter(user_threads::unread.eq(true));
            via_group = via_group.filter(group_member_threads::unread.eq(true));
        }

        threads::table
            .filter(
                threads::id
                    .eq_any(direct)
                    .or(threads::id.eq_any(via_group)),
            )
            .into_boxed()
    }
}

impl ThreadRepository for PgThreadRepository {
    fn insert(
        &self,
        t: &NewThread,
        participations: &[Participation],
        m: &NewMessage,
    ) -> super::Result<(Thread, Message)> {
        let mut conn = self.pool.get()?;
        let (direct, via_group) = into_rows(participations);

        conn.transaction::<_, super::Error, _>(|conn| {
            let thread = diesel::insert_into(threads::table)
                .values(t)
                .returning(Thread::as_returning())
                .get_result(conn)?;

            if !direct.is_empty() {
                diesel::insert_into(user_threads::table)
                    .values(&direct)
                    .execute(conn)?;
            }

            if !via_group.is_empty() {
                diesel::insert_into(group_member_threads::table)
                    .values(&via_group)
                    .execute(conn)?;
            }

            let message = diesel::insert_into(messages::table)
                .values(m)
                .returning(Message::as_returning())
                .get_result(conn)?;

            Ok((thread, message))
        })
    }

    fn insert_reply(&self, m: &NewMessage) -> super::Result<Message> {
        let mut conn = self.pool.get()?;
        let thread_id = m.thread_id();
        let sender = m.sender();

        conn.transaction::<_, super::Error, _>(|conn| {
            let message = diesel::insert_into(messages::table)
                .values(m)
                .returning(Message::as_returning())
                .get_result(conn)?;

            diesel::update(
                user_threads::table
                    .filter(user_threads::thread_id.eq(thread_id))
                    .filter(user_threads::user_id.ne(sender)),
            )
            .set((
                user_threads::deleted.eq(false),
                user_threads::unread.eq(true),
            ))
            .execute(conn)?;

            diesel::update(
                group_member_threads::table
                    .filter(group_member_threads::thread_id.eq(thread_id))
                    .filter(group_member_threads::user_id.ne(sender)),
            )
            .set((
                group_member_threads::deleted.eq(false),
                group_member_threads::unread.eq(true),
            ))
            .execute(conn)?;

            diesel::update(
                user_threads::table
                    .filter(user_threads::thread_id.eq(thread_id))
                    .filter(user_threads::user_id.eq(sender)),
            )
            .set(user_threads::unread.eq(false))
            .execute(conn)?;

            diesel::update(
                group_member_threads::table
                    .filter(group_member_threads::thread_id.eq(thread_id))
                    .filter(group_member_threads::user_id.eq(sender)),
            )
            .set(group_member_threads::unread.eq(false))
            .execute(conn)?;

            Ok(message)
        })
    }

    fn hide(&self, id: &Id, user: &user::Id) -> super::Result<()> {
        let mut conn = self.pool.get()?;

        conn.transaction::<_, super::Error, _>(|conn| {
            diesel::update(
                user_threads::table
                    .filter(user_threads::thread_id.eq(id))
                    .filter(user_threads::user_id.eq(user)),
            )
            .set(user_threads::deleted.eq(true))
            .execute(conn)?;

            diesel::update(
                group_member_threads::table
                    .filter(group_member_threads::thread_id.eq(id))
                    .filter(group_member_threads::user_id.eq(user)),
            )
            .set(group_member_threads::deleted.eq(true))
            .execute(conn)?;

            Ok(())
        })
    }

    fn mark_as_read(&self, id: &Id, user: &user::Id) -> super::Result<()> {
        let mut conn = self.pool.get()?;

        conn.transaction::<_, super::Error, _>(|conn| {
            diesel::update(
                user_threads::table
                    .filter(user_threads::thread_id.eq(id))
                    .filter(user_threads::user_id.eq(user)),
            )
            .set(user_threads::unread.eq(false))
            .execute(conn)?;

            diesel::update(
                group_member_threads::table
                    .filter(group_member_threads::thread_id.eq(id))
                    .filter(group_member_threads::user_id.eq(user)),
            )
            .set(group_member_threads::unread.eq(false))
            .execute(conn)?;

            Ok(())
        })
    }

    fn find_by_id(&self, id: &Id) -> super::Result<Thread> {
        let mut conn = self.pool.get()?;

        let thread = threads::table
            .filter(threads::id.eq(id))
            .select(Thread::as_select())
            .first(&mut conn)
            .optional()?;

        thread.ok_or_else(|| super::Error::NotFound(id.clone()))
    }

    fn find_active_by_id_and_user(&self, id: &Id, user: &user::Id) -> super::Result<Thread> {
        let mut conn = self.pool.get()?;

        let thread = Self::visible_to(user, false)
            .filter(threads::id.eq(id))
            .select(Thread::as_select())
            .first(&mut conn)
            .optional()?;

        thread.ok_or_else(|| super::Error::NotFound(id.clone()))
    }

    fn find_active_by_user(&self, user: &user::Id) -> super::Result<Vec<Thread>> {
        let mut conn = self.pool.get()?;

        let threads = Self::visible_to(user, false)
            .select(Thread::as_select())
            .load(&mut conn)?;

        Ok(threads)
    }

    fn find_unread_by_user(&self, user: &user::Id) -> super::Result<Vec<Thread>> {
        let mut conn = self.pool.get()?;

        let threads = Self::visible_to(user, true)
            .select(Thread::as_select())
            .load(&mut conn)?;

        Ok(threads)
    }

    fn find_participations(&self, id: &Id) -> super::Result<Vec<Participation>> {
        let mut conn = self.pool.get()?;

        let direct = user_threads::table
            .filter(user_threads::thread_id.eq(id))
            .order(user_threads::user_id.asc())
            .select(UserThread::as_select())
            .load(&mut conn)?;

        let via_group = group_member_threads::table
            .filter(group_member_threads::thread_id.eq(id))
            .order((
                group_member_threads::group_id.asc(),
                group_member_threads::user_id.asc(),
            ))
            .select(GroupMemberThread::as_select())
            .load(&mut conn)?;

        let participations = direct
            .into_iter()
            .map(Participation::from)
            .chain(via_group.into_iter().map(Participation::from))
            .collect();

        Ok(participations)
    }

    fn find_registered_users(&self, id: &Id) -> super::Result<Vec<user::Id>> {
        let mut conn = self.pool.get()?;

        let users = user_threads::table
            .filter(user_threads::thread_id.eq(id))
            .select(user_threads::user_id)
            .union(
                group_member_threads::table
                    .filter(group_member_threads::thread_id.eq(id))
                    .select(group_member_threads::user_id),
            )
            .load::<user::Id>(&mut conn)?;

        Ok(users)
    }

    fn find_registered_groups(&self, id: &Id) -> super::Result<Vec<group::Id>> {
        let mut conn = self.pool.get()?;

        let groups = group_member_threads::table
            .filter(group_member_threads::thread_id.eq(id))
            .select(group_member_threads::group_id)
            .distinct()
            .load::<group::Id>(&mut conn)?;

        Ok(groups)
    }
}
