use diesel::ExpressionMethods;
use diesel::QueryDsl;
use diesel::RunQueryDsl;

use crate::integration::db::Pool;
use crate::schema::{groups_users, users};
use crate::user;

use super::Id;

/// Read side of the externally maintained group membership.
pub trait GroupDirectory {
    fn find_active_members(&self, id: &Id) -> super::Result<Vec<user::Id>>;
}

pub struct PgGroupDirectory {
    pool: Pool,
}

impl PgGroupDirectory {
    pub fn new(pool: Pool) -> Self {
        Self { pool }
    }
}

impl GroupDirectory for PgGroupDirectory {
    fn find_active_members(&self, id: &Id) -> super::Result<Vec<user::Id>> {
        let mut conn = self.pool.get()?;

        let members = groups_users::table
            .inner_join(users::table)
            .filter(groups_users::group_id.eq(id))
            .filter(users::is_active.eq(true))
            .select(users::id)
            .order(users::id.asc())
            .load::<user::Id>(&mut conn)?;

        Ok(members)
    }
}
