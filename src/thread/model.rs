use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use diesel::prelude::{Insertable, Queryable, Selectable};
use serde::{Deserialize, Serialize};

use crate::message;
use crate::{group, user};

use super::{Id, MAX_SUBJECT_LEN};

#[derive(Queryable, Selectable, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[diesel(table_name = crate::schema::threads)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct Thread {
    id: Id,
    subject: String,
}

impl Thread {
    pub fn new(id: Id, subject: impl Into<String>) -> Self {
        Self {
            id,
            subject: subject.into(),
        }
    }

    pub const fn id(&self) -> &Id {
        &self.id
    }

    pub fn subject(&self) -> &str {
        &self.subject
    }
}

#[derive(Insertable)]
#[diesel(table_name = crate::schema::threads)]
pub struct NewThread<'a> {
    id: Id,
    subject: &'a str,
}

impl<'a> NewThread<'a> {
    pub fn new(subject: &'a str) -> Self {
        Self {
            id: Id::random(),
            subject,
        }
    }

    pub const fn id(&self) -> &Id {
        &self.id
    }
}

/// How a user is attached to a thread. The same user may hold a `Direct`
/// path and any number of `ViaGroup` paths at once.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Path {
    Direct { user: user::Id },
    ViaGroup { user: user::Id, group: group::Id },
}

impl Path {
    pub const fn user(&self) -> &user::Id {
        match self {
            Self::Direct { user } | Self::ViaGroup { user, .. } => user,
        }
    }
}

/// Visibility state of one path on one thread.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Participation {
    thread_id: Id,
    path: Path,
    unread: bool,
    deleted: bool,
}

impl Participation {
    pub fn new(thread_id: Id, path: Path, unread: bool) -> Self {
        Self {
            thread_id,
            path,
            unread,
            deleted: false,
        }
    }

    pub const fn thread_id(&self) -> &Id {
        &self.thread_id
    }

    pub const fn path(&self) -> &Path {
        &self.path
    }

    pub const fn user(&self) -> &user::Id {
        self.path.user()
    }

    pub const fn is_unread(&self) -> bool {
        self.unread
    }

    pub const fn is_deleted(&self) -> bool {
        self.deleted
    }

    /// Listed in the user's inbox.
    pub const fn is_active(&self) -> bool {
        !self.deleted
    }
}

#[derive(Queryable, Selectable, Insertable)]
#[diesel(table_name = crate::schema::user_threads)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub(crate) struct UserThread {
    thread_id: Id,
    user_id: user::Id,
    unread: bool,
    deleted: bool,
}

#[derive(Queryable, Selectable, Insertable)]
#[diesel(table_name = crate::schema::group_member_threads)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub(crate) struct GroupMemberThread {
    thread_id: Id,
    group_id: group::Id,
    user_id: user::Id,
    unread: bool,
    deleted: bool,
}

impl From<UserThread> for Participation {
    fn from(row: UserThread) -> Self {
        Self {
            thread_id: row.thread_id,
            path: Path::Direct { user: row.user_id },
            unread: row.unread,
            deleted: row.deleted,
        }
    }
}

impl From<GroupMemberThread> for Participation {
    fn from(row: GroupMemberThread) -> Self {
        Self {
            thread_id: row.thread_id,
            path: Path::ViaGroup {
                user: row.user_id,
                group: row.group_id,
            },
            unread: row.unread,
            deleted: row.deleted,
        }
    }
}

/// Splits participations into rows of their backing tables.
pub(crate) fn into_rows(
    participations: &[Participation],
) -> (Vec<UserThread>, Vec<GroupMemberThread>) {
    let mut direct = Vec::new();
    let mut via_group = Vec::new();

    for p in participations {
        match &p.path {
            Path::Direct { user } => direct.push(UserThread {
                thread_id: p.thread_id.clone(),
                user_id: user.clone(),
                unread: p.unread,
                deleted: p.deleted,
            }),
            Path::ViaGroup { user, group } => via_group.push(GroupMemberThread {
                thread_id: p.thread_id.clone(),
                group_id: group.clone(),
                user_id: user.clone(),
                unread: p.unread,
                deleted: p.deleted,
            }),
        }
    }

    (direct, via_group)
}

/// Participations of a new thread: the sender (already read), every direct
/// recipient, and a snapshot of the active members of every addressed group.
pub fn fan_out(
    thread_id: &Id,
    sender: &user::Id,
    to_users: &[user::Id],
    to_groups: &[(group::Id, Vec<user::Id>)],
) -> Vec<Participation> {
    let mut participations = vec![Participation::new(
        thread_id.clone(),
        Path::Direct {
            user: sender.clone(),
        },
        false,
    )];

    let mut direct = HashSet::from([sender]);
    for u in to_users {
        if direct.insert(u) {
            participations.push(Participation::new(
                thread_id.clone(),
                Path::Direct { user: u.clone() },
                true,
            ));
        }
    }

    let mut via_group = HashSet::new();
    for (group, members) in to_groups {
        for m in members {
            if via_group.insert((group, m)) {
                participations.push(Participation::new(
                    thread_id.clone(),
                    Path::ViaGroup {
                        user: m.clone(),
                        group: group.clone(),
                    },
                    m != sender,
                ));
            }
        }
    }

    participations
}

/// Newest conversation first. Threads without a known latest message go
/// last; equal times fall back to the thread id.
pub(crate) fn sort_by_latest(
    mut threads: Vec<Thread>,
    latest: &HashMap<Id, DateTime<Utc>>,
) -> Vec<Thread> {
    threads.sort_by(|a, b| {
        latest
            .get(&b.id)
            .cmp(&latest.get(&a.id))
            .then_with(|| a.id.cmp(&b.id))
    });
    threads
}

/// Input of the "new message" form. Checked by the caller before it asks the
/// thread service to create anything.
pub struct Draft<'a> {
    pub from: &'a user::Id,
    pub subject: &'a str,
    pub content: &'a str,
    pub to_users: &'a [user::Id],
    pub to_groups: &'a [group::Id],
}

impl Draft<'_> {
    pub fn validate(&self) -> super::Result<()> {
        let has_users = self.to_users.iter().any(|u| u != self.from);
        if !has_users && self.to_groups.is_empty() {
            return Err(super::Error::NoRecipients);
        }

        if self.subject.trim().is_empty() {
            return Err(super::Error::EmptySubject);
        }

        let len = self.subject.chars().count();
        if len > MAX_SUBJECT_LEN {
            return Err(super::Error::SubjectTooLong(len));
        }

        message::model::validate_content(self.content)?;

        Ok(())
    }
}
