use chrono::{DateTime, Utc};
use diesel::prelude::{Insertable, Queryable, Selectable};
use serde::{Deserialize, Serialize};

use crate::{thread, user};

use super::Id;

#[derive(Queryable, Selectable, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[diesel(table_name = crate::schema::messages)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct Message {
    id: Id,
    thread_id: thread::Id,
    sender: user::Id,
    sent_at: DateTime<Utc>,
    content: String,
}

impl Message {
    pub fn new(
        id: Id,
        thread_id: thread::Id,
        sender: user::Id,
        sent_at: DateTime<Utc>,
        content: impl Into<String>,
    ) -> Self {
        Self {
            id,
            thread_id,
            sender,
            sent_at,
            content: content.into(),
        }
    }

    pub const fn id(&self) -> &Id {
        &self.id
    }

    pub const fn thread_id(&self) -> &thread::Id {
        &self.thread_id
    }

    pub const fn sender(&self) -> &user::Id {
        &self.sender
    }

    pub const fn sent_at(&self) -> &DateTime<Utc> {
        &self.sent_at
    }

    pub fn content(&self) -> &str {
        &self.content
    }
}

#[derive(Insertable)]
#[diesel(table_name = crate::schema::messages)]
pub struct NewMessage<'a> {
    id: Id,
    thread_id: &'a thread::Id,
    sender: &'a user::Id,
    sent_at: DateTime<Utc>,
    content: &'a str,
}

impl<'a> NewMessage<'a> {
    pub fn new(thread_id: &'a thread::Id, sender: &'a user::Id, content: &'a str) -> Self {
        Self {
            id: Id::random(),
            thread_id,
            sender,
            sent_at: Utc::now(),
            content,
        }
    }

    pub const fn thread_id(&self) -> &thread::Id {
        self.thread_id
    }

    pub const fn sender(&self) -> &user::Id {
        self.sender
    }
}

/// Form level rule shared by new messages and replies.
pub fn validate_content(content: &str) -> super::Result<()> {
    if content.trim().is_empty() {
        return Err(super::Error::EmptyContent);
    }
    Ok(())
}
