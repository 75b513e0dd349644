use serde::{Deserialize, Serialize};

use crate::message::model::Message;
use crate::thread::{self, model::Thread};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageSent {
    pub message: Message,
    pub thread: Thread,
    pub reply: bool,
}

impl MessageSent {
    pub fn new(message: Message, thread: Thread, reply: bool) -> Self {
        Self {
            message,
            thread,
            reply,
        }
    }
}

pub enum Subject<'a> {
    Thread(&'a thread::Id),
}
