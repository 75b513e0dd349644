use log::{debug, info};

use crate::event::{self, MessageSent};
use crate::message::model::{Message, NewMessage};
use crate::{group, message, user};

use super::model::{NewThread, Participation, Thread, fan_out, sort_by_latest};
use super::{Id, Repository};

pub trait ThreadService {
    /// Opens a new thread with its first message.
    fn create_message(
        &self,
        from: &user::Id,
        subject: &str,
        content: &str,
        to_users: &[user::Id],
        to_groups: &[group::Id],
    ) -> super::Result<Message>;

    /// Posts into an existing thread. Every other participant sees the thread
    /// again as unread, even if they had deleted it.
    fn create_reply(&self, thread: &Thread, user: &user::Id, content: &str)
    -> super::Result<Message>;

    fn delete_for_user(&self, thread: &Thread, user: &user::Id) -> super::Result<()>;

    fn mark_as_read(&self, thread: &Thread, user: &user::Id) -> super::Result<()>;

    fn find_by_id(&self, id: &Id) -> super::Result<Thread>;

    fn find_active(&self, id: &Id, user: &user::Id) -> super::Result<Thread>;

    fn active_threads(&self, user: &user::Id) -> super::Result<Vec<Thread>>;

    fn unread_threads(&self, user: &user::Id) -> super::Result<Vec<Thread>>;

    fn sorted_active_threads(&self, user: &user::Id) -> super::Result<Vec<Thread>>;

    fn sorted_unread_threads(&self, user: &user::Id) -> super::Result<Vec<Thread>>;

    fn unread_count(&self, user: &user::Id) -> super::Result<usize>;

    fn is_unread(&self, thread: &Thread, user: &user::Id) -> super::Result<bool>;

    fn participations(&self, thread: &Thread) -> super::Result<Vec<Participation>>;

    fn messages(&self, thread: &Thread) -> super::Result<Vec<Message>>;

    fn first_message(&self, thread: &Thread) -> super::Result<Message>;

    fn latest_message(&self, thread: &Thread) -> super::Result<Message>;

    fn num_messages(&self, thread: &Thread) -> super::Result<usize>;

    fn registered_users(&self, thread: &Thread) -> super::Result<Vec<user::Id>>;

    fn registered_groups(&self, thread: &Thread) -> super::Result<Vec<group::Id>>;

    fn num_users(&self, thread: &Thread) -> super::Result<usize>;
}

#[derive(Clone)]
pub struct ThreadServiceImpl {
    repo: Repository,
    message_repo: message::Repository,
    group_directory: group::Directory,
    sink: event::Sink,
}

impl ThreadServiceImpl {
    pub fn new(
        repo: Repository,
        message_repo: message::Repository,
        group_directory: group::Directory,
        sink: event::Sink,
    ) -> Self {
        Self {
            repo,
            message_repo,
            group_directory,
            sink,
        }
    }
}

impl ThreadService for ThreadServiceImpl {
    fn create_message(
        &self,
        from: &user::Id,
        subject: &str,
        content: &str,
        to_users: &[user::Id],
        to_groups: &[group::Id],
    ) -> super::Result<Message> {
        let mut groups = Vec::with_capacity(to_groups.len());
        for g in to_groups {
            let members = self.group_directory.find_active_members(g)?;
            groups.push((g.clone(), members));
        }

        let t = NewThread::new(subject);
        let participations = fan_out(t.id(), from, to_users, &groups);
        let m = NewMessage::new(t.id(), from, content);

        let (thread, message) = self.repo.insert(&t, &participations, &m)?;
        info!(
            "thread {} created by {from} with {} participations",
            thread.id(),
            participations.len()
        );

        self.sink
            .publish(MessageSent::new(message.clone(), thread, false));

        Ok(message)
    }

    fn create_reply(
        &self,
        thread: &Thread,
        user: &user::Id,
        content: &str,
    ) -> super::Result<Message> {
        let m = NewMessage::new(thread.id(), user, content);
        let message = self.repo.insert_reply(&m)?;
        debug!("{user} replied to thread {}", thread.id());

        self.sink
            .publish(MessageSent::new(message.clone(), thread.clone(), true));

        Ok(message)
    }

    fn delete_for_user(&self, thread: &Thread, user: &user::Id) -> super::Result<()> {
        self.repo.hide(thread.id(), user)?;
        debug!("thread {} deleted for {user}", thread.id());
        Ok(())
    }

    fn mark_as_read(&self, thread: &Thread, user: &user::Id) -> super::Result<()> {
        self.repo.mark_as_read(thread.id(), user)
    }

    fn find_by_id(&self, id: &Id) -> super::Result<Thread> {
        self.repo.find_by_id(id)
    }

    fn find_active(&self, id: &Id, user: &user::Id) -> super::Result<Thread> {
        self.repo.find_active_by_id_and_user(id, user)
    }

    fn active_threads(&self, user: &user::Id) -> super::Result<Vec<Thread>> {
        self.repo.find_active_by_user(user)
    }

    fn unread_threads(&self, user: &user::Id) -> super::Result<Vec<Thread>> {
        self.repo.find_unread_by_user(user)
    }

    fn sorted_active_threads(&self, user: &user::Id) -> super::Result<Vec<Thread>> {
        let threads = self.active_threads(user)?;
        self.sort(threads)
    }

    fn sorted_unread_threads(&self, user: &user::Id) -> super::Result<Vec<Thread>> {
        let threads = self.unread_threads(user)?;
        self.sort(threads)
    }

    fn unread_count(&self, user: &user::Id) -> super::Result<usize> {
        self.unread_threads(user).map(|threads| threads.len())
    }

    fn is_unread(&self, thread: &Thread, user: &user::Id) -> super::Result<bool> {
        let participations = self.participations(thread)?;

        Ok(participations
            .iter()
            .any(|p| p.user() == user && p.is_active() && p.is_unread()))
    }

    fn participations(&self, thread: &Thread) -> super::Result<Vec<Participation>> {
        self.repo.find_participations(thread.id())
    }

    fn messages(&self, thread: &Thread) -> super::Result<Vec<Message>> {
        let messages = self.message_repo.find_by_thread(thread.id())?;
        Ok(messages)
    }

    fn first_message(&self, thread: &Thread) -> super::Result<Message> {
        let message = self.message_repo.find_first(thread.id())?;
        Ok(message)
    }

    fn latest_message(&self, thread: &Thread) -> super::Result<Message> {
        let message = self.message_repo.find_latest(thread.id())?;
        Ok(message)
    }

    fn num_messages(&self, thread: &Thread) -> super::Result<usize> {
        let count = self.message_repo.count_by_thread(thread.id())?;
        Ok(usize::try_from(count).unwrap_or_default())
    }

    fn registered_users(&self, thread: &Thread) -> super::Result<Vec<user::Id>> {
        self.repo.find_registered_users(thread.id())
    }

    fn registered_groups(&self, thread: &Thread) -> super::Result<Vec<group::Id>> {
        self.repo.find_registered_groups(thread.id())
    }

    fn num_users(&self, thread: &Thread) -> super::Result<usize> {
        self.registered_users(thread).map(|users| users.len())
    }
}

impl ThreadServiceImpl {
    /// Newest latest message first.
    fn sort(&self, threads: Vec<Thread>) -> super::Result<Vec<Thread>> {
        let ids: Vec<Id> = threads.iter().map(|t| t.id().clone()).collect();
        let latest = self.message_repo.find_latest_sent_at(&ids)?;
        Ok(sort_by_latest(threads, &latest))
    }
}

#[cfg(test)]
mod test {
    use std::collections::HashSet;
    use std::sync::Arc;

    use tokio::sync::mpsc;

    use crate::event::service::ChannelSink;
    use crate::group::repository::PgGroupDirectory;
    use crate::integration::db::test::TestDb;
    use crate::message::repository::PgMessageRepository;
    use crate::thread::model::Path;
    use crate::thread::repository::PgThreadRepository;

    use super::*;

    fn service(db: &TestDb) -> (ThreadServiceImpl, mpsc::UnboundedReceiver<MessageSent>) {
        let (sink, rx) = ChannelSink::new();
        let service = ThreadServiceImpl::new(
            Arc::new(PgThreadRepository::new(db.pool.clone())),
            Arc::new(PgMessageRepository::new(db.pool.clone())),
            Arc::new(PgGroupDirectory::new(db.pool.clone())),
            Arc::new(sink),
        );
        (service, rx)
    }

    /// (unread, deleted) of the single row with the given path.
    fn flags(ps: &[Participation], path: Path) -> (bool, bool) {
        let matching: Vec<&Participation> = ps.iter().filter(|p| p.path() == &path).collect();
        assert_eq!(matching.len(), 1, "expected exactly one row for {path:?}");
        (matching[0].is_unread(), matching[0].is_deleted())
    }

    fn direct(user: &user::Id) -> Path {
        Path::Direct { user: user.clone() }
    }

    fn via(user: &user::Id, group: &group::Id) -> Path {
        Path::ViaGroup {
            user: user.clone(),
            group: group.clone(),
        }
    }

    struct Scenario {
        a: user::Id,
        b: user::Id,
        c: user::Id,
        d: user::Id,
        g: group::Id,
        thread: Thread,
    }

    /// A messages B directly and group G, whose active members are B and C
    /// and whose inactive member is D.
    fn scenario(db: &TestDb, service: &ThreadServiceImpl) -> Scenario {
        let a = db.user("a");
        let b = db.user("b");
        let c = db.user("c");
        let d = db.inactive_user("d");
        let g = db.group("g", &[&b, &c, &d]);

        let message = service
            .create_message(&a, "Hello", "Hi all", &[b.clone()], &[g.clone()])
            .unwrap();
        let thread = service.find_by_id(message.thread_id()).unwrap();

        Scenario {
            a,
            b,
            c,
            d,
            g,
            thread,
        }
    }

    #[tokio::test]
    async fn should_create_message_for_users_and_group_members() {
        let db = TestDb::init().await;
        let (service, _rx) = service(&db);
        let s = scenario(&db, &service);

        let ps = service.participations(&s.thread).unwrap();

        assert_eq!(ps.len(), 4);
        assert_eq!(flags(&ps, direct(&s.a)), (false, false));
        assert_eq!(flags(&ps, direct(&s.b)), (true, false));
        assert_eq!(flags(&ps, via(&s.b, &s.g)), (true, false));
        assert_eq!(flags(&ps, via(&s.c, &s.g)), (true, false));
        assert!(ps.iter().all(|p| p.user() != &s.d));
        assert_eq!(s.thread.subject(), "Hello");
    }

    #[tokio::test]
    async fn should_publish_message_sent() {
        let db = TestDb::init().await;
        let (service, mut rx) = service(&db);
        let s = scenario(&db, &service);

        let created = rx.try_recv().unwrap();
        assert!(!created.reply);
        assert_eq!(created.thread, s.thread);
        assert_eq!(created.message.content(), "Hi all");

        let reply = service.create_reply(&s.thread, &s.b, "Hey").unwrap();

        let replied = rx.try_recv().unwrap();
        assert!(replied.reply);
        assert_eq!(replied.message, reply);
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn should_not_duplicate_sender_in_recipients() {
        let db = TestDb::init().await;
        let (service, _rx) = service(&db);

        let a = db.user("a");
        let b = db.user("b");
        let message = service
            .create_message(&a, "Hello", "Hi", &[a.clone(), b.clone()], &[])
            .unwrap();
        let thread = service.find_by_id(message.thread_id()).unwrap();

        let ps = service.participations(&thread).unwrap();

        assert_eq!(ps.len(), 2);
        assert_eq!(flags(&ps, direct(&a)), (false, false));
        assert_eq!(flags(&ps, direct(&b)), (true, false));
    }

    #[tokio::test]
    async fn should_resurrect_other_participants_on_reply() {
        let db = TestDb::init().await;
        let (service, _rx) = service(&db);
        let s = scenario(&db, &service);

        service.delete_for_user(&s.thread, &s.a).unwrap();
        service.delete_for_user(&s.thread, &s.c).unwrap();
        assert!(service.active_threads(&s.a).unwrap().is_empty());

        service.create_reply(&s.thread, &s.b, "Hey").unwrap();

        let ps = service.participations(&s.thread).unwrap();
        assert_eq!(flags(&ps, direct(&s.a)), (true, false));
        assert_eq!(flags(&ps, via(&s.c, &s.g)), (true, false));
        assert_eq!(service.active_threads(&s.a).unwrap(), vec![s.thread.clone()]);
        assert_eq!(service.active_threads(&s.c).unwrap(), vec![s.thread]);
    }

    #[tokio::test]
    async fn should_mark_own_rows_read_on_reply() {
        let db = TestDb::init().await;
        let (service, _rx) = service(&db);
        let s = scenario(&db, &service);

        service.create_reply(&s.thread, &s.b, "Hey").unwrap();

        let ps = service.participations(&s.thread).unwrap();
        assert_eq!(flags(&ps, direct(&s.b)), (false, false));
        assert_eq!(flags(&ps, via(&s.b, &s.g)), (false, false));
        assert!(!service.is_unread(&s.thread, &s.b).unwrap());
        assert!(service.is_unread(&s.thread, &s.a).unwrap());
    }

    #[tokio::test]
    async fn should_keep_own_deleted_flag_on_reply() {
        let db = TestDb::init().await;
        let (service, _rx) = service(&db);
        let s = scenario(&db, &service);

        service.delete_for_user(&s.thread, &s.b).unwrap();
        service.create_reply(&s.thread, &s.b, "Hey").unwrap();

        let ps = service.participations(&s.thread).unwrap();
        assert_eq!(flags(&ps, direct(&s.b)), (false, true));
        assert_eq!(flags(&ps, via(&s.b, &s.g)), (false, true));
    }

    #[tokio::test]
    async fn should_not_register_replying_non_participant() {
        let db = TestDb::init().await;
        let (service, _rx) = service(&db);
        let s = scenario(&db, &service);
        let e = db.user("e");

        let reply = service.create_reply(&s.thread, &e, "Who are you?").unwrap();

        assert_eq!(reply.thread_id(), s.thread.id());
        assert_eq!(service.num_messages(&s.thread).unwrap(), 2);
        assert_eq!(service.latest_message(&s.thread).unwrap(), reply);
        assert!(!service.registered_users(&s.thread).unwrap().contains(&e));
        assert!(service.participations(&s.thread).unwrap().iter().all(|p| p.user() != &e));
        assert!(service.active_threads(&e).unwrap().is_empty());
    }

    #[tokio::test]
    async fn should_delete_for_user_only() {
        let db = TestDb::init().await;
        let (service, _rx) = service(&db);
        let s = scenario(&db, &service);

        service.delete_for_user(&s.thread, &s.a).unwrap();

        assert!(service.active_threads(&s.a).unwrap().is_empty());
        assert_eq!(service.active_threads(&s.b).unwrap(), vec![s.thread.clone()]);
        assert_eq!(service.active_threads(&s.c).unwrap(), vec![s.thread]);
    }

    #[tokio::test]
    async fn should_delete_idempotently() {
        let db = TestDb::init().await;
        let (service, _rx) = service(&db);
        let s = scenario(&db, &service);

        service.delete_for_user(&s.thread, &s.a).unwrap();
        let once = service.participations(&s.thread).unwrap();
        service.delete_for_user(&s.thread, &s.a).unwrap();
        let twice = service.participations(&s.thread).unwrap();

        assert_eq!(once, twice);
        assert_eq!(flags(&twice, direct(&s.a)), (false, true));
    }

    #[tokio::test]
    async fn should_delete_both_paths() {
        let db = TestDb::init().await;
        let (service, _rx) = service(&db);
        let s = scenario(&db, &service);

        service.delete_for_user(&s.thread, &s.b).unwrap();

        let ps = service.participations(&s.thread).unwrap();
        assert_eq!(flags(&ps, direct(&s.b)), (true, true));
        assert_eq!(flags(&ps, via(&s.b, &s.g)), (true, true));
        assert!(service.active_threads(&s.b).unwrap().is_empty());
    }

    #[tokio::test]
    async fn should_ignore_delete_by_non_participant() {
        let db = TestDb::init().await;
        let (service, _rx) = service(&db);
        let s = scenario(&db, &service);
        let before = service.participations(&s.thread).unwrap();

        service.delete_for_user(&s.thread, &s.d).unwrap();

        assert_eq!(service.participations(&s.thread).unwrap(), before);
    }

    #[tokio::test]
    async fn should_list_thread_reached_by_both_paths_once() {
        let db = TestDb::init().await;
        let (service, _rx) = service(&db);
        let s = scenario(&db, &service);

        assert_eq!(service.active_threads(&s.b).unwrap(), vec![s.thread.clone()]);
        assert_eq!(service.unread_threads(&s.b).unwrap(), vec![s.thread]);
        assert_eq!(service.unread_count(&s.b).unwrap(), 1);
    }

    #[tokio::test]
    async fn should_list_unread_threads() {
        let db = TestDb::init().await;
        let (service, _rx) = service(&db);
        let s = scenario(&db, &service);

        assert!(service.unread_threads(&s.a).unwrap().is_empty());
        assert_eq!(service.unread_threads(&s.c).unwrap(), vec![s.thread.clone()]);

        service.mark_as_read(&s.thread, &s.c).unwrap();

        assert!(service.unread_threads(&s.c).unwrap().is_empty());
        assert_eq!(service.unread_count(&s.c).unwrap(), 0);
        assert_eq!(service.active_threads(&s.c).unwrap(), vec![s.thread]);
    }

    #[tokio::test]
    async fn should_not_list_deleted_thread_as_unread() {
        let db = TestDb::init().await;
        let (service, _rx) = service(&db);
        let s = scenario(&db, &service);

        service.delete_for_user(&s.thread, &s.c).unwrap();

        assert!(service.unread_threads(&s.c).unwrap().is_empty());
        assert!(!service.is_unread(&s.thread, &s.c).unwrap());
    }

    #[tokio::test]
    async fn should_mark_both_paths_read() {
        let db = TestDb::init().await;
        let (service, _rx) = service(&db);
        let s = scenario(&db, &service);

        service.mark_as_read(&s.thread, &s.b).unwrap();

        let ps = service.participations(&s.thread).unwrap();
        assert_eq!(flags(&ps, direct(&s.b)), (false, false));
        assert_eq!(flags(&ps, via(&s.b, &s.g)), (false, false));
        assert_eq!(flags(&ps, via(&s.c, &s.g)), (true, false));
    }

    #[tokio::test]
    async fn should_sort_threads_by_latest_message() {
        let db = TestDb::init().await;
        let (service, _rx) = service(&db);

        let a = db.user("a");
        let b = db.user("b");
        let mut threads = Vec::new();
        for subject in ["first", "second", "third"] {
            let m = service
                .create_message(&a, subject, "hi", &[b.clone()], &[])
                .unwrap();
            threads.push(service.find_by_id(m.thread_id()).unwrap());
        }
        service.create_reply(&threads[0], &b, "bump").unwrap();

        let sorted = service.sorted_active_threads(&a).unwrap();

        assert_eq!(
            sorted,
            vec![threads[0].clone(), threads[2].clone(), threads[1].clone()]
        );
        for pair in sorted.windows(2) {
            let newer = service.latest_message(&pair[0]).unwrap();
            let older = service.latest_message(&pair[1]).unwrap();
            assert!(newer.sent_at() > older.sent_at());
        }
    }

    #[tokio::test]
    async fn should_sort_unread_threads_by_latest_message() {
        let db = TestDb::init().await;
        let (service, _rx) = service(&db);

        let a = db.user("a");
        let b = db.user("b");
        let m1 = service.create_message(&a, "one", "hi", &[b.clone()], &[]).unwrap();
        let m2 = service.create_message(&a, "two", "hi", &[b.clone()], &[]).unwrap();
        let m3 = service.create_message(&a, "three", "hi", &[b.clone()], &[]).unwrap();
        let t2 = service.find_by_id(m2.thread_id()).unwrap();
        service.mark_as_read(&t2, &b).unwrap();

        let sorted: Vec<Id> = service
            .sorted_unread_threads(&b)
            .unwrap()
            .iter()
            .map(|t| t.id().clone())
            .collect();

        assert_eq!(sorted, vec![m3.thread_id().clone(), m1.thread_id().clone()]);
    }

    #[tokio::test]
    async fn should_expose_thread_accessors() {
        let db = TestDb::init().await;
        let (service, _rx) = service(&db);
        let s = scenario(&db, &service);

        let first = service.first_message(&s.thread).unwrap();
        let reply = service.create_reply(&s.thread, &s.c, "Hello back").unwrap();

        assert_eq!(service.num_messages(&s.thread).unwrap(), 2);
        assert_eq!(service.first_message(&s.thread).unwrap(), first);
        assert_eq!(service.latest_message(&s.thread).unwrap(), reply);
        assert!(first.sent_at() <= reply.sent_at());
        assert_eq!(service.messages(&s.thread).unwrap(), vec![first, reply]);

        let users: HashSet<user::Id> = service
            .registered_users(&s.thread)
            .unwrap()
            .into_iter()
            .collect();
        assert_eq!(users, HashSet::from([s.a, s.b, s.c]));
        assert_eq!(service.num_users(&s.thread).unwrap(), 3);
        assert_eq!(service.registered_groups(&s.thread).unwrap(), vec![s.g]);
    }

    #[tokio::test]
    async fn should_snapshot_group_members_at_send_time() {
        let db = TestDb::init().await;
        let (service, _rx) = service(&db);
        let s = scenario(&db, &service);

        let f = db.user("f");
        db.join(&s.g, &f);

        assert!(service.active_threads(&f).unwrap().is_empty());
        assert!(!service.registered_users(&s.thread).unwrap().contains(&f));
    }

    #[tokio::test]
    async fn should_find_active_thread_for_participant_only() {
        let db = TestDb::init().await;
        let (service, _rx) = service(&db);
        let s = scenario(&db, &service);

        assert_eq!(service.find_active(s.thread.id(), &s.c).unwrap(), s.thread);
        assert!(matches!(
            service.find_active(s.thread.id(), &s.d),
            Err(crate::thread::Error::NotFound(_))
        ));

        service.delete_for_user(&s.thread, &s.c).unwrap();

        assert!(matches!(
            service.find_active(s.thread.id(), &s.c),
            Err(crate::thread::Error::NotFound(_))
        ));
    }
}
