//! [`Query`] for a page of the user directory.

pub mod strategy;

use std::{num::NonZeroUsize, time::Duration};

use common::pagination::{self, Pagination};
use derive_more::{Display, Error, From};
use serde::Deserialize;
use smart_default::SmartDefault;
use tracerr::Traced;
use tracing as log;

use crate::{
    domain::user::{self, Privilege},
    infra::database,
    query::{user::HasPrivilege, users},
    read::{
        self,
        ranking::{InvalidSet, Set},
        user::directory::{Capabilities, Fetched, Page},
    },
    Service,
};

use super::Query;

pub use self::strategy::{FetchPage, Strategy, Window};

/// Name of the query parameter selecting the directory section.
pub const SECTION_PARAM: &str = "section";

/// Section shown when none is requested.
pub const DEFAULT_SECTION: &str = "joindate";

/// [`Directory`] configuration.
#[derive(Clone, Copy, Debug, SmartDefault)]
pub struct Config {
    /// Number of [`User`]s shown on a single page.
    ///
    /// [`User`]: crate::domain::User
    #[default(NonZeroUsize::new(50).expect("non-zero"))]
    pub page_size: NonZeroUsize,

    /// How long a [`User`] is considered online after the last activity.
    ///
    /// [`User`]: crate::domain::User
    #[default(Duration::from_secs(24 * 60 * 60))]
    pub online_window: Duration,

    /// Population reported as the count of [`Set::Online`].
    pub online_count: OnlineCount,

    /// Indicator whether reputation is disabled platform-wide.
    pub reputation_disabled: bool,
}

/// Population reported as the count of [`Set::Online`].
#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, PartialEq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OnlineCount {
    /// All the registered [`User`]s.
    ///
    /// [`User`]: crate::domain::User
    #[default]
    Global,

    /// Only the [`User`]s active inside [`Config::online_window`].
    ///
    /// [`User`]: crate::domain::User
    Window,
}

/// [`Query`] for a [`Page`] of a ranking [`Set`].
#[derive(Clone, Debug)]
pub struct Directory {
    /// Name (or key) of the ranking [`Set`] to list.
    pub set: String,

    /// [`User`] looking at the directory, or [`None`] for a guest.
    ///
    /// [`User`]: crate::domain::User
    pub viewer: Option<user::Id>,

    /// Query string parameters of the request.
    pub query: pagination::Query,
}

impl<Db> Query<Directory> for Service<Db>
where
    Self: Query<HasPrivilege, Ok = bool, Err = Traced<database::Error>>
        + Query<FetchPage, Ok = Fetched, Err = Traced<database::Error>>
        + Query<
            users::GuestCount,
            Ok = read::user::GuestCount,
            Err = Traced<database::Error>,
        >,
{
    type Ok = Page;
    type Err = Traced<ExecutionError>;

    #[tracing::instrument(
        skip_all,
        fields(set = %query.set, viewer = ?query.viewer),
    )]
    async fn execute(&self, query: Directory) -> Result<Self::Ok, Self::Err> {
        use ExecutionError as E;

        let Directory { set, viewer, query } = query;
        let set = set
            .parse::<Set>()
            .map_err(tracerr::from_and_wrap!(=> E))?;

        let page_size = self.config().directory.page_size;
        let page = pagination::page_number(query.get(pagination::PAGE_PARAM));
        let start = (page.get() - 1).saturating_mul(page_size.get());
        let window = Window {
            viewer,
            start,
            stop: Some(start.saturating_add(page_size.get() - 1)),
        };

        let privilege = |privilege| HasPrivilege {
            user: viewer,
            privilege,
        };
        let guests = async {
            if set == Set::Online {
                self.execute(users::GuestCount::by(()))
                    .await
                    .map(|count| Some(usize::from(count)))
            } else {
                Ok(None)
            }
        };
        let (is_admin, is_global_mod, can_search, fetched, guests) = futures::try_join!(
            self.execute(privilege(Privilege::Administrator)),
            self.execute(privilege(Privilege::GlobalModerator)),
            self.execute(privilege(Privilege::SearchUsers)),
            self.execute(FetchPage {
                strategy: set.into(),
                window,
            }),
            guests,
        )
        .map_err(tracerr::map_from_and_wrap!(=> E))?;

        let capabilities = Capabilities {
            is_admin,
            is_global_mod,
            can_search,
        };
        let Fetched { mut entries, count } = fetched;

        let mut anonymous_user_count = guests;
        if let Some(anonymous) = &mut anonymous_user_count {
            if !capabilities.is_admin_or_global_mod() {
                let listed = entries.len();
                entries.retain(|e| Some(e.id()) == viewer || !e.is_offline());
                *anonymous += listed - entries.len();
            }
        }

        log::debug!(
            "listing {} of {count} users on page {page} of `{set}`",
            entries.len(),
        );

        Ok(Page {
            set,
            section: query
                .get(SECTION_PARAM)
                .unwrap_or(DEFAULT_SECTION)
                .to_owned(),
            users: entries,
            count,
            pagination: Pagination::new(
                page.get(),
                pagination::page_count(count, page_size),
                &query,
            ),
            anonymous_user_count,
            capabilities,
            is_admin_or_global_mod: capabilities.is_admin_or_global_mod(),
        })
    }
}

/// Error of [`Directory`] [`Query`] execution.
#[derive(Debug, Display, Error, From)]
pub enum ExecutionError {
    /// [`Database`] error.
    ///
    /// [`Database`]: crate::infra::Database
    #[display("`Database` operation failed: {_0}")]
    Db(database::Error),

    /// Requested ranking [`Set`] is unknown.
    #[display("Invalid ranking set: {_0}")]
    InvalidSet(InvalidSet),
}

#[cfg(test)]
mod spec {
    use std::{num::NonZeroUsize, time::Duration};

    use common::{operations::Insert, pagination, DateTime};

    use crate::{
        domain::{
            user::{self, JoinDateTime, Privilege},
            User,
        },
        infra::{Database as _, Memory},
        query::directory::{Directory, ExecutionError, OnlineCount},
        read::{
            ranking::{Score, Scored, Set},
            user::{directory::Page, GuestCount},
        },
        Query as _, Service,
    };

    fn user(id: i64, joined_secs: i64) -> User {
        User {
            id: user::Id::from(id),
            username: user::Name::new(format!("user{id}")).unwrap(),
            email: user::Email::new(format!("user{id}@example.com")),
            joined_at: JoinDateTime::from_unix_timestamp(joined_secs).unwrap(),
            post_count: 0,
            reputation: 0,
            follower_count: 0,
            status: None,
            banned: false,
            flagged: false,
        }
    }

    fn service(db: Memory, page_size: usize) -> Service<Memory> {
        let mut service = Service::with_database(db);
        service.config.directory.page_size =
            NonZeroUsize::new(page_size).unwrap();
        service
    }

    fn directory(set: &str, viewer: Option<i64>, page: usize) -> Directory {
        Directory {
            set: set.into(),
            viewer: viewer.map(user::Id::from),
            query: pagination::Query::new([("page", page.to_string())]),
        }
    }

    fn ids(page: &Page) -> Vec<i64> {
        page.users.iter().map(|e| e.id().into()).collect()
    }

    #[tokio::test]
    async fn lists_second_page_by_join_date() {
        let db = Memory::new();
        for id in 1..=45 {
            db.execute(Insert(user(id, 1_000 + id))).await.unwrap();
        }
        let service = service(db, 20);

        let page = service
            .execute(directory("joindate", None, 2))
            .await
            .unwrap();

        assert_eq!(page.users.len(), 20);
        assert_eq!(ids(&page), (6..=25).rev().collect::<Vec<_>>());
        assert_eq!(page.count, 45);
        assert_eq!(page.pagination.page_count, 3);
        assert_eq!(page.pagination.current_page, 2);
        assert_eq!(page.anonymous_user_count, None);
    }

    #[tokio::test]
    async fn ranks_by_followers_keeping_join_order() {
        let db = Memory::new();
        for (id, followers) in [(1, 5), (2, 0), (3, 5)] {
            db.execute(Insert(User {
                follower_count: followers,
                ..user(id, 1_000 + id)
            }))
            .await
            .unwrap();
        }
        let service = service(db, 2);

        let first = service
            .execute(directory("followerCount", None, 1))
            .await
            .unwrap();
        assert_eq!(ids(&first), [1, 3]);
        assert_eq!(first.count, 3);

        let second = service
            .execute(directory("users:followerCount", None, 2))
            .await
            .unwrap();
        assert_eq!(ids(&second), [2]);
    }

    async fn online_population() -> Memory {
        let db = Memory::new();
        let now = DateTime::now().unix_timestamp_millis();
        for id in 1..=7 {
            let status = match id {
                4 | 5 => Some(user::Status::Offline),
                1 => Some(user::Status::Away),
                _ => None,
            };
            db.execute(Insert(User {
                status,
                ..user(id, 1_000 + id)
            }))
            .await
            .unwrap();
            // Users 6 and 7 were active long ago.
            let seen = if id > 5 { now - 2 * 86_400_000 } else { now - id };
            db.execute(Insert((
                Set::Online,
                Scored {
                    id: user::Id::from(id),
                    score: Score::from(seen),
                },
            )))
            .await
            .unwrap();
        }
        db.execute(Insert(GuestCount::from(2))).await.unwrap();
        db
    }

    #[tokio::test]
    async fn hides_offline_users_from_regular_viewers() {
        let service = service(online_population().await, 20);

        let page = service
            .execute(directory("online", Some(5), 1))
            .await
            .unwrap();

        assert_eq!(ids(&page), [1, 2, 3, 5]);
        assert_eq!(page.anonymous_user_count, Some(3));
        assert_eq!(page.count, 7);
        assert_eq!(page.users[0].user_status, user::Status::Away);
        assert_eq!(page.users[1].user_status, user::Status::Online);
        assert!(page.users.iter().all(|e| e.last_online.is_some()));
        assert!(!page.is_admin_or_global_mod);
    }

    #[tokio::test]
    async fn shows_offline_users_to_moderators() {
        let db = online_population().await;
        db.execute(Insert((user::Id::from(6), Privilege::GlobalModerator)))
            .await
            .unwrap();
        let service = service(db, 20);

        let page = service
            .execute(directory("online", Some(6), 1))
            .await
            .unwrap();

        assert_eq!(ids(&page), [1, 2, 3, 4, 5]);
        assert_eq!(page.anonymous_user_count, Some(2));
        assert!(page.capabilities.is_global_mod);
        assert!(page.is_admin_or_global_mod);
    }

    #[tokio::test]
    async fn counts_online_window_when_configured() {
        let mut service = service(online_population().await, 2);
        service.config.directory.online_count = OnlineCount::Window;

        let page = service
            .execute(directory("online", None, 1))
            .await
            .unwrap();

        assert_eq!(page.count, 5);
        assert_eq!(page.pagination.page_count, 3);
        assert!(page.users.len() <= 2);
    }

    #[tokio::test]
    async fn pages_online_window_by_offset() {
        let db = online_population().await;
        db.execute(Insert((user::Id::from(6), Privilege::GlobalModerator)))
            .await
            .unwrap();
        let service = service(db, 2);

        let page = service
            .execute(directory("online", Some(6), 2))
            .await
            .unwrap();

        assert_eq!(ids(&page), [3, 4]);
        assert_eq!(page.count, 7);
        assert_eq!(page.pagination.page_count, 4);
        assert_eq!(page.pagination.current_page, 2);
    }

    #[tokio::test]
    async fn unbounded_online_window_lists_everyone() {
        let mut service = service(online_population().await, 20);
        service.config.directory.online_window = Duration::MAX;
        service.config.directory.online_count = OnlineCount::Window;

        let page = service
            .execute(directory("online", None, 1))
            .await
            .unwrap();

        assert_eq!(page.count, 7);
        assert_eq!(page.users.len(), 5);
        assert!(ids(&page).contains(&6));
        assert!(ids(&page).contains(&7));
        assert_eq!(page.anonymous_user_count, Some(4));
    }

    #[tokio::test]
    async fn far_pages_are_empty() {
        let db = Memory::new();
        db.execute(Insert(user(1, 1_000))).await.unwrap();
        let service = service(db, 20);

        for set in Set::ALL {
            for page in [usize::MAX, 400_000_000_000_000_000] {
                let page = service
                    .execute(directory(set.key(), None, page))
                    .await
                    .unwrap();

                assert!(page.users.is_empty(), "{set} must have no users");
                assert_eq!(page.pagination.page_count, 1);
                assert!(!page.pagination.has_next);
            }
        }
    }

    #[tokio::test]
    async fn drops_missing_records() {
        let db = Memory::new();
        db.execute(Insert(user(1, 1_000))).await.unwrap();
        db.execute(Insert((
            Set::PostCount,
            Scored {
                id: user::Id::from(99),
                score: Score::from(10),
            },
        )))
        .await
        .unwrap();
        let service = service(db, 20);

        let page = service
            .execute(directory("postcount", None, 1))
            .await
            .unwrap();

        assert_eq!(ids(&page), [1]);
        assert_eq!(page.count, 2);
    }

    #[tokio::test]
    async fn discloses_email_only_to_its_owner() {
        let db = Memory::new();
        for id in 1..=2 {
            db.execute(Insert(user(id, 1_000 + id))).await.unwrap();
        }
        let service = service(db, 20);

        let page = service
            .execute(directory("joindate", Some(1), 1))
            .await
            .unwrap();

        assert!(page.users[0].user.email.is_none());
        assert!(page.users[1].user.email.is_some());
    }

    #[tokio::test]
    async fn empty_set_has_single_page() {
        let service = service(Memory::new(), 20);

        let page = service
            .execute(directory("reputation", None, 1))
            .await
            .unwrap();

        assert!(page.users.is_empty());
        assert_eq!(page.count, 0);
        assert_eq!(page.pagination.page_count, 1);
    }

    #[tokio::test]
    async fn pages_stay_bounded_for_every_set() {
        let db = Memory::new();
        for id in 1..=13 {
            db.execute(Insert(User {
                follower_count: id % 4,
                post_count: id * 3 % 7,
                banned: id % 2 == 0,
                flagged: id % 3 == 0,
                ..user(id, 1_000 + id)
            }))
            .await
            .unwrap();
        }
        let service = service(db, 5);

        for set in Set::ALL {
            for page in 1..=4 {
                let page = service
                    .execute(directory(set.key(), None, page))
                    .await
                    .unwrap();
                assert!(page.users.len() <= 5, "{set}: too many users");
                assert!(page.users.len() <= page.count, "{set}: above count");
            }
        }
    }

    #[tokio::test]
    async fn repeated_queries_are_identical() {
        let db = Memory::new();
        for id in 1..=10 {
            db.execute(Insert(User {
                follower_count: id % 3,
                ..user(id, 1_000 + id)
            }))
            .await
            .unwrap();
        }
        let service = service(db, 4);

        for set in ["joindate", "followerCount", "postcount"] {
            let first = service.execute(directory(set, Some(2), 2)).await;
            let second = service.execute(directory(set, Some(2), 2)).await;
            assert_eq!(first.unwrap(), second.unwrap());
        }
    }

    #[tokio::test]
    async fn rejects_unknown_set() {
        let service = service(Memory::new(), 20);

        let err = service
            .execute(directory("users:karma", None, 1))
            .await
            .unwrap_err();

        assert!(matches!(err.as_ref(), ExecutionError::InvalidSet(_)));
    }
}
