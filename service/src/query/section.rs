//! [`Query`] for a page of a named user directory section.

use common::pagination;
use derive_more::{Display, Error, From};
use futures::future;
use tracerr::Traced;

use crate::{
    domain::user::{self, Privilege},
    infra::database,
    query::{
        directory::{self, Directory, DEFAULT_SECTION, SECTION_PARAM},
        user::HasPrivilege,
    },
    read::{ranking::Set, user::directory::Page},
    Service,
};

use super::Query;

/// [`Query`] for a [`Page`] of the directory section requested by the
/// `section` query parameter.
///
/// Unknown sections fall back to the [`Set::JoinDate`] one.
#[derive(Clone, Debug)]
pub struct Section {
    /// [`User`] looking at the directory, or [`None`] for a guest.
    ///
    /// [`User`]: crate::domain::User
    pub viewer: Option<user::Id>,

    /// Query string parameters of the request.
    pub query: pagination::Query,
}

impl Section {
    /// Returns the ranking [`Set`] listed in the provided section.
    #[must_use]
    pub fn set_of(section: &str) -> Set {
        match section {
            "online" => Set::Online,
            "sort-posts" => Set::PostCount,
            "sort-reputation" => Set::Reputation,
            "banned" => Set::Banned,
            "flagged" => Set::Flagged,
            "sort-followers" => Set::FollowerCount,
            _ => Set::JoinDate,
        }
    }
}

impl<Db> Query<Section> for Service<Db>
where
    Self: Query<HasPrivilege, Ok = bool, Err = Traced<database::Error>>
        + Query<
            Directory,
            Ok = Page,
            Err = Traced<directory::ExecutionError>,
        >,
{
    type Ok = Page;
    type Err = Traced<ExecutionError>;

    async fn execute(
        &self,
        Section { viewer, query }: Section,
    ) -> Result<Self::Ok, Self::Err> {
        use ExecutionError as E;

        let set =
            Section::set_of(query.get(SECTION_PARAM).unwrap_or(DEFAULT_SECTION));

        if set == Set::Reputation && self.config().directory.reputation_disabled
        {
            return Err(tracerr::new!(E::ReputationDisabled));
        }

        if matches!(set, Set::Banned | Set::Flagged) {
            let (is_admin, is_global_mod) = future::try_join(
                self.execute(HasPrivilege {
                    user: viewer,
                    privilege: Privilege::Administrator,
                }),
                self.execute(HasPrivilege {
                    user: viewer,
                    privilege: Privilege::GlobalModerator,
                }),
            )
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?;

            if !(is_admin || is_global_mod) {
                return Err(tracerr::new!(E::Unauthorized(set)));
            }
        }

        self.execute(Directory {
            set: set.key().to_owned(),
            viewer,
            query,
        })
        .await
        .map_err(tracerr::map_from_and_wrap!(=> E))
    }
}

/// Error of [`Section`] [`Query`] execution.
#[derive(Debug, Display, Error, From)]
pub enum ExecutionError {
    /// [`Database`] error.
    ///
    /// [`Database`]: crate::infra::Database
    #[display("`Database` operation failed: {_0}")]
    Db(database::Error),

    /// [`Directory`] [`Query`] error.
    #[display("Failed to list directory: {_0}")]
    Directory(directory::ExecutionError),

    /// Viewer is not allowed to list the [`Set`].
    #[display("Listing `{_0}` requires moderation privileges")]
    #[from(ignore)]
    Unauthorized(#[error(not(source))] Set),

    /// Reputation is disabled, so there is nothing to rank by.
    #[display("Reputation is disabled")]
    #[from(ignore)]
    ReputationDisabled,
}

#[cfg(test)]
mod spec {
    use std::num::NonZeroUsize;

    use common::{operations::Insert, pagination, DateTime};

    use crate::{
        domain::{
            user::{self, JoinDateTime, Privilege},
            User,
        },
        infra::{Database as _, Memory},
        read::{
            ranking::{Scored, Set},
            user::GuestCount,
        },
        Query as _, Service,
    };

    use super::{ExecutionError, Section};

    async fn seeded() -> Memory {
        let db = Memory::new();
        for id in 1..=4 {
            db.execute(Insert(User {
                id: user::Id::from(id),
                username: user::Name::new(format!("user{id}")).unwrap(),
                email: None,
                joined_at: JoinDateTime::from_unix_timestamp(1_000 + id)
                    .unwrap(),
                post_count: 10 - id,
                reputation: id,
                follower_count: 0,
                status: None,
                banned: id == 3,
                flagged: id == 4,
            }))
            .await
            .unwrap();
        }
        db.execute(Insert((user::Id::from(1), Privilege::Administrator)))
            .await
            .unwrap();
        db
    }

    fn section(name: &str, viewer: Option<i64>) -> Section {
        Section {
            viewer: viewer.map(user::Id::from),
            query: pagination::Query::new([("section", name)]),
        }
    }

    #[test]
    fn maps_sections_to_sets() {
        assert_eq!(Section::set_of("online"), Set::Online);
        assert_eq!(Section::set_of("sort-posts"), Set::PostCount);
        assert_eq!(Section::set_of("sort-reputation"), Set::Reputation);
        assert_eq!(Section::set_of("banned"), Set::Banned);
        assert_eq!(Section::set_of("flagged"), Set::Flagged);
        assert_eq!(Section::set_of("sort-followers"), Set::FollowerCount);
        assert_eq!(Section::set_of("joindate"), Set::JoinDate);
        assert_eq!(Section::set_of("whatever"), Set::JoinDate);
    }

    #[tokio::test]
    async fn falls_back_to_join_date() {
        let service = Service::with_database(seeded().await);

        let page = service
            .execute(Section {
                viewer: None,
                query: pagination::Query::default(),
            })
            .await
            .unwrap();

        assert_eq!(page.set, Set::JoinDate);
        assert_eq!(page.section, "joindate");
        assert_eq!(page.users.len(), 4);
    }

    #[tokio::test]
    async fn lists_posters() {
        let service = Service::with_database(seeded().await);

        let page = service
            .execute(section("sort-posts", None))
            .await
            .unwrap();

        assert_eq!(page.set, Set::PostCount);
        assert_eq!(page.section, "sort-posts");
        assert_eq!(page.users[0].id(), user::Id::from(1));
    }

    #[tokio::test]
    async fn guards_moderation_sections() {
        let service = Service::with_database(seeded().await);

        for name in ["banned", "flagged"] {
            for viewer in [None, Some(2)] {
                let err = service
                    .execute(section(name, viewer))
                    .await
                    .unwrap_err();
                assert!(
                    matches!(err.as_ref(), ExecutionError::Unauthorized(_)),
                    "{name} must be guarded from {viewer:?}",
                );
            }
        }

        let banned = service
            .execute(section("banned", Some(1)))
            .await
            .unwrap();
        assert_eq!(banned.users.len(), 1);
        assert_eq!(banned.users[0].id(), user::Id::from(3));
        assert!(banned.capabilities.is_admin);

        let flagged = service
            .execute(section("flagged", Some(1)))
            .await
            .unwrap();
        assert_eq!(flagged.users[0].id(), user::Id::from(4));
    }

    #[tokio::test]
    async fn hides_reputation_when_disabled() {
        let mut service = Service::with_database(seeded().await);
        service.config.directory.reputation_disabled = true;

        let err = service
            .execute(section("sort-reputation", None))
            .await
            .unwrap_err();
        assert!(matches!(err.as_ref(), ExecutionError::ReputationDisabled));

        service.config.directory.reputation_disabled = false;
        service.config.directory.page_size = NonZeroUsize::new(2).unwrap();
        let page = service
            .execute(section("sort-reputation", None))
            .await
            .unwrap();
        assert_eq!(page.users.len(), 2);
        assert_eq!(page.users[0].id(), user::Id::from(4));
        assert_eq!(page.pagination.page_count, 2);
        assert!(page.pagination.next.qs.contains("section=sort-reputation"));
    }

    #[tokio::test]
    async fn online_section_counts_guests() {
        let db = seeded().await;
        db.execute(Insert((
            Set::Online,
            Scored {
                id: user::Id::from(2),
                score: DateTime::now().unix_timestamp_millis().into(),
            },
        )))
        .await
        .unwrap();
        db.execute(Insert(GuestCount::from(5)))
            .await
            .unwrap();
        let service = Service::with_database(db);

        let page = service.execute(section("online", None)).await.unwrap();

        assert_eq!(page.set, Set::Online);
        assert_eq!(page.users.len(), 1);
        assert_eq!(page.users[0].user_status, user::Status::Online);
        assert_eq!(page.anonymous_user_count, Some(5));
    }
}
