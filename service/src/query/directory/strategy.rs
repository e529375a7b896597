//! Strategies of fetching a [`Window`] out of a ranking [`Set`].

use std::cmp::Reverse;

use common::{
    operations::{By, Select},
    DateTime,
};
use futures::future;
use tracerr::Traced;
use tracing as log;

use crate::{
    domain::{user, User},
    infra::{database, Database},
    query::{users, Query},
    read::{
        self,
        ranking::{self, Order, Score, Scored, Set},
        user::directory::{Entry, Fetched},
    },
    Service,
};

use super::OnlineCount;

/// Way a ranking [`Set`] is materialized.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Strategy {
    /// Rank-based range over an indexed [`Set`].
    Indexed(Set),

    /// Score-based range over [`Set::Online`], limited to the recent
    /// activity window.
    Online,

    /// Whole population ranked by follower count on demand.
    ByFollowers,
}

impl From<Set> for Strategy {
    fn from(set: Set) -> Self {
        match set {
            Set::Online => Self::Online,
            Set::FollowerCount => Self::ByFollowers,
            Set::JoinDate
            | Set::PostCount
            | Set::Reputation
            | Set::Banned
            | Set::Flagged => Self::Indexed(set),
        }
    }
}

/// Inclusive window of ranks to fetch, as seen by a viewer.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Window {
    /// [`User`] looking at the directory, or [`None`] for a guest.
    pub viewer: Option<user::Id>,

    /// Rank of the first entry to fetch.
    pub start: usize,

    /// Rank of the last entry to fetch, or [`None`] to fetch till the end.
    pub stop: Option<usize>,
}

impl Window {
    /// Returns the [`ranking::Range`] of the provided [`Set`] covering this
    /// [`Window`].
    #[must_use]
    pub fn range(&self, set: Set, order: Order) -> ranking::Range {
        ranking::Range {
            set,
            order,
            start: self.start,
            stop: self.stop,
        }
    }
}

/// [`Query`] fetching a [`Window`] with the provided [`Strategy`].
#[derive(Clone, Copy, Debug)]
pub struct FetchPage {
    /// [`Strategy`] to fetch with.
    pub strategy: Strategy,

    /// [`Window`] to fetch.
    pub window: Window,
}

impl<Db> Query<FetchPage> for Service<Db>
where
    Self: Query<Indexed, Ok = Fetched, Err = Traced<database::Error>>
        + Query<Online, Ok = Fetched, Err = Traced<database::Error>>
        + Query<ByFollowers, Ok = Fetched, Err = Traced<database::Error>>,
{
    type Ok = Fetched;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        FetchPage { strategy, window }: FetchPage,
    ) -> Result<Self::Ok, Self::Err> {
        match strategy {
            Strategy::Indexed(set) => {
                self.execute(Indexed { set, window }).await
            }
            Strategy::Online => self.execute(Online { window }).await,
            Strategy::ByFollowers => {
                self.execute(ByFollowers { window }).await
            }
        }
    }
}

/// [`Query`] fetching a [`Window`] of an indexed [`Set`], highest score
/// first.
#[derive(Clone, Copy, Debug)]
pub struct Indexed {
    /// [`Set`] to read.
    pub set: Set,

    /// [`Window`] to fetch.
    pub window: Window,
}

impl<Db> Query<Indexed> for Service<Db>
where
    Db: Database<
            Select<By<Vec<user::Id>, ranking::Range>>,
            Ok = Vec<user::Id>,
            Err = Traced<database::Error>,
        > + Database<
            Select<By<ranking::Count, Set>>,
            Ok = ranking::Count,
            Err = Traced<database::Error>,
        >,
    Self: Query<
        users::Hydrate,
        Ok = Vec<Option<User>>,
        Err = Traced<database::Error>,
    >,
{
    type Ok = Fetched;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Indexed { set, window }: Indexed,
    ) -> Result<Self::Ok, Self::Err> {
        let page = async {
            let ids = self
                .database()
                .execute(Select(By::<Vec<user::Id>, _>::new(
                    window.range(set, Order::Descending),
                )))
                .await
                .map_err(tracerr::wrap!())?;
            self.execute(users::Hydrate::by(read::user::Hydrate {
                ids,
                viewer: window.viewer,
            }))
            .await
            .map_err(tracerr::wrap!())
        };
        let count = self
            .database()
            .execute(Select(By::<ranking::Count, _>::new(set)));

        let (users, count) = future::try_join(page, count)
            .await
            .map_err(tracerr::wrap!())?;

        Ok(Fetched {
            entries: existing(users).map(Entry::new).collect(),
            count: count.into(),
        })
    }
}

/// [`Query`] fetching a [`Window`] of the [`User`]s active recently, most
/// recently active first.
#[derive(Clone, Copy, Debug)]
pub struct Online {
    /// [`Window`] to fetch.
    pub window: Window,
}

impl<Db> Query<Online> for Service<Db>
where
    Db: Database<
            Select<By<Vec<Scored>, ranking::ScoreRange>>,
            Ok = Vec<Scored>,
            Err = Traced<database::Error>,
        > + Database<
            Select<By<ranking::Count, ranking::ScoreRange>>,
            Ok = ranking::Count,
            Err = Traced<database::Error>,
        >,
    Self: Query<
            users::Hydrate,
            Ok = Vec<Option<User>>,
            Err = Traced<database::Error>,
        > + Query<
            users::LiveStatuses,
            Ok = read::user::LiveStatuses,
            Err = Traced<database::Error>,
        > + Query<
            users::TotalCount,
            Ok = read::user::TotalCount,
            Err = Traced<database::Error>,
        >,
{
    type Ok = Fetched;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Online { window }: Online,
    ) -> Result<Self::Ok, Self::Err> {
        let config = &self.config().directory;
        let since = DateTime::now()
            .checked_sub(config.online_window)
            .unwrap_or(DateTime::UNIX_EPOCH);
        let active = ranking::ScoreRange {
            set: Set::Online,
            offset: window.start,
            limit: window.range(Set::Online, Order::Descending).limit(),
            max: None,
            min: Score::from(since.unix_timestamp_millis()),
        };

        let page = async {
            let scored = self
                .database()
                .execute(Select(By::<Vec<Scored>, _>::new(active)))
                .await
                .map_err(tracerr::wrap!())?;
            let ids = scored.iter().map(|s| s.id).collect::<Vec<_>>();

            let (statuses, users) = future::try_join(
                self.execute(users::LiveStatuses::by(ids.clone())),
                self.execute(users::Hydrate::by(read::user::Hydrate {
                    ids,
                    viewer: window.viewer,
                })),
            )
            .await
            .map_err(tracerr::wrap!())?;

            let entries = users
                .into_iter()
                .zip(statuses)
                .zip(scored)
                .filter_map(|((user, status), Scored { score, .. })| {
                    let user = user.filter(|u| u.id.is_valid())?;
                    Some(Entry {
                        user_status: status.unwrap_or(user::Status::Online),
                        last_online: last_online(score),
                        user,
                    })
                })
                .collect::<Vec<_>>();
            Ok::<_, Traced<database::Error>>(entries)
        };
        let count = async {
            match config.online_count {
                OnlineCount::Global => self
                    .execute(users::TotalCount::by(()))
                    .await
                    .map(usize::from)
                    .map_err(tracerr::wrap!()),
                OnlineCount::Window => self
                    .database()
                    .execute(Select(By::<ranking::Count, _>::new(
                        ranking::ScoreRange {
                            offset: 0,
                            limit: None,
                            ..active
                        },
                    )))
                    .await
                    .map(usize::from)
                    .map_err(tracerr::wrap!()),
            }
        };

        let (entries, count) = future::try_join(page, count).await?;

        Ok(Fetched { entries, count })
    }
}

/// [`Query`] fetching a [`Window`] of all the [`User`]s ranked by their
/// follower count, most followed first.
///
/// Ties keep the join order.
#[derive(Clone, Copy, Debug)]
pub struct ByFollowers {
    /// [`Window`] to fetch.
    pub window: Window,
}

impl<Db> Query<ByFollowers> for Service<Db>
where
    Db: Database<
        Select<By<Vec<user::Id>, ranking::Range>>,
        Ok = Vec<user::Id>,
        Err = Traced<database::Error>,
    >,
    Self: Query<
            users::Hydrate,
            Ok = Vec<Option<User>>,
            Err = Traced<database::Error>,
        > + Query<
            users::TotalCount,
            Ok = read::user::TotalCount,
            Err = Traced<database::Error>,
        >,
{
    type Ok = Fetched;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        ByFollowers { window }: ByFollowers,
    ) -> Result<Self::Ok, Self::Err> {
        let everyone = async {
            let ids = self
                .database()
                .execute(Select(By::<Vec<user::Id>, _>::new(
                    ranking::Range {
                        set: Set::JoinDate,
                        order: Order::Ascending,
                        start: 0,
                        stop: None,
                    },
                )))
                .await
                .map_err(tracerr::wrap!())?;
            log::debug!("ranking {} users by follower count", ids.len());

            self.execute(users::Hydrate::by(read::user::Hydrate {
                ids,
                viewer: window.viewer,
            }))
            .await
            .map_err(tracerr::wrap!())
        };
        let count = self.execute(users::TotalCount::by(()));

        let (users, count) = future::try_join(everyone, count)
            .await
            .map_err(tracerr::wrap!())?;

        let mut users = existing(users).collect::<Vec<_>>();
        users.sort_by_key(|u| Reverse(u.follower_count.max(0)));

        Ok(Fetched {
            entries: users
                .into_iter()
                .skip(window.start)
                .take(
                    window
                        .range(Set::FollowerCount, Order::Descending)
                        .limit()
                        .unwrap_or(usize::MAX),
                )
                .map(Entry::new)
                .collect(),
            count: count.into(),
        })
    }
}

/// Interprets a [`Set::Online`] [`Score`] as a
/// [`user::LastOnlineDateTime`].
fn last_online(score: Score) -> Option<user::LastOnlineDateTime> {
    user::LastOnlineDateTime::from_unix_timestamp_millis(score.into())
}

/// Drops [`None`]s and [`User`]s with invalid IDs out of hydration results.
fn existing(users: Vec<Option<User>>) -> impl Iterator<Item = User> {
    users.into_iter().flatten().filter(|u| u.id.is_valid())
}
