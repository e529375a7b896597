//! In-memory [`Database`] implementation.

use std::{
    collections::{BTreeSet, HashMap, HashSet},
    sync::Arc,
};

use common::operations::{By, Insert, Select};
use tokio::sync::RwLock;
use tracerr::Traced;

use crate::{
    domain::{
        user::{self, Privilege},
        User,
    },
    infra::{database, Database},
    read::{
        self,
        ranking::{self, Order, Score, Scored},
    },
};

/// In-memory [`Database`] client.
///
/// Clones share the same underlying data.
#[derive(Clone, Debug)]
pub struct Memory(Arc<RwLock<State>>);

impl Memory {
    /// Creates a new [`Memory`] database with all the indexed
    /// [`ranking::Set`]s present and empty.
    #[must_use]
    pub fn new() -> Self {
        let sets = ranking::Set::ALL
            .into_iter()
            .filter(|s| s.is_indexed())
            .map(|s| (s, SortedSet::default()))
            .collect();
        Self(Arc::new(RwLock::new(State {
            sets,
            ..State::default()
        })))
    }
}

impl Default for Memory {
    fn default() -> Self {
        Self::new()
    }
}

/// Data stored in a [`Memory`] database.
#[derive(Debug, Default)]
struct State {
    /// Stored [`User`]s.
    users: HashMap<user::Id, User>,

    /// Indexed [`ranking::Set`]s.
    sets: HashMap<ranking::Set, SortedSet>,

    /// Granted [`Privilege`]s.
    privileges: HashSet<(user::Id, Privilege)>,

    /// Number of active guest sessions.
    guests: usize,
}

impl State {
    /// Returns the index of the provided [`ranking::Set`].
    fn set(
        &self,
        set: ranking::Set,
    ) -> Result<&SortedSet, Traced<database::Error>> {
        self.sets
            .get(&set)
            .ok_or_else(|| tracerr::new!(database::Error::NotFound(set)))
    }

    /// Returns the index of the provided [`ranking::Set`] for modification,
    /// creating it if it's indexable.
    fn set_mut(
        &mut self,
        set: ranking::Set,
    ) -> Result<&mut SortedSet, Traced<database::Error>> {
        if !set.is_indexed() {
            return Err(tracerr::new!(database::Error::NotFound(set)));
        }
        Ok(self.sets.entry(set).or_default())
    }
}

/// Set of [`user::Id`]s ordered by their [`Score`]s.
///
/// Equal [`Score`]s are ordered by [`user::Id`].
#[derive(Debug, Default)]
struct SortedSet {
    /// Current [`Score`] of every member.
    scores: HashMap<user::Id, Score>,

    /// Members in ascending order.
    ordered: BTreeSet<(Score, user::Id)>,
}

impl SortedSet {
    /// Adds the provided member, replacing its previous [`Score`], if any.
    fn insert(&mut self, id: user::Id, score: Score) {
        if let Some(prev) = self.scores.insert(id, score) {
            _ = self.ordered.remove(&(prev, id));
        }
        _ = self.ordered.insert((score, id));
    }

    /// Removes the provided member, if present.
    fn remove(&mut self, id: user::Id) {
        if let Some(prev) = self.scores.remove(&id) {
            _ = self.ordered.remove(&(prev, id));
        }
    }

    /// Returns the number of members.
    fn len(&self) -> usize {
        self.ordered.len()
    }

    /// Returns members in the provided [`Order`].
    fn iter(
        &self,
        order: Order,
    ) -> Box<dyn Iterator<Item = (Score, user::Id)> + '_> {
        let iter = self.ordered.iter().copied();
        match order {
            Order::Ascending => Box::new(iter),
            Order::Descending => Box::new(iter.rev()),
        }
    }
}

impl Database<Select<By<Vec<user::Id>, ranking::Range>>> for Memory {
    type Ok = Vec<user::Id>;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Select(by): Select<By<Vec<user::Id>, ranking::Range>>,
    ) -> Result<Self::Ok, Self::Err> {
        let range = by.into_inner();
        let state = self.0.read().await;
        let set = state.set(range.set).map_err(tracerr::wrap!())?;
        Ok(set
            .iter(range.order)
            .skip(range.start)
            .take(range.limit().unwrap_or(usize::MAX))
            .map(|(_, id)| id)
            .collect())
    }
}

impl Database<Select<By<Vec<Scored>, ranking::ScoreRange>>> for Memory {
    type Ok = Vec<Scored>;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Select(by): Select<By<Vec<Scored>, ranking::ScoreRange>>,
    ) -> Result<Self::Ok, Self::Err> {
        let range = by.into_inner();
        let state = self.0.read().await;
        let set = state.set(range.set).map_err(tracerr::wrap!())?;
        Ok(set
            .iter(Order::Descending)
            .filter(|(score, _)| range.contains(*score))
            .skip(range.offset)
            .take(range.limit.unwrap_or(usize::MAX))
            .map(|(score, id)| Scored { id, score })
            .collect())
    }
}

impl Database<Select<By<ranking::Count, ranking::Set>>> for Memory {
    type Ok = ranking::Count;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Select(by): Select<By<ranking::Count, ranking::Set>>,
    ) -> Result<Self::Ok, Self::Err> {
        let state = self.0.read().await;
        Ok(state
            .set(by.into_inner())
            .map_err(tracerr::wrap!())?
            .len()
            .into())
    }
}

impl Database<Select<By<ranking::Count, ranking::ScoreRange>>> for Memory {
    type Ok = ranking::Count;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Select(by): Select<By<ranking::Count, ranking::ScoreRange>>,
    ) -> Result<Self::Ok, Self::Err> {
        let range = by.into_inner();
        let state = self.0.read().await;
        let set = state.set(range.set).map_err(tracerr::wrap!())?;
        Ok(set
            .iter(Order::Descending)
            .filter(|(score, _)| range.contains(*score))
            .count()
            .into())
    }
}

impl Database<Select<By<Vec<Option<User>>, read::user::Hydrate>>> for Memory {
    type Ok = Vec<Option<User>>;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Select(by): Select<By<Vec<Option<User>>, read::user::Hydrate>>,
    ) -> Result<Self::Ok, Self::Err> {
        let read::user::Hydrate { ids, viewer } = by.into_inner();
        let state = self.0.read().await;
        Ok(ids
            .iter()
            .map(|id| state.users.get(id).cloned().map(|u| u.seen_by(viewer)))
            .collect())
    }
}

impl Database<Select<By<read::user::LiveStatuses, Vec<user::Id>>>>
    for Memory
{
    type Ok = read::user::LiveStatuses;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Select(by): Select<By<read::user::LiveStatuses, Vec<user::Id>>>,
    ) -> Result<Self::Ok, Self::Err> {
        let ids = by.into_inner();
        let state = self.0.read().await;
        Ok(ids
            .iter()
            .map(|id| state.users.get(id).and_then(|u| u.status))
            .collect())
    }
}

impl Database<Select<By<Option<User>, user::Id>>> for Memory {
    type Ok = Option<User>;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Select(by): Select<By<Option<User>, user::Id>>,
    ) -> Result<Self::Ok, Self::Err> {
        Ok(self.0.read().await.users.get(&by.into_inner()).cloned())
    }
}

impl Database<Select<By<bool, (user::Id, Privilege)>>> for Memory {
    type Ok = bool;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Select(by): Select<By<bool, (user::Id, Privilege)>>,
    ) -> Result<Self::Ok, Self::Err> {
        Ok(self.0.read().await.privileges.contains(by.as_inner()))
    }
}

impl Database<Select<By<read::user::TotalCount, ()>>> for Memory {
    type Ok = read::user::TotalCount;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        _: Select<By<read::user::TotalCount, ()>>,
    ) -> Result<Self::Ok, Self::Err> {
        Ok(self.0.read().await.users.len().into())
    }
}

impl Database<Select<By<read::user::GuestCount, ()>>> for Memory {
    type Ok = read::user::GuestCount;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        _: Select<By<read::user::GuestCount, ()>>,
    ) -> Result<Self::Ok, Self::Err> {
        Ok(self.0.read().await.guests.into())
    }
}

impl Database<Insert<User>> for Memory {
    type Ok = ();
    type Err = Traced<database::Error>;

    /// Stores the provided [`User`] and keeps the indexed
    /// [`ranking::Set`]s derived from its fields up to date.
    async fn execute(
        &self,
        Insert(user): Insert<User>,
    ) -> Result<Self::Ok, Self::Err> {
        use ranking::Set as S;

        let mut state = self.0.write().await;
        let id = user.id;

        let joined = Score::from(user.joined_at.unix_timestamp_millis());
        for (set, score) in [
            (S::JoinDate, Some(joined)),
            (S::PostCount, Some(Score::from(user.post_count))),
            (S::Reputation, Some(Score::from(user.reputation))),
            (S::Banned, user.banned.then_some(joined)),
            (S::Flagged, user.flagged.then_some(Score::from(1))),
        ] {
            let index = state.set_mut(set).map_err(tracerr::wrap!())?;
            match score {
                Some(score) => index.insert(id, score),
                None => index.remove(id),
            }
        }

        drop(state.users.insert(id, user));
        Ok(())
    }
}

impl Database<Insert<(ranking::Set, Scored)>> for Memory {
    type Ok = ();
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Insert((set, member)): Insert<(ranking::Set, Scored)>,
    ) -> Result<Self::Ok, Self::Err> {
        self.0
            .write()
            .await
            .set_mut(set)
            .map_err(tracerr::wrap!())?
            .insert(member.id, member.score);
        Ok(())
    }
}

impl Database<Insert<(user::Id, Privilege)>> for Memory {
    type Ok = ();
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Insert(grant): Insert<(user::Id, Privilege)>,
    ) -> Result<Self::Ok, Self::Err> {
        _ = self.0.write().await.privileges.insert(grant);
        Ok(())
    }
}

impl Database<Insert<read::user::GuestCount>> for Memory {
    type Ok = ();
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Insert(count): Insert<read::user::GuestCount>,
    ) -> Result<Self::Ok, Self::Err> {
        self.0.write().await.guests = count.into();
        Ok(())
    }
}

#[cfg(test)]
mod spec {
    use common::operations::{By, Insert, Select};

    use crate::{
        domain::user,
        infra::{database, Database as _},
        read::ranking::{self, Order, Score, Scored},
    };

    use super::Memory;

    async fn seeded() -> Memory {
        let db = Memory::new();
        for (id, score) in [(1, 10), (2, 30), (3, 20), (4, 30)] {
            db.execute(Insert((
                ranking::Set::Online,
                Scored {
                    id: user::Id::from(id),
                    score: Score::from(score),
                },
            )))
            .await
            .unwrap();
        }
        db
    }

    fn ids(raw: &[i64]) -> Vec<user::Id> {
        raw.iter().copied().map(user::Id::from).collect()
    }

    #[tokio::test]
    async fn ranges_by_rank() {
        let db = seeded().await;
        let range = |order, start, stop| {
            Select(By::<Vec<user::Id>, _>::new(ranking::Range {
                set: ranking::Set::Online,
                order,
                start,
                stop,
            }))
        };

        let desc = db.execute(range(Order::Descending, 0, None)).await.unwrap();
        assert_eq!(desc, ids(&[4, 2, 3, 1]));

        let asc = db.execute(range(Order::Ascending, 1, Some(2))).await.unwrap();
        assert_eq!(asc, ids(&[3, 2]));

        let empty = db.execute(range(Order::Ascending, 3, Some(1))).await;
        assert_eq!(empty.unwrap(), ids(&[]));
    }

    #[tokio::test]
    async fn ranges_by_score() {
        let db = seeded().await;

        let scored = db
            .execute(Select(By::<Vec<Scored>, _>::new(ranking::ScoreRange {
                set: ranking::Set::Online,
                offset: 1,
                limit: None,
                max: None,
                min: Score::from(20),
            })))
            .await
            .unwrap();
        assert_eq!(
            scored.iter().map(|s| s.id).collect::<Vec<_>>(),
            ids(&[2, 3]),
        );
        assert_eq!(scored[1].score, Score::from(20));

        let count = db
            .execute(Select(By::<ranking::Count, _>::new(
                ranking::ScoreRange {
                    set: ranking::Set::Online,
                    offset: 0,
                    limit: None,
                    max: Some(Score::from(25)),
                    min: Score::from(0),
                },
            )))
            .await
            .unwrap();
        assert_eq!(usize::from(count), 2);
    }

    #[tokio::test]
    async fn reinsertion_replaces_score() {
        let db = seeded().await;
        db.execute(Insert((
            ranking::Set::Online,
            Scored {
                id: user::Id::from(1),
                score: Score::from(100),
            },
        )))
        .await
        .unwrap();

        let count = db
            .execute(Select(By::<ranking::Count, _>::new(ranking::Set::Online)))
            .await
            .unwrap();
        assert_eq!(usize::from(count), 4);

        let top = db
            .execute(Select(By::<Vec<user::Id>, _>::new(ranking::Range {
                set: ranking::Set::Online,
                order: Order::Descending,
                start: 0,
                stop: Some(0),
            })))
            .await
            .unwrap();
        assert_eq!(top, ids(&[1]));
    }

    #[tokio::test]
    async fn missing_index_is_not_found() {
        let db = Memory::new();

        let err = db
            .execute(Select(By::<ranking::Count, _>::new(
                ranking::Set::FollowerCount,
            )))
            .await
            .unwrap_err();
        assert!(matches!(
            err.as_ref(),
            database::Error::NotFound(ranking::Set::FollowerCount),
        ));

        let err = db
            .execute(Insert((
                ranking::Set::FollowerCount,
                Scored {
                    id: user::Id::from(1),
                    score: Score::from(1),
                },
            )))
            .await
            .unwrap_err();
        assert!(matches!(err.as_ref(), database::Error::NotFound(_)));
    }
}
