//! Ranked sets of [`User`]s.
//!
//! [`User`]: crate::domain::User

use std::{fmt, str::FromStr};

use derive_more::{Display, Error, From, Into};
use serde::Serialize;

use crate::domain::user;

/// Named ordering over [`user::Id`]s.
#[derive(Clone, Copy, Debug, Display, Eq, Hash, PartialEq, Serialize)]
pub enum Set {
    /// Users ordered by their join date.
    #[display("joindate")]
    #[serde(rename = "joindate")]
    JoinDate,

    /// Users ordered by the number of posts they made.
    #[display("postcount")]
    #[serde(rename = "postcount")]
    PostCount,

    /// Users ordered by their reputation.
    #[display("reputation")]
    #[serde(rename = "reputation")]
    Reputation,

    /// Banned users, most recently banned first.
    #[display("banned")]
    #[serde(rename = "banned")]
    Banned,

    /// Flagged users, most flagged first.
    #[display("flags")]
    #[serde(rename = "flags")]
    Flagged,

    /// Users ordered by their last activity.
    #[display("online")]
    #[serde(rename = "online")]
    Online,

    /// Users ordered by the number of their followers.
    #[display("followerCount")]
    #[serde(rename = "followerCount")]
    FollowerCount,
}

impl Set {
    /// All the known [`Set`]s.
    pub const ALL: [Self; 7] = [
        Self::JoinDate,
        Self::PostCount,
        Self::Reputation,
        Self::Banned,
        Self::Flagged,
        Self::Online,
        Self::FollowerCount,
    ];

    /// Prefix of every [`Set`] storage key.
    const KEY_PREFIX: &'static str = "users:";

    /// Returns the storage key of this [`Set`].
    #[must_use]
    pub const fn key(self) -> &'static str {
        match self {
            Self::JoinDate => "users:joindate",
            Self::PostCount => "users:postcount",
            Self::Reputation => "users:reputation",
            Self::Banned => "users:banned",
            Self::Flagged => "users:flags",
            Self::Online => "users:online",
            Self::FollowerCount => "users:followerCount",
        }
    }

    /// Indicates whether this [`Set`] is backed by a persistent index.
    ///
    /// Follower counts are never indexed, so the set has to be derived from
    /// the whole population on every request.
    #[must_use]
    pub const fn is_indexed(self) -> bool {
        !matches!(self, Self::FollowerCount)
    }
}

impl FromStr for Set {
    type Err = InvalidSet;

    /// Parses a [`Set`] from either its name (`joindate`) or its storage key
    /// (`users:joindate`).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let name = s.strip_prefix(Self::KEY_PREFIX).unwrap_or(s);
        Self::ALL
            .into_iter()
            .find(|set| set.to_string() == name)
            .ok_or_else(|| InvalidSet(s.to_owned()))
    }
}

/// Error of parsing an unknown [`Set`].
#[derive(Clone, Debug, Display, Eq, Error, PartialEq)]
#[display("`{_0}` is not a known ranking set")]
pub struct InvalidSet(#[error(not(source))] pub String);

/// Score of a [`user::Id`] inside a [`Set`].
#[derive(
    Clone, Copy, Debug, Display, Eq, From, Hash, Into, Ord, PartialEq, PartialOrd,
)]
pub struct Score(i64);

/// Direction a [`Set`] is read in.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum Order {
    /// Lowest score first.
    Ascending,

    /// Highest score first.
    Descending,
}

impl Order {
    /// Returns SQL keyword representing this [`Order`].
    #[must_use]
    pub const fn sql(self) -> &'static str {
        match self {
            Self::Ascending => "ASC",
            Self::Descending => "DESC",
        }
    }
}

/// Range of a [`Set`] selected by rank.
///
/// Both bounds are inclusive.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Range {
    /// [`Set`] to read.
    pub set: Set,

    /// [`Order`] the ranks are counted in.
    pub order: Order,

    /// Rank of the first [`user::Id`] to return.
    pub start: usize,

    /// Rank of the last [`user::Id`] to return, or [`None`] to read till the
    /// end of the [`Set`].
    pub stop: Option<usize>,
}

impl Range {
    /// Returns the number of [`user::Id`]s this [`Range`] may contain, or
    /// [`None`] if it's unbounded.
    #[must_use]
    pub fn limit(&self) -> Option<usize> {
        self.stop.map(|stop| {
            stop.checked_sub(self.start)
                .map_or(0, |d| d.saturating_add(1))
        })
    }
}

/// Range of a [`Set`] selected by score, highest score first.
///
/// Both score bounds are inclusive.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct ScoreRange {
    /// [`Set`] to read.
    pub set: Set,

    /// Number of matching entries to skip.
    pub offset: usize,

    /// Maximum number of entries to return, or [`None`] for all of them.
    pub limit: Option<usize>,

    /// Highest [`Score`] to include, or [`None`] for no upper bound.
    pub max: Option<Score>,

    /// Lowest [`Score`] to include.
    pub min: Score,
}

impl ScoreRange {
    /// Indicates whether the provided [`Score`] falls into this
    /// [`ScoreRange`].
    #[must_use]
    pub fn contains(&self, score: Score) -> bool {
        score >= self.min && self.max.map_or(true, |max| score <= max)
    }
}

/// Number of members in a [`Set`] (or a part of it).
#[derive(
    Clone, Copy, Debug, Default, Display, Eq, From, Hash, Into, PartialEq,
)]
pub struct Count(usize);

/// [`user::Id`] along with its [`Score`].
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Scored {
    /// ID of the [`User`].
    ///
    /// [`User`]: crate::domain::User
    pub id: user::Id,

    /// [`Score`] of the [`User`] in the [`Set`].
    ///
    /// [`User`]: crate::domain::User
    pub score: Score,
}

impl fmt::Display for Scored {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.id, self.score)
    }
}

#[cfg(test)]
mod spec {
    use super::{Order, Range, Score, ScoreRange, Set};

    #[test]
    fn parses_names_and_keys() {
        for set in Set::ALL {
            assert_eq!(set.to_string().parse::<Set>(), Ok(set));
            assert_eq!(set.key().parse::<Set>(), Ok(set));
        }
        assert_eq!("users:flags".parse::<Set>(), Ok(Set::Flagged));
        assert_eq!("followerCount".parse::<Set>(), Ok(Set::FollowerCount));
        assert!("users:unknown".parse::<Set>().is_err());
        assert!("sort-posts".parse::<Set>().is_err());
        assert!("".parse::<Set>().is_err());
    }

    #[test]
    fn follower_count_is_not_indexed() {
        assert!(!Set::FollowerCount.is_indexed());
        assert!(Set::ALL
            .into_iter()
            .filter(|s| *s != Set::FollowerCount)
            .all(Set::is_indexed));
    }

    #[test]
    fn range_limit() {
        let range = |start, stop| Range {
            set: Set::Online,
            order: Order::Descending,
            start,
            stop,
        };

        assert_eq!(range(0, Some(19)).limit(), Some(20));
        assert_eq!(range(20, Some(39)).limit(), Some(20));
        assert_eq!(range(5, None).limit(), None);
        assert_eq!(range(3, Some(1)).limit(), Some(0));
        assert_eq!(range(usize::MAX, Some(usize::MAX)).limit(), Some(1));
        assert_eq!(range(0, Some(usize::MAX)).limit(), Some(usize::MAX));
    }

    #[test]
    fn score_range_bounds() {
        let range = ScoreRange {
            set: Set::Online,
            offset: 0,
            limit: None,
            max: None,
            min: Score::from(100),
        };

        assert!(range.contains(Score::from(100)));
        assert!(range.contains(Score::from(i64::MAX)));
        assert!(!range.contains(Score::from(99)));

        let bounded = ScoreRange {
            max: Some(Score::from(200)),
            ..range
        };
        assert!(bounded.contains(Score::from(200)));
        assert!(!bounded.contains(Score::from(201)));
    }
}
