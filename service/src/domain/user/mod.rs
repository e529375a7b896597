//! [`User`] definitions.

pub mod session;

#[cfg(doc)]
use common::DateTime;
use common::{define_kind, unit, DateTimeOf};
use derive_more::{AsRef, Display, From, FromStr, Into};
#[cfg(feature = "postgres")]
use postgres_types::{FromSql, ToSql};
use serde::{Deserialize, Serialize};

pub use self::session::Session;

/// Platform user, as seen by the user directory.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    /// ID of this [`User`].
    #[serde(rename = "uid")]
    pub id: Id,

    /// [`Name`] of this [`User`].
    pub username: Name,

    /// [`Email`] of this [`User`].
    ///
    /// Only disclosed to the [`User`] itself.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<Email>,

    /// [`DateTime`] when this [`User`] joined.
    #[serde(
        rename = "joindate",
        with = "common::datetime::serde::unix_timestamp_millis"
    )]
    pub joined_at: JoinDateTime,

    /// Number of posts made by this [`User`].
    #[serde(rename = "postcount")]
    pub post_count: i64,

    /// Reputation of this [`User`].
    pub reputation: i64,

    /// Number of other [`User`]s following this [`User`].
    pub follower_count: i64,

    /// [`Status`] this [`User`] has chosen, if any.
    pub status: Option<Status>,

    /// Indicator whether this [`User`] is banned.
    pub banned: bool,

    /// Indicator whether this [`User`] has been flagged by others.
    pub flagged: bool,
}

impl User {
    /// Returns a copy of this [`User`] with the fields the `viewer` is not
    /// allowed to see removed.
    #[must_use]
    pub fn seen_by(mut self, viewer: Option<Id>) -> Self {
        if viewer != Some(self.id) {
            self.email = None;
        }
        self
    }
}

/// ID of a [`User`].
#[derive(
    Clone,
    Copy,
    Debug,
    Default,
    Deserialize,
    Display,
    Eq,
    From,
    FromStr,
    Hash,
    Into,
    Ord,
    PartialEq,
    PartialOrd,
    Serialize,
)]
#[cfg_attr(feature = "postgres", derive(ToSql, FromSql), postgres(transparent))]
pub struct Id(i64);

impl Id {
    /// Indicates whether this [`Id`] may identify an existing [`User`].
    ///
    /// Non-positive IDs are reserved for guests and never stored.
    #[must_use]
    pub const fn is_valid(self) -> bool {
        self.0 > 0
    }
}

/// Name of a [`User`].
#[derive(AsRef, Clone, Debug, Display, Eq, PartialEq, Serialize)]
#[as_ref(str, String)]
#[cfg_attr(feature = "postgres", derive(FromSql, ToSql), postgres(transparent))]
pub struct Name(String);

impl Name {
    /// Maximum length of a [`Name`] in bytes.
    const MAX_LEN: usize = 64;

    /// Creates a new [`Name`] if the given `name` is valid.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Option<Self> {
        let name = name.into();
        Self::check(&name).then_some(Self(name))
    }

    /// Checks whether the given `name` is a valid [`Name`].
    fn check(name: impl AsRef<str>) -> bool {
        let name = name.as_ref();
        name.trim() == name && !name.is_empty() && name.len() <= Self::MAX_LEN
    }
}

impl std::str::FromStr for Name {
    type Err = &'static str;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s).ok_or("invalid `Name`")
    }
}

/// Email address of a [`User`].
#[derive(AsRef, Clone, Debug, Display, Eq, PartialEq, Serialize)]
#[as_ref(str, String)]
#[cfg_attr(feature = "postgres", derive(FromSql, ToSql), postgres(transparent))]
pub struct Email(String);

impl Email {
    /// Creates a new [`Email`] if the given `address` looks like one.
    #[must_use]
    pub fn new(address: impl Into<String>) -> Option<Self> {
        let address = address.into();
        Self::check(&address).then_some(Self(address))
    }

    /// Checks whether the given `address` is a plausible [`Email`].
    fn check(address: impl AsRef<str>) -> bool {
        let address = address.as_ref();
        matches!(
            address.split_once('@'),
            Some((local, domain))
                if !local.is_empty()
                    && !domain.is_empty()
                    && !domain.contains('@')
                    && !address.contains(char::is_whitespace)
        )
    }
}

impl std::str::FromStr for Email {
    type Err = &'static str;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s).ok_or("invalid `Email`")
    }
}

define_kind! {
    #[doc = "Presence status of a `User`."]
    enum Status {
        #[doc = "Active right now."]
        Online = 1,

        #[doc = "Away from keyboard."]
        Away = 2,

        #[doc = "Do not disturb."]
        Dnd = 3,

        #[doc = "Online, but shown as offline to others."]
        Invisible = 4,

        #[doc = "Not active."]
        Offline = 5,
    }
}

define_kind! {
    #[doc = "Global capability a `User` may hold."]
    enum Privilege {
        #[doc = "Full administrative access."]
        Administrator = 1,

        #[doc = "Moderation across all categories."]
        GlobalModerator = 2,

        #[doc = "Access to the user search."]
        SearchUsers = 3,
    }
}

/// [`DateTime`] when a [`User`] joined.
pub type JoinDateTime = DateTimeOf<(User, unit::Join)>;

/// [`DateTime`] when a [`User`] was last seen online.
pub type LastOnlineDateTime = DateTimeOf<(User, unit::LastOnline)>;

#[cfg(test)]
mod spec {
    use super::{Email, Id, Name, Privilege, Status};

    #[test]
    fn validates_ids() {
        assert!(Id::from(1).is_valid());
        assert!(!Id::from(0).is_valid());
        assert!(!Id::from(-4).is_valid());
    }

    #[test]
    fn validates_names() {
        assert!(Name::new("alice").is_some());
        assert!(Name::new("").is_none());
        assert!(Name::new(" alice").is_none());
        assert!(Name::new("a".repeat(65)).is_none());
    }

    #[test]
    fn validates_emails() {
        assert!(Email::new("alice@example.com").is_some());
        assert!(Email::new("alice").is_none());
        assert!(Email::new("@example.com").is_none());
        assert!(Email::new("a@b@c").is_none());
        assert!(Email::new("al ice@example.com").is_none());
    }

    #[test]
    fn kinds_use_snake_case() {
        assert_eq!(Status::Dnd.to_string(), "dnd");
        assert_eq!("offline".parse::<Status>().unwrap(), Status::Offline);
        assert_eq!(Privilege::GlobalModerator.to_string(), "global_moderator");
        assert_eq!(Status::ALL.len(), 5);
    }
}
