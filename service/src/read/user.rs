//! [`User`] read model definitions.
//!
//! [`User`]: crate::domain::User

use derive_more::{Display, From, Into};

use crate::domain::user;
#[cfg(doc)]
use crate::domain::User;

/// Request to hydrate [`User`]s by their [`user::Id`]s, as seen by a viewer.
///
/// Results are returned in the order of `ids`, with [`None`] in place of
/// every [`user::Id`] not backed by a [`User`].
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Hydrate {
    /// IDs of the [`User`]s to hydrate.
    pub ids: Vec<user::Id>,

    /// [`User`] looking at the results, if not a guest.
    pub viewer: Option<user::Id>,
}

/// Live [`user::Status`] field of the provided [`User`]s.
///
/// Results are returned in the order of the requested [`user::Id`]s, with
/// [`None`] for [`User`]s who have no stored [`user::Status`] (or don't
/// exist).
pub type LiveStatuses = Vec<Option<user::Status>>;

/// Total count of registered [`User`]s.
#[derive(
    Clone, Copy, Debug, Default, Display, Eq, From, Hash, Into, PartialEq,
)]
pub struct TotalCount(usize);

/// Number of anonymous (guest) sessions currently active.
#[derive(
    Clone, Copy, Debug, Default, Display, Eq, From, Hash, Into, PartialEq,
)]
pub struct GuestCount(usize);

pub mod directory {
    //! User directory definitions.

    use common::pagination::Pagination;
    use serde::{Serialize, Serializer};

    use crate::{
        domain::{user, User},
        read::ranking::Set,
    };

    /// [`User`] listed in a directory [`Page`].
    #[derive(Clone, Debug, Eq, PartialEq, Serialize)]
    #[serde(rename_all = "camelCase")]
    pub struct Entry {
        /// Listed [`User`].
        #[serde(flatten)]
        pub user: User,

        /// Effective [`user::Status`] shown for the [`User`].
        pub user_status: user::Status,

        /// [`user::LastOnlineDateTime`] of the [`User`], when known.
        #[serde(
            rename = "lastonline",
            serialize_with = "last_online_millis",
            skip_serializing_if = "Option::is_none"
        )]
        pub last_online: Option<user::LastOnlineDateTime>,
    }

    impl Entry {
        /// Creates a new [`Entry`] out of a hydrated [`User`], deriving its
        /// effective [`user::Status`] from the stored one.
        #[must_use]
        pub fn new(user: User) -> Self {
            Self {
                user_status: user.status.unwrap_or(user::Status::Offline),
                user,
                last_online: None,
            }
        }

        /// Returns [`user::Id`] of the listed [`User`].
        #[must_use]
        pub fn id(&self) -> user::Id {
            self.user.id
        }

        /// Indicates whether the listed [`User`] appears offline.
        #[must_use]
        pub fn is_offline(&self) -> bool {
            self.user_status == user::Status::Offline
        }
    }

    /// Serializes an optional [`user::LastOnlineDateTime`] as a Unix
    /// timestamp in milliseconds.
    fn last_online_millis<S>(
        dt: &Option<user::LastOnlineDateTime>,
        serializer: S,
    ) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        dt.map(|dt| dt.unix_timestamp_millis())
            .serialize(serializer)
    }

    /// Ordered slice of a ranking [`Set`] along with its population size.
    #[derive(Clone, Debug, Default, Eq, PartialEq)]
    pub struct Fetched {
        /// Listed [`Entry`]s, in ranking order.
        pub entries: Vec<Entry>,

        /// Size of the whole population the [`Entry`]s were taken from.
        pub count: usize,
    }

    /// Capabilities of the [`User`] looking at a directory [`Page`].
    #[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize)]
    #[serde(rename_all = "camelCase")]
    pub struct Capabilities {
        /// Indicator whether the viewer is an administrator.
        pub is_admin: bool,

        /// Indicator whether the viewer is a global moderator.
        pub is_global_mod: bool,

        /// Indicator whether the viewer may use the user search.
        #[serde(rename = "displayUserSearch")]
        pub can_search: bool,
    }

    impl Capabilities {
        /// Indicates whether the viewer is either an administrator or a global
        /// moderator.
        #[must_use]
        pub fn is_admin_or_global_mod(&self) -> bool {
            self.is_admin || self.is_global_mod
        }
    }

    /// Page of a user directory.
    #[derive(Clone, Debug, Eq, PartialEq, Serialize)]
    #[serde(rename_all = "camelCase")]
    pub struct Page {
        /// Ranking [`Set`] this [`Page`] is taken from.
        pub set: Set,

        /// Section of the directory this [`Page`] is shown in.
        pub section: String,

        /// Listed [`Entry`]s, in ranking order.
        pub users: Vec<Entry>,

        /// Size of the whole population of the [`Set`].
        ///
        /// Visibility filtering of [`Page::users`] never affects it.
        #[serde(rename = "userCount")]
        pub count: usize,

        /// [`Pagination`] of the [`Set`].
        pub pagination: Pagination,

        /// Number of guests plus the number of hidden offline [`User`]s.
        ///
        /// Only present for [`Set::Online`].
        #[serde(skip_serializing_if = "Option::is_none")]
        pub anonymous_user_count: Option<usize>,

        /// [`Capabilities`] of the viewer.
        #[serde(flatten)]
        pub capabilities: Capabilities,

        /// Indicator whether the viewer is either an administrator or a
        /// global moderator.
        pub is_admin_or_global_mod: bool,
    }
}
