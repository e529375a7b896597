//! [`Query`] collection related to multiple [`User`]s.

use common::operations::By;

use crate::{
    domain::{user, User},
    read,
};
#[cfg(doc)]
use crate::Query;

use super::DatabaseQuery;

/// Queries [`User`]s by their [`user::Id`]s, as seen by a viewer.
pub type Hydrate =
    DatabaseQuery<By<Vec<Option<User>>, read::user::Hydrate>>;

/// Queries live [`user::Status`]es of [`User`]s by their [`user::Id`]s.
pub type LiveStatuses =
    DatabaseQuery<By<read::user::LiveStatuses, Vec<user::Id>>>;

/// Queries the total number of registered [`User`]s.
pub type TotalCount = DatabaseQuery<By<read::user::TotalCount, ()>>;

/// Queries the number of active guest sessions.
pub type GuestCount = DatabaseQuery<By<read::user::GuestCount, ()>>;
