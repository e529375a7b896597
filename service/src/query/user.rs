//! [`Query`] collection related to a single [`User`].

use common::operations::{By, Select};
use tracerr::Traced;

use crate::{
    domain::{
        user::{self, Privilege},
        User,
    },
    infra::{database, Database},
    Service,
};

use super::{DatabaseQuery, Query};

/// Queries a [`User`] by its [`user::Id`].
pub type ById = DatabaseQuery<By<Option<User>, user::Id>>;

/// [`Query`] checking whether a [`User`] holds a [`Privilege`].
///
/// Guests hold no [`Privilege`]s at all.
#[derive(Clone, Copy, Debug)]
pub struct HasPrivilege {
    /// ID of the [`User`] to check, or [`None`] for a guest.
    pub user: Option<user::Id>,

    /// [`Privilege`] to check.
    pub privilege: Privilege,
}

impl<Db> Query<HasPrivilege> for Service<Db>
where
    Db: Database<
        Select<By<bool, (user::Id, Privilege)>>,
        Ok = bool,
        Err = Traced<database::Error>,
    >,
{
    type Ok = bool;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        HasPrivilege { user, privilege }: HasPrivilege,
    ) -> Result<Self::Ok, Self::Err> {
        let Some(id) = user.filter(|id| id.is_valid()) else {
            return Ok(false);
        };

        self.database()
            .execute(Select(By::new((id, privilege))))
            .await
            .map_err(tracerr::wrap!())
    }
}

#[cfg(test)]
mod spec {
    use common::operations::Insert;

    use crate::{
        domain::user::{self, Privilege},
        infra::{Database as _, Memory},
        Query as _, Service,
    };

    use super::HasPrivilege;

    #[tokio::test]
    async fn guests_hold_no_privileges() {
        let db = Memory::new();
        db.execute(Insert((user::Id::from(1), Privilege::Administrator)))
            .await
            .unwrap();
        let service = Service::with_database(db);

        let check = |user| HasPrivilege {
            user,
            privilege: Privilege::Administrator,
        };
        assert!(service.execute(check(Some(user::Id::from(1)))).await.unwrap());
        assert!(!service.execute(check(Some(user::Id::from(2)))).await.unwrap());
        assert!(!service.execute(check(None)).await.unwrap());
    }
}
