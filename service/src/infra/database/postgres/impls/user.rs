//! [`User`]-related [`Database`] implementations.

use std::collections::HashMap;

use common::operations::{By, Select};
use tokio_postgres::Row;
use tracerr::Traced;

use crate::{
    domain::{
        user::{self, Privilege},
        User,
    },
    infra::{
        database::{self, postgres::Connection as _, Postgres},
        Database,
    },
    read,
};

/// Columns of the `users` table making up a [`User`].
const USER_COLUMNS: &str = "\
    id, username, email, \
    joined_at, post_count, reputation, follower_count, \
    status, banned, flagged";

/// Builds a [`User`] out of a [`Row`] selected with [`USER_COLUMNS`].
fn user_from_row(row: &Row) -> User {
    User {
        id: row.get("id"),
        username: row.get("username"),
        email: row.get("email"),
        joined_at: row.get("joined_at"),
        post_count: row.get("post_count"),
        reputation: row.get("reputation"),
        follower_count: row.get("follower_count"),
        status: row.get("status"),
        banned: row.get("banned"),
        flagged: row.get("flagged"),
    }
}

impl Database<Select<By<Vec<Option<User>>, read::user::Hydrate>>>
    for Postgres
{
    type Ok = Vec<Option<User>>;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Select(by): Select<By<Vec<Option<User>>, read::user::Hydrate>>,
    ) -> Result<Self::Ok, Self::Err> {
        let read::user::Hydrate { ids, viewer } = by.into_inner();
        if ids.is_empty() {
            return Ok(vec![]);
        }

        let sql = format!(
            "SELECT {USER_COLUMNS} \
             FROM users \
             WHERE id = ANY($1::INT8[])",
        );
        let found = self
            .query(&sql, &[&ids])
            .await
            .map_err(tracerr::wrap!())?
            .iter()
            .map(user_from_row)
            .map(|u| (u.id, u))
            .collect::<HashMap<_, _>>();

        Ok(ids
            .iter()
            .map(|id| found.get(id).cloned().map(|u| u.seen_by(viewer)))
            .collect())
    }
}

impl Database<Select<By<read::user::LiveStatuses, Vec<user::Id>>>>
    for Postgres
{
    type Ok = read::user::LiveStatuses;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Select(by): Select<By<read::user::LiveStatuses, Vec<user::Id>>>,
    ) -> Result<Self::Ok, Self::Err> {
        let ids = by.into_inner();
        if ids.is_empty() {
            return Ok(vec![]);
        }

        const SQL: &str = "\
            SELECT id, status \
            FROM users \
            WHERE id = ANY($1::INT8[])";
        let statuses = self
            .query(SQL, &[&ids])
            .await
            .map_err(tracerr::wrap!())?
            .into_iter()
            .map(|row| {
                (
                    row.get::<_, user::Id>("id"),
                    row.get::<_, Option<user::Status>>("status"),
                )
            })
            .collect::<HashMap<_, _>>();

        Ok(ids
            .iter()
            .map(|id| statuses.get(id).copied().flatten())
            .collect())
    }
}

impl Database<Select<By<Option<User>, user::Id>>> for Postgres {
    type Ok = Option<User>;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Select(by): Select<By<Option<User>, user::Id>>,
    ) -> Result<Self::Ok, Self::Err> {
        let id = by.into_inner();

        let sql = format!(
            "SELECT {USER_COLUMNS} \
             FROM users \
             WHERE id = $1::INT8 \
             LIMIT 1",
        );
        Ok(self
            .query(&sql, &[&id])
            .await
            .map_err(tracerr::wrap!())?
            .first()
            .map(user_from_row))
    }
}

impl Database<Select<By<bool, (user::Id, Privilege)>>> for Postgres {
    type Ok = bool;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Select(by): Select<By<bool, (user::Id, Privilege)>>,
    ) -> Result<Self::Ok, Self::Err> {
        let (id, privilege) = by.into_inner();

        const SQL: &str = "\
            SELECT EXISTS (\
                SELECT 1 \
                FROM user_privileges \
                WHERE user_id = $1::INT8 \
                  AND privilege = $2::INT2\
            )";
        Ok(self
            .query_one(SQL, &[&id, &privilege])
            .await
            .map_err(tracerr::wrap!())?
            .get(0))
    }
}

impl Database<Select<By<read::user::TotalCount, ()>>> for Postgres {
    type Ok = read::user::TotalCount;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        _: Select<By<read::user::TotalCount, ()>>,
    ) -> Result<Self::Ok, Self::Err> {
        const SQL: &str = "\
            SELECT COUNT(*)::INT8 \
            FROM users";
        let count: i64 = self
            .query_one(SQL, &[])
            .await
            .map_err(tracerr::wrap!())?
            .get(0);
        Ok(usize::try_from(count).unwrap_or_default().into())
    }
}

impl Database<Select<By<read::user::GuestCount, ()>>> for Postgres {
    type Ok = read::user::GuestCount;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        _: Select<By<read::user::GuestCount, ()>>,
    ) -> Result<Self::Ok, Self::Err> {
        const SQL: &str = "\
            SELECT COUNT(*)::INT8 \
            FROM guest_sessions";
        let count: i64 = self
            .query_one(SQL, &[])
            .await
            .map_err(tracerr::wrap!())?
            .get(0);
        Ok(usize::try_from(count).unwrap_or_default().into())
    }
}
