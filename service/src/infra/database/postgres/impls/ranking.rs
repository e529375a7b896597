//! [`ranking::Set`]-related [`Database`] implementations.

use common::operations::{By, Select};
use tracerr::Traced;

use crate::{
    domain::user,
    infra::{
        database::{self, postgres::Connection as _, Postgres},
        Database,
    },
    read::ranking::{self, Score, Scored},
};

use super::int8;

/// Ensures the provided [`ranking::Set`] is backed by an index.
fn indexed(set: ranking::Set) -> Result<&'static str, Traced<database::Error>> {
    if set.is_indexed() {
        Ok(set.key())
    } else {
        Err(tracerr::new!(database::Error::NotFound(set)))
    }
}

impl Database<Select<By<Vec<user::Id>, ranking::Range>>> for Postgres {
    type Ok = Vec<user::Id>;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Select(by): Select<By<Vec<user::Id>, ranking::Range>>,
    ) -> Result<Self::Ok, Self::Err> {
        let range = by.into_inner();
        let key = indexed(range.set).map_err(tracerr::wrap!())?;
        let offset = int8(range.start);
        let limit = range.limit().map(int8);

        let sql = format!(
            "SELECT user_id \
             FROM ranked_sets \
             WHERE set_key = $1::VARCHAR \
             ORDER BY score {order}, user_id {order} \
             OFFSET $2::INT8 \
             LIMIT $3::INT8",
            order = range.order.sql(),
        );
        Ok(self
            .query(&sql, &[&key, &offset, &limit])
            .await
            .map_err(tracerr::wrap!())?
            .into_iter()
            .map(|row| row.get("user_id"))
            .collect())
    }
}

impl Database<Select<By<Vec<Scored>, ranking::ScoreRange>>> for Postgres {
    type Ok = Vec<Scored>;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Select(by): Select<By<Vec<Scored>, ranking::ScoreRange>>,
    ) -> Result<Self::Ok, Self::Err> {
        let range = by.into_inner();
        let key = indexed(range.set).map_err(tracerr::wrap!())?;
        let min = i64::from(range.min);
        let max = range.max.map(i64::from);
        let offset = int8(range.offset);
        let limit = range.limit.map(int8);

        const SQL: &str = "\
            SELECT user_id, score \
            FROM ranked_sets \
            WHERE set_key = $1::VARCHAR \
              AND score >= $2::INT8 \
              AND ($3::INT8 IS NULL OR score <= $3::INT8) \
            ORDER BY score DESC, user_id DESC \
            OFFSET $4::INT8 \
            LIMIT $5::INT8";
        Ok(self
            .query(SQL, &[&key, &min, &max, &offset, &limit])
            .await
            .map_err(tracerr::wrap!())?
            .into_iter()
            .map(|row| Scored {
                id: row.get("user_id"),
                score: Score::from(row.get::<_, i64>("score")),
            })
            .collect())
    }
}

impl Database<Select<By<ranking::Count, ranking::Set>>> for Postgres {
    type Ok = ranking::Count;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Select(by): Select<By<ranking::Count, ranking::Set>>,
    ) -> Result<Self::Ok, Self::Err> {
        let key = indexed(by.into_inner()).map_err(tracerr::wrap!())?;

        const SQL: &str = "\
            SELECT COUNT(*)::INT8 \
            FROM ranked_sets \
            WHERE set_key = $1::VARCHAR";
        let count: i64 = self
            .query_one(SQL, &[&key])
            .await
            .map_err(tracerr::wrap!())?
            .get(0);
        Ok(usize::try_from(count).unwrap_or_default().into())
    }
}

impl Database<Select<By<ranking::Count, ranking::ScoreRange>>> for Postgres {
    type Ok = ranking::Count;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Select(by): Select<By<ranking::Count, ranking::ScoreRange>>,
    ) -> Result<Self::Ok, Self::Err> {
        let range = by.into_inner();
        let key = indexed(range.set).map_err(tracerr::wrap!())?;
        let min = i64::from(range.min);
        let max = range.max.map(i64::from);

        const SQL: &str = "\
            SELECT COUNT(*)::INT8 \
            FROM ranked_sets \
            WHERE set_key = $1::VARCHAR \
              AND score >= $2::INT8 \
              AND ($3::INT8 IS NULL OR score <= $3::INT8)";
        let count: i64 = self
            .query_one(SQL, &[&key, &min, &max])
            .await
            .map_err(tracerr::wrap!())?
            .get(0);
        Ok(usize::try_from(count).unwrap_or_default().into())
    }
}
