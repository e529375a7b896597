//! [`Command`] for authorizing a directory viewer.

use common::operations::{By, Select};
use derive_more::{Display, Error, From};
use jsonwebtoken::Validation;
use tracerr::Traced;

use crate::{
    domain::{
        user::{self, session, Session},
        User,
    },
    infra::{database, Database},
    Service,
};

use super::Command;

/// [`Command`] for authorizing a [`User`] by a [`session::Token`].
#[derive(Clone, Debug, From)]
pub struct AuthorizeUserSession {
    /// [`Session`] token to authorize.
    pub token: session::Token,
}

impl<Db> Command<AuthorizeUserSession> for Service<Db>
where
    Db: Database<
        Select<By<Option<User>, user::Id>>,
        Ok = Option<User>,
        Err = Traced<database::Error>,
    >,
{
    type Ok = Session;
    type Err = Traced<ExecutionError>;

    async fn execute(
        &self,
        cmd: AuthorizeUserSession,
    ) -> Result<Self::Ok, Self::Err> {
        use ExecutionError as E;

        let AuthorizeUserSession { token } = cmd;

        let session = jsonwebtoken::decode::<Session>(
            token.as_ref(),
            &self.config().jwt_decoding_key,
            &Validation::default(),
        )
        .map_err(tracerr::from_and_wrap!(=> E))?
        .claims;

        if !session.user_id.is_valid() {
            return Err(tracerr::new!(E::UserNotExists(session.user_id)));
        }
        drop(
            self.database()
                .execute(Select(By::new(session.user_id)))
                .await
                .map_err(tracerr::map_from_and_wrap!(=> E))?
                .ok_or_else(|| E::UserNotExists(session.user_id))
                .map_err(tracerr::wrap!())?,
        );

        Ok(session)
    }
}

/// Error of [`AuthorizeUserSession`] [`Command`] execution.
#[derive(Debug, Display, Error, From)]
pub enum ExecutionError {
    /// [`Database`] error.
    #[display("`Database` operation failed: {_0}")]
    Db(database::Error),

    /// [`jsonwebtoken`] decoding error.
    #[display("Failed to decode a JSON Web Token: {_0}")]
    JsonWebTokenDecodeError(jsonwebtoken::errors::Error),

    /// [`User`] the [`Session`] belongs to does not exist.
    #[display("`User(id: {_0})` does not exist")]
    #[from(ignore)]
    UserNotExists(#[error(not(source))] user::Id),
}

#[cfg(test)]
mod spec {
    use std::time::Duration;

    use common::{operations::Insert, DateTime};
    use jsonwebtoken::{EncodingKey, Header};

    use crate::{
        domain::{
            user::{self, session, JoinDateTime, Session},
            User,
        },
        infra::{Database as _, Memory},
        Command as _, Service,
    };

    use super::{AuthorizeUserSession, ExecutionError};

    #[expect(unsafe_code, reason = "test")]
    fn token(user_id: i64, secret: &[u8]) -> session::Token {
        let session = Session {
            user_id: user::Id::from(user_id),
            expires_at: (DateTime::now() + Duration::from_secs(3600))
                .coerce(),
        };
        let raw = jsonwebtoken::encode(
            &Header::default(),
            &session,
            &EncodingKey::from_secret(secret),
        )
        .unwrap();
        // SAFETY: Freshly encoded above.
        unsafe { session::Token::new_unchecked(raw) }
    }

    async fn service() -> Service<Memory> {
        let db = Memory::new();
        db.execute(Insert(User {
            id: user::Id::from(1),
            username: user::Name::new("alice").unwrap(),
            email: None,
            joined_at: JoinDateTime::UNIX_EPOCH,
            post_count: 0,
            reputation: 0,
            follower_count: 0,
            status: None,
            banned: false,
            flagged: false,
        }))
        .await
        .unwrap();
        Service::with_database(db)
    }

    #[tokio::test]
    async fn authorizes_existing_user() {
        let service = service().await;

        let session = service
            .execute(AuthorizeUserSession::from(token(1, b"test")))
            .await
            .unwrap();

        assert_eq!(session.user_id, user::Id::from(1));
    }

    #[tokio::test]
    async fn rejects_unknown_user() {
        let service = service().await;

        let err = service
            .execute(AuthorizeUserSession::from(token(2, b"test")))
            .await
            .unwrap_err();

        assert!(matches!(err.as_ref(), ExecutionError::UserNotExists(_)));
    }

    #[tokio::test]
    async fn rejects_foreign_signature() {
        let service = service().await;

        let err = service
            .execute(AuthorizeUserSession::from(token(1, b"other")))
            .await
            .unwrap_err();

        assert!(matches!(
            err.as_ref(),
            ExecutionError::JsonWebTokenDecodeError(_),
        ));
    }
}
