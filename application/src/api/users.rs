//! User directory endpoint.

use axum::{
    extract::RawQuery,
    response::{IntoResponse, Response},
    Json,
};
use common::pagination;
use service::query::{self, directory, section, Query as _};

use crate::{define_error, AsError, Context, Error};

/// Name of the header carrying the total number of users in the listed set.
pub const TOTAL_COUNT_HEADER: &str = "x-total-count";

/// Lists a page of the user directory section requested by the `section`
/// query parameter (`joindate` by default).
///
/// Responds with the directory page as JSON, duplicating its `userCount` in
/// the [`TOTAL_COUNT_HEADER`].
///
/// # Errors
///
/// Possible error codes:
/// - `INVALID_TOKEN` - provided `Authorization` token is invalid;
/// - `NOT_ALLOWED` - listing banned or flagged users requires moderation
///                   privileges;
/// - `NOT_FOUND` - reputation is disabled, so there is no reputation ranking.
#[tracing::instrument(
    skip_all,
    fields(
        http.query = raw.as_deref(),
        otel.name = "GET /users",
    ),
)]
pub async fn list(
    ctx: Context,
    RawQuery(raw): RawQuery,
) -> Result<Response, Error> {
    let viewer = ctx.viewer().await?;

    let page = ctx
        .service()
        .execute(query::Section {
            viewer,
            query: pagination::Query::parse(raw.as_deref().unwrap_or_default()),
        })
        .await
        .map_err(AsError::into_error)?;

    Ok((
        [(TOTAL_COUNT_HEADER, page.count.to_string())],
        Json(page),
    )
        .into_response())
}

impl AsError for section::ExecutionError {
    fn try_as_error(&self) -> Option<Error> {
        match self {
            Self::Db(e) => e.try_as_error(),
            Self::Directory(e) => e.try_as_error(),
            Self::Unauthorized(_) => Some(DirectoryError::NotAllowed.into()),
            Self::ReputationDisabled => Some(DirectoryError::NotFound.into()),
        }
    }
}

impl AsError for directory::ExecutionError {
    fn try_as_error(&self) -> Option<Error> {
        match self {
            Self::Db(e) => e.try_as_error(),
            Self::InvalidSet(_) => Some(DirectoryError::InvalidSet.into()),
        }
    }
}

define_error! {
    enum DirectoryError {
        #[code = "INVALID_SET"]
        #[status = BAD_REQUEST]
        #[message = "Unknown ranking set"]
        InvalidSet,

        #[code = "NOT_ALLOWED"]
        #[status = FORBIDDEN]
        #[message = "Moderation privileges required"]
        NotAllowed,

        #[code = "NOT_FOUND"]
        #[status = NOT_FOUND]
        #[message = "Requested section is not available"]
        NotFound,
    }
}

#[cfg(test)]
mod spec {
    use service::{
        infra::database,
        query::{directory, section},
        read::ranking::{InvalidSet, Set},
    };

    use crate::AsError as _;

    #[test]
    fn maps_section_errors() {
        let err = section::ExecutionError::Unauthorized(Set::Banned);
        assert_eq!(err.as_error().status_code, http::StatusCode::FORBIDDEN);
        assert_eq!(err.as_error().code, "NOT_ALLOWED");

        let err = section::ExecutionError::ReputationDisabled;
        assert_eq!(err.as_error().status_code, http::StatusCode::NOT_FOUND);

        let err = section::ExecutionError::Directory(
            directory::ExecutionError::InvalidSet(InvalidSet("karma".into())),
        );
        assert_eq!(err.as_error().status_code, http::StatusCode::BAD_REQUEST);
        assert_eq!(err.as_error().code, "INVALID_SET");
    }

    #[test]
    fn hides_database_errors() {
        let err = section::ExecutionError::Db(database::Error::NotFound(
            Set::FollowerCount,
        ));

        let error = err.as_error();
        assert_eq!(error.code, "INTERNAL_SERVER_ERROR");
        assert_eq!(
            error.status_code,
            http::StatusCode::INTERNAL_SERVER_ERROR,
        );
    }
}
