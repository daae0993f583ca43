//! Actor identity for dashboard routes.
//!
//! Authentication happens upstream. The auth proxy in front of this server injects the caller's identity as request
//! headers, and this module turns those headers into an [`Actor`].
use std::future::{ready, Ready};

use actix_web::{dev::Payload, http::header::HeaderMap, FromRequest, HttpMessage, HttpRequest};
use log::debug;
use recon_engine::db_types::{Actor, ActorRole};

use crate::errors::{AuthError, ServerError};

pub const ACTOR_ID_HEADER: &str = "X-Actor-Id";
pub const ACTOR_ROLE_HEADER: &str = "X-Actor-Role";
pub const ACTOR_BRAND_HEADER: &str = "X-Actor-Brand";

/// Reads the actor from the identity headers.
pub fn actor_from_headers(headers: &HeaderMap) -> Result<Actor, AuthError> {
    let header = |name: &str| -> Result<Option<String>, AuthError> {
        match headers.get(name) {
            None => Ok(None),
            Some(v) => v
                .to_str()
                .map(|s| Some(s.trim().to_string()).filter(|s| !s.is_empty()))
                .map_err(|e| AuthError::InvalidActor(format!("{name} is not valid text. {e}"))),
        }
    };
    let id = header(ACTOR_ID_HEADER)?.ok_or(AuthError::MissingActor)?;
    let role = header(ACTOR_ROLE_HEADER)?
        .ok_or_else(|| AuthError::InvalidActor(format!("{ACTOR_ROLE_HEADER} is required")))?
        .parse::<ActorRole>()
        .map_err(|e| AuthError::InvalidActor(e.to_string()))?;
    let brand_id = header(ACTOR_BRAND_HEADER)?;
    if role == ActorRole::Brand && brand_id.is_none() {
        return Err(AuthError::InvalidActor(format!("Brand actors must supply {ACTOR_BRAND_HEADER}")));
    }
    let brand_id = if role == ActorRole::Brand { brand_id } else { None };
    Ok(Actor { id, role, brand_id })
}

/// Extracts the [`Actor`] making the request.
///
/// The ACL middleware stores the actor in the request extensions once it has checked the actor's role. Routes without
/// the middleware fall back to reading the headers.
#[derive(Debug, Clone)]
pub struct RequestActor(pub Actor);

impl RequestActor {
    pub fn into_inner(self) -> Actor {
        self.0
    }
}

impl FromRequest for RequestActor {
    type Error = ServerError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _: &mut Payload) -> Self::Future {
        if let Some(actor) = req.extensions().get::<Actor>() {
            return ready(Ok(RequestActor(actor.clone())));
        }
        let result = actor_from_headers(req.headers()).map(RequestActor).map_err(|e| {
            debug!("💻️ No usable actor on request to {}. {e}", req.path());
            ServerError::from(e)
        });
        ready(result)
    }
}
