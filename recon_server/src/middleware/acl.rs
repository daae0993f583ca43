//! Access control list middleware for the dashboard routes.
//!
//! The upstream auth proxy identifies the caller and passes the identity in the `X-Actor-*` headers. This middleware
//! reads those headers and checks the actor's role against the roles allowed on the route. If the role is allowed, the
//! [`Actor`] is stored in the request extensions and the request continues. Otherwise a 401 (no identity) or 403
//! (wrong role) response is returned.

use std::{
    future::{ready, Future, Ready},
    pin::Pin,
    rc::Rc,
};

use actix_web::{
    dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform},
    Error,
    HttpMessage,
};
use log::warn;
use recon_engine::db_types::{Actor, ActorRole};

use crate::{
    auth::actor_from_headers,
    errors::{AuthError, ServerError},
};

pub struct AclMiddlewareFactory {
    allowed_roles: Vec<ActorRole>,
}

impl AclMiddlewareFactory {
    /// Allows actors holding any one of `allowed_roles`.
    pub fn new(allowed_roles: &[ActorRole]) -> Self {
        AclMiddlewareFactory { allowed_roles: allowed_roles.to_vec() }
    }
}

impl<S, B> Transform<S, ServiceRequest> for AclMiddlewareFactory
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Error = Error;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;
    type InitError = ();
    type Response = ServiceResponse<B>;
    type Transform = AclMiddlewareService<S>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(AclMiddlewareService { allowed_roles: self.allowed_roles.clone(), service: Rc::new(service) }))
    }
}

pub struct AclMiddlewareService<S> {
    allowed_roles: Vec<ActorRole>,
    service: Rc<S>,
}

impl<S, B> Service<ServiceRequest> for AclMiddlewareService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Error = Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>>>>;
    type Response = ServiceResponse<B>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let service = Rc::clone(&self.service);
        let allowed_roles = self.allowed_roles.clone();
        Box::pin(async move {
            let actor = actor_from_headers(req.headers()).map_err(|e| {
                warn!("💻️ Rejecting request to {}. {e}", req.path());
                ServerError::from(e)
            })?;
            if !allowed_roles.contains(&actor.role) {
                warn!("💻️ {actor} may not call {}", req.path());
                let e = AuthError::InsufficientPermissions(format!("{:?} actors may not call this route", actor.role));
                return Err(ServerError::from(e).into());
            }
            req.extensions_mut().insert::<Actor>(actor);
            service.call(req).await
        })
    }
}
