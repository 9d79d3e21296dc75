//! Shared-secret middleware for Actix Web.
//!
//! The payment gateway sends a pre-agreed secret in a request header (by default `X-Webhook-Secret`) with every
//! webhook. Wrap the webhook scope (and any administrative scope) with this middleware to reject calls that do not
//! carry it.
//!
//! An empty secret disables the check.

use std::{
    future::{ready, Ready},
    rc::Rc,
};

use actix_web::{
    dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform},
    error::ErrorForbidden,
    Error,
};
use futures::future::LocalBoxFuture;
use log::{trace, warn};
use mps_common::Secret;

pub struct SharedSecretMiddlewareFactory {
    header: String,
    secret: Secret<String>,
}

impl SharedSecretMiddlewareFactory {
    pub fn new(header: &str, secret: Secret<String>) -> Self {
        SharedSecretMiddlewareFactory { header: header.into(), secret }
    }
}

impl<S, B> Transform<S, ServiceRequest> for SharedSecretMiddlewareFactory
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Error = Error;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;
    type InitError = ();
    type Response = ServiceResponse<B>;
    type Transform = SharedSecretMiddlewareService<S>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(SharedSecretMiddlewareService {
            header: self.header.clone(),
            secret: self.secret.clone(),
            service: Rc::new(service),
        }))
    }
}

pub struct SharedSecretMiddlewareService<S> {
    header: String,
    secret: Secret<String>,
    service: Rc<S>,
}

impl<S, B> Service<ServiceRequest> for SharedSecretMiddlewareService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;
    type Response = ServiceResponse<B>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let service = Rc::clone(&self.service);
        if self.secret.is_empty() {
            trace!("🔐️ Shared secret checks are disabled. Allowing request.");
            return Box::pin(service.call(req));
        }
        let validated = match req.headers().get(&self.header) {
            Some(value) => self.secret.matches(value.as_bytes()),
            None => {
                warn!("🔐️ No {} header found in request to {}. Denying access.", self.header, req.path());
                false
            },
        };
        Box::pin(async move {
            if validated {
                trace!("🔐️ Shared secret check for request ✅️");
                service.call(req).await
            } else {
                warn!("🔐️ Invalid shared secret in request to {}. Denying access.", req.path());
                Err(ErrorForbidden("Invalid or missing webhook secret."))
            }
        })
    }
}
