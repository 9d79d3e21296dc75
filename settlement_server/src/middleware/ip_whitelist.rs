//! IP whitelist middleware.
//!
//! Requests whose remote address is not on the whitelist are refused with 403 Forbidden. The remote address is
//! resolved with [`get_remote_ip`], so proxies are honoured according to the server options. Passing `None` as the
//! whitelist disables the check.

use std::{
    future::{ready, Ready},
    net::IpAddr,
    rc::Rc,
};

use actix_web::{
    dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform},
    error::ErrorForbidden,
    Error,
};
use futures::future::LocalBoxFuture;
use log::{trace, warn};

use crate::{config::ServerOptions, helpers::get_remote_ip};

pub struct IpWhitelistMiddlewareFactory {
    whitelist: Option<Rc<Vec<IpAddr>>>,
    options: ServerOptions,
}

impl IpWhitelistMiddlewareFactory {
    pub fn new(whitelist: Option<Vec<IpAddr>>, options: ServerOptions) -> Self {
        IpWhitelistMiddlewareFactory { whitelist: whitelist.map(Rc::new), options }
    }
}

impl<S, B> Transform<S, ServiceRequest> for IpWhitelistMiddlewareFactory
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Error = Error;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;
    type InitError = ();
    type Response = ServiceResponse<B>;
    type Transform = IpWhitelistMiddlewareService<S>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(IpWhitelistMiddlewareService {
            whitelist: self.whitelist.clone(),
            options: self.options,
            service: Rc::new(service),
        }))
    }
}

pub struct IpWhitelistMiddlewareService<S> {
    whitelist: Option<Rc<Vec<IpAddr>>>,
    options: ServerOptions,
    service: Rc<S>,
}

impl<S, B> Service<ServiceRequest> for IpWhitelistMiddlewareService<S>
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
        let Some(whitelist) = &self.whitelist else {
            return Box::pin(service.call(req));
        };
        let peer_ip = get_remote_ip(req.request(), self.options.use_x_forwarded_for, self.options.use_forwarded);
        let allowed = peer_ip.map(|ip| whitelist.contains(&ip)).unwrap_or(false);
        Box::pin(async move {
            if allowed {
                trace!("🔐️ Request from {peer_ip:?} is on the whitelist");
                service.call(req).await
            } else {
                let peer = peer_ip.map(|ip| ip.to_string()).unwrap_or_else(|| "an unknown address".into());
                warn!("🔐️ Unauthorized request to {} from {peer}", req.path());
                Err(ErrorForbidden("Unauthorized access."))
            }
        })
    }
}
