use actix_web::{
    body::EitherBody,
    dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform},
    http::header,
    Error, HttpResponse,
};
use futures_util::future::LocalBoxFuture;
use std::future::{ready, Ready};
use tracing::debug;

/// Redirects plain-HTTP requests to HTTPS.
///
/// Behind the hosting platform's router TLS is already terminated, so the scheme is taken
/// from `X-Forwarded-Proto` / `Forwarded` through `connection_info()`.
pub struct HttpsRedirect;

impl<S, B> Transform<S, ServiceRequest> for HttpsRedirect
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error>,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type InitError = ();
    type Transform = HttpsRedirectMiddleware<S>;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(HttpsRedirectMiddleware { service }))
    }
}

pub struct HttpsRedirectMiddleware<S> {
    service: S,
}

impl<S, B> Service<ServiceRequest> for HttpsRedirectMiddleware<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error>,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let (is_secure, host) = {
            let info = req.connection_info();
            (info.scheme() == "https", info.host().to_string())
        };

        if is_secure {
            let fut = self.service.call(req);
            return Box::pin(async move { fut.await.map(ServiceResponse::map_into_left_body) });
        }

        let location = format!("https://{}{}", host, req.uri());
        debug!(location = %location, "Redirecting to HTTPS");

        let response = HttpResponse::Found()
            .insert_header((header::LOCATION, location))
            .finish()
            .map_into_right_body();
        Box::pin(async move { Ok(req.into_response(response)) })
    }
}
