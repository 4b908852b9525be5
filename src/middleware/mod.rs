use actix_web::{
    body::BoxBody,
    dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform},
    http::header,
    Error,
};

use futures_util::future::LocalBoxFuture;
use std::future::{ready, Ready};
use std::sync::Arc;

/// CORS middleware
pub struct CorsMiddleware {
    pub allowed_origins: Vec<String>,
}

impl<S> Transform<S, ServiceRequest> for CorsMiddleware
where
    S: Service<ServiceRequest, Response = ServiceResponse<BoxBody>, Error = Error>,
    S: 'static,
{
    type Response = ServiceResponse<BoxBody>;
    type Error = Error;
    type InitError = ();
    type Transform = CorsMiddlewareService<S>;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(CorsMiddlewareService {
            service: Arc::new(service),
            allowed_origins: self.allowed_origins.clone(),
        }))
    }
}

pub struct CorsMiddlewareService<S> {
    service: Arc<S>,
    allowed_origins: Vec<String>,
}

impl<S> Service<ServiceRequest> for CorsMiddlewareService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<BoxBody>, Error = Error>,
    S: 'static,
{
    type Response = ServiceResponse<BoxBody>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let service = Arc::clone(&self.service);
        let allowed_origins = self.allowed_origins.clone();

        Box::pin(async move {
            let mut res = service.call(req).await?;

            // Get origin before borrowing headers mutably
            let origin_header = res.request().headers().get("origin").cloned();

            let headers = res.headers_mut();

            if let Some(origin) = origin_header {
                if let Ok(origin_str) = origin.to_str() {
                    if allowed_origins.contains(&origin_str.to_string())
                        || allowed_origins.contains(&"*".to_string())
                    {
                        headers.insert(header::ACCESS_CONTROL_ALLOW_ORIGIN, origin);
                    }
                }
            }

            headers.insert(
                header::ACCESS_CONTROL_ALLOW_METHODS,
                header::HeaderValue::from_static("GET, POST, OPTIONS"),
            );

            headers.insert(
                header::ACCESS_CONTROL_ALLOW_HEADERS,
                header::HeaderValue::from_static("Content-Type, X-Requested-With"),
            );

            Ok(res)
        })
    }
}

/// Security headers middleware
pub struct SecurityHeadersMiddleware;

impl<S> Transform<S, ServiceRequest> for SecurityHeadersMiddleware
where
    S: Service<ServiceRequest, Response = ServiceResponse<BoxBody>, Error = Error>,
    S: 'static,
{
    type Response = ServiceResponse<BoxBody>;
    type Error = Error;
    type InitError = ();
    type Transform = SecurityHeadersMiddlewareService<S>;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(SecurityHeadersMiddlewareService {
            service: Arc::new(service),
        }))
    }
}

pub struct SecurityHeadersMiddlewareService<S> {
    service: Arc<S>,
}

impl<S> Service<ServiceRequest> for SecurityHeadersMiddlewareService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<BoxBody>, Error = Error>,
    S: 'static,
{
    type Response = ServiceResponse<BoxBody>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let service = Arc::clone(&self.service);

        Box::pin(async move {
            let mut res = service.call(req).await?;

            let headers = res.headers_mut();

            headers.insert(
                header::X_CONTENT_TYPE_OPTIONS,
                header::HeaderValue::from_static("nosniff"),
            );

            headers.insert(
                header::X_FRAME_OPTIONS,
                header::HeaderValue::from_static("DENY"),
            );

            headers.insert(
                header::REFERRER_POLICY,
                header::HeaderValue::from_static("strict-origin-when-cross-origin"),
            );

            Ok(res)
        })
    }
}

/// Logging middleware
pub struct LoggingMiddleware;

impl<S> Transform<S, ServiceRequest> for LoggingMiddleware
where
    S: Service<ServiceRequest, Response = ServiceResponse<BoxBody>, Error = Error>,
    S: 'static,
{
    type Response = ServiceResponse<BoxBody>;
    type Error = Error;
    type InitError = ();
    type Transform = LoggingMiddlewareService<S>;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(LoggingMiddlewareService {
            service: Arc::new(service),
        }))
    }
}

pub struct LoggingMiddlewareService<S> {
    service: Arc<S>,
}

impl<S> Service<ServiceRequest> for LoggingMiddlewareService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<BoxBody>, Error = Error>,
    S: 'static,
{
    type Response = ServiceResponse<BoxBody>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let service = Arc::clone(&self.service);
        let start_time = std::time::Instant::now();
        let method = req.method().clone();
        let uri = req.uri().clone();
        let remote_addr = req
            .connection_info()
            .peer_addr()
            .unwrap_or("unknown")
            .to_string();

        Box::pin(async move {
            let result = service.call(req).await;
            let duration = start_time.elapsed();

            match &result {
                Ok(res) => {
                    log::info!(
                        "Request completed: {} {} {} {}ms from {}",
                        method, uri, res.status().as_u16(), duration.as_millis(), remote_addr
                    );
                }
                Err(err) => {
                    log::error!(
                        "Request failed: {} {} {} {}ms from {}",
                        method, uri, err, duration.as_millis(), remote_addr
                    );
                }
            }

            result
        })
    }
}
