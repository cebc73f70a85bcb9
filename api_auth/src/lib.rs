use actix_web::web::{self};
use middleware::auth::AuthMiddleware;

pub mod middleware {
    pub mod auth;
}
mod misc {
    pub(crate) mod oauth;
}
mod services {
    pub(crate) mod auth;
}
mod dtos {
    pub(crate) mod auth;
}
pub mod routes {
    pub mod auth;
}

pub fn mount_auth() -> actix_web::Scope {
    web::scope("/auth")
        .service(routes::auth::post_google)
        .service(routes::auth::get_me)
}

/// Bearer-JWT validation middleware. Public paths pass through untouched;
/// everything else requires a valid token, whose claims are inserted into
/// the request extensions for downstream handlers.
pub fn auth_middleware() -> AuthMiddleware {
    AuthMiddleware::new()
}
