use actix_web::web::{self};

pub mod routes {
    pub mod sub;
    pub mod webhook;
}

pub mod services {
    pub mod entitlement;
    pub mod webhook;
    pub(crate) mod checkout;
}

pub mod models {
    pub mod entitlement;
}

mod dtos {
    pub(crate) mod sub;
}

pub fn mount_subscription() -> actix_web::Scope {
    web::scope("/subscription")
        .service(routes::sub::get_config)
        .service(routes::sub::get_status)
        .service(routes::sub::post_checkout)
        .service(routes::sub::post_portal)
        .service(routes::webhook::post_webhook)
}
