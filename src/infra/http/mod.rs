mod admin;
mod middleware;
mod public;

pub use admin::{AdminState, build_admin_router};
pub use middleware::REQUEST_ID_HEADER;
pub use public::{HttpState, build_router};

use axum_extra::extract::CookieJar;

use crate::domain::auth::Credentials;

pub const LOGIN_ID_COOKIE: &str = "loginID";
pub const SESSION_COOKIE: &str = "session";

/// Login credentials carried by the `loginID` and `session` cookies.
pub(crate) fn credentials_from_cookies(jar: &CookieJar) -> Credentials {
    let value = |name: &str| {
        jar.get(name)
            .map(|cookie| cookie.value().to_string())
            .unwrap_or_default()
    };
    Credentials::new(value(LOGIN_ID_COOKIE), value(SESSION_COOKIE))
}
