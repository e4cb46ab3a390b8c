//! Server-side sessions keyed by the `sessionid` cookie.
//!
//! The middleware only assigns an id to the request. Data is written to the
//! store through [`Session::update`], and the cookie is issued once something
//! has actually been stored for a fresh id.

mod extract;
mod store;

pub use extract::{SESSION_COOKIE, Session, session_layer};
pub use store::{SessionData, SessionStore, SessionUser};
