pub mod error;
mod print_request;
pub mod sql;
pub mod types;
pub mod validated;

pub use error::{AppError, FormErrors, handler_404, internal_error};
pub use print_request::print_req_res;
pub use validated::{AppJson, ValidatedJson};
