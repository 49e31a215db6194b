pub mod caller;
pub mod deadline;
pub mod json;

pub use caller::{RequestCaller, USER_EMAIL_HEADER};
pub use deadline::{RequestDeadline, REQUEST_TIMEOUT_HEADER};
pub use json::JsonBody;
