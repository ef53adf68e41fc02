pub mod handler;
pub mod request;

pub use handler::{DohHandler, DohStream};
pub use request::{DNS_MESSAGE_CONTENT_TYPE, DOH_PATH};
