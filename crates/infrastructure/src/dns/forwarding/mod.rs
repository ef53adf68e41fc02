pub mod backend;
pub mod tcp;
pub mod udp;

pub use backend::BackendForwarder;
