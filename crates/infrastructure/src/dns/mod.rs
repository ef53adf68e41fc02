pub mod forwarding;
pub mod message;
