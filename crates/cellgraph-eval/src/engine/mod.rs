mod builder;
mod node;
mod session;

pub use session::Session;
