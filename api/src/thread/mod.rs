pub mod author;
pub mod interactor;
pub mod models;
pub mod routes;
pub mod store;
pub mod tree;

pub use interactor::{ReplyInteractor, ThreadError};
