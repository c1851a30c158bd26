pub mod kudos;
pub mod lookup;
pub mod message;
pub mod session;
pub mod user;
