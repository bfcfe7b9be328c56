pub mod social;
pub mod tweets;
pub mod users;
