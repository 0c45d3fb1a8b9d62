pub mod base;
pub mod event;
pub mod invitation;
pub mod team;
pub mod user;

pub use base::BaseDao;
