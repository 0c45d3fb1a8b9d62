pub mod event;
pub mod invitation;
pub mod team;
pub mod user;

pub use event::*;
pub use invitation::*;
pub use team::*;
pub use user::*;
