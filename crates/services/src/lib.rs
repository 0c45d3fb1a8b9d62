pub mod auth;
pub mod calendar;
pub mod dao;
pub mod feed;
pub mod mail;
pub mod policy;
pub mod sweeper;

pub use auth::AuthService;
pub use dao::*;
pub use feed::{EventChange, EventFeed};
pub use mail::{MailError, Mailer};
pub use policy::Denial;
