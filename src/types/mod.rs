pub mod admin;
pub mod auth;
pub mod currency;
pub mod deposit;
pub mod trade;
pub mod user;
pub mod withdrawal;

pub use admin::*;
pub use auth::*;
pub use currency::*;
pub use deposit::*;
pub use trade::*;
pub use user::*;
pub use withdrawal::*;
