//! Domain models backed by the relational store.

mod linked_account;
mod session;
mod user;
mod verification_token;

pub use linked_account::LinkedAccount;
pub use session::{Session, DEFAULT_SESSION_TTL_DAYS};
pub use user::{Provider, PublicUser, User};
pub use verification_token::{IssuedToken, TokenScope, VerificationToken};
