pub mod clock;
pub mod login;
pub mod search;
pub mod token;
