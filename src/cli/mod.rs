pub mod convert;
pub mod quote;
pub mod rates;
pub mod search;
pub mod setup;
pub mod ui;
pub mod watch;
