//! Entry points other than a plain command run.

pub mod cabling;
pub mod history;
pub mod menu;
pub mod rollback;
