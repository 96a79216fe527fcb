pub mod accounts;
pub mod collect;
pub mod output;
