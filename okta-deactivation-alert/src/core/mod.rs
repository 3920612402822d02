/*!
Components of a single deactivation check
*/

pub mod config;
pub mod log_fetcher;
pub mod notifier;
pub mod relevance;
pub mod tracker;
