pub mod agents;
pub mod chatbots;
pub mod executions;
pub mod knowledge;
pub mod meta;
pub mod providers;
pub mod tokens;
pub mod tools;
