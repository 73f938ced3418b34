pub mod bootstrap;
pub mod connector;
pub mod jira;
pub mod pacing;
