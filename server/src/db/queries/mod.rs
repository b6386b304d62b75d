pub mod communities;
pub mod posts;
pub mod snippets;
pub mod votes;
