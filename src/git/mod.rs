pub mod history;
pub mod locate;
pub mod process;

pub use history::{extract, GitCli, HistorySource};
pub use locate::{discover, open_repository, WalkOptions};
