// UI components module
// Stateful pieces of the interface that outlive a single frame

pub mod change_tree;
pub mod commit_dialog;

// Re-exports
pub use change_tree::{ChangeTreeView, TreeRow};
pub use commit_dialog::CommitDialog;
