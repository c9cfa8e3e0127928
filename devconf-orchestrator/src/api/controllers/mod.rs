pub mod conversation;
pub mod feedback;
pub mod history;
pub mod meta;

pub use conversation::ConversationController;
pub use feedback::FeedbackController;
pub use history::HistoryController;
pub use meta::{MetaController, ServiceStatus};
