//! Wire types exchanged with the github-macros catalog service.

pub mod add;
pub mod macro_item;
pub mod query;
pub mod usage;

pub use add::AddMacroResponse;
pub use add::ErrorCode;
pub use macro_item::MacroItem;
pub use query::QueryKind;
pub use query::QueryResponse;
pub use query::SystemMessage;
pub use usage::UsageTrigger;

/// Version reported to the catalog with every mutating request.
pub const CLIENT_VERSION: &str = "1.0.0";
