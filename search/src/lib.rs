//! Query cache, pager and local state for the github-macros search popup.
#![deny(clippy::print_stdout, clippy::print_stderr)]

pub mod atomic_write;
pub mod cache;
pub mod catalog;
pub mod expansion;
pub mod http_catalog;
pub mod pager;
pub mod persist;
pub mod scroll;
pub mod store;
pub mod system_message;
pub mod top_usages;
pub mod validate;
pub mod version;

pub use cache::MacroCache;
pub use cache::NameLookup;
pub use cache::PageState;
pub use catalog::CatalogError;
pub use catalog::MacroCatalog;
pub use catalog::SearchPage;
pub use http_catalog::HttpCatalog;
pub use pager::FetchOrigin;
pub use pager::MacroPager;
pub use pager::PagerConfig;
pub use pager::PagerEvent;
pub use pager::PagerNotice;
pub use pager::RenderSink;
pub use scroll::ScrollMetrics;
pub use store::JsonFileStore;
pub use store::KeyValueStore;
pub use store::MemoryStore;
pub use store::StoreError;
pub use top_usages::TopUsages;
