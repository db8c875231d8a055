//! Related content resolution
//!
//! Before a submission is sent for translation, every item it references
//! (taxonomy terms, menus and their items, a widget's menu, the featured
//! image) must itself have a submission and a target item. The resolver
//! walks those references across blogs of a multi-site installation and
//! rewrites the target item to point at the translated counterparts.
//!
//! # Module Organization
//!
//! - `context`: blog switching with guaranteed restore
//! - `submission`: submission records and the store port
//! - `ports`: content gateway and downloader ports
//! - `related`: the resolver itself
//! - `memory`: in-memory implementations of the ports

pub mod context;
pub mod memory;
pub mod ports;
pub mod related;
pub mod submission;


pub use context::{BlogId, BlogScope, SiteContext, within_blog};
pub use memory::{InMemorySite, Journal, RecordingDownloader, StoredItem};
pub use ports::{ContentGateway, Downloader, TermRef, is_taxonomy};
pub use related::{ReferenceAccumulator, RelatedContentResolver};
pub use submission::{
    InMemorySubmissionStore, Submission, SubmissionFilter, SubmissionKey, SubmissionStatus,
    SubmissionStore,
};
