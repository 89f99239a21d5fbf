//! Action-item extraction: prompt the model over saved summaries, attribute
//! each action to a client, and group the results.

pub mod extractor;
pub mod grouping;
pub mod model;

pub use extractor::{
    ACTIONS_BY_CLIENT_FILE, ALL_ACTIONS_FILE, ActionExtractor, DEFAULT_CLIENT, ExtractionReport,
    find_summary_files, identify_client, parse_actions, read_artifact,
};
pub use grouping::{ActionsByClient, AllActions, CategoryBuckets, ClientActions, ClientInfo, organize_by_client};
pub use model::{ActionItem, Category, Priority, RawAction};
