//! Wire types for the API. All types serialize with camelCase field names to
//! match what the web clients expect.

pub mod command;
pub mod library;
pub mod macros;
pub mod speaker;

pub use command::{CommandRequest, CommandResult};
pub use library::{
    Album, Artist, BrowseResult, CacheStatus, Genre, ItemCounts, LibraryCacheDump, Titled, Track,
};
pub use macros::{
    MacroDefinition, MacroExecuteRequest, MacroExecutionResult, MacroParameter, MacroStep,
};
pub use speaker::{ListItem, QueueItem, ServerStatus, ShareLinkRequest, Speaker};
