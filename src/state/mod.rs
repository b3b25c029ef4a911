/// State management module
///
/// Everything the UI drives, kept free of widgets so it can be tested
/// without a window:
/// - Shared data structures (data.rs)
/// - Folder scanning and filtering (catalog.rs)
/// - Virtualized list geometry (viewport.rs)
/// - Per-snapshot thumbnail cache (thumbs.rs)
/// - Selection and decrypt-to-preview (preview.rs)
/// - Bulk folder encrypt/decrypt (folder_ops.rs)
/// - One browsed folder tying the above together (session.rs)

pub mod catalog;
pub mod data;
pub mod folder_ops;
pub mod preview;
pub mod session;
pub mod thumbs;
pub mod viewport;
