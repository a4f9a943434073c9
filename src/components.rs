//! Reusable HTML components for page generation
//!
//! Maud component functions shared across page types: the document frame,
//! the repository header, signature and hash snippets, and listing tables.

pub mod commit;
pub mod file_list;
pub mod layout;
pub mod nav;
