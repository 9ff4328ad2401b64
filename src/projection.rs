//! Projections: a region of a primary document exposed as its own file.
//!
//! A [`ProjectionTarget`] keeps the projection file in sync with its block,
//! translates coordinates between the two documents and forwards language
//! queries. A [`WriteBack`] hook pushes edits made in the projection back into
//! the live primary document.

pub mod block;
pub mod target;
pub mod uri;
pub mod writeback;

pub use block::{CodeBlock, TargetKey};
pub use target::ProjectionTarget;
pub use uri::{ProjectionLocation, extension_for_language, to_lsp_uri};
pub use writeback::{AnchorResolver, Replacement, WriteBack};
