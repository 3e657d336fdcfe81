//! Discord-facing rendering.

pub mod embeds;
