//! Email templates: the block tree, its HTML compiler and parser, and merge-field rendering.
//!
//! `compile` turns blocks into a table-based, inline-styled document. `parse` goes the other
//! way for arbitrary HTML so imported templates stay editable. Output of `compile` parses back to
//! the blocks it came from, provided `text` content is already in sanitised form.

pub mod blocks;
pub mod compile;
pub mod html;
pub mod parse;
pub mod render;
pub mod sanitize;

pub use blocks::{Align, Block, Column, validate};
pub use compile::compile;
pub use parse::parse;
pub use render::{RenderError, Rendered, render};
