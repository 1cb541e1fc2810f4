//! Structure-preserving YAML document tree
//!
//! [`parse`] turns YAML text into a [`Node`] tree that keeps key order,
//! scalar styles, tags and comments; [`serialize`] writes it back.

mod comments;
mod emit;
mod node;
mod parse;

pub use emit::{serialize, MAX_INDENT, MIN_INDENT};
pub use node::{Comments, Document, Entry, Kind, Mapping, Mark, Node, Scalar, ScalarStyle, Sequence, Tag};
pub use parse::parse;

use std::fs::{self, File};
use std::io::Write;
use std::path::Path;

use tracing::debug;

use crate::error::Result;

/// Read and parse one YAML file
pub fn read_file(path: &Path) -> Result<Node> {
    let source = fs::read_to_string(path)?;
    debug!("Parsing {} ({} bytes)", path.display(), source.len());
    parse(&source)
}

/// Serialize `node` and overwrite `path` with the result
///
/// The file handle is flushed and closed before this returns.
pub fn write_file(path: &Path, node: &Node, indent: usize) -> Result<()> {
    let text = serialize(node, indent)?;
    let mut file = File::create(path)?;
    file.write_all(text.as_bytes())?;
    file.flush()?;
    file.sync_all()?;
    drop(file);
    debug!("Wrote {} ({} bytes)", path.display(), text.len());
    Ok(())
}

/// Re-serialize a file in place without changing its content
pub fn prettify_file(path: &Path, indent: usize) -> Result<()> {
    let node = read_file(path)?;
    write_file(path, &node, indent)
}
