//! # Docblog
//!
//! Turns a folder of cloud documents into posts a static-site generator can
//! pick up, and keeps a spreadsheet of per-post metadata next to them that
//! people can edit by hand.
//!
//! # Architecture
//!
//! One run reads the index, lists the folder, and writes every published
//! document as a post:
//!
//! ```text
//! index grid ──► IndexStore::read_all ─┐
//!                                      ├─► merge_all ─► per document ─► posts/, assets/
//! folder ──────► list_documents ───────┘                      │
//!                                                             ▼
//!                                            IndexStore::write_all ─► index grid
//! ```
//!
//! The two services at the edges (the document listing and the grid) are
//! traits, [`source::DocumentSource`] and [`grid::GridService`]. Everything
//! between them is plain functions over owned data, which is how the tests
//! drive whole runs against in-memory doubles.
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`types`] | Shared data model: descriptors, records, bundles |
//! | [`naming`] | Flat asset paths and post file names |
//! | [`markup`] | Parse, rewrite and serialize exported markup |
//! | [`describe`] | Description suppliers for records without one |
//! | [`frontmatter`] | YAML / TOML / JSON headers in front of the markup |
//! | [`grid`] | Typed-cell grid model and the `GridService` boundary |
//! | [`index`] | The metadata index: schema, read-all, write-all, merge |
//! | [`source`] | Document listing boundary and export-archive unpacking |
//! | [`pipeline`] | The build run tying everything together |
//! | [`config`] | `docblog.toml` loading, merging, validation |
//! | [`output`] | CLI output formatting |
//!
//! # Design Decisions
//!
//! ## Full-Replace Index Writes
//!
//! The index is written whole at the end of every run, from the merged
//! record set. A row for a document that left the folder disappears; a row
//! an operator edited survives because the merge keeps the edit. There is no
//! incremental patching to get wrong, at the price of single-writer
//! operation: two runs against one folder at the same time race.
//!
//! ## Bounded Parallel Rewriting
//!
//! Every rewrite rule touches only the element it visits, so the markup
//! tree is rewritten in parallel with rayon down to a configurable depth and
//! sequentially below it. Output is identical either way.
//!
//! ## Serial Dates in the Grid
//!
//! Dates are stored as the grid's native day serials with a date format
//! hint, never as locale strings. See [`index::schema`].

pub mod config;
pub mod describe;
pub mod frontmatter;
pub mod grid;
pub mod index;
pub mod markup;
pub mod naming;
pub mod output;
pub mod pipeline;
pub mod source;
pub mod types;

#[cfg(test)]
pub(crate) mod test_helpers;
