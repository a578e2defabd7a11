//! JSON frontmatter for wiki page sources.
//!
//! A page may open with a block of metadata:
//!
//! ```text
//! ---json
//! {
//!     "aliases": [
//!         {"path": ":old:name", "type": "redirect"}
//!     ],
//!     "title": "Hello"
//! }
//! ---
//! ====== Hello ======
//! ```
//!
//! [`FrontmatterStore`] exposes that block as a [`pagemeta_core::MetadataStore`].
//!
//! ```no_run
//! use pagemeta_frontmatter::{FrontmatterStore, parse};
//!
//! let (block, body) = parse("---json\n{\"lang\": \"fr\"}\n---\nBonjour\n").unwrap();
//! assert_eq!(block["lang"], "fr");
//! assert_eq!(body, "Bonjour\n");
//!
//! let store = FrontmatterStore::open("data/pages/ns/page.txt").unwrap();
//! println!("{}", store.to_source());
//! ```

pub mod error;
mod parse;
mod serialize;
mod store;

pub use error::{Error, Result};
pub use parse::{decode_block, parse, split};
pub use serialize::{encode_block, render};
pub use store::FrontmatterStore;
