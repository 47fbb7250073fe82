//! # pagemodel
//!
//! A page and element model with deferred child rendering.
//!
//! ## Features
//!
//! - Build pages and nested elements incrementally, then freeze them into an
//!   immutable snapshot that any thread can read without locking
//! - Embed compact markers for child elements in captured bodies and have
//!   them substituted while the body is streamed out
//! - Collision-free element ids generated from labels (`heading`, `heading-2`, ...)
//! - Unpredictable 64-bit substitution keys without a global lock per key
//!
//! ## Quick Start
//!
//! ```
//! use std::io::Write;
//! use pagemodel::{ContentNode, Element, ElementContext, IdAllocator, NullContext, Page, push_marker};
//!
//! let mut alloc = IdAllocator::new();
//! let page = Page::new();
//! page.set_title(Some("Guide".into())).unwrap();
//!
//! // Capture the body, leaving a marker where the heading goes
//! let heading = Element::heading("Getting Started");
//! page.add_element(&heading).unwrap();
//! let key = page
//!     .add_child_element(&mut alloc, heading.clone(), |out: &mut dyn Write, _: &dyn ElementContext| {
//!         out.write_all(b"<h2>Getting Started</h2>")
//!     })
//!     .unwrap();
//! let mut body = String::from("<main>");
//! push_marker(key, &mut body);
//! body.push_str("</main>");
//! page.node().set_body(body).unwrap();
//!
//! // Freeze: ids are generated, nothing can change afterwards
//! page.freeze().unwrap();
//! assert_eq!(heading.id_no_gen().as_deref(), Some("getting-started"));
//!
//! // Render
//! let mut out = Vec::new();
//! page.write_body(&mut out, &NullContext).unwrap();
//! assert_eq!(out, b"<main><h2>Getting Started</h2></main>");
//! ```
//!
//! ## Lifecycle
//!
//! Every [`Page`], [`Element`] and [`Node`] starts out mutable. Mutators take
//! `&self` and lock only the node they change; no two node locks are ever
//! held at once. [`Page::freeze`] gives every element an id, freezes every
//! element, and publishes the page's state for lock-free reads. Any mutator
//! called afterwards fails with [`Error::Frozen`].

pub mod error;
pub mod ids;
pub mod marker;
pub mod model;

pub use error::{Error, Result};
pub use ids::{AllocatorConfig, IdAllocator, RandomSource, generate_id_prefix, is_valid_id, unique_id};
pub use marker::{ElementKey, MarkerWriter, ScanConfig, decode_marker, encode_marker, marker_string, push_marker, write_marker};
pub use model::{
    Author, Body, BookRef, ChildRef, ContentNode, Element, ElementContext, ElementKind, ElementRef,
    ElementWriter, Generic, Heading, IncludeArgs, Link, Node, NullContext, Page, PageRef, ParentRef,
    PropertyValue,
};
