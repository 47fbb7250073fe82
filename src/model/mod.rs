//! Content model: pages, elements, and the nodes they share.
//!
//! This module contains:
//! - [`Node`] and the [`ContentNode`] trait: child elements, body, links, properties
//! - [`Element`] and its kinds ([`Heading`], [`Link`], [`Generic`])
//! - [`Page`]: page metadata and the per-page element index
//! - Reference value types for books, pages, and elements
//! - Rendering collaborators ([`ElementWriter`], [`ElementContext`])
//!
//! Everything here is built once, frozen, and then only read. See
//! [`Page::freeze`].

mod author;
mod element;
mod lifecycle;
mod node;
mod page;
mod refs;
mod render;

pub use author::Author;
pub use element::{Element, ElementKind, Generic, Heading, Link};
pub use node::{Body, ContentNode, Node, PropertyValue};
pub use page::Page;
pub use refs::{BookRef, ChildRef, ElementRef, PageRef, ParentRef};
pub use render::{ElementContext, ElementWriter, IncludeArgs, NullContext};
