//! Reference value types for books, pages, and elements.
//!
//! References are plain immutable values: they identify a page (or an
//! element on a page) by book domain, book name, and path, and are compared
//! component by component. The model only relies on their equality; nothing
//! here resolves a reference against real content.

use std::fmt;
use std::hash::{Hash, Hasher};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::ids::is_valid_id;

/// A book within a domain.
///
/// Ordered by domain, then name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct BookRef {
    domain: String,
    name: String,
}

impl BookRef {
    /// Create a book reference. The domain must be non-empty and the name
    /// must begin with a slash.
    pub fn new(domain: impl Into<String>, name: impl Into<String>) -> Result<Self> {
        let domain = domain.into();
        let name = name.into();
        if domain.is_empty() {
            return Err(Error::InvalidReference("domain may not be empty".into()));
        }
        if !name.starts_with('/') {
            return Err(Error::InvalidReference(format!(
                "book name does not begin with a slash: {name}"
            )));
        }
        Ok(Self { domain, name })
    }

    pub fn domain(&self) -> &str {
        &self.domain
    }

    /// The book name, always beginning with a slash.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The path prefix of the book: empty for the root book `/`.
    pub fn prefix(&self) -> &str {
        if self.name == "/" { "" } else { &self.name }
    }
}

impl fmt::Display for BookRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.domain, self.name)
    }
}

/// A page (or directory, when the path ends in a slash) within a book.
///
/// Ordered by book, then path.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct PageRef {
    book: BookRef,
    path: String,
}

impl PageRef {
    /// Create a page reference. The path must begin with a slash.
    pub fn new(book: BookRef, path: impl Into<String>) -> Result<Self> {
        let path = path.into();
        if !path.starts_with('/') {
            return Err(Error::InvalidReference(format!(
                "path does not begin with a slash: {path}"
            )));
        }
        Ok(Self { book, path })
    }

    pub fn book(&self) -> &BookRef {
        &self.book
    }

    /// The book-relative path, always beginning with a slash.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// The same book with a different path.
    pub fn with_path(&self, path: impl Into<String>) -> Result<Self> {
        Self::new(self.book.clone(), path)
    }
}

impl fmt::Display for PageRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}{}", self.book.domain, self.book.prefix(), self.path)
    }
}

/// An element on a page, by id.
///
/// Ordered by page, then id.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ElementRef {
    page: PageRef,
    id: String,
}

impl ElementRef {
    pub fn new(page: PageRef, id: impl Into<String>) -> Result<Self> {
        let id = id.into();
        if !is_valid_id(&id) {
            return Err(Error::InvalidId(id));
        }
        Ok(Self { page, id })
    }

    pub fn page(&self) -> &PageRef {
        &self.page
    }

    pub fn id(&self) -> &str {
        &self.id
    }
}

impl fmt::Display for ElementRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.page, self.id)
    }
}

/// A parent page, with an optional short title used when the child is shown
/// in the context of this parent.
///
/// Equality, hashing, and ordering use the page only.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ParentRef {
    page: PageRef,
    short_title: Option<String>,
}

impl ParentRef {
    pub fn new(page: PageRef, short_title: Option<String>) -> Self {
        Self { page, short_title }
    }

    pub fn page(&self) -> &PageRef {
        &self.page
    }

    pub fn short_title(&self) -> Option<&str> {
        self.short_title.as_deref()
    }
}

impl From<PageRef> for ParentRef {
    fn from(page: PageRef) -> Self {
        Self::new(page, None)
    }
}

impl PartialEq for ParentRef {
    fn eq(&self, other: &Self) -> bool {
        self.page == other.page
    }
}

impl Eq for ParentRef {}

impl Hash for ParentRef {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.page.hash(state);
    }
}

impl PartialOrd for ParentRef {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ParentRef {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.page.cmp(&other.page)
    }
}

impl fmt::Display for ParentRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.short_title {
            Some(short_title) => write!(f, "{short_title} -> {}", self.page),
            None => write!(f, "{}", self.page),
        }
    }
}

/// A child page.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ChildRef {
    page: PageRef,
}

impl ChildRef {
    pub fn new(page: PageRef) -> Self {
        Self { page }
    }

    pub fn page(&self) -> &PageRef {
        &self.page
    }
}

impl From<PageRef> for ChildRef {
    fn from(page: PageRef) -> Self {
        Self::new(page)
    }
}

impl fmt::Display for ChildRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.page)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn book(name: &str) -> BookRef {
        BookRef::new("example.com", name).unwrap()
    }

    #[test]
    fn test_book_validation() {
        assert!(BookRef::new("", "/docs").is_err());
        assert!(BookRef::new("example.com", "docs").is_err());
        assert!(BookRef::new("example.com", "/").is_ok());
    }

    #[test]
    fn test_book_prefix() {
        assert_eq!(book("/").prefix(), "");
        assert_eq!(book("/docs").prefix(), "/docs");
    }

    #[test]
    fn test_page_display() {
        let root = PageRef::new(book("/"), "/index").unwrap();
        assert_eq!(root.to_string(), "example.com:/index");
        let docs = PageRef::new(book("/docs"), "/guide/").unwrap();
        assert_eq!(docs.to_string(), "example.com:/docs/guide/");
        assert_eq!(book("/docs").to_string(), "example.com:/docs");
    }

    #[test]
    fn test_page_requires_leading_slash() {
        let err = PageRef::new(book("/"), "index").unwrap_err();
        assert!(matches!(err, Error::InvalidReference(_)));
    }

    #[test]
    fn test_with_path() {
        let page = PageRef::new(book("/docs"), "/a").unwrap();
        let other = page.with_path("/b").unwrap();
        assert_eq!(other.book(), page.book());
        assert_eq!(other.path(), "/b");
    }

    #[test]
    fn test_page_ordering() {
        let a = PageRef::new(book("/a"), "/z").unwrap();
        let b = PageRef::new(book("/b"), "/a").unwrap();
        let b2 = PageRef::new(book("/b"), "/b").unwrap();
        let mut pages = vec![b2.clone(), a.clone(), b.clone()];
        pages.sort();
        assert_eq!(pages, vec![a, b, b2]);
    }

    #[test]
    fn test_element_ref() {
        let page = PageRef::new(book("/"), "/index").unwrap();
        let element = ElementRef::new(page.clone(), "intro").unwrap();
        assert_eq!(element.to_string(), "example.com:/index#intro");
        assert!(matches!(ElementRef::new(page, "9lives"), Err(Error::InvalidId(_))));
    }

    #[test]
    fn test_parent_ref_ignores_short_title() {
        let page = PageRef::new(book("/"), "/index").unwrap();
        let a = ParentRef::new(page.clone(), Some("Home".into()));
        let b = ParentRef::from(page);
        assert_eq!(a, b);
        assert_eq!(a.to_string(), "Home -> example.com:/index");
        assert_eq!(b.to_string(), "example.com:/index");
    }
}
