//! Page authors.

use std::fmt;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// An author of a book, a page, or a set of pages.
///
/// Either `href` is given, or `book` + `page` are given together, never
/// both. Without a name, the author is identified by `page`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Author {
    name: Option<String>,
    href: Option<String>,
    book: Option<String>,
    page: Option<String>,
}

impl Author {
    pub fn new(
        name: Option<String>,
        href: Option<String>,
        book: Option<String>,
        page: Option<String>,
    ) -> Result<Self> {
        if name.as_deref() == Some("") {
            return Err(Error::InvalidAuthor("empty name not allowed"));
        }
        if href.as_deref() == Some("") {
            return Err(Error::InvalidAuthor("empty href not allowed"));
        }
        if book.as_deref() == Some("") {
            return Err(Error::InvalidAuthor("empty book not allowed"));
        }
        if page.as_deref() == Some("") {
            return Err(Error::InvalidAuthor("empty page not allowed"));
        }
        if href.is_some() {
            if book.is_some() {
                return Err(Error::InvalidAuthor("book may not be provided when href provided"));
            }
            if page.is_some() {
                return Err(Error::InvalidAuthor("page may not be provided when href provided"));
            }
        } else {
            if name.is_none() && page.is_none() {
                return Err(Error::InvalidAuthor(
                    "empty author, at least one of name, href, or page required",
                ));
            }
            match (&book, &page) {
                (None, Some(_)) => return Err(Error::InvalidAuthor("page provided without book")),
                (Some(_), None) => return Err(Error::InvalidAuthor("book provided without page")),
                _ => {}
            }
        }
        Ok(Self {
            name,
            href,
            book,
            page,
        })
    }

    /// An author known only by name.
    pub fn named(name: impl Into<String>) -> Result<Self> {
        Self::new(Some(name.into()), None, None, None)
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn href(&self) -> Option<&str> {
        self.href.as_deref()
    }

    pub fn book(&self) -> Option<&str> {
        self.book.as_deref()
    }

    pub fn page(&self) -> Option<&str> {
        self.page.as_deref()
    }
}

impl fmt::Display for Author {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(name) = &self.name {
            return f.write_str(name);
        }
        if let Some(href) = &self.href {
            return f.write_str(href);
        }
        match (self.book.as_deref(), self.page.as_deref()) {
            (Some("/"), Some(page)) => f.write_str(page),
            (Some(book), Some(page)) => write!(f, "{book}{page}"),
            _ => Ok(()),
        }
    }
}
