//! Elements: nodes that live on a page and have a page-unique id.

use std::fmt;
use std::sync::{Arc, Weak};

use super::lifecycle::Lifecycle;
use super::node::{ContentNode, Node};
use super::page::Page;
use super::refs::ElementRef;
use super::render::ElementWriter;
use crate::error::{Error, Result};
use crate::ids::{IdAllocator, generate_id_prefix, is_valid_id};
use crate::marker::ElementKey;

/// A heading. Its label doubles as the source of its generated id.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Heading {
    label: Option<String>,
}

impl Heading {
    pub fn new(label: impl Into<String>) -> Self {
        let label = label.into();
        Self {
            label: (!label.is_empty()).then_some(label),
        }
    }

    pub fn label(&self) -> Option<&str> {
        self.label.as_deref()
    }
}

/// A link to another page or element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Link {
    book: Option<String>,
    page: Option<String>,
    element: Option<String>,
    allow_generated_element: bool,
    anchor: Option<String>,
    view: String,
}

impl Default for Link {
    fn default() -> Self {
        Self {
            book: None,
            page: None,
            element: None,
            allow_generated_element: false,
            anchor: None,
            view: Link::DEFAULT_VIEW.to_string(),
        }
    }
}

fn non_empty(value: impl Into<String>) -> Option<String> {
    let value = value.into();
    (!value.is_empty()).then_some(value)
}

impl Link {
    /// The view used when none is given.
    pub const DEFAULT_VIEW: &'static str = "content";

    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_book(mut self, book: impl Into<String>) -> Self {
        self.book = non_empty(book);
        self
    }

    pub fn with_page(mut self, page: impl Into<String>) -> Self {
        self.page = non_empty(page);
        self
    }

    pub fn with_element(mut self, element: impl Into<String>) -> Self {
        self.element = non_empty(element);
        self
    }

    /// Allow linking to an element whose id was generated rather than
    /// assigned. Generated ids change when labels change.
    pub fn with_allow_generated_element(mut self, allow: bool) -> Self {
        self.allow_generated_element = allow;
        self
    }

    pub fn with_anchor(mut self, anchor: impl Into<String>) -> Self {
        self.anchor = non_empty(anchor);
        self
    }

    /// Empty resets to [`Link::DEFAULT_VIEW`].
    pub fn with_view(mut self, view: impl Into<String>) -> Self {
        self.view = non_empty(view).unwrap_or_else(|| Self::DEFAULT_VIEW.to_string());
        self
    }

    pub fn book(&self) -> Option<&str> {
        self.book.as_deref()
    }

    pub fn page(&self) -> Option<&str> {
        self.page.as_deref()
    }

    pub fn element(&self) -> Option<&str> {
        self.element.as_deref()
    }

    pub fn allow_generated_element(&self) -> bool {
        self.allow_generated_element
    }

    pub fn anchor(&self) -> Option<&str> {
        self.anchor.as_deref()
    }

    pub fn view(&self) -> &str {
        &self.view
    }
}

/// An element kind defined outside this crate, described by its label and
/// id prefix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Generic {
    label: String,
    id_prefix: String,
    hidden: bool,
}

impl Generic {
    /// `id_prefix` is the fallback id base and must itself be a valid id.
    pub fn new(label: impl Into<String>, id_prefix: impl Into<String>) -> Result<Self> {
        let id_prefix = id_prefix.into();
        if !is_valid_id(&id_prefix) {
            return Err(Error::InvalidId(id_prefix));
        }
        Ok(Self {
            label: label.into(),
            id_prefix,
            hidden: false,
        })
    }

    /// Hidden elements are left out of navigation trees and similar lists.
    pub fn hidden(mut self, hidden: bool) -> Self {
        self.hidden = hidden;
        self
    }
}

/// What kind of element this is.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ElementKind {
    Heading(Heading),
    Link(Link),
    Generic(Generic),
}

impl ElementKind {
    /// A short description, useful for links and lists.
    pub fn label(&self) -> &str {
        match self {
            ElementKind::Heading(heading) => heading.label().unwrap_or_default(),
            ElementKind::Link(_) => "Link",
            ElementKind::Generic(generic) => &generic.label,
        }
    }

    /// The id base used when the label yields nothing usable.
    pub fn default_id_prefix(&self) -> &str {
        match self {
            ElementKind::Heading(_) => "heading",
            ElementKind::Link(_) => "link",
            ElementKind::Generic(generic) => &generic.id_prefix,
        }
    }

    /// Hidden elements are left out of navigation trees and similar lists.
    pub fn is_hidden(&self) -> bool {
        match self {
            ElementKind::Heading(_) => false,
            ElementKind::Link(_) => true,
            ElementKind::Generic(generic) => generic.hidden,
        }
    }
}

/// Where an element sits: its page, its id, and its parent element.
/// Each is assigned at most once.
#[derive(Default)]
struct Placement {
    page: Option<Weak<Page>>,
    id: Option<String>,
    parent: Option<Weak<Element>>,
}

/// An element within a page. Elements may nest.
///
/// Elements are always handled through `Arc`: the page and the parent node
/// both hold the same element, and the element refers back to them weakly.
///
/// Two elements are equal when they are the same element, or when both are
/// on the same page with the same id. Elements without a page or without an
/// id yet are only equal to themselves.
pub struct Element {
    kind: ElementKind,
    node: Node,
    placement: Lifecycle<Placement>,
}

impl fmt::Debug for Element {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Element")
            .field("kind", &self.kind)
            .field("id", &self.id_no_gen())
            .field("frozen", &self.is_frozen())
            .finish_non_exhaustive()
    }
}

impl PartialEq for Element {
    fn eq(&self, other: &Self) -> bool {
        if std::ptr::eq(self, other) {
            return true;
        }
        let (page, id) = self.placement.read(|p| (p.page.clone(), p.id.clone()));
        let (Some(page), Some(id)) = (page, id) else {
            return false;
        };
        other.placement.read(|p| {
            p.page.as_ref().is_some_and(|other_page| other_page.ptr_eq(&page))
                && p.id.as_deref() == Some(id.as_str())
        })
    }
}

impl Element {
    pub fn new(kind: ElementKind) -> Arc<Self> {
        Arc::new(Self {
            node: Node::with_label(kind.label()),
            kind,
            placement: Lifecycle::default(),
        })
    }

    pub fn heading(label: impl Into<String>) -> Arc<Self> {
        Self::new(ElementKind::Heading(Heading::new(label)))
    }

    pub fn link(link: Link) -> Arc<Self> {
        Self::new(ElementKind::Link(link))
    }

    pub fn kind(&self) -> &ElementKind {
        &self.kind
    }

    pub fn node(&self) -> &Node {
        &self.node
    }

    pub fn label(&self) -> &str {
        self.kind.label()
    }

    pub fn is_hidden(&self) -> bool {
        self.kind.is_hidden()
    }

    /// Frozen once both the node and the placement are frozen.
    pub fn is_frozen(&self) -> bool {
        self.placement.is_frozen() && self.node.is_frozen()
    }

    /// The page this element was added to.
    pub fn page(&self) -> Option<Arc<Page>> {
        self.placement.read(|p| p.page.as_ref().and_then(Weak::upgrade))
    }

    /// The element this one is nested in; `None` for top-level and
    /// standalone elements.
    pub fn parent_element(&self) -> Option<Arc<Element>> {
        self.placement.read(|p| p.parent.as_ref().and_then(Weak::upgrade))
    }

    /// The id, without generating one.
    pub fn id_no_gen(&self) -> Option<String> {
        self.placement.read(|p| p.id.clone())
    }

    /// The id, generating a page-unique one on first use.
    ///
    /// Elements that are not on a page keep no id until one is assigned.
    pub fn id(self: &Arc<Self>) -> Result<Option<String>> {
        if let Some(id) = self.id_no_gen() {
            return Ok(Some(id));
        }
        let Some(page) = self.page() else {
            return Ok(None);
        };
        if self.placement.is_frozen() {
            return Err(Error::Frozen);
        }
        let base = generate_id_prefix(self.kind.label(), self.kind.default_id_prefix());
        let claimed = page.claim_generated_id(&base, self)?;
        let stored = self
            .placement
            .update(|p| Ok(p.id.get_or_insert_with(|| claimed.clone()).clone()));
        match stored {
            Ok(id) if id == claimed => Ok(Some(id)),
            // Another caller assigned an id between the check and the update
            Ok(winner) => {
                page.release_generated_id(&claimed, self)?;
                Ok(Some(winner))
            }
            Err(err) => {
                page.release_generated_id(&claimed, self)?;
                Err(err)
            }
        }
    }

    /// Assign an explicit id. It must be valid and, once on a page, unique
    /// there.
    pub fn set_id(self: &Arc<Self>, id: impl Into<String>) -> Result<()> {
        let id = id.into();
        if self.placement.is_frozen() {
            return Err(Error::Frozen);
        }
        if self.id_no_gen().is_some() {
            return Err(Error::AlreadySet("id"));
        }
        if !is_valid_id(&id) {
            return Err(Error::InvalidId(id));
        }
        if let Some(page) = self.page() {
            page.index_element(&id, self, false)?;
        }
        self.placement.update(|p| {
            p.id = Some(id);
            Ok(())
        })
    }

    /// A reference to this element, once it has a page with a page
    /// reference and an id.
    pub fn element_ref(self: &Arc<Self>) -> Result<Option<ElementRef>> {
        let Some(page_ref) = self.page().and_then(|page| page.page_ref()) else {
            return Ok(None);
        };
        match self.id()? {
            Some(id) => ElementRef::new(page_ref, id).map(Some),
            None => Ok(None),
        }
    }

    /// Called by [`Page::add_element`].
    pub(crate) fn attach_page(&self, page: &Arc<Page>) -> Result<()> {
        if let Some(parent) = self.parent_element() {
            check_same_page(parent.page().as_ref(), Some(page))?;
        }
        self.placement.update(|p| {
            if p.page.is_some() {
                return Err(Error::AlreadySet("page"));
            }
            p.page = Some(Arc::downgrade(page));
            Ok(())
        })
    }

    fn attach_parent(&self, parent: &Arc<Element>) -> Result<()> {
        check_same_page(parent.page().as_ref(), self.page().as_ref())?;
        self.placement.update(|p| {
            if p.parent.is_some() {
                return Err(Error::AlreadySet("parent element"));
            }
            p.parent = Some(Arc::downgrade(parent));
            Ok(())
        })
    }

    /// Nest `child` in this element and register its writer.
    ///
    /// Behaves as [`Node::add_child_element`] and sets this element as the
    /// child's parent. On error the child is neither registered nor
    /// parented.
    pub fn add_child_element(
        self: &Arc<Self>,
        allocator: &mut IdAllocator,
        child: Arc<Element>,
        writer: impl ElementWriter + 'static,
    ) -> Result<ElementKey> {
        if self.node.is_frozen() {
            return Err(Error::Frozen);
        }
        check_same_page(self.page().as_ref(), child.page().as_ref())?;
        let key = self
            .node
            .register_child(allocator, Arc::clone(&child), Arc::new(writer))?;
        if let Err(err) = child.attach_parent(self) {
            self.node.unregister_child(key, &child)?;
            return Err(err);
        }
        Ok(key)
    }

    /// Freeze this element and, through its node, every nested element.
    ///
    /// An element on a page gets its id first, so frozen elements on a page
    /// always have one.
    pub fn freeze(self: &Arc<Self>) -> Result<()> {
        if self.is_frozen() {
            return Ok(());
        }
        if !self.placement.is_frozen() {
            self.id()?;
        }
        self.placement.freeze(|_| {});
        self.node.freeze()
    }
}

fn check_same_page(a: Option<&Arc<Page>>, b: Option<&Arc<Page>>) -> Result<()> {
    match (a, b) {
        (Some(a), Some(b)) if !Arc::ptr_eq(a, b) => Err(Error::PageMismatch),
        _ => Ok(()),
    }
}

impl ContentNode for Element {
    fn node(&self) -> &Node {
        &self.node
    }

    fn label(&self) -> String {
        self.kind.label().to_string()
    }
}
