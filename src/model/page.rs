//! Pages: the root of an element tree, indexing every element by id.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;

use super::author::Author;
use super::element::Element;
use super::lifecycle::Lifecycle;
use super::node::{ContentNode, Node};
use super::refs::{ChildRef, PageRef, ParentRef};
use super::render::ElementWriter;
use crate::error::{Error, Result};
use crate::ids::{IdAllocator, unique_id};
use crate::marker::ElementKey;

#[derive(Default)]
struct PageState {
    page_ref: Option<PageRef>,
    src: Option<PageRef>,
    title: Option<String>,
    short_title: Option<String>,
    description: Option<String>,
    keywords: Option<String>,
    allow_robots: Option<bool>,
    authors: Arc<Vec<Author>>,
    parent_pages: Arc<Vec<ParentRef>>,
    allow_parent_mismatch: bool,
    child_pages: Arc<Vec<ChildRef>>,
    allow_child_mismatch: bool,
    elements: Arc<Vec<Arc<Element>>>,
    elements_by_id: Arc<HashMap<String, Arc<Element>>>,
    generated_ids: Arc<HashSet<String>>,
}

/// A page: metadata, a body, and every element declared on it.
///
/// Pages are handled through `Arc` so their elements can refer back to
/// them. Two pages are equal when they are the same page or share a
/// page reference.
pub struct Page {
    node: Node,
    state: Lifecycle<PageState>,
}

impl fmt::Debug for Page {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Page")
            .field("page_ref", &self.page_ref())
            .field("title", &self.title())
            .field("elements", &self.elements().len())
            .field("frozen", &self.is_frozen())
            .finish_non_exhaustive()
    }
}

impl PartialEq for Page {
    fn eq(&self, other: &Self) -> bool {
        if std::ptr::eq(self, other) {
            return true;
        }
        match (self.page_ref(), other.page_ref()) {
            (Some(a), Some(b)) => a == b,
            _ => false,
        }
    }
}

macro_rules! page_setter {
    ($(#[$doc:meta])* $name:ident, $field:ident: $ty:ty) => {
        $(#[$doc])*
        pub fn $name(&self, value: $ty) -> Result<()> {
            self.state.update(|state| {
                state.$field = value;
                Ok(())
            })
        }
    };
}

impl Page {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            node: Node::new(),
            state: Lifecycle::default(),
        })
    }

    pub fn node(&self) -> &Node {
        &self.node
    }

    pub fn is_frozen(&self) -> bool {
        self.state.is_frozen() && self.node.is_frozen()
    }

    page_setter!(
        /// The reference that identifies this page.
        set_page_ref, page_ref: Option<PageRef>
    );
    page_setter!(
        /// The editable source of this page, if any.
        set_src, src: Option<PageRef>
    );
    page_setter!(set_title, title: Option<String>);
    page_setter!(
        /// Used where the context is already established, such as a
        /// breadcrumb. Defaults to the title.
        set_short_title, short_title: Option<String>
    );
    page_setter!(set_description, description: Option<String>);
    page_setter!(set_keywords, keywords: Option<String>);
    page_setter!(
        /// `None` inherits from the parent pages or the book.
        set_allow_robots, allow_robots: Option<bool>
    );
    page_setter!(set_allow_parent_mismatch, allow_parent_mismatch: bool);
    page_setter!(set_allow_child_mismatch, allow_child_mismatch: bool);

    pub fn page_ref(&self) -> Option<PageRef> {
        self.state.read(|s| s.page_ref.clone())
    }

    pub fn src(&self) -> Option<PageRef> {
        self.state.read(|s| s.src.clone())
    }

    pub fn title(&self) -> Option<String> {
        self.state.read(|s| s.title.clone())
    }

    /// The short title, falling back to the title.
    pub fn short_title(&self) -> Option<String> {
        self.state
            .read(|s| s.short_title.clone().or_else(|| s.title.clone()))
    }

    pub fn description(&self) -> Option<String> {
        self.state.read(|s| s.description.clone())
    }

    pub fn keywords(&self) -> Option<String> {
        self.state.read(|s| s.keywords.clone())
    }

    pub fn allow_robots(&self) -> Option<bool> {
        self.state.read(|s| s.allow_robots)
    }

    pub fn allow_parent_mismatch(&self) -> bool {
        self.state.read(|s| s.allow_parent_mismatch)
    }

    pub fn allow_child_mismatch(&self) -> bool {
        self.state.read(|s| s.allow_child_mismatch)
    }

    pub fn add_author(&self, author: Author) -> Result<()> {
        self.state.update(|state| {
            if state.authors.contains(&author) {
                return Err(Error::DuplicateAuthor(author.to_string()));
            }
            Arc::make_mut(&mut state.authors).push(author);
            Ok(())
        })
    }

    pub fn authors(&self) -> Arc<Vec<Author>> {
        self.state.read(|s| Arc::clone(&s.authors))
    }

    /// Add a parent page. Parents are distinct by page; the short title
    /// does not count.
    pub fn add_parent_page(&self, parent: impl Into<ParentRef>) -> Result<()> {
        let parent = parent.into();
        self.state.update(|state| {
            if state.parent_pages.contains(&parent) {
                return Err(Error::DuplicateParentPage(parent.page().to_string()));
            }
            Arc::make_mut(&mut state.parent_pages).push(parent);
            Ok(())
        })
    }

    pub fn parent_pages(&self) -> Arc<Vec<ParentRef>> {
        self.state.read(|s| Arc::clone(&s.parent_pages))
    }

    pub fn add_child_page(&self, child: impl Into<ChildRef>) -> Result<()> {
        let child = child.into();
        self.state.update(|state| {
            if state.child_pages.contains(&child) {
                return Err(Error::DuplicateChildPage(child.to_string()));
            }
            Arc::make_mut(&mut state.child_pages).push(child);
            Ok(())
        })
    }

    pub fn child_pages(&self) -> Arc<Vec<ChildRef>> {
        self.state.read(|s| Arc::clone(&s.child_pages))
    }

    /// Declare `element` on this page.
    ///
    /// An element that already has an id is indexed right away; one without
    /// gets a generated id on first read or when the page is frozen.
    pub fn add_element(self: &Arc<Self>, element: &Arc<Element>) -> Result<()> {
        if self.state.is_frozen() {
            return Err(Error::Frozen);
        }
        let id = element.id_no_gen();
        if let Some(id) = &id
            && self.element_by_id(id).is_some()
        {
            return Err(Error::DuplicateId(id.clone()));
        }
        element.attach_page(self)?;
        self.state.update(|state| {
            if let Some(id) = id {
                index(state, id, element, false)?;
            }
            Arc::make_mut(&mut state.elements).push(Arc::clone(element));
            Ok(())
        })
    }

    /// Register a top-level element of this page's body and its writer.
    ///
    /// See [`Node::add_child_element`]. The element still has to be
    /// declared with [`add_element`](Self::add_element).
    pub fn add_child_element(
        &self,
        allocator: &mut IdAllocator,
        element: Arc<Element>,
        writer: impl ElementWriter + 'static,
    ) -> Result<ElementKey> {
        self.node.add_child_element(allocator, element, writer)
    }

    /// Index an element whose id was just assigned.
    pub(crate) fn index_element(&self, id: &str, element: &Arc<Element>, generated: bool) -> Result<()> {
        self.state
            .update(|state| index(state, id.to_string(), element, generated))
    }

    /// Pick the first free id in the `base`, `base-2`, `base-3`, ... sequence
    /// and index `element` under it as a generated id.
    pub(crate) fn claim_generated_id(&self, base: &str, element: &Arc<Element>) -> Result<String> {
        self.state.update(|state| {
            let id = unique_id(base, |candidate| state.elements_by_id.contains_key(candidate));
            index(state, id.clone(), element, true)?;
            log::trace!("generated element id {id}");
            Ok(id)
        })
    }

    /// Drop a generated id that lost a race to another assignment.
    pub(crate) fn release_generated_id(&self, id: &str, element: &Arc<Element>) -> Result<()> {
        self.state.update(|state| {
            let owned = state
                .elements_by_id
                .get(id)
                .is_some_and(|indexed| Arc::ptr_eq(indexed, element));
            if owned {
                Arc::make_mut(&mut state.elements_by_id).remove(id);
                Arc::make_mut(&mut state.generated_ids).remove(id);
            }
            Ok(())
        })
    }

    /// Elements in declaration order, nested ones included.
    pub fn elements(&self) -> Arc<Vec<Arc<Element>>> {
        self.state.read(|s| Arc::clone(&s.elements))
    }

    pub fn elements_by_id(&self) -> Arc<HashMap<String, Arc<Element>>> {
        self.state.read(|s| Arc::clone(&s.elements_by_id))
    }

    /// The ids that were generated rather than assigned.
    pub fn generated_ids(&self) -> Arc<HashSet<String>> {
        self.state.read(|s| Arc::clone(&s.generated_ids))
    }

    pub fn element_by_id(&self, id: &str) -> Option<Arc<Element>> {
        self.state.read(|s| s.elements_by_id.get(id).cloned())
    }

    /// Elements matching `predicate`, in declaration order.
    pub fn filter_elements(&self, mut predicate: impl FnMut(&Element) -> bool) -> Vec<Arc<Element>> {
        self.elements()
            .iter()
            .filter(|element| predicate(element))
            .cloned()
            .collect()
    }

    /// Freeze the page.
    ///
    /// Ids are generated for every element in declaration order, then the
    /// elements are frozen, then the page's own state is sealed. Only the
    /// first call has any effect.
    pub fn freeze(self: &Arc<Self>) -> Result<()> {
        if self.is_frozen() {
            return Ok(());
        }
        let elements = self.elements();
        // Nested elements freeze with their parent, so ids must all exist first
        for element in elements.iter() {
            element.id()?;
        }
        for element in elements.iter() {
            element.freeze()?;
        }
        self.state.freeze(|state| {
            debug_assert_eq!(
                state.elements.len(),
                state.elements_by_id.len(),
                "elements and elements_by_id are different sizes"
            );
        });
        self.node.freeze()?;
        log::debug!(
            "froze page {} with {} elements",
            self.label(),
            elements.len()
        );
        Ok(())
    }

    /// The short title, or an empty label when the page has no title.
    pub fn label(&self) -> String {
        self.short_title().unwrap_or_default()
    }
}

fn index(state: &mut PageState, id: String, element: &Arc<Element>, generated: bool) -> Result<()> {
    if state.elements_by_id.contains_key(&id) {
        return Err(Error::DuplicateId(id));
    }
    if generated {
        Arc::make_mut(&mut state.generated_ids).insert(id.clone());
    }
    Arc::make_mut(&mut state.elements_by_id).insert(id, Arc::clone(element));
    Ok(())
}

impl ContentNode for Page {
    fn node(&self) -> &Node {
        &self.node
    }

    fn label(&self) -> String {
        Page::label(self)
    }

    fn is_frozen(&self) -> bool {
        Page::is_frozen(self)
    }
}
