//! Content nodes: the common part of pages and elements.

use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::io::Write;
use std::sync::Arc;

use bstr::BStr;

use super::element::Element;
use super::lifecycle::Lifecycle;
use super::refs::PageRef;
use super::render::{ElementContext, ElementWriter};
use crate::error::{Error, Result};
use crate::ids::IdAllocator;
use crate::marker::{ElementKey, MarkerWriter, ScanConfig};

/// Opaque property value attached to a node.
pub type PropertyValue = Arc<dyn Any + Send + Sync>;

/// A captured node body.
///
/// Bodies are byte buffers that may contain element markers. They are cheap
/// to clone and never change once created.
#[derive(Clone, PartialEq, Eq, Hash, Default)]
pub struct Body(Arc<[u8]>);

impl Body {
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        Self(Arc::from(bytes.into()))
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// True when there is no leading or trailing whitespace.
    pub fn is_trimmed(&self) -> bool {
        self.0.trim_ascii().len() == self.0.len()
    }
}

impl fmt::Debug for Body {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Body({:?})", BStr::new(&self.0))
    }
}

impl From<&str> for Body {
    fn from(s: &str) -> Self {
        Self::new(s.as_bytes())
    }
}

impl From<String> for Body {
    fn from(s: String) -> Self {
        Self::new(s.into_bytes())
    }
}

impl From<Vec<u8>> for Body {
    fn from(bytes: Vec<u8>) -> Self {
        Self::new(bytes)
    }
}

impl From<&[u8]> for Body {
    fn from(bytes: &[u8]) -> Self {
        Self::new(bytes)
    }
}

/// Building state of a node.
///
/// Collections sit behind `Arc` so readers get a snapshot by cloning the
/// pointer; mutation goes through `Arc::make_mut`, which copies only when a
/// snapshot is still alive.
#[derive(Default)]
struct NodeState {
    properties: Arc<Vec<(String, PropertyValue)>>,
    child_elements: Arc<Vec<Arc<Element>>>,
    element_writers: HashMap<ElementKey, Arc<dyn ElementWriter>>,
    files: Arc<Vec<PageRef>>,
    page_links: Arc<Vec<PageRef>>,
    body: Option<Body>,
}

/// A node contains elements, but is not necessarily an element itself.
///
/// A node also holds the files and pages it links to, arbitrary
/// properties, and a captured body. It is mutable until [`freeze`](Self::freeze)
/// is called, after which every mutator fails with [`Error::Frozen`].
///
/// Pages and elements each own a node; see [`ContentNode`].
pub struct Node {
    label: Option<String>,
    state: Lifecycle<NodeState>,
}

impl Default for Node {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Node")
            .field("label", &self.label)
            .field("frozen", &self.is_frozen())
            .field("child_elements", &self.child_elements().len())
            .finish_non_exhaustive()
    }
}

impl Node {
    pub fn new() -> Self {
        Self {
            label: None,
            state: Lifecycle::default(),
        }
    }

    /// A node with a fixed label, used in diagnostics.
    pub fn with_label(label: impl Into<String>) -> Self {
        Self {
            label: Some(label.into()),
            state: Lifecycle::default(),
        }
    }

    pub fn label(&self) -> &str {
        self.label.as_deref().unwrap_or_default()
    }

    pub fn is_frozen(&self) -> bool {
        self.state.is_frozen()
    }

    /// Freeze this node after freezing its child elements.
    ///
    /// Only the first call has any effect.
    pub fn freeze(&self) -> Result<()> {
        if self.is_frozen() {
            return Ok(());
        }
        for child in self.child_elements().iter() {
            child.freeze()?;
        }
        self.state.freeze(|_| {});
        Ok(())
    }

    /// Register a child element and the writer that renders it.
    ///
    /// Returns the key whose marker (see [`push_marker`](crate::marker::push_marker))
    /// the caller embeds in this node's body. The key is unique among this
    /// node's registered keys.
    pub fn add_child_element(
        &self,
        allocator: &mut IdAllocator,
        element: Arc<Element>,
        writer: impl ElementWriter + 'static,
    ) -> Result<ElementKey> {
        self.register_child(allocator, element, Arc::new(writer))
    }

    pub(crate) fn register_child(
        &self,
        allocator: &mut IdAllocator,
        element: Arc<Element>,
        writer: Arc<dyn ElementWriter>,
    ) -> Result<ElementKey> {
        self.state.update(|state| {
            let key = allocator.allocate(|key| state.element_writers.contains_key(&key))?;
            state.element_writers.insert(key, writer);
            Arc::make_mut(&mut state.child_elements).push(element);
            Ok(key)
        })
    }

    /// Undo a [`register_child`](Self::register_child).
    pub(crate) fn unregister_child(&self, key: ElementKey, element: &Arc<Element>) -> Result<()> {
        self.state.update(|state| {
            state.element_writers.remove(&key);
            let children = Arc::make_mut(&mut state.child_elements);
            if let Some(pos) = children.iter().rposition(|c| Arc::ptr_eq(c, element)) {
                children.remove(pos);
            }
            Ok(())
        })
    }

    /// Child elements in the order they were added.
    pub fn child_elements(&self) -> Arc<Vec<Arc<Element>>> {
        self.state.read(|state| Arc::clone(&state.child_elements))
    }

    /// The writer registered under `key`, if any.
    pub fn element_writer(&self, key: ElementKey) -> Option<Arc<dyn ElementWriter>> {
        self.state.read(|state| state.element_writers.get(&key).cloned())
    }

    /// Record a file this node links to. Adding the same file twice keeps
    /// the first position.
    pub fn add_file(&self, file: PageRef) -> Result<()> {
        self.state.update(|state| {
            if !state.files.contains(&file) {
                Arc::make_mut(&mut state.files).push(file);
            }
            Ok(())
        })
    }

    /// Files this node links to directly, excluding those of child elements.
    pub fn files(&self) -> Arc<Vec<PageRef>> {
        self.state.read(|state| Arc::clone(&state.files))
    }

    /// Record a page this node links to. Adding the same page twice keeps
    /// the first position.
    pub fn add_page_link(&self, page: PageRef) -> Result<()> {
        self.state.update(|state| {
            if !state.page_links.contains(&page) {
                Arc::make_mut(&mut state.page_links).push(page);
            }
            Ok(())
        })
    }

    /// Pages this node links to directly, excluding those of child elements.
    pub fn page_links(&self) -> Arc<Vec<PageRef>> {
        self.state.read(|state| Arc::clone(&state.page_links))
    }

    /// Set a property. Each name may be set once.
    pub fn set_property(&self, name: impl Into<String>, value: PropertyValue) -> Result<()> {
        let name = name.into();
        self.state.update(|state| {
            if state.properties.iter().any(|(n, _)| *n == name) {
                return Err(Error::DuplicateProperty(name));
            }
            Arc::make_mut(&mut state.properties).push((name, value));
            Ok(())
        })
    }

    pub fn property(&self, name: &str) -> Option<PropertyValue> {
        self.state.read(|state| {
            state
                .properties
                .iter()
                .find(|(n, _)| n == name)
                .map(|(_, v)| Arc::clone(v))
        })
    }

    /// A property downcast to its concrete type.
    pub fn property_as<T: Any + Send + Sync>(&self, name: &str) -> Option<Arc<T>> {
        self.property(name)?.downcast::<T>().ok()
    }

    /// All properties in the order they were set.
    pub fn properties(&self) -> Arc<Vec<(String, PropertyValue)>> {
        self.state.read(|state| Arc::clone(&state.properties))
    }

    /// Set the captured body. May be called once.
    ///
    /// The body must already be trimmed of leading and trailing whitespace;
    /// this is checked in debug builds only.
    pub fn set_body(&self, body: impl Into<Body>) -> Result<()> {
        let body = body.into();
        debug_assert!(body.is_trimmed(), "body must have already been trimmed");
        self.state.update(|state| {
            if state.body.is_some() {
                return Err(Error::AlreadySet("body"));
            }
            state.body = Some(body);
            Ok(())
        })
    }

    /// The captured body; empty when never set.
    pub fn body(&self) -> Body {
        self.state.read(|state| state.body.clone().unwrap_or_default())
    }

    /// Stream the body to `out`, rendering child elements in place of
    /// their markers.
    pub fn write_body(&self, out: &mut dyn Write, context: &dyn ElementContext) -> Result<()> {
        self.write_body_with(out, context, ScanConfig::default())
    }

    pub fn write_body_with(
        &self,
        out: &mut dyn Write,
        context: &dyn ElementContext,
        config: ScanConfig,
    ) -> Result<()> {
        let body = self.body();
        let mut writer = MarkerWriter::with_config(self, out, context, config);
        writer.feed(body.as_bytes())?;
        writer.finish()
    }
}

/// Common capabilities of pages, elements, and bare nodes.
pub trait ContentNode {
    /// The node holding children, body, and links.
    fn node(&self) -> &Node;

    /// A short description, useful for links and lists.
    fn label(&self) -> String;

    fn is_frozen(&self) -> bool {
        self.node().is_frozen()
    }

    fn body(&self) -> Body {
        self.node().body()
    }

    fn child_elements(&self) -> Arc<Vec<Arc<Element>>> {
        self.node().child_elements()
    }

    fn write_body(&self, out: &mut dyn Write, context: &dyn ElementContext) -> Result<()> {
        self.node().write_body(out, context)
    }
}

impl ContentNode for Node {
    fn node(&self) -> &Node {
        self
    }

    fn label(&self) -> String {
        Node::label(self).to_string()
    }
}

#[cfg(test)]
mod tests {
    use std::io;

    use super::*;
    use crate::marker::push_marker;
    use crate::model::{BookRef, NullContext};

    fn page_ref(path: &str) -> PageRef {
        PageRef::new(BookRef::new("example.com", "/").unwrap(), path).unwrap()
    }

    fn fixed(text: &'static str) -> impl ElementWriter {
        move |out: &mut dyn Write, _: &dyn ElementContext| -> io::Result<()> {
            out.write_all(text.as_bytes())
        }
    }

    #[test]
    fn test_body_set_once() {
        let node = Node::new();
        assert!(node.body().is_empty());
        node.set_body("<p>hi</p>").unwrap();
        assert!(matches!(node.set_body("again"), Err(Error::AlreadySet("body"))));
        assert_eq!(node.body().as_bytes(), b"<p>hi</p>");
    }

    #[test]
    fn test_body_trimmed() {
        assert!(Body::from("a b").is_trimmed());
        assert!(!Body::from(" a").is_trimmed());
        assert!(!Body::from("a\n").is_trimmed());
        assert!(!Body::from("\ta\r\n").is_trimmed());
        assert!(Body::from("").is_trimmed());
    }

    #[test]
    fn test_page_links_dedupe_in_order() {
        let node = Node::new();
        node.add_page_link(page_ref("/b")).unwrap();
        node.add_page_link(page_ref("/a")).unwrap();
        node.add_page_link(page_ref("/b")).unwrap();
        let links = node.page_links();
        assert_eq!(*links, vec![page_ref("/b"), page_ref("/a")]);
    }

    #[test]
    fn test_properties_write_once() {
        let node = Node::new();
        node.set_property("weight", Arc::new(3u32)).unwrap();
        let err = node.set_property("weight", Arc::new(4u32)).unwrap_err();
        assert!(matches!(err, Error::DuplicateProperty(name) if name == "weight"));
        assert_eq!(node.property_as::<u32>("weight").as_deref(), Some(&3));
        assert!(node.property_as::<String>("weight").is_none());
        assert!(node.property("missing").is_none());
    }

    #[test]
    fn test_snapshot_unaffected_by_later_mutation() {
        let node = Node::new();
        node.add_file(page_ref("/a.png")).unwrap();
        let before = node.files();
        node.add_file(page_ref("/b.png")).unwrap();
        assert_eq!(before.len(), 1);
        assert_eq!(node.files().len(), 2);
    }

    #[test]
    fn test_keys_unique_within_node() {
        let node = Node::new();
        let mut alloc = IdAllocator::new();
        let mut keys = Vec::new();
        for i in 0..100 {
            let key = node
                .add_child_element(&mut alloc, Element::heading(format!("h{i}")), fixed("x"))
                .unwrap();
            keys.push(key);
        }
        keys.sort();
        keys.dedup();
        assert_eq!(keys.len(), 100);
        assert_eq!(node.child_elements().len(), 100);
    }

    #[test]
    fn test_write_body_substitutes() {
        let node = Node::with_label("Test Node");
        let key = node
            .add_child_element(&mut IdAllocator::new(), Element::heading("Child"), fixed("<child/>"))
            .unwrap();
        let mut body = String::from("<node>");
        push_marker(key, &mut body);
        body.push_str("</node>");
        node.set_body(body).unwrap();
        node.freeze().unwrap();

        let mut out = Vec::new();
        node.write_body(&mut out, &NullContext).unwrap();
        assert_eq!(out, b"<node><child/></node>");
    }

    #[test]
    fn test_mutators_fail_after_freeze() {
        let node = Node::new();
        node.freeze().unwrap();
        let mut alloc = IdAllocator::new();
        assert!(matches!(
            node.add_child_element(&mut alloc, Element::heading("x"), fixed("")),
            Err(Error::Frozen)
        ));
        assert!(matches!(node.add_file(page_ref("/f")), Err(Error::Frozen)));
        assert!(matches!(node.add_page_link(page_ref("/p")), Err(Error::Frozen)));
        assert!(matches!(node.set_property("k", Arc::new(1u8)), Err(Error::Frozen)));
        assert!(matches!(node.set_body("b"), Err(Error::Frozen)));
    }

    #[test]
    fn test_freeze_freezes_children() {
        let node = Node::new();
        let child = Element::heading("Child");
        node.add_child_element(&mut IdAllocator::new(), Arc::clone(&child), fixed(""))
            .unwrap();
        node.freeze().unwrap();
        assert!(child.is_frozen());
    }
}
