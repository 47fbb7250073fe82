//! Rendering collaborators: how deferred elements get written out.

use std::collections::BTreeMap;
use std::io::{self, Write};

/// Named arguments passed along with an include.
pub type IncludeArgs = BTreeMap<String, String>;

/// Processes includes of other resources while elements are written.
///
/// The model never interprets includes; it only hands the context through
/// to each [`ElementWriter`].
pub trait ElementContext {
    /// Include `resource` into `out` with the given arguments.
    fn include(&self, resource: &str, out: &mut dyn Write, args: &IncludeArgs) -> io::Result<()>;
}

impl<F> ElementContext for F
where
    F: Fn(&str, &mut dyn Write, &IncludeArgs) -> io::Result<()>,
{
    fn include(&self, resource: &str, out: &mut dyn Write, args: &IncludeArgs) -> io::Result<()> {
        self(resource, out, args)
    }
}

/// A context that ignores every include.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullContext;

impl ElementContext for NullContext {
    fn include(&self, _resource: &str, _out: &mut dyn Write, _args: &IncludeArgs) -> io::Result<()> {
        Ok(())
    }
}

/// Writes one element into an output sink.
///
/// This covers everything the element renders: what comes before its body,
/// the body itself, and what comes after. Registered with
/// [`Node::add_child_element`](crate::model::Node::add_child_element) and
/// invoked when the element's marker is reached while streaming the parent
/// body. It is not called when the output would otherwise be discarded.
pub trait ElementWriter: Send + Sync {
    fn write_to(&self, out: &mut dyn Write, context: &dyn ElementContext) -> io::Result<()>;
}

impl<F> ElementWriter for F
where
    F: Fn(&mut dyn Write, &dyn ElementContext) -> io::Result<()> + Send + Sync,
{
    fn write_to(&self, out: &mut dyn Write, context: &dyn ElementContext) -> io::Result<()> {
        self(out, context)
    }
}
