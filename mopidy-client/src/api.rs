//! Generated API surface
//!
//! Mopidy describes its whole API through `core.describe`: a flat map from
//! dotted method names to parameter lists. [`build`] turns that map into a tree
//! of [`ApiNode`]s mirroring the namespace, with camelCased segment names and
//! the `core` root dropped:
//!
//! ```text
//! core.playback.seek(time_position)   →  api["playback"]["seek"](55)
//! core.tracklist.get_tl_tracks()      →  api["tracklist"]["getTlTracks"]()
//! ```
//!
//! The tree is generic over what a call returns. The session uses an invoker
//! returning a boxed future; tests can use one that simply echoes the request.
//!
//! # Examples
//!
//! ```rust
//! use mopidy_client::api::{self, Invoker};
//! use mopidy_core::{Catalog, MethodDescription, ParameterSpec, Params};
//! use serde_json::{json, Value};
//! use std::sync::Arc;
//!
//! let catalog: Catalog = vec![MethodDescription::new(
//!     "core.playback.seek",
//!     vec![ParameterSpec::positional("time_position")],
//! )];
//!
//! let echo: Invoker<Value> = Arc::new(|method: &str, params: Option<Params>| {
//!     json!({"method": method, "params": params})
//! });
//! let root = api::build(&catalog, echo);
//!
//! let seek = root.lookup("playback.seek").unwrap();
//! assert_eq!(
//!     seek.call(vec![json!(55)]),
//!     Some(json!({"method": "core.playback.seek", "params": {"time_position": 55}}))
//! );
//! ```

use mopidy_core::naming::{split_method_path, to_camel_case};
use mopidy_core::{Catalog, MethodDescription, Params};
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Issues one RPC: full dotted method name plus optional keyword bag
pub type Invoker<T> = Arc<dyn Fn(&str, Option<Params>) -> T + Send + Sync>;

/// A callable leaf bound to one catalog entry
pub struct ApiMethod<T> {
    full_name: String,
    description: Option<String>,
    param_names: Vec<String>,
    takes_arguments: bool,
    invoke: Invoker<T>,
}

impl<T> ApiMethod<T> {
    fn new(method: &MethodDescription, invoke: Invoker<T>) -> Self {
        Self {
            full_name: method.name.clone(),
            description: method.description.clone(),
            param_names: method.positional_names().map(str::to_owned).collect(),
            takes_arguments: method.takes_arguments(),
            invoke,
        }
    }

    /// The dotted name sent on the wire
    pub fn full_name(&self) -> &str {
        &self.full_name
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    /// Declared positional parameter names, keyword marker excluded
    pub fn param_names(&self) -> &[String] {
        &self.param_names
    }

    /// Call with positional arguments
    ///
    /// Arguments are paired with the declared names in order; extras are
    /// ignored and missing ones are left out of the bag. A method without
    /// positional parameters is always invoked without a bag.
    pub fn call(&self, args: Vec<Value>) -> T {
        if !self.takes_arguments {
            return (self.invoke)(&self.full_name, None);
        }

        let params: Params = self
            .param_names
            .iter()
            .cloned()
            .zip(args)
            .collect();

        (self.invoke)(&self.full_name, Some(params))
    }

    /// Call with an explicit keyword bag, bypassing positional mapping
    pub fn call_with(&self, params: Option<Params>) -> T {
        (self.invoke)(&self.full_name, params)
    }
}

impl<T> Clone for ApiMethod<T> {
    fn clone(&self) -> Self {
        Self {
            full_name: self.full_name.clone(),
            description: self.description.clone(),
            param_names: self.param_names.clone(),
            takes_arguments: self.takes_arguments,
            invoke: Arc::clone(&self.invoke),
        }
    }
}

impl<T> std::fmt::Debug for ApiMethod<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiMethod")
            .field("full_name", &self.full_name)
            .field("param_names", &self.param_names)
            .finish_non_exhaustive()
    }
}

/// One namespace level of the generated API
///
/// A node can be a namespace, a method, or both: when a catalog declares
/// `a.b` and `a.b.c`, the node `b` is callable and also has a child `c`.
pub struct ApiNode<T> {
    method: Option<ApiMethod<T>>,
    children: BTreeMap<String, ApiNode<T>>,
}

impl<T> Default for ApiNode<T> {
    fn default() -> Self {
        Self {
            method: None,
            children: BTreeMap::new(),
        }
    }
}

impl<T> Clone for ApiNode<T> {
    fn clone(&self) -> Self {
        Self {
            method: self.method.clone(),
            children: self.children.clone(),
        }
    }
}

impl<T> std::fmt::Debug for ApiNode<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiNode")
            .field("method", &self.method)
            .field("children", &self.children)
            .finish()
    }
}

impl<T> ApiNode<T> {
    /// Child by camelCase name
    pub fn get(&self, name: &str) -> Option<&ApiNode<T>> {
        self.children.get(name)
    }

    /// Descendant by dotted camelCase path, e.g. `"tracklist.getTlTracks"`
    ///
    /// An empty path returns the node itself.
    pub fn lookup(&self, path: &str) -> Option<&ApiNode<T>> {
        if path.is_empty() {
            return Some(self);
        }
        path.split('.').try_fold(self, |node, segment| node.get(segment))
    }

    pub fn method(&self) -> Option<&ApiMethod<T>> {
        self.method.as_ref()
    }

    pub fn is_callable(&self) -> bool {
        self.method.is_some()
    }

    /// Invoke this node's method, or `None` if it is only a namespace
    pub fn call(&self, args: Vec<Value>) -> Option<T> {
        self.method.as_ref().map(|m| m.call(args))
    }

    pub fn children(&self) -> impl Iterator<Item = (&str, &ApiNode<T>)> {
        self.children.iter().map(|(name, node)| (name.as_str(), node))
    }

    /// Number of callable nodes in this subtree
    pub fn leaf_count(&self) -> usize {
        usize::from(self.is_callable())
            + self.children.values().map(ApiNode::leaf_count).sum::<usize>()
    }

    /// Namespace levels needed to reach the deepest method below this node
    ///
    /// `core.playback.pause` gives 1 (`playback`), `foo_bar` gives 0.
    pub fn depth(&self) -> usize {
        self.height().saturating_sub(1)
    }

    fn height(&self) -> usize {
        self.children
            .values()
            .map(|child| child.height() + 1)
            .max()
            .unwrap_or(0)
    }

    fn child_mut(&mut self, name: String) -> &mut ApiNode<T> {
        self.children.entry(name).or_default()
    }
}

/// Build the API tree for `catalog`, every leaf calling through `invoke`
///
/// Entries are processed in catalog order, which is the order the server
/// listed them in. Two entries mapping to the same camelCase path (say
/// `foo_bar` and `fooBar`) collide; the one listed later wins and the
/// collision is logged. A bare `core` method lands on the root node.
pub fn build<T>(catalog: &Catalog, invoke: Invoker<T>) -> ApiNode<T> {
    let mut root = ApiNode::default();

    for method in catalog {
        let full_name = &method.name;
        let path = split_method_path(full_name);

        let mut node = &mut root;
        for segment in &path {
            node = node.child_mut(to_camel_case(segment));
        }

        let leaf = ApiMethod::new(method, Arc::clone(&invoke));
        if let Some(previous) = node.method.replace(leaf) {
            tracing::warn!(
                method = %full_name,
                replaced = %previous.full_name,
                "Generated API name collision, keeping the later method"
            );
        }
    }

    tracing::debug!(methods = root.leaf_count(), "Built API surface");
    root
}
