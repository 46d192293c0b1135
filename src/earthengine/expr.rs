//! Lazy Earth Engine expressions and their wire encoding.
//!
//! An [Expr] is an immutable tree of constants, algorithm invocations and function definitions.
//! Sub-trees are reference counted, so reusing a value (a region geometry, a collection) is cheap
//! and the encoder emits it only once.
//!
//! [Expression] is the REST API `Expression` message: a flat map of value nodes keyed by id, plus
//! the id of the result.

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

/// Placeholder argument used while measuring the nesting depth of a function body.
const PROBE_ARGUMENT: &str = "_MAPPING_VAR_PROBE";

#[derive(Debug, PartialEq)]
enum Node {
    Constant(Value),
    Array(Vec<Expr>),
    Dictionary(BTreeMap<String, Expr>),
    Invocation {
        function: String,
        arguments: BTreeMap<String, Expr>,
    },
    Function {
        argument_names: Vec<String>,
        body: Expr,
    },
    Argument(String),
}

/// A node of a lazy Earth Engine expression.
#[derive(Clone, Debug, PartialEq)]
pub struct Expr(Arc<Node>);

impl Expr {
    fn new(node: Node) -> Self {
        Expr(Arc::new(node))
    }

    /// A JSON literal: number, string, boolean, null or an array of those.
    pub fn constant(value: impl Into<Value>) -> Self {
        Self::new(Node::Constant(value.into()))
    }

    /// An array whose elements are themselves expressions.
    pub fn array(items: impl IntoIterator<Item = Expr>) -> Self {
        Self::new(Node::Array(items.into_iter().collect()))
    }

    /// A dictionary whose values are expressions.
    pub fn dictionary<K: Into<String>>(entries: impl IntoIterator<Item = (K, Expr)>) -> Self {
        Self::new(Node::Dictionary(
            entries.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        ))
    }

    /// Invocation of a named Earth Engine algorithm, e.g. `Image.select`.
    pub fn invoke<K: Into<String>>(
        function: &str,
        arguments: impl IntoIterator<Item = (K, Expr)>,
    ) -> Self {
        Self::new(Node::Invocation {
            function: function.to_string(),
            arguments: arguments.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        })
    }

    /// Invocation of an algorithm without arguments, e.g. `Reducer.mean`.
    pub fn call(function: &str) -> Self {
        Self::invoke(function, std::iter::empty::<(&str, Expr)>())
    }

    /// Reference to an argument of an enclosing function definition.
    pub fn argument(name: &str) -> Self {
        Self::new(Node::Argument(name.to_string()))
    }

    /// Define a one-argument function, as used by `Collection.map`.
    ///
    /// The argument is named `_MAPPING_VAR_<depth>_0`, where `depth` counts the function
    /// definitions nested in the body. Inner functions therefore always use a smaller depth than
    /// the function enclosing them, and the generated names are deterministic. The body closure
    /// is called twice: once to measure the depth, once with the final argument name.
    pub fn function<F>(body: F) -> Self
    where
        F: Fn(Expr) -> Expr,
    {
        let depth = body(Expr::argument(PROBE_ARGUMENT)).function_depth();
        let name = format!("_MAPPING_VAR_{depth}_0");
        let body = body(Expr::argument(&name));
        Self::new(Node::Function {
            argument_names: vec![name],
            body,
        })
    }

    /// Returns the literal value if this is a constant.
    pub fn as_constant(&self) -> Option<&Value> {
        match self.0.as_ref() {
            Node::Constant(value) => Some(value),
            _ => None,
        }
    }

    /// Returns the algorithm name if this is an invocation.
    pub fn function_name(&self) -> Option<&str> {
        match self.0.as_ref() {
            Node::Invocation { function, .. } => Some(function),
            _ => None,
        }
    }

    /// Returns a named argument if this is an invocation.
    pub fn argument_value(&self, name: &str) -> Option<&Expr> {
        match self.0.as_ref() {
            Node::Invocation { arguments, .. } => arguments.get(name),
            _ => None,
        }
    }

    /// Maximum number of function definitions nested inside this expression.
    fn function_depth(&self) -> usize {
        match self.0.as_ref() {
            Node::Constant(_) | Node::Argument(_) => 0,
            Node::Function { body, .. } => 1 + body.function_depth(),
            Node::Array(items) => items.iter().map(Expr::function_depth).max().unwrap_or(0),
            Node::Dictionary(entries) => entries
                .values()
                .map(Expr::function_depth)
                .max()
                .unwrap_or(0),
            Node::Invocation { arguments, .. } => arguments
                .values()
                .map(Expr::function_depth)
                .max()
                .unwrap_or(0),
        }
    }
}

/// An encoded expression graph, as accepted by `value:compute`.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct Expression {
    /// Value nodes keyed by id.
    pub values: BTreeMap<String, Value>,
    /// Id of the value to compute.
    pub result: String,
}

impl Expression {
    /// Encode the expression rooted at `root`.
    pub fn from_root(root: &Expr) -> Self {
        let mut encoder = Encoder::default();
        let node = encoder.encode(root);
        let result = encoder.id_of(node);
        Expression {
            values: encoder.values,
            result,
        }
    }

    /// Returns the value node stored under `id`.
    pub fn value(&self, id: &str) -> Option<&Value> {
        self.values.get(id)
    }

    /// Returns the value node of the result.
    pub fn result_value(&self) -> Option<&Value> {
        self.value(&self.result)
    }

    /// Follow a `valueReference` node to the node it references. Other nodes are returned as is.
    pub fn resolve<'a>(&'a self, node: &'a Value) -> &'a Value {
        match node.get("valueReference").and_then(Value::as_str) {
            Some(id) => self.value(id).map(|v| self.resolve(v)).unwrap_or(node),
            None => node,
        }
    }
}

/// Flattens an [Expr] tree into value nodes.
///
/// Constants and argument references are inlined. Every other node is stored once in `values`
/// and replaced by a `valueReference`; structurally identical nodes share an id.
#[derive(Default)]
struct Encoder {
    values: BTreeMap<String, Value>,
    ids: HashMap<String, String>,
    encoded: HashMap<*const Node, Value>,
}

impl Encoder {
    fn encode(&mut self, expr: &Expr) -> Value {
        let key = Arc::as_ptr(&expr.0);
        if let Some(encoded) = self.encoded.get(&key) {
            return encoded.clone();
        }
        let encoded = match expr.0.as_ref() {
            Node::Constant(value) => json!({ "constantValue": value }),
            Node::Argument(name) => json!({ "argumentReference": name }),
            Node::Array(items) => {
                let values: Vec<Value> = items.iter().map(|item| self.encode(item)).collect();
                self.reference(json!({ "arrayValue": { "values": values } }))
            }
            Node::Dictionary(entries) => {
                let values = self.encode_map(entries);
                self.reference(json!({ "dictionaryValue": { "values": values } }))
            }
            Node::Invocation {
                function,
                arguments,
            } => {
                let arguments = self.encode_map(arguments);
                self.reference(json!({
                    "functionInvocationValue": {
                        "functionName": function,
                        "arguments": arguments,
                    }
                }))
            }
            Node::Function {
                argument_names,
                body,
            } => {
                let body = self.encode(body);
                let body = self.id_of(body);
                self.reference(json!({
                    "functionDefinitionValue": {
                        "argumentNames": argument_names,
                        "body": body,
                    }
                }))
            }
        };
        self.encoded.insert(key, encoded.clone());
        encoded
    }

    fn encode_map(&mut self, entries: &BTreeMap<String, Expr>) -> Map<String, Value> {
        entries
            .iter()
            .map(|(name, expr)| (name.clone(), self.encode(expr)))
            .collect()
    }

    /// Store a node and return a reference to it.
    fn reference(&mut self, node: Value) -> Value {
        json!({ "valueReference": self.store(node) })
    }

    /// Return the id of an encoded node, storing inlined nodes if necessary.
    fn id_of(&mut self, node: Value) -> String {
        match node.get("valueReference").and_then(Value::as_str) {
            Some(id) => id.to_string(),
            None => self.store(node),
        }
    }

    fn store(&mut self, node: Value) -> String {
        let canonical = node.to_string();
        if let Some(id) = self.ids.get(&canonical) {
            return id.clone();
        }
        let id = self.values.len().to_string();
        self.ids.insert(canonical, id.clone());
        self.values.insert(id.clone(), node);
        id
    }
}
