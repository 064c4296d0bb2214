//! Syntax helpers shared by the index builder and the usage scanner
//!
//! Both passes walk the same immutable tree-sitter tree. Node kinds are
//! classified once into [`SyntaxKind`] so each pass dispatches with a single
//! `match`, and parent links come from a [`ParentMap`] built in a pre-pass
//! instead of being written onto the nodes.

use std::collections::HashMap;

use tree_sitter::{Node, Tree};

/// Node kinds either pass cares about
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyntaxKind {
    Comment,
    FunctionDefinition,
    ClassDeclaration,
    MethodDeclaration,
    ConstElement,
    IfStatement,
    FunctionCall,
    ObjectCreation,
    MemberCall,
    ScopedCall,
    ClassConstantAccess,
    Name,
    QualifiedName,
    Other,
}

impl SyntaxKind {
    pub fn of(node: &Node) -> Self {
        match node.kind() {
            "comment" => SyntaxKind::Comment,
            "function_definition" => SyntaxKind::FunctionDefinition,
            "class_declaration" => SyntaxKind::ClassDeclaration,
            "method_declaration" => SyntaxKind::MethodDeclaration,
            "const_element" => SyntaxKind::ConstElement,
            "if_statement" => SyntaxKind::IfStatement,
            "function_call_expression" => SyntaxKind::FunctionCall,
            "object_creation_expression" => SyntaxKind::ObjectCreation,
            "member_call_expression" | "nullsafe_member_call_expression" => {
                SyntaxKind::MemberCall
            }
            "scoped_call_expression" => SyntaxKind::ScopedCall,
            "class_constant_access_expression" => SyntaxKind::ClassConstantAccess,
            "name" => SyntaxKind::Name,
            "qualified_name" => SyntaxKind::QualifiedName,
            _ => SyntaxKind::Other,
        }
    }
}

/// Callbacks for [`walk`]. `leave` fires after all descendants were visited.
pub trait Visitor<'t> {
    fn enter(&mut self, node: Node<'t>, kind: SyntaxKind);

    fn leave(&mut self, _node: Node<'t>, _kind: SyntaxKind) {}
}

/// Pre-order traversal over every node, named or not
pub fn walk<'t, V: Visitor<'t>>(tree: &'t Tree, visitor: &mut V) {
    let mut cursor = tree.walk();
    loop {
        let node = cursor.node();
        visitor.enter(node, SyntaxKind::of(&node));

        if cursor.goto_first_child() {
            continue;
        }

        loop {
            let node = cursor.node();
            visitor.leave(node, SyntaxKind::of(&node));
            if cursor.goto_next_sibling() {
                break;
            }
            if !cursor.goto_parent() {
                return;
            }
        }
    }
}

/// Node id to structural parent, built once per tree
pub struct ParentMap<'t> {
    parents: HashMap<usize, Node<'t>>,
}

impl<'t> ParentMap<'t> {
    pub fn build(tree: &'t Tree) -> Self {
        let mut parents = HashMap::new();
        let mut stack = vec![tree.root_node()];

        while let Some(node) = stack.pop() {
            let mut cursor = node.walk();
            for child in node.children(&mut cursor) {
                parents.insert(child.id(), node);
                stack.push(child);
            }
        }

        Self { parents }
    }

    pub fn parent(&self, node: &Node<'t>) -> Option<Node<'t>> {
        self.parents.get(&node.id()).copied()
    }

    /// Ancestors from the direct parent up to the root
    pub fn ancestors(&self, node: &Node<'t>) -> impl Iterator<Item = Node<'t>> + '_ {
        std::iter::successors(self.parent(node), move |n| self.parent(n))
    }
}

/// Source text of a node
pub fn text<'s>(node: &Node, source: &'s str) -> &'s str {
    &source[node.byte_range()]
}

/// 1-based line of the node's first byte
pub fn line_of(node: &Node) -> usize {
    node.start_position().row + 1
}

/// True for statements and declarations that can carry a doc comment
fn is_statement_like(node: &Node) -> bool {
    let kind = node.kind();
    kind.ends_with("_statement") || kind.ends_with("_declaration") || kind == "function_definition"
}

/// Doc comment (`/** ... */`) directly preceding the node, skipping plain comments
pub fn preceding_doc_comment<'s>(node: &Node, source: &'s str) -> Option<&'s str> {
    let mut sibling = node.prev_sibling();
    while let Some(prev) = sibling {
        if prev.kind() != "comment" {
            return None;
        }
        let comment = text(&prev, source);
        if comment.starts_with("/**") {
            return Some(comment);
        }
        sibling = prev.prev_sibling();
    }
    None
}

/// The node's own doc comment, or the one on its nearest enclosing statement.
///
/// A call such as `define(...)` or `do_action(...)` is documented on the
/// statement that contains it, not on the call expression itself.
pub fn nearest_doc_comment<'s, 't>(
    node: &Node<'t>,
    parents: &ParentMap<'t>,
    source: &'s str,
) -> Option<&'s str> {
    if let Some(doc) = preceding_doc_comment(node, source) {
        return Some(doc);
    }
    if is_statement_like(node) {
        return None;
    }

    for ancestor in parents.ancestors(node) {
        if let Some(doc) = preceding_doc_comment(&ancestor, source) {
            return Some(doc);
        }
        if is_statement_like(&ancestor) {
            break;
        }
    }
    None
}

/// Name with any leading namespace separator removed (`\add_action` -> `add_action`)
pub fn symbol_name<'s>(node: &Node, source: &'s str) -> &'s str {
    text(node, source).trim_start_matches('\\')
}

/// Statically known callee or class name: a plain or qualified name
pub fn static_name<'s>(node: &Node, source: &'s str) -> Option<&'s str> {
    match SyntaxKind::of(node) {
        SyntaxKind::Name | SyntaxKind::QualifiedName => Some(symbol_name(node, source)),
        _ => None,
    }
}

/// Value of a string literal without interpolation
pub fn string_literal(node: &Node, source: &str) -> Option<String> {
    let raw = text(node, source);
    match node.kind() {
        "string" => {
            let inner = raw
                .strip_prefix('b')
                .unwrap_or(raw)
                .strip_prefix('\'')?
                .strip_suffix('\'')?;
            Some(inner.replace("\\'", "'").replace("\\\\", "\\"))
        }
        "encapsed_string" => {
            let mut cursor = node.walk();
            let interpolated = node.named_children(&mut cursor).any(|child| {
                !matches!(
                    child.kind(),
                    "string_content" | "string_value" | "escape_sequence"
                )
            });
            if interpolated {
                return None;
            }
            let inner = raw.strip_prefix('"')?.strip_suffix('"')?;
            Some(inner.replace("\\\"", "\"").replace("\\\\", "\\"))
        }
        _ => None,
    }
}

/// Argument expressions of a call, in order
pub fn call_arguments<'t>(call: &Node<'t>) -> Vec<Node<'t>> {
    let Some(arguments) = call.child_by_field_name("arguments") else {
        return Vec::new();
    };

    let mut cursor = arguments.walk();
    arguments
        .named_children(&mut cursor)
        .filter(|arg| arg.kind() == "argument")
        .filter_map(|arg| last_named_child(&arg))
        .collect()
}

/// Last named child; for an argument this skips a leading `name:` label
pub fn last_named_child<'t>(node: &Node<'t>) -> Option<Node<'t>> {
    let mut cursor = node.walk();
    node.named_children(&mut cursor).last()
}

/// First argument of a call when it is a plain string literal
pub fn first_string_argument(call: &Node, source: &str) -> Option<String> {
    let first = *call_arguments(call).first()?;
    string_literal(&first, source)
}

/// Name of the class, method or function a declaration introduces
pub fn declared_name<'s>(node: &Node, source: &'s str) -> Option<&'s str> {
    node.child_by_field_name("name").map(|name| text(&name, source))
}

/// Kinds whose body holds member declarations
const TYPE_DECLARATIONS: &[&str] = &[
    "class_declaration",
    "interface_declaration",
    "trait_declaration",
    "enum_declaration",
];

/// The type a member belongs to, when it is declared directly inside a named
/// class, interface, trait or enum
pub fn enclosing_class<'s, 't>(
    node: &Node<'t>,
    parents: &ParentMap<'t>,
    source: &'s str,
) -> Option<&'s str> {
    parents
        .ancestors(node)
        .find(|ancestor| {
            TYPE_DECLARATIONS.contains(&ancestor.kind())
                || matches!(
                    ancestor.kind(),
                    "anonymous_class"
                        | "object_creation_expression"
                        | "function_definition"
                        | "method_declaration"
                )
        })
        .filter(|ancestor| TYPE_DECLARATIONS.contains(&ancestor.kind()))
        .and_then(|class| declared_name(&class, source))
}

/// True for a `const_element` declared in a type body rather than at file or
/// namespace level
pub fn is_member_constant<'t>(node: &Node<'t>, parents: &ParentMap<'t>) -> bool {
    parents
        .parent(node)
        .and_then(|declaration| parents.parent(&declaration))
        .is_some_and(|body| matches!(body.kind(), "declaration_list" | "enum_declaration_list"))
}

/// Parent kinds in which a bare name is read as a constant value
const VALUE_CONTEXTS: &[&str] = &[
    "argument",
    "array_element_initializer",
    "assignment_expression",
    "augmented_assignment_expression",
    "binary_expression",
    "case_statement",
    "cast_expression",
    "conditional_expression",
    "echo_statement",
    "expression_statement",
    "match_condition_list",
    "parenthesized_expression",
    "print_intrinsic",
    "return_statement",
    "sequence_expression",
    "subscript_expression",
    "unary_op_expression",
];

/// True when a `name`/`qualified_name` node is a constant fetch
pub fn is_constant_fetch<'t>(node: &Node<'t>, parents: &ParentMap<'t>) -> bool {
    let Some(parent) = parents.parent(node) else {
        return false;
    };

    match parent.kind() {
        // `foo(label: VALUE)`: the label is not a value
        "argument" => parent
            .child_by_field_name("name")
            .is_none_or(|label| label.id() != node.id()),
        kind if VALUE_CONTEXTS.contains(&kind) => true,
        // `const A = B;` reads B, declares A
        "const_element" => parent.named_child(0).map(|n| n.id()) != Some(node.id()),
        "simple_parameter" | "property_element" => parent
            .child_by_field_name("default_value")
            .is_some_and(|n| n.id() == node.id()),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::{PhpParser, SourceParser};

    struct KindCollector {
        entered: Vec<SyntaxKind>,
        depth: isize,
        max_depth: isize,
    }

    impl<'t> Visitor<'t> for KindCollector {
        fn enter(&mut self, _node: Node<'t>, kind: SyntaxKind) {
            self.entered.push(kind);
            self.depth += 1;
            self.max_depth = self.max_depth.max(self.depth);
        }

        fn leave(&mut self, _node: Node<'t>, _kind: SyntaxKind) {
            self.depth -= 1;
        }
    }

    fn find<'t>(tree: &'t Tree, kind: &str) -> Vec<Node<'t>> {
        let mut found = Vec::new();
        let mut stack = vec![tree.root_node()];
        while let Some(node) = stack.pop() {
            if node.kind() == kind {
                found.push(node);
            }
            let mut cursor = node.walk();
            stack.extend(node.children(&mut cursor));
        }
        found.sort_by_key(|n| n.start_byte());
        found
    }

    #[test]
    fn walk_balances_enter_and_leave() {
        let tree = PhpParser::new()
            .parse("<?php\nfunction foo() { bar(); }\n")
            .unwrap();
        let mut collector = KindCollector {
            entered: Vec::new(),
            depth: 0,
            max_depth: 0,
        };

        walk(&tree, &mut collector);

        assert_eq!(collector.depth, 0);
        assert!(collector.max_depth > 2);
        assert!(collector.entered.contains(&SyntaxKind::FunctionDefinition));
        assert!(collector.entered.contains(&SyntaxKind::FunctionCall));
    }

    #[test]
    fn parent_map_links_call_to_statement() {
        let tree = PhpParser::new().parse("<?php\nfoo();\n").unwrap();
        let parents = ParentMap::build(&tree);
        let call = find(&tree, "function_call_expression")[0];

        let parent = parents.parent(&call).unwrap();
        assert_eq!(parent.kind(), "expression_statement");
        assert_eq!(parents.ancestors(&call).last().unwrap().kind(), "program");
    }

    #[test]
    fn nearest_doc_comment_falls_back_to_statement() {
        let source = "<?php\n// note\n/** @since 2.0.0 */\ndefine( 'FOO', 1 );\n";
        let tree = PhpParser::new().parse(source).unwrap();
        let parents = ParentMap::build(&tree);
        let call = find(&tree, "function_call_expression")[0];

        assert_eq!(
            nearest_doc_comment(&call, &parents, source),
            Some("/** @since 2.0.0 */")
        );
    }

    #[test]
    fn plain_comment_is_not_a_doc_comment() {
        let source = "<?php\n/* @since 2.0.0 */\nfunction foo() {}\n";
        let tree = PhpParser::new().parse(source).unwrap();
        let function = find(&tree, "function_definition")[0];

        assert_eq!(preceding_doc_comment(&function, source), None);
    }

    #[test]
    fn string_literal_reads_quoted_values() {
        let source = "<?php\nfoo( 'single', \"double\", \"with $var\" );\n";
        let tree = PhpParser::new().parse(source).unwrap();
        let call = find(&tree, "function_call_expression")[0];
        let args = call_arguments(&call);

        assert_eq!(args.len(), 3);
        assert_eq!(string_literal(&args[0], source).as_deref(), Some("single"));
        assert_eq!(string_literal(&args[1], source).as_deref(), Some("double"));
        assert_eq!(string_literal(&args[2], source), None);
    }

    #[test]
    fn enclosing_class_finds_named_class_only() {
        let source = "<?php\nclass WP_Foo {\n  public function bar() {}\n}\nfunction baz() {}\n";
        let tree = PhpParser::new().parse(source).unwrap();
        let parents = ParentMap::build(&tree);

        let method = find(&tree, "method_declaration")[0];
        let function = find(&tree, "function_definition")[0];

        assert_eq!(enclosing_class(&method, &parents, source), Some("WP_Foo"));
        assert_eq!(enclosing_class(&function, &parents, source), None);
    }

    #[test]
    fn enclosing_class_names_interfaces_traits_and_enums() {
        let source = "<?php
interface WP_Iface { const A = 1; }
trait WP_Trait { public function t() {} }
enum WP_Status { const B = 2; }
$x = new class { const C = 3; };
const D = 4;
";
        let tree = PhpParser::new().parse(source).unwrap();
        let parents = ParentMap::build(&tree);
        let constants = find(&tree, "const_element");
        let method = find(&tree, "method_declaration")[0];

        assert_eq!(enclosing_class(&constants[0], &parents, source), Some("WP_Iface"));
        assert_eq!(enclosing_class(&method, &parents, source), Some("WP_Trait"));
        assert_eq!(enclosing_class(&constants[1], &parents, source), Some("WP_Status"));
        assert_eq!(enclosing_class(&constants[2], &parents, source), None);
        assert!(is_member_constant(&constants[2], &parents));
        assert_eq!(enclosing_class(&constants[3], &parents, source), None);
        assert!(!is_member_constant(&constants[3], &parents));
    }
}
