//! Reference extraction for the usage pass
//!
//! The payload is independent of any index so it can be cached per file and
//! matched against whichever index is current.

use serde::{Deserialize, Serialize};
use tree_sitter::Node;

use crate::index::HookKind;
use crate::parser::syntax::{
    first_string_argument, is_constant_fetch, last_named_child, line_of, static_name, text,
};
use crate::parser::{ParentMap, SyntaxKind, Visitor};

/// Something a plugin file refers to by a statically known name
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Reference {
    Function {
        name: String,
    },
    Class {
        name: String,
    },
    /// `Foo::bar()` carries its class; `$obj->bar()` and `self::bar()` do not
    Method {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        class: Option<String>,
        method: String,
    },
    Constant {
        name: String,
    },
    Hook {
        kind: HookKind,
        name: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageRef {
    #[serde(flatten)]
    pub reference: Reference,
    pub line: usize,
}

pub(crate) struct ReferenceCollector<'a, 't> {
    source: &'a str,
    parents: &'a ParentMap<'t>,
    refs: Vec<UsageRef>,
}

impl<'a, 't> ReferenceCollector<'a, 't> {
    pub(crate) fn new(source: &'a str, parents: &'a ParentMap<'t>) -> Self {
        Self {
            source,
            parents,
            refs: Vec::new(),
        }
    }

    pub(crate) fn into_refs(self) -> Vec<UsageRef> {
        self.refs
    }

    fn push(&mut self, reference: Reference, node: &Node<'t>) {
        self.refs.push(UsageRef {
            reference,
            line: line_of(node),
        });
    }

    fn function_call(&mut self, node: &Node<'t>) {
        let Some(name) = node
            .child_by_field_name("function")
            .and_then(|f| static_name(&f, self.source))
        else {
            return;
        };

        if let Some(kind) = HookKind::registered_by(name)
            && let Some(hook) = first_string_argument(node, self.source)
        {
            self.push(Reference::Hook { kind, name: hook }, node);
        }

        self.push(
            Reference::Function {
                name: name.to_string(),
            },
            node,
        );
    }

    fn object_creation(&mut self, node: &Node<'t>) {
        if let Some(name) = node
            .named_child(0)
            .and_then(|class| static_name(&class, self.source))
        {
            self.push(
                Reference::Class {
                    name: name.to_string(),
                },
                node,
            );
        }
    }

    fn member_call(&mut self, node: &Node<'t>) {
        if let Some(method) = self.method_name(node) {
            self.push(
                Reference::Method {
                    class: None,
                    method,
                },
                node,
            );
        }
    }

    fn scoped_call(&mut self, node: &Node<'t>) {
        let Some(method) = self.method_name(node) else {
            return;
        };
        let class = node
            .child_by_field_name("scope")
            .and_then(|scope| static_name(&scope, self.source))
            .map(str::to_string);

        self.push(Reference::Method { class, method }, node);
    }

    fn method_name(&self, node: &Node<'t>) -> Option<String> {
        let name = node.child_by_field_name("name")?;
        (SyntaxKind::of(&name) == SyntaxKind::Name).then(|| text(&name, self.source).to_string())
    }

    fn class_constant(&mut self, node: &Node<'t>) {
        let Some(class) = node
            .named_child(0)
            .and_then(|scope| static_name(&scope, self.source))
        else {
            return;
        };
        let Some(constant) = last_named_child(node).map(|n| text(&n, self.source)) else {
            return;
        };
        if constant.eq_ignore_ascii_case("class") {
            return;
        }

        self.push(
            Reference::Constant {
                name: format!("{}::{}", class, constant),
            },
            node,
        );
    }

    fn constant(&mut self, node: &Node<'t>) {
        if is_constant_fetch(node, self.parents) {
            self.push(
                Reference::Constant {
                    name: static_name(node, self.source)
                        .unwrap_or_default()
                        .to_string(),
                },
                node,
            );
        }
    }
}

impl<'t> Visitor<'t> for ReferenceCollector<'_, 't> {
    fn enter(&mut self, node: Node<'t>, kind: SyntaxKind) {
        match kind {
            SyntaxKind::FunctionCall => self.function_call(&node),
            SyntaxKind::ObjectCreation => self.object_creation(&node),
            SyntaxKind::MemberCall => self.member_call(&node),
            SyntaxKind::ScopedCall => self.scoped_call(&node),
            SyntaxKind::ClassConstantAccess => self.class_constant(&node),
            SyntaxKind::Name | SyntaxKind::QualifiedName => self.constant(&node),
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::{PhpParser, SourceParser, walk};

    fn collect(source: &str) -> Vec<UsageRef> {
        let tree = PhpParser::new().parse(source).unwrap();
        let parents = ParentMap::build(&tree);
        let mut collector = ReferenceCollector::new(source, &parents);
        walk(&tree, &mut collector);
        collector.into_refs()
    }

    fn references(source: &str) -> Vec<Reference> {
        collect(source).into_iter().map(|r| r.reference).collect()
    }

    #[test]
    fn collects_calls_with_lines() {
        let refs = collect("<?php\n\nfoo();\n\\bar( 1 );\n");

        assert_eq!(
            refs,
            vec![
                UsageRef {
                    reference: Reference::Function { name: "foo".into() },
                    line: 3,
                },
                UsageRef {
                    reference: Reference::Function { name: "bar".into() },
                    line: 4,
                },
            ]
        );
    }

    #[test]
    fn hook_registration_yields_hook_and_function() {
        let refs = references("<?php\nadd_filter( 'the_title', 'my_title' );\n");

        assert_eq!(
            refs,
            vec![
                Reference::Hook {
                    kind: HookKind::ApplyFilters,
                    name: "the_title".into(),
                },
                Reference::Function {
                    name: "add_filter".into(),
                },
            ]
        );
    }

    #[test]
    fn dynamic_names_are_skipped() {
        let refs = references("<?php\n$fn();\nnew $class();\nadd_action( $hook, 'cb' );\n");

        assert_eq!(
            refs,
            vec![Reference::Function {
                name: "add_action".into(),
            }]
        );
    }

    #[test]
    fn collects_classes_methods_and_constants() {
        let source = r#"<?php
$q = new WP_Query( array() );
$q->get_posts();
WP_Block_Type_Registry::get_instance();
self::helper();
echo ABSPATH;
$limit = WP_Query::DEFAULT_LIMIT;
$name = WP_Query::class;
"#;
        let refs = references(source);

        assert!(refs.contains(&Reference::Class {
            name: "WP_Query".into()
        }));
        assert!(refs.contains(&Reference::Method {
            class: None,
            method: "get_posts".into(),
        }));
        assert!(refs.contains(&Reference::Method {
            class: Some("WP_Block_Type_Registry".into()),
            method: "get_instance".into(),
        }));
        assert!(refs.contains(&Reference::Method {
            class: None,
            method: "helper".into(),
        }));
        assert!(refs.contains(&Reference::Constant {
            name: "ABSPATH".into()
        }));
        assert!(refs.contains(&Reference::Constant {
            name: "WP_Query::DEFAULT_LIMIT".into()
        }));
        assert!(!refs.iter().any(|r| matches!(
            r,
            Reference::Constant { name } if name.ends_with("::class")
        )));
    }

    #[test]
    fn declarations_and_labels_are_not_constant_fetches() {
        let source = r#"<?php
const MY_PLUGIN = WP_DEBUG;
function render( $mode = OBJECT ) {}
foo( label: 1 );
"#;
        let constants: Vec<_> = references(source)
            .into_iter()
            .filter_map(|r| match r {
                Reference::Constant { name } => Some(name),
                _ => None,
            })
            .collect();

        assert_eq!(constants, vec!["WP_DEBUG", "OBJECT"]);
    }

    #[test]
    fn payload_serializes_with_type_tag() {
        let value = serde_json::to_value(UsageRef {
            reference: Reference::Hook {
                kind: HookKind::DoAction,
                name: "init".into(),
            },
            line: 7,
        })
        .unwrap();

        assert_eq!(
            value,
            serde_json::json!({
                "type": "hook",
                "kind": "do_action",
                "name": "init",
                "line": 7
            })
        );
    }
}
