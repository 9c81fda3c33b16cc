//! Block structure of a parsed template.

use crate::placeholder::Arg;

/// A parsed template: text interleaved with tags and nested blocks.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Template {
    pub nodes: Vec<Node>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Text(String),
    /// `{{path|transformer:args|default:value}}` or `{{@resolver(args)}}`.
    Placeholder { expression: String, raw: String },
    /// `{{#if condition}}then{{#else}}else{{/if}}`.
    If {
        condition: String,
        then_branch: Vec<Node>,
        else_branch: Vec<Node>,
        /// The whole block as written, emitted when the condition fails.
        raw: String,
    },
    /// `{{#each var in expression}}body{{/each}}`.
    Each {
        var: String,
        expression: String,
        body: Vec<Node>,
        raw: String,
    },
    /// `{{include "path"}}`.
    Include { path: String, raw: String },
    /// `{{name(arg, "literal", path)}}`.
    Call { name: String, args: Vec<Arg>, raw: String },
}

impl Template {
    /// Visits every node depth first, parents before children.
    pub fn walk<'a>(&'a self, visit: &mut impl FnMut(&'a Node)) {
        walk_nodes(&self.nodes, visit);
    }
}

fn walk_nodes<'a>(nodes: &'a [Node], visit: &mut impl FnMut(&'a Node)) {
    for node in nodes {
        visit(node);
        match node {
            Node::If { then_branch, else_branch, .. } => {
                walk_nodes(then_branch, visit);
                walk_nodes(else_branch, visit);
            }
            Node::Each { body, .. } => walk_nodes(body, visit),
            _ => {}
        }
    }
}
