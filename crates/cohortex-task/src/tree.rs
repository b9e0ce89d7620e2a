use std::collections::HashMap;
use std::fmt;

use cohortex_types::EndpointExpr;

use crate::error::{Error, Result};
use crate::window::{CountBounds, Endpoint, WindowRef, WindowSpec};

/// Name of the window-tree root node.
pub const TRIGGER_NODE: &str = "trigger";

/// One retained node of the window tree: `trigger`, or a window endpoint
/// (`<window>.start` / `<window>.end`) with its resolved endpoint expression
/// and the constraints attached to it.
#[derive(Debug, Clone)]
pub struct TreeNode {
    pub name: String,
    pub endpoint: Option<EndpointExpr>,
    pub constraints: Vec<(String, CountBounds)>,
    pub children: Vec<usize>,
}

/// The window tree: a `trigger` root plus one node per retained window
/// endpoint. Nodes whose endpoint collapses to an identity are pruned at
/// construction and their children re-parented upward.
#[derive(Debug, Clone)]
pub struct WindowTree {
    nodes: Vec<TreeNode>,
}

struct ProtoNode {
    name: String,
    endpoint: Option<EndpointExpr>,
    constraints: Vec<(String, CountBounds)>,
    parent: Option<String>,
}

impl WindowTree {
    pub fn build(windows: &[(String, WindowSpec)]) -> Result<Self> {
        let mut protos: Vec<ProtoNode> = vec![ProtoNode {
            name: TRIGGER_NODE.to_string(),
            endpoint: None,
            constraints: Vec::new(),
            parent: None,
        }];

        for (name, spec) in windows {
            let root = spec.root_node();
            let parent_of_root = match spec.referenced_event()? {
                WindowRef::Event(event) => {
                    if event != TRIGGER_NODE {
                        return Err(Error::MissingReference(format!(
                            "window '{}' references undefined trigger event '{}'; must be \
                             '{}'",
                            name, event, TRIGGER_NODE
                        )));
                    }
                    TRIGGER_NODE.to_string()
                }
                WindowRef::WindowEvent { window, endpoint } => {
                    if !windows.iter().any(|(w, _)| w == &window) {
                        return Err(Error::MissingReference(format!(
                            "window '{}' references undefined window '{}' for event '{}'",
                            name,
                            window,
                            endpoint.as_str()
                        )));
                    }
                    format!("{}.{}", window, endpoint.as_str())
                }
            };

            for endpoint in [Endpoint::Start, Endpoint::End] {
                let node_name = format!("{}.{}", name, endpoint.as_str());
                // The non-root endpoint carries the window's constraints; the
                // root endpoint bounds an unconstrained window back to its
                // external anchor.
                let (constraints, parent) = if endpoint == root {
                    (Vec::new(), parent_of_root.clone())
                } else {
                    (
                        spec.has.clone(),
                        format!("{}.{}", name, root.as_str()),
                    )
                };
                protos.push(ProtoNode {
                    name: node_name,
                    endpoint: spec.endpoint_expr(endpoint)?,
                    constraints,
                    parent: Some(parent),
                });
            }
        }

        Self::assemble(protos)
    }

    /// Resolve parents through pruned identity nodes and build the arena.
    fn assemble(protos: Vec<ProtoNode>) -> Result<Self> {
        let by_name: HashMap<&str, usize> =
            protos.iter().enumerate().map(|(i, p)| (p.name.as_str(), i)).collect();

        let alive = |p: &ProtoNode| p.name == TRIGGER_NODE || p.endpoint.is_some();

        let mut nodes: Vec<TreeNode> = Vec::new();
        let mut index_of: HashMap<String, usize> = HashMap::new();
        for proto in &protos {
            if !alive(proto) {
                continue;
            }
            index_of.insert(proto.name.clone(), nodes.len());
            nodes.push(TreeNode {
                name: proto.name.clone(),
                endpoint: proto.endpoint.clone(),
                constraints: proto.constraints.clone(),
                children: Vec::new(),
            });
        }

        for proto in &protos {
            if !alive(proto) || proto.name == TRIGGER_NODE {
                continue;
            }
            // Walk up through pruned nodes; a chain longer than the node
            // count means the window references loop back on themselves.
            let mut next = proto.parent.clone();
            let mut attached = false;
            for _ in 0..=protos.len() {
                let parent_name = match &next {
                    Some(name) => name.clone(),
                    None => {
                        return Err(Error::Config(format!(
                            "node '{}' has no path to the trigger",
                            proto.name
                        )));
                    }
                };
                let parent_idx = *by_name.get(parent_name.as_str()).ok_or_else(|| {
                    Error::MissingReference(format!(
                        "window boundary references undefined node '{}'",
                        parent_name
                    ))
                })?;
                if alive(&protos[parent_idx]) {
                    let child_slot = index_of[&proto.name];
                    let parent_slot = index_of[&parent_name];
                    nodes[parent_slot].children.push(child_slot);
                    attached = true;
                    break;
                }
                next = protos[parent_idx].parent.clone();
            }
            if !attached {
                return Err(Error::Config(
                    "window references form a cycle".to_string(),
                ));
            }
        }

        let tree = Self { nodes };
        if tree.preorder().len() != tree.len() {
            return Err(Error::Config(
                "window references form a cycle".to_string(),
            ));
        }
        Ok(tree)
    }

    pub fn root(&self) -> usize {
        0
    }

    pub fn node(&self, id: usize) -> &TreeNode {
        &self.nodes[id]
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Node ids in depth-first preorder, root first.
    pub fn preorder(&self) -> Vec<usize> {
        let mut order = Vec::with_capacity(self.nodes.len());
        let mut stack = vec![self.root()];
        while let Some(id) = stack.pop() {
            order.push(id);
            for &child in self.nodes[id].children.iter().rev() {
                stack.push(child);
            }
        }
        order
    }

    /// Retained node names in preorder, excluding the trigger root.
    pub fn summary_names(&self) -> Vec<String> {
        self.preorder()
            .into_iter()
            .skip(1)
            .map(|id| self.nodes[id].name.clone())
            .collect()
    }

    fn render_into(&self, id: usize, prefix: &str, out: &mut String) {
        let node = &self.nodes[id];
        let count = node.children.len();
        for (i, &child) in node.children.iter().enumerate() {
            let last = i + 1 == count;
            let branch = if last { "└── " } else { "├── " };
            out.push_str(prefix);
            out.push_str(branch);
            out.push_str(&self.nodes[child].name);
            out.push('\n');
            let next_prefix = format!("{}{}", prefix, if last { "    " } else { "│   " });
            self.render_into(child, &next_prefix, out);
        }
    }
}

impl fmt::Display for WindowTree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut out = String::new();
        out.push_str(&self.nodes[self.root()].name);
        out.push('\n');
        self.render_into(self.root(), "", &mut out);
        write!(f, "{}", out.trim_end())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec(start: Option<&str>, end: Option<&str>) -> WindowSpec {
        WindowSpec::new(
            start.map(String::from),
            end.map(String::from),
            true,
            true,
            Vec::new(),
            None,
            None,
        )
        .unwrap()
    }

    fn mortality_windows() -> Vec<(String, WindowSpec)> {
        vec![
            ("input".to_string(), spec(None, Some("trigger + 24h"))),
            ("gap".to_string(), spec(Some("trigger"), Some("start + 48h"))),
            (
                "target".to_string(),
                spec(Some("gap.end"), Some("start -> discharge_or_death")),
            ),
        ]
    }

    #[test]
    fn test_identity_nodes_are_pruned() {
        let tree = WindowTree::build(&mortality_windows()).unwrap();
        assert_eq!(
            tree.summary_names(),
            vec!["input.end", "input.start", "gap.end", "target.end"]
        );
    }

    #[test]
    fn test_children_reparent_through_pruned_nodes() {
        let tree = WindowTree::build(&mortality_windows()).unwrap();
        let root_children: Vec<&str> = tree
            .node(tree.root())
            .children
            .iter()
            .map(|&id| tree.node(id).name.as_str())
            .collect();
        // gap.start collapsed onto the trigger, so gap.end hangs off the root.
        assert_eq!(root_children, vec!["input.end", "gap.end"]);
    }

    #[test]
    fn test_constraints_attach_to_non_root_endpoint() {
        let windows = vec![(
            "input".to_string(),
            WindowSpec::new(
                None,
                Some("trigger + 24h".to_string()),
                true,
                true,
                vec![("_ANY_EVENT".to_string(), "(5, None)".to_string())],
                None,
                None,
            )
            .unwrap(),
        )];
        let tree = WindowTree::build(&windows).unwrap();
        let start = tree
            .preorder()
            .into_iter()
            .find(|&id| tree.node(id).name == "input.start")
            .unwrap();
        let end = tree
            .preorder()
            .into_iter()
            .find(|&id| tree.node(id).name == "input.end")
            .unwrap();
        assert_eq!(tree.node(start).constraints.len(), 1);
        assert!(tree.node(end).constraints.is_empty());
    }

    #[test]
    fn test_rejects_unknown_window_reference() {
        let windows = vec![(
            "target".to_string(),
            spec(Some("gap.end"), Some("start -> discharge")),
        )];
        assert!(matches!(
            WindowTree::build(&windows),
            Err(Error::MissingReference(_))
        ));
    }

    #[test]
    fn test_rejects_window_reference_cycle() {
        let windows = vec![
            ("a".to_string(), spec(Some("b.end"), Some("start + 24h"))),
            ("b".to_string(), spec(Some("a.end"), Some("start + 24h"))),
        ];
        assert!(WindowTree::build(&windows).is_err());
    }

    #[test]
    fn test_render_tree() {
        let tree = WindowTree::build(&mortality_windows()).unwrap();
        insta::assert_snapshot!(tree.to_string(), @r"
        trigger
        ├── input.end
        │   └── input.start
        └── gap.end
            └── target.end
        ");
    }
}
