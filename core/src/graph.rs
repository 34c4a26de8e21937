// Relationship graph
//
// Builds a server -> service -> item graph from the registry for the dashboard's
// graph view, and traces the lineage of any node through it.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::portal::{Access, ItemKind, PortalItem};
use crate::registry::ServiceRegistry;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GraphNodeType {
    Server,
    Service,
    Item,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GraphNode {
    pub id: String,
    pub title: String,
    pub node_type: GraphNodeType,
    pub url: Option<String>,
    /// Portal item type for item nodes
    pub item_type: Option<String>,
    pub access: Option<Access>,
    pub owner: Option<String>,
    /// `false` for servers reached over plain http
    pub secure: Option<bool>,
    /// Layering hint: 1 server, 2 service, 3 layer item, 4 map or app
    pub order: u8,
    pub size: u8,
}

/// Directed link from consumer to provider
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GraphLink {
    pub source: String,
    pub target: String,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct RelationshipGraph {
    pub nodes: Vec<GraphNode>,
    pub links: Vec<GraphLink>,
    pub timestamp: String,
    #[serde(skip)]
    index: HashMap<String, usize>,
    #[serde(skip)]
    link_set: HashSet<GraphLink>,
}

impl RelationshipGraph {
    /// Build current graph snapshot
    pub fn from_registry(registry: &ServiceRegistry) -> Self {
        let mut graph = Self {
            timestamp: chrono::Utc::now().to_rfc3339(),
            ..Default::default()
        };

        for info in registry.iter() {
            graph.add_node(GraphNode {
                id: info.origin.clone(),
                title: info.origin.clone(),
                node_type: GraphNodeType::Server,
                url: Some(info.origin.clone()),
                item_type: None,
                access: None,
                owner: None,
                secure: Some(info.secure),
                order: 1,
                size: 4,
            });
            graph.add_node(GraphNode {
                id: info.url.clone(),
                title: info.service_name(),
                node_type: GraphNodeType::Service,
                url: Some(info.url.clone()),
                item_type: None,
                access: Some(info.access),
                owner: Some(info.owner.clone()),
                secure: Some(info.secure),
                order: 2,
                size: 5,
            });
            graph.add_link(&info.url, &info.origin);

            let items: HashMap<&str, &PortalItem> = info
                .related_items()
                .iter()
                .map(|item| (item.id.as_str(), item))
                .collect();
            for item in info.related_items() {
                graph.add_item(item);
            }

            // Each chain reads provider-first: [layer item, map, app]
            for chain in info.chains() {
                let mut provider = info.url.as_str();
                for id in chain {
                    if items.contains_key(id.as_str()) {
                        graph.add_link(id, provider);
                        provider = id.as_str();
                    }
                }
            }
        }

        graph
    }

    fn add_item(&mut self, item: &PortalItem) {
        let map_like = item.kind() != ItemKind::Other;
        self.add_node(GraphNode {
            id: item.id.clone(),
            title: item.title.clone(),
            node_type: GraphNodeType::Item,
            url: item.url.clone(),
            item_type: Some(item.item_type.clone()),
            access: Some(item.access),
            owner: Some(item.owner.clone()),
            secure: None,
            order: if map_like { 4 } else { 3 },
            size: if map_like { 10 } else { 7 },
        });
    }

    fn add_node(&mut self, node: GraphNode) {
        if self.index.contains_key(&node.id) {
            return;
        }
        self.index.insert(node.id.clone(), self.nodes.len());
        self.nodes.push(node);
    }

    fn add_link(&mut self, source: &str, target: &str) {
        if source == target {
            return;
        }
        let link = GraphLink {
            source: source.to_string(),
            target: target.to_string(),
        };
        if self.link_set.insert(link.clone()) {
            self.links.push(link);
        }
    }

    pub fn node(&self, id: &str) -> Option<&GraphNode> {
        self.index.get(id).map(|i| &self.nodes[*i])
    }

    /// Consumers of `id` (transitively), then `id`, then its providers
    ///
    /// Returns an empty list for unknown ids.
    pub fn lineage(&self, id: &str) -> Vec<String> {
        if !self.index.contains_key(id) {
            return Vec::new();
        }
        let consumers = self.trace(id, Direction::Consumers);
        let mut providers = self.trace(id, Direction::Providers);
        providers.reverse();

        let mut out = consumers;
        out.push(id.to_string());
        out.extend(providers);
        out
    }

    fn trace(&self, start: &str, direction: Direction) -> Vec<String> {
        let mut visited = HashSet::new();
        let mut out = Vec::new();
        visited.insert(start.to_string());
        self.visit(start, direction, &mut visited, &mut out);
        out
    }

    // Post-order, so the farthest nodes come first
    fn visit(&self, id: &str, direction: Direction, visited: &mut HashSet<String>, out: &mut Vec<String>) {
        for link in &self.links {
            let next = match direction {
                Direction::Consumers if link.target == id => &link.source,
                Direction::Providers if link.source == id => &link.target,
                _ => continue,
            };
            if visited.insert(next.clone()) {
                self.visit(next, direction, visited, out);
                out.push(next.clone());
            }
        }
    }
}

#[derive(Clone, Copy)]
enum Direction {
    Consumers,
    Providers,
}
