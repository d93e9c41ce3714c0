//! Load a parsed network into a Graph Store through the Topology Manager.

use std::collections::HashSet;

use hn_core::NodeId;
use hn_network::{NetworkSettings, StoreHandle, TopologyError, TopologyManager};
use tracing::{info, warn};

use crate::error::InpResult;
use crate::parser::{InpNetwork, parse};

#[derive(Debug, Clone, PartialEq)]
pub struct ImportSummary {
    pub nodes: usize,
    pub links: usize,
    /// Nodes with no incident link after the import.
    pub isolated: Vec<NodeId>,
}

/// Insert every entity of `network` into the manager's store.
///
/// All references and ids are checked up front, so on error the store is
/// left unchanged. Returns the network settings for the caller to keep.
pub fn import_into(
    topo: &mut TopologyManager,
    network: InpNetwork,
) -> InpResult<(NetworkSettings, ImportSummary)> {
    check_import(topo, &network)?;

    let InpNetwork {
        nodes,
        links,
        settings,
    } = network;
    let (node_count, link_count) = (nodes.len(), links.len());
    for node in nodes {
        topo.insert_node(node)?;
    }
    for link in links {
        topo.insert_link(link)?;
    }

    let isolated = topo.isolated_nodes();
    if !isolated.is_empty() {
        warn!(count = isolated.len(), "imported network has isolated nodes");
    }
    info!(nodes = node_count, links = link_count, "network imported");
    Ok((
        settings,
        ImportSummary {
            nodes: node_count,
            links: link_count,
            isolated,
        },
    ))
}

/// Parse `text` into a fresh store.
pub fn load_store(text: &str) -> InpResult<(StoreHandle, NetworkSettings)> {
    let network = parse(text)?;
    let store = StoreHandle::default();
    let mut topo = TopologyManager::new(store.clone());
    let (settings, _) = import_into(&mut topo, network)?;
    Ok((store, settings))
}

fn check_import(topo: &TopologyManager, network: &InpNetwork) -> Result<(), TopologyError> {
    let store = topo.store().read();
    let reject = |what: String| TopologyError::InvalidTopology { what };

    let ids = network
        .nodes
        .iter()
        .map(|n| &n.id)
        .chain(network.links.iter().map(|l| &l.id));
    for id in ids {
        if store.contains(id) || topo.is_id_spent(id) {
            return Err(reject(format!("id {id} is already used")));
        }
    }

    let incoming: HashSet<&str> = network.nodes.iter().map(|n| n.id.as_str()).collect();
    for link in &network.links {
        for endpoint in [&link.start_node_id, &link.end_node_id] {
            if !incoming.contains(endpoint.as_str()) && store.node(endpoint).is_none() {
                return Err(reject(format!(
                    "link {} references unknown node {}",
                    link.id, endpoint
                )));
            }
        }
        if link.start_node_id == link.end_node_id {
            return Err(reject(format!("link {} starts and ends at the same node", link.id)));
        }
    }
    Ok(())
}
