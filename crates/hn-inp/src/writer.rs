//! Network Serializer: Graph Store snapshot to INP text.
//!
//! Output depends only on store content: entities are written in id order
//! (the store's map order) and floats use their shortest round-trip form.

use std::fmt::Write;

use hn_network::{GraphStore, LinkKind, LinkStatus, NetworkLink, NetworkSettings, NodeKind};
use tracing::debug;

use crate::error::{InpError, InpResult};

const PATTERN_VALUES_PER_LINE: usize = 6;

/// Serialize `store` and `settings` into solver input text.
///
/// Preview links are left out. Fails with [`InpError::EmptyNetwork`] when
/// the store holds no nodes.
pub fn serialize(store: &GraphStore, settings: &NetworkSettings) -> InpResult<String> {
    if store.node_count() == 0 {
        return Err(InpError::EmptyNetwork);
    }
    let links: Vec<&NetworkLink> = store.links().filter(|l| !l.preview).collect();
    let mut out = String::new();

    writeln!(out, "[TITLE]")?;
    for line in &settings.title {
        writeln!(out, "{line}")?;
    }

    write_nodes(&mut out, store)?;
    write_links(&mut out, &links)?;
    write_settings(&mut out, settings)?;

    writeln!(out, "\n[COORDINATES]")?;
    writeln!(out, ";Node\tX-Coord\tY-Coord")?;
    for node in store.nodes() {
        writeln!(out, "{}\t{}\t{}", node.id, node.position.x, node.position.y)?;
    }

    writeln!(out, "\n[VERTICES]")?;
    writeln!(out, ";Link\tX-Coord\tY-Coord")?;
    for link in &links {
        for c in link.interior() {
            writeln!(out, "{}\t{}\t{}", link.id, c.x, c.y)?;
        }
    }

    writeln!(out, "\n[END]")?;
    debug!(
        nodes = store.node_count(),
        links = links.len(),
        bytes = out.len(),
        "network serialized"
    );
    Ok(out)
}

fn write_nodes(out: &mut String, store: &GraphStore) -> std::fmt::Result {
    writeln!(out, "\n[JUNCTIONS]")?;
    writeln!(out, ";ID\tElev\tDemand\tPattern")?;
    for node in store.nodes() {
        if let NodeKind::Junction {
            base_demand,
            pattern,
        } = &node.kind
        {
            write!(out, "{}\t{}\t{}", node.id, node.elevation, base_demand)?;
            if let Some(p) = pattern {
                write!(out, "\t{p}")?;
            }
            writeln!(out)?;
        }
    }

    writeln!(out, "\n[RESERVOIRS]")?;
    writeln!(out, ";ID\tHead\tPattern")?;
    for node in store.nodes() {
        if let NodeKind::Reservoir { head, pattern } = &node.kind {
            write!(out, "{}\t{}", node.id, head)?;
            if let Some(p) = pattern {
                write!(out, "\t{p}")?;
            }
            writeln!(out)?;
        }
    }

    writeln!(out, "\n[TANKS]")?;
    writeln!(
        out,
        ";ID\tElevation\tInitLevel\tMinLevel\tMaxLevel\tDiameter\tMinVol\tVolCurve"
    )?;
    for node in store.nodes() {
        if let NodeKind::Tank {
            init_level,
            min_level,
            max_level,
            diameter,
            min_volume,
            volume_curve,
        } = &node.kind
        {
            write!(
                out,
                "{}\t{}\t{}\t{}\t{}\t{}\t{}",
                node.id, node.elevation, init_level, min_level, max_level, diameter, min_volume
            )?;
            if let Some(c) = volume_curve {
                write!(out, "\t{c}")?;
            }
            writeln!(out)?;
        }
    }
    Ok(())
}

fn write_links(out: &mut String, links: &[&NetworkLink]) -> std::fmt::Result {
    writeln!(out, "\n[PIPES]")?;
    writeln!(
        out,
        ";ID\tNode1\tNode2\tLength\tDiameter\tRoughness\tMinorLoss\tStatus"
    )?;
    for link in links {
        if let LinkKind::Pipe {
            length,
            diameter,
            roughness,
            minor_loss,
            check_valve,
        } = &link.kind
        {
            let status = if *check_valve {
                "CV"
            } else {
                link.status.as_str()
            };
            writeln!(
                out,
                "{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}",
                link.id,
                link.start_node_id,
                link.end_node_id,
                length,
                diameter,
                roughness,
                minor_loss,
                status
            )?;
        }
    }

    writeln!(out, "\n[PUMPS]")?;
    writeln!(out, ";ID\tNode1\tNode2\tParameters")?;
    for link in links {
        if let LinkKind::Pump {
            curve,
            power,
            speed,
            pattern,
        } = &link.kind
        {
            write!(out, "{}\t{}\t{}", link.id, link.start_node_id, link.end_node_id)?;
            if let Some(c) = curve {
                write!(out, "\tHEAD {c}")?;
            }
            if let Some(p) = power {
                write!(out, "\tPOWER {p}")?;
            }
            if *speed != 1.0 {
                write!(out, "\tSPEED {speed}")?;
            }
            if let Some(p) = pattern {
                write!(out, "\tPATTERN {p}")?;
            }
            writeln!(out)?;
        }
    }

    writeln!(out, "\n[VALVES]")?;
    writeln!(out, ";ID\tNode1\tNode2\tDiameter\tType\tSetting\tMinorLoss")?;
    for link in links {
        if let LinkKind::Valve {
            valve_type,
            diameter,
            setting,
            minor_loss,
        } = &link.kind
        {
            writeln!(
                out,
                "{}\t{}\t{}\t{}\t{}\t{}\t{}",
                link.id,
                link.start_node_id,
                link.end_node_id,
                diameter,
                valve_type.as_str(),
                setting,
                minor_loss
            )?;
        }
    }

    // Pipes carry their status inline; pumps and valves need a [STATUS] entry
    writeln!(out, "\n[STATUS]")?;
    writeln!(out, ";ID\tStatus")?;
    for link in links {
        if !link.kind.is_pipe() && link.status == LinkStatus::Closed {
            writeln!(out, "{}\t{}", link.id, link.status.as_str())?;
        }
    }
    Ok(())
}

fn write_settings(out: &mut String, settings: &NetworkSettings) -> std::fmt::Result {
    writeln!(out, "\n[PATTERNS]")?;
    writeln!(out, ";ID\tMultipliers")?;
    for pattern in &settings.patterns {
        for chunk in pattern.multipliers.chunks(PATTERN_VALUES_PER_LINE) {
            write!(out, "{}", pattern.id)?;
            for m in chunk {
                write!(out, "\t{m}")?;
            }
            writeln!(out)?;
        }
    }

    writeln!(out, "\n[CURVES]")?;
    writeln!(out, ";ID\tX-Value\tY-Value")?;
    for curve in &settings.curves {
        for (x, y) in &curve.points {
            writeln!(out, "{}\t{}\t{}", curve.id, x, y)?;
        }
    }

    writeln!(out, "\n[CONTROLS]")?;
    for line in &settings.controls {
        writeln!(out, "{line}")?;
    }

    writeln!(out, "\n[TIMES]")?;
    for entry in &settings.times {
        writeln!(out, "{}\t{}", entry.key, entry.value)?;
    }

    writeln!(out, "\n[OPTIONS]")?;
    for entry in &settings.options {
        writeln!(out, "{}\t{}", entry.key, entry.value)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use hn_network::{Coordinate, StoreHandle, TopologyManager};

    fn two_junctions() -> StoreHandle {
        let store = StoreHandle::default();
        let mut topo = TopologyManager::new(store.clone());
        let j1 = topo
            .add_node(NodeKind::junction(0.0), Coordinate::new(0.0, 0.0), 100.0)
            .unwrap();
        let j2 = topo
            .add_node(NodeKind::junction(1.5), Coordinate::new(50.0, 0.0), 80.0)
            .unwrap();
        topo.add_link(
            LinkKind::default_pipe(),
            &j1,
            &j2,
            vec![Coordinate::new(25.0, 5.0)],
        )
        .unwrap();
        store
    }

    #[test]
    fn empty_store_is_rejected() {
        let err = serialize(&GraphStore::new(), &NetworkSettings::default()).unwrap_err();
        assert_eq!(err, InpError::EmptyNetwork);
    }

    #[test]
    fn writes_nodes_links_and_geometry() {
        let store = two_junctions();
        let text = serialize(&store.read(), &NetworkSettings::default()).unwrap();
        assert!(text.contains("J1\t100\t0\n"));
        assert!(text.contains("J2\t80\t1.5\n"));
        assert!(text.contains("P1\tJ1\tJ2\t100\t300\t130\t0\tOpen\n"));
        assert!(text.contains("J2\t50\t0\n"));
        assert!(text.contains("[VERTICES]\n;Link\tX-Coord\tY-Coord\nP1\t25\t5\n"));
        assert!(text.trim_end().ends_with("[END]"));
    }

    #[test]
    fn output_is_deterministic() {
        let store = two_junctions();
        let settings = NetworkSettings::default();
        let a = serialize(&store.read(), &settings).unwrap();
        let b = serialize(&store.snapshot(), &settings).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn preview_links_are_not_written() {
        let store = two_junctions();
        let mut topo = TopologyManager::new(store.clone());
        topo.add_preview_link(LinkKind::default_pipe(), "J2", "J1", vec![])
            .unwrap();
        let text = serialize(&store.read(), &NetworkSettings::default()).unwrap();
        assert!(!text.contains("P2"));
    }

    #[test]
    fn settings_pass_through_in_order() {
        let store = two_junctions();
        let mut settings = NetworkSettings::default();
        settings.title.push("Demo network".into());
        settings.set_time("Duration", "24:00");
        settings.set_time("Hydraulic Timestep", "1:00");
        settings.set_option("Units", "LPS");
        settings.controls.push("LINK P1 CLOSED AT TIME 6".into());
        let text = serialize(&store.read(), &settings).unwrap();
        assert!(text.starts_with("[TITLE]\nDemo network\n"));
        assert!(text.contains("[TIMES]\nDuration\t24:00\nHydraulic Timestep\t1:00\n"));
        assert!(text.contains("[OPTIONS]\nUnits\tLPS\n"));
        assert!(text.contains("[CONTROLS]\nLINK P1 CLOSED AT TIME 6\n"));
    }
}
