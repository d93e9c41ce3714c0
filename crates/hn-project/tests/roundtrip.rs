//! Integration tests for project files and the project store.

use hn_network::{
    Coordinate, LinkKind, NetworkSettings, NodeKind, Pattern, SettingEntry, StoreHandle,
    TopologyManager, check_invariants,
};
use hn_project::*;

fn network() -> (StoreHandle, NetworkSettings) {
    let store = StoreHandle::default();
    let mut topo = TopologyManager::new(store.clone());
    let r1 = topo
        .add_node(NodeKind::reservoir(60.0), Coordinate::new(0.0, 0.0), 60.0)
        .unwrap();
    let j1 = topo
        .add_node(NodeKind::junction(1.5), Coordinate::new(100.0, 0.0), 20.0)
        .unwrap();
    let j2 = topo
        .add_node(NodeKind::junction(2.0), Coordinate::new(100.0, 50.0), 18.0)
        .unwrap();
    topo.add_link(LinkKind::default_pipe(), &r1, &j1, vec![Coordinate::new(50.0, -10.0)])
        .unwrap();
    topo.add_link(LinkKind::default_pipe(), &j1, &j2, vec![])
        .unwrap();

    let settings = NetworkSettings {
        title: vec!["Demo".to_string()],
        options: vec![SettingEntry::new("Units", "LPS")],
        times: vec![SettingEntry::new("Duration", "24:00")],
        patterns: vec![Pattern {
            id: "D".to_string(),
            multipliers: vec![0.5, 1.0, 1.5],
        }],
        ..NetworkSettings::default()
    };
    (store, settings)
}

#[test]
fn roundtrip_yaml_project() {
    let (store, settings) = network();
    let mut project = Project::new("Demo network");
    project.document = ProjectDocument::from_store(&store.read(), &settings).unwrap();

    let path = std::env::temp_dir().join("hn_project_roundtrip.yaml");
    save_yaml(&path, &project).unwrap();
    let loaded = load_yaml(&path).unwrap();
    assert_eq!(loaded, project);

    let rebuilt = loaded.document.to_store().unwrap();
    check_invariants(&rebuilt).unwrap();
    assert_eq!(rebuilt.node("J1").unwrap().connected_links.len(), 2);
    let _ = std::fs::remove_file(&path);
}

#[test]
fn roundtrip_json_project() {
    let (store, settings) = network();
    let mut project = Project::new("Demo network");
    project.document = ProjectDocument::from_store(&store.read(), &settings).unwrap();

    let path = std::env::temp_dir().join("hn_project_roundtrip.json");
    save_json(&path, &project).unwrap();
    assert_eq!(load_json(&path).unwrap(), project);
    let _ = std::fs::remove_file(&path);
}

#[test]
fn project_store_load_and_save() {
    let root = std::env::temp_dir().join("hn_project_store");
    let _ = std::fs::remove_dir_all(&root);
    let projects = ProjectStore::new(root.clone()).unwrap();

    assert!(matches!(
        projects.load_project("missing"),
        Err(ProjectError::NotFound { .. })
    ));

    let (store, settings) = network();
    let document = ProjectDocument::from_store(&store.read(), &settings).unwrap();
    let id = projects.create_project("Demo", document.clone()).unwrap();
    assert_eq!(projects.load_project(&id).unwrap(), document);

    // Saving again keeps the name and replaces the content
    let trimmed = ProjectDocument {
        settings: NetworkSettings::default(),
        ..document
    };
    projects.save_project(&id, &trimmed).unwrap();
    assert_eq!(projects.load_project(&id).unwrap(), trimmed);
    assert_eq!(projects.list_projects().unwrap(), vec![(id.clone(), "Demo".to_string())]);

    projects.save_project("fresh-1", &ProjectDocument::default()).unwrap();
    assert!(projects.exists("fresh-1"));
    projects.delete_project("fresh-1").unwrap();
    assert!(!projects.exists("fresh-1"));

    let _ = std::fs::remove_dir_all(&root);
}

#[test]
fn store_rejects_unsafe_ids_and_broken_documents() {
    let root = std::env::temp_dir().join("hn_project_store_invalid");
    let _ = std::fs::remove_dir_all(&root);
    let projects = ProjectStore::new(root.clone()).unwrap();

    assert!(matches!(
        projects.save_project("../escape", &ProjectDocument::default()),
        Err(ProjectError::InvalidId { .. })
    ));

    let (store, settings) = network();
    let mut document = ProjectDocument::from_store(&store.read(), &settings).unwrap();
    document.features.features.retain(|f| f.id != "J2");
    assert!(matches!(
        projects.save_project("broken", &document),
        Err(ProjectError::Topology(_))
    ));
    assert!(!projects.exists("broken"));

    let _ = std::fs::remove_dir_all(&root);
}
