//! Integration tests for extended-period runs of the reference engine.

use hn_engine::{EngineError, HydraulicEngine, LinkParam, NetworkEngine, NodeParam, StatusCode};

/// Run to completion, collecting `(time, value)` from `probe` after each solve.
fn run_all(
    engine: &mut NetworkEngine,
    probe: impl Fn(&NetworkEngine) -> f64,
) -> Vec<(u64, f64)> {
    engine.init().unwrap();
    let mut out = Vec::new();
    loop {
        let t = engine.run().unwrap();
        out.push((t, probe(engine)));
        if engine.next().unwrap() == 0 {
            break;
        }
    }
    out
}

#[test]
fn demand_pattern_drives_flows() {
    let mut engine = NetworkEngine::new();
    engine
        .open(
            "[JUNCTIONS]\nJ1 0 10 D\n[RESERVOIRS]\nR1 50\n[PIPES]\nP1 R1 J1 800 250 110\n\
             [PATTERNS]\nD 0.5 1.0 1.5\n[TIMES]\nDuration 2:00\n",
        )
        .unwrap();
    let flows = run_all(&mut engine, |e| e.link_value(0, LinkParam::Flow).unwrap());
    let times: Vec<u64> = flows.iter().map(|(t, _)| *t).collect();
    assert_eq!(times, vec![0, 3600, 7200]);
    for ((_, q), expected) in flows.iter().zip([5.0, 10.0, 15.0]) {
        assert!((q - expected).abs() < 1e-4, "{q} vs {expected}");
    }
}

#[test]
fn clocktime_control_uses_start_clocktime() {
    let mut engine = NetworkEngine::new();
    engine
        .open(
            "[JUNCTIONS]\nJ1 0 4\n[RESERVOIRS]\nR1 30\nR2 30\n\
             [PIPES]\nP1 R1 J1 100 200 120\nP2 R2 J1 100 200 120\n\
             [CONTROLS]\nLINK P2 CLOSED AT CLOCKTIME 7:30 AM\n\
             [TIMES]\nDuration 3:00\nStart ClockTime 6 AM\n",
        )
        .unwrap();
    let status = run_all(&mut engine, |e| e.link_value(1, LinkParam::Status).unwrap());
    assert_eq!(
        status,
        vec![
            (0, StatusCode::Open.code()),
            (3600, StatusCode::Open.code()),
            (5400, StatusCode::Closed.code()),
            (7200, StatusCode::Closed.code()),
            (10_800, StatusCode::Closed.code()),
        ]
    );
    // All demand now comes through P1
    assert!((engine.link_value(0, LinkParam::Flow).unwrap() - 4.0).abs() < 1e-4);
}

#[test]
fn tank_level_control_stops_pump() {
    let mut engine = NetworkEngine::new();
    engine
        .open(
            "[JUNCTIONS]\nJ1 0 0\n[RESERVOIRS]\nR1 0\n[TANKS]\nT1 10 1 0 6 5\n\
             [PIPES]\nP1 J1 T1 100 300 120\n[PUMPS]\nPU1 R1 J1 HEAD C1\n[CURVES]\nC1 100 30\n\
             [CONTROLS]\nLINK PU1 CLOSED IF NODE T1 ABOVE 3\n\
             [TIMES]\nDuration 6:00\n",
        )
        .unwrap();
    let statuses = run_all(&mut engine, |e| e.link_value(1, LinkParam::Status).unwrap());
    // Pump runs at first, the tank rises past 3 m, then the control shuts it off
    assert_eq!(statuses.first().unwrap().1, StatusCode::Open.code());
    assert_eq!(statuses.last().unwrap().1, StatusCode::Closed.code());
    let level = engine.node_value(2, NodeParam::Pressure).unwrap();
    assert!(level > 3.0 && level <= 6.0, "level {level}");
}

#[test]
fn engine_reopens_after_close() {
    let text = "[JUNCTIONS]\nJ1 0 1\n[RESERVOIRS]\nR1 10\n[PIPES]\nP1 R1 J1 10 100 120\n";
    let mut engine = NetworkEngine::new();
    for _ in 0..2 {
        engine.open(text).unwrap();
        engine.init().unwrap();
        engine.run().unwrap();
        assert!(engine.node_value(0, NodeParam::Head).unwrap() < 10.0);
        engine.close();
        assert!(!engine.is_open());
        engine.close();
    }
}

#[test]
fn invalid_input_is_reported() {
    let mut engine = NetworkEngine::new();
    let err = engine
        .open("[JUNCTIONS]\nJ1 0 1 NOPE\n[RESERVOIRS]\nR1 10\n[PIPES]\nP1 R1 J1 10 100 120\n")
        .unwrap_err();
    assert!(matches!(err, EngineError::Input { .. }), "{err}");
    assert!(!engine.is_open());

    let err = engine.open("[JUNCTIONS]\nJ1 zero\n").unwrap_err();
    assert!(matches!(err, EngineError::Inp(_)), "{err}");
}

#[test]
fn editor_export_opens_in_engine() {
    let source = "[JUNCTIONS]\nJ1 5 2\nJ2 4 3\n[RESERVOIRS]\nR1 40\n\
                  [PIPES]\nP1 R1 J1 300 200 120\nP2 J1 J2 200 150 120\n\
                  [COORDINATES]\nJ1 0 0\nJ2 100 0\nR1 -100 0\n";
    let (store, settings) = hn_inp::load_store(source).unwrap();
    let text = hn_inp::serialize(&store.read(), &settings).unwrap();

    let mut engine = NetworkEngine::new();
    engine.open(&text).unwrap();
    assert_eq!(engine.node_count(), 3);
    assert_eq!(engine.link_count(), 2);
    engine.init().unwrap();
    engine.run().unwrap();
    assert!((engine.link_value(0, LinkParam::Flow).unwrap() - 5.0).abs() < 1e-4);
}

mod mass_balance {
    use super::*;
    use proptest::prelude::*;

    /// R1 feeding a chain of junctions, one pipe per junction.
    fn chain(demands: &[f64]) -> String {
        let mut text = String::from("[JUNCTIONS]\n");
        for (i, d) in demands.iter().enumerate() {
            text.push_str(&format!("J{} 0 {d}\n", i + 1));
        }
        text.push_str("[RESERVOIRS]\nR1 100\n[PIPES]\n");
        let mut prev = "R1".to_string();
        for i in 0..demands.len() {
            let node = format!("J{}", i + 1);
            text.push_str(&format!("P{} {prev} {node} 200 300 130\n", i + 1));
            prev = node;
        }
        text
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(32))]

        #[test]
        fn source_supplies_total_demand(
            demands in prop::collection::vec(0.0f64..5.0, 1..8)
        ) {
            let mut engine = NetworkEngine::new();
            engine.open(&chain(&demands)).unwrap();
            engine.init().unwrap();
            engine.run().unwrap();
            let total: f64 = demands.iter().sum();
            let supplied = engine.link_value(0, LinkParam::Flow).unwrap();
            prop_assert!((supplied - total).abs() < 1e-4, "{supplied} vs {total}");
            engine.close();
        }
    }
}
