mod common;

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;

use scriptdbg_analysis::{
    files_analysis_fn, AnalysisService, AnalysisSettings, FileRegistry, PluginId, ProjectEvent,
    UserData, Verbosity,
};
use scriptdbg_session::{
    BreakpointStore, ConnectionState, DebuggerSettings, MemoryBreakpointStore, OutboundMessage,
    PluginInfo, TickOutcome,
};

use common::harness;

#[test]
fn project_open_and_target_ready() {
    let mut h = harness();
    let mut files = Vec::new();
    for n in 0..30 {
        files.push(h.registry.add(format!("scripts/ai/unit{n}.lua"), "lua"));
    }
    for n in 0..20 {
        files.push(h.registry.add(format!("tools/gen{n}.py"), "python"));
    }

    let settings = AnalysisSettings {
        flush_threshold: 64,
        poll_interval: Duration::from_millis(2),
        ..AnalysisSettings::default()
    };
    let mut analysis = AnalysisService::new("syntax", settings, h.clock.clone()).unwrap();
    let sizes = Arc::new(Mutex::new(Vec::new()));
    for plugin in ["lua", "python"] {
        analysis.register_files_analysis_function(
            PluginId::new(plugin),
            files_analysis_fn(|_, _, _, _| Ok(Vec::new())),
            UserData::none(),
        );
    }
    {
        let sizes = Arc::clone(&sizes);
        analysis.subscribe(move |event| {
            sizes
                .lock()
                .push((event.plugin.as_str().to_string(), event.results.len()));
        });
    }

    analysis.handle_project_event(ProjectEvent::Opened(h.registry.files()));
    h.clock.advance(Duration::from_millis(101));
    assert!(analysis.tick());
    assert_eq!(analysis.queued_len(), 2);

    analysis.start().unwrap();
    let mut delivered = 0;
    while delivered < 2 {
        let got = analysis.pump_timeout(Duration::from_secs(5));
        assert!(got > 0, "analysis produced no results");
        delivered += got;
    }
    analysis.stop();
    assert_eq!(
        *sizes.lock(),
        vec![("lua".to_string(), 30), ("python".to_string(), 20)]
    );

    let mut store = MemoryBreakpointStore::new();
    for (line, file) in files.iter().take(15).enumerate() {
        store.add(file.clone(), line as u32 + 1);
    }

    let report = h
        .session
        .on_ready(
            &[
                PluginInfo::new("lua").with_max_breakpoints(10),
                PluginInfo::new("python"),
            ],
            &mut store,
        )
        .unwrap();

    assert_eq!(report.evicted.len(), 5);
    assert_eq!(report.sent, 10);
    assert_eq!(store.breakpoints().len(), 10);
    let messages = h.transport.messages();
    assert_eq!(messages.len(), 10);
    assert!(messages
        .iter()
        .all(|message| matches!(message, OutboundMessage::AddBreakpoint(_))));

    h.session.on_disconnected();
}

#[test]
fn silent_target_is_disconnected_on_third_window() {
    let mut h = harness();
    let mut store = MemoryBreakpointStore::new();
    h.session
        .on_ready(&[PluginInfo::new("lua")], &mut store)
        .unwrap();

    h.clock.advance(Duration::from_secs(6));
    assert_eq!(h.session.heartbeat().tick(), TickOutcome::Missed { misses: 1 });
    assert_eq!(h.session.heartbeat().tick(), TickOutcome::Missed { misses: 2 });
    assert_eq!(
        h.session.heartbeat().tick(),
        TickOutcome::Disconnected { misses: 3 }
    );
    assert_eq!(h.transport.disconnect_count(), 1);

    let pings = h
        .transport
        .messages()
        .iter()
        .filter(|message| matches!(message, OutboundMessage::Heartbeat(_)))
        .count();
    assert_eq!(pings, 3);

    // The transport reports the dropped connection back to the session.
    h.session.on_disconnected();
    assert_eq!(h.session.state(), ConnectionState::Disconnected);
    assert_eq!(h.session.heartbeat().tick(), TickOutcome::Idle);
}

#[test]
fn settings_file_overrides_defaults() {
    let settings = DebuggerSettings::from_toml_str(
        r#"
[analysis]
verbosity = "full"
flush_threshold = 16

[heartbeat]
control_connection = true
timeout_ms = 2000
"#,
    )
    .unwrap();
    assert_eq!(settings.analysis.flush_threshold, 16);
    assert_eq!(settings.analysis.verbosity, Verbosity::Full);
    assert!(settings.analysis.enabled);
    assert!(settings.heartbeat.control_connection);
    assert_eq!(settings.heartbeat.timeout, Duration::from_secs(2));
}
