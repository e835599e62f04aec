use tracing::info;

pub fn init_telemetry(endpoint: &str) {
    info!(
        target = "telemetry.gui",
        endpoint,
        "OpenTelemetry endpoint configured; forward tracing spans via collector-side subscriber"
    );
}

pub fn research_started(session_id: &str, running: usize, available_permits: usize) {
    info!(
        target = "telemetry.gui",
        session_id,
        running_runs = running,
        available_permits,
        event = "research_started"
    );
}

pub fn research_completed(
    session_id: &str,
    task_outputs: usize,
    running: usize,
    available_permits: usize,
) {
    info!(
        target = "telemetry.gui",
        session_id,
        task_outputs,
        running_runs = running,
        available_permits,
        event = "research_completed"
    );
}

pub fn research_failed(session_id: &str, running: usize, available_permits: usize, error: &str) {
    info!(
        target = "telemetry.gui",
        session_id,
        running_runs = running,
        available_permits,
        error,
        event = "research_failed"
    );
}

pub fn session_ended(session_id: &str, remaining_sessions: usize) {
    info!(
        target = "telemetry.gui",
        session_id,
        remaining_sessions,
        event = "session_ended"
    );
}
