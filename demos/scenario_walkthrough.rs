//! # Scenario Walkthrough
//!
//! Drives the emulator the way a test suite would: seed tables, inject an
//! error, script auth and realtime events, then run "application code"
//! against the consumer surface on real tokio timers.
//!
//! ## Running
//!
//! ```sh
//! cargo run --example scenario_walkthrough
//! ```

use std::time::Duration;

use data_client_emulator::{
    AuthChangeEvent, ClientEmulator, EmulatorConfig, EmulatorError, ErrorCode, Operation, Session,
    User,
};
use serde_json::json;
use tokio::sync::mpsc;

// ─────────────────────────────────────────────────────────────────────
// Step 1: Configure the emulator
// ─────────────────────────────────────────────────────────────────────

fn configure(client: &ClientEmulator) {
    client.set_table_data(
        "todos",
        json!([
            {"id": 1, "title": "write docs", "done": false},
            {"id": 2, "title": "ship release", "done": false},
            {"id": 3, "title": "triage bugs", "done": true},
        ]),
    );
    client.set_table_error(
        "audit_log",
        Operation::Insert,
        Some(EmulatorError::with_code(
            "new row violates row-level security policy",
            ErrorCode::PermissionDenied,
        )),
    );
    client.register_rpc("todo_stats", json!({"open": 2, "closed": 1}), None);

    let user = User::new("user-1").with_email("dev@example.com");
    client.set_auth_principal(Some(user.clone()), Some(Session::new(user.clone())));
    client.script_auth_event(AuthChangeEvent::InitialSession, Some(Session::new(user)));

    client.schedule_realtime_event(
        "todos",
        "postgres_changes",
        json!({"eventType": "INSERT", "new": {"id": 4, "title": "from another tab"}}),
        None::<Duration>,
    );
}

// ─────────────────────────────────────────────────────────────────────
// Step 2: Run application code against the consumer surface
// ─────────────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let client = ClientEmulator::start(
        EmulatorConfig::new().with_default_event_delay(Duration::from_millis(50)),
    );
    configure(&client);

    // ── Queries ─────────────────────────────────────────────────────
    let open = client
        .from("todos")
        .select("*")
        .equals("done", false)
        .order_by("title", true)
        .await
        .into_result()?
        .unwrap_or_default();
    tracing::info!(count = open.len(), "open todos");

    let done = client
        .from("todos")
        .update(json!({"done": true}))
        .equals("id", 1)
        .single()
        .await
        .into_result()?;
    tracing::info!(?done, "marked done");

    let denied = client.from("audit_log").insert(json!({"action": "update"})).await;
    if let Some(err) = &denied.error {
        tracing::warn!(code = ?err.code(), "insert rejected: {err}");
    }

    let stats = client.rpc("todo_stats", json!({})).await;
    tracing::info!(stats = ?stats.data, "rpc result");

    // ── Auth ────────────────────────────────────────────────────────
    let (auth_tx, mut auth_rx) = mpsc::unbounded_channel();
    let subscription = client.auth().on_auth_state_change(move |event, _session| {
        let _ = auth_tx.send(event);
    });

    // The scripted InitialSession arrives on the next tick.
    if let Some(event) = auth_rx.recv().await {
        tracing::info!(%event, "auth replay");
    }
    client.auth().sign_out().await;
    if let Some(event) = auth_rx.recv().await {
        tracing::info!(%event, "auth fan-out");
    }
    subscription.unsubscribe();

    // ── Realtime ────────────────────────────────────────────────────
    let (rt_tx, mut rt_rx) = mpsc::unbounded_channel();
    let mut channel = client
        .channel("todos")
        .on(
            "postgres_changes",
            &json!({"event": "INSERT", "schema": "public", "table": "todos"}),
            move |payload| {
                let _ = rt_tx.send(payload);
            },
        )
        .subscribe_with_status(|status| tracing::info!(%status, "channel status"));

    match tokio::time::timeout(Duration::from_secs(1), rt_rx.recv()).await {
        Ok(Some(payload)) => tracing::info!(%payload, "realtime change"),
        _ => tracing::warn!("no realtime change arrived"),
    }
    client.remove_channel(&mut channel);

    tracing::info!("Walkthrough complete.");
    Ok(())
}
