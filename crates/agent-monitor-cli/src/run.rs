//! `run` command: start a session and render it live.

use std::sync::Arc;

use agent_monitor_core::{AgentClient, RunRequest, SessionController, SessionSnapshot};
use tracing::debug;

use crate::render::Renderer;

/// Runs one session to its terminal state, rendering every snapshot.
///
/// Ctrl-C requests a stop; the session then ends as `Cancelled`.
pub async fn run_command(
    client: AgentClient,
    request: RunRequest,
    json: bool,
) -> anyhow::Result<SessionSnapshot> {
    let controller = SessionController::new(Arc::new(client));
    let mut updates = controller.subscribe();
    let mut renderer = Renderer::new(std::io::stdout(), json);

    if !json {
        println!(
            "Running agent for {} (max {} attempts)\n",
            request.coin_name, request.max_retries
        );
    }

    let run = controller.start(request);
    tokio::pin!(run);
    let snapshot = loop {
        tokio::select! {
            snapshot = &mut run => break snapshot,
            changed = updates.changed() => {
                if changed.is_err() {
                    break (&mut run).await;
                }
                let current = updates.borrow_and_update().clone();
                renderer.render(&current)?;
            }
            signal = tokio::signal::ctrl_c() => {
                if let Err(err) = signal {
                    debug!(error = %err, "ctrl-c handler unavailable");
                    break (&mut run).await;
                }
                controller.stop();
            }
        }
    };

    renderer.finish(&snapshot)?;
    Ok(snapshot)
}
