use std::sync::{Arc, Mutex, MutexGuard};

use futures::StreamExt as _;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::decoder::EventFrameDecoder;
use crate::errors::SessionFault;
use crate::model::RunRequest;
use crate::session::{AppendOutcome, SessionSnapshot, SessionState, SessionStatus};
use crate::source::EventSource;

/// Owns the lifecycle of agent runs: opens the stream, drives decoding into
/// the session state machine and publishes a snapshot after every change.
///
/// At most one run is active at a time. `start` resolves once the run has
/// reached a terminal state and never fails; the outcome is carried by the
/// returned snapshot.
pub struct SessionController {
    source: Arc<dyn EventSource>,
    snapshot_tx: watch::Sender<SessionSnapshot>,
    active: Mutex<Option<watch::Sender<bool>>>,
}

impl SessionController {
    pub fn new(source: Arc<dyn EventSource>) -> Self {
        let (snapshot_tx, _) = watch::channel(SessionSnapshot::default());
        Self {
            source,
            snapshot_tx,
            active: Mutex::new(None),
        }
    }

    /// Subscribes to snapshots. The receiver starts at the current snapshot.
    pub fn subscribe(&self) -> watch::Receiver<SessionSnapshot> {
        self.snapshot_tx.subscribe()
    }

    /// Returns the latest published snapshot.
    pub fn snapshot(&self) -> SessionSnapshot {
        self.snapshot_tx.borrow().clone()
    }

    pub fn is_running(&self) -> bool {
        self.active_slot().is_some()
    }

    /// Runs one session to completion.
    ///
    /// If a run is already active this is a no-op returning the current
    /// snapshot.
    pub async fn start(&self, request: RunRequest) -> SessionSnapshot {
        let Some(mut abort_rx) = self.claim() else {
            debug!(coin = %request.coin_name, "start ignored: a run is already active");
            return self.snapshot();
        };
        let _active = ActiveRun { controller: self };

        let mut state = SessionState::new();
        state.start();
        info!(
            session_id = ?state.session_id(),
            coin = %request.coin_name,
            max_retries = request.max_retries,
            "starting agent run"
        );
        self.publish(&state);

        self.drive(&request, &mut state, &mut abort_rx).await;
        state.snapshot()
    }

    /// Requests cancellation of the active run. No-op when nothing is running.
    pub fn stop(&self) {
        if let Some(abort_tx) = self.active_slot().as_ref() {
            info!("stop requested");
            let _ = abort_tx.send(true);
        }
    }

    async fn drive(
        &self,
        request: &RunRequest,
        state: &mut SessionState,
        abort_rx: &mut watch::Receiver<bool>,
    ) {
        let opened = tokio::select! {
            biased;
            _ = wait_for_abort(abort_rx) => {
                state.cancel();
                self.publish(state);
                return;
            }
            opened = self.source.open(request) => opened,
        };
        let mut stream = match opened {
            Ok(stream) => stream,
            Err(err) => {
                state.fail(SessionFault::from_open_error(&err));
                self.publish(state);
                return;
            }
        };

        let mut decoder = EventFrameDecoder::default();
        loop {
            let next = tokio::select! {
                biased;
                _ = wait_for_abort(abort_rx) => {
                    state.cancel();
                    self.publish(state);
                    return;
                }
                next = stream.next() => next,
            };

            match next {
                Some(Ok(chunk)) => {
                    for frame in decoder.push_bytes(&chunk) {
                        match frame {
                            Ok(record) => {
                                let outcome = state.append(record);
                                self.publish(state);
                                if outcome == (AppendOutcome::Accepted { terminal: true }) {
                                    return;
                                }
                            }
                            Err(malformed) => {
                                warn!(session_id = ?state.session_id(), error = %malformed, "skipping malformed frame");
                                state.record_malformed();
                                self.publish(state);
                            }
                        }
                    }
                }
                Some(Err(err)) => {
                    state.fail(SessionFault::from_read_error(&err));
                    self.publish(state);
                    return;
                }
                None => {
                    if let Some(rest) = decoder.finish() {
                        debug!(bytes = rest.len(), "dropping unterminated trailing frame");
                    }
                    state.fail(SessionFault::UnexpectedClose);
                    self.publish(state);
                    return;
                }
            }
        }
    }

    fn publish(&self, state: &SessionState) {
        self.snapshot_tx.send_replace(state.snapshot());
    }

    fn claim(&self) -> Option<watch::Receiver<bool>> {
        let mut slot = self.active_slot();
        if slot.is_some() {
            return None;
        }
        let (abort_tx, abort_rx) = watch::channel(false);
        *slot = Some(abort_tx);
        Some(abort_rx)
    }

    fn active_slot(&self) -> MutexGuard<'_, Option<watch::Sender<bool>>> {
        self.active.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Frees the run slot when `start` returns or its future is dropped.
struct ActiveRun<'a> {
    controller: &'a SessionController,
}

impl Drop for ActiveRun<'_> {
    fn drop(&mut self) {
        self.controller.active_slot().take();
        self.controller.snapshot_tx.send_if_modified(|snapshot| {
            if snapshot.status != SessionStatus::Running {
                return false;
            }
            snapshot.status = SessionStatus::Cancelled;
            snapshot.running = false;
            true
        });
    }
}

async fn wait_for_abort(abort_rx: &mut watch::Receiver<bool>) {
    if abort_rx.wait_for(|aborted| *aborted).await.is_err() {
        std::future::pending::<()>().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::SourceError;
    use crate::record::EventKind;
    use crate::source::EventByteStream;
    use crate::stage::Stage;
    use futures::StreamExt as _;
    use futures::stream;
    use std::sync::atomic::{AtomicUsize, Ordering};

    enum FakeBehavior {
        OpenError(SourceError),
        Chunks(Vec<Result<&'static str, SourceError>>),
        PendingBody(Vec<&'static str>),
        PendingOpen,
    }

    struct FakeSource {
        calls: Arc<AtomicUsize>,
        behavior: FakeBehavior,
    }

    impl FakeSource {
        fn new(behavior: FakeBehavior) -> Self {
            Self {
                calls: Arc::new(AtomicUsize::new(0)),
                behavior,
            }
        }
    }

    #[async_trait::async_trait]
    impl EventSource for FakeSource {
        async fn open(&self, _request: &RunRequest) -> Result<EventByteStream, SourceError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match &self.behavior {
                FakeBehavior::OpenError(err) => Err(err.clone()),
                FakeBehavior::Chunks(chunks) => {
                    let items: Vec<Result<bytes::Bytes, SourceError>> = chunks
                        .iter()
                        .map(|c| c.clone().map(|s| bytes::Bytes::from_static(s.as_bytes())))
                        .collect();
                    Ok(Box::pin(stream::iter(items)))
                }
                FakeBehavior::PendingBody(chunks) => {
                    let items: Vec<Result<bytes::Bytes, SourceError>> = chunks
                        .iter()
                        .map(|c| Ok(bytes::Bytes::from_static(c.as_bytes())))
                        .collect();
                    Ok(Box::pin(stream::iter(items).chain(stream::pending())))
                }
                FakeBehavior::PendingOpen => std::future::pending().await,
            }
        }
    }

    fn controller(behavior: FakeBehavior) -> (Arc<SessionController>, Arc<AtomicUsize>) {
        let source = FakeSource::new(behavior);
        let calls = source.calls.clone();
        (Arc::new(SessionController::new(Arc::new(source))), calls)
    }

    fn btc() -> RunRequest {
        RunRequest::new("BTC", 3).expect("request")
    }

    const SCENARIO: [&str; 5] = [
        "data: {\"type\":\"attempt_start\",\"data\":{\"attempt\":1,\"max_retries\":3}}\n\n",
        ": heartbeat\n\ndata: {\"type\":\"decision\",\"data\":{\"decision\":\"BUY\"}}\n",
        "\ndata: {\"type\":\"evaluation_result\",\"data\":{\"success\":true,\"profit\":12.5,",
        "\"price_before\":100,\"price_after\":112.5}}\n\n",
        "data: {\"type\":\"complete\",\"data\":{\"success\":true,\"attempts\":1}}\n\n",
    ];

    #[tokio::test]
    async fn end_to_end_run_completes_with_four_entries() {
        let (controller, _) = controller(FakeBehavior::Chunks(
            SCENARIO.iter().map(|c| Ok(*c)).collect(),
        ));
        let snapshot = controller.start(btc()).await;

        assert_eq!(snapshot.status, SessionStatus::Completed);
        assert!(!snapshot.running);
        assert!(!snapshot.errored);
        assert_eq!(snapshot.log.len(), 4);
        assert_eq!(snapshot.stage.active, Stage::Complete);
        assert!(snapshot.log.iter().all(|e| e.kind() != &EventKind::Error));
        assert_eq!(snapshot.outcome().map(|o| o.attempts), Some(Some(1)));
        assert!(!controller.is_running());
        assert_eq!(controller.snapshot(), snapshot);
    }

    #[tokio::test]
    async fn records_after_terminal_are_not_read() {
        let (controller, _) = controller(FakeBehavior::Chunks(vec![
            Ok("data: {\"type\":\"complete\",\"data\":{\"success\":false,\"attempts\":3}}\n\
                data: {\"type\":\"status\",\"data\":{\"message\":\"late\"}}\n"),
            Ok("data: {\"type\":\"status\",\"data\":{\"message\":\"later\"}}\n"),
        ]));
        let snapshot = controller.start(btc()).await;
        assert_eq!(snapshot.status, SessionStatus::Completed);
        assert_eq!(snapshot.log.len(), 1);
        assert_eq!(
            snapshot.outcome().map(|o| o.success),
            Some(false),
            "business outcome stays payload data"
        );
    }

    #[tokio::test]
    async fn non_success_status_is_a_single_error_entry() {
        let (controller, _) =
            controller(FakeBehavior::OpenError(SourceError::status(500, "boom")));
        let snapshot = controller.start(btc()).await;
        assert_eq!(snapshot.status, SessionStatus::Errored);
        assert_eq!(snapshot.log.len(), 1);
        let message = snapshot.log[0].record.str_field("message").unwrap_or_default();
        assert!(message.contains("status: 500"), "{message}");
        assert!(matches!(snapshot.fault, Some(SessionFault::Transport { .. })));
    }

    #[tokio::test]
    async fn stream_end_without_terminal_is_unexpected_close() {
        let (controller, _) = controller(FakeBehavior::Chunks(vec![
            Ok("data: {\"type\":\"status\",\"data\":{\"message\":\"hi\"}}\n"),
            Ok("data: {\"type\":\"complete\",\"data\":{}}"),
        ]));
        let snapshot = controller.start(btc()).await;
        assert_eq!(snapshot.status, SessionStatus::Errored);
        assert_eq!(snapshot.log.len(), 2);
        assert_eq!(snapshot.fault, Some(SessionFault::UnexpectedClose));
        assert_eq!(snapshot.latest.map(|e| e.record.kind), Some(EventKind::Error));
    }

    #[tokio::test]
    async fn read_fault_keeps_earlier_entries_and_errors() {
        let (controller, _) = controller(FakeBehavior::Chunks(vec![
            Ok("data: {\"type\":\"attempt_start\",\"data\":{\"attempt\":1}}\n"),
            Err(SourceError::stream("connection reset")),
        ]));
        let snapshot = controller.start(btc()).await;
        assert_eq!(snapshot.status, SessionStatus::Errored);
        assert_eq!(snapshot.log.len(), 2);
        assert_eq!(
            snapshot.fault,
            Some(SessionFault::Stream {
                message: "connection reset".into()
            })
        );
    }

    #[tokio::test]
    async fn malformed_frame_is_skipped_without_erroring() {
        let (controller, _) = controller(FakeBehavior::Chunks(vec![
            Ok("data: {not valid}\n"),
            Ok("data: {\"type\":\"status\",\"data\":{\"message\":\"still here\"}}\n"),
            Ok("data: {\"type\":\"complete\",\"data\":{\"success\":true}}\n"),
        ]));
        let snapshot = controller.start(btc()).await;
        assert_eq!(snapshot.status, SessionStatus::Completed);
        assert_eq!(snapshot.malformed_frames, 1);
        assert_eq!(snapshot.log.len(), 2);
    }

    #[tokio::test]
    async fn agent_error_record_ends_in_errored() {
        let (controller, _) = controller(FakeBehavior::Chunks(vec![Ok(
            "data: {\"type\":\"error\",\"data\":{\"message\":\"Failed to get initial price\"}}\n",
        )]));
        let snapshot = controller.start(btc()).await;
        assert_eq!(snapshot.status, SessionStatus::Errored);
        assert_eq!(snapshot.log.len(), 1);
        assert_eq!(
            snapshot.fault,
            Some(SessionFault::Reported {
                message: "Failed to get initial price".into()
            })
        );
    }

    #[tokio::test]
    async fn stop_cancels_a_run_waiting_for_data() {
        let (controller, _) = controller(FakeBehavior::PendingBody(vec![
            "data: {\"type\":\"attempt_start\",\"data\":{\"attempt\":1}}\n",
        ]));
        let mut rx = controller.subscribe();
        let task = tokio::spawn({
            let controller = controller.clone();
            async move { controller.start(btc()).await }
        });

        rx.wait_for(|s| s.running && s.log.len() == 1)
            .await
            .expect("first record");
        controller.stop();

        let snapshot = task.await.expect("join");
        assert_eq!(snapshot.status, SessionStatus::Cancelled);
        assert!(!snapshot.running);
        assert_eq!(snapshot.log.len(), 1);
        assert_eq!(controller.snapshot().status, SessionStatus::Cancelled);
    }

    #[tokio::test]
    async fn stop_cancels_a_run_waiting_for_the_response() {
        let (controller, _) = controller(FakeBehavior::PendingOpen);
        let mut rx = controller.subscribe();
        let task = tokio::spawn({
            let controller = controller.clone();
            async move { controller.start(btc()).await }
        });
        rx.wait_for(|s| s.running).await.expect("running");
        controller.stop();
        let snapshot = task.await.expect("join");
        assert_eq!(snapshot.status, SessionStatus::Cancelled);
        assert!(snapshot.log.is_empty());
    }

    #[tokio::test]
    async fn start_while_running_is_a_no_op() {
        let (controller, calls) = controller(FakeBehavior::PendingBody(vec![]));
        let mut rx = controller.subscribe();
        let task = tokio::spawn({
            let controller = controller.clone();
            async move { controller.start(btc()).await }
        });
        rx.wait_for(|s| s.running).await.expect("running");

        let second = controller.start(btc()).await;
        assert!(second.running);
        assert_eq!(second.session_id, controller.snapshot().session_id);

        controller.stop();
        task.await.expect("join");
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn stop_when_idle_or_finished_has_no_effect() {
        let (controller, _) = controller(FakeBehavior::Chunks(vec![Ok(
            "data: {\"type\":\"complete\",\"data\":{\"success\":true}}\n",
        )]));
        controller.stop();
        assert_eq!(controller.snapshot().status, SessionStatus::Idle);

        let finished = controller.start(btc()).await;
        controller.stop();
        controller.stop();
        assert_eq!(controller.snapshot(), finished);
    }

    #[tokio::test]
    async fn a_new_run_replaces_the_previous_session() {
        let (controller, calls) = controller(FakeBehavior::Chunks(
            SCENARIO.iter().map(|c| Ok(*c)).collect(),
        ));
        let first = controller.start(btc()).await;
        let second = controller.start(btc()).await;
        assert_ne!(first.session_id, second.session_id);
        assert_eq!(second.log.len(), 4);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn dropping_start_frees_the_slot() {
        let (controller, _) = controller(FakeBehavior::PendingOpen);
        let run = controller.start(btc());
        let timed_out =
            tokio::time::timeout(std::time::Duration::from_millis(20), run).await;
        assert!(timed_out.is_err());
        assert!(!controller.is_running());
        assert_eq!(controller.snapshot().status, SessionStatus::Cancelled);
    }
}
