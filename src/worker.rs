//! Background generation over a typed message channel.
//!
//! The caller owns a [`PdfWorker`] and talks to a dedicated thread by moving
//! [`WorkerRequest`]s in and [`WorkerResponse`]s out. Every request is
//! answered by zero or more `Progress` messages followed by exactly one
//! `Complete`. Only one request may be in flight per worker.

use crate::QrDeck;
use crate::error::QrDeckError;
use crate::model::Playlist;
use crate::progress::ProgressEvent;
use serde::{Deserialize, Serialize};
use std::panic::{self, AssertUnwindSafe};
use std::sync::mpsc::{self, Receiver, Sender, TryRecvError};
use std::thread::{self, JoinHandle};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", content = "payload", rename_all = "lowercase")]
pub enum WorkerRequest {
    Generate(GeneratePayload),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneratePayload {
    pub playlists: Vec<Playlist>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "lowercase")]
pub enum WorkerResponse {
    Progress(ProgressEvent),
    Complete(CompletePayload),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompletePayload {
    pub success: bool,
    /// PDF bytes, base64 encoded on the wire.
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "document_base64"
    )]
    pub document: Option<Vec<u8>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

impl CompletePayload {
    pub fn success(document: Vec<u8>) -> Self {
        Self {
            success: true,
            document: Some(document),
            error_message: None,
        }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            document: None,
            error_message: Some(message.into()),
        }
    }
}

mod document_base64 {
    use base64::Engine;
    use base64::engine::general_purpose::STANDARD;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Option<Vec<u8>>, serializer: S) -> Result<S::Ok, S::Error> {
        match value {
            Some(bytes) => serializer.serialize_str(&STANDARD.encode(bytes)),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<Vec<u8>>, D::Error> {
        let encoded: Option<String> = Option::deserialize(deserializer)?;
        encoded
            .map(|text| STANDARD.decode(text).map_err(serde::de::Error::custom))
            .transpose()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum WorkerError {
    #[error("a generate request is already in flight")]
    Busy,
    #[error("no generate request is in flight")]
    Idle,
    #[error("worker thread is gone")]
    Disconnected,
    #[error("generation failed: {0}")]
    Generation(String),
}

pub struct PdfWorker {
    requests: Option<Sender<WorkerRequest>>,
    responses: Receiver<WorkerResponse>,
    in_flight: bool,
    handle: Option<JoinHandle<()>>,
}

impl PdfWorker {
    pub fn spawn(deck: QrDeck) -> Result<Self, QrDeckError> {
        let (request_tx, request_rx) = mpsc::channel::<WorkerRequest>();
        let (response_tx, response_rx) = mpsc::channel::<WorkerResponse>();
        let handle = thread::Builder::new()
            .name("qrdeck-worker".to_string())
            .spawn(move || worker_loop(deck, request_rx, response_tx))?;
        Ok(Self {
            requests: Some(request_tx),
            responses: response_rx,
            in_flight: false,
            handle: Some(handle),
        })
    }

    pub fn is_busy(&self) -> bool {
        self.in_flight
    }

    /// Rejects the request with [`WorkerError::Busy`] while another one has
    /// not seen its `Complete` yet; the in-flight exchange is unaffected.
    pub fn send(&mut self, request: WorkerRequest) -> Result<(), WorkerError> {
        if self.in_flight {
            return Err(WorkerError::Busy);
        }
        let requests = self.requests.as_ref().ok_or(WorkerError::Disconnected)?;
        requests
            .send(request)
            .map_err(|_| WorkerError::Disconnected)?;
        self.in_flight = true;
        Ok(())
    }

    /// Blocks for the next message of the current exchange. Fails with
    /// [`WorkerError::Idle`] instead of waiting when nothing was sent.
    pub fn recv(&mut self) -> Result<WorkerResponse, WorkerError> {
        if !self.in_flight {
            return Err(WorkerError::Idle);
        }
        let response = self.responses.recv().map_err(|_| {
            self.in_flight = false;
            WorkerError::Disconnected
        })?;
        self.observe(&response);
        Ok(response)
    }

    /// Never blocks; `Ok(None)` when no message is waiting.
    pub fn try_recv(&mut self) -> Result<Option<WorkerResponse>, WorkerError> {
        match self.responses.try_recv() {
            Ok(response) => {
                self.observe(&response);
                Ok(Some(response))
            }
            Err(TryRecvError::Empty) => Ok(None),
            Err(TryRecvError::Disconnected) => {
                self.in_flight = false;
                Err(WorkerError::Disconnected)
            }
        }
    }

    /// Sends one request and drives it to completion, forwarding progress.
    pub fn generate(
        &mut self,
        playlists: Vec<Playlist>,
        mut on_progress: impl FnMut(&ProgressEvent),
    ) -> Result<Vec<u8>, WorkerError> {
        self.send(WorkerRequest::Generate(GeneratePayload { playlists }))?;
        loop {
            match self.recv()? {
                WorkerResponse::Progress(event) => on_progress(&event),
                WorkerResponse::Complete(complete) => {
                    return match (complete.success, complete.document) {
                        (true, Some(document)) => Ok(document),
                        _ => Err(WorkerError::Generation(
                            complete
                                .error_message
                                .unwrap_or_else(|| "no document produced".to_string()),
                        )),
                    };
                }
            }
        }
    }

    /// Drops the channel and detaches the thread. A run in progress finishes
    /// in the background and its result is discarded.
    pub fn terminate(mut self) {
        self.shutdown();
    }

    fn observe(&mut self, response: &WorkerResponse) {
        if matches!(response, WorkerResponse::Complete(_)) {
            self.in_flight = false;
        }
    }

    fn shutdown(&mut self) {
        self.requests = None;
        if let Some(handle) = self.handle.take() {
            if handle.is_finished() {
                let _ = handle.join();
            }
        }
    }
}

impl Drop for PdfWorker {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn worker_loop(deck: QrDeck, requests: Receiver<WorkerRequest>, responses: Sender<WorkerResponse>) {
    for request in requests {
        let complete = match request {
            WorkerRequest::Generate(payload) => handle_generate(&deck, &payload.playlists, &responses),
        };
        if responses.send(WorkerResponse::Complete(complete)).is_err() {
            break;
        }
    }
    log::debug!("worker channel closed");
}

fn handle_generate(
    deck: &QrDeck,
    playlists: &[Playlist],
    responses: &Sender<WorkerResponse>,
) -> CompletePayload {
    let result = panic::catch_unwind(AssertUnwindSafe(|| {
        deck.generate_pdf(playlists, |event| {
            let _ = responses.send(WorkerResponse::Progress(*event));
        })
    }));
    match result {
        Ok(Ok(document)) => CompletePayload::success(document),
        Ok(Err(err)) => CompletePayload::failure(err.to_string()),
        Err(payload) => {
            let message = payload
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| payload.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "generation panicked".to_string());
            log::error!("worker recovered from panic: {message}");
            CompletePayload::failure(message)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pdfinspect::inspect_pdf_bytes;
    use crate::pipeline::tests::playlist;
    use crate::progress::ProgressSection;
    use crate::qr::{QrBitmap, QrEncoder};
    use serde_json::json;
    use std::sync::Arc;

    fn deck() -> QrDeck {
        QrDeck::builder().build().unwrap()
    }

    fn drain(worker: &mut PdfWorker) -> (Vec<ProgressEvent>, CompletePayload) {
        let mut progress = Vec::new();
        loop {
            match worker.recv().unwrap() {
                WorkerResponse::Progress(event) => progress.push(event),
                WorkerResponse::Complete(complete) => return (progress, complete),
            }
        }
    }

    #[test]
    fn generate_streams_progress_then_document() {
        let mut worker = PdfWorker::spawn(deck()).unwrap();
        let mut events = Vec::new();
        let bytes = worker
            .generate(vec![playlist("a", 0, 10), playlist("b", 10, 20)], |event| {
                events.push(*event)
            })
            .unwrap();
        assert_eq!(inspect_pdf_bytes(&bytes).unwrap().page_count, 5);
        assert_eq!(events[0].section, ProgressSection::CalculatingStats);
        assert_eq!(events.last().map(|e| e.percent), Some(100));
        assert!(!worker.is_busy());
        worker.terminate();
    }

    #[test]
    fn second_request_is_rejected_while_busy() {
        let mut worker = PdfWorker::spawn(deck()).unwrap();
        let request = WorkerRequest::Generate(GeneratePayload {
            playlists: vec![playlist("a", 0, 3)],
        });
        worker.send(request.clone()).unwrap();
        assert!(matches!(worker.send(request.clone()), Err(WorkerError::Busy)));

        let (progress, complete) = drain(&mut worker);
        assert!(complete.success);
        assert!(!progress.is_empty());
        // Nothing from the rejected request follows.
        assert!(matches!(worker.try_recv(), Ok(None)));
        assert!(matches!(worker.recv(), Err(WorkerError::Idle)));

        worker.send(request).unwrap();
        let (_, complete) = drain(&mut worker);
        assert!(complete.success);
    }

    #[test]
    fn recv_without_request_is_idle() {
        let mut worker = PdfWorker::spawn(deck()).unwrap();
        assert!(matches!(worker.recv(), Err(WorkerError::Idle)));
        assert!(matches!(worker.try_recv(), Ok(None)));
        assert!(!worker.is_busy());
        worker.terminate();
    }

    struct FailingEncoder;

    impl QrEncoder for FailingEncoder {
        fn encode(&self, payload: &str) -> Result<QrBitmap, QrDeckError> {
            Err(QrDeckError::QrEncoding(format!("refused {payload}")))
        }
    }

    struct PanickingEncoder;

    impl QrEncoder for PanickingEncoder {
        fn encode(&self, _: &str) -> Result<QrBitmap, QrDeckError> {
            panic!("encoder exploded")
        }
    }

    #[test]
    fn failures_complete_with_error_message() {
        let deck = QrDeck::builder()
            .qr_encoder(Arc::new(FailingEncoder))
            .build()
            .unwrap();
        let mut worker = PdfWorker::spawn(deck).unwrap();
        let err = worker.generate(vec![playlist("a", 0, 2)], |_| {}).unwrap_err();
        match err {
            WorkerError::Generation(message) => assert!(message.contains("refused spotify:track:t0")),
            other => panic!("unexpected error {other}"),
        }
        assert!(!worker.is_busy());
    }

    #[test]
    fn panics_are_reported_not_propagated() {
        let deck = QrDeck::builder()
            .qr_encoder(Arc::new(PanickingEncoder))
            .build()
            .unwrap();
        let mut worker = PdfWorker::spawn(deck).unwrap();
        worker
            .send(WorkerRequest::Generate(GeneratePayload {
                playlists: vec![playlist("a", 0, 1)],
            }))
            .unwrap();
        let (_, complete) = drain(&mut worker);
        assert!(!complete.success);
        assert_eq!(complete.error_message.as_deref(), Some("encoder exploded"));

        // The worker survives and serves the next request.
        let err = worker.generate(vec![playlist("a", 0, 1)], |_| {}).unwrap_err();
        assert!(matches!(err, WorkerError::Generation(_)));
    }

    #[test]
    fn messages_use_tagged_wire_shape() {
        let request: WorkerRequest = serde_json::from_value(json!({
            "action": "generate",
            "payload": { "playlists": [{ "name": "Empty", "trackInfos": [] }] }
        }))
        .unwrap();
        let WorkerRequest::Generate(payload) = request;
        assert_eq!(payload.playlists[0].name, "Empty");

        let progress = WorkerResponse::Progress(ProgressEvent {
            section: ProgressSection::AddingQrCodes,
            percent: 40,
        });
        assert_eq!(
            serde_json::to_value(&progress).unwrap(),
            json!({ "type": "progress", "payload": { "section": "adding qr codes", "percent": 40 } })
        );

        let failed = WorkerResponse::Complete(CompletePayload::failure("boom"));
        assert_eq!(
            serde_json::to_value(&failed).unwrap(),
            json!({ "type": "complete", "payload": { "success": false, "errorMessage": "boom" } })
        );

        let done = WorkerResponse::Complete(CompletePayload::success(b"%PDF".to_vec()));
        let wire = serde_json::to_value(&done).unwrap();
        assert_eq!(wire["payload"]["document"], "JVBERg==");
        let back: WorkerResponse = serde_json::from_value(wire).unwrap();
        assert_eq!(back, done);
    }
}
