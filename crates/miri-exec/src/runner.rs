use std::thread;
use std::thread::JoinHandle;

use miri_core::protocol::AnalysisRequest;
use miri_core::protocol::StreamEnvelope;

use crate::client::AnalysisClient;
use crate::error::ClientError;

/// Progress of a background run, in the order it happened.
#[derive(Debug)]
pub enum RunEvent {
    Envelope(StreamEnvelope),
    Failed(ClientError),
    /// Always the last event of a run, after success or failure.
    Finished,
}

/// Runs one analysis on its own thread and reports through `callback`.
///
/// `callback` returns `false` once nobody is listening anymore; the run then
/// stops reading the body. `Finished` is still attempted so a listener that
/// reappears never sees a dangling run.
pub fn spawn_analysis<F>(
    client: AnalysisClient,
    request: AnalysisRequest,
    callback: F,
) -> JoinHandle<()>
where
    F: Fn(RunEvent) -> bool + Send + 'static,
{
    thread::spawn(move || {
        let runtime = match tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
        {
            Ok(runtime) => runtime,
            Err(err) => {
                callback(RunEvent::Failed(ClientError::Runtime {
                    message: err.to_string(),
                }));
                callback(RunEvent::Finished);
                return;
            }
        };

        runtime.block_on(drive(&client, &request, &callback));
        callback(RunEvent::Finished);
    })
}

async fn drive<F>(client: &AnalysisClient, request: &AnalysisRequest, callback: &F)
where
    F: Fn(RunEvent) -> bool,
{
    let mut stream = match client.open(request).await {
        Ok(stream) => stream,
        Err(err) => {
            tracing::warn!(error = %err, "analysis request failed");
            callback(RunEvent::Failed(err));
            return;
        }
    };

    while let Some(item) = stream.next().await {
        match item {
            Ok(envelope) => {
                tracing::trace!(kind = envelope.kind(), "envelope received");
                if !callback(RunEvent::Envelope(envelope)) {
                    tracing::debug!("run listener gone; stop reading");
                    return;
                }
            }
            Err(err) => {
                tracing::warn!(error = %err, "analysis run failed");
                callback(RunEvent::Failed(err));
                return;
            }
        }
    }
    if stream.skipped_lines() > 0 {
        tracing::info!(skipped = stream.skipped_lines(), "malformed lines discarded");
    }
}
