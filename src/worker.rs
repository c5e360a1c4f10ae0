use anyhow::Result;
use async_trait::async_trait;
use tokio::sync::oneshot;

use crate::adapter::Classifier;
use crate::classifier::SentimentClassifier;
use crate::types::ClassificationResult;

type ResponseSender = oneshot::Sender<Result<ClassificationResult>>;

struct QueuedRequest {
    text: String,
    response_tx: ResponseSender,
}

/// Blocking classification, as run on the worker thread.
pub trait BlockingClassify: Send + 'static {
    fn classify(&self, text: &str) -> Result<ClassificationResult>;
}

impl BlockingClassify for SentimentClassifier {
    fn classify(&self, text: &str) -> Result<ClassificationResult> {
        SentimentClassifier::classify(self, text)
    }
}

/// Async handle to the inference worker thread.
///
/// The model's forward pass is CPU/accelerator-bound, so it runs on a
/// dedicated OS thread instead of the tokio runtime; handlers send the text
/// through a rendezvous channel and await a oneshot reply. Requests are
/// served one at a time in FIFO order.
#[derive(Clone)]
pub struct ClassifierHandle {
    request_tx: flume::Sender<QueuedRequest>,
}

impl ClassifierHandle {
    pub fn spawn<C: BlockingClassify>(classifier: C) -> Self {
        let (request_tx, request_rx) = flume::bounded::<QueuedRequest>(0); // Rendezvous channel

        std::thread::spawn(move || {
            tracing::info!("Inference worker started");
            while let Ok(queued) = request_rx.recv() {
                let result = classifier.classify(&queued.text);
                if let Err(ref e) = result {
                    tracing::error!(error = %e, "Inference failed");
                }
                // Receiver gone means the request was abandoned; nothing to do.
                let _ = queued.response_tx.send(result);
            }
            tracing::info!("Request channel closed, inference worker exiting");
        });

        Self { request_tx }
    }
}

#[async_trait]
impl Classifier for ClassifierHandle {
    #[tracing::instrument(skip(self, text), fields(text_len = text.len()))]
    async fn classify(&self, text: &str) -> Result<ClassificationResult> {
        let (response_tx, response_rx) = oneshot::channel();

        let queued_request = QueuedRequest {
            text: text.to_string(),
            response_tx,
        };

        self.request_tx
            .send_async(queued_request)
            .await
            .map_err(|_| anyhow::anyhow!("Inference worker is gone"))?;

        response_rx
            .await
            .map_err(|_| anyhow::anyhow!("Response channel closed"))?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Sentiment;

    struct FixedClassifier {
        sentiment: Sentiment,
        confidence: f64,
    }

    impl BlockingClassify for FixedClassifier {
        fn classify(&self, _text: &str) -> Result<ClassificationResult> {
            Ok(ClassificationResult::new(self.sentiment, self.confidence))
        }
    }

    struct FailingClassifier;

    impl BlockingClassify for FailingClassifier {
        fn classify(&self, _text: &str) -> Result<ClassificationResult> {
            Err(anyhow::anyhow!("model exploded"))
        }
    }

    #[tokio::test]
    async fn round_trip_through_worker() {
        let handle = ClassifierHandle::spawn(FixedClassifier {
            sentiment: Sentiment::Positive,
            confidence: 0.91234,
        });

        let result = Classifier::classify(&handle, "I love this product")
            .await
            .unwrap();
        assert_eq!(result.sentiment, Sentiment::Positive);
        assert_eq!(result.confidence, 0.9123);
    }

    #[tokio::test]
    async fn identical_text_yields_identical_result() {
        let handle = ClassifierHandle::spawn(FixedClassifier {
            sentiment: Sentiment::Negative,
            confidence: 0.75,
        });

        let first = Classifier::classify(&handle, "meh").await.unwrap();
        let second = Classifier::classify(&handle, "meh").await.unwrap();
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn worker_errors_propagate() {
        let handle = ClassifierHandle::spawn(FailingClassifier);

        let err = Classifier::classify(&handle, "anything").await.unwrap_err();
        assert!(err.to_string().contains("model exploded"));
    }

    /// Signals on drop, so a test can observe the worker thread releasing
    /// its classifier after the last handle goes away.
    struct DropSignalClassifier {
        dropped_tx: flume::Sender<()>,
    }

    impl BlockingClassify for DropSignalClassifier {
        fn classify(&self, _text: &str) -> Result<ClassificationResult> {
            Ok(ClassificationResult::new(Sentiment::Negative, 1.0))
        }
    }

    impl Drop for DropSignalClassifier {
        fn drop(&mut self) {
            let _ = self.dropped_tx.send(());
        }
    }

    #[tokio::test]
    async fn worker_exits_when_last_handle_drops() {
        let (dropped_tx, dropped_rx) = flume::bounded(1);
        let handle = ClassifierHandle::spawn(DropSignalClassifier { dropped_tx });
        let clone = handle.clone();

        drop(handle);
        // A surviving clone keeps the worker alive.
        assert!(
            dropped_rx
                .recv_timeout(std::time::Duration::from_millis(100))
                .is_err()
        );

        drop(clone);
        dropped_rx
            .recv_timeout(std::time::Duration::from_secs(5))
            .expect("worker thread should exit and drop its classifier");
    }

    struct PanickingClassifier;

    impl BlockingClassify for PanickingClassifier {
        fn classify(&self, _text: &str) -> Result<ClassificationResult> {
            panic!("inference thread died");
        }
    }

    #[tokio::test]
    async fn dead_worker_surfaces_channel_errors() {
        let handle = ClassifierHandle::spawn(PanickingClassifier);

        // The worker accepts the request, then dies mid-inference: the
        // caller's reply channel closes without a response.
        let first = Classifier::classify(&handle, "anything").await.unwrap_err();
        assert!(first.to_string().contains("Response channel closed"));

        // With the worker gone the request channel is disconnected, so
        // later calls fail on send.
        let second = Classifier::classify(&handle, "anything").await.unwrap_err();
        assert!(second.to_string().contains("Inference worker is gone"));
    }
}
