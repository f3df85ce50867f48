//! Gateway to the external text/image classifier.
//!
//! The classifier is an injected, fallible remote capability. Calls are
//! bounded by a timeout; on failure the gateway hands back an
//! `Unavailable` signal instead of an error, and the combiner degrades
//! the verdict to review. Results are cached by content hash so
//! resubmission of identical content does not re-invoke the classifier.

use async_trait::async_trait;
use dashmap::DashMap;
use once_cell::sync::Lazy;
use serde::Deserialize;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::error::{Result, SafetyError};

/// Raw text classification from the remote capability.
#[derive(Debug, Clone, Default)]
pub struct TextClassification {
    pub category_scores: HashMap<String, f32>,
}

/// Raw image label from the remote capability.
#[derive(Debug, Clone)]
pub struct ImageLabel {
    pub name: String,
    pub confidence: f32,
}

#[async_trait]
pub trait Classifier: Send + Sync {
    async fn classify_text(&self, text: &str) -> Result<TextClassification>;
    async fn classify_image(&self, bytes: &[u8]) -> Result<Vec<ImageLabel>>;
}

/// Per-category flagging thresholds. A category is flagged iff its score
/// meets the threshold; unknown categories fall back to the default.
static CATEGORY_THRESHOLDS: Lazy<HashMap<&'static str, f32>> = Lazy::new(|| {
    HashMap::from([
        ("hate", 0.5),
        ("hate/threatening", 0.5),
        ("harassment", 0.6),
        ("harassment/threatening", 0.5),
        ("self-harm", 0.5),
        ("self-harm/intent", 0.5),
        ("self-harm/instructions", 0.5),
        ("sexual", 0.7),
        ("sexual/minors", 0.1),
        ("violence", 0.7),
        ("violence/graphic", 0.6),
    ])
});

const DEFAULT_THRESHOLD: f32 = 0.5;

pub fn threshold_for(category: &str) -> f32 {
    CATEGORY_THRESHOLDS
        .get(category)
        .copied()
        .unwrap_or(DEFAULT_THRESHOLD)
}

/// Normalized classifier output handed to the verdict combiner.
#[derive(Debug, Clone)]
pub enum TextSignal {
    Scored {
        /// Categories whose score met the threshold, sorted for stability.
        flagged: Vec<String>,
        scores: HashMap<String, f32>,
    },
    /// The classifier timed out or errored; the combiner must default
    /// to review, never allow or block.
    Unavailable,
}

struct CacheEntry {
    signal: TextSignal,
    inserted_at: Instant,
}

pub struct ClassifierGateway {
    classifier: Arc<dyn Classifier>,
    cache: DashMap<String, CacheEntry>,
    cache_ttl: Duration,
    call_timeout: Duration,
}

impl ClassifierGateway {
    pub fn new(
        classifier: Arc<dyn Classifier>,
        cache_ttl: Duration,
        call_timeout: Duration,
    ) -> Self {
        Self {
            classifier,
            cache: DashMap::new(),
            cache_ttl,
            call_timeout,
        }
    }

    /// Classify text, consulting the content-hash cache first. Never fails:
    /// degradation is encoded in the returned signal.
    pub async fn classify_text(&self, text: &str) -> TextSignal {
        let key = content_hash(text);

        if let Some(entry) = self.cache.get(&key) {
            if entry.inserted_at.elapsed() < self.cache_ttl {
                tracing::debug!(content_hash = %key, "Classification cache hit");
                return entry.signal.clone();
            }
        }

        let signal = match tokio::time::timeout(
            self.call_timeout,
            self.classifier.classify_text(text),
        )
        .await
        {
            Ok(Ok(classification)) => {
                let signal = apply_thresholds(&classification);
                // Only successful classifications are cached; an outage
                // should be retried on the next submission.
                self.cache.insert(
                    key,
                    CacheEntry {
                        signal: signal.clone(),
                        inserted_at: Instant::now(),
                    },
                );
                signal
            }
            Ok(Err(e)) => {
                tracing::warn!(error = %e, "Classifier call failed, degrading to review");
                TextSignal::Unavailable
            }
            Err(_) => {
                tracing::warn!(
                    timeout_ms = %self.call_timeout.as_millis(),
                    "Classifier call timed out, degrading to review"
                );
                TextSignal::Unavailable
            }
        };

        signal
    }

    /// Classify image bytes into flagged label names. Same degradation
    /// policy as text.
    pub async fn classify_image(&self, bytes: &[u8]) -> TextSignal {
        match tokio::time::timeout(self.call_timeout, self.classifier.classify_image(bytes)).await
        {
            Ok(Ok(labels)) => {
                let mut flagged = Vec::new();
                let mut scores = HashMap::new();
                for label in labels {
                    let name = label.name.to_lowercase();
                    scores.insert(name.clone(), label.confidence);
                    flagged.push(name);
                }
                flagged.sort();
                TextSignal::Scored { flagged, scores }
            }
            Ok(Err(e)) => {
                tracing::warn!(error = %e, "Image classifier call failed, degrading to review");
                TextSignal::Unavailable
            }
            Err(_) => {
                tracing::warn!("Image classifier call timed out, degrading to review");
                TextSignal::Unavailable
            }
        }
    }
}

fn apply_thresholds(classification: &TextClassification) -> TextSignal {
    let mut flagged: Vec<String> = classification
        .category_scores
        .iter()
        .filter(|(category, score)| **score >= threshold_for(category))
        .map(|(category, _)| category.clone())
        .collect();
    flagged.sort();

    TextSignal::Scored {
        flagged,
        scores: classification.category_scores.clone(),
    }
}

fn content_hash(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    hex::encode(hasher.finalize())
}

/// HTTP implementation of the classifier capability, speaking the
/// moderation-endpoint wire shape (`{"input": ...}` in,
/// `{"results": [{"category_scores": {...}}]}` out).
pub struct HttpClassifier {
    client: reqwest::Client,
    text_url: String,
    api_key: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ModerationResponse {
    results: Vec<ModerationResultBody>,
}

#[derive(Debug, Deserialize)]
struct ModerationResultBody {
    category_scores: HashMap<String, f32>,
}

impl HttpClassifier {
    pub fn new(text_url: impl Into<String>, api_key: Option<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            text_url: text_url.into(),
            api_key,
        }
    }
}

#[async_trait]
impl Classifier for HttpClassifier {
    async fn classify_text(&self, text: &str) -> Result<TextClassification> {
        let mut request = self
            .client
            .post(&self.text_url)
            .json(&serde_json::json!({ "input": text }));

        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request.send().await?.error_for_status()?;
        let body: ModerationResponse = response.json().await?;
        let result = body.results.into_iter().next().ok_or_else(|| {
            SafetyError::ClassifierUnavailable("empty classifier response".into())
        })?;

        Ok(TextClassification {
            category_scores: result.category_scores,
        })
    }

    async fn classify_image(&self, _bytes: &[u8]) -> Result<Vec<ImageLabel>> {
        // The text endpoint has no image counterpart on this deployment.
        Err(SafetyError::ClassifierUnavailable(
            "image classification endpoint not configured".into(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    mockall::mock! {
        pub TestClassifier {}

        #[async_trait]
        impl Classifier for TestClassifier {
            async fn classify_text(&self, text: &str) -> Result<TextClassification>;
            async fn classify_image(&self, bytes: &[u8]) -> Result<Vec<ImageLabel>>;
        }
    }

    struct CountingClassifier {
        calls: AtomicUsize,
        scores: HashMap<String, f32>,
    }

    #[async_trait]
    impl Classifier for CountingClassifier {
        async fn classify_text(&self, _text: &str) -> Result<TextClassification> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(TextClassification {
                category_scores: self.scores.clone(),
            })
        }

        async fn classify_image(&self, _bytes: &[u8]) -> Result<Vec<ImageLabel>> {
            Ok(vec![])
        }
    }

    struct SlowClassifier;

    #[async_trait]
    impl Classifier for SlowClassifier {
        async fn classify_text(&self, _text: &str) -> Result<TextClassification> {
            tokio::time::sleep(Duration::from_millis(250)).await;
            Ok(TextClassification::default())
        }

        async fn classify_image(&self, _bytes: &[u8]) -> Result<Vec<ImageLabel>> {
            tokio::time::sleep(Duration::from_millis(250)).await;
            Ok(vec![])
        }
    }

    #[test]
    fn test_threshold_table() {
        assert_eq!(threshold_for("sexual/minors"), 0.1);
        assert_eq!(threshold_for("harassment"), 0.6);
        assert_eq!(threshold_for("violence"), 0.7);
        assert_eq!(threshold_for("unknown-category"), 0.5);
    }

    #[test]
    fn test_apply_thresholds_flags_at_boundary() {
        let classification = TextClassification {
            category_scores: HashMap::from([
                ("hate".to_string(), 0.5),
                ("sexual".to_string(), 0.69),
                ("violence".to_string(), 0.71),
            ]),
        };
        match apply_thresholds(&classification) {
            TextSignal::Scored { flagged, .. } => {
                assert_eq!(flagged, vec!["hate".to_string(), "violence".to_string()]);
            }
            TextSignal::Unavailable => panic!("expected scored signal"),
        }
    }

    #[tokio::test]
    async fn test_cache_prevents_second_call() {
        let classifier = Arc::new(CountingClassifier {
            calls: AtomicUsize::new(0),
            scores: HashMap::from([("hate".to_string(), 0.9)]),
        });
        let gateway = ClassifierGateway::new(
            classifier.clone(),
            Duration::from_secs(60),
            Duration::from_secs(1),
        );

        let first = gateway.classify_text("same content").await;
        let second = gateway.classify_text("same content").await;

        assert_eq!(classifier.calls.load(Ordering::SeqCst), 1);
        match (first, second) {
            (
                TextSignal::Scored { flagged: a, .. },
                TextSignal::Scored { flagged: b, .. },
            ) => assert_eq!(a, b),
            _ => panic!("expected scored signals"),
        }
    }

    #[tokio::test]
    async fn test_distinct_content_not_cached_together() {
        let classifier = Arc::new(CountingClassifier {
            calls: AtomicUsize::new(0),
            scores: HashMap::new(),
        });
        let gateway = ClassifierGateway::new(
            classifier.clone(),
            Duration::from_secs(60),
            Duration::from_secs(1),
        );

        gateway.classify_text("first").await;
        gateway.classify_text("second").await;
        assert_eq!(classifier.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_timeout_degrades_to_unavailable() {
        let gateway = ClassifierGateway::new(
            Arc::new(SlowClassifier),
            Duration::from_secs(60),
            Duration::from_millis(20),
        );
        assert!(matches!(
            gateway.classify_text("anything").await,
            TextSignal::Unavailable
        ));
    }

    #[tokio::test]
    async fn test_error_degrades_to_unavailable_and_is_not_cached() {
        let mut mock = MockTestClassifier::new();
        mock.expect_classify_text()
            .times(2)
            .returning(|_| Err(SafetyError::ClassifierUnavailable("down".into())));

        let gateway = ClassifierGateway::new(
            Arc::new(mock),
            Duration::from_secs(60),
            Duration::from_secs(1),
        );

        assert!(matches!(
            gateway.classify_text("text").await,
            TextSignal::Unavailable
        ));
        // Second submission retries instead of serving a cached outage.
        assert!(matches!(
            gateway.classify_text("text").await,
            TextSignal::Unavailable
        ));
    }

    #[tokio::test]
    async fn test_image_labels_normalized() {
        let mut mock = MockTestClassifier::new();
        mock.expect_classify_image().returning(|_| {
            Ok(vec![ImageLabel {
                name: "Explicit Nudity".to_string(),
                confidence: 0.93,
            }])
        });

        let gateway = ClassifierGateway::new(
            Arc::new(mock),
            Duration::from_secs(60),
            Duration::from_secs(1),
        );

        match gateway.classify_image(&[0u8; 4]).await {
            TextSignal::Scored { flagged, scores } => {
                assert_eq!(flagged, vec!["explicit nudity".to_string()]);
                assert!((scores["explicit nudity"] - 0.93).abs() < f32::EPSILON);
            }
            TextSignal::Unavailable => panic!("expected scored signal"),
        }
    }
}
