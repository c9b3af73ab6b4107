use std::thread;
use std::time::{Duration, Instant};

use shipdash_schema::RawRecord;
use tracing::{debug, warn};

use crate::error::ExtractError;

// ---------------------------------------------------------------------------
// Rate limiting
// ---------------------------------------------------------------------------

/// Enforced minimum delay between successive external calls. Cooperative and
/// blocking; exists for upstream usage-policy compliance, not parallelism.
pub struct RateLimit {
    min_delay: Duration,
    last: Option<Instant>,
}

impl RateLimit {
    pub fn new(min_delay: Duration) -> Self {
        Self {
            min_delay,
            last: None,
        }
    }

    /// Block until at least `min_delay` has passed since the previous call.
    pub fn pause(&mut self) {
        if let Some(last) = self.last {
            let elapsed = last.elapsed();
            if elapsed < self.min_delay {
                thread::sleep(self.min_delay - elapsed);
            }
        }
        self.last = Some(Instant::now());
    }
}

// ---------------------------------------------------------------------------
// Keyed extraction with provider fallback
// ---------------------------------------------------------------------------

/// One upstream endpoint that can answer a single enrichment key.
pub trait KeyedProvider {
    fn provider_name(&self) -> &str;

    fn fetch(&self, key: &str) -> Result<RawRecord, ExtractError>;
}

/// Calls providers in configured order per key. A key fails only after every
/// provider has failed for it; other keys are unaffected.
pub struct KeyedApiExtractor {
    providers: Vec<Box<dyn KeyedProvider>>,
    limit: RateLimit,
}

/// Per-batch result: fetched records plus the keys that exhausted all
/// providers.
#[derive(Debug, Default)]
pub struct KeyedBatch {
    pub records: Vec<RawRecord>,
    pub exhausted: Vec<String>,
}

impl KeyedApiExtractor {
    pub fn new(providers: Vec<Box<dyn KeyedProvider>>, min_delay: Duration) -> Self {
        Self {
            providers,
            limit: RateLimit::new(min_delay),
        }
    }

    pub fn has_providers(&self) -> bool {
        !self.providers.is_empty()
    }

    /// Fetch one key, trying providers in order.
    pub fn extract_key(&mut self, key: &str) -> Result<RawRecord, ExtractError> {
        for provider in &self.providers {
            self.limit.pause();
            match provider.fetch(key) {
                Ok(record) => {
                    debug!(key, provider = provider.provider_name(), "key fetched");
                    return Ok(record);
                }
                Err(e) => {
                    warn!(key, provider = provider.provider_name(), error = %e, "provider failed");
                }
            }
        }
        Err(ExtractError::ProviderExhausted {
            key: key.to_string(),
        })
    }

    /// Fetch a batch of keys. Failures are per-key; the batch always
    /// completes.
    pub fn extract_keys(&mut self, keys: &[String]) -> KeyedBatch {
        let mut batch = KeyedBatch::default();
        for key in keys {
            match self.extract_key(key) {
                Ok(record) => batch.records.push(record),
                Err(_) => batch.exhausted.push(key.clone()),
            }
        }
        batch
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::rc::Rc;

    struct ScriptedProvider {
        name: &'static str,
        fail_keys: Vec<&'static str>,
        calls: Rc<Cell<usize>>,
    }

    impl KeyedProvider for ScriptedProvider {
        fn provider_name(&self) -> &str {
            self.name
        }

        fn fetch(&self, key: &str) -> Result<RawRecord, ExtractError> {
            self.calls.set(self.calls.get() + 1);
            if self.fail_keys.contains(&key) {
                return Err(ExtractError::Network(format!("{}: down", self.name)));
            }
            let mut record = RawRecord::new();
            record.insert("state".into(), serde_json::json!(key));
            record.insert("source".into(), serde_json::json!(self.name));
            Ok(record)
        }
    }

    fn provider(
        name: &'static str,
        fail_keys: Vec<&'static str>,
    ) -> (Box<dyn KeyedProvider>, Rc<Cell<usize>>) {
        let calls = Rc::new(Cell::new(0));
        (
            Box::new(ScriptedProvider {
                name,
                fail_keys,
                calls: calls.clone(),
            }),
            calls,
        )
    }

    #[test]
    fn primary_success_skips_fallback() {
        let (a, a_calls) = provider("a", vec![]);
        let (b, b_calls) = provider("b", vec![]);
        let mut extractor = KeyedApiExtractor::new(vec![a, b], Duration::ZERO);

        let record = extractor.extract_key("CA").unwrap();
        assert_eq!(record["source"], serde_json::json!("a"));
        assert_eq!(a_calls.get(), 1);
        assert_eq!(b_calls.get(), 0);
    }

    #[test]
    fn fallback_answers_when_primary_fails() {
        let (a, _) = provider("a", vec!["CA"]);
        let (b, _) = provider("b", vec![]);
        let mut extractor = KeyedApiExtractor::new(vec![a, b], Duration::ZERO);

        let record = extractor.extract_key("CA").unwrap();
        assert_eq!(record["source"], serde_json::json!("b"));
    }

    #[test]
    fn exhausted_key_does_not_sink_the_batch() {
        let (a, _) = provider("a", vec!["TX"]);
        let (b, _) = provider("b", vec!["TX"]);
        let mut extractor = KeyedApiExtractor::new(vec![a, b], Duration::ZERO);

        let batch = extractor.extract_keys(&["CA".into(), "TX".into(), "NY".into()]);
        assert_eq!(batch.records.len(), 2);
        assert_eq!(batch.exhausted, vec!["TX".to_string()]);
    }

    #[test]
    fn no_providers_exhausts_every_key() {
        let mut extractor = KeyedApiExtractor::new(vec![], Duration::ZERO);
        assert!(!extractor.has_providers());

        let err = extractor.extract_key("CA").unwrap_err();
        assert_eq!(err, ExtractError::ProviderExhausted { key: "CA".into() });
    }

    #[test]
    fn rate_limit_spaces_out_calls() {
        let mut limit = RateLimit::new(Duration::from_millis(30));
        let start = Instant::now();
        limit.pause();
        limit.pause();
        limit.pause();
        assert!(start.elapsed() >= Duration::from_millis(60));
    }
}
