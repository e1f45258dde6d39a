use std::thread;
use std::time::Duration;

use tracing::debug;

use crate::error::OntomapError;
use crate::Result;

/// Blocking retrieval of a remote resource.
///
/// Every remote lookup in the crate (term definitions, the slim vocabulary,
/// the five mapping tables, record text) goes through this trait, so tests
/// can substitute canned responses and count calls.
pub trait Fetch {
    fn fetch(&self, url: &str) -> Result<String>;
}

/// HTTP fetcher with a small fixed retry budget.
///
/// Each attempt blocks until the transport completes or fails; failed
/// attempts are separated by a fixed backoff sleep. Once the budget is
/// exhausted the call fails with [`OntomapError::Retrieval`] carrying the
/// number of attempts made.
pub struct HttpFetcher {
    tries: u32,
    backoff: Duration,
}

impl HttpFetcher {
    pub fn new(tries: u32, backoff: Duration) -> HttpFetcher {
        HttpFetcher { tries, backoff }
    }
}

impl Default for HttpFetcher {
    fn default() -> HttpFetcher {
        HttpFetcher::new(2, Duration::from_secs(3))
    }
}

impl Fetch for HttpFetcher {
    fn fetch(&self, url: &str) -> Result<String> {
        let mut attempts = 0;
        loop {
            attempts += 1;
            let reason = match ureq::get(url).call() {
                Ok(response) => match response.into_string() {
                    Ok(body) => return Ok(body),
                    Err(err) => err.to_string(),
                },
                Err(err) => err.to_string(),
            };
            if attempts >= self.tries {
                return Err(OntomapError::Retrieval { reason, attempts });
            }
            debug!("fetch of {} failed ({}), retrying in {:?}", url, reason, self.backoff);
            thread::sleep(self.backoff);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retry_budget_is_exhausted() {
        // port 0 is never connectable, so every attempt fails fast
        let fetcher = HttpFetcher::new(2, Duration::from_millis(0));
        match fetcher.fetch("http://127.0.0.1:0/") {
            Err(OntomapError::Retrieval { attempts, .. }) => assert_eq!(attempts, 2),
            other => panic!("expected retrieval error, got {:?}", other),
        }
    }
}

#[cfg(test)]
pub(crate) mod mock {
    use std::collections::HashMap;
    use std::sync::Mutex;

    use super::Fetch;
    use crate::error::OntomapError;
    use crate::Result;

    /// Canned fetcher that records every URL it is asked for.
    #[derive(Default)]
    pub(crate) struct MockFetch {
        bodies: HashMap<String, String>,
        calls: Mutex<Vec<String>>,
    }

    impl MockFetch {
        pub fn new() -> MockFetch {
            MockFetch::default()
        }

        pub fn body(mut self, url: &str, body: &str) -> MockFetch {
            self.bodies.insert(url.to_string(), body.to_string());
            self
        }

        pub fn calls(&self) -> usize {
            self.calls.lock().unwrap().len()
        }

        pub fn calls_for(&self, url: &str) -> usize {
            self.calls.lock().unwrap().iter().filter(|u| *u == url).count()
        }
    }

    impl Fetch for MockFetch {
        fn fetch(&self, url: &str) -> Result<String> {
            self.calls.lock().unwrap().push(url.to_string());
            self.bodies.get(url).cloned().ok_or_else(|| OntomapError::Retrieval {
                reason: format!("no canned response for {}", url),
                attempts: 1,
            })
        }
    }
}
