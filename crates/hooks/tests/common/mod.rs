//! Shared fakes for hook integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use dnsexit_hooks::dns::{DnsQueryError, TxtResolver};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;

/// TXT resolver that replays scripted answers, then repeats the last one.
#[derive(Debug)]
pub struct FakeDns {
    answers: Mutex<VecDeque<Vec<String>>>,
    last: Mutex<Vec<String>>,
    queries: Mutex<Vec<String>>,
}

impl FakeDns {
    /// Answers empty `misses` times, then serves `value`.
    pub fn visible_after(misses: usize, value: &str) -> Arc<Self> {
        let mut answers: VecDeque<Vec<String>> = (0..misses).map(|_| Vec::new()).collect();
        answers.push_back(vec![value.to_string()]);
        Arc::new(Self {
            answers: Mutex::new(answers),
            last: Mutex::new(vec![value.to_string()]),
            queries: Mutex::new(Vec::new()),
        })
    }

    /// Never serves anything.
    pub fn never() -> Arc<Self> {
        Arc::new(Self {
            answers: Mutex::new(VecDeque::new()),
            last: Mutex::new(Vec::new()),
            queries: Mutex::new(Vec::new()),
        })
    }

    pub fn queries(&self) -> Vec<String> {
        self.queries.lock().clone()
    }
}

#[async_trait]
impl TxtResolver for FakeDns {
    async fn lookup_txt(&self, name: &str) -> Result<Vec<String>, DnsQueryError> {
        self.queries.lock().push(name.to_string());
        match self.answers.lock().pop_front() {
            Some(answer) => Ok(answer),
            None => Ok(self.last.lock().clone()),
        }
    }
}

/// Environment for a hook run against a mock API.
pub fn hook_env(api_url: &str, secrets_dir: &str, extra: &[(&str, &str)]) -> Vec<(String, String)> {
    let mut pairs = vec![
        ("DNSEXIT_API_URL".to_string(), api_url.to_string()),
        ("CONFIG_SECRETS_DIR".to_string(), secrets_dir.to_string()),
        ("DNS_PROPAGATION_ADDRESS".to_string(), "192.0.2.53".to_string()),
    ];
    pairs.extend(extra.iter().map(|(k, v)| (k.to_string(), v.to_string())));
    pairs
}
