//! In-memory [`KvBackend`] fake (§10.4), used by `taskrelay-completion` and
//! `taskrelay-client` integration tests.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Mutex;

use rand::seq::IteratorRandom;

use crate::backend::KvBackend;
use crate::error::Result;

#[derive(Default)]
struct State {
    lists: HashMap<String, VecDeque<String>>,
    sets: HashMap<String, HashSet<String>>,
}

pub struct FakeKv {
    state: Mutex<State>,
}

impl FakeKv {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(State::default()),
        }
    }

    pub fn list_head(&self, key: &str) -> Option<String> {
        self.state.lock().unwrap().lists.get(key).and_then(|l| l.front().cloned())
    }

    pub fn set_contains(&self, key: &str, member: &str) -> bool {
        self.state
            .lock()
            .unwrap()
            .sets
            .get(key)
            .is_some_and(|s| s.contains(member))
    }
}

impl Default for FakeKv {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl KvBackend for FakeKv {
    async fn l_push(&self, key: &str, value: &str) -> Result<()> {
        self.state
            .lock()
            .unwrap()
            .lists
            .entry(key.to_string())
            .or_default()
            .push_front(value.to_string());
        Ok(())
    }

    async fn s_add(&self, key: &str, member: &str) -> Result<()> {
        self.state
            .lock()
            .unwrap()
            .sets
            .entry(key.to_string())
            .or_default()
            .insert(member.to_string());
        Ok(())
    }

    async fn s_rem(&self, key: &str, member: &str) -> Result<()> {
        if let Some(set) = self.state.lock().unwrap().sets.get_mut(key) {
            set.remove(member);
        }
        Ok(())
    }

    async fn s_card(&self, key: &str) -> Result<u64> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .sets
            .get(key)
            .map(|s| s.len() as u64)
            .unwrap_or(0))
    }

    async fn s_members(&self, key: &str) -> Result<Vec<String>> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .sets
            .get(key)
            .map(|s| s.iter().cloned().collect())
            .unwrap_or_default())
    }

    async fn s_rand_member(&self, key: &str) -> Result<Option<String>> {
        let state = self.state.lock().unwrap();
        let mut rng = rand::thread_rng();
        Ok(state
            .sets
            .get(key)
            .and_then(|s| s.iter().choose(&mut rng))
            .cloned())
    }

    async fn del(&self, key: &str) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.lists.remove(key);
        state.sets.remove(key);
        Ok(())
    }

    async fn multi_s_rand_member(&self, keys: &[String]) -> Result<Vec<Option<String>>> {
        let mut out = Vec::with_capacity(keys.len());
        for key in keys {
            out.push(self.s_rand_member(key).await?);
        }
        Ok(out)
    }

    async fn close(&self) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn list_push_is_head_insert() {
        let kv = FakeKv::new();
        kv.l_push("k", "a").await.unwrap();
        kv.l_push("k", "b").await.unwrap();
        assert_eq!(kv.list_head("k"), Some("b".to_string()));
    }

    #[tokio::test]
    async fn set_add_remove_and_card() {
        let kv = FakeKv::new();
        kv.s_add("s", "x").await.unwrap();
        kv.s_add("s", "y").await.unwrap();
        assert_eq!(kv.s_card("s").await.unwrap(), 2);
        kv.s_rem("s", "x").await.unwrap();
        assert_eq!(kv.s_card("s").await.unwrap(), 1);
        assert!(!kv.set_contains("s", "x"));
    }

    #[tokio::test]
    async fn multi_s_rand_member_is_positional() {
        let kv = FakeKv::new();
        kv.s_add("t1", "0").await.unwrap();
        let results = kv
            .multi_s_rand_member(&["t1".to_string(), "t2".to_string()])
            .await
            .unwrap();
        assert_eq!(results, vec![Some("0".to_string()), None]);
    }
}
