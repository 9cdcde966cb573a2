//! In-memory remote store
//!
//! Keeps one file tree per user with files in insertion order. Faults can be
//! injected per user to exercise failure paths without a server.

use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use super::{RemoteStore, StoreConnector};

/// Injected failure for a user's session
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Fault {
    /// Refuse to open a session
    FailConnect,
    /// Listing the directory fails
    FailList(String),
    /// Reading the path fails
    FailRead(String),
    /// Writing the path fails
    FailWrite(String),
    /// Writing the path succeeds but stores altered bytes
    CorruptWrite(String),
    /// Deleting the path fails
    FailDelete(String),
}

#[derive(Debug, Default)]
struct UserTree {
    files: Vec<(String, Vec<u8>)>,
    faults: Vec<Fault>,
}

impl UserTree {
    fn has(&self, fault: &Fault) -> bool {
        self.faults.contains(fault)
    }

    fn position(&self, path: &str) -> Option<usize> {
        self.files.iter().position(|(p, _)| p == path)
    }
}

#[derive(Debug, Default)]
struct Inner {
    users: Mutex<HashMap<String, UserTree>>,
    open: AtomicUsize,
    connects: AtomicUsize,
}

impl Inner {
    fn users(&self) -> MutexGuard<'_, HashMap<String, UserTree>> {
        self.users.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Connector handing out sessions on a shared in-memory tree
#[derive(Debug, Clone, Default)]
pub struct MemoryConnector {
    inner: Arc<Inner>,
}

impl MemoryConnector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Place a file in a user's tree, replacing any existing contents
    pub fn put(&self, user: &str, path: &str, data: impl Into<Vec<u8>>) {
        let mut users = self.inner.users();
        let tree = users.entry(user.to_string()).or_default();
        store_file(tree, path, data.into());
    }

    pub fn get(&self, user: &str, path: &str) -> Option<Vec<u8>> {
        let users = self.inner.users();
        let tree = users.get(user)?;
        tree.position(path).map(|i| tree.files[i].1.clone())
    }

    pub fn exists(&self, user: &str, path: &str) -> bool {
        self.get(user, path).is_some()
    }

    /// File names directly inside `dir`
    pub fn names(&self, user: &str, dir: &str) -> Vec<String> {
        let users = self.inner.users();
        users
            .get(user)
            .map(|tree| names_in(tree, dir))
            .unwrap_or_default()
    }

    pub fn inject(&self, user: &str, fault: Fault) {
        let mut users = self.inner.users();
        users.entry(user.to_string()).or_default().faults.push(fault);
    }

    /// Remove every injected fault for a user
    pub fn clear_faults(&self, user: &str) {
        if let Some(tree) = self.inner.users().get_mut(user) {
            tree.faults.clear();
        }
    }

    /// Sessions opened and not yet closed or dropped
    pub fn open_sessions(&self) -> usize {
        self.inner.open.load(Ordering::SeqCst)
    }

    /// Sessions opened since creation
    pub fn total_connects(&self) -> usize {
        self.inner.connects.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl StoreConnector for MemoryConnector {
    async fn connect(&self, username: &str) -> Result<Box<dyn RemoteStore>> {
        {
            let mut users = self.inner.users();
            let tree = users.entry(username.to_string()).or_default();
            if tree.has(&Fault::FailConnect) {
                bail!("connection refused for {}", username);
            }
        }

        self.inner.connects.fetch_add(1, Ordering::SeqCst);
        self.inner.open.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(MemoryStore {
            inner: Arc::clone(&self.inner),
            user: username.to_string(),
            open: true,
        }))
    }
}

/// Session on a user's in-memory tree
#[derive(Debug)]
pub struct MemoryStore {
    inner: Arc<Inner>,
    user: String,
    open: bool,
}

impl MemoryStore {
    fn with_tree<T>(&self, op: impl FnOnce(&mut UserTree) -> Result<T>) -> Result<T> {
        if !self.open {
            bail!("session is closed");
        }
        let mut users = self.inner.users();
        let tree = users.entry(self.user.clone()).or_default();
        op(tree)
    }

    fn release(&mut self) {
        if self.open {
            self.open = false;
            self.inner.open.fetch_sub(1, Ordering::SeqCst);
        }
    }
}

#[async_trait]
impl RemoteStore for MemoryStore {
    async fn list(&mut self, dir: &str) -> Result<Vec<String>> {
        self.with_tree(|tree| {
            if tree.has(&Fault::FailList(dir.to_string())) {
                bail!("failed to list {}", dir);
            }
            Ok(names_in(tree, dir))
        })
    }

    async fn read(&mut self, path: &str) -> Result<Vec<u8>> {
        self.with_tree(|tree| {
            if tree.has(&Fault::FailRead(path.to_string())) {
                bail!("failed to read {}", path);
            }
            tree.position(path)
                .map(|i| tree.files[i].1.clone())
                .ok_or_else(|| anyhow!("no such file: {}", path))
        })
    }

    async fn write(&mut self, path: &str, data: &[u8]) -> Result<()> {
        self.with_tree(|tree| {
            if tree.has(&Fault::FailWrite(path.to_string())) {
                bail!("failed to write {}", path);
            }
            let mut data = data.to_vec();
            if tree.has(&Fault::CorruptWrite(path.to_string())) {
                data.push(b'\0');
            }
            store_file(tree, path, data);
            Ok(())
        })
    }

    async fn delete(&mut self, path: &str) -> Result<()> {
        self.with_tree(|tree| {
            if tree.has(&Fault::FailDelete(path.to_string())) {
                bail!("failed to delete {}", path);
            }
            let i = tree
                .position(path)
                .ok_or_else(|| anyhow!("no such file: {}", path))?;
            tree.files.remove(i);
            Ok(())
        })
    }

    async fn close(mut self: Box<Self>) -> Result<()> {
        self.release();
        Ok(())
    }
}

impl Drop for MemoryStore {
    fn drop(&mut self) {
        self.release();
    }
}

fn store_file(tree: &mut UserTree, path: &str, data: Vec<u8>) {
    match tree.position(path) {
        Some(i) => tree.files[i].1 = data,
        None => tree.files.push((path.to_string(), data)),
    }
}

fn names_in(tree: &UserTree, dir: &str) -> Vec<String> {
    let prefix = format!("{}/", dir.trim_end_matches('/'));
    tree.files
        .iter()
        .filter_map(|(path, _)| path.strip_prefix(&prefix))
        .filter(|rest| !rest.is_empty() && !rest.contains('/'))
        .map(str::to_string)
        .collect()
}
