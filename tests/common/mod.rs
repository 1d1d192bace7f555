// tests/common/mod.rs

//! Shared test utilities and helpers for integration tests.

#![allow(dead_code)]

use plugpack::registry::RegistryFile;
use plugpack::transaction::HostIntegration;
use plugpack::{Config, Layout, MemoryTransport, Registry, RegistryEntry, Remote, Transaction};
use serde_json::{Value, json};
use std::cell::RefCell;
use std::fs;
use std::path::PathBuf;
use std::rc::Rc;
use std::sync::Arc;
use tempfile::TempDir;

/// Install root in a temporary directory
///
/// Keep the value alive for the duration of the test to prevent cleanup.
pub struct TestRoot {
    _dir: TempDir,
    pub layout: Layout,
}

impl TestRoot {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let layout = Layout::new(dir.path());
        Self { _dir: dir, layout }
    }

    /// Absolute path of an install-relative path
    pub fn path(&self, relative: &str) -> PathBuf {
        self.layout.root().join(relative)
    }

    pub fn read(&self, relative: &str) -> String {
        fs::read_to_string(self.path(relative)).unwrap()
    }

    /// Open a transaction on this root
    pub fn transaction(&self, config: &Config, transport: &MemoryTransport) -> Transaction {
        Transaction::new(
            self.layout.clone(),
            config.clone(),
            Arc::new(transport.clone()),
        )
        .unwrap()
    }

    /// Run one synchronization of every enabled remote
    pub fn sync(&self, config: &Config, transport: &MemoryTransport) -> plugpack::TransactionOutcome {
        let mut tx = self.transaction(config, transport);
        tx.synchronize_all(&config.remotes);
        tx.run()
    }

    /// Committed registry content
    pub fn entries(&self, remote: &str) -> Vec<RegistryEntry> {
        Registry::open(&self.layout.registry_path())
            .unwrap()
            .get_entries(remote)
            .unwrap()
    }

    /// Paths of every `.part` file left in the root
    pub fn partial_files(&self) -> Vec<PathBuf> {
        let mut found = Vec::new();
        let mut pending = vec![self.layout.root().to_path_buf()];
        while let Some(dir) = pending.pop() {
            for entry in fs::read_dir(&dir).unwrap() {
                let path = entry.unwrap().path();
                if path.is_dir() {
                    pending.push(path);
                } else if path.extension().is_some_and(|ext| ext == "part") {
                    found.push(path);
                }
            }
        }
        found
    }
}

/// Config with the given remotes and default options
pub fn config_with(remotes: &[(&str, &str)]) -> Config {
    let mut config = Config::default();
    for (name, url) in remotes {
        config.remotes.add(Remote::new(name, url).unwrap());
    }
    config
}

/// Source entry; an empty `file` makes it the main file of the package
pub fn source(file: &str, url: &str) -> Value {
    if file.is_empty() {
        json!({ "main": "main", "url": url })
    } else {
        json!({ "file": file, "url": url })
    }
}

pub fn version(name: &str, sources: Vec<Value>) -> Value {
    json!({
        "name": name,
        "author": "tester",
        "time": "2016-02-12T01:16:40Z",
        "sources": sources,
    })
}

pub fn package(name: &str, kind: &str, versions: Vec<Value>) -> Value {
    json!({ "name": name, "type": kind, "desc": "", "versions": versions })
}

/// Index document text from `(category, packages)` pairs
pub fn index(categories: Vec<(&str, Vec<Value>)>) -> String {
    let categories: Vec<Value> = categories
        .into_iter()
        .map(|(name, packages)| json!({ "name": name, "packages": packages }))
        .collect();
    json!({ "version": 1, "categories": categories }).to_string()
}

/// Index with one script package `hello.lua` at `version` in `Category`
pub fn hello_index(base: &str, version_name: &str) -> String {
    let url = format!("{base}/{version_name}/hello.lua");
    index(vec![(
        "Category",
        vec![package(
            "hello.lua",
            "script",
            vec![version(version_name, vec![source("", &url)])],
        )],
    )])
}

/// Serve `hello_index` and the matching file from `base`
pub fn serve_hello(transport: &mut MemoryTransport, base: &str, version_name: &str) {
    transport.serve(
        &format!("{base}/index.json"),
        hello_index(base, version_name),
    );
    transport.serve(
        &format!("{base}/{version_name}/hello.lua"),
        format!("-- hello {version_name}\n"),
    );
}

/// Host that records every registration call
#[derive(Clone, Default)]
pub struct RecordingHost {
    pub calls: Rc<RefCell<Vec<(String, bool)>>>,
}

impl HostIntegration for RecordingHost {
    fn register(&mut self, file: &RegistryFile, enable: bool) -> plugpack::Result<()> {
        self.calls.borrow_mut().push((file.path.to_string(), enable));
        Ok(())
    }
}
