// src/transaction/mod.rs

//! Synchronization transactions
//!
//! A [`Transaction`] collects work (remotes to synchronize, remotes to
//! uninstall, remotes to enable or disable in the host) and then runs it as
//! one pipeline on the caller's thread:
//!
//! ```text
//! Idle -> FetchingIndexes -> Resolving -> Downloading -> Applying -> Finished
//!                                                                \-> Cancelled
//! ```
//!
//! - **Fetching**: one index download per remote; failures fall back to the
//!   cached copy
//! - **Resolving**: each package is diffed against its registry entry
//! - **Downloading**: files go to private staging paths under the data
//!   directory, never to the live path
//! - **Applying**: each package is placed and recorded under its own
//!   registry savepoint, then the registry commits once. Cancellation is
//!   honored up to the first placed file; once placement starts the
//!   transaction runs to its commit.
//!
//! Only one transaction can exist per install root; its [`RootLock`] is
//! held until the transaction is dropped.

mod diff;
mod host;
mod receipt;
mod task;

pub use diff::{DiffOptions, Plan, decide, obsolete_entries};
pub use host::{HostIntegration, NoopHost};
pub use receipt::{ErrorInfo, InstallTicket, Receipt, TicketKind};

use crate::config::Config;
use crate::download::{FetchTask, TaskId, TaskState, Transport};
use crate::error::{Error, Result};
use crate::filesystem::{InstallPath, move_file_atomic, remove_file_if_exists};
use crate::index::{BuildTarget, Index, IndexCache};
use crate::layout::Layout;
use crate::lock::RootLock;
use crate::progress::ProgressTracker;
use crate::registry::{Registry, RegistryEntry};
use crate::remote::{Remote, RemoteList};
use crate::scheduler::Scheduler;
use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use task::{InstallTask, LoadedIndex};
use tracing::{debug, info, info_span, warn};
use uuid::Uuid;

/// Pipeline stage of a transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionState {
    Idle,
    FetchingIndexes,
    Resolving,
    Downloading,
    Applying,
    Finished,
    Cancelled,
}

/// Result handed to `on_finish` hooks and returned by [`Transaction::run`]
#[derive(Debug, Clone)]
pub struct TransactionOutcome {
    pub id: Uuid,
    pub receipt: Receipt,
    pub cancelled: bool,
}

/// Decides which obsolete entries to remove
///
/// The handler may drop entries from the list to keep them. Returning
/// `false` cancels the whole transaction.
pub type ObsoleteHandler = Box<dyn FnMut(&mut Vec<RegistryEntry>) -> bool>;

type FinishHook = Box<dyn FnOnce(&TransactionOutcome)>;

pub struct Transaction {
    id: Uuid,
    layout: Layout,
    config: Config,
    registry: Registry,
    scheduler: Scheduler,
    cache: IndexCache,
    target: BuildTarget,
    cancel: Arc<AtomicBool>,
    state: TransactionState,
    receipt: Receipt,
    sync_queue: Vec<Remote>,
    /// Remote list of a `synchronize_all` call, for orphan detection
    configured: Option<RemoteList>,
    register_queue: Vec<(String, bool)>,
    uninstall_queue: Vec<String>,
    obsolete_handler: Option<ObsoleteHandler>,
    finish_hooks: Vec<FinishHook>,
    progress: Option<Arc<dyn ProgressTracker>>,
    host: Box<dyn HostIntegration>,
    /// Temporary files created by this run
    staged: Vec<PathBuf>,
    _lock: RootLock,
}

impl Transaction {
    /// Lock the install root and open its registry
    pub fn new(layout: Layout, config: Config, transport: Arc<dyn Transport>) -> Result<Self> {
        let lock = RootLock::try_acquire(&layout)?;
        let registry = Registry::open(&layout.registry_path())?;
        let cancel = Arc::new(AtomicBool::new(false));
        let scheduler =
            Scheduler::with_abort(config.network.workers, transport, Arc::clone(&cancel))?;
        let id = Uuid::new_v4();

        debug!("Transaction {} opened on {}", id, layout.root().display());

        Ok(Self {
            id,
            cache: layout.index_cache(),
            layout,
            config,
            registry,
            scheduler,
            target: BuildTarget::current(),
            cancel,
            state: TransactionState::Idle,
            receipt: Receipt::new(),
            sync_queue: Vec::new(),
            configured: None,
            register_queue: Vec::new(),
            uninstall_queue: Vec::new(),
            obsolete_handler: None,
            finish_hooks: Vec::new(),
            progress: None,
            host: Box::new(NoopHost),
            staged: Vec::new(),
            _lock: lock,
        })
    }

    /// Use `host` for action registration
    pub fn with_host(mut self, host: Box<dyn HostIntegration>) -> Self {
        self.host = host;
        self
    }

    /// Resolve sources for `target` instead of the running host
    pub fn with_target(mut self, target: BuildTarget) -> Self {
        self.target = target;
        self
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn state(&self) -> TransactionState {
        self.state
    }

    /// Errors and warnings recorded so far
    pub fn receipt(&self) -> &Receipt {
        &self.receipt
    }

    pub fn set_progress(&mut self, progress: Arc<dyn ProgressTracker>) {
        self.scheduler.set_progress(Arc::clone(&progress));
        self.progress = Some(progress);
    }

    /// Queue `remote` for synchronization
    pub fn synchronize(&mut self, remote: &Remote) {
        if !self.sync_queue.iter().any(|r| r.name == remote.name) {
            self.sync_queue.push(remote.clone());
        }
    }

    /// Queue every enabled remote of `remotes`
    ///
    /// Installed packages of remotes that are disabled or missing from
    /// `remotes` become obsolete candidates.
    pub fn synchronize_all(&mut self, remotes: &RemoteList) {
        for remote in remotes.enabled() {
            self.synchronize(remote);
        }
        self.configured = Some(remotes.clone());
    }

    /// Queue host (un)registration of every installed file of `remote`
    pub fn register_all(&mut self, remote: &str, enable: bool) {
        self.register_queue.push((remote.to_string(), enable));
    }

    /// Queue removal of every package installed from `remote`
    pub fn uninstall(&mut self, remote: &str) {
        if !self.uninstall_queue.iter().any(|r| r == remote) {
            self.uninstall_queue.push(remote.to_string());
        }
    }

    pub fn set_obsolete_handler<F>(&mut self, handler: F)
    where
        F: FnMut(&mut Vec<RegistryEntry>) -> bool + 'static,
    {
        self.obsolete_handler = Some(Box::new(handler));
    }

    /// Run `hook` once when the transaction ends, cancelled or not
    pub fn on_finish<F>(&mut self, hook: F)
    where
        F: FnOnce(&TransactionOutcome) + 'static,
    {
        self.finish_hooks.push(Box::new(hook));
    }

    /// Flag shared with other threads to cancel this transaction
    pub fn cancel_token(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.cancel)
    }

    pub fn cancel(&self) {
        self.cancel.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.load(Ordering::Relaxed)
    }

    /// Execute every queued operation
    pub fn run(mut self) -> TransactionOutcome {
        let span = info_span!("transaction", id = %self.id);
        let _enter = span.enter();

        let cancelled = match self.execute() {
            Ok(()) => false,
            Err(e) if e.is_cancelled() || self.is_cancelled() => true,
            Err(e) => {
                warn!("Transaction failed: {}", e);
                self.receipt.add_error("Transaction", e.to_string());
                false
            }
        };

        self.state = if cancelled {
            info!("Transaction cancelled");
            TransactionState::Cancelled
        } else {
            TransactionState::Finished
        };
        self.cleanup();

        let outcome = TransactionOutcome {
            id: self.id,
            receipt: std::mem::take(&mut self.receipt),
            cancelled,
        };

        if let Some(progress) = &self.progress {
            progress.finish_with_message(if cancelled { "Cancelled" } else { "Done" });
        }
        for hook in std::mem::take(&mut self.finish_hooks) {
            hook(&outcome);
        }
        outcome
    }

    fn execute(&mut self) -> Result<()> {
        let uninstalling: HashSet<String> = self.uninstall_queue.iter().cloned().collect();
        self.sync_queue.retain(|r| !uninstalling.contains(&r.name));

        self.enter(TransactionState::FetchingIndexes)?;
        let loaded = self.fetch_indexes()?;

        self.enter(TransactionState::Resolving)?;
        let mut installs = self.resolve(&loaded)?;

        self.enter(TransactionState::Downloading)?;
        self.download(&mut installs)?;

        self.enter(TransactionState::Applying)?;
        self.apply(&loaded, installs)?;
        self.registry.commit()?;
        info!(
            "Transaction committed: {} installed, {} updated, {} files removed",
            self.receipt.installs().count(),
            self.receipt.updates().count(),
            self.receipt.removals().len()
        );
        Ok(())
    }

    fn enter(&mut self, state: TransactionState) -> Result<()> {
        self.check_cancelled()?;
        debug!("Entering {:?}", state);
        self.state = state;
        Ok(())
    }

    fn check_cancelled(&self) -> Result<()> {
        if self.is_cancelled() {
            return Err(Error::Cancelled("transaction".to_string()));
        }
        Ok(())
    }

    fn phase(&self, message: &str, length: usize) {
        if let Some(progress) = &self.progress {
            progress.start_phase(message, length as u64);
        }
    }

    /// Fetch the index of every queued remote, falling back to the cache
    fn fetch_indexes(&mut self) -> Result<Vec<LoadedIndex>> {
        let remotes = std::mem::take(&mut self.sync_queue);
        let threshold = self.config.network.stale_threshold();
        let mut pending: HashMap<TaskId, usize> = HashMap::new();

        self.phase("Fetching indexes", remotes.len());
        for (i, remote) in remotes.iter().enumerate() {
            if self.cache.is_fresh(&remote.name, threshold) {
                debug!("Index of {} is fresh, not fetching", remote.name);
                continue;
            }
            let id = self
                .scheduler
                .push(FetchTask::memory(&remote.name, &remote.url));
            pending.insert(id, i);
        }

        let tasks = if self.scheduler.idle() {
            Vec::new()
        } else {
            self.scheduler.wait()
        };

        let mut fetched: HashMap<usize, FetchTask> = HashMap::new();
        for task in tasks {
            if task.state() == TaskState::Cancelled {
                return Err(Error::Cancelled(format!("fetching {}", task.name())));
            }
            if let Some(i) = task.id().and_then(|id| pending.get(&id)) {
                fetched.insert(*i, task);
            }
        }

        let mut loaded = Vec::new();
        for (i, remote) in remotes.into_iter().enumerate() {
            let index = match fetched.remove(&i) {
                None => self.load_cached(&remote, None),
                Some(task) => match self.parse_fetched(&remote, &task) {
                    Ok(index) => Some(index),
                    Err(e) => self.load_cached(&remote, Some(e.to_string())),
                },
            };

            if let Some(index) = index {
                for warning in index.warnings() {
                    self.receipt.add_warning(format!("{}: {}", remote.name, warning));
                }
                loaded.push(LoadedIndex { remote, index });
            }
        }

        Ok(loaded)
    }

    fn parse_fetched(&self, remote: &Remote, task: &FetchTask) -> Result<Index> {
        let content = match (task.state(), task.content()) {
            (TaskState::Success, Some(content)) => content,
            _ => {
                return Err(Error::Download(
                    task.error().unwrap_or("download failed").to_string(),
                ));
            }
        };

        let text = std::str::from_utf8(content)
            .map_err(|e| Error::IndexParse(format!("not UTF-8: {e}")))?;
        let index = Index::from_json_for(&remote.name, text, self.target)?;

        if let Err(e) = self.cache.store(&remote.name, content) {
            warn!("Could not cache index of {}: {}", remote.name, e);
        }
        Ok(index)
    }

    /// Cached index of `remote`; `failure` is why the fetch did not do
    fn load_cached(&mut self, remote: &Remote, failure: Option<String>) -> Option<Index> {
        let cached = if self.cache.exists(&remote.name) {
            Some(self.cache.load(&remote.name, self.target))
        } else {
            None
        };

        match (cached, failure) {
            (Some(Ok(index)), None) => Some(index),
            (Some(Ok(index)), Some(failure)) => {
                warn!("{}: {}; using cached index", remote.name, failure);
                self.receipt
                    .add_warning(format!("{}: {}; using cached index", remote.name, failure));
                Some(index)
            }
            (Some(Err(e)), failure) => {
                let message = match failure {
                    Some(failure) => format!("{failure}; cached index unusable: {e}"),
                    None => format!("cached index unusable: {e}"),
                };
                self.receipt.add_error(&remote.name, message);
                None
            }
            (None, failure) => {
                let message = failure.unwrap_or_else(|| "no cached index".to_string());
                warn!("{}: {}", remote.name, message);
                self.receipt.add_error(&remote.name, message);
                None
            }
        }
    }

    /// Pick the version of every package to install or update
    fn resolve(&mut self, loaded: &[LoadedIndex]) -> Result<Vec<InstallTask>> {
        let mut installs = Vec::new();
        let mut claimed: HashMap<InstallPath, String> = HashMap::new();

        for LoadedIndex { remote, index } in loaded {
            let options = DiffOptions {
                auto_install: remote.auto_install(self.config.install.auto_install),
                bleeding_edge: self.config.install.bleeding_edge,
            };

            for package in index.packages() {
                let category = package.category_name().unwrap_or_default();
                let entry = self
                    .registry
                    .get_entry(&remote.name, category, package.name())?;
                let old_files = match &entry {
                    Some(entry) => self.registry.get_files(entry)?,
                    None => Vec::new(),
                };
                let files_present = old_files
                    .iter()
                    .all(|file| self.layout.resolve(&file.path).exists());

                let plan = decide(package, entry.as_ref(), files_present, options);
                let Some(version) = plan.version() else {
                    continue;
                };

                let task = InstallTask::new(
                    plan,
                    package.description(),
                    entry.as_ref(),
                    old_files,
                    &self.layout,
                )
                .and_then(|task| match task {
                    Some(task) => self.claim(task, &mut claimed).map(Some),
                    None => Ok(None),
                });

                match task {
                    Ok(Some(task)) => installs.push(task),
                    Ok(None) => {}
                    Err(e) => {
                        warn!("Skipping {}: {}", version.full_name(), e);
                        self.receipt.add_error(version.full_name(), e.to_string());
                    }
                }
            }
        }

        debug!("{} packages to install or update", installs.len());
        Ok(installs)
    }

    /// Reserve the paths of `task` against the registry and the batch
    fn claim(
        &self,
        task: InstallTask,
        claimed: &mut HashMap<InstallPath, String>,
    ) -> Result<InstallTask> {
        if let Some((path, owner)) = self.registry.conflicts(&task.version)?.into_iter().next() {
            return Err(Error::Conflict {
                path: path.to_string(),
                owner: owner.to_string(),
            });
        }

        for path in task.paths() {
            if let Some(owner) = claimed.get(path) {
                return Err(Error::Conflict {
                    path: path.to_string(),
                    owner: owner.clone(),
                });
            }
        }

        let name = task.version.full_name();
        for path in task.paths() {
            claimed.insert(path.clone(), name.clone());
        }
        Ok(task)
    }

    /// Download every file of every install to its temporary path
    fn download(&mut self, installs: &mut [InstallTask]) -> Result<()> {
        let mut owners: HashMap<TaskId, usize> = HashMap::new();

        let count = installs.iter().map(|task| task.files.len()).sum();
        self.phase("Downloading", count);

        for (i, task) in installs.iter().enumerate() {
            for file in &task.files {
                self.staged.push(file.temp.clone());
                let id = self.scheduler.push(FetchTask::file(
                    &file.path.to_string(),
                    &file.url,
                    &file.temp,
                ));
                owners.insert(id, i);
            }
        }

        if self.scheduler.idle() {
            return Ok(());
        }

        let mut cancelled = false;
        for fetch in self.scheduler.wait() {
            let Some(&i) = fetch.id().and_then(|id| owners.get(&id)) else {
                continue;
            };

            match fetch.state() {
                TaskState::Success => {}
                TaskState::Cancelled => cancelled = true,
                _ => {
                    let task = &mut installs[i];
                    if !task.failed {
                        task.failed = true;
                        self.receipt.add_error(
                            task.version.full_name(),
                            fetch.error().unwrap_or("download failed").to_string(),
                        );
                    }
                }
            }
        }

        if cancelled {
            return Err(Error::Cancelled("downloads".to_string()));
        }
        Ok(())
    }

    /// Place downloaded packages, then process removals
    fn apply(&mut self, loaded: &[LoadedIndex], installs: Vec<InstallTask>) -> Result<()> {
        let mut obsolete = self.collect_obsolete(loaded)?;
        if !obsolete.is_empty() {
            match self.obsolete_handler.as_mut() {
                Some(handler) => {
                    if !handler(&mut obsolete) {
                        self.cancel();
                        return Err(Error::Cancelled("obsolete packages declined".to_string()));
                    }
                }
                None => {
                    info!("{} obsolete packages kept", obsolete.len());
                    obsolete.clear();
                }
            }
        }

        let installs: Vec<InstallTask> = installs.into_iter().filter(|t| !t.failed).collect();

        // Last cancellation point: once placement starts, apply runs through
        // the commit.
        self.check_cancelled()?;
        self.phase("Applying", installs.len() + obsolete.len());

        for task in installs {
            self.install(task);
            self.step();
        }

        for entry in &obsolete {
            if let Err(e) = self.remove_entry(entry) {
                self.receipt.add_error(entry.to_string(), e.to_string());
            }
            self.step();
        }

        for remote in std::mem::take(&mut self.uninstall_queue) {
            self.uninstall_remote(&remote)?;
        }

        for (remote, enable) in std::mem::take(&mut self.register_queue) {
            self.register_remote(&remote, enable)?;
        }

        Ok(())
    }

    fn step(&self) {
        if let Some(progress) = &self.progress {
            progress.increment(1);
        }
    }

    /// Entries to offer for removal
    fn collect_obsolete(&self, loaded: &[LoadedIndex]) -> Result<Vec<RegistryEntry>> {
        if !self.config.install.prompt_obsolete {
            return Ok(Vec::new());
        }

        let mut obsolete = Vec::new();
        for LoadedIndex { remote, index } in loaded {
            let entries = self.registry.get_entries(&remote.name)?;
            obsolete.extend(obsolete_entries(index, &entries));
        }

        if let Some(configured) = &self.configured {
            for name in self.registry.remotes()? {
                let active = configured.get(&name).is_some_and(|r| r.enabled);
                if active || self.uninstall_queue.contains(&name) {
                    continue;
                }
                obsolete.extend(
                    self.registry
                        .get_entries(&name)?
                        .into_iter()
                        .filter(|entry| !entry.pinned),
                );
            }
        }

        obsolete.sort_by_key(|entry| entry.id);
        obsolete.dedup_by_key(|entry| entry.id);
        Ok(obsolete)
    }

    /// Place one package under its own savepoint
    fn install(&mut self, task: InstallTask) {
        let name = task.version.full_name();

        if let Err(e) = self.registry.savepoint() {
            self.receipt.add_error(name, e.to_string());
            return;
        }

        match self.place(&task) {
            Ok(removed) => {
                if let Err(e) = self.registry.release() {
                    self.receipt.add_error(name, e.to_string());
                    return;
                }
                info!("Installed {}", name);
                for path in removed {
                    self.receipt.add_removal(path);
                }
                self.receipt.add_ticket(task.ticket());
            }
            Err(e) => {
                warn!("Failed to install {}: {}", name, e);
                if let Err(restore) = self.registry.restore() {
                    warn!("Could not roll back registry for {}: {}", name, restore);
                }
                for file in &task.files {
                    if let Err(e) = remove_file_if_exists(&file.temp) {
                        debug!("Could not remove {}: {}", file.temp.display(), e);
                    }
                }
                self.receipt.add_error(name, e.to_string());
            }
        }
    }

    /// Record, move into place and register; returns removed stale paths
    fn place(&mut self, task: &InstallTask) -> Result<Vec<InstallPath>> {
        let entry = self.registry.push(&task.version, &task.description)?;

        for file in &task.files {
            let target = self.layout.resolve(&file.path);
            if let Some(parent) = target.parent() {
                fs::create_dir_all(parent)?;
            }
            move_file_atomic(&file.temp, &target)?;
        }

        let mut removed = Vec::new();
        for stale in task.stale_files() {
            if !stale.sections.is_empty()
                && let Err(e) = self.host.register(stale, false)
            {
                warn!("Could not unregister {}: {}", stale.path, e);
            }
            remove_file_if_exists(&self.layout.resolve(&stale.path))?;
            removed.push(stale.path.clone());
        }

        for file in self.registry.get_main_files(&entry)? {
            if let Err(e) = self.host.register(&file, true) {
                self.receipt
                    .add_warning(format!("{}: could not register: {}", file.path, e));
            }
        }

        Ok(removed)
    }

    /// Delete the files of `entry` and forget it once all are gone
    fn remove_entry(&mut self, entry: &RegistryEntry) -> Result<bool> {
        let mut complete = true;

        for file in self.registry.get_files(entry)? {
            if !file.sections.is_empty()
                && let Err(e) = self.host.register(&file, false)
            {
                warn!("Could not unregister {}: {}", file.path, e);
            }

            match remove_file_if_exists(&self.layout.resolve(&file.path)) {
                Ok(()) => self.receipt.add_removal(file.path),
                Err(e) => {
                    complete = false;
                    self.receipt
                        .add_error(entry.to_string(), format!("{}: {}", file.path, e));
                }
            }
        }

        if complete {
            self.registry.forget(entry)?;
            info!("Removed {}", entry);
        }
        Ok(complete)
    }

    fn uninstall_remote(&mut self, remote: &str) -> Result<()> {
        let mut complete = true;
        for entry in self.registry.get_entries(remote)? {
            match self.remove_entry(&entry) {
                Ok(removed) => complete &= removed,
                Err(e) => {
                    complete = false;
                    self.receipt.add_error(entry.to_string(), e.to_string());
                }
            }
        }

        if complete && let Err(e) = self.cache.remove(remote) {
            warn!("Could not remove cached index of {}: {}", remote, e);
        }
        Ok(())
    }

    fn register_remote(&mut self, remote: &str, enable: bool) -> Result<()> {
        for entry in self.registry.get_entries(remote)? {
            for file in self.registry.get_main_files(&entry)? {
                if let Err(e) = self.host.register(&file, enable) {
                    self.receipt.add_error(entry.to_string(), e.to_string());
                }
            }
        }
        Ok(())
    }

    /// Remove temporaries left by downloads that were not placed
    fn cleanup(&mut self) {
        for temp in std::mem::take(&mut self.staged) {
            if let Err(e) = remove_file_if_exists(&temp) {
                warn!("Could not remove {}: {}", temp.display(), e);
            }
        }
    }
}
