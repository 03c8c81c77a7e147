//! File-backed coordination store.
//!
//! Each namespace is a directory under the store root named by its
//! [`RepoId`]:
//!
//! ```text
//! <root>/<repo-id>/
//!   claims.json      claims keyed by path
//!   messages.jsonl   one event per line
//!   state.json       agent states plus `last_updated`
//!   repo.url         canonical URL, for humans
//!   .locks/          advisory lock files, one per table
//! ```
//!
//! Table mutations hold the table's exclusive lock for the whole
//! read-modify-write and publish the result with a rename, so lock-free
//! readers always see a complete document.

use std::{
    fs::{self, File, OpenOptions},
    io::{self, ErrorKind, Read, Seek, SeekFrom, Write},
    path::{Path, PathBuf},
    sync::Arc,
};

use serde::{de::DeserializeOwned, Serialize};
use tempfile::NamedTempFile;

use super::{
    claims::ClaimTable,
    events::Event,
    lock::TableLock,
    namespace::{CoordinationStore, Namespace, NamespaceStore, TableMutator},
    state::StateSnapshot,
};
use crate::{
    identifiers::{RepoId, RepoUrl},
    Config, Error, Result,
};

const CLAIMS_FILE: &str = "claims.json";
const MESSAGES_FILE: &str = "messages.jsonl";
const STATE_FILE: &str = "state.json";
const URL_FILE: &str = "repo.url";
const LOCK_DIR: &str = ".locks";

const CLAIMS_LOCK: &str = "claims.lock";
const STATE_LOCK: &str = "state.lock";
const EVENTS_LOCK: &str = "events.lock";

/// Coordination store rooted at a shared directory.
#[derive(Debug, Clone)]
pub struct FileStore {
    root: PathBuf,
}

impl FileStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(config.coordination_dir.clone())
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory holding the namespace for `id`.
    pub fn namespace_dir(&self, id: &RepoId) -> PathBuf {
        self.root.join(id.as_str())
    }
}

impl CoordinationStore for FileStore {
    fn open(&self, repo_url: &RepoUrl) -> Result<Namespace> {
        let id = repo_url.id();
        Ok(Namespace::new(Arc::new(FileNamespace {
            dir: self.namespace_dir(&id),
            id,
            url: repo_url.clone(),
        })))
    }
}

#[derive(Debug)]
struct FileNamespace {
    dir: PathBuf,
    id: RepoId,
    url: RepoUrl,
}

impl FileNamespace {
    fn file(&self, name: &str) -> PathBuf {
        self.dir.join(name)
    }

    fn lock(&self, name: &str) -> Result<TableLock> {
        self.ensure_dirs()?;
        TableLock::acquire(&self.dir.join(LOCK_DIR).join(name))
    }

    fn ensure_dirs(&self) -> Result<()> {
        fs::create_dir_all(self.dir.join(LOCK_DIR)).map_err(|e| {
            Error::storage(format!(
                "Failed to create coordination directory {}: {e}",
                self.dir.display()
            ))
        })
    }

    fn update_table<T>(
        &self,
        file: &str,
        lock: &str,
        mutate: &mut TableMutator<'_, T>,
    ) -> Result<()>
    where
        T: Serialize + DeserializeOwned + Default,
    {
        let _guard = self.lock(lock)?;
        let path = self.file(file);
        let mut table: T = read_table(&path)?;
        if mutate(&mut table)? {
            let mut content = serde_json::to_string_pretty(&table)?;
            content.push('\n');
            replace_file(&self.dir, &path, content.as_bytes())?;
        }
        Ok(())
    }
}

impl NamespaceStore for FileNamespace {
    fn identity(&self) -> &RepoId {
        &self.id
    }

    fn repo_url(&self) -> &RepoUrl {
        &self.url
    }

    fn initialize(&self) -> Result<()> {
        self.ensure_dirs()?;

        let mut url_line = self.url.as_str().to_string();
        url_line.push('\n');
        let defaults: [(&str, &[u8]); 4] = [
            (CLAIMS_FILE, b"{}\n"),
            (MESSAGES_FILE, b""),
            (STATE_FILE, b"{\n  \"agents\": {},\n  \"last_updated\": null\n}\n"),
            (URL_FILE, url_line.as_bytes()),
        ];

        for (name, content) in defaults {
            if create_if_absent(&self.dir, &self.file(name), content)? {
                tracing::debug!("Created {}", self.file(name).display());
            }
        }

        tracing::debug!(repo = %self.url, id = %self.id, "Coordination namespace ready");
        Ok(())
    }

    fn load_claims(&self) -> Result<ClaimTable> {
        read_table(&self.file(CLAIMS_FILE))
    }

    fn update_claims(&self, mutate: &mut TableMutator<'_, ClaimTable>) -> Result<()> {
        self.update_table(CLAIMS_FILE, CLAIMS_LOCK, mutate)
    }

    fn append_event(&self, event: &Event) -> Result<()> {
        let mut line = serde_json::to_string(event)?;
        line.push('\n');

        let _guard = self.lock(EVENTS_LOCK)?;
        let path = self.file(MESSAGES_FILE);
        let mut file = OpenOptions::new()
            .create(true)
            .read(true)
            .append(true)
            .open(&path)
            .map_err(|e| Error::storage(format!("Failed to open {}: {e}", path.display())))?;

        // A torn line from a crashed writer must not swallow this record
        if ends_mid_line(&mut file)
            .map_err(|e| Error::storage(format!("Failed to inspect {}: {e}", path.display())))?
        {
            line.insert(0, '\n');
        }

        file.write_all(line.as_bytes())
            .and_then(|()| file.flush())
            .map_err(|e| Error::storage(format!("Failed to append to {}: {e}", path.display())))
    }

    fn load_events(&self) -> Result<Vec<Event>> {
        let path = self.file(MESSAGES_FILE);
        let content = match fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => {
                return Err(Error::storage(format!(
                    "Failed to read {}: {e}",
                    path.display()
                )))
            }
        };

        Ok(content
            .lines()
            .enumerate()
            .filter(|(_, line)| !line.trim().is_empty())
            .filter_map(|(index, line)| match serde_json::from_str::<Event>(line) {
                Ok(event) => Some(event),
                Err(e) => {
                    tracing::debug!(
                        "Skipping unreadable event at {}:{}: {e}",
                        path.display(),
                        index + 1
                    );
                    None
                }
            })
            .collect())
    }

    fn load_state(&self) -> Result<StateSnapshot> {
        read_table(&self.file(STATE_FILE))
    }

    fn update_state(&self, mutate: &mut TableMutator<'_, StateSnapshot>) -> Result<()> {
        self.update_table(STATE_FILE, STATE_LOCK, mutate)
    }
}

/// Read a JSON table; a missing or empty file is an empty table.
fn read_table<T>(path: &Path) -> Result<T>
where
    T: DeserializeOwned + Default,
{
    match fs::read_to_string(path) {
        Ok(content) if content.trim().is_empty() => Ok(T::default()),
        Ok(content) => serde_json::from_str(&content)
            .map_err(|e| Error::Parse(format!("Failed to parse {}: {e}", path.display()))),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(T::default()),
        Err(e) => Err(Error::storage(format!(
            "Failed to read {}: {e}",
            path.display()
        ))),
    }
}

fn ends_mid_line(file: &mut File) -> io::Result<bool> {
    let len = file.metadata()?.len();
    if len == 0 {
        return Ok(false);
    }
    let mut last = [0_u8; 1];
    file.seek(SeekFrom::Start(len - 1))?;
    file.read_exact(&mut last)?;
    Ok(last[0] != b'\n')
}

fn staged_file(dir: &Path, content: &[u8]) -> Result<NamedTempFile> {
    let mut staged = NamedTempFile::new_in(dir)
        .map_err(|e| Error::storage(format!("Failed to stage file in {}: {e}", dir.display())))?;
    staged
        .write_all(content)
        .and_then(|()| staged.as_file().sync_all())
        .map_err(|e| Error::storage(format!("Failed to write staged file: {e}")))?;
    Ok(staged)
}

/// Atomically replace `target` with `content`.
fn replace_file(dir: &Path, target: &Path, content: &[u8]) -> Result<()> {
    staged_file(dir, content)?
        .persist(target)
        .map(|_| ())
        .map_err(|e| Error::storage(format!("Failed to replace {}: {}", target.display(), e.error)))
}

/// Publish `content` at `target` unless something is already there.
///
/// Returns whether the file was created.
fn create_if_absent(dir: &Path, target: &Path, content: &[u8]) -> Result<bool> {
    if target.exists() {
        return Ok(false);
    }
    match staged_file(dir, content)?.persist_noclobber(target) {
        Ok(_) => Ok(true),
        Err(e) if e.error.kind() == ErrorKind::AlreadyExists => Ok(false),
        Err(e) => Err(Error::storage(format!(
            "Failed to create {}: {}",
            target.display(),
            e.error
        ))),
    }
}
