//! In-memory file system for projections, plus the on-disk alternative.
//!
//! Writes coming from the editor pass through an optional before-write hook
//! that may reject them; writes coming from the projection engine itself use
//! [`VirtualFileSystem::sync_content`] and skip the hook.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use dashmap::{DashMap, DashSet};
use tokio::sync::broadcast;
use url::Url;

use crate::error::{LensError, LensResult};

const FILE_CHANGE_CAPACITY: usize = 256;

pub type HookFuture<'a> = Pin<Box<dyn Future<Output = LensResult<()>> + Send + 'a>>;

/// Intercepts an editor write before it lands.
///
/// Returning an error rejects the write and leaves the file untouched.
pub trait BeforeWrite: Send + Sync {
    fn before_write<'a>(&'a self, uri: &'a Url, content: &'a str) -> HookFuture<'a>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileChangeKind {
    Created,
    Changed,
    Deleted,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileChangeEvent {
    pub uri: Url,
    pub kind: FileChangeKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    File,
    Directory,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileStat {
    pub kind: FileKind,
    pub size: usize,
}

#[derive(Default)]
struct VirtualFile {
    data: Vec<u8>,
    hook: Option<Arc<dyn BeforeWrite>>,
}

/// Where projections keep their content.
pub trait FileStore: Send + Sync {
    fn create_directory(&self, uri: &Url) -> impl Future<Output = LensResult<()>> + Send;

    /// Write engine-produced content. Never runs before-write hooks.
    fn write_file(&self, uri: &Url, content: &str) -> impl Future<Output = LensResult<()>> + Send;

    fn delete(&self, uri: &Url) -> impl Future<Output = LensResult<()>> + Send;

    /// Route future editor writes of `uri` through `hook`.
    ///
    /// Returns false when the store cannot intercept writes.
    fn install_hook(&self, _uri: &Url, _hook: Arc<dyn BeforeWrite>) -> bool {
        false
    }
}

pub struct VirtualFileSystem {
    scheme: String,
    files: DashMap<Url, VirtualFile>,
    directories: DashSet<Url>,
    changes: broadcast::Sender<Vec<FileChangeEvent>>,
}

impl VirtualFileSystem {
    pub fn new(scheme: impl Into<String>) -> Self {
        let (changes, _) = broadcast::channel(FILE_CHANGE_CAPACITY);
        Self {
            scheme: scheme.into(),
            files: DashMap::new(),
            directories: DashSet::new(),
            changes,
        }
    }

    pub fn scheme(&self) -> &str {
        &self.scheme
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Vec<FileChangeEvent>> {
        self.changes.subscribe()
    }

    fn emit(&self, uri: &Url, kind: FileChangeKind) {
        // No subscribers is fine
        let _ = self.changes.send(vec![FileChangeEvent {
            uri: uri.clone(),
            kind,
        }]);
    }

    /// Create an empty file unless one exists. Returns whether it existed.
    pub fn get_or_create(&self, uri: &Url) -> bool {
        let mut existed = true;
        self.files.entry(uri.clone()).or_insert_with(|| {
            existed = false;
            VirtualFile::default()
        });
        if !existed {
            self.emit(uri, FileChangeKind::Created);
        }
        existed
    }

    pub fn exists(&self, uri: &Url) -> bool {
        self.files.contains_key(uri)
    }

    pub fn read(&self, uri: &Url) -> LensResult<Vec<u8>> {
        self.files
            .get(uri)
            .map(|file| file.data.clone())
            .ok_or_else(|| LensError::FileNotFound {
                uri: uri.to_string(),
            })
    }

    pub fn read_string(&self, uri: &Url) -> LensResult<String> {
        self.read(uri)
            .map(|data| String::from_utf8_lossy(&data).into_owned())
    }

    pub fn stat(&self, uri: &Url) -> LensResult<FileStat> {
        if let Some(file) = self.files.get(uri) {
            return Ok(FileStat {
                kind: FileKind::File,
                size: file.data.len(),
            });
        }
        if self.directories.contains(uri) {
            return Ok(FileStat {
                kind: FileKind::Directory,
                size: 0,
            });
        }
        Err(LensError::FileNotFound {
            uri: uri.to_string(),
        })
    }

    /// Editor-originated write.
    ///
    /// Runs the file's before-write hook first; a hook error fails the write
    /// and leaves the previous content in place.
    pub async fn write(&self, uri: &Url, data: &[u8]) -> LensResult<()> {
        let hook = self.files.get(uri).and_then(|file| file.hook.clone());
        if let Some(hook) = hook {
            let content = String::from_utf8_lossy(data);
            if let Err(err) = hook.before_write(uri, &content).await {
                log::warn!(
                    target: "editlens::vfs",
                    "Write to {} rejected: {}",
                    uri,
                    err
                );
                return Err(err);
            }
        }
        self.store(uri, data);
        Ok(())
    }

    pub async fn write_string(&self, uri: &Url, content: &str) -> LensResult<()> {
        self.write(uri, content.as_bytes()).await
    }

    /// Engine-originated write that never consults the hook.
    pub fn sync_content(&self, uri: &Url, content: &str) {
        self.store(uri, content.as_bytes());
    }

    fn store(&self, uri: &Url, data: &[u8]) {
        let created = {
            let mut created = false;
            let mut file = self.files.entry(uri.clone()).or_insert_with(|| {
                created = true;
                VirtualFile::default()
            });
            file.data = data.to_vec();
            created
        };
        let kind = if created {
            FileChangeKind::Created
        } else {
            FileChangeKind::Changed
        };
        self.emit(uri, kind);
    }

    pub fn install_hook(&self, uri: &Url, hook: Arc<dyn BeforeWrite>) {
        self.files.entry(uri.clone()).or_default().hook = Some(hook);
    }

    pub fn create_directory(&self, uri: &Url) {
        self.directories.insert(uri.clone());
    }

    pub fn delete(&self, uri: &Url) -> LensResult<()> {
        if self.files.remove(uri).is_some() {
            self.emit(uri, FileChangeKind::Deleted);
            return Ok(());
        }
        if self.directories.remove(uri).is_some() {
            return Ok(());
        }
        Err(LensError::FileNotFound {
            uri: uri.to_string(),
        })
    }

    pub fn read_directory(&self, _uri: &Url) -> LensResult<Vec<(String, FileKind)>> {
        Err(LensError::unsupported("readDirectory"))
    }

    pub fn rename(&self, _from: &Url, _to: &Url) -> LensResult<()> {
        Err(LensError::unsupported("rename"))
    }

    pub fn watch(&self, _uri: &Url) -> LensResult<()> {
        Err(LensError::unsupported("watch"))
    }
}

impl FileStore for VirtualFileSystem {
    async fn create_directory(&self, uri: &Url) -> LensResult<()> {
        VirtualFileSystem::create_directory(self, uri);
        Ok(())
    }

    async fn write_file(&self, uri: &Url, content: &str) -> LensResult<()> {
        self.sync_content(uri, content);
        Ok(())
    }

    async fn delete(&self, uri: &Url) -> LensResult<()> {
        VirtualFileSystem::delete(self, uri)
    }

    fn install_hook(&self, uri: &Url, hook: Arc<dyn BeforeWrite>) -> bool {
        VirtualFileSystem::install_hook(self, uri, hook);
        true
    }
}

/// Projection store backed by real files.
#[derive(Debug, Default, Clone, Copy)]
pub struct DiskFileStore;

fn file_path(uri: &Url) -> LensResult<std::path::PathBuf> {
    uri.to_file_path()
        .map_err(|_| LensError::unsupported(format!("non-file URI {uri}")))
}

impl FileStore for DiskFileStore {
    async fn create_directory(&self, uri: &Url) -> LensResult<()> {
        tokio::fs::create_dir_all(file_path(uri)?).await?;
        Ok(())
    }

    async fn write_file(&self, uri: &Url, content: &str) -> LensResult<()> {
        tokio::fs::write(file_path(uri)?, content).await?;
        Ok(())
    }

    async fn delete(&self, uri: &Url) -> LensResult<()> {
        tokio::fs::remove_file(file_path(uri)?).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn uri(path: &str) -> Url {
        Url::parse(&format!("editlens:/{path}")).unwrap()
    }

    struct Reject;

    impl BeforeWrite for Reject {
        fn before_write<'a>(&'a self, uri: &'a Url, _content: &'a str) -> HookFuture<'a> {
            Box::pin(async move {
                Err(LensError::PathNotFound {
                    path: uri.path().to_string(),
                })
            })
        }
    }

    #[derive(Default)]
    struct Count(AtomicUsize);

    impl BeforeWrite for Count {
        fn before_write<'a>(&'a self, _uri: &'a Url, _content: &'a str) -> HookFuture<'a> {
            Box::pin(async move {
                self.0.fetch_add(1, Ordering::SeqCst);
                Ok(())
            })
        }
    }

    #[tokio::test]
    async fn rejected_write_leaves_content_unchanged() {
        let fs = VirtualFileSystem::new("editlens");
        let target = uri("a.txt");
        fs.sync_content(&target, "before");
        fs.install_hook(&target, Arc::new(Reject));

        let result = fs.write_string(&target, "after").await;

        assert!(matches!(result, Err(LensError::PathNotFound { .. })));
        assert_eq!(fs.read_string(&target).unwrap(), "before");
    }

    #[tokio::test]
    async fn sync_content_skips_hook() {
        let fs = VirtualFileSystem::new("editlens");
        let target = uri("a.txt");
        let hook = Arc::new(Count::default());
        fs.install_hook(&target, hook.clone());

        fs.sync_content(&target, "engine");
        fs.write_string(&target, "editor").await.unwrap();

        assert_eq!(hook.0.load(Ordering::SeqCst), 1);
        assert_eq!(fs.read_string(&target).unwrap(), "editor");
    }

    #[tokio::test]
    async fn successful_write_emits_change_event() {
        let fs = VirtualFileSystem::new("editlens");
        let target = uri("a.txt");
        fs.get_or_create(&target);
        let mut rx = fs.subscribe();

        fs.write_string(&target, "x").await.unwrap();

        let events = rx.try_recv().unwrap();
        assert_eq!(events[0].kind, FileChangeKind::Changed);
        assert_eq!(events[0].uri, target);
        assert_eq!(fs.stat(&target).unwrap().size, 1);
    }

    #[test]
    fn unsupported_operations_fail_loudly() {
        let fs = VirtualFileSystem::new("editlens");
        let target = uri("dir");
        assert!(matches!(
            fs.read_directory(&target),
            Err(LensError::Unsupported { .. })
        ));
        assert!(matches!(
            fs.rename(&target, &uri("other")),
            Err(LensError::Unsupported { .. })
        ));
        assert!(matches!(fs.watch(&target), Err(LensError::Unsupported { .. })));
    }

    #[test]
    fn delete_missing_file_fails() {
        let fs = VirtualFileSystem::new("editlens");
        assert!(matches!(
            fs.delete(&uri("missing.txt")),
            Err(LensError::FileNotFound { .. })
        ));
    }

    #[tokio::test]
    async fn disk_store_round_trip() {
        let dir = tempfile::TempDir::new().unwrap();
        let projections = Url::from_directory_path(dir.path().join(".tmp-projections")).unwrap();
        let file = projections.join("0.py").unwrap();

        FileStore::create_directory(&DiskFileStore, &projections)
            .await
            .unwrap();
        DiskFileStore.write_file(&file, "print(1)\n").await.unwrap();
        let written = std::fs::read_to_string(file.to_file_path().unwrap()).unwrap();
        assert_eq!(written, "print(1)\n");

        FileStore::delete(&DiskFileStore, &file).await.unwrap();
        assert!(!file.to_file_path().unwrap().exists());
    }
}
