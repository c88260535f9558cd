pub mod backup_dir;
pub mod db;
pub mod file_store;

pub use backup_dir::{FsDirectoryOpener, FsSnapshotDirectory};
pub use db::DbAdapter;
pub use file_store::FileMirrorStore;
