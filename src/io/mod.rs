//! I/O layer: URI resolution, local copies, line reading and remote uploads

pub mod lines;
pub mod local_fs;
pub mod upload;
pub mod uri;

pub use lines::LossyLines;
pub use local_fs::{copy_file_preserving, copy_tree_to, list_files, normalize_separators};
pub use upload::{S3UploadClient, UploadClient, UploadError};
pub use uri::{Destination, EventEndpoint, RemoteDestination};
