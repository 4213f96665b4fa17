//! Archive transport: HTTP(S) download, sha256 digests, and tar/zip
//! extraction and creation.

pub mod archive;
pub mod digest;
pub mod fetch;

pub use archive::{create_tar, extract, ArchiveFormat};
pub use digest::{sha256_file, sha256_hex};
pub use fetch::{Fetcher, HttpFetcher};
