mod checksum;
mod manifest;

pub use checksum::{sha256_hex, sha256_hex_file};
pub use manifest::{ContentHasher, ManifestHasher, IGNORED_ENTRY_NAMES};
