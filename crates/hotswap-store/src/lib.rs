mod fs_utils;
mod layout;
mod packages;
mod preferences;
mod state_store;

pub use fs_utils::{remove_dir_all_if_exists, remove_file_if_exists, write_atomically};
pub use layout::StateLayout;
pub use packages::PackageRepository;
pub use preferences::Preferences;
pub use state_store::{PreferenceGroup, StateStore};
