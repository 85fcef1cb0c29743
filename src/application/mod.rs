pub use package_cache::{CacheOutcome, PackageCache};

pub mod package_cache;
