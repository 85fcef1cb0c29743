pub use file_system::TokioFileSystem;
pub use registry_metadata::RegistryMetadataClient;
pub use tarball_extractor::TarballExtractor;
pub use tarball_fetcher::HttpTarballFetcher;

pub mod file_system;
pub mod registry_metadata;
pub mod tarball_extractor;
pub mod tarball_fetcher;
