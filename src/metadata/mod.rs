//! Cached metadata of logical databases and its refresh after execution

pub mod database;
pub mod error;
pub mod persist;
pub mod refresh;
pub mod table;

pub use database::{Database, MetaDataContexts};
pub use error::{MetadataError, MetadataResult};
pub use persist::{
    MetaDataPersistService, MetadataPath, NoopMetaDataPersistService,
    RegistryMetaDataPersistService,
};
pub use refresh::MetaDataRefreshEngine;
pub use table::TableMetaData;
