mod memory;
mod repo;
mod repo_types;

pub use memory::MemoryAccountStore;
pub use repo::{AccountStore, PgAccountStore, StoreError};
pub use repo_types::{Account, AccountView, NewAccount};
