// gateway-link-memory — In-memory account store.
//
// HashMap-backed `AccountStore` for tests, local development and the CLI's
// dry runs. Data is lost when the store is dropped.

pub mod store;

pub use store::MemoryAccountStore;
