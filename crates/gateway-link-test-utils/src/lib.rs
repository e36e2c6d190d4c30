// gateway-link-test-utils
//
// Shared testing infrastructure:
// - `MockGateway`, a scripted `GatewayApi` with call counters
// - `run_account_store_suite`, the conformance suite every `AccountStore`
//   backend must pass

pub mod mock_gateway;
pub mod store_suite;

pub use mock_gateway::{GatewayCall, MockGateway};
pub use store_suite::{run_account_store_suite, StoreSuiteReport};
