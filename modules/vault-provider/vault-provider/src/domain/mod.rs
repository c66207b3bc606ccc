pub mod attributes;
pub mod error;
pub mod model;
pub mod mount;
pub mod service;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_support;

pub use error::{ErrorClass, MountError};
pub use model::{MountOutcome, MountedFile, SecretVersion};
pub use mount::MountService;
pub use service::SecretBundleService;
