use std::sync::Arc;

use super::driver;
use super::Stores;
use crate::config::Core;

/// # Panics
///
/// Will panic if the configured store driver cannot be initialized.
#[must_use]
pub fn initialize_stores(config: &Core) -> Arc<Stores> {
    Arc::new(driver::build(&config.database).expect("Store driver build failed."))
}
