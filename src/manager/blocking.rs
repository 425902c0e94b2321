//! Synchronous entry points
//!
//! These block the calling thread until the async operation completes. From
//! a multi-threaded Tokio runtime the worker is handed over with
//! `block_in_place`; with no runtime at all a shared background runtime is
//! used. Blocking on a current-thread runtime would deadlock, so that case is
//! refused with [`Error::BlockingInAsync`].

use super::ConfigManager;
use crate::binding::ConfigType;
use crate::error::{Error, Result};
use std::future::Future;
use std::sync::OnceLock;
use tokio::runtime::{Builder, Handle, Runtime, RuntimeFlavor};

static FALLBACK_RUNTIME: OnceLock<Runtime> = OnceLock::new();

fn fallback_runtime() -> Result<&'static Runtime> {
    if let Some(runtime) = FALLBACK_RUNTIME.get() {
        return Ok(runtime);
    }

    let runtime = Builder::new_multi_thread()
        .worker_threads(2)
        .thread_name("confstore-blocking")
        .enable_all()
        .build()
        .map_err(Error::Runtime)?;

    // A concurrent caller may have won the race; its runtime is kept.
    let _ = FALLBACK_RUNTIME.set(runtime);
    FALLBACK_RUNTIME
        .get()
        .ok_or_else(|| Error::Runtime(std::io::Error::other("fallback runtime unavailable")))
}

fn block_on<F: Future>(future: F) -> Result<F::Output> {
    match Handle::try_current() {
        Ok(handle) => match handle.runtime_flavor() {
            RuntimeFlavor::CurrentThread => Err(Error::BlockingInAsync),
            _ => Ok(tokio::task::block_in_place(|| handle.block_on(future))),
        },
        Err(_) => Ok(fallback_runtime()?.block_on(future)),
    }
}

impl ConfigManager {
    /// Blocking [`get`](Self::get)
    ///
    /// # Errors
    ///
    /// Returns `Error::BlockingInAsync` when called on a current-thread
    /// runtime, otherwise whatever `get` returns.
    pub fn get_blocking<T: ConfigType + Default>(&self) -> Result<T> {
        block_on(self.get::<T>())?
    }

    /// Blocking [`get_in_scope`](Self::get_in_scope)
    ///
    /// # Errors
    ///
    /// See [`get_blocking`](Self::get_blocking).
    pub fn get_in_scope_blocking<T: ConfigType + Default>(&self, scope: Option<&str>) -> Result<T> {
        block_on(self.get_in_scope::<T>(scope))?
    }

    /// Blocking [`save`](Self::save)
    ///
    /// # Errors
    ///
    /// Returns `Error::BlockingInAsync` when called on a current-thread
    /// runtime, otherwise whatever `save` returns.
    pub fn save_blocking<T: ConfigType>(&self, value: &T) -> Result<()> {
        block_on(self.save(value))?
    }

    /// Blocking [`save_in_scope`](Self::save_in_scope)
    ///
    /// # Errors
    ///
    /// See [`save_blocking`](Self::save_blocking).
    pub fn save_in_scope_blocking<T: ConfigType>(&self, value: &T, scope: Option<&str>) -> Result<()> {
        block_on(self.save_in_scope(value, scope))?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::binding::{FieldDescriptor, ValueKind};
    use crate::config_fields;
    use crate::store::MemoryStore;

    #[derive(Debug, Default, PartialEq)]
    struct Flags {
        enabled: bool,
    }

    impl ConfigType for Flags {
        const TYPE_NAME: &'static str = "Flags";

        fn fields() -> &'static [FieldDescriptor<Self>] {
            config_fields!(Flags { "Enabled" => enabled: ValueKind::Bool })
        }
    }

    #[test]
    fn test_blocking_without_runtime() {
        let manager = ConfigManager::new(MemoryStore::new()).unwrap();
        manager.save_blocking(&Flags { enabled: true }).unwrap();
        let loaded: Flags = manager.get_blocking().unwrap();
        assert!(loaded.enabled);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_blocking_inside_multi_thread_runtime() {
        let manager = ConfigManager::new(MemoryStore::new()).unwrap();
        manager
            .save_in_scope_blocking(&Flags { enabled: true }, Some("t"))
            .unwrap();
        let loaded: Flags = manager.get_in_scope_blocking(Some("t")).unwrap();
        assert!(loaded.enabled);
    }

    #[tokio::test]
    async fn test_blocking_inside_current_thread_runtime_is_refused() {
        let manager = ConfigManager::new(MemoryStore::new()).unwrap();
        let err = manager.get_blocking::<Flags>().unwrap_err();
        assert!(matches!(err, Error::BlockingInAsync));
    }
}
