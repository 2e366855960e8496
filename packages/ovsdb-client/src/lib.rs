//! Client-side OVSDB (RFC 7047) record binding and table caching.
//!
//! Two pieces sit on top of [`ovsdb_core`]: the [`Mapper`], which moves data
//! between annotated record types and wire rows under the discipline of a
//! shared schema, and the [`TableCache`], which maintains the client's view
//! of monitored tables and fans update events out to subscribers.
//!
//! Record types are declared with [`ovsdb_model!`]:
//!
//! ```
//! use ovsdb_client::ovsdb_model;
//!
//! ovsdb_model! {
//!     #[derive(Debug, Default, Clone)]
//!     pub struct Bridge {
//!         #[ovs("_uuid")]
//!         pub uuid: String,
//!         #[ovs("name")]
//!         pub name: String,
//!         #[ovs("ports")]
//!         pub ports: Vec<String>,
//!     }
//! }
//! ```

pub mod cache;
pub mod mapper;
pub mod model;

pub use cache::{EventHandler, EventHandlerFuncs, RowCache, TableCache};
pub use mapper::{Mapper, MapperError};
pub use model::{Binding, Model};

/// Support types referenced by [`ovsdb_model!`] expansions. Not part of the
/// public API surface.
#[doc(hidden)]
pub mod __private {
    pub use ovsdb_core::native::{NativeField, NativeValue};
}
