//! Medicat core types and utilities

pub mod error;
pub mod highlight;
pub mod session;
pub mod storage;
pub mod types;

pub use error::{CoreError, CoreResult};
pub use highlight::{Segment, highlight};
pub use session::{LOGIN_PATH, RouteAccess, SessionContext};
pub use storage::{ACCESS_KEY, CredentialPair, CredentialStore, FileStore, MemoryStore, REFRESH_KEY};
pub use types::{
    Category, CategoryType, FormType, GenericName, Manufacturer, MatchSpan, Medicine,
    MedicineForm, MedicineInput, Page, RecordId, SearchFilters, SearchHit, UnitOfMeasurement,
};
