pub mod storage;
pub mod store;

pub use storage::{FileStorage, MemoryStorage, SessionStorage};
pub use store::{Access, Session, SessionStore, TOKEN_KEY, USER_KEY};
