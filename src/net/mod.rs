pub mod backend;
pub mod request;
pub mod response;

pub use backend::{
    fetch, fetch_slot, fetch_with, set_fetch_backend, Fetch, FetchError, FetchSlot, HttpFetch,
};
pub use request::{parse_fetch_args, FetchArgs, FetchInit, FetchRequest, FetchResource};
pub use response::{ChunkStream, Response};
