//! Firebase Realtime Database outbound adapter.
//!
//! A thin REST implementation of the `FirebaseTreeSource` port.

mod http_source;

pub use http_source::FirebaseRestSource;
