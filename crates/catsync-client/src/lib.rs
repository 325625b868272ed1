//! catsync client - HTTP access to remote catalog services.
//!
//! [`OgcApiClient`] implements [`catsync_core::remote::CatalogClient`] on top
//! of the OGC API Features collection and item endpoints, including the
//! transaction extension used by STAC servers for `POST` and `PUT`.

pub mod ogcapi;

pub use ogcapi::OgcApiClient;
