//! IP geolocation: a persisted cache seeded from a bulk reference table and
//! filled on demand from an external lookup service.

mod cache;
mod client;
mod timezone;
mod wire;

pub use cache::{CacheStats, GeoLookupCache, ResolveSummary};
pub use client::{GeoLookup, GeolocationDbClient, LookupOptions};
pub use timezone::{offset_now, TimezoneResolver, TzfResolver};
pub use wire::{WireLocation, NOT_FOUND};
