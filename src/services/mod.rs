//! Business logic services.
//!
//! Services contain core logic separated from HTTP handlers: the store
//! adapter, the QR codec, payload validation, and the scan session
//! controller.

pub mod qr_codec;
pub mod resource_store;
pub mod scan_service;
pub mod validation_service;
