//! Reading ingestion adapters.
//!
//! Each adapter only decodes transport framing into `RawReading`s; every
//! semantic check happens later in the validator.
//!
//! Submodules:
//! - `message` decodes one JSON reading as sent by a field unit.
//! - `csv` decodes historical readings for replay and backfill.
//! - `gateway` pulls pending readings from the field gateway over HTTP.

pub mod csv;
pub mod gateway;
pub mod message;

pub use gateway::GatewayClient;
