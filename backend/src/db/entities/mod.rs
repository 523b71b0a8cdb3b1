//! SeaORM entities for the issuance engine.
//!
//! Models, the global MAC counter singleton, and batches. A batch is a
//! `generate_groups` row with its serials in `serial_entries` and their MAC
//! addresses in `entry_macs`.

pub mod device_model;
pub mod entry_mac;
pub mod generate_group;
pub mod mac_counter;
pub mod serial_entry;

