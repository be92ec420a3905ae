//! Flutter-facing bindings for the OrderedTODO core.

pub mod api;
