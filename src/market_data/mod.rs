// Market data module entrypoint
pub mod adapters;       // one protocol descriptor per venue
pub mod normaliser;     // frame decoding, decimal and timestamp helpers
pub mod external_book;  // one venue's book snapshot
pub mod registry;       // venue id -> descriptor
pub mod router;         // connection lifecycle per selection
pub mod unified_book;   // aggregation core: tape, ladder, statuses
