/// Database layer: connection pool and embedded migrations
///
/// Models live in the crate-level `models` module; the transactional
/// composition of model queries lives in `store::postgres`.

pub mod migrations;
pub mod pool;
