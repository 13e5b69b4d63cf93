pub mod lock_manager;
pub mod transaction;
pub mod wait_for_graph;
