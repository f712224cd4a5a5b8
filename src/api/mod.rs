pub mod cycle_stats;
pub mod health;
pub mod routes;
