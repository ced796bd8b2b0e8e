pub mod cross_check;
pub mod stress;
