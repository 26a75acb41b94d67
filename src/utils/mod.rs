//! Utility functions and types

pub mod data_loader;

pub use data_loader::{column_names, columns_to_array2, load_array, load_csv, save_array, save_csv};
