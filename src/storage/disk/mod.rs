pub mod disk_manager;
pub mod log_file;

#[cfg(test)]
mod disk_manager_test;
