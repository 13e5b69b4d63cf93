pub mod heap_file;
pub mod heap_file_iterator;

#[cfg(test)]
mod heap_file_test;
