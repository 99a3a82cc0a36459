pub mod logging;
#[cfg(test)]
pub mod test_utils;
pub mod tracing;
pub mod url;
