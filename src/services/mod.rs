pub mod assembler;
pub mod extractor;
pub mod feature_engine;
pub mod fetcher;
pub mod history_cache;

#[cfg(test)]
pub mod test_support;

pub use assembler::*;
pub use fetcher::*;
